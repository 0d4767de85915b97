use std::collections::HashSet;

use anyhow::Context;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use settle_api::{
    lunchmoney::DEFAULT_API_BASE as LUNCHMONEY_API_BASE,
    paypal::DEFAULT_ENDPOINT as PAYPAL_ENDPOINT, rates::DEFAULT_API_BASE as RATES_API_BASE,
    LunchMoneyClient, PaypalClient, PaypalCredentials, RatesClient, RatesError,
};
use settle_core::{CandidateTransaction, CurrencyCode, DateRange, TargetTransaction};
use settle_reconcile::{reconcile, MatchEngine, RateCache, RateKey, ReconcileOutcome};
use settle_storage::DbPool;

use crate::config::Config;

pub async fn run(config: Config, db: DbPool, period: DateRange) -> anyhow::Result<()> {
    let base = config.base_currency();

    let lunchmoney = LunchMoneyClient::with_api_base(
        config.lunchmoney_api_base.as_deref().unwrap_or(LUNCHMONEY_API_BASE),
        &config.lunchmoney_token,
    );
    let paypal = PaypalClient::with_endpoint(
        config.paypal_endpoint.as_deref().unwrap_or(PAYPAL_ENDPOINT),
        PaypalCredentials {
            user: config.paypal_user.clone(),
            password: config.paypal_password.clone(),
            signature: config.paypal_signature.clone(),
        },
    );
    let rates_client =
        RatesClient::with_api_base(config.rates_api_base.as_deref().unwrap_or(RATES_API_BASE));

    info!("reconciling {period}");

    let (targets, candidates) = tokio::join!(
        lunchmoney.transactions(period),
        paypal.transaction_search(period),
    );
    let targets = targets.context("fetching target transactions")?;
    let candidates = candidates.context("fetching candidate transactions")?;
    info!(
        "fetched {} target and {} candidate transactions",
        targets.len(),
        candidates.len()
    );

    let targets: Vec<TargetTransaction> = targets
        .into_iter()
        .filter(|target| target.original_name.contains(&config.target_marker))
        .collect();
    debug!(
        "{} targets carry the {:?} marker",
        targets.len(),
        config.target_marker
    );

    let stored = settle_storage::load_rate_cache(&db)
        .await
        .context("loading the rate cache")?;
    let mut cache = RateCache::with_entries(
        config.rate_cache_capacity,
        stored
            .iter()
            .filter_map(|(key, rate)| RateKey::parse(key).map(|key| (key, *rate))),
    );
    debug!("{} cached rates loaded", cache.len());

    let excluded = prewarm(&rates_client, &base, &candidates, &mut cache).await?;
    let candidates: Vec<CandidateTransaction> = candidates
        .into_iter()
        .filter(|candidate| {
            candidate.is_base(&base)
                || !excluded.contains(&RateKey::new(candidate.date(), candidate.currency.clone()))
        })
        .collect();

    let engine = MatchEngine::new(base);
    let outcome = reconcile(&engine, &targets, candidates, &mut cache)
        .context("running the matching engine")?;
    report(&outcome);

    if config.apply {
        apply_updates(&lunchmoney, &config, &outcome).await;
    } else {
        info!(
            "apply disabled; {} updates planned but not sent",
            outcome.matched.len()
        );
    }

    let snapshot: Vec<(String, rust_decimal::Decimal)> = cache
        .snapshot()
        .into_iter()
        .map(|(key, rate)| (key.cache_key(), rate))
        .collect();
    settle_storage::save_rate_cache(&db, &snapshot)
        .await
        .context("saving the rate cache")?;

    Ok(())
}

/// Fetches every missing (day, currency) pair ahead of matching, so the
/// match pass itself never touches the network. Distinct pairs are fetched
/// concurrently; pairs the upstream has no rate for are returned so their
/// candidates can be excluded rather than matched against a guessed rate.
async fn prewarm(
    client: &RatesClient,
    base: &CurrencyCode,
    candidates: &[CandidateTransaction],
    cache: &mut RateCache,
) -> anyhow::Result<HashSet<RateKey>> {
    let pending: HashSet<RateKey> = candidates
        .iter()
        .filter(|candidate| !candidate.is_base(base))
        .map(|candidate| RateKey::new(candidate.date(), candidate.currency.clone()))
        .filter(|key| !cache.contains(key))
        .collect();
    debug!("pre-warming {} rate pairs", pending.len());

    let mut tasks = JoinSet::new();
    for key in pending {
        let client = client.clone();
        let base = base.clone();
        tasks.spawn(async move {
            let rate = client.rate_on(key.date, &base, &key.currency).await;
            (key, rate)
        });
    }

    let mut excluded = HashSet::new();
    while let Some(joined) = tasks.join_next().await {
        let (key, rate) = joined.context("pre-warm task panicked")?;
        match rate {
            Ok(rate) => cache.insert(key, rate),
            Err(RatesError::Unavailable { .. }) => {
                warn!(
                    "no historical rate for {} on {}; excluding its candidates",
                    key.currency, key.date
                );
                excluded.insert(key);
            }
            Err(error) => {
                return Err(error).context("pre-warming exchange rates");
            }
        }
    }
    Ok(excluded)
}

fn report(outcome: &ReconcileOutcome) {
    for entry in &outcome.matched {
        info!(
            "matched target {} -> {} ({})",
            entry.target_id,
            entry.payee,
            entry.match_date.date_naive()
        );
    }
    for possible in &outcome.possible {
        info!(
            "possible match for target {}: {} ({}), off by {}",
            possible.target_id,
            possible.payee,
            possible.transaction_id,
            possible.delta.round_dp(2)
        );
    }
    for target_id in &outcome.unmatched {
        info!("no match for target {target_id}");
    }
    info!(
        "{} matched, {} possible, {} unmatched",
        outcome.matched.len(),
        outcome.possible.len(),
        outcome.unmatched.len()
    );
}

/// Applies the plan one entry at a time; a failed update is logged and the
/// rest of the batch still proceeds.
async fn apply_updates(
    lunchmoney: &LunchMoneyClient,
    config: &Config,
    outcome: &ReconcileOutcome,
) {
    let tags = vec![config.match_tag.clone()];
    let mut failed = 0usize;
    for entry in &outcome.matched {
        match lunchmoney
            .update_transaction(entry.target_id, &entry.payee, &tags)
            .await
        {
            Ok(()) => info!("updated target {}", entry.target_id),
            Err(error) => {
                warn!("update for target {} failed: {error}", entry.target_id);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        warn!("{failed} of {} updates failed", outcome.matched.len());
    }
}
