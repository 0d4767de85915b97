use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use settle_core::TargetId;

use crate::engine::{MatchKind, MatchResult};

/// One proposed mutation against the target ledger: the caller applies it
/// as a payee + tag update and owns the outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdatePlanEntry {
    pub target_id: TargetId,
    pub payee: String,
    pub match_date: DateTime<Utc>,
}

/// A low-confidence pairing surfaced for manual review. The candidate was
/// not consumed and may still be claimed by another target.
#[derive(Debug, Clone, Serialize)]
pub struct PossibleMatch {
    pub target_id: TargetId,
    pub transaction_id: String,
    pub payee: String,
    pub delta: Decimal,
}

/// Everything one reconciliation run produces.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub matched: Vec<UpdatePlanEntry>,
    pub possible: Vec<PossibleMatch>,
    pub unmatched: Vec<TargetId>,
}

/// Converts match results into the update plan. Matched results only; pure
/// function of its input, in result order.
pub fn build_update_plan(results: &[MatchResult]) -> Vec<UpdatePlanEntry> {
    results
        .iter()
        .filter(|result| result.kind == MatchKind::Matched)
        .filter_map(|result| {
            result.candidate.as_ref().map(|candidate| UpdatePlanEntry {
                target_id: result.target_id,
                payee: candidate.payee_name.clone(),
                match_date: candidate.timestamp,
            })
        })
        .collect()
}

pub fn outcome_from_results(results: &[MatchResult]) -> ReconcileOutcome {
    let matched = build_update_plan(results);
    let possible = results
        .iter()
        .filter(|result| result.kind == MatchKind::Possible)
        .filter_map(|result| {
            result.candidate.as_ref().map(|candidate| PossibleMatch {
                target_id: result.target_id,
                transaction_id: candidate.transaction_id.clone(),
                payee: candidate.payee_name.clone(),
                delta: result.delta.unwrap_or_default(),
            })
        })
        .collect();
    let unmatched = results
        .iter()
        .filter(|result| result.kind == MatchKind::Unmatched)
        .map(|result| result.target_id)
        .collect();

    ReconcileOutcome {
        matched,
        possible,
        unmatched,
    }
}
