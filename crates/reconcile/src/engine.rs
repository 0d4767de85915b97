use rust_decimal::Decimal;

use settle_core::{CandidateTransaction, CurrencyCode, DateRange, TargetId, TargetTransaction};

use crate::index::CandidateIndex;
use crate::rates::{RateCache, RateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// High-confidence pairing; the candidate is consumed and the target is
    /// proposed for update.
    Matched,
    /// Low-confidence pairing surfaced for manual review; the candidate
    /// stays available to other targets.
    Possible,
    Unmatched,
}

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub target_id: TargetId,
    pub kind: MatchKind,
    /// Present for Matched and Possible, absent for Unmatched.
    pub candidate: Option<CandidateTransaction>,
    /// Absolute difference between the target amount and the (possibly
    /// converted) candidate amount; defined for Matched and Possible only.
    pub delta: Option<Decimal>,
}

/// The two-stage amount/date matcher.
///
/// Targets are processed newest-first and each match is committed greedily:
/// a consumed candidate is never offered to a later target, and no
/// backtracking or global optimum search is attempted, so ambiguous
/// candidates go to the most recent target that claims them.
pub struct MatchEngine {
    pub base_currency: CurrencyCode,
    /// Maximum day gap (inclusive) for a same-currency exact-amount match.
    pub same_currency_window_days: i64,
    /// Half-width (inclusive) of the cross-currency date window.
    pub cross_currency_window_days: i64,
    /// Converted-amount difference below which a cross-currency candidate is
    /// Matched (strict).
    pub matched_threshold: Decimal,
    /// Converted-amount difference up to which (inclusive) a cross-currency
    /// candidate is still worth a human glance.
    pub possible_threshold: Decimal,
}

impl MatchEngine {
    pub fn new(base_currency: CurrencyCode) -> Self {
        MatchEngine {
            base_currency,
            same_currency_window_days: 3,
            cross_currency_window_days: 4,
            matched_threshold: Decimal::new(30, 2),
            possible_threshold: Decimal::ONE,
        }
    }

    /// Runs the full pass: exactly one result per target, targets ordered by
    /// `created_at` descending, matched candidates consumed as they are
    /// claimed.
    ///
    /// Fails only on a [`RateError::NotCached`] miss, which means the caller
    /// skipped the pre-warm pass for some (day, currency) pair.
    pub fn run(
        &self,
        targets: &[TargetTransaction],
        index: &mut CandidateIndex,
        rates: &mut RateCache,
    ) -> Result<Vec<MatchResult>, RateError> {
        let mut ordered: Vec<&TargetTransaction> = targets.iter().collect();
        ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut results = Vec::with_capacity(ordered.len());
        for target in ordered {
            let result = self.match_one(target, index, rates)?;
            if result.kind == MatchKind::Matched {
                if let Some(candidate) = &result.candidate {
                    index.consume(&candidate.transaction_id);
                }
            }
            results.push(result);
        }
        Ok(results)
    }

    fn match_one(
        &self,
        target: &TargetTransaction,
        index: &CandidateIndex,
        rates: &mut RateCache,
    ) -> Result<MatchResult, RateError> {
        if let Some(candidate) = self.exact_amount_match(target, index) {
            return Ok(MatchResult {
                target_id: target.id,
                kind: MatchKind::Matched,
                candidate: Some(candidate.clone()),
                delta: Some(Decimal::ZERO),
            });
        }
        self.cross_currency_match(target, index, rates)
    }

    /// Stage 1: same-currency exact-amount. The closest candidate by day gap
    /// wins, ties going to the earliest ledger position. A closest candidate
    /// outside the window falls through to stage 2; a farther same-currency
    /// candidate is never accepted instead, even when it is the only one.
    fn exact_amount_match<'a>(
        &self,
        target: &TargetTransaction,
        index: &'a CandidateIndex,
    ) -> Option<&'a CandidateTransaction> {
        let mut best: Option<(i64, &CandidateTransaction)> = None;
        for candidate in index.lookup_by_amount(target.amount.amount()) {
            if !candidate.is_base(&self.base_currency) {
                continue;
            }
            let gap = (candidate.date() - target.date).num_days().abs();
            match best {
                Some((best_gap, _)) if gap >= best_gap => {}
                _ => best = Some((gap, candidate)),
            }
        }
        match best {
            Some((gap, candidate)) if gap <= self.same_currency_window_days => Some(candidate),
            _ => None,
        }
    }

    /// Stage 2: foreign-currency candidates inside the date window,
    /// converted to base through the pre-warmed cache at each candidate's
    /// own day. Base-currency candidates are excluded here; stage 1 already
    /// covered them.
    fn cross_currency_match(
        &self,
        target: &TargetTransaction,
        index: &CandidateIndex,
        rates: &mut RateCache,
    ) -> Result<MatchResult, RateError> {
        let window = DateRange::around(target.date, self.cross_currency_window_days);

        let mut best: Option<(Decimal, &CandidateTransaction)> = None;
        for candidate in index.lookup_by_date_range(window) {
            if candidate.is_base(&self.base_currency) {
                continue;
            }
            let rate = rates.resolve(candidate.date(), &candidate.currency)?;
            let converted = candidate.amount / rate;
            let delta = target.amount.abs_diff(converted);
            match best {
                Some((best_delta, _)) if delta >= best_delta => {}
                _ => best = Some((delta, candidate)),
            }
        }

        Ok(match best {
            Some((delta, candidate)) if delta < self.matched_threshold => MatchResult {
                target_id: target.id,
                kind: MatchKind::Matched,
                candidate: Some(candidate.clone()),
                delta: Some(delta),
            },
            Some((delta, candidate)) if delta <= self.possible_threshold => MatchResult {
                target_id: target.id,
                kind: MatchKind::Possible,
                candidate: Some(candidate.clone()),
                delta: Some(delta),
            },
            _ => MatchResult {
                target_id: target.id,
                kind: MatchKind::Unmatched,
                candidate: None,
                delta: None,
            },
        })
    }
}

impl Default for MatchEngine {
    fn default() -> Self {
        MatchEngine::new(CurrencyCode::new("USD"))
    }
}
