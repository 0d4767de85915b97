pub mod engine;
pub mod index;
pub mod plan;
pub mod rates;

pub use engine::{MatchEngine, MatchKind, MatchResult};
pub use index::CandidateIndex;
pub use plan::{build_update_plan, PossibleMatch, ReconcileOutcome, UpdatePlanEntry};
pub use rates::{RateCache, RateError, RateKey, DEFAULT_CAPACITY};

use settle_core::{CandidateTransaction, TargetTransaction};

/// Full reconciliation pass over one period's data: builds the candidate
/// index, runs the engine (newest target first, greedy consumption), and
/// partitions the results into an update plan, review items, and leftovers.
///
/// The rate cache must already be pre-warmed for every foreign-currency
/// (day, currency) pair among `candidates`.
pub fn reconcile(
    engine: &MatchEngine,
    targets: &[TargetTransaction],
    candidates: Vec<CandidateTransaction>,
    rates: &mut RateCache,
) -> Result<ReconcileOutcome, RateError> {
    let mut index = CandidateIndex::build(candidates);
    let results = engine.run(targets, &mut index, rates)?;
    Ok(plan::outcome_from_results(&results))
}
