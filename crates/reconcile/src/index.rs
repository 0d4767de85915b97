use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use settle_core::{CandidateTransaction, DateRange};

/// Lookup structures over one reconciliation run's candidate set.
///
/// Candidates keep their original ledger position, and every lookup returns
/// survivors ordered by it; that position is the stable tie-break key the
/// matching engine relies on. Consumption is logical: a consumed candidate
/// stays in place but is invisible through both lookups.
pub struct CandidateIndex {
    candidates: Vec<CandidateTransaction>,
    by_amount: HashMap<Decimal, Vec<usize>>,
    by_date: HashMap<NaiveDate, Vec<usize>>,
    by_id: HashMap<String, usize>,
    consumed: Vec<bool>,
}

impl CandidateIndex {
    pub fn build(candidates: Vec<CandidateTransaction>) -> Self {
        let mut by_amount: HashMap<Decimal, Vec<usize>> = HashMap::new();
        let mut by_date: HashMap<NaiveDate, Vec<usize>> = HashMap::new();
        let mut by_id: HashMap<String, usize> = HashMap::new();

        for (pos, candidate) in candidates.iter().enumerate() {
            by_amount.entry(candidate.amount).or_default().push(pos);
            by_date.entry(candidate.date()).or_default().push(pos);
            by_id.entry(candidate.transaction_id.clone()).or_insert(pos);
        }

        let consumed = vec![false; candidates.len()];
        CandidateIndex {
            candidates,
            by_amount,
            by_date,
            by_id,
            consumed,
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Unconsumed candidates with exactly this amount, in ledger order.
    pub fn lookup_by_amount(&self, amount: Decimal) -> Vec<&CandidateTransaction> {
        match self.by_amount.get(&amount) {
            Some(positions) => positions
                .iter()
                .filter(|&&pos| !self.consumed[pos])
                .map(|&pos| &self.candidates[pos])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Unconsumed candidates whose calendar day falls within `range`
    /// (inclusive both ends), ordered by ledger position.
    pub fn lookup_by_date_range(&self, range: DateRange) -> Vec<&CandidateTransaction> {
        let mut positions: Vec<usize> = range
            .start
            .iter_days()
            .take_while(|day| *day <= range.end)
            .filter_map(|day| self.by_date.get(&day))
            .flatten()
            .copied()
            .filter(|&pos| !self.consumed[pos])
            .collect();
        positions.sort_unstable();
        positions
            .into_iter()
            .map(|pos| &self.candidates[pos])
            .collect()
    }

    /// Marks the candidate unavailable for any future pairing. Idempotent:
    /// consuming an unknown or already-consumed id is a no-op.
    pub fn consume(&mut self, transaction_id: &str) {
        if let Some(&pos) = self.by_id.get(transaction_id) {
            self.consumed[pos] = true;
        }
    }

    pub fn is_consumed(&self, transaction_id: &str) -> bool {
        self.by_id
            .get(transaction_id)
            .map(|&pos| self.consumed[pos])
            .unwrap_or(false)
    }
}
