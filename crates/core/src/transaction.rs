use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::currency::CurrencyCode;
use super::money::Money;

/// Identifier of a transaction in the target (personal-finance) ledger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TargetId(pub i64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A record from the personal ledger awaiting reconciliation.
///
/// `amount` is always expressed in the ledger's base currency; the matching
/// engine never converts target amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetTransaction {
    pub id: TargetId,
    /// Posting date, no time-of-day.
    pub date: NaiveDate,
    pub amount: Money,
    pub payee: String,
    /// Raw bank string; marker filtering selects processor-funded rows by it.
    pub original_name: String,
    /// Record creation time; the engine processes targets newest-first by it.
    pub created_at: DateTime<Utc>,
}

/// A record from the payment processor's ledger, a potential match for some
/// target. Read-only to the matching engine; consumption is tracked in the
/// candidate index, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateTransaction {
    /// Globally unique within the candidate set.
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
    /// Signed, in `currency`.
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub payee_name: String,
    pub email: Option<String>,
    pub status: Option<String>,
}

impl CandidateTransaction {
    /// Calendar day of the payment event. Date windows and rate lookups are
    /// day-granular; intra-day time is discarded.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    pub fn is_base(&self, base: &CurrencyCode) -> bool {
        self.currency == *base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_date_discards_time_of_day() {
        let candidate = CandidateTransaction {
            transaction_id: "8XY12345".to_string(),
            timestamp: "2024-03-09T23:54:11Z".parse().unwrap(),
            amount: Decimal::from(45),
            currency: CurrencyCode::new("EUR"),
            payee_name: "Acme GmbH".to_string(),
            email: None,
            status: None,
        };
        assert_eq!(
            candidate.date(),
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
        );
    }

    #[test]
    fn is_base_compares_codes() {
        let candidate = CandidateTransaction {
            transaction_id: "8XY12345".to_string(),
            timestamp: "2024-03-09T12:00:00Z".parse().unwrap(),
            amount: Decimal::from(45),
            currency: CurrencyCode::new("usd"),
            payee_name: String::new(),
            email: None,
            status: None,
        };
        assert!(candidate.is_base(&CurrencyCode::new("USD")));
        assert!(!candidate.is_base(&CurrencyCode::new("EUR")));
    }

    #[test]
    fn target_id_display() {
        assert_eq!(TargetId(42).to_string(), "42");
    }
}
