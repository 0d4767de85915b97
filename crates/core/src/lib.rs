pub mod currency;
pub mod money;
pub mod period;
pub mod transaction;

pub use currency::CurrencyCode;
pub use money::Money;
pub use period::{DateRange, ReportingPeriod};
pub use transaction::{CandidateTransaction, TargetId, TargetTransaction};
