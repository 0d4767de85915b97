pub mod lunchmoney;
pub mod nvp;
pub mod paypal;
pub mod rates;

pub use lunchmoney::{LunchMoneyClient, LunchMoneyError};
pub use paypal::{PaypalClient, PaypalCredentials, PaypalError};
pub use rates::{RatesClient, RatesError};
