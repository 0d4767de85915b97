use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use settle_core::CurrencyCode;

pub const DEFAULT_API_BASE: &str = "https://api.frankfurter.dev/v1";

#[derive(Error, Debug)]
pub enum RatesError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("no historical rate for {currency} on {date}")]
    Unavailable {
        date: NaiveDate,
        currency: CurrencyCode,
    },
}

#[derive(Debug, Deserialize)]
struct RatesEnvelope {
    rates: HashMap<String, Decimal>,
}

/// Client for the historical exchange-rate API. Rates are quoted as units
/// of the requested currency per one base unit, so converting a foreign
/// amount to base divides by the rate.
#[derive(Clone)]
pub struct RatesClient {
    http: reqwest::Client,
    api_base: String,
}

impl RatesClient {
    pub fn new() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    pub fn with_api_base(api_base: &str) -> Self {
        RatesClient {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// The rate for `currency` against `base` on `date`.
    ///
    /// A date or symbol the upstream does not cover is `Unavailable`, never
    /// a defaulted rate; the caller decides whether to exclude or abort.
    pub async fn rate_on(
        &self,
        date: NaiveDate,
        base: &CurrencyCode,
        currency: &CurrencyCode,
    ) -> Result<Decimal, RatesError> {
        let response = self
            .http
            .get(format!("{}/{}", self.api_base, date))
            .query(&[("base", base.as_str()), ("symbols", currency.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(RatesError::Unavailable {
                date,
                currency: currency.clone(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RatesError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: RatesEnvelope = response.json().await?;
        match envelope.rates.get(currency.as_str()) {
            // A zero rate would divide to infinity downstream; treat it the
            // same as a missing one.
            Some(rate) if !rate.is_zero() => {
                debug!(%date, %currency, %rate, "fetched historical rate");
                Ok(*rate)
            }
            _ => Err(RatesError::Unavailable {
                date,
                currency: currency.clone(),
            }),
        }
    }
}

impl Default for RatesClient {
    fn default() -> Self {
        Self::new()
    }
}
