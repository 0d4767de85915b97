use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use settle_core::{CandidateTransaction, CurrencyCode, DateRange};

use crate::nvp::{self, NvpError};

pub const DEFAULT_ENDPOINT: &str = "https://api-3t.paypal.com/nvp";
const NVP_VERSION: &str = "204";

#[derive(Debug, Clone)]
pub struct PaypalCredentials {
    pub user: String,
    pub password: String,
    pub signature: String,
}

#[derive(Error, Debug)]
pub enum PaypalError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("NVP decode error: {0}")]
    Nvp(#[from] NvpError),
    #[error("{ack}: {message}")]
    Failed { ack: String, message: String },
    #[error("transaction row {index} is missing {field}")]
    MissingField { index: usize, field: &'static str },
    #[error("transaction row {index} has an invalid {field}: {value}")]
    InvalidField {
        index: usize,
        field: &'static str,
        value: String,
    },
}

/// Client for the payment processor's transaction-search API.
pub struct PaypalClient {
    http: reqwest::Client,
    endpoint: String,
    credentials: PaypalCredentials,
}

impl PaypalClient {
    pub fn new(credentials: PaypalCredentials) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, credentials)
    }

    pub fn with_endpoint(endpoint: &str, credentials: PaypalCredentials) -> Self {
        PaypalClient {
            http: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            credentials,
        }
    }

    /// `TransactionSearch` over the period. Candidates come back in the
    /// order the processor returned them; that order is the ledger order
    /// the matching engine uses for tie-breaking.
    pub async fn transaction_search(
        &self,
        period: DateRange,
    ) -> Result<Vec<CandidateTransaction>, PaypalError> {
        let start = format!("{}T00:00:00Z", period.start);
        let end = format!("{}T23:59:59Z", period.end);

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("USER", self.credentials.user.as_str()),
                ("PWD", self.credentials.password.as_str()),
                ("SIGNATURE", self.credentials.signature.as_str()),
                ("VERSION", NVP_VERSION),
                ("METHOD", "TransactionSearch"),
                ("STARTDATE", start.as_str()),
                ("ENDDATE", end.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PaypalError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let decoded = nvp::parse(&body)?;
        match decoded.field("ACK") {
            Some("Success") | Some("SuccessWithWarning") => {}
            ack => {
                return Err(PaypalError::Failed {
                    ack: ack.unwrap_or("missing ACK").to_string(),
                    message: decoded
                        .field("L_LONGMESSAGE0")
                        .unwrap_or_default()
                        .to_string(),
                });
            }
        }

        debug!(count = decoded.rows.len(), "fetched candidate transactions");
        decoded
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| row_to_candidate(index, row))
            .collect()
    }
}

/// A row missing its id, timestamp, amount, or currency is an error rather
/// than a skip: a silently dropped candidate corrupts reconciliation.
fn row_to_candidate(
    index: usize,
    row: &HashMap<String, String>,
) -> Result<CandidateTransaction, PaypalError> {
    let required = |field: &'static str| {
        row.get(field)
            .ok_or(PaypalError::MissingField { index, field })
    };

    let transaction_id = required("L_TRANSACTIONID")?.clone();

    let raw_timestamp = required("L_TIMESTAMP")?;
    let timestamp = DateTime::parse_from_rfc3339(raw_timestamp)
        .map_err(|_| PaypalError::InvalidField {
            index,
            field: "L_TIMESTAMP",
            value: raw_timestamp.clone(),
        })?
        .with_timezone(&Utc);

    let raw_amount = required("L_AMT")?;
    let amount = raw_amount
        .parse()
        .map_err(|_| PaypalError::InvalidField {
            index,
            field: "L_AMT",
            value: raw_amount.clone(),
        })?;

    let currency = CurrencyCode::new(required("L_CURRENCYCODE")?);

    Ok(CandidateTransaction {
        transaction_id,
        timestamp,
        amount,
        currency,
        payee_name: row.get("L_NAME").cloned().unwrap_or_default(),
        email: row.get("L_EMAIL").cloned(),
        status: row.get("L_STATUS").cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_row() -> HashMap<String, String> {
        row(&[
            ("L_TRANSACTIONID", "8XY12345AB6789012"),
            ("L_TIMESTAMP", "2024-03-09T19:12:45Z"),
            ("L_AMT", "-45.00"),
            ("L_CURRENCYCODE", "EUR"),
            ("L_NAME", "Acme GmbH"),
            ("L_EMAIL", "shop@acme.example"),
            ("L_STATUS", "Completed"),
        ])
    }

    #[test]
    fn maps_a_complete_row() {
        let candidate = row_to_candidate(0, &full_row()).unwrap();
        assert_eq!(candidate.transaction_id, "8XY12345AB6789012");
        assert_eq!(candidate.amount, Decimal::from_str("-45.00").unwrap());
        assert_eq!(candidate.currency, CurrencyCode::new("EUR"));
        assert_eq!(candidate.payee_name, "Acme GmbH");
        assert_eq!(candidate.email.as_deref(), Some("shop@acme.example"));
        assert_eq!(candidate.status.as_deref(), Some("Completed"));
        assert_eq!(
            candidate.date(),
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
        );
    }

    #[test]
    fn missing_transaction_id_is_an_error() {
        let mut incomplete = full_row();
        incomplete.remove("L_TRANSACTIONID");
        assert!(matches!(
            row_to_candidate(3, &incomplete),
            Err(PaypalError::MissingField {
                index: 3,
                field: "L_TRANSACTIONID"
            })
        ));
    }

    #[test]
    fn invalid_timestamp_is_an_error() {
        let mut bad = full_row();
        bad.insert("L_TIMESTAMP".to_string(), "yesterday".to_string());
        assert!(matches!(
            row_to_candidate(0, &bad),
            Err(PaypalError::InvalidField {
                field: "L_TIMESTAMP",
                ..
            })
        ));
    }

    #[test]
    fn invalid_amount_is_an_error() {
        let mut bad = full_row();
        bad.insert("L_AMT".to_string(), "forty-five".to_string());
        assert!(matches!(
            row_to_candidate(0, &bad),
            Err(PaypalError::InvalidField { field: "L_AMT", .. })
        ));
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let minimal = row(&[
            ("L_TRANSACTIONID", "3ZZ98765CD4321098"),
            ("L_TIMESTAMP", "2024-03-09T19:12:45Z"),
            ("L_AMT", "-50.00"),
            ("L_CURRENCYCODE", "USD"),
        ]);
        let candidate = row_to_candidate(0, &minimal).unwrap();
        assert_eq!(candidate.payee_name, "");
        assert!(candidate.email.is_none());
        assert!(candidate.status.is_none());
    }
}
