use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use settle_core::{DateRange, TargetId, TargetTransaction};

pub const DEFAULT_API_BASE: &str = "https://dev.lunchmoney.app";

#[derive(Error, Debug)]
pub enum LunchMoneyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transaction {id} has an invalid amount: {value}")]
    InvalidAmount { id: i64, value: String },
}

#[derive(Debug, Deserialize)]
struct TransactionsEnvelope {
    transactions: Vec<TransactionDto>,
}

#[derive(Debug, Deserialize)]
struct TransactionDto {
    id: i64,
    date: NaiveDate,
    /// The API serialises amounts as decimal strings ("50.0000").
    amount: String,
    payee: Option<String>,
    original_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl TransactionDto {
    fn into_target(self) -> Result<TargetTransaction, LunchMoneyError> {
        let amount = self
            .amount
            .parse()
            .map_err(|_| LunchMoneyError::InvalidAmount {
                id: self.id,
                value: self.amount.clone(),
            })?;
        Ok(TargetTransaction {
            id: TargetId(self.id),
            date: self.date,
            amount,
            payee: self.payee.unwrap_or_default(),
            original_name: self.original_name.unwrap_or_default(),
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Serialize)]
struct UpdateEnvelope<'a> {
    transaction: UpdateFields<'a>,
}

#[derive(Debug, Serialize)]
struct UpdateFields<'a> {
    payee: &'a str,
    tags: &'a [String],
}

/// Client for the target (personal-finance) ledger API.
pub struct LunchMoneyClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl LunchMoneyClient {
    pub fn new(token: &str) -> Self {
        Self::with_api_base(DEFAULT_API_BASE, token)
    }

    pub fn with_api_base(api_base: &str, token: &str) -> Self {
        LunchMoneyClient {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// All target transactions within the period, in ledger order.
    pub async fn transactions(
        &self,
        period: DateRange,
    ) -> Result<Vec<TargetTransaction>, LunchMoneyError> {
        let response = self
            .http
            .get(format!("{}/v1/transactions", self.api_base))
            .bearer_auth(&self.token)
            .query(&[
                ("start_date", period.start.to_string()),
                ("end_date", period.end.to_string()),
                // Cleared transactions were already reconciled.
                ("status", "uncleared".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LunchMoneyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: TransactionsEnvelope = response.json().await?;
        debug!(
            count = envelope.transactions.len(),
            "fetched target transactions"
        );
        envelope
            .transactions
            .into_iter()
            .map(TransactionDto::into_target)
            .collect()
    }

    /// Applies a payee + tags update to one transaction.
    pub async fn update_transaction(
        &self,
        id: TargetId,
        payee: &str,
        tags: &[String],
    ) -> Result<(), LunchMoneyError> {
        let response = self
            .http
            .put(format!("{}/v1/transactions/{}", self.api_base, id))
            .bearer_auth(&self.token)
            .json(&UpdateEnvelope {
                transaction: UpdateFields { payee, tags },
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LunchMoneyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(target = %id, "applied update");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settle_core::Money;
    use std::str::FromStr;

    const SAMPLE: &str = r#"{
        "transactions": [
            {
                "id": 602554,
                "date": "2024-03-10",
                "amount": "50.0000",
                "currency": "usd",
                "payee": "PayPal",
                "original_name": "PAYPAL TYPE: INST XFER",
                "status": "uncleared",
                "created_at": "2024-03-11T04:22:10.000Z"
            },
            {
                "id": 602555,
                "date": "2024-03-12",
                "amount": "-20.5000",
                "payee": null,
                "original_name": null,
                "created_at": "2024-03-13T04:22:10.000Z"
            }
        ]
    }"#;

    #[test]
    fn deserializes_the_transactions_envelope() {
        let envelope: TransactionsEnvelope = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(envelope.transactions.len(), 2);
        assert_eq!(envelope.transactions[0].id, 602554);
        assert_eq!(envelope.transactions[0].amount, "50.0000");
    }

    #[test]
    fn dto_converts_to_target_transaction() {
        let envelope: TransactionsEnvelope = serde_json::from_str(SAMPLE).unwrap();
        let target = envelope
            .transactions
            .into_iter()
            .next()
            .unwrap()
            .into_target()
            .unwrap();

        assert_eq!(target.id, TargetId(602554));
        assert_eq!(target.amount, Money::from_str("50.00").unwrap());
        assert_eq!(target.original_name, "PAYPAL TYPE: INST XFER");
        assert_eq!(
            target.date,
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
        );
    }

    #[test]
    fn missing_optional_fields_become_empty_strings() {
        let envelope: TransactionsEnvelope = serde_json::from_str(SAMPLE).unwrap();
        let target = envelope
            .transactions
            .into_iter()
            .nth(1)
            .unwrap()
            .into_target()
            .unwrap();
        assert_eq!(target.payee, "");
        assert_eq!(target.original_name, "");
    }

    #[test]
    fn bad_amount_is_an_error() {
        let dto = TransactionDto {
            id: 1,
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            amount: "not-a-number".to_string(),
            payee: None,
            original_name: None,
            created_at: Utc::now(),
        };
        assert!(matches!(
            dto.into_target(),
            Err(LunchMoneyError::InvalidAmount { id: 1, .. })
        ));
    }

    #[test]
    fn update_envelope_shape() {
        let tags = vec!["paypal".to_string()];
        let envelope = UpdateEnvelope {
            transaction: UpdateFields {
                payee: "Acme GmbH",
                tags: &tags,
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["transaction"]["payee"], "Acme GmbH");
        assert_eq!(json["transaction"]["tags"][0], "paypal");
    }
}
