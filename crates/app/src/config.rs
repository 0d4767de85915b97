use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;

use settle_core::{CurrencyCode, DateRange, ReportingPeriod};
use settle_reconcile::DEFAULT_CAPACITY;

/// Runtime configuration, read from `settle.toml` in the data directory.
/// Secrets may be left out of the file and supplied through the environment
/// (`LUNCHMONEY_ACCESS_TOKEN`, `PAYPAL_NVP_USER`, `PAYPAL_NVP_PASSWORD`,
/// `PAYPAL_NVP_SIGNATURE`), which always wins over the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub lunchmoney_token: String,
    pub paypal_user: String,
    pub paypal_password: String,
    pub paypal_signature: String,

    /// Home currency of the target ledger; all target amounts are in it.
    pub base_currency: String,
    /// Substring of `original_name` selecting processor-funded targets.
    pub target_marker: String,
    /// Tag applied alongside the payee update.
    pub match_tag: String,
    /// When false, the run stops after reporting the plan.
    pub apply: bool,

    pub rate_cache_capacity: usize,

    /// Month to reconcile; defaults to the month before the current one.
    pub period: Option<PeriodConfig>,

    pub lunchmoney_api_base: Option<String>,
    pub paypal_endpoint: Option<String>,
    pub rates_api_base: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PeriodConfig {
    pub year: i32,
    pub month: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            lunchmoney_token: String::new(),
            paypal_user: String::new(),
            paypal_password: String::new(),
            paypal_signature: String::new(),
            base_currency: "USD".to_string(),
            target_marker: "PAYPAL TYPE: INST XFER".to_string(),
            match_tag: "paypal".to_string(),
            apply: false,
            rate_cache_capacity: DEFAULT_CAPACITY,
            period: None,
            lunchmoney_api_base: None,
            paypal_endpoint: None,
            rates_api_base: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("LUNCHMONEY_ACCESS_TOKEN") {
            self.lunchmoney_token = value;
        }
        if let Ok(value) = std::env::var("PAYPAL_NVP_USER") {
            self.paypal_user = value;
        }
        if let Ok(value) = std::env::var("PAYPAL_NVP_PASSWORD") {
            self.paypal_password = value;
        }
        if let Ok(value) = std::env::var("PAYPAL_NVP_SIGNATURE") {
            self.paypal_signature = value;
        }
    }

    pub fn base_currency(&self) -> CurrencyCode {
        CurrencyCode::new(&self.base_currency)
    }

    /// The reconciliation period: the configured month, or the full month
    /// before `today`.
    pub fn period(&self, today: NaiveDate) -> anyhow::Result<DateRange> {
        let period = match self.period {
            Some(PeriodConfig { year, month }) => ReportingPeriod::new(year, month)
                .with_context(|| format!("invalid period {year}-{month:02}"))?,
            None => ReportingPeriod::containing(today).previous(),
        };
        Ok(period.date_range())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_a_full_config() {
        let config: Config = toml::from_str(
            r#"
            lunchmoney_token = "lm-token"
            paypal_user = "api.merchant.example"
            paypal_password = "secret"
            paypal_signature = "sig"
            base_currency = "eur"
            target_marker = "PAYPAL"
            match_tag = "reconciled"
            apply = true
            rate_cache_capacity = 500

            [period]
            year = 2024
            month = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.base_currency(), CurrencyCode::new("EUR"));
        assert!(config.apply);
        assert_eq!(config.rate_cache_capacity, 500);
        let range = config.period(date(2024, 8, 7)).unwrap();
        assert_eq!(range.start, date(2024, 3, 1));
        assert_eq!(range.end, date(2024, 3, 31));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.base_currency, "USD");
        assert_eq!(config.target_marker, "PAYPAL TYPE: INST XFER");
        assert!(!config.apply);
        assert_eq!(config.rate_cache_capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn default_period_is_the_previous_month() {
        let config = Config::default();
        let range = config.period(date(2024, 3, 10)).unwrap();
        assert_eq!(range.start, date(2024, 2, 1));
        assert_eq!(range.end, date(2024, 2, 29));
    }

    #[test]
    fn invalid_period_is_rejected() {
        let config = Config {
            period: Some(PeriodConfig {
                year: 2024,
                month: 13,
            }),
            ..Config::default()
        };
        assert!(config.period(date(2024, 8, 7)).is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<Config>("no_such_option = 1").is_err());
    }
}
