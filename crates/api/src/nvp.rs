use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// The per-transaction fields a `TransactionSearch` response spreads across
/// indexed keys.
const ROW_FIELDS: [&str; 11] = [
    "L_TIMESTAMP",
    "L_TIMEZONE",
    "L_TYPE",
    "L_EMAIL",
    "L_NAME",
    "L_TRANSACTIONID",
    "L_STATUS",
    "L_AMT",
    "L_CURRENCYCODE",
    "L_FEEAMT",
    "L_NETAMT",
];

#[derive(Error, Debug, PartialEq)]
pub enum NvpError {
    #[error("malformed NVP pair: {0}")]
    MalformedPair(String),
    #[error("invalid percent-encoding: {0}")]
    InvalidEncoding(String),
}

/// A decoded NVP response: scalar fields plus the indexed `L_*n` keys
/// regrouped into per-transaction rows.
#[derive(Debug, Default)]
pub struct NvpResponse {
    pub fields: HashMap<String, String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl NvpResponse {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

fn row_field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!("^({})(\\d+)$", ROW_FIELDS.join("|"));
        Regex::new(&pattern).unwrap()
    })
}

/// Decodes an NVP (name-value pair) response body: URL-encoded pairs where
/// list results arrive as indexed scalar keys (`L_AMT0`, `L_AMT1`, ...)
/// that are regrouped into per-transaction rows.
pub fn parse(body: &str) -> Result<NvpResponse, NvpError> {
    let mut response = NvpResponse::default();

    for pair in body.trim().split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| NvpError::MalformedPair(pair.to_string()))?;
        let key = percent_decode(key)?;
        let value = percent_decode(value)?;

        match split_row_key(&key) {
            Some((field, index)) => {
                if response.rows.len() <= index {
                    response.rows.resize_with(index + 1, HashMap::new);
                }
                response.rows[index].insert(field, value);
            }
            None => {
                response.fields.insert(key, value);
            }
        }
    }

    Ok(response)
}

/// Splits `L_AMT12` into (`L_AMT`, 12); `None` for keys that are not an
/// indexed transaction field (an index too large for usize included).
fn split_row_key(key: &str) -> Option<(String, usize)> {
    let captures = row_field_regex().captures(key)?;
    let index = captures[2].parse().ok()?;
    Some((captures[1].to_string(), index))
}

fn percent_decode(s: &str) -> Result<String, NvpError> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .ok_or_else(|| NvpError::InvalidEncoding(s.to_string()))?;
                let high = hex_value(hex[0]);
                let low = hex_value(hex[1]);
                match (high, low) {
                    (Some(high), Some(low)) => out.push(high << 4 | low),
                    _ => return Err(NvpError::InvalidEncoding(s.to_string())),
                }
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }

    String::from_utf8(out).map_err(|_| NvpError::InvalidEncoding(s.to_string()))
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── percent decoding ──────────────────────────────────────────────────────

    #[test]
    fn decodes_percent_escapes() {
        assert_eq!(percent_decode("a%2Fb").unwrap(), "a/b");
        assert_eq!(percent_decode("50%2E00").unwrap(), "50.00");
    }

    #[test]
    fn decodes_plus_as_space() {
        assert_eq!(percent_decode("Acme+GmbH").unwrap(), "Acme GmbH");
    }

    #[test]
    fn rejects_truncated_escape() {
        assert!(percent_decode("abc%2").is_err());
        assert!(percent_decode("abc%").is_err());
    }

    #[test]
    fn rejects_non_hex_escape() {
        assert!(percent_decode("abc%zz").is_err());
    }

    // ── response parsing ──────────────────────────────────────────────────────

    const SAMPLE: &str = "TIMESTAMP=2024%2D04%2D01T10%3A00%3A00Z&ACK=Success&VERSION=204&BUILD=58000000\
&L_TIMESTAMP0=2024%2D03%2D11T08%3A30%3A00Z&L_TYPE0=Payment&L_EMAIL0=shop%40acme.example\
&L_NAME0=Acme+GmbH&L_TRANSACTIONID0=8XY12345AB6789012&L_STATUS0=Completed&L_AMT0=-45.00\
&L_CURRENCYCODE0=EUR&L_FEEAMT0=-1.20&L_NETAMT0=-46.20\
&L_TIMESTAMP1=2024%2D03%2D09T19%3A12%3A45Z&L_TYPE1=Payment&L_NAME1=Globex\
&L_TRANSACTIONID1=3ZZ98765CD4321098&L_STATUS1=Completed&L_AMT1=-50.00&L_CURRENCYCODE1=USD";

    #[test]
    fn parses_scalar_fields() {
        let response = parse(SAMPLE).unwrap();
        assert_eq!(response.field("ACK"), Some("Success"));
        assert_eq!(response.field("VERSION"), Some("204"));
        assert_eq!(response.field("TIMESTAMP"), Some("2024-04-01T10:00:00Z"));
    }

    #[test]
    fn regroups_indexed_keys_into_rows() {
        let response = parse(SAMPLE).unwrap();
        assert_eq!(response.rows.len(), 2);

        let first = &response.rows[0];
        assert_eq!(first["L_TRANSACTIONID"], "8XY12345AB6789012");
        assert_eq!(first["L_NAME"], "Acme GmbH");
        assert_eq!(first["L_AMT"], "-45.00");
        assert_eq!(first["L_CURRENCYCODE"], "EUR");
        assert_eq!(first["L_EMAIL"], "shop@acme.example");

        let second = &response.rows[1];
        assert_eq!(second["L_TRANSACTIONID"], "3ZZ98765CD4321098");
        assert!(second.get("L_EMAIL").is_none());
    }

    #[test]
    fn unknown_indexed_keys_stay_scalar() {
        // Only the known transaction fields are regrouped.
        let response = parse("L_ERRORCODE0=10001&ACK=Failure").unwrap();
        assert!(response.rows.is_empty());
        assert_eq!(response.field("L_ERRORCODE0"), Some("10001"));
    }

    #[test]
    fn empty_body_gives_empty_response() {
        let response = parse("").unwrap();
        assert!(response.fields.is_empty());
        assert!(response.rows.is_empty());
    }

    #[test]
    fn pair_without_separator_is_an_error() {
        assert_eq!(
            parse("ACK").unwrap_err(),
            NvpError::MalformedPair("ACK".to_string())
        );
    }

    #[test]
    fn sparse_row_indexes_leave_gaps() {
        let response = parse("L_AMT2=1.00&ACK=Success").unwrap();
        assert_eq!(response.rows.len(), 3);
        assert!(response.rows[0].is_empty());
        assert_eq!(response.rows[2]["L_AMT"], "1.00");
    }
}
