//! `application/dns-json` response bodies.
//!
//! Providers agree on the `Answer` array and its `data` strings; everything
//! else is optional and tolerated when absent or malformed.

use crate::error::Result;
use crate::DEFAULT_TTL_SECS;
use serde::{Deserialize, Serialize};

/// MIME type requested from DoH providers.
pub const DNS_JSON_MIME: &str = "application/dns-json";

/// A DNS JSON response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DohMessage {
    /// DNS response code, when the provider reports one.
    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Answer section. Absent means no answers.
    #[serde(rename = "Answer", default)]
    pub answer: Vec<DohAnswer>,
}

impl DohMessage {
    /// Decodes a response body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// One answer of a DNS JSON response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DohAnswer {
    /// Owner name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Numeric record type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub rtype: Option<u16>,

    /// TTL as sent; kept loose because providers are not consistent.
    #[serde(rename = "TTL", default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<serde_json::Value>,

    /// RDATA in presentation format.
    #[serde(default)]
    pub data: String,
}

impl DohAnswer {
    /// Creates an answer with the given type code, TTL and data.
    pub fn new(rtype: u16, ttl: u32, data: impl Into<String>) -> Self {
        Self {
            name: None,
            rtype: Some(rtype),
            ttl: Some(ttl.into()),
            data: data.into(),
        }
    }

    /// Returns the answer's TTL in seconds, or `default` when the provider's
    /// value is missing or not a non-negative finite number.
    pub fn ttl_or(&self, default: u32) -> u32 {
        self.ttl
            .as_ref()
            .and_then(|v| {
                v.as_u64()
                    .or_else(|| v.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            })
            .map(|ttl| u32::try_from(ttl).unwrap_or(u32::MAX))
            .unwrap_or(default)
    }

    /// Returns the answer's TTL, falling back to [`DEFAULT_TTL_SECS`].
    pub fn ttl(&self) -> u32 {
        self.ttl_or(DEFAULT_TTL_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_google_shape() {
        let body = br#"{
            "Status": 0, "TC": false, "RD": true, "RA": true, "AD": false, "CD": false,
            "Question": [{"name": "example.com.", "type": 1}],
            "Answer": [{"name": "example.com.", "type": 1, "TTL": 3477, "data": "93.184.216.34"}]
        }"#;
        let message = DohMessage::from_slice(body).unwrap();
        assert_eq!(message.status, Some(0));
        assert_eq!(message.answer.len(), 1);
        assert_eq!(message.answer[0].rtype, Some(1));
        assert_eq!(message.answer[0].ttl(), 3477);
        assert_eq!(message.answer[0].data, "93.184.216.34");
    }

    #[test]
    fn test_missing_answer_is_empty() {
        let message = DohMessage::from_slice(br#"{"Status": 3}"#).unwrap();
        assert!(message.answer.is_empty());
    }

    #[test]
    fn test_ttl_fallback() {
        let answer: DohAnswer = serde_json::from_str(r#"{"data": "x", "TTL": "soon"}"#).unwrap();
        assert_eq!(answer.ttl(), DEFAULT_TTL_SECS);

        let answer: DohAnswer = serde_json::from_str(r#"{"data": "x"}"#).unwrap();
        assert_eq!(answer.ttl_or(60), 60);

        let answer: DohAnswer = serde_json::from_str(r#"{"data": "x", "TTL": -5}"#).unwrap();
        assert_eq!(answer.ttl_or(60), 60);

        let answer: DohAnswer = serde_json::from_str(r#"{"data": "x", "TTL": 0}"#).unwrap();
        assert_eq!(answer.ttl_or(60), 0);
    }

    #[test]
    fn test_malformed_body() {
        assert!(DohMessage::from_slice(b"<html>").is_err());
    }
}
