//! HTTP transport to DoH providers.

use crate::{ResolverConfig, ResolverError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use fetchdns_proto::json::DNS_JSON_MIME;
use fetchdns_proto::DohMessage;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use tracing::trace;
use url::Url;

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Bytes,
}

impl TransportResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as a DNS JSON message.
    pub fn json(&self) -> Result<DohMessage> {
        DohMessage::from_slice(&self.body).map_err(|e| ResolverError::Protocol(e.to_string()))
    }
}

/// Issues DoH queries.
///
/// Any HTTP response, successful or not, is `Ok`. Only failures that produce
/// no response at all are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a GET request to `url`.
    async fn fetch(&self, url: &Url) -> Result<TransportResponse>;
}

/// Transport backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with the timeout and user agent from `config`.
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(DNS_JSON_MIME));

        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| concat!("fetchdns/", env!("CARGO_PKG_VERSION")).to_string());

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    /// Creates a transport with a custom client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url) -> Result<TransportResponse> {
        trace!(url = %url, "Sending DoH request");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_success_range() {
        assert!(TransportResponse::new(200, "{}").is_success());
        assert!(TransportResponse::new(204, "").is_success());
        assert!(!TransportResponse::new(302, "").is_success());
        assert!(!TransportResponse::new(503, "").is_success());
    }

    #[test]
    fn test_json_body() {
        let response = TransportResponse::new(
            200,
            r#"{"Status":0,"Answer":[{"name":"example.com.","type":1,"TTL":60,"data":"192.0.2.1"}]}"#,
        );
        let message = response.json().unwrap();
        assert_eq!(message.answer.len(), 1);
        assert_eq!(message.answer[0].data, "192.0.2.1");

        assert!(matches!(
            TransportResponse::new(200, "<html>").json(),
            Err(ResolverError::Protocol(_))
        ));
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(&ResolverConfig::default()).is_ok());

        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::with_client(reqwest::Client::new()));
        assert_eq!(Arc::strong_count(&transport), 1);
    }
}
