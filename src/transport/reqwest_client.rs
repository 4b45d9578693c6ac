//! Reqwest-based implementation of the `HttpTransport` trait.
//!
//! Provides a thin adapter around `reqwest::Client` configured with the
//! browser-like defaults the gated endpoints expect: a desktop User-Agent,
//! a cookie store, and a bounded per-request timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use url::Url;

use super::{HttpTransport, TransportError, TransportResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Reqwest-backed transport used by the production workflow.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport with browser-like headers and no origin binding.
    pub fn new() -> Result<Self, TransportError> {
        Self::build(base_headers())
    }

    /// Creates a transport that also pins `Origin` and `Referer` to the
    /// given site, matching what the gated endpoints see from a real
    /// browser session.
    pub fn browser_like(origin: &Url) -> Result<Self, TransportError> {
        let mut headers = base_headers();

        let origin_value = origin_header_value(origin);
        if let Ok(value) = HeaderValue::from_str(&origin_value) {
            headers.insert(reqwest::header::ORIGIN, value);
        }
        if let Ok(value) = HeaderValue::from_str(origin.as_str()) {
            headers.insert(reqwest::header::REFERER, value);
        }

        Self::build(headers)
    }

    /// Wrap an existing reqwest client. The caller is responsible for any
    /// header or timeout defaults it wants applied.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn build(headers: HeaderMap) -> Result<Self, TransportError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|err| TransportError::Client(err.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &Url,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(url.as_str())
            .json(body)
            .send()
            .await
            .map_err(|err| TransportError::Request(err.to_string()))?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| TransportError::Request(err.to_string()))?;

        Ok(TransportResponse::new(status, bytes))
    }
}

fn base_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        HeaderValue::from_static(USER_AGENT),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers
}

fn origin_header_value(url: &Url) -> String {
    let scheme = url.scheme();
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{scheme}://{host}:{port}"),
        (Some(host), None) => format!("{scheme}://{host}"),
        (None, _) => url.as_str().trim_end_matches('/').to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_drops_path_and_keeps_port() {
        let url = Url::parse("https://www.example.com/landing").unwrap();
        assert_eq!(origin_header_value(&url), "https://www.example.com");

        let url = Url::parse("http://127.0.0.1:8080/x").unwrap();
        assert_eq!(origin_header_value(&url), "http://127.0.0.1:8080");
    }
}
