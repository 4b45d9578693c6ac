//! HTTP transport abstraction.
//!
//! Every network-facing client in the crate talks through the
//! [`HttpTransport`] trait instead of a concrete HTTP library. This keeps the
//! solving/token/cart clients testable with scripted doubles while production
//! code plugs in the reqwest-backed implementation.

mod reqwest_client;

pub use reqwest_client::ReqwestTransport;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

/// Raw response captured from a transport call.
///
/// Only the pieces the JSON protocols in this crate actually consume are
/// kept: the status code and the body bytes.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    status: u16,
    body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// HTTP status code of the response.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Raw body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Body as lossy UTF-8 text, mainly for diagnostics.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Errors surfaced by transport implementations.
///
/// Concrete transport errors are stringified at this boundary so doubles and
/// alternative backends do not need to fabricate library-specific error
/// values.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build http client: {0}")]
    Client(String),
    #[error("request failed: {0}")]
    Request(String),
}

/// Shared interface implemented by HTTP transports.
///
/// Implementations must tolerate concurrent use from independent workflow
/// runs without additional locking.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a JSON `POST` and return the raw response regardless of status.
    async fn post_json(
        &self,
        url: &Url,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError>;
}
