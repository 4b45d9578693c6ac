//! Gatekeeper token acquisition.
//!
//! Exchanges a fingerprint and a solved Turnstile token for the short-lived
//! token pair that authorizes the carting request.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use url::Url;

use crate::captcha::CaptchaSolution;
use crate::fingerprint::Fingerprint;
use crate::transport::{HttpTransport, TransportError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatekeeperResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    gatekeeper_token: Option<String>,
    #[serde(default)]
    cart_token: Option<String>,
    #[serde(default)]
    ttl_minutes: Option<u32>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    release_id: Option<String>,
}

/// Short-lived token pair issued by the gatekeeper endpoint.
///
/// Expiry is reported as the service stated it; whether the tokens are still
/// honored at submission time is the downstream endpoint's decision.
#[derive(Debug, Clone, Serialize)]
pub struct GatekeeperCredential {
    pub gatekeeper_token: String,
    pub cart_token: String,
    pub ttl_minutes: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub release_id: Option<String>,
}

/// Errors surfaced while acquiring a credential.
#[derive(Debug, Error)]
pub enum GatekeeperError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed gatekeeper response: {0}")]
    Protocol(String),
    #[error("gatekeeper denied the request (status {status}): {body}")]
    Denied { status: u16, body: String },
}

/// Client for the gatekeeper token endpoint.
pub struct GatekeeperClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: Url,
    shop_domain: String,
    ttl_minutes: u32,
}

impl GatekeeperClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        endpoint: Url,
        shop_domain: impl Into<String>,
        ttl_minutes: u32,
    ) -> Self {
        Self {
            transport,
            endpoint,
            shop_domain: shop_domain.into(),
            ttl_minutes,
        }
    }

    /// Request a token pair scoped to the given variant.
    pub async fn acquire(
        &self,
        fingerprint: &Fingerprint,
        solution: &CaptchaSolution,
        variant_id: &str,
    ) -> Result<GatekeeperCredential, GatekeeperError> {
        let payload = json!({
            "shopDomain": self.shop_domain,
            "ttlMinutes": self.ttl_minutes,
            "turnstileToken": solution.token,
            "fingerprint": fingerprint.as_str(),
            "variantId": variant_id,
        });

        let response = self.transport.post_json(&self.endpoint, &payload).await?;
        if response.status() != 200 {
            return Err(GatekeeperError::Denied {
                status: response.status(),
                body: response.text(),
            });
        }

        let body: GatekeeperResponse = response
            .json()
            .map_err(|err| GatekeeperError::Protocol(format!("token response body: {err}")))?;

        if !body.success {
            return Err(GatekeeperError::Denied {
                status: 200,
                body: response.text(),
            });
        }

        let gatekeeper_token = body
            .gatekeeper_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| GatekeeperError::Protocol("missing gatekeeperToken".into()))?;
        let cart_token = body
            .cart_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| GatekeeperError::Protocol("missing cartToken".into()))?;

        log::debug!(
            "gatekeeper token issued (ttl {:?} min, release {:?})",
            body.ttl_minutes,
            body.release_id
        );

        Ok(GatekeeperCredential {
            gatekeeper_token,
            cart_token,
            ttl_minutes: body.ttl_minutes,
            expires_at: body.expires_at,
            release_id: body.release_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::fingerprint::FingerprintGenerator;
    use crate::transport::TransportResponse;

    struct ScriptedTransport {
        responses: Mutex<VecDeque<TransportResponse>>,
        bodies: Mutex<Vec<Value>>,
    }

    impl ScriptedTransport {
        fn with_status(status: u16, body: Value) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(VecDeque::from([TransportResponse::new(
                    status,
                    body.to_string().into_bytes(),
                )])),
                bodies: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn post_json(
            &self,
            _url: &Url,
            body: &Value,
        ) -> Result<TransportResponse, TransportError> {
            self.bodies.lock().unwrap().push(body.clone());
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected transport call"))
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> GatekeeperClient {
        GatekeeperClient::new(
            transport,
            Url::parse("https://gatekeeper.example.com/api/gatekeeper-token").unwrap(),
            "store-example.myshopify.com",
            10,
        )
    }

    fn issued_body() -> Value {
        serde_json::json!({
            "success": true,
            "gatekeeperToken": "gk-token",
            "cartToken": "cart-token",
            "ttlMinutes": 10,
            "expiresAt": "2025-06-01T12:00:00Z",
            "releaseId": "release-7"
        })
    }

    #[tokio::test]
    async fn acquire_parses_issued_credential() {
        let transport = ScriptedTransport::with_status(200, issued_body());
        let generator = FingerprintGenerator::new();
        let fingerprint = generator.generate();
        let solution = CaptchaSolution::new("turnstile-tok");

        let credential = client(transport.clone())
            .acquire(&fingerprint, &solution, "55041037336956")
            .await
            .expect("should issue");

        assert_eq!(credential.gatekeeper_token, "gk-token");
        assert_eq!(credential.cart_token, "cart-token");
        assert_eq!(credential.ttl_minutes, Some(10));
        assert_eq!(credential.release_id.as_deref(), Some("release-7"));

        let bodies = transport.bodies.lock().unwrap();
        assert_eq!(bodies[0]["shopDomain"], "store-example.myshopify.com");
        assert_eq!(bodies[0]["ttlMinutes"], 10);
        assert_eq!(bodies[0]["turnstileToken"], "turnstile-tok");
        assert_eq!(bodies[0]["fingerprint"], fingerprint.as_str());
        assert_eq!(bodies[0]["variantId"], "55041037336956");
    }

    #[tokio::test]
    async fn unsuccessful_body_is_denied_with_diagnostics() {
        let transport = ScriptedTransport::with_status(
            200,
            serde_json::json!({ "success": false, "reason": "token rejected" }),
        );
        let err = client(transport)
            .acquire(
                &FingerprintGenerator::new().generate(),
                &CaptchaSolution::new("tok"),
                "1",
            )
            .await
            .expect_err("should deny");

        match err {
            GatekeeperError::Denied { status, body } => {
                assert_eq!(status, 200);
                assert!(body.contains("token rejected"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_200_is_denied_with_status() {
        let transport =
            ScriptedTransport::with_status(403, serde_json::json!({ "error": "blocked" }));
        let err = client(transport)
            .acquire(
                &FingerprintGenerator::new().generate(),
                &CaptchaSolution::new("tok"),
                "1",
            )
            .await
            .expect_err("should deny");
        assert!(matches!(err, GatekeeperError::Denied { status: 403, .. }));
    }

    #[tokio::test]
    async fn success_without_tokens_is_a_protocol_error() {
        let transport = ScriptedTransport::with_status(
            200,
            serde_json::json!({ "success": true, "cartToken": "cart-token" }),
        );
        let err = client(transport)
            .acquire(
                &FingerprintGenerator::new().generate(),
                &CaptchaSolution::new("tok"),
                "1",
            )
            .await
            .expect_err("should fail");
        assert!(matches!(err, GatekeeperError::Protocol(_)));
    }
}
