//! Carting of a gated variant.
//!
//! One privileged `cart/add` request authorized by a previously issued
//! gatekeeper token. A single attempt per workflow run; a rejected cart does
//! not invalidate the credential that authorized it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use url::Url;

use crate::gatekeeper::GatekeeperCredential;
use crate::transport::{HttpTransport, TransportError};

#[derive(Debug, Deserialize)]
struct CartResponse {
    items: Option<Vec<serde_json::Value>>,
    total_price: Option<i64>,
}

/// Confirmation extracted from a successful cart response.
#[derive(Debug, Clone, Serialize)]
pub struct CartConfirmation {
    pub item_count: usize,
    pub total_price: Option<i64>,
}

/// Errors surfaced while carting.
#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed cart response: {0}")]
    Protocol(String),
    #[error("cart request rejected (status {status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Client for the cart endpoint.
pub struct CartClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: Url,
}

impl CartClient {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoint: Url) -> Self {
        Self {
            transport,
            endpoint,
        }
    }

    /// Add the variant to the cart using the credential's gatekeeper token.
    pub async fn submit(
        &self,
        credential: &GatekeeperCredential,
        variant_id: &str,
        quantity: u32,
    ) -> Result<CartConfirmation, CartError> {
        let payload = json!({
            "id": variant_id,
            "quantity": quantity,
            "properties": {},
            "gatekeeper_token": credential.gatekeeper_token,
        });

        let response = self.transport.post_json(&self.endpoint, &payload).await?;
        if response.status() != 200 {
            return Err(CartError::Rejected {
                status: response.status(),
                body: response.text(),
            });
        }

        let body: CartResponse = response
            .json()
            .map_err(|err| CartError::Protocol(format!("cart response body: {err}")))?;

        let items = body.items.ok_or(CartError::Rejected {
            status: 200,
            body: response.text(),
        })?;

        log::debug!(
            "cart accepted {} item(s), total {:?}",
            items.len(),
            body.total_price
        );

        Ok(CartConfirmation {
            item_count: items.len(),
            total_price: body.total_price,
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

    fn credential() -> GatekeeperCredential {
        GatekeeperCredential {
            gatekeeper_token: "gk-token".into(),
            cart_token: "cart-token".into(),
            ttl_minutes: Some(10),
            expires_at: None,
            release_id: None,
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> CartClient {
        CartClient::new(
            transport,
            Url::parse("https://www.example.com/cart/add.js").unwrap(),
        )
    }

    #[tokio::test]
    async fn submit_sends_gatekeeper_token_and_parses_items() {
        let transport = ScriptedTransport::with_status(
            200,
            serde_json::json!({ "items": [{ "id": 1 }], "total_price": 12999 }),
        );

        let confirmation = client(transport.clone())
            .submit(&credential(), "55041037336956", 2)
            .await
            .expect("should cart");

        assert_eq!(confirmation.item_count, 1);
        assert_eq!(confirmation.total_price, Some(12999));

        let bodies = transport.bodies.lock().unwrap();
        assert_eq!(bodies[0]["id"], "55041037336956");
        assert_eq!(bodies[0]["quantity"], 2);
        assert_eq!(bodies[0]["gatekeeper_token"], "gk-token");
        assert_eq!(bodies[0]["properties"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn missing_items_collection_is_rejected() {
        let transport = ScriptedTransport::with_status(
            200,
            serde_json::json!({ "description": "sold out" }),
        );
        let err = client(transport)
            .submit(&credential(), "1", 1)
            .await
            .expect_err("should reject");

        match err {
            CartError::Rejected { status, body } => {
                assert_eq!(status, 200);
                assert!(body.contains("sold out"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_200_is_rejected_with_status() {
        let transport = ScriptedTransport::with_status(422, serde_json::json!({ "error": "nope" }));
        let err = client(transport)
            .submit(&credential(), "1", 1)
            .await
            .expect_err("should reject");
        assert!(matches!(err, CartError::Rejected { status: 422, .. }));
    }
}
