//! HTTP payment gateway implementation.
//!
//! Talks to the external processor's REST API with a bounded-timeout
//! `reqwest` client. No retries happen here; callers own retry policy, and
//! a timed-out call surfaces as an error rather than an assumed success.

use crate::config::GatewayConfig;
use crate::error::{MarketError, Result};
use crate::providers::gateway::{
    Authorization, AuthorizationRequest, Capture, PaymentGateway, PaymentIntent, PaymentOutcome,
    Transfer,
};
use crate::types::{Money, PurchaseId};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// REST client for the external payment processor.
#[derive(Clone)]
pub struct RestPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct AuthorizationResponse {
    id: String,
    #[serde(default)]
    split_configured: bool,
}

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    id: String,
    status: String,
    #[serde(default)]
    split_configured: bool,
}

#[derive(Debug, Deserialize)]
struct TransferResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentResponse {
    id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct PaymentStatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: String,
}

impl RestPaymentGateway {
    /// Build a gateway client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` when the HTTP client cannot be constructed.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| MarketError::GatewayError {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn error_reason(response: reqwest::Response) -> String {
        let status = response.status();
        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.message)
            .unwrap_or_default();
        if message.is_empty() {
            format!("processor returned {status}")
        } else {
            format!("processor returned {status}: {message}")
        }
    }
}

impl PaymentGateway for RestPaymentGateway {
    async fn authorize_and_hold(&self, request: AuthorizationRequest) -> Result<Authorization> {
        let body = json!({
            "amount": request.amount.minor(),
            "customer": request.buyer_ref,
            "payment_method": request.payment_method_id,
            "destination": request.seller_account,
            "application_fee": request.platform_fee.minor(),
            "capture_method": "manual",
            "metadata": request.metadata,
        });

        let response = self
            .client
            .post(self.url("/v1/authorizations"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MarketError::PaymentAuthorizationFailed {
                reason: format!("authorization request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(MarketError::PaymentAuthorizationFailed {
                reason: Self::error_reason(response).await,
            });
        }

        let parsed: AuthorizationResponse =
            response
                .json()
                .await
                .map_err(|e| MarketError::PaymentAuthorizationFailed {
                    reason: format!("malformed authorization response: {e}"),
                })?;

        tracing::info!(
            authorization = %parsed.id,
            amount = request.amount.minor(),
            "authorization hold placed"
        );

        Ok(Authorization {
            reference: parsed.id,
            split_configured: parsed.split_configured,
        })
    }

    async fn capture(&self, authorization_ref: &str, idempotency_key: &str) -> Result<Capture> {
        let response = self
            .client
            .post(self.url(&format!("/v1/authorizations/{authorization_ref}/capture")))
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", idempotency_key)
            .send()
            .await
            .map_err(|e| MarketError::CaptureFailed {
                reason: format!("capture request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(MarketError::CaptureFailed {
                reason: Self::error_reason(response).await,
            });
        }

        let parsed: CaptureResponse =
            response.json().await.map_err(|e| MarketError::CaptureFailed {
                reason: format!("malformed capture response: {e}"),
            })?;

        match parsed.status.as_str() {
            "succeeded" => Ok(Capture {
                reference: parsed.id,
                split_configured: parsed.split_configured,
                already_captured: false,
            }),
            // Terminal success from an earlier attempt: idempotent success.
            "already_captured" => Ok(Capture {
                reference: parsed.id,
                split_configured: parsed.split_configured,
                already_captured: true,
            }),
            other => Err(MarketError::CaptureFailed {
                reason: format!("authorization in non-capturable state '{other}'"),
            }),
        }
    }

    async fn cancel_authorization(&self, authorization_ref: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/v1/authorizations/{authorization_ref}/cancel")))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| MarketError::GatewayError {
                reason: format!("cancel request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(MarketError::GatewayError {
                reason: Self::error_reason(response).await,
            });
        }

        Ok(())
    }

    async fn create_transfer(
        &self,
        amount: Money,
        destination: &str,
        idempotency_key: &str,
    ) -> Result<Transfer> {
        let body = json!({
            "amount": amount.minor(),
            "destination": destination,
        });

        let response = self
            .client
            .post(self.url("/v1/transfers"))
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MarketError::GatewayError {
                reason: format!("transfer request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(MarketError::GatewayError {
                reason: Self::error_reason(response).await,
            });
        }

        let parsed: TransferResponse =
            response.json().await.map_err(|e| MarketError::GatewayError {
                reason: format!("malformed transfer response: {e}"),
            })?;

        Ok(Transfer {
            reference: parsed.id,
        })
    }

    async fn create_payment(
        &self,
        amount: Money,
        buyer_ref: &str,
        purchase_id: PurchaseId,
        idempotency_key: &str,
    ) -> Result<PaymentIntent> {
        let body = json!({
            "amount": amount.minor(),
            "customer": buyer_ref,
            "metadata": { "purchase_id": purchase_id.to_string() },
        });

        let response = self
            .client
            .post(self.url("/v1/payments"))
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MarketError::GatewayError {
                reason: format!("payment creation failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(MarketError::GatewayError {
                reason: Self::error_reason(response).await,
            });
        }

        let parsed: PaymentIntentResponse =
            response.json().await.map_err(|e| MarketError::GatewayError {
                reason: format!("malformed payment response: {e}"),
            })?;

        Ok(PaymentIntent {
            id: parsed.id,
            client_secret: parsed.client_secret,
        })
    }

    async fn payment_status(&self, payment_ref: &str) -> Result<PaymentOutcome> {
        let response = self
            .client
            .get(self.url(&format!("/v1/payments/{payment_ref}")))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| MarketError::GatewayError {
                reason: format!("payment lookup failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(MarketError::GatewayError {
                reason: Self::error_reason(response).await,
            });
        }

        let parsed: PaymentStatusResponse =
            response.json().await.map_err(|e| MarketError::GatewayError {
                reason: format!("malformed payment status response: {e}"),
            })?;

        match parsed.status.as_str() {
            "succeeded" => Ok(PaymentOutcome::Succeeded),
            "failed" | "cancelled" => Ok(PaymentOutcome::Failed),
            _ => Ok(PaymentOutcome::Pending),
        }
    }
}
