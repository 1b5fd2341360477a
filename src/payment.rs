#![cfg(feature = "web")]
//! Mobile-money payment gateway client

use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::error::{NackError, Result};

/// What the customer is asked to pay
#[derive(Debug, Clone)]
pub struct LinkRequest {
    pub reference: String,
    pub amount: i64,
    pub redirect_success: String,
    pub redirect_error: String,
    /// Merchant wallet to credit instead of the platform wallet
    pub wallet: Option<String>,
    pub disbursement: Option<String>,
}

#[derive(Debug, Serialize)]
struct LinkBody<'a> {
    wallet: &'a str,
    disbursement: &'a str,
    reference: &'a str,
    amount: i64,
    redirect_success: &'a str,
    redirect_error: &'a str,
    is_transfer: bool,
}

#[derive(Debug, Deserialize)]
struct LinkResponse {
    link: String,
}

/// Notification posted by the gateway once the customer has paid (or not)
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayCallback {
    pub reference: String,
    pub status: String,
}

/// What a callback status means for the payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Succeeded,
    Failed,
    /// Not final yet; the gateway calls again later
    InProgress,
}

impl GatewayCallback {
    /// Only final statuses settle a payment; anything unknown waits
    pub fn outcome(&self) -> CallbackOutcome {
        match self.status.trim().to_lowercase().as_str() {
            "success" | "successful" | "paid" | "completed" => CallbackOutcome::Succeeded,
            "failed" | "failure" | "error" | "cancelled" | "canceled" | "declined"
            | "rejected" | "expired" | "refused" => CallbackOutcome::Failed,
            _ => CallbackOutcome::InProgress,
        }
    }
}

/// Client for the payment-link endpoint
#[derive(Clone)]
pub struct PaymentGateway {
    client: Client,
    config: GatewayConfig,
}

impl PaymentGateway {
    pub fn new(client: Client, config: GatewayConfig) -> Self {
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.client_id.is_empty() && !self.config.client_secret.is_empty()
    }

    /// Check the shared secret sent with a callback
    ///
    /// Always false when no secret is configured. The comparison time does
    /// not depend on where the two values differ.
    pub fn verify_callback_secret(&self, given: &str) -> bool {
        let expected = self.config.callback_secret.as_bytes();
        let given = given.as_bytes();
        if expected.is_empty() || expected.len() != given.len() {
            return false;
        }
        expected
            .iter()
            .zip(given)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
    }

    /// Ask the gateway for a checkout link
    ///
    /// A single attempt; the caller decides what to tell the customer.
    pub async fn create_link(&self, request: &LinkRequest) -> Result<String> {
        if !self.is_configured() {
            return Err(NackError::Upstream(
                "payment gateway is not configured".to_string(),
            ));
        }

        let wallet = request.wallet.as_deref().unwrap_or(&self.config.wallet);
        let body = LinkBody {
            wallet,
            disbursement: request
                .disbursement
                .as_deref()
                .unwrap_or(&self.config.disbursement_id),
            reference: &request.reference,
            amount: request.amount,
            redirect_success: &request.redirect_success,
            redirect_error: &request.redirect_error,
            is_transfer: false,
        };
        debug!("Requesting payment link for {}", request.reference);

        let response = self
            .client
            .post(format!("{}/ext", self.config.base_url.trim_end_matches('/')))
            .header("x-client-id", &self.config.client_id)
            .header("x-client-secret", &self.config.client_secret)
            .header("x-wallet", wallet)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Payment gateway refused {}: {} {}", request.reference, status, text);
            return Err(NackError::Upstream(format!("payment gateway returned {}", status)));
        }

        let link: LinkResponse = response.json().await?;
        Ok(link.link)
    }
}
