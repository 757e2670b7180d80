use std::time::Duration;

use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::utils::ServiceError;

/// Thin client over the Paystack REST API. Amounts cross the wire in kobo;
/// everything domain-side stays in naira.
pub struct PaystackClient {
    http: Client,
    secret_key: String,
    base_url: String,
    callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayEnvelope<T> {
    status: bool,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializedCharge {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeCustomer {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedCharge {
    pub status: String,
    pub reference: String,
    /// Amount settled, in kobo.
    pub amount: i64,
    pub gateway_response: Option<String>,
    pub paid_at: Option<String>,
    pub channel: Option<String>,
    pub customer: Option<ChargeCustomer>,
    pub metadata: Option<Value>,
}

impl VerifiedCharge {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    pub fn amount_in_naira(&self) -> f64 {
        PaystackClient::kobo_to_naira(self.amount)
    }
}

impl PaystackClient {
    pub fn from_config() -> Self {
        let timeout = Duration::from_secs(crate::config::Config::paystack_timeout_secs());
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        PaystackClient {
            http,
            secret_key: crate::config::Config::paystack_secret_key(),
            base_url: crate::config::Config::paystack_base_url(),
            callback_url: crate::config::Config::paystack_callback_url(),
        }
    }

    pub async fn initialize_transaction(
        &self,
        email: &str,
        amount: f64,
        reference: &str,
        metadata: Value,
        currency: &str,
    ) -> Result<InitializedCharge, ServiceError> {
        let mut body = json!({
            "email": email,
            "amount": Self::naira_to_kobo(amount),
            "reference": reference,
            "currency": currency,
            "metadata": metadata,
        });
        if let Some(callback) = &self.callback_url {
            body["callback_url"] = json!(callback);
        }
        if let Some(meta) = body["metadata"].as_object_mut() {
            meta.insert(
                "cancel_action".to_string(),
                json!(format!("{}/student", crate::config::Config::app_url())),
            );
        }

        let res = self
            .http
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Gateway(e.to_string()))?;

        let envelope: GatewayEnvelope<InitializedCharge> = res
            .json()
            .await
            .map_err(|e| ServiceError::Gateway(e.to_string()))?;

        if !envelope.status {
            return Err(ServiceError::Gateway(
                envelope
                    .message
                    .unwrap_or_else(|| "Failed to initialize payment".to_string()),
            ));
        }

        envelope
            .data
            .ok_or_else(|| ServiceError::Gateway("Empty initialize response".to_string()))
    }

    /// Safe to call repeatedly for the same reference; Paystack verification
    /// is a read.
    pub async fn verify_transaction(&self, reference: &str) -> Result<VerifiedCharge, ServiceError> {
        let res = self
            .http
            .get(format!("{}/transaction/verify/{}", self.base_url, reference))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ServiceError::Gateway(e.to_string()))?;

        let envelope: GatewayEnvelope<VerifiedCharge> = res
            .json()
            .await
            .map_err(|e| ServiceError::Gateway(e.to_string()))?;

        if !envelope.status {
            return Err(ServiceError::Gateway(
                envelope
                    .message
                    .unwrap_or_else(|| "Failed to verify payment".to_string()),
            ));
        }

        envelope
            .data
            .ok_or_else(|| ServiceError::Gateway("Empty verify response".to_string()))
    }

    pub async fn list_transactions(&self, per_page: u32, page: u32) -> Result<Value, ServiceError> {
        let res = self
            .http
            .get(format!("{}/transaction", self.base_url))
            .bearer_auth(&self.secret_key)
            .query(&[("perPage", per_page), ("page", page)])
            .send()
            .await
            .map_err(|e| ServiceError::Gateway(e.to_string()))?;

        res.json()
            .await
            .map_err(|e| ServiceError::Gateway(e.to_string()))
    }

    /// Unique token tying a gateway charge to a local Transaction. Callers
    /// must not rely on the format beyond the category prefix.
    pub fn generate_reference() -> String {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let random: u32 = rand::thread_rng().gen_range(0..1_000_000);
        format!("SUB-{}-{}", timestamp, random)
    }

    pub fn naira_to_kobo(naira: f64) -> i64 {
        (naira * 100.0).round() as i64
    }

    pub fn kobo_to_naira(kobo: i64) -> f64 {
        kobo as f64 / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naira_kobo_conversion_rounds() {
        assert_eq!(PaystackClient::naira_to_kobo(150000.0), 15_000_000);
        assert_eq!(PaystackClient::naira_to_kobo(250.5), 25_050);
        assert_eq!(PaystackClient::kobo_to_naira(15_000_000), 150000.0);
    }

    #[test]
    fn references_carry_prefix_and_are_unique() {
        let a = PaystackClient::generate_reference();
        let b = PaystackClient::generate_reference();
        assert!(a.starts_with("SUB-"));
        assert!(b.starts_with("SUB-"));
        assert_ne!(a, b);
    }

    #[test]
    fn verified_charge_success_check() {
        let charge: VerifiedCharge = serde_json::from_value(serde_json::json!({
            "status": "success",
            "reference": "SUB-1-2",
            "amount": 15_000_000,
            "gateway_response": "Approved",
            "paid_at": "2025-01-15T10:00:00.000Z",
            "channel": "card",
            "customer": { "email": "student@academy.edu.ng" },
            "metadata": null
        }))
        .unwrap();

        assert!(charge.is_success());
        assert_eq!(charge.amount_in_naira(), 150000.0);
    }

    #[test]
    fn declined_charge_is_not_success() {
        let charge: VerifiedCharge = serde_json::from_value(serde_json::json!({
            "status": "failed",
            "reference": "SUB-1-3",
            "amount": 15_000_000,
            "gateway_response": "Insufficient funds",
            "paid_at": null,
            "channel": null,
            "customer": null,
            "metadata": null
        }))
        .unwrap();

        assert!(!charge.is_success());
    }
}
