use hmac::{Hmac, Mac};
use log::{error, info, warn};
use rocket::http::Status;
use rocket::request::{self, FromRequest, Outcome, Request};
use rocket::State;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha512;

use crate::services::{ApplicationFeeService, SubscriptionService};

/// Raw value of the `x-paystack-signature` header, if present.
pub struct PaystackSignature(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PaystackSignature {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        Outcome::Success(PaystackSignature(
            req.headers()
                .get_one("x-paystack-signature")
                .map(str::to_string),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    event: String,
    data: Option<ChargeEventData>,
}

#[derive(Debug, Deserialize)]
struct ChargeEventData {
    reference: String,
    #[serde(default)]
    gateway_response: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

/// HMAC-SHA512 over the raw request body, compared in constant time via
/// the MAC's own verifier.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let mut mac = match Hmac::<Sha512>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);

    match hex::decode(signature_hex) {
        Ok(signature) => mac.verify_slice(&signature).is_ok(),
        Err(_) => false,
    }
}

/// Fee charges are recognized by the metadata marker set at initialization,
/// with the reference prefix as a fallback for older charges.
fn is_application_fee(reference: &str, metadata: Option<&Value>) -> bool {
    let marker = metadata
        .and_then(|m| m.get("payment_type"))
        .and_then(|v| v.as_str());
    marker == Some("application_fee") || reference.starts_with("APP-")
}

/// Paystack webhook entry point. Signature failures get a 400 and never
/// reach reconciliation; everything after the signature gate acknowledges
/// with 200 so application-level errors do not trigger provider retries.
#[post("/webhooks/paystack", data = "<body>")]
pub async fn paystack_webhook(
    signature: PaystackSignature,
    body: String,
    subscriptions: &State<SubscriptionService>,
    application_fees: &State<ApplicationFeeService>,
) -> (Status, &'static str) {
    let secret = crate::config::Config::paystack_secret_key();

    let provided = match signature.0 {
        Some(sig) => sig,
        None => {
            warn!("Webhook rejected: missing signature header");
            return (Status::BadRequest, "Invalid signature");
        }
    };

    if !verify_signature(&secret, body.as_bytes(), &provided) {
        warn!("Webhook rejected: signature mismatch");
        return (Status::BadRequest, "Invalid signature");
    }

    let event: WebhookEvent = match serde_json::from_str(&body) {
        Ok(event) => event,
        Err(e) => {
            error!("Webhook body did not parse: {}", e);
            return (Status::Ok, "Webhook received");
        }
    };

    match (event.event.as_str(), event.data) {
        ("charge.success", Some(data)) => {
            info!("Processing successful charge {}", data.reference);

            let result = if is_application_fee(&data.reference, data.metadata.as_ref()) {
                application_fees
                    .verify_payment(&data.reference)
                    .await
                    .map(|_| ())
            } else {
                subscriptions
                    .verify_payment(&data.reference)
                    .await
                    .map(|_| ())
            };

            if let Err(e) = result {
                // Logged for out-of-band inspection; Paystack still gets 200.
                error!("Webhook reconciliation failed for {}: {}", data.reference, e);
            }
        }
        ("charge.failed", Some(data)) => {
            info!(
                "Charge failed for {}: {}",
                data.reference,
                data.gateway_response.as_deref().unwrap_or("no reason given")
            );
        }
        (other, _) => {
            info!("Unhandled webhook event: {}", other);
        }
    }

    (Status::Ok, "Webhook received")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "sk_test_webhook_secret";

    fn sign(body: &str) -> String {
        let mut mac = Hmac::<Sha512>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_correctly_signed_body() {
        let body = r#"{"event":"charge.success","data":{"reference":"SUB-1-2"}}"#;
        assert!(verify_signature(SECRET, body.as_bytes(), &sign(body)));
    }

    #[test]
    fn rejects_wrong_signature() {
        let body = r#"{"event":"charge.success","data":{"reference":"SUB-1-2"}}"#;
        let other = sign(r#"{"event":"charge.success","data":{"reference":"SUB-1-3"}}"#);
        assert!(!verify_signature(SECRET, body.as_bytes(), &other));
    }

    #[test]
    fn rejects_tampered_body() {
        let body = r#"{"event":"charge.success","data":{"reference":"SUB-1-2"}}"#;
        let signature = sign(body);
        let tampered = body.replace("SUB-1-2", "SUB-1-9");
        assert!(!verify_signature(SECRET, tampered.as_bytes(), &signature));
    }

    #[test]
    fn rejects_non_hex_signature() {
        assert!(!verify_signature(SECRET, b"{}", "not-hex-at-all"));
    }

    #[test]
    fn fee_charges_route_by_metadata_marker() {
        let metadata = serde_json::json!({ "payment_type": "application_fee" });
        assert!(is_application_fee("SUB-1-2", Some(&metadata)));
    }

    #[test]
    fn fee_charges_route_by_reference_prefix() {
        assert!(is_application_fee("APP-1-2", None));
        assert!(!is_application_fee("SUB-1-2", None));
    }

    #[test]
    fn events_parse_with_and_without_metadata() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"event":"charge.success","data":{"reference":"APP-1-2","gateway_response":"Approved"}}"#,
        )
        .unwrap();
        assert_eq!(event.event, "charge.success");
        assert_eq!(event.data.unwrap().reference, "APP-1-2");

        let event: WebhookEvent =
            serde_json::from_str(r#"{"event":"transfer.success"}"#).unwrap();
        assert!(event.data.is_none());
    }
}
