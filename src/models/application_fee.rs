use mongodb::bson::{oid::ObjectId, DateTime, Document};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationFeeStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl ApplicationFeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationFeeStatus::Pending => "pending",
            ApplicationFeeStatus::Paid => "paid",
            ApplicationFeeStatus::Failed => "failed",
            ApplicationFeeStatus::Refunded => "refunded",
        }
    }
}

/// One-time admission fee. Unlike subscriptions there is no installment
/// schedule; the record is updated in place as the payment settles.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApplicationFee {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub amount: f64,
    pub currency: String,
    pub status: ApplicationFeeStatus,
    pub paystack_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paystack_access_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paystack_authorization_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
