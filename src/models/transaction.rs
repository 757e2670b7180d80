use mongodb::bson::{oid::ObjectId, DateTime, Document};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

/// One ledger entry per payment attempt, keyed by the unique Paystack
/// reference. A transaction becomes terminal (success/failed) exactly once.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Transaction {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<ObjectId>,
    pub amount: f64,
    pub currency: String,
    pub status: TransactionStatus,
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
