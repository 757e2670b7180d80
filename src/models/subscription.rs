use mongodb::bson::{oid::ObjectId, DateTime, Document};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
    Suspended,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Suspended => "suspended",
        }
    }
}

/// Per-user billing state. Payment fields are written only by the
/// reconciliation path in `SubscriptionService`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Subscription {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub plan_id: ObjectId,
    pub status: SubscriptionStatus,
    pub start_date: DateTime,
    pub end_date: DateTime,
    /// Semesters credited so far, 0 to 4.
    pub current_semester: i32,
    pub total_amount_paid: f64,
    pub amount_remaining: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_payment_due: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_payment_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_date: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Document>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Result of settling one successful installment, applied to a Subscription
/// in a single write by `SubscriptionRepo::update_payment_info`.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentUpdate {
    pub total_amount_paid: f64,
    pub amount_remaining: f64,
    pub current_semester: i32,
    pub next_payment_due: Option<chrono::DateTime<chrono::Utc>>,
    pub next_payment_amount: Option<f64>,
    /// `Some(Active)` once the balance reaches zero; `None` leaves the
    /// stored status untouched.
    pub status: Option<SubscriptionStatus>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateSubscriptionDto {
    pub plan_type: String,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CancelSubscriptionDto {
    pub reason: Option<String>,
}
