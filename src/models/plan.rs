use mongodb::bson::{oid::ObjectId, DateTime};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The three catalog plans differ only in how the ₦600,000 program cost is
/// split across installments.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    EarlyBird,
    Mid,
    Normal,
}

impl PlanType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "early_bird" => Some(PlanType::EarlyBird),
            "mid" => Some(PlanType::Mid),
            "normal" => Some(PlanType::Normal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::EarlyBird => "early_bird",
            PlanType::Mid => "mid",
            PlanType::Normal => "normal",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaymentPlan {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(rename = "type")]
    pub plan_type: PlanType,
    pub description: String,
    pub total_amount: f64,
    pub installment_amount: f64,
    pub number_of_installments: i32,
    pub semesters_per_installment: i32,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreatePlanDto {
    pub name: String,
    pub plan_type: String,
    pub description: String,
    pub total_amount: f64,
    pub installment_amount: f64,
    pub number_of_installments: i32,
    pub semesters_per_installment: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_type_round_trips_through_wire_names() {
        for ty in [PlanType::EarlyBird, PlanType::Mid, PlanType::Normal] {
            assert_eq!(PlanType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(PlanType::parse("weekly"), None);
    }

    #[test]
    fn plan_type_serializes_as_snake_case() {
        let json = serde_json::to_string(&PlanType::EarlyBird).unwrap();
        assert_eq!(json, "\"early_bird\"");
    }
}
