use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::{Collection, Database};

use crate::models::{PaymentPlan, PlanType};

#[derive(Clone)]
pub struct PlanRepo {
    col: Collection<PaymentPlan>,
}

impl PlanRepo {
    pub fn new(db: &Database) -> Self {
        PlanRepo {
            col: db.collection("payment_plans"),
        }
    }

    pub async fn find_active(&self) -> Result<Vec<PaymentPlan>, mongodb::error::Error> {
        let mut cursor = self.col.find(doc! { "is_active": true }, None).await?;
        let mut plans = Vec::new();
        while cursor.advance().await? {
            plans.push(cursor.deserialize_current()?);
        }
        Ok(plans)
    }

    /// Catalog lookup used by the payment hot path. Inactive plans are
    /// invisible here.
    pub async fn find_by_type(
        &self,
        plan_type: PlanType,
    ) -> Result<Option<PaymentPlan>, mongodb::error::Error> {
        self.col
            .find_one(doc! { "type": plan_type.as_str(), "is_active": true }, None)
            .await
    }

    pub async fn find_by_id(
        &self,
        id: &ObjectId,
    ) -> Result<Option<PaymentPlan>, mongodb::error::Error> {
        self.col.find_one(doc! { "_id": id }, None).await
    }

    pub async fn create(
        &self,
        mut plan: PaymentPlan,
    ) -> Result<PaymentPlan, mongodb::error::Error> {
        let res = self.col.insert_one(&plan, None).await?;
        plan.id = res.inserted_id.as_object_id();
        Ok(plan)
    }

    /// Replaces the catalog with the three standard plans. Admin-only,
    /// never part of the payment flow.
    pub async fn seed_defaults(&self) -> Result<Vec<PaymentPlan>, mongodb::error::Error> {
        self.col.delete_many(doc! {}, None).await?;

        let now = DateTime::now();
        let plans = vec![
            PaymentPlan {
                id: None,
                name: "Early Bird Plan".to_string(),
                plan_type: PlanType::EarlyBird,
                description: "Pay per semester during early registration. ₦150,000 per semester for 4 semesters.".to_string(),
                total_amount: 600000.0,
                installment_amount: 150000.0,
                number_of_installments: 4,
                semesters_per_installment: 1,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
            PaymentPlan {
                id: None,
                name: "Mid Plan (Post-Early Bird)".to_string(),
                plan_type: PlanType::Mid,
                description: "Pay for 2 semesters at a time. ₦300,000 per payment, 2 payments total.".to_string(),
                total_amount: 600000.0,
                installment_amount: 300000.0,
                number_of_installments: 2,
                semesters_per_installment: 2,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
            PaymentPlan {
                id: None,
                name: "Normal Plan (Late Bird)".to_string(),
                plan_type: PlanType::Normal,
                description: "Full upfront payment for all 4 semesters. ₦600,000 paid once.".to_string(),
                total_amount: 600000.0,
                installment_amount: 600000.0,
                number_of_installments: 1,
                semesters_per_installment: 4,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        ];

        self.col.insert_many(&plans, None).await?;
        self.find_active().await
    }
}
