use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::{Collection, Database};

use crate::models::ApplicationFee;

#[derive(Clone)]
pub struct ApplicationFeeRepo {
    col: Collection<ApplicationFee>,
}

impl ApplicationFeeRepo {
    pub fn new(db: &Database) -> Self {
        ApplicationFeeRepo {
            col: db.collection("application_fees"),
        }
    }

    pub async fn create(
        &self,
        mut fee: ApplicationFee,
    ) -> Result<ApplicationFee, mongodb::error::Error> {
        let res = self.col.insert_one(&fee, None).await?;
        fee.id = res.inserted_id.as_object_id();
        Ok(fee)
    }

    pub async fn find_by_user(
        &self,
        user_id: &ObjectId,
    ) -> Result<Option<ApplicationFee>, mongodb::error::Error> {
        let opts = mongodb::options::FindOneOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        self.col.find_one(doc! { "user_id": user_id }, opts).await
    }

    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<ApplicationFee>, mongodb::error::Error> {
        self.col
            .find_one(doc! { "paystack_reference": reference }, None)
            .await
    }

    /// Compare-and-set transition to `paid`, same race discipline as the
    /// transaction ledger.
    pub async fn mark_paid_if_pending(
        &self,
        reference: &str,
        payment_date: Option<DateTime>,
        metadata: Document,
    ) -> Result<Option<ApplicationFee>, mongodb::error::Error> {
        let mut set = doc! {
            "status": "paid",
            "metadata": metadata,
            "updated_at": DateTime::now(),
        };
        if let Some(date) = payment_date {
            set.insert("payment_date", date);
        }

        let opts = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.col
            .find_one_and_update(
                doc! { "paystack_reference": reference, "status": "pending" },
                doc! { "$set": set },
                opts,
            )
            .await
    }

    pub async fn mark_failed(
        &self,
        reference: &str,
        failure_reason: &str,
        metadata: Document,
    ) -> Result<Option<ApplicationFee>, mongodb::error::Error> {
        let opts = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.col
            .find_one_and_update(
                doc! { "paystack_reference": reference, "status": "pending" },
                doc! { "$set": {
                    "status": "failed",
                    "failure_reason": failure_reason,
                    "metadata": metadata,
                    "updated_at": DateTime::now(),
                }},
                opts,
            )
            .await
    }

    pub async fn has_user_paid(&self, user_id: &ObjectId) -> Result<bool, mongodb::error::Error> {
        let count = self
            .col
            .count_documents(doc! { "user_id": user_id, "status": "paid" }, None)
            .await?;
        Ok(count > 0)
    }

    pub async fn count_paid(&self) -> Result<u64, mongodb::error::Error> {
        self.col
            .count_documents(doc! { "status": "paid" }, None)
            .await
    }

    pub async fn count_by_status(&self, status: &str) -> Result<u64, mongodb::error::Error> {
        self.col.count_documents(doc! { "status": status }, None).await
    }

    pub async fn total_revenue(&self) -> Result<f64, mongodb::error::Error> {
        let pipeline = vec![
            doc! { "$match": { "status": "paid" } },
            doc! { "$group": { "_id": null, "total": { "$sum": "$amount" } } },
        ];

        let mut cursor = self.col.aggregate(pipeline, None).await?;
        if cursor.advance().await? {
            let total = cursor
                .deserialize_current()
                .ok()
                .and_then(|doc: Document| doc.get_f64("total").ok())
                .unwrap_or(0.0);
            Ok(total)
        } else {
            Ok(0.0)
        }
    }

    pub async fn find_all(&self) -> Result<Vec<ApplicationFee>, mongodb::error::Error> {
        let opts = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let mut cursor = self.col.find(doc! {}, opts).await?;
        let mut fees = Vec::new();
        while cursor.advance().await? {
            fees.push(cursor.deserialize_current()?);
        }
        Ok(fees)
    }
}
