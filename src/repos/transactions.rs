use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::{Collection, Database};

use crate::models::{Transaction, TransactionStatus};

#[derive(Clone)]
pub struct TransactionRepo {
    col: Collection<Transaction>,
}

impl TransactionRepo {
    pub fn new(db: &Database) -> Self {
        TransactionRepo {
            col: db.collection("transactions"),
        }
    }

    pub async fn create(
        &self,
        mut transaction: Transaction,
    ) -> Result<Transaction, mongodb::error::Error> {
        let res = self.col.insert_one(&transaction, None).await?;
        transaction.id = res.inserted_id.as_object_id();
        Ok(transaction)
    }

    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, mongodb::error::Error> {
        self.col
            .find_one(doc! { "paystack_reference": reference }, None)
            .await
    }

    pub async fn find_by_user(
        &self,
        user_id: &ObjectId,
    ) -> Result<Vec<Transaction>, mongodb::error::Error> {
        let opts = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let mut cursor = self.col.find(doc! { "user_id": user_id }, opts).await?;
        let mut txns = Vec::new();
        while cursor.advance().await? {
            txns.push(cursor.deserialize_current()?);
        }
        Ok(txns)
    }

    pub async fn find_by_subscription(
        &self,
        subscription_id: &ObjectId,
    ) -> Result<Vec<Transaction>, mongodb::error::Error> {
        let opts = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let mut cursor = self
            .col
            .find(doc! { "subscription_id": subscription_id }, opts)
            .await?;
        let mut txns = Vec::new();
        while cursor.advance().await? {
            txns.push(cursor.deserialize_current()?);
        }
        Ok(txns)
    }

    /// Compare-and-set transition to `success`. The filter on the current
    /// pending status guarantees at most one caller wins when the redirect
    /// and webhook verifications race; the loser gets `None` and must
    /// re-read.
    pub async fn mark_success_if_pending(
        &self,
        reference: &str,
        payment_date: Option<DateTime>,
        metadata: Document,
    ) -> Result<Option<Transaction>, mongodb::error::Error> {
        let mut set = doc! {
            "status": TransactionStatus::Success.as_str(),
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
                doc! {
                    "paystack_reference": reference,
                    "status": TransactionStatus::Pending.as_str(),
                },
                doc! { "$set": set },
                opts,
            )
            .await
    }

    /// Records a gateway-reported failure. Never demotes a transaction that
    /// already settled.
    pub async fn mark_failed(
        &self,
        reference: &str,
        failure_reason: &str,
        metadata: Document,
    ) -> Result<Option<Transaction>, mongodb::error::Error> {
        let opts = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.col
            .find_one_and_update(
                doc! {
                    "paystack_reference": reference,
                    "status": TransactionStatus::Pending.as_str(),
                },
                doc! { "$set": {
                    "status": TransactionStatus::Failed.as_str(),
                    "failure_reason": failure_reason,
                    "metadata": metadata,
                    "updated_at": DateTime::now(),
                }},
                opts,
            )
            .await
    }

    pub async fn total_revenue(&self) -> Result<f64, mongodb::error::Error> {
        self.sum_amounts(doc! { "status": "success" }).await
    }

    /// Everything the gateway has settled against one subscription. Compared
    /// with the subscription's own counter to spot a record that lags its
    /// ledger.
    pub async fn total_settled_for_subscription(
        &self,
        subscription_id: &ObjectId,
    ) -> Result<f64, mongodb::error::Error> {
        self.sum_amounts(doc! {
            "subscription_id": subscription_id,
            "status": TransactionStatus::Success.as_str(),
        })
        .await
    }

    /// Revenue from installment payments only; fee rows in the ledger are
    /// excluded by their metadata marker.
    pub async fn total_subscription_revenue(&self) -> Result<f64, mongodb::error::Error> {
        self.sum_amounts(doc! {
            "status": "success",
            "subscription_id": { "$exists": true },
            "metadata.payment_type": { "$ne": "application_fee" }
        })
        .await
    }

    async fn sum_amounts(&self, filter: Document) -> Result<f64, mongodb::error::Error> {
        let pipeline = vec![
            doc! { "$match": filter },
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
}
