use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::{Collection, Database};

use crate::models::{PaymentUpdate, Subscription, SubscriptionStatus};

#[derive(Clone)]
pub struct SubscriptionRepo {
    col: Collection<Subscription>,
}

impl SubscriptionRepo {
    pub fn new(db: &Database) -> Self {
        SubscriptionRepo {
            col: db.collection("subscriptions"),
        }
    }

    pub async fn create(
        &self,
        mut subscription: Subscription,
    ) -> Result<Subscription, mongodb::error::Error> {
        let res = self.col.insert_one(&subscription, None).await?;
        subscription.id = res.inserted_id.as_object_id();
        Ok(subscription)
    }

    pub async fn find_by_id(
        &self,
        id: &ObjectId,
    ) -> Result<Option<Subscription>, mongodb::error::Error> {
        self.col.find_one(doc! { "_id": id }, None).await
    }

    pub async fn find_by_user(
        &self,
        user_id: &ObjectId,
    ) -> Result<Vec<Subscription>, mongodb::error::Error> {
        let opts = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let mut cursor = self.col.find(doc! { "user_id": user_id }, opts).await?;
        let mut subs = Vec::new();
        while cursor.advance().await? {
            subs.push(cursor.deserialize_current()?);
        }
        Ok(subs)
    }

    /// A user holds at most one subscription that is both active and
    /// unexpired; this is the duplicate-activation check.
    pub async fn find_active_by_user(
        &self,
        user_id: &ObjectId,
    ) -> Result<Option<Subscription>, mongodb::error::Error> {
        self.col
            .find_one(
                doc! {
                    "user_id": user_id,
                    "status": "active",
                    "end_date": { "$gt": DateTime::now() }
                },
                None,
            )
            .await
    }

    /// An unpaid pending subscription on the same plan is reused rather
    /// than duplicated.
    pub async fn find_pending_by_user(
        &self,
        user_id: &ObjectId,
        plan_id: &ObjectId,
    ) -> Result<Option<Subscription>, mongodb::error::Error> {
        self.col
            .find_one(
                doc! {
                    "user_id": user_id,
                    "plan_id": plan_id,
                    "status": "pending",
                    "amount_remaining": { "$gt": 0.0 }
                },
                None,
            )
            .await
    }

    /// Single atomic write of all payment-progress fields. Unset next-due
    /// fields mean no further installment is owed.
    pub async fn update_payment_info(
        &self,
        id: &ObjectId,
        update: &PaymentUpdate,
    ) -> Result<Option<Subscription>, mongodb::error::Error> {
        let now = DateTime::now();
        let mut set = doc! {
            "total_amount_paid": update.total_amount_paid,
            "amount_remaining": update.amount_remaining,
            "current_semester": update.current_semester,
            "last_payment_date": now,
            "updated_at": now,
        };
        let mut unset = doc! {};

        match update.next_payment_due {
            Some(due) => {
                set.insert(
                    "next_payment_due",
                    DateTime::from_millis(due.timestamp_millis()),
                );
            }
            None => {
                unset.insert("next_payment_due", "");
            }
        }
        match update.next_payment_amount {
            Some(amount) => {
                set.insert("next_payment_amount", amount);
            }
            None => {
                unset.insert("next_payment_amount", "");
            }
        }
        if let Some(status) = update.status {
            set.insert("status", status.as_str());
        }

        let mut update_doc = doc! { "$set": set };
        if !unset.is_empty() {
            update_doc.insert("$unset", unset);
        }

        let opts = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.col
            .find_one_and_update(doc! { "_id": id }, update_doc, opts)
            .await
    }

    pub async fn cancel(
        &self,
        id: &ObjectId,
        reason: Option<&str>,
    ) -> Result<Option<Subscription>, mongodb::error::Error> {
        let now = DateTime::now();
        let mut set = doc! {
            "status": "cancelled",
            "cancelled_at": now,
            "updated_at": now,
        };
        if let Some(reason) = reason {
            set.insert("cancellation_reason", reason);
        }

        let opts = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.col
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set }, opts)
            .await
    }

    pub async fn find_all(&self) -> Result<Vec<Subscription>, mongodb::error::Error> {
        let opts = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let mut cursor = self.col.find(doc! {}, opts).await?;
        let mut subs = Vec::new();
        while cursor.advance().await? {
            subs.push(cursor.deserialize_current()?);
        }
        Ok(subs)
    }

    pub async fn count_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> Result<u64, mongodb::error::Error> {
        self.col
            .count_documents(doc! { "status": status.as_str() }, None)
            .await
    }
}
