use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};

use crate::models::User;

#[derive(Clone)]
pub struct UserRepo {
    col: Collection<User>,
}

impl UserRepo {
    pub fn new(db: &Database) -> Self {
        UserRepo {
            col: db.collection("users"),
        }
    }

    pub async fn create(&self, mut user: User) -> Result<User, mongodb::error::Error> {
        let res = self.col.insert_one(&user, None).await?;
        user.id = res.inserted_id.as_object_id();
        Ok(user)
    }

    pub async fn find_by_id(&self, id: &ObjectId) -> Result<Option<User>, mongodb::error::Error> {
        self.col.find_one(doc! { "_id": id }, None).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, mongodb::error::Error> {
        self.col.find_one(doc! { "email": email }, None).await
    }

    /// Best-effort mirror of the fee ledger; the ApplicationFee record
    /// stays authoritative if this write is lost.
    pub async fn set_application_fee_paid(
        &self,
        id: &ObjectId,
    ) -> Result<(), mongodb::error::Error> {
        self.col
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "application_fee_paid": true,
                    "updated_at": DateTime::now(),
                }},
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn find_all(&self) -> Result<Vec<User>, mongodb::error::Error> {
        let opts = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let mut cursor = self.col.find(doc! {}, opts).await?;
        let mut users = Vec::new();
        while cursor.advance().await? {
            users.push(cursor.deserialize_current()?);
        }
        Ok(users)
    }
}
