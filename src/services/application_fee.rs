use log::{error, warn};
use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime};
use mongodb::Database;
use serde_json::json;

use crate::models::{ApplicationFee, ApplicationFeeStatus, Transaction, TransactionStatus};
use crate::repos::{ApplicationFeeRepo, TransactionRepo, UserRepo};
use crate::services::subscription::parse_paid_at;
use crate::services::{EmailService, PaystackClient};
use crate::utils::ServiceError;

/// One-shot admission fee. Mirrors the subscription settlement flow minus
/// the installment math; references carry the `APP-` prefix so the webhook
/// can route them.
pub struct ApplicationFeeService {
    fees: ApplicationFeeRepo,
    txns: TransactionRepo,
    users: UserRepo,
    paystack: PaystackClient,
    fee_amount: f64,
}

pub struct InitiatedFeePayment {
    pub application_fee: ApplicationFee,
    pub payment_url: String,
}

#[derive(Debug, serde::Serialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct ApplicationFeeStats {
    pub total_revenue: f64,
    pub total_applications: usize,
    pub paid_applications: u64,
    pub pending_payments: u64,
    pub failed_payments: u64,
    pub application_fee_amount: f64,
}

impl ApplicationFeeService {
    pub fn new(db: &Database) -> Self {
        ApplicationFeeService {
            fees: ApplicationFeeRepo::new(db),
            txns: TransactionRepo::new(db),
            users: UserRepo::new(db),
            paystack: PaystackClient::from_config(),
            fee_amount: crate::config::Config::application_fee_amount(),
        }
    }

    pub async fn initiate_payment(
        &self,
        user_id: &ObjectId,
        email: &str,
    ) -> Result<InitiatedFeePayment, ServiceError> {
        if let Some(existing) = self.fees.find_by_user(user_id).await? {
            if existing.status == ApplicationFeeStatus::Paid {
                return Err(ServiceError::Conflict(
                    "Application fee has already been paid".to_string(),
                ));
            }
        }

        let reference = PaystackClient::generate_reference().replacen("SUB", "APP", 1);

        let charge_metadata = json!({
            "user_id": user_id.to_hex(),
            "payment_type": "application_fee",
        });

        let init = self
            .paystack
            .initialize_transaction(email, self.fee_amount, &reference, charge_metadata, "NGN")
            .await
            .map_err(|e| match e {
                ServiceError::Gateway(msg) => ServiceError::PaymentInit(msg),
                other => other,
            })?;

        let created = DateTime::now();
        let fee = ApplicationFee {
            id: None,
            user_id: *user_id,
            amount: self.fee_amount,
            currency: "NGN".to_string(),
            status: ApplicationFeeStatus::Pending,
            paystack_reference: reference.clone(),
            paystack_access_code: Some(init.access_code.clone()),
            paystack_authorization_url: Some(init.authorization_url.clone()),
            payment_date: None,
            metadata: None,
            failure_reason: None,
            created_at: created,
            updated_at: created,
        };
        let fee = self.fees.create(fee).await?;

        // Fee payments also land in the shared ledger so revenue reporting
        // sees every charge in one place.
        let transaction = Transaction {
            id: None,
            user_id: *user_id,
            subscription_id: None,
            plan_id: None,
            amount: self.fee_amount,
            currency: "NGN".to_string(),
            status: TransactionStatus::Pending,
            paystack_reference: reference,
            paystack_access_code: Some(init.access_code.clone()),
            paystack_authorization_url: Some(init.authorization_url.clone()),
            payment_date: None,
            metadata: Some(doc! {
                "payment_type": "application_fee",
                "application_fee_id": fee.id.map(Bson::ObjectId).unwrap_or(Bson::Null),
            }),
            failure_reason: None,
            created_at: created,
            updated_at: created,
        };
        self.txns.create(transaction).await?;

        Ok(InitiatedFeePayment {
            application_fee: fee,
            payment_url: init.authorization_url,
        })
    }

    /// Idempotent, race-safe settlement of the fee; mirrors
    /// `SubscriptionService::verify_payment` without installment math.
    pub async fn verify_payment(&self, reference: &str) -> Result<ApplicationFee, ServiceError> {
        let fee = self
            .fees
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Application fee record not found".to_string()))?;

        if fee.status == ApplicationFeeStatus::Paid {
            return Ok(fee);
        }

        let charge = self.paystack.verify_transaction(reference).await?;

        if !charge.is_success() {
            let reason = charge
                .gateway_response
                .clone()
                .unwrap_or_else(|| "Charge was not successful".to_string());
            let meta = doc! { "paystack_data": charge_to_bson(&charge) };
            self.fees.mark_failed(reference, &reason, meta.clone()).await?;
            self.txns.mark_failed(reference, &reason, meta).await?;
            return Err(ServiceError::PaymentFailed(reason));
        }

        let paid_at = parse_paid_at(charge.paid_at.as_deref());
        let meta = doc! {
            "paystack_data": charge_to_bson(&charge),
            "payment_type": "application_fee",
        };

        let claimed = self
            .fees
            .mark_paid_if_pending(reference, paid_at, meta.clone())
            .await?;

        let fee = match claimed {
            Some(fee) => fee,
            None => {
                // A concurrent verification settled it first.
                return self
                    .fees
                    .find_by_reference(reference)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound("Application fee record not found".to_string())
                    });
            }
        };

        self.txns
            .mark_success_if_pending(reference, paid_at, meta)
            .await?;

        // Denormalized convenience flag; the fee record stays the source of
        // truth if this write is lost.
        if let Err(e) = self.users.set_application_fee_paid(&fee.user_id).await {
            error!(
                "Failed to flag application fee on user {}: {}",
                fee.user_id.to_hex(),
                e
            );
        }

        self.notify_receipt(&fee).await;

        Ok(fee)
    }

    async fn notify_receipt(&self, fee: &ApplicationFee) {
        match self.users.find_by_id(&fee.user_id).await {
            Ok(Some(user)) => {
                let email = user.email;
                let first_name = user.first_name;
                let amount = fee.amount;
                let reference = fee.paystack_reference.clone();
                rocket::tokio::spawn(async move {
                    EmailService::send_application_fee_receipt(
                        &email,
                        &first_name,
                        amount,
                        &reference,
                    )
                    .await;
                });
            }
            Ok(None) => warn!("No user {} for fee receipt email", fee.user_id.to_hex()),
            Err(e) => error!("User lookup for fee receipt failed: {}", e),
        }
    }

    pub async fn has_user_paid(&self, user_id: &ObjectId) -> Result<bool, ServiceError> {
        Ok(self.fees.has_user_paid(user_id).await?)
    }

    pub async fn get_user_fee(
        &self,
        user_id: &ObjectId,
    ) -> Result<Option<ApplicationFee>, ServiceError> {
        Ok(self.fees.find_by_user(user_id).await?)
    }

    pub async fn statistics(&self) -> Result<ApplicationFeeStats, ServiceError> {
        let total_revenue = self.fees.total_revenue().await?;
        let paid = self.fees.count_paid().await?;
        let pending = self
            .fees
            .count_by_status(ApplicationFeeStatus::Pending.as_str())
            .await?;
        let failed = self
            .fees
            .count_by_status(ApplicationFeeStatus::Failed.as_str())
            .await?;
        let all = self.fees.find_all().await?;

        Ok(ApplicationFeeStats {
            total_revenue,
            total_applications: all.len(),
            paid_applications: paid,
            pending_payments: pending,
            failed_payments: failed,
            application_fee_amount: self.fee_amount,
        })
    }
}

fn charge_to_bson(charge: &crate::services::paystack::VerifiedCharge) -> Bson {
    mongodb::bson::to_bson(charge).unwrap_or(Bson::Null)
}

#[cfg(test)]
mod tests {
    use crate::services::PaystackClient;

    #[test]
    fn fee_references_swap_category_prefix() {
        let reference = PaystackClient::generate_reference().replacen("SUB", "APP", 1);
        assert!(reference.starts_with("APP-"));
        assert!(!reference.contains("SUB"));
    }
}
