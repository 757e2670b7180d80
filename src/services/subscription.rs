use chrono::{DateTime as ChronoDateTime, Duration, Months, Utc};
use log::{error, info, warn};
use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use mongodb::Database;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;
use serde_json::json;

use crate::models::{
    PaymentPlan, PaymentUpdate, PlanType, Subscription, SubscriptionStatus, Transaction,
    TransactionStatus,
};
use crate::repos::{PlanRepo, SubscriptionRepo, TransactionRepo, UserRepo};
use crate::services::{EmailService, PaystackClient};
use crate::utils::ServiceError;

/// The program spans exactly four semesters; crediting never exceeds this.
const PROGRAM_SEMESTERS: i32 = 4;
/// Fixed program duration regardless of plan.
const PROGRAM_MONTHS: u32 = 12;
/// Grace period before the first installment of a multi-installment plan.
const FIRST_PAYMENT_GRACE_DAYS: i64 = 7;

/// Owns every write to subscription payment state. Charges are initiated
/// here and settled here, whether the trigger is the browser redirect or
/// the Paystack webhook.
pub struct SubscriptionService {
    subs: SubscriptionRepo,
    txns: TransactionRepo,
    plans: PlanRepo,
    users: UserRepo,
    paystack: PaystackClient,
}

pub struct InitiatedPayment {
    pub subscription: Subscription,
    pub transaction: Transaction,
    pub payment_url: String,
}

pub struct AccessInfo {
    pub has_access: bool,
    pub subscription: Option<Subscription>,
    pub message: &'static str,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PaymentStats {
    /// Everything in the ledger, application fees included.
    pub total_revenue: f64,
    /// Installment payments only.
    pub subscription_revenue: f64,
    pub total_subscriptions: usize,
    pub active_subscriptions: u64,
    pub pending_payments: usize,
    pub early_bird_subscriptions: usize,
    pub mid_subscriptions: usize,
    pub normal_subscriptions: usize,
}

impl SubscriptionService {
    pub fn new(db: &Database) -> Self {
        SubscriptionService {
            subs: SubscriptionRepo::new(db),
            txns: TransactionRepo::new(db),
            plans: PlanRepo::new(db),
            users: UserRepo::new(db),
            paystack: PaystackClient::from_config(),
        }
    }

    pub async fn create_subscription(
        &self,
        user_id: &ObjectId,
        plan_type: PlanType,
        metadata: Option<Document>,
    ) -> Result<Subscription, ServiceError> {
        let now = Utc::now();
        let existing = self.subs.find_by_user(user_id).await?;
        if enrollment_conflict(&existing, now).is_some() {
            return Err(ServiceError::Conflict(
                "User already has an active subscription".to_string(),
            ));
        }

        let plan = self
            .plans
            .find_by_type(plan_type)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Payment plan not found".to_string()))?;
        let plan_id = plan
            .id
            .ok_or_else(|| ServiceError::Integrity("payment plan record has no id".to_string()))?;

        // An unpaid pending subscription on the same plan is reused so
        // repeated checkout attempts do not pile up records.
        if let Some(pending) = self.subs.find_pending_by_user(user_id, &plan_id).await? {
            return Ok(pending);
        }

        let schedule = initial_schedule(&plan, now);

        let created = DateTime::now();
        let subscription = Subscription {
            id: None,
            user_id: *user_id,
            plan_id,
            status: SubscriptionStatus::Pending,
            start_date: to_bson_date(now),
            end_date: to_bson_date(schedule.end_date),
            current_semester: 0,
            total_amount_paid: 0.0,
            amount_remaining: plan.total_amount,
            next_payment_due: schedule.next_payment_due.map(to_bson_date),
            next_payment_amount: schedule.next_payment_amount,
            last_payment_date: None,
            cancelled_at: None,
            cancellation_reason: None,
            metadata,
            created_at: created,
            updated_at: created,
        };

        Ok(self.subs.create(subscription).await?)
    }

    /// Resolves (or creates) the subscription and opens a charge for exactly
    /// one installment. The charge amount always comes from the plan, never
    /// from the caller.
    pub async fn initiate_payment(
        &self,
        user_id: &ObjectId,
        subscription_id: Option<&ObjectId>,
        plan_type: Option<PlanType>,
        email: &str,
        metadata: Option<Document>,
    ) -> Result<InitiatedPayment, ServiceError> {
        let subscription = match subscription_id {
            Some(id) => self
                .subs
                .find_by_id(id)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Subscription not found".to_string()))?,
            None => {
                let plan_type = plan_type.ok_or_else(|| {
                    ServiceError::NotFound("Payment plan not found".to_string())
                })?;
                self.create_subscription(user_id, plan_type, metadata.clone())
                    .await?
            }
        };
        let sub_id = subscription
            .id
            .ok_or_else(|| ServiceError::Integrity("subscription record has no id".to_string()))?;

        let plan = self
            .plans
            .find_by_id(&subscription.plan_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Payment plan not found".to_string()))?;

        let reference = PaystackClient::generate_reference();

        let charge_metadata = json!({
            "subscription_id": sub_id.to_hex(),
            "plan_type": plan.plan_type.as_str(),
            "user_id": user_id.to_hex(),
        });

        let init = self
            .paystack
            .initialize_transaction(
                email,
                plan.installment_amount,
                &reference,
                charge_metadata,
                "NGN",
            )
            .await
            .map_err(|e| match e {
                ServiceError::Gateway(msg) => ServiceError::PaymentInit(msg),
                other => other,
            })?;

        let mut txn_metadata = doc! {
            "authorization_url": &init.authorization_url,
            "access_code": &init.access_code,
        };
        if let Some(extra) = metadata {
            txn_metadata.insert("client", extra);
        }

        let created = DateTime::now();
        let transaction = Transaction {
            id: None,
            user_id: *user_id,
            subscription_id: Some(sub_id),
            plan_id: plan.id,
            amount: plan.installment_amount,
            currency: "NGN".to_string(),
            status: TransactionStatus::Pending,
            paystack_reference: reference,
            paystack_access_code: Some(init.access_code.clone()),
            paystack_authorization_url: Some(init.authorization_url.clone()),
            payment_date: None,
            metadata: Some(txn_metadata),
            failure_reason: None,
            created_at: created,
            updated_at: created,
        };
        let transaction = self.txns.create(transaction).await?;

        Ok(InitiatedPayment {
            subscription,
            transaction,
            payment_url: init.authorization_url,
        })
    }

    /// Idempotent settlement. Re-verifying a settled reference returns the
    /// current state without touching the subscription; concurrent
    /// verifications of the same reference credit it at most once via the
    /// pending-status compare-and-set on the ledger.
    pub async fn verify_payment(
        &self,
        reference: &str,
    ) -> Result<(Transaction, Subscription), ServiceError> {
        let transaction = self
            .txns
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Transaction not found".to_string()))?;

        let sub_id = transaction.subscription_id.ok_or_else(|| {
            ServiceError::NotFound("Transaction is not tied to a subscription".to_string())
        })?;

        if transaction.status == TransactionStatus::Success {
            let subscription = self
                .subs
                .find_by_id(&sub_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Subscription not found".to_string()))?;
            let subscription = self.repair_if_lagging(&sub_id, subscription).await?;
            return Ok((transaction, subscription));
        }

        let charge = self.paystack.verify_transaction(reference).await?;

        if !charge.is_success() {
            let reason = charge
                .gateway_response
                .clone()
                .unwrap_or_else(|| "Charge was not successful".to_string());
            let meta = doc! { "paystack_data": charge_to_bson(&charge) };
            self.txns.mark_failed(reference, &reason, meta).await?;
            return Err(ServiceError::PaymentFailed(reason));
        }

        let subscription = self
            .subs
            .find_by_id(&sub_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Subscription not found".to_string()))?;
        let plan = self
            .plans
            .find_by_id(&subscription.plan_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Payment plan not found".to_string()))?;

        let installment_number =
            (subscription.total_amount_paid / plan.installment_amount).floor() as i32 + 1;
        let meta = doc! {
            "paystack_data": charge_to_bson(&charge),
            "semesters_paid": plan.semesters_per_installment,
            "installment_number": installment_number,
        };

        // Claim the pending transaction. Losing the claim means the racing
        // verifier (redirect vs. webhook) already credited the subscription.
        let claimed = self
            .txns
            .mark_success_if_pending(reference, parse_paid_at(charge.paid_at.as_deref()), meta)
            .await?;

        let transaction = match claimed {
            Some(txn) => txn,
            None => {
                let transaction = self
                    .txns
                    .find_by_reference(reference)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound("Transaction not found".to_string()))?;
                let subscription = self
                    .subs
                    .find_by_id(&sub_id)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound("Subscription not found".to_string()))?;
                return Ok((transaction, subscription));
            }
        };

        let update = settle_installment(&subscription, &plan, transaction.amount, Utc::now())?;
        let subscription = self
            .subs
            .update_payment_info(&sub_id, &update)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Subscription not found".to_string()))?;

        info!(
            "Settled payment {}: semester {}, remaining {}",
            reference, subscription.current_semester, subscription.amount_remaining
        );

        self.notify_payment(&subscription, &transaction).await;

        Ok((transaction, subscription))
    }

    /// A crash between the ledger compare-and-set and the subscription write
    /// leaves a settled transaction the subscription never saw. Re-running
    /// verification lands here; the gap against the settled ledger total is
    /// re-applied before returning.
    async fn repair_if_lagging(
        &self,
        sub_id: &ObjectId,
        subscription: Subscription,
    ) -> Result<Subscription, ServiceError> {
        let settled = self.txns.total_settled_for_subscription(sub_id).await?;
        if settled - subscription.total_amount_paid <= 0.005 {
            return Ok(subscription);
        }

        let plan = self
            .plans
            .find_by_id(&subscription.plan_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Payment plan not found".to_string()))?;

        match catch_up_update(&subscription, &plan, settled, Utc::now())? {
            Some(update) => {
                warn!(
                    "Subscription {} lags its ledger by {}; re-applying settled payments",
                    sub_id.to_hex(),
                    settled - subscription.total_amount_paid
                );
                self.subs
                    .update_payment_info(sub_id, &update)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound("Subscription not found".to_string()))
            }
            None => Ok(subscription),
        }
    }

    /// Confirmation email is best effort; SMTP trouble must never unwind a
    /// settled payment.
    async fn notify_payment(&self, subscription: &Subscription, transaction: &Transaction) {
        match self.users.find_by_id(&subscription.user_id).await {
            Ok(Some(user)) => {
                let email = user.email;
                let first_name = user.first_name;
                let amount = transaction.amount;
                let reference = transaction.paystack_reference.clone();
                let semester = subscription.current_semester;
                let remaining = subscription.amount_remaining;
                rocket::tokio::spawn(async move {
                    EmailService::send_payment_confirmation(
                        &email,
                        &first_name,
                        amount,
                        &reference,
                        semester,
                        remaining,
                    )
                    .await;
                });
            }
            Ok(None) => warn!(
                "No user {} for payment confirmation email",
                subscription.user_id.to_hex()
            ),
            Err(e) => error!("User lookup for confirmation email failed: {}", e),
        }
    }

    pub async fn get_plans(&self) -> Result<Vec<PaymentPlan>, ServiceError> {
        Ok(self.plans.find_active().await?)
    }

    pub async fn get_plan_by_type(
        &self,
        plan_type: PlanType,
    ) -> Result<Option<PaymentPlan>, ServiceError> {
        Ok(self.plans.find_by_type(plan_type).await?)
    }

    pub async fn get_user_subscriptions(
        &self,
        user_id: &ObjectId,
    ) -> Result<Vec<Subscription>, ServiceError> {
        Ok(self.subs.find_by_user(user_id).await?)
    }

    pub async fn get_active_subscription(
        &self,
        user_id: &ObjectId,
    ) -> Result<Option<Subscription>, ServiceError> {
        Ok(self.subs.find_active_by_user(user_id).await?)
    }

    pub async fn get_subscription(
        &self,
        id: &ObjectId,
    ) -> Result<Option<Subscription>, ServiceError> {
        Ok(self.subs.find_by_id(id).await?)
    }

    pub async fn get_user_transactions(
        &self,
        user_id: &ObjectId,
    ) -> Result<Vec<Transaction>, ServiceError> {
        Ok(self.txns.find_by_user(user_id).await?)
    }

    pub async fn get_subscription_transactions(
        &self,
        subscription_id: &ObjectId,
    ) -> Result<Vec<Transaction>, ServiceError> {
        Ok(self.txns.find_by_subscription(subscription_id).await?)
    }

    pub async fn cancel_subscription(
        &self,
        id: &ObjectId,
        reason: Option<&str>,
    ) -> Result<Subscription, ServiceError> {
        self.subs
            .cancel(id, reason)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Subscription not found".to_string()))
    }

    pub async fn check_user_access(&self, user_id: &ObjectId) -> Result<AccessInfo, ServiceError> {
        match self.subs.find_active_by_user(user_id).await? {
            Some(subscription) => Ok(AccessInfo {
                has_access: true,
                subscription: Some(subscription),
                message: "Access granted",
            }),
            None => Ok(AccessInfo {
                has_access: false,
                subscription: None,
                message: "No active subscription found",
            }),
        }
    }

    /// Raw gateway-side transaction listing for cross-checking the local
    /// ledger against Paystack's records.
    pub async fn gateway_transactions(
        &self,
        per_page: u32,
        page: u32,
    ) -> Result<serde_json::Value, ServiceError> {
        self.paystack.list_transactions(per_page, page).await
    }

    pub async fn payment_stats(&self) -> Result<PaymentStats, ServiceError> {
        let total_revenue = self.txns.total_revenue().await?;
        let subscription_revenue = self.txns.total_subscription_revenue().await?;
        let all = self.subs.find_all().await?;
        let active = self.subs.count_by_status(SubscriptionStatus::Active).await?;

        let mut by_type = [0usize; 3];
        for plan_type in [PlanType::EarlyBird, PlanType::Mid, PlanType::Normal] {
            if let Some(plan) = self.plans.find_by_type(plan_type).await? {
                if let Some(plan_id) = plan.id {
                    let count = all.iter().filter(|s| s.plan_id == plan_id).count();
                    match plan_type {
                        PlanType::EarlyBird => by_type[0] = count,
                        PlanType::Mid => by_type[1] = count,
                        PlanType::Normal => by_type[2] = count,
                    }
                }
            }
        }

        let pending_payments = all
            .iter()
            .filter(|s| s.status == SubscriptionStatus::Active && s.amount_remaining > 0.0)
            .count();

        Ok(PaymentStats {
            total_revenue,
            subscription_revenue,
            total_subscriptions: all.len(),
            active_subscriptions: active,
            pending_payments,
            early_bird_subscriptions: by_type[0],
            mid_subscriptions: by_type[1],
            normal_subscriptions: by_type[2],
        })
    }
}

pub(crate) struct InitialSchedule {
    pub end_date: ChronoDateTime<Utc>,
    pub next_payment_due: Option<ChronoDateTime<Utc>>,
    pub next_payment_amount: Option<f64>,
}

/// Billing schedule for a brand-new subscription: the program always runs
/// twelve months, and multi-installment plans owe their first installment
/// after a short grace period.
pub(crate) fn initial_schedule(plan: &PaymentPlan, start: ChronoDateTime<Utc>) -> InitialSchedule {
    let end_date = start
        .checked_add_months(Months::new(PROGRAM_MONTHS))
        .unwrap_or(start);

    if plan.number_of_installments > 1 {
        InitialSchedule {
            end_date,
            next_payment_due: Some(start + Duration::days(FIRST_PAYMENT_GRACE_DAYS)),
            next_payment_amount: Some(plan.installment_amount),
        }
    } else {
        InitialSchedule {
            end_date,
            next_payment_due: None,
            next_payment_amount: None,
        }
    }
}

/// Applies one successful installment to a subscription. Pure so the
/// invariants (conservation of the plan total, the four-semester cap, the
/// refusal to go negative) can be checked in isolation.
pub(crate) fn settle_installment(
    subscription: &Subscription,
    plan: &PaymentPlan,
    amount: f64,
    now: ChronoDateTime<Utc>,
) -> Result<PaymentUpdate, ServiceError> {
    let total_amount_paid = subscription.total_amount_paid + amount;
    let amount_remaining = plan.total_amount - total_amount_paid;

    if amount_remaining < -0.005 {
        return Err(ServiceError::Integrity(format!(
            "settlement of {} would overdraw plan total {} (already paid {})",
            amount, plan.total_amount, subscription.total_amount_paid
        )));
    }
    // Clear float residue only; genuine overpayment was rejected above.
    let amount_remaining = if amount_remaining.abs() < 0.005 {
        0.0
    } else {
        amount_remaining
    };

    let current_semester = (subscription.current_semester + plan.semesters_per_installment)
        .min(PROGRAM_SEMESTERS);

    if amount_remaining > 0.0 {
        let next_payment_due = match plan.plan_type {
            PlanType::EarlyBird => now.checked_add_months(Months::new(3)),
            PlanType::Mid => now.checked_add_months(Months::new(6)),
            PlanType::Normal => None,
        };
        Ok(PaymentUpdate {
            total_amount_paid,
            amount_remaining,
            current_semester,
            next_payment_due,
            next_payment_amount: Some(plan.installment_amount),
            status: None,
        })
    } else {
        Ok(PaymentUpdate {
            total_amount_paid,
            amount_remaining,
            current_semester,
            next_payment_due: None,
            next_payment_amount: None,
            status: Some(SubscriptionStatus::Active),
        })
    }
}

/// An active, unexpired subscription blocks new enrollment; cancelled,
/// expired, pending, or lapsed records do not.
pub(crate) fn enrollment_conflict(
    existing: &[Subscription],
    now: ChronoDateTime<Utc>,
) -> Option<&Subscription> {
    existing.iter().find(|s| {
        s.status == SubscriptionStatus::Active
            && s.end_date.timestamp_millis() > now.timestamp_millis()
    })
}

/// Replays settled ledger value the subscription has not yet absorbed, one
/// installment-sized step at a time so semester credit accrues the same way
/// it would have installment by installment. `None` means the subscription
/// already matches its ledger; re-verification is then a pure read.
pub(crate) fn catch_up_update(
    subscription: &Subscription,
    plan: &PaymentPlan,
    ledger_settled: f64,
    now: ChronoDateTime<Utc>,
) -> Result<Option<PaymentUpdate>, ServiceError> {
    let mut current = subscription.clone();
    let mut update = None;

    while ledger_settled - current.total_amount_paid > 0.005 {
        let amount = (ledger_settled - current.total_amount_paid).min(plan.installment_amount);
        let step = settle_installment(&current, plan, amount, now)?;
        current.total_amount_paid = step.total_amount_paid;
        current.amount_remaining = step.amount_remaining;
        current.current_semester = step.current_semester;
        update = Some(step);
    }

    Ok(update)
}

pub(crate) fn parse_paid_at(paid_at: Option<&str>) -> Option<DateTime> {
    let raw = paid_at?;
    let parsed = ChronoDateTime::parse_from_rfc3339(raw).ok()?;
    Some(DateTime::from_millis(parsed.timestamp_millis()))
}

pub(crate) fn to_bson_date(dt: ChronoDateTime<Utc>) -> DateTime {
    DateTime::from_millis(dt.timestamp_millis())
}

fn charge_to_bson(charge: &crate::services::paystack::VerifiedCharge) -> Bson {
    mongodb::bson::to_bson(charge).unwrap_or(Bson::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn plan(plan_type: PlanType, total: f64, installment: f64, count: i32, sems: i32) -> PaymentPlan {
        let now = DateTime::now();
        PaymentPlan {
            id: Some(ObjectId::new()),
            name: format!("{} plan", plan_type.as_str()),
            plan_type,
            description: String::new(),
            total_amount: total,
            installment_amount: installment,
            number_of_installments: count,
            semesters_per_installment: sems,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn subscription(plan: &PaymentPlan, paid: f64, semester: i32) -> Subscription {
        let now = DateTime::now();
        Subscription {
            id: Some(ObjectId::new()),
            user_id: ObjectId::new(),
            plan_id: plan.id.unwrap(),
            status: SubscriptionStatus::Pending,
            start_date: now,
            end_date: now,
            current_semester: semester,
            total_amount_paid: paid,
            amount_remaining: plan.total_amount - paid,
            next_payment_due: None,
            next_payment_amount: None,
            last_payment_date: None,
            cancelled_at: None,
            cancellation_reason: None,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn at(y: i32, m: u32, d: u32) -> ChronoDateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn early_bird_first_installment() {
        let plan = plan(PlanType::EarlyBird, 600000.0, 150000.0, 4, 1);
        let sub = subscription(&plan, 0.0, 0);
        let now = at(2025, 1, 15);

        let update = settle_installment(&sub, &plan, 150000.0, now).unwrap();

        assert_eq!(update.total_amount_paid, 150000.0);
        assert_eq!(update.amount_remaining, 450000.0);
        assert_eq!(update.current_semester, 1);
        assert_eq!(update.next_payment_amount, Some(150000.0));
        assert_eq!(update.next_payment_due, Some(at(2025, 4, 15)));
        assert_eq!(update.status, None);
    }

    #[test]
    fn normal_plan_activates_on_single_payment() {
        let plan = plan(PlanType::Normal, 600000.0, 600000.0, 1, 4);
        let sub = subscription(&plan, 0.0, 0);

        let update = settle_installment(&sub, &plan, 600000.0, at(2025, 3, 1)).unwrap();

        assert_eq!(update.amount_remaining, 0.0);
        assert_eq!(update.current_semester, 4);
        assert_eq!(update.next_payment_due, None);
        assert_eq!(update.next_payment_amount, None);
        assert_eq!(update.status, Some(SubscriptionStatus::Active));
    }

    #[test]
    fn mid_plan_schedules_six_months_out() {
        let plan = plan(PlanType::Mid, 600000.0, 300000.0, 2, 2);
        let sub = subscription(&plan, 0.0, 0);

        let update = settle_installment(&sub, &plan, 300000.0, at(2025, 1, 31)).unwrap();

        assert_eq!(update.current_semester, 2);
        assert_eq!(update.next_payment_due, Some(at(2025, 7, 31)));
    }

    #[test]
    fn conservation_holds_across_installments() {
        let plan = plan(PlanType::EarlyBird, 600000.0, 150000.0, 4, 1);
        let mut sub = subscription(&plan, 0.0, 0);
        let now = at(2025, 1, 1);

        for _ in 0..4 {
            let update = settle_installment(&sub, &plan, 150000.0, now).unwrap();
            assert_eq!(
                update.total_amount_paid + update.amount_remaining,
                plan.total_amount
            );
            sub.total_amount_paid = update.total_amount_paid;
            sub.amount_remaining = update.amount_remaining;
            sub.current_semester = update.current_semester;
        }

        assert_eq!(sub.amount_remaining, 0.0);
        assert_eq!(sub.current_semester, 4);
    }

    #[test]
    fn semester_credit_is_capped_at_program_length() {
        let plan = plan(PlanType::Mid, 900000.0, 300000.0, 3, 2);
        let sub = subscription(&plan, 600000.0, 3);

        let update = settle_installment(&sub, &plan, 300000.0, at(2025, 6, 1)).unwrap();

        assert_eq!(update.current_semester, 4);
    }

    #[test]
    fn overdraw_is_an_integrity_error_not_a_clamp() {
        let plan = plan(PlanType::EarlyBird, 600000.0, 150000.0, 4, 1);
        let sub = subscription(&plan, 600000.0, 4);

        let err = settle_installment(&sub, &plan, 150000.0, at(2025, 9, 1)).unwrap_err();
        assert!(matches!(err, ServiceError::Integrity(_)));
    }

    #[test]
    fn installment_plans_start_with_grace_period() {
        let plan = plan(PlanType::EarlyBird, 600000.0, 150000.0, 4, 1);
        let start = at(2025, 1, 1);

        let schedule = initial_schedule(&plan, start);

        assert_eq!(schedule.end_date, at(2026, 1, 1));
        assert_eq!(schedule.next_payment_due, Some(at(2025, 1, 8)));
        assert_eq!(schedule.next_payment_amount, Some(150000.0));
    }

    #[test]
    fn upfront_plan_has_no_scheduled_payment() {
        let plan = plan(PlanType::Normal, 600000.0, 600000.0, 1, 4);
        let schedule = initial_schedule(&plan, at(2025, 1, 1));

        assert_eq!(schedule.next_payment_due, None);
        assert_eq!(schedule.next_payment_amount, None);
    }

    #[test]
    fn active_unexpired_subscription_blocks_enrollment() {
        let plan = plan(PlanType::EarlyBird, 600000.0, 150000.0, 4, 1);
        let mut sub = subscription(&plan, 150000.0, 1);
        sub.status = SubscriptionStatus::Active;
        sub.end_date = to_bson_date(at(2026, 1, 1));

        let existing = vec![sub];
        assert!(enrollment_conflict(&existing, at(2025, 6, 1)).is_some());
    }

    #[test]
    fn lapsed_or_cancelled_subscriptions_do_not_block_enrollment() {
        let plan = plan(PlanType::EarlyBird, 600000.0, 150000.0, 4, 1);

        let mut lapsed = subscription(&plan, 600000.0, 4);
        lapsed.status = SubscriptionStatus::Active;
        lapsed.end_date = to_bson_date(at(2024, 12, 31));

        let mut cancelled = subscription(&plan, 150000.0, 1);
        cancelled.status = SubscriptionStatus::Cancelled;
        cancelled.end_date = to_bson_date(at(2026, 1, 1));

        let pending = subscription(&plan, 0.0, 0);

        let existing = vec![lapsed, cancelled, pending];
        assert!(enrollment_conflict(&existing, at(2025, 6, 1)).is_none());
        assert!(enrollment_conflict(&[], at(2025, 6, 1)).is_none());
    }

    #[test]
    fn reverifying_a_settled_payment_changes_nothing() {
        let plan = plan(PlanType::EarlyBird, 600000.0, 150000.0, 4, 1);
        let sub = subscription(&plan, 150000.0, 1);

        let update = catch_up_update(&sub, &plan, 150000.0, at(2025, 2, 1)).unwrap();
        assert!(update.is_none());
    }

    #[test]
    fn interrupted_settlement_is_reapplied_on_reverification() {
        let plan = plan(PlanType::EarlyBird, 600000.0, 150000.0, 4, 1);
        // Ledger says one installment settled; the subscription never saw it.
        let sub = subscription(&plan, 0.0, 0);

        let update = catch_up_update(&sub, &plan, 150000.0, at(2025, 1, 15))
            .unwrap()
            .unwrap();

        assert_eq!(update.total_amount_paid, 150000.0);
        assert_eq!(update.amount_remaining, 450000.0);
        assert_eq!(update.current_semester, 1);
        assert_eq!(update.next_payment_amount, Some(150000.0));
    }

    #[test]
    fn multi_installment_ledger_gap_credits_each_installment() {
        let plan = plan(PlanType::EarlyBird, 600000.0, 150000.0, 4, 1);
        let sub = subscription(&plan, 150000.0, 1);

        let update = catch_up_update(&sub, &plan, 450000.0, at(2025, 7, 1))
            .unwrap()
            .unwrap();

        assert_eq!(update.total_amount_paid, 450000.0);
        assert_eq!(update.amount_remaining, 150000.0);
        assert_eq!(update.current_semester, 3);
        assert_eq!(
            update.total_amount_paid + update.amount_remaining,
            plan.total_amount
        );
    }

    #[test]
    fn paid_at_parses_paystack_timestamps() {
        let parsed = parse_paid_at(Some("2025-01-15T10:30:00.000Z")).unwrap();
        let expected = ChronoDateTime::parse_from_rfc3339("2025-01-15T10:30:00.000Z")
            .unwrap()
            .timestamp_millis();
        assert_eq!(parsed.timestamp_millis(), expected);

        assert_eq!(parse_paid_at(None), None);
        assert_eq!(parse_paid_at(Some("garbage")), None);
    }
}
