use mongodb::bson::oid::ObjectId;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::guards::AuthGuard;
use crate::models::{CancelSubscriptionDto, CreateSubscriptionDto, PlanType, Subscription};
use crate::services::SubscriptionService;
use crate::utils::{ApiError, ApiResponse};

fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid {} ID", what)))
}

fn owned_by(subscription: &Subscription, auth: &AuthGuard) -> Result<(), ApiError> {
    if subscription.user_id != auth.user_id {
        return Err(ApiError::forbidden("Unauthorized access to subscription"));
    }
    Ok(())
}

#[openapi(tag = "Subscription")]
#[get("/subscriptions/plans")]
pub async fn get_plans(
    svc: &State<SubscriptionService>,
    _auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let plans = svc.get_plans().await.map_err(ApiError::from)?;
    Ok(Json(ApiResponse::success(serde_json::json!(plans))))
}

#[openapi(tag = "Subscription")]
#[get("/subscriptions/plans/<plan_type>")]
pub async fn get_plan_by_type(
    svc: &State<SubscriptionService>,
    _auth: AuthGuard,
    plan_type: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let plan_type = PlanType::parse(&plan_type)
        .ok_or_else(|| ApiError::bad_request("Unknown plan type"))?;

    let plan = svc
        .get_plan_by_type(plan_type)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Payment plan not found"))?;

    Ok(Json(ApiResponse::success(serde_json::json!(plan))))
}

/// Creates (or reuses) a subscription and opens a Paystack charge for the
/// first installment.
#[openapi(tag = "Subscription")]
#[post("/subscriptions", data = "<dto>")]
pub async fn create_subscription(
    svc: &State<SubscriptionService>,
    auth: AuthGuard,
    dto: Json<CreateSubscriptionDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let plan_type = PlanType::parse(&dto.plan_type)
        .ok_or_else(|| ApiError::bad_request("Unknown plan type"))?;

    let metadata = dto
        .metadata
        .as_ref()
        .and_then(|m| mongodb::bson::to_document(m).ok());

    let result = svc
        .initiate_payment(&auth.user_id, None, Some(plan_type), &auth.email, metadata)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ApiResponse::success_with_message(
        "Subscription created and payment initiated successfully".to_string(),
        serde_json::json!({
            "subscription": result.subscription,
            "transaction": result.transaction,
            "payment_url": result.payment_url,
        }),
    )))
}

/// Pays the next installment on an existing subscription.
#[openapi(tag = "Subscription")]
#[post("/subscriptions/<id>/pay")]
pub async fn make_payment(
    svc: &State<SubscriptionService>,
    auth: AuthGuard,
    id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let sub_id = parse_object_id(&id, "subscription")?;

    let subscription = svc
        .get_subscription(&sub_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Subscription not found"))?;
    owned_by(&subscription, &auth)?;

    if subscription.amount_remaining <= 0.0 {
        return Err(ApiError::bad_request("Subscription is fully paid"));
    }

    let result = svc
        .initiate_payment(&auth.user_id, Some(&sub_id), None, &auth.email, None)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ApiResponse::success_with_message(
        "Payment initiated successfully".to_string(),
        serde_json::json!({
            "transaction": result.transaction,
            "payment_url": result.payment_url,
        }),
    )))
}

/// Settlement after the browser redirect. The webhook drives the same
/// reconciliation path, so hitting both is safe.
#[openapi(tag = "Subscription")]
#[get("/subscriptions/verify?<reference>")]
pub async fn verify_payment(
    svc: &State<SubscriptionService>,
    _auth: AuthGuard,
    reference: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if reference.is_empty() {
        return Err(ApiError::bad_request("Payment reference is required"));
    }

    let (transaction, subscription) =
        svc.verify_payment(&reference).await.map_err(ApiError::from)?;

    Ok(Json(ApiResponse::success_with_message(
        "Payment verified successfully".to_string(),
        serde_json::json!({
            "transaction": transaction,
            "subscription": subscription,
        }),
    )))
}

#[openapi(tag = "Subscription")]
#[get("/subscriptions")]
pub async fn get_user_subscriptions(
    svc: &State<SubscriptionService>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let subs = svc
        .get_user_subscriptions(&auth.user_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(ApiResponse::success(serde_json::json!(subs))))
}

#[openapi(tag = "Subscription")]
#[get("/subscriptions/active")]
pub async fn get_active_subscription(
    svc: &State<SubscriptionService>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let subscription = svc
        .get_active_subscription(&auth.user_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("No active subscription found"))?;

    Ok(Json(ApiResponse::success(serde_json::json!(subscription))))
}

#[openapi(tag = "Subscription")]
#[get("/subscriptions/access")]
pub async fn check_access(
    svc: &State<SubscriptionService>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let info = svc
        .check_user_access(&auth.user_id)
        .await
        .map_err(ApiError::from)?;

    if !info.has_access {
        return Err(ApiError::forbidden(info.message));
    }

    Ok(Json(ApiResponse::success_with_message(
        info.message.to_string(),
        serde_json::json!(info.subscription),
    )))
}

#[openapi(tag = "Subscription")]
#[get("/subscriptions/transactions")]
pub async fn get_user_transactions(
    svc: &State<SubscriptionService>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let txns = svc
        .get_user_transactions(&auth.user_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(ApiResponse::success(serde_json::json!(txns))))
}

#[openapi(tag = "Subscription")]
#[get("/subscriptions/<id>")]
pub async fn get_subscription_by_id(
    svc: &State<SubscriptionService>,
    auth: AuthGuard,
    id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let sub_id = parse_object_id(&id, "subscription")?;

    let subscription = svc
        .get_subscription(&sub_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Subscription not found"))?;
    owned_by(&subscription, &auth)?;

    Ok(Json(ApiResponse::success(serde_json::json!(subscription))))
}

#[openapi(tag = "Subscription")]
#[get("/subscriptions/<id>/transactions")]
pub async fn get_subscription_transactions(
    svc: &State<SubscriptionService>,
    auth: AuthGuard,
    id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let sub_id = parse_object_id(&id, "subscription")?;

    let subscription = svc
        .get_subscription(&sub_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Subscription not found"))?;
    owned_by(&subscription, &auth)?;

    let txns = svc
        .get_subscription_transactions(&sub_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(ApiResponse::success(serde_json::json!(txns))))
}

#[openapi(tag = "Subscription")]
#[post("/subscriptions/<id>/cancel", data = "<dto>")]
pub async fn cancel_subscription(
    svc: &State<SubscriptionService>,
    auth: AuthGuard,
    id: String,
    dto: Json<CancelSubscriptionDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let sub_id = parse_object_id(&id, "subscription")?;

    let subscription = svc
        .get_subscription(&sub_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Subscription not found"))?;
    owned_by(&subscription, &auth)?;

    let cancelled = svc
        .cancel_subscription(&sub_id, dto.reason.as_deref())
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ApiResponse::success_with_message(
        "Subscription cancelled successfully".to_string(),
        serde_json::json!(cancelled),
    )))
}
