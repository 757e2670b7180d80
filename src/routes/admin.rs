use mongodb::bson::DateTime;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::AdminGuard;
use crate::models::{CreatePlanDto, PaymentPlan, PlanType, UserResponse};
use crate::repos::{PlanRepo, UserRepo};
use crate::services::{ApplicationFeeService, SubscriptionService};
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Admin")]
#[get("/admin/stats/payments")]
pub async fn payment_stats(
    svc: &State<SubscriptionService>,
    _admin: AdminGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let stats = svc.payment_stats().await.map_err(ApiError::from)?;
    Ok(Json(ApiResponse::success(serde_json::json!(stats))))
}

#[openapi(tag = "Admin")]
#[get("/admin/stats/application-fees")]
pub async fn application_fee_stats(
    svc: &State<ApplicationFeeService>,
    _admin: AdminGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let stats = svc.statistics().await.map_err(ApiError::from)?;
    Ok(Json(ApiResponse::success(serde_json::json!(stats))))
}

/// Paystack's own view of recent charges, for reconciling against the
/// local ledger.
#[openapi(tag = "Admin")]
#[get("/admin/transactions/gateway?<per_page>&<page>")]
pub async fn gateway_transactions(
    svc: &State<SubscriptionService>,
    _admin: AdminGuard,
    per_page: Option<u32>,
    page: Option<u32>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let listing = svc
        .gateway_transactions(per_page.unwrap_or(50), page.unwrap_or(1))
        .await
        .map_err(ApiError::from)?;
    Ok(Json(ApiResponse::success(listing)))
}

#[openapi(tag = "Admin")]
#[post("/admin/plans", data = "<dto>")]
pub async fn create_plan(
    db: &State<DbConn>,
    _admin: AdminGuard,
    dto: Json<CreatePlanDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let plan_type = PlanType::parse(&dto.plan_type)
        .ok_or_else(|| ApiError::bad_request("Unknown plan type"))?;

    if dto.total_amount <= 0.0 || dto.installment_amount <= 0.0 {
        return Err(ApiError::bad_request("Plan amounts must be positive"));
    }
    if dto.number_of_installments < 1 {
        return Err(ApiError::bad_request("A plan needs at least one installment"));
    }

    let now = DateTime::now();
    let plan = PaymentPlan {
        id: None,
        name: dto.name.trim().to_string(),
        plan_type,
        description: dto.description.trim().to_string(),
        total_amount: dto.total_amount,
        installment_amount: dto.installment_amount,
        number_of_installments: dto.number_of_installments,
        semesters_per_installment: dto.semesters_per_installment,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let plan = PlanRepo::new(db)
        .create(plan)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success_with_message(
        "Payment plan created successfully".to_string(),
        serde_json::json!(plan),
    )))
}

/// Resets the catalog to the three standard plans.
#[openapi(tag = "Admin")]
#[post("/admin/plans/seed")]
pub async fn seed_plans(
    db: &State<DbConn>,
    _admin: AdminGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let plans = PlanRepo::new(db)
        .seed_defaults()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success_with_message(
        "Default payment plans seeded".to_string(),
        serde_json::json!(plans),
    )))
}

#[openapi(tag = "Admin")]
#[get("/admin/users")]
pub async fn list_users(
    db: &State<DbConn>,
    _admin: AdminGuard,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ApiError> {
    let users = UserRepo::new(db)
        .find_all()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let users = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(ApiResponse::success(users)))
}
