use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::guards::AuthGuard;
use crate::services::ApplicationFeeService;
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Application Fee")]
#[post("/application-fee/pay")]
pub async fn initiate_payment(
    svc: &State<ApplicationFeeService>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let result = svc
        .initiate_payment(&auth.user_id, &auth.email)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ApiResponse::success_with_message(
        "Application fee payment initiated".to_string(),
        serde_json::json!({
            "application_fee": result.application_fee,
            "payment_url": result.payment_url,
        }),
    )))
}

#[openapi(tag = "Application Fee")]
#[get("/application-fee/verify?<reference>")]
pub async fn verify_payment(
    svc: &State<ApplicationFeeService>,
    _auth: AuthGuard,
    reference: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if reference.is_empty() {
        return Err(ApiError::bad_request("Payment reference is required"));
    }

    let fee = svc.verify_payment(&reference).await.map_err(ApiError::from)?;

    Ok(Json(ApiResponse::success_with_message(
        "Application fee verified successfully".to_string(),
        serde_json::json!(fee),
    )))
}

#[openapi(tag = "Application Fee")]
#[get("/application-fee/status")]
pub async fn get_status(
    svc: &State<ApplicationFeeService>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let fee = svc
        .get_user_fee(&auth.user_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("No application fee payment found"))?;

    Ok(Json(ApiResponse::success(serde_json::json!(fee))))
}

#[openapi(tag = "Application Fee")]
#[get("/application-fee/check")]
pub async fn check_paid(
    svc: &State<ApplicationFeeService>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let paid = svc
        .has_user_paid(&auth.user_id)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "has_paid": paid
    }))))
}
