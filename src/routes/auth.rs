use mongodb::bson::{oid::ObjectId, DateTime};
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use validator::Validate;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{LoginDto, RefreshTokenDto, RegisterDto, User, UserResponse, UserRole, UserStatus};
use crate::repos::UserRepo;
use crate::services::{EmailService, JwtService};
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Auth")]
#[post("/auth/register", data = "<dto>")]
pub async fn register(
    db: &State<DbConn>,
    dto: Json<RegisterDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    dto.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let users = UserRepo::new(db);
    let email = dto.email.trim().to_lowercase();

    if users
        .find_by_email(&email)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .is_some()
    {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let password_hash = bcrypt::hash(&dto.password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let now = DateTime::now();
    let user = User {
        id: None,
        first_name: dto.first_name.trim().to_string(),
        last_name: dto.last_name.trim().to_string(),
        email: email.clone(),
        password: password_hash,
        role: UserRole::Student,
        status: UserStatus::Active,
        application_fee_paid: false,
        phone_number: dto.phone_number.clone(),
        created_at: now,
        updated_at: now,
    };

    let user = users
        .create(user)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    let user_id = user
        .id
        .ok_or_else(|| ApiError::internal_error("Invalid user ID"))?;

    let first_name = user.first_name.clone();
    let welcome_to = email.clone();
    rocket::tokio::spawn(async move {
        EmailService::send_welcome_email(&welcome_to, &first_name).await;
    });

    let access_token = JwtService::generate_access_token(&user_id, &email, user.role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    let refresh_token = JwtService::generate_refresh_token(&user_id, &email, user.role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success_with_message(
        "Account created successfully".to_string(),
        serde_json::json!({
            "user": UserResponse::from(user),
            "access_token": access_token,
            "refresh_token": refresh_token,
        }),
    )))
}

#[openapi(tag = "Auth")]
#[post("/auth/login", data = "<dto>")]
pub async fn login(
    db: &State<DbConn>,
    dto: Json<LoginDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let users = UserRepo::new(db);
    let email = dto.email.trim().to_lowercase();

    let user = users
        .find_by_email(&email)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let valid = bcrypt::verify(&dto.password, &user.password)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    if !valid {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    if user.status != UserStatus::Active {
        return Err(ApiError::forbidden("Account is not active"));
    }

    let user_id = user
        .id
        .ok_or_else(|| ApiError::internal_error("Invalid user ID"))?;

    let access_token = JwtService::generate_access_token(&user_id, &user.email, user.role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    let refresh_token = JwtService::generate_refresh_token(&user_id, &user.email, user.role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "user": UserResponse::from(user),
        "access_token": access_token,
        "refresh_token": refresh_token,
    }))))
}

#[openapi(tag = "Auth")]
#[post("/auth/refresh", data = "<dto>")]
pub async fn refresh_token(
    db: &State<DbConn>,
    dto: Json<RefreshTokenDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let claims = JwtService::verify_token(&dto.refresh_token, true)
        .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

    let user_id = ObjectId::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

    let users = UserRepo::new(db);
    let user = users
        .find_by_id(&user_id)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;

    if user.status != UserStatus::Active {
        return Err(ApiError::forbidden("Account is not active"));
    }

    let access_token = JwtService::generate_access_token(&user_id, &user.email, user.role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    let refresh_token = JwtService::generate_refresh_token(&user_id, &user.email, user.role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
    }))))
}

#[openapi(tag = "Auth")]
#[get("/auth/me")]
pub async fn get_me(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let users = UserRepo::new(db);
    let user = users
        .find_by_id(&auth.user_id)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::success(UserResponse::from(user))))
}
