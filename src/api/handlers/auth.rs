use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{CreateUserRequest, User, UserRole},
    error::{AppError, Result},
    repository::user_repository,
};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub full_name: String,
    pub phone: Option<String>,
    #[validate(length(min = 8))]
    pub password: String,
    pub role: UserRole,
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub can_create_garage: bool,
    pub created_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            phone: user.phone,
            role: user.role,
            can_create_garage: user.can_create_garage,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserDto>)> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = state.service_context.user_service
        .register(CreateUserRequest {
            email: req.email,
            full_name: req.full_name,
            phone: req.phone,
            password: req.password,
            role: req.role,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserDto,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    // Attempts are counted in the store, so the limit holds across
    // server instances.
    let limit_key = format!("login:{}", req.email.to_lowercase());
    state.service_context.rate_limit_service
        .hit(
            &limit_key,
            state.settings.auth.login_attempt_limit,
            state.settings.auth.login_window_seconds,
        )
        .await?;

    let password_hash =
        user_repository::get_password_hash(&state.service_context.db_pool, &req.email)
            .await?
            .ok_or(AppError::Unauthorized)?;

    if !crate::auth::AuthService::verify_password(&req.password, &password_hash).await? {
        return Err(AppError::Unauthorized);
    }

    let user = state.service_context.user_repo
        .find_by_email(&req.email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let (_session, token) = state.service_context.auth_service
        .create_session(user.id, state.settings.auth.session_duration_hours)
        .await?;

    state.service_context.rate_limit_service.reset(&limit_key).await?;

    let cookie = state.service_context.auth_service
        .create_session_cookie(&token, false);

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            token,
            user: user.into(),
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode)> {
    if let Some(session_cookie) = jar.get("session") {
        // Invalidate session in database
        let _ = state.service_context.auth_service
            .invalidate_session(session_cookie.value())
            .await;
    }

    // Remove cookie
    let jar = jar.add(crate::auth::AuthService::create_logout_cookie());

    Ok((jar, StatusCode::NO_CONTENT))
}

pub async fn me(
    current: CurrentUser,
) -> Result<Json<UserDto>> {
    Ok(Json(current.user.into()))
}
