use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{
    api::state::AppState,
    domain::User,
    error::AppError,
};

/// The authenticated principal. Extracted per handler; also placed into
/// request extensions by `require_admin` so the extractor reuses it.
#[derive(Clone)]
pub struct CurrentUser {
    pub user: User,
}

/// Accepts either the session cookie or an `Authorization: Bearer` header,
/// so browser and API clients share one session mechanism.
fn extract_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get("session") {
        return Some(cookie.value().to_string());
    }

    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

async fn resolve_user(state: &AppState, parts: &Parts) -> Result<User, AppError> {
    let token = extract_token(parts).ok_or(AppError::Unauthorized)?;

    let session = state.service_context.auth_service
        .validate_session(&token)
        .await?
        .ok_or(AppError::Unauthorized)?;

    // Deleted accounts lose their sessions implicitly.
    state.service_context.user_repo
        .find_by_id(session.user_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Middleware further up may have authenticated already.
        if let Some(current) = parts.extensions.get::<CurrentUser>() {
            return Ok(current.clone());
        }

        let user = resolve_user(state, parts).await?;
        Ok(CurrentUser { user })
    }
}

/// Gate for the admin router: every route behind it requires an admin
/// principal.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    let user = resolve_user(&state, &parts).await?;

    if !user.is_admin() {
        return Err(AppError::Forbidden);
    }

    parts.extensions.insert(CurrentUser { user });
    request = Request::from_parts(parts, body);

    Ok(next.run(request).await)
}
