use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use manafiles_core::password_reset::{ConfirmReset, RequestReset, ResetTicket, VerifyReset};
use manafiles_core::user::{Login, Signup};
use manafiles_core::Session;
use manafiles_service::{FileService, ServiceError};

use super::{to_error, ApiError, AppState};
use crate::auth::Caller;

/// Routes that never look at the `Authorization` header.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/signup", post(signup))
        .route("/api/login", post(login))
        .route("/api/password-reset/request", post(request_reset))
        .route("/api/password-reset/verify", post(verify_reset))
        .route("/api/password-reset/confirm", post(confirm_reset))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/logout", post(logout))
        .route("/api/me", get(me))
}

pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v)
        .map_err(|rej| to_error(ServiceError::InvalidInput(rej.body_text())))
}

/// Create the account and log it in, so the client lands on the dashboard.
async fn signup(
    State(state): State<AppState>,
    body: Result<Json<Signup>, JsonRejection>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let input = json_body(body)?;
    let user = state.service.signup(&input).await.map_err(to_error)?;
    let session = state
        .service
        .login(&Login {
            username: user.username,
            password: input.password,
        })
        .await
        .map_err(to_error)?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn login(
    State(state): State<AppState>,
    body: Result<Json<Login>, JsonRejection>,
) -> Result<Json<Session>, ApiError> {
    let input = json_body(body)?;
    state
        .service
        .login(&input)
        .await
        .map(Json)
        .map_err(to_error)
}

async fn logout(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<StatusCode, ApiError> {
    let session = caller.require()?;
    state
        .service
        .logout(session)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(to_error)
}

async fn me(Extension(caller): Extension<Caller>) -> Result<Json<Session>, ApiError> {
    caller.require().map(|s| Json(s.clone()))
}

async fn request_reset(
    State(state): State<AppState>,
    body: Result<Json<RequestReset>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let input = json_body(body)?;
    state
        .service
        .request_password_reset(&input)
        .await
        .map(|_| StatusCode::ACCEPTED)
        .map_err(to_error)
}

async fn verify_reset(
    State(state): State<AppState>,
    body: Result<Json<VerifyReset>, JsonRejection>,
) -> Result<Json<ResetTicket>, ApiError> {
    let input = json_body(body)?;
    state
        .service
        .verify_reset_code(&input)
        .await
        .map(Json)
        .map_err(to_error)
}

async fn confirm_reset(
    State(state): State<AppState>,
    body: Result<Json<ConfirmReset>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let input = json_body(body)?;
    state
        .service
        .reset_password(&input)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(to_error)
}
