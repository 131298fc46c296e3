use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use manafiles_core::Session;
use manafiles_service::{FileService, ServiceError};

use crate::routes::{to_error, ApiError, AppState};

/// The identity attached to a request by `auth_middleware`.
/// `None` means no `Authorization` header was sent.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<Session>);

impl Caller {
    pub fn session(&self) -> Option<&Session> {
        self.0.as_ref()
    }

    /// The session, or a 401 for anonymous callers.
    pub fn require(&self) -> Result<&Session, ApiError> {
        self.0
            .as_ref()
            .ok_or_else(|| to_error(ServiceError::Unauthorized("login required".into())))
    }
}

/// Resolve an optional `Authorization: Bearer <token>` header into a [`Caller`].
///
/// Requests without the header continue anonymously; a malformed header or a
/// token that does not map to a live session is rejected with 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request.headers().get(AUTHORIZATION) {
        None => None,
        Some(value) => match bearer_token(value.to_str().ok()) {
            Some(t) => Some(t.to_string()),
            None => {
                return to_error(ServiceError::Unauthorized(
                    "malformed authorization header".into(),
                ))
                .into_response()
            }
        },
    };

    let session = match token {
        None => None,
        Some(token) => match state.service.authenticate(&token).await {
            Ok(session) => Some(session),
            Err(e) => return to_error(e).into_response(),
        },
    };

    request.extensions_mut().insert(Caller(session));
    next.run(request).await
}

fn bearer_token(header: Option<&str>) -> Option<&str> {
    header?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
