use axum::{extract::State, routing::get, Extension, Json, Router};
use manafiles_core::category::CategorySummary;
use manafiles_service::FileService;

use super::{to_error, ApiError, AppState};
use crate::auth::Caller;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/categories", get(list_categories))
}

/// Every category with its dashboard text and the caller's file count.
async fn list_categories(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<CategorySummary>>, ApiError> {
    state
        .service
        .category_summary(caller.session())
        .await
        .map(Json)
        .map_err(to_error)
}
