use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use utils::response::ApiResponse;

use crate::{error::ApiError, state::AppState};

/// Liveness plus a trivial database round trip.
pub async fn health(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<String>>, ApiError> {
    sqlx::query("SELECT 1").execute(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success("ok".to_string())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/health", get(health))
}
