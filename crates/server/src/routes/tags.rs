use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::tag::TagWithCount;
use utils::{pagination::Page, response::ApiResponse};

use super::ListParams;
use crate::{error::ApiError, identity::CurrentIdentity, state::AppState};

pub async fn list_tags(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    params: ListParams,
) -> Result<ResponseJson<ApiResponse<Page<TagWithCount>>>, ApiError> {
    let window = params.window(state.config().page_limits.tags);
    let page = state.tags().list(&identity, window).await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/tags", get(list_tags))
}
