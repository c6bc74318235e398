use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::like::Like;
use services::services::like::LikeToggle;
use utils::{pagination::Page, response::ApiResponse};

use super::ListParams;
use crate::{error::ApiError, extract::ApiPath, identity::CurrentIdentity, state::AppState};

pub async fn list_likes(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiPath(knowledge_id): ApiPath<i64>,
    params: ListParams,
) -> Result<ResponseJson<ApiResponse<Page<Like>>>, ApiError> {
    let window = params.window(state.config().page_limits.likes);
    let page = state.likes().list(&identity, knowledge_id, window).await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiPath(knowledge_id): ApiPath<i64>,
) -> Result<ResponseJson<ApiResponse<LikeToggle>>, ApiError> {
    let toggled = state.likes().toggle(&identity, knowledge_id).await?;
    Ok(ResponseJson(ApiResponse::success(toggled)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/knowledge/{id}/likes", get(list_likes).post(toggle_like))
}
