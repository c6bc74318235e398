use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::comment::{CreateComment, UpdateComment};
use services::services::comment::CommentView;
use utils::{pagination::Page, response::ApiResponse};

use super::ListParams;
use crate::{
    error::ApiError,
    extract::{ApiJson, ApiPath},
    identity::CurrentIdentity,
    state::AppState,
};

pub async fn list_comments(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiPath(knowledge_id): ApiPath<i64>,
    params: ListParams,
) -> Result<ResponseJson<ApiResponse<Page<CommentView>>>, ApiError> {
    let window = params.window(state.config().page_limits.comments);
    let page = state.comments().list(&identity, knowledge_id, window).await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn create_comment(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiPath(knowledge_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<CreateComment>,
) -> Result<ResponseJson<ApiResponse<CommentView>>, ApiError> {
    let comment = state.comments().create(&identity, knowledge_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(comment)))
}

pub async fn update_comment(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiPath(comment_no): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdateComment>,
) -> Result<ResponseJson<ApiResponse<CommentView>>, ApiError> {
    let comment = state.comments().update(&identity, comment_no, payload).await?;
    Ok(ResponseJson(ApiResponse::success(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiPath(comment_no): ApiPath<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.comments().delete(&identity, comment_no).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/knowledge/{id}/comments", get(list_comments).post(create_comment))
        .route("/comments/{comment_no}", put(update_comment).delete(delete_comment))
}
