//! Routes for knowledge articles, their editors and their histories.

use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    history::KnowledgeHistory,
    knowledge::{CreateKnowledge, Knowledge, UpdateKnowledge},
};
use serde::{Deserialize, Serialize};
use services::services::knowledge::KnowledgeDetail;
use ts_rs::TS;
use utils::{pagination::Page, response::ApiResponse};

use super::ListParams;
use crate::{
    error::ApiError,
    extract::{ApiJson, ApiPath},
    identity::CurrentIdentity,
    state::AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ReplaceEditors {
    pub editors: Vec<i64>,
}

pub async fn list_knowledge(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    params: ListParams,
) -> Result<ResponseJson<ApiResponse<Page<Knowledge>>>, ApiError> {
    let window = params.window_with_limit(state.config().page_limits.knowledge);
    let page = state
        .knowledge()
        .list(&identity, params.get("keyword"), window)
        .await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn list_user_knowledge(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiPath(user_id): ApiPath<i64>,
    params: ListParams,
) -> Result<ResponseJson<ApiResponse<Page<Knowledge>>>, ApiError> {
    let window = params.window_with_limit(state.config().page_limits.knowledge);
    let page = state
        .knowledge()
        .list_by_user(&identity, user_id, window)
        .await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn create_knowledge(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiJson(payload): ApiJson<CreateKnowledge>,
) -> Result<ResponseJson<ApiResponse<KnowledgeDetail>>, ApiError> {
    let detail = state.knowledge().create(&identity, payload).await?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

pub async fn get_knowledge(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiPath(knowledge_id): ApiPath<i64>,
) -> Result<ResponseJson<ApiResponse<KnowledgeDetail>>, ApiError> {
    let detail = state.knowledge().get(&identity, knowledge_id).await?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

pub async fn update_knowledge(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiPath(knowledge_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdateKnowledge>,
) -> Result<ResponseJson<ApiResponse<KnowledgeDetail>>, ApiError> {
    let detail = state.knowledge().update(&identity, knowledge_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

pub async fn delete_knowledge(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiPath(knowledge_id): ApiPath<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.knowledge().delete(&identity, knowledge_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_editors(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiPath(knowledge_id): ApiPath<i64>,
) -> Result<ResponseJson<ApiResponse<Vec<i64>>>, ApiError> {
    let editors = state.knowledge().editors(&identity, knowledge_id).await?;
    Ok(ResponseJson(ApiResponse::success(editors)))
}

pub async fn replace_editors(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiPath(knowledge_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<ReplaceEditors>,
) -> Result<ResponseJson<ApiResponse<Vec<i64>>>, ApiError> {
    let editors = state
        .knowledge()
        .replace_editors(&identity, knowledge_id, &payload.editors)
        .await?;
    Ok(ResponseJson(ApiResponse::success(editors)))
}

pub async fn list_histories(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiPath(knowledge_id): ApiPath<i64>,
    params: ListParams,
) -> Result<ResponseJson<ApiResponse<Page<KnowledgeHistory>>>, ApiError> {
    let window = params.window(state.config().page_limits.histories);
    let page = state
        .knowledge()
        .histories(&identity, knowledge_id, window)
        .await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn get_history(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiPath((knowledge_id, history_no)): ApiPath<(i64, i64)>,
) -> Result<ResponseJson<ApiResponse<KnowledgeHistory>>, ApiError> {
    let history = state
        .knowledge()
        .history(&identity, knowledge_id, history_no)
        .await?;
    Ok(ResponseJson(ApiResponse::success(history)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/knowledge", get(list_knowledge).post(create_knowledge))
        .route(
            "/knowledge/{id}",
            get(get_knowledge).put(update_knowledge).delete(delete_knowledge),
        )
        .route("/knowledge/{id}/editors", get(get_editors).put(replace_editors))
        .route("/knowledge/{id}/histories", get(list_histories))
        .route("/knowledge/{id}/histories/{history_no}", get(get_history))
        .route("/users/{user_id}/knowledge", get(list_user_knowledge))
}
