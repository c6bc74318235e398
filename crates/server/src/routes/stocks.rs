use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    knowledge::Knowledge,
    stock::{CreateStock, Stock},
};
use utils::{pagination::Page, response::ApiResponse};

use super::ListParams;
use crate::{
    error::ApiError,
    extract::{ApiJson, ApiPath},
    identity::CurrentIdentity,
    state::AppState,
};

pub async fn list_stocked_knowledge(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    params: ListParams,
) -> Result<ResponseJson<ApiResponse<Page<Knowledge>>>, ApiError> {
    let stock_id = match params.get("stock_id").map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<i64>()
                .map_err(|_| ApiError::BadRequest(format!("invalid stock_id: {raw}")))?,
        ),
        None => None,
    };
    let window = params.window(state.config().page_limits.stocks);
    let page = state
        .stocks()
        .list_knowledges(&identity, stock_id, window)
        .await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn create_folder(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiJson(payload): ApiJson<CreateStock>,
) -> Result<ResponseJson<ApiResponse<Stock>>, ApiError> {
    let stock = state.stocks().create_folder(&identity, payload).await?;
    Ok(ResponseJson(ApiResponse::success(stock)))
}

pub async fn list_folders(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<ResponseJson<ApiResponse<Vec<Stock>>>, ApiError> {
    let folders = state.stocks().list_folders(&identity).await?;
    Ok(ResponseJson(ApiResponse::success(folders)))
}

pub async fn add_to_folder(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ApiPath((stock_id, knowledge_id)): ApiPath<(i64, i64)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state
        .stocks()
        .add_knowledge(&identity, stock_id, knowledge_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/stocks", get(list_stocked_knowledge).post(create_folder))
        .route("/stocks/folders", get(list_folders))
        .route("/stocks/{stock_id}/knowledge/{id}", post(add_to_folder))
}
