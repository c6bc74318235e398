use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use serde::Serialize;
use services::services::{
    access_control::AccessError,
    config::{ExposeType, PageLimits},
};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{error::ApiError, identity::CurrentIdentity, state::AppState};

#[derive(Debug, Clone, Serialize, TS)]
pub struct SystemInfo {
    pub version: String,
    pub expose_type: ExposeType,
    pub page_limits: PageLimits,
}

/// Admin only. The article rules never consult the role; this path does.
pub async fn system_info(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<ResponseJson<ApiResponse<SystemInfo>>, ApiError> {
    if !state.resolver().can_administer(&identity) {
        return Err(AccessError::denied(&identity).into());
    }
    Ok(ResponseJson(ApiResponse::success(SystemInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        expose_type: state.config().expose_type,
        page_limits: state.config().page_limits,
    })))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/admin/system", get(system_info))
}
