use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    access_control::AccessError, comment::CommentServiceError, knowledge::KnowledgeServiceError,
    like::LikeServiceError, stock::StockServiceError, tag::TagServiceError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Knowledge(#[from] KnowledgeServiceError),
    #[error(transparent)]
    Comment(#[from] CommentServiceError),
    #[error(transparent)]
    Like(#[from] LikeServiceError),
    #[error(transparent)]
    Tag(#[from] TagServiceError),
    #[error(transparent)]
    Stock(#[from] StockServiceError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Path(#[from] PathRejection),
    #[error(transparent)]
    Json(#[from] JsonRejection),
    #[error("{0}")]
    BadRequest(String),
}

fn access_status(error: &AccessError) -> StatusCode {
    match error {
        AccessError::Unauthenticated => StatusCode::UNAUTHORIZED,
        AccessError::Forbidden => StatusCode::FORBIDDEN,
        AccessError::NotFound => StatusCode::NOT_FOUND,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Access(e)
            | ApiError::Knowledge(KnowledgeServiceError::Access(e))
            | ApiError::Comment(CommentServiceError::Access(e))
            | ApiError::Like(LikeServiceError::Access(e))
            | ApiError::Stock(StockServiceError::Access(e)) => access_status(e),
            ApiError::Knowledge(KnowledgeServiceError::Validation(_))
            | ApiError::Comment(CommentServiceError::EmptyComment)
            | ApiError::Stock(StockServiceError::EmptyName)
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Path(e) => e.status(),
            ApiError::Json(e) => e.status(),
            ApiError::Knowledge(KnowledgeServiceError::Database(_))
            | ApiError::Comment(CommentServiceError::Database(_))
            | ApiError::Like(LikeServiceError::Database(_))
            | ApiError::Tag(TagServiceError::Database(_))
            | ApiError::Stock(StockServiceError::Database(_))
            | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "internal server error".to_string()
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request refused");
            self.to_string()
        };
        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}
