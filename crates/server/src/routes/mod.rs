use std::convert::Infallible;

use axum::{
    Router,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utils::pagination::{PageWindow, parse_limit, parse_offset};

use crate::state::AppState;

pub mod admin;
pub mod comments;
pub mod health;
pub mod knowledge;
pub mod likes;
pub mod stocks;
pub mod tags;

/// Raw query-string pairs for list endpoints.
///
/// Never rejects: values stay strings so malformed paging clamps, and when a key
/// repeats the first occurrence wins.
#[derive(Debug, Default, Clone)]
pub struct ListParams(Vec<(String, String)>);

impl<S> FromRequestParts<S> for ListParams
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let pairs = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map(|Query(pairs)| pairs)
            .unwrap_or_default();
        Ok(ListParams(pairs))
    }
}

impl ListParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    }

    /// `offset`, or its `page` alias when `offset` is absent.
    pub fn offset(&self) -> Option<&str> {
        self.get("offset").or_else(|| self.get("page"))
    }

    /// Server-chosen page size.
    pub fn window(&self, limit: usize) -> PageWindow {
        PageWindow::parse(self.offset(), limit)
    }

    /// Client-chosen `limit`, clamped to the allowed range.
    pub fn window_with_limit(&self, default_limit: usize) -> PageWindow {
        PageWindow::new(
            parse_offset(self.offset()),
            parse_limit(self.get("limit"), default_limit),
        )
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(health::router(&state))
        .merge(knowledge::router(&state))
        .merge(comments::router(&state))
        .merge(likes::router(&state))
        .merge(tags::router(&state))
        .merge(stocks::router(&state))
        .merge(admin::router(&state));

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn params(uri: &str) -> ListParams {
        let (mut parts, ()) = Request::get(uri).body(()).unwrap().into_parts();
        let Ok(params) = ListParams::from_request_parts(&mut parts, &()).await;
        params
    }

    #[tokio::test]
    async fn test_first_occurrence_wins() {
        let p = params("/x?offset=1&offset=2&page=3").await;
        assert_eq!(p.offset(), Some("1"));
        assert_eq!(p.window(10).offset(), 1);
    }

    #[tokio::test]
    async fn test_page_is_an_alias_for_offset() {
        assert_eq!(params("/x?page=4&page=0").await.window(10).offset(), 4);
        assert_eq!(params("/x?page=4&offset=2").await.window(10).offset(), 2);
    }

    #[tokio::test]
    async fn test_malformed_query_clamps() {
        let p = params("/x?offset=-3&limit=abc").await;
        let window = p.window_with_limit(50);
        assert_eq!((window.offset(), window.limit()), (0, 50));
        assert_eq!(params("/x").await.window(20).offset(), 0);
        assert_eq!(params("/x?limit=500").await.window_with_limit(50).limit(), 100);
    }
}
