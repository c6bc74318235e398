use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use services::services::access_control::Identity;

/// Set by the upstream authentication proxy.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The caller's identity. Never rejects: missing or malformed headers mean anonymous.
#[derive(Debug, Clone, Copy)]
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| parts.headers.get(name).and_then(|value| value.to_str().ok());
        Ok(CurrentIdentity(Identity::from_session(
            header(USER_ID_HEADER),
            header(USER_ROLE_HEADER),
        )))
    }
}
