use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::Error;

/// Caller identity at this transport-agnostic boundary: the authenticated
/// user id, forwarded by the gateway in `X-User-Id`.
#[derive(Debug, Clone, Copy)]
pub struct Identity(pub Uuid);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Unauthorized("Missing X-User-Id header".to_string()))?;
        let user_id = raw
            .parse::<Uuid>()
            .map_err(|_| Error::Unauthorized("Malformed X-User-Id header".to_string()))?;
        Ok(Identity(user_id))
    }
}
