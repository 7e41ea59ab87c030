use crate::error::ApiError;
use crate::routes::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use sha3::{Digest, Sha3_256};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Guards a route with the `x-api-key` header when an encrypted key is
/// configured. Without one the route stays open.
pub async fn auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(encrypted_api_key) = state.encrypted_api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided_api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Unauthorized call to {}", request.uri());
            ApiError::Unauthorized
        })?;

    if encrypt_api_key(provided_api_key) != encrypted_api_key {
        tracing::warn!("Unauthorized call to {} (invalid key)", request.uri());
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

/// Lowercase hex SHA3-256 of the key, the format expected in `ENCRYPTED_API_KEY`.
pub fn encrypt_api_key(api_key: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(api_key.as_bytes());
    format!("{:x}", hasher.finalize())
}
