use crate::model::ErrorResponse;
use crate::shortener::{ResolveError, ShortenError};
use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Failures as seen by HTTP clients. The display text is the `error` field
/// of the JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid url")]
    InvalidUrl,
    #[error("Wrong format")]
    WrongFormat,
    #[error("No short URL found for the given input")]
    NotFound,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("server error")]
    ServerError,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidUrl | ApiError::WrongFormat => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}

pub fn internal_error<E>(err: E) -> ApiError
where
    E: std::error::Error,
{
    tracing::error!("{}", err);
    ApiError::ServerError
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        internal_error(err)
    }
}

impl From<ShortenError> for ApiError {
    fn from(err: ShortenError) -> Self {
        match err {
            ShortenError::InvalidUrl(rejection) => {
                tracing::debug!("Rejected url: {}", rejection);
                ApiError::InvalidUrl
            }
            ShortenError::StoreUnavailable(err) => internal_error(err),
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::MalformedCode(_) => ApiError::WrongFormat,
            ResolveError::NotFound(_) => ApiError::NotFound,
            ResolveError::StoreUnavailable(err) => internal_error(err),
        }
    }
}
