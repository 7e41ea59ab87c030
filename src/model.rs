use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UrlMapping {
    pub original_url: String,
    #[serde(rename = "short_url")]
    pub short_code: i64,
    pub created_at: DateTime<Utc>,
}

impl UrlMapping {
    pub fn new(original_url: impl Into<String>, short_code: i64) -> Self {
        Self {
            original_url: original_url.into(),
            short_code,
            created_at: Utc::now(),
        }
    }
}

/// Body of `POST /api/shorturl`, either JSON or url-encoded.
#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ShortenResponse {
    pub original_url: String,
    pub short_url: i64,
}

impl From<UrlMapping> for ShortenResponse {
    fn from(mapping: UrlMapping) -> Self {
        Self {
            original_url: mapping.original_url,
            short_url: mapping.short_code,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}
