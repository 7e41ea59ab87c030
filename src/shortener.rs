use crate::model::UrlMapping;
use crate::store::{MappingStore, StoreError};
use crate::validator::{Rejection, UrlValidator};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShortenError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] Rejection),
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("'{0}' is not a short code")]
    MalformedCode(String),
    #[error("no mapping for short code {0}")]
    NotFound(i64),
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

/// Creates and resolves short codes on top of a [`MappingStore`].
#[derive(Clone)]
pub struct Shortener {
    store: Arc<dyn MappingStore>,
    validator: UrlValidator,
}

impl Shortener {
    pub fn new(store: Arc<dyn MappingStore>, validator: UrlValidator) -> Self {
        Self { store, validator }
    }

    /// Returns the mapping for `raw`, creating one if the url was never seen.
    ///
    /// The lookup by url always happens before a code is allocated, so
    /// submitting a known url never consumes a new code. Store failures are
    /// reported once and not retried.
    pub async fn shorten(&self, raw: &str) -> Result<UrlMapping, ShortenError> {
        let validated = self.validator.validate(raw).await?;

        if let Some(existing) = self.store.find_by_url(&validated.original_url).await? {
            return Ok(existing);
        }
        Ok(self.store.insert_next(&validated.original_url).await?)
    }

    pub async fn resolve(&self, code_text: &str) -> Result<String, ResolveError> {
        let short_code = parse_code(code_text)
            .ok_or_else(|| ResolveError::MalformedCode(code_text.into()))?;

        self.store
            .find_by_code(short_code)
            .await?
            .map(|mapping| mapping.original_url)
            .ok_or(ResolveError::NotFound(short_code))
    }

    pub async fn list_all(&self) -> Result<Vec<UrlMapping>, StoreError> {
        self.store.list_all().await
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        self.store.count().await
    }
}

/// Reads the leading integer of `code_text`: optional whitespace and sign,
/// then decimal digits, anything after them is ignored. `None` when there are
/// no digits. Values beyond `i64` saturate and simply match no mapping.
fn parse_code(code_text: &str) -> Option<i64> {
    let trimmed = code_text.trim_start();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits = unsigned.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let value = unsigned[..digits].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -value } else { value })
}
