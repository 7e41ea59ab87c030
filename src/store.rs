pub mod memory;
pub mod postgres;

use crate::model::UrlMapping;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
    #[error("store operation timed out: {0}")]
    Timeout(String),
    #[error("mapping already exists: {0}")]
    Conflict(String),
    #[error("store query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
}

/// Persistence for url mappings.
///
/// `insert_next` is the only way new codes should be handed out: it performs
/// the existence check, the count and the insert as one atomic step so that
/// concurrent creators neither duplicate a url nor reuse a short code.
#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn find_by_url(&self, original_url: &str) -> Result<Option<UrlMapping>, StoreError>;

    async fn find_by_code(&self, short_code: i64) -> Result<Option<UrlMapping>, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    /// Stores a mapping as is. Fails with [`StoreError::Conflict`] when the
    /// short code or the url is already taken.
    ///
    /// New codes come from `insert_next`; this exists to seed mappings and to
    /// check the uniqueness constraints, which only the tests do.
    #[cfg_attr(not(test), allow(dead_code))]
    async fn insert(&self, mapping: UrlMapping) -> Result<UrlMapping, StoreError>;

    /// Returns the mapping for `original_url`, creating it with the next
    /// short code if it does not exist yet.
    async fn insert_next(&self, original_url: &str) -> Result<UrlMapping, StoreError>;

    /// All mappings ordered by short code.
    async fn list_all(&self) -> Result<Vec<UrlMapping>, StoreError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Store whose every call fails with the given error.
    pub struct FailingStore(pub StoreError);

    impl FailingStore {
        pub fn unavailable() -> Self {
            Self(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[async_trait]
    impl MappingStore for FailingStore {
        async fn find_by_url(&self, _: &str) -> Result<Option<UrlMapping>, StoreError> {
            Err(self.0.clone())
        }

        async fn find_by_code(&self, _: i64) -> Result<Option<UrlMapping>, StoreError> {
            Err(self.0.clone())
        }

        async fn count(&self) -> Result<i64, StoreError> {
            Err(self.0.clone())
        }

        async fn insert(&self, _: UrlMapping) -> Result<UrlMapping, StoreError> {
            Err(self.0.clone())
        }

        async fn insert_next(&self, _: &str) -> Result<UrlMapping, StoreError> {
            Err(self.0.clone())
        }

        async fn list_all(&self) -> Result<Vec<UrlMapping>, StoreError> {
            Err(self.0.clone())
        }
    }
}
