use crate::allocator::allocate_next;
use crate::model::UrlMapping;
use crate::store::{MappingStore, StoreError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Indexes {
    by_code: BTreeMap<i64, UrlMapping>,
    by_url: HashMap<String, i64>,
}

impl Indexes {
    fn insert(&mut self, mapping: UrlMapping) -> Result<UrlMapping, StoreError> {
        if self.by_code.contains_key(&mapping.short_code) {
            return Err(StoreError::Conflict(format!(
                "short code {} is taken",
                mapping.short_code
            )));
        }
        if self.by_url.contains_key(&mapping.original_url) {
            return Err(StoreError::Conflict(format!(
                "{} is already shortened",
                mapping.original_url
            )));
        }
        self.by_url
            .insert(mapping.original_url.clone(), mapping.short_code);
        self.by_code.insert(mapping.short_code, mapping.clone());
        Ok(mapping)
    }
}

/// In-process store. Both indexes sit behind one lock so `insert_next` is
/// atomic with respect to every other writer.
#[derive(Debug, Default)]
pub struct MemoryStore {
    indexes: RwLock<Indexes>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MappingStore for MemoryStore {
    async fn find_by_url(&self, original_url: &str) -> Result<Option<UrlMapping>, StoreError> {
        let indexes = self.indexes.read().await;
        Ok(indexes
            .by_url
            .get(original_url)
            .and_then(|code| indexes.by_code.get(code))
            .cloned())
    }

    async fn find_by_code(&self, short_code: i64) -> Result<Option<UrlMapping>, StoreError> {
        Ok(self.indexes.read().await.by_code.get(&short_code).cloned())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.indexes.read().await.by_code.len() as i64)
    }

    async fn insert(&self, mapping: UrlMapping) -> Result<UrlMapping, StoreError> {
        self.indexes.write().await.insert(mapping)
    }

    async fn insert_next(&self, original_url: &str) -> Result<UrlMapping, StoreError> {
        let mut indexes = self.indexes.write().await;
        if let Some(existing) = indexes
            .by_url
            .get(original_url)
            .and_then(|code| indexes.by_code.get(code))
        {
            return Ok(existing.clone());
        }
        let short_code = allocate_next(indexes.by_code.len() as i64);
        indexes.insert(UrlMapping::new(original_url, short_code))
    }

    async fn list_all(&self) -> Result<Vec<UrlMapping>, StoreError> {
        Ok(self.indexes.read().await.by_code.values().cloned().collect())
    }
}
