use crate::allocator::allocate_next;
use crate::model::UrlMapping;
use crate::store::{MappingStore, StoreError};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;

const CREATE_TABLE: &str = r#"
    create table if not exists url_mappings (
        short_code bigint primary key,
        original_url text not null unique,
        created_at timestamptz not null default now()
    )
"#;

/// Key of the transaction scoped advisory lock serializing code allocation.
const ALLOCATION_LOCK_KEY: i64 = 0x7572_6c5f_6d61_70;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, timeout_in_millis: u64) -> Self {
        Self {
            pool,
            timeout: Duration::from_millis(timeout_in_millis),
        }
    }

    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        timeout_in_millis: u64,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool, timeout_in_millis))
    }

    pub async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn with_timeout<T, F>(&self, task: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        tokio::time::timeout(self.timeout, task)
            .await
            .map_err(|_| StoreError::Timeout(format!("no answer within {:?}", self.timeout)))?
            .map_err(map_sqlx_error)
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    let message = err.to_string();

    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Conflict(message)
        }
        sqlx::Error::PoolTimedOut => StoreError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StoreError::InvalidData(message),
        _ => StoreError::Query(message),
    }
}

#[async_trait]
impl MappingStore for PgStore {
    async fn find_by_url(&self, original_url: &str) -> Result<Option<UrlMapping>, StoreError> {
        self.with_timeout(
            sqlx::query_as::<_, UrlMapping>(
                "select original_url, short_code, created_at from url_mappings where original_url = $1",
            )
            .bind(original_url)
            .fetch_optional(&self.pool),
        )
        .await
    }

    async fn find_by_code(&self, short_code: i64) -> Result<Option<UrlMapping>, StoreError> {
        self.with_timeout(
            sqlx::query_as::<_, UrlMapping>(
                "select original_url, short_code, created_at from url_mappings where short_code = $1",
            )
            .bind(short_code)
            .fetch_optional(&self.pool),
        )
        .await
    }

    async fn count(&self) -> Result<i64, StoreError> {
        self.with_timeout(
            sqlx::query_scalar::<_, i64>("select count(*) from url_mappings")
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn insert(&self, mapping: UrlMapping) -> Result<UrlMapping, StoreError> {
        self.with_timeout(
            sqlx::query_as::<_, UrlMapping>(
                r#"
                  insert into url_mappings(short_code, original_url, created_at) values ($1, $2, $3)
                  returning original_url, short_code, created_at
                "#,
            )
            .bind(mapping.short_code)
            .bind(&mapping.original_url)
            .bind(mapping.created_at)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn insert_next(&self, original_url: &str) -> Result<UrlMapping, StoreError> {
        self.with_timeout(async {
            let mut tx = self.pool.begin().await?;
            sqlx::query("select pg_advisory_xact_lock($1)")
                .bind(ALLOCATION_LOCK_KEY)
                .execute(&mut *tx)
                .await?;

            let existing: Option<UrlMapping> = sqlx::query_as(
                "select original_url, short_code, created_at from url_mappings where original_url = $1",
            )
            .bind(original_url)
            .fetch_optional(&mut *tx)
            .await?;

            let mapping = match existing {
                Some(mapping) => mapping,
                None => {
                    let count: i64 = sqlx::query_scalar("select count(*) from url_mappings")
                        .fetch_one(&mut *tx)
                        .await?;
                    sqlx::query_as::<_, UrlMapping>(
                        r#"
                          insert into url_mappings(short_code, original_url) values ($1, $2)
                          returning original_url, short_code, created_at
                        "#,
                    )
                    .bind(allocate_next(count))
                    .bind(original_url)
                    .fetch_one(&mut *tx)
                    .await?
                }
            };
            tx.commit().await?;
            Ok::<_, sqlx::Error>(mapping)
        })
        .await
    }

    async fn list_all(&self) -> Result<Vec<UrlMapping>, StoreError> {
        self.with_timeout(
            sqlx::query_as::<_, UrlMapping>(
                "select original_url, short_code, created_at from url_mappings order by short_code",
            )
            .fetch_all(&self.pool),
        )
        .await
    }
}
