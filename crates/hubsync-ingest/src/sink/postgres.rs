use super::{RecordSink, UpsertOutcome};
use crate::error::SinkError;
use crate::models::Record;
use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, warn};

/// Schema for the `docker_images` table
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const UPSERT_SQL: &str = r#"
    INSERT INTO docker_images (
        name, namespace, description, pull_count, star_count, is_private, last_updated,
        media_types, content_types, storage_size,
        category1, category2, category3, category4, image_type
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
    ON CONFLICT (name, namespace) DO NOTHING
"#;

/// Joins list columns such as media types
const LIST_SEPARATOR: &str = ", ";

/// Writes records to PostgreSQL through one long-lived connection
pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    /// Open the single connection used for the whole run
    pub async fn connect(database_url: &str) -> Result<Self, SinkError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create or update the schema
    pub async fn migrate(&self) -> Result<(), SinkError> {
        MIGRATOR.run(&self.pool).await?;
        info!("Database schema is up to date");
        Ok(())
    }

    /// Rows currently stored
    pub async fn count(&self) -> Result<i64, SinkError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM docker_images")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Release the connection
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Log the final row count, then release the connection
    ///
    /// Returns `None` when the count could not be read.
    pub async fn finish(self) -> Option<i64> {
        let rows = match self.count().await {
            Ok(rows) => {
                info!(rows, "Rows in docker_images");
                Some(rows)
            },
            Err(e) => {
                warn!(error = %e, "Failed to count rows in docker_images");
                None
            },
        };
        self.close().await;
        rows
    }
}

#[async_trait]
impl RecordSink for PgSink {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn upsert(&mut self, record: &Record) -> Result<UpsertOutcome, SinkError> {
        let [category1, category2, category3, category4] = record.categories.columns();

        let result = sqlx::query(UPSERT_SQL)
            .bind(&record.name)
            .bind(&record.namespace)
            .bind(&record.description)
            .bind(record.pull_count)
            .bind(record.star_count)
            .bind(record.is_private)
            .bind(record.last_updated)
            .bind(record.media_types.join(LIST_SEPARATOR))
            .bind(record.content_types.join(LIST_SEPARATOR))
            .bind(&record.storage_size)
            .bind(category1)
            .bind(category2)
            .bind(category3)
            .bind(category4)
            .bind(&record.image_type)
            .execute(&self.pool)
            .await?;

        Ok(match result.rows_affected() {
            0 => UpsertOutcome::AlreadyPresent,
            _ => UpsertOutcome::Inserted,
        })
    }
}
