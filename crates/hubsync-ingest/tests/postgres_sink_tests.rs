//! PostgreSQL sink tests
//!
//! Require a database reachable through `DATABASE_URL`; run with `cargo test -- --ignored`.

use hubsync_ingest::models::{RepositoryCategory, RepositoryItem};
use hubsync_ingest::sink::{PgSink, RecordSink, UpsertOutcome};
use hubsync_ingest::sources::{Source, Tier};
use hubsync_ingest::transform::normalize;
use sqlx::PgPool;

fn repository(name: &str, description: &str, categories: &[&str]) -> RepositoryItem {
    RepositoryItem {
        name: name.to_string(),
        namespace: "bitnami".to_string(),
        description: description.to_string(),
        pull_count: 5_000_000_000,
        star_count: 12,
        media_types: vec!["application/vnd.docker.distribution.manifest.list.v2+json".to_string()],
        content_types: vec!["image".to_string(), "unrecognized".to_string()],
        storage_size: 3 * (1 << 30),
        categories: categories
            .iter()
            .map(|c| RepositoryCategory {
                name: c.to_string(),
                slug: c.to_lowercase(),
            })
            .collect(),
        ..Default::default()
    }
}

fn source() -> Source {
    Source::new("bitnami", Tier::Verified)
}

#[sqlx::test]
#[ignore] // Requires database
async fn test_upsert_is_idempotent(pool: PgPool) -> sqlx::Result<()> {
    let mut sink = PgSink::from_pool(pool.clone());
    let first = normalize(repository("postgresql", "first", &[]), &source());
    let second = normalize(repository("postgresql", "second", &[]), &source());

    assert_eq!(sink.upsert(&first).await.unwrap(), UpsertOutcome::Inserted);
    assert_eq!(sink.upsert(&second).await.unwrap(), UpsertOutcome::AlreadyPresent);
    assert_eq!(sink.count().await.unwrap(), 1);

    let description: String =
        sqlx::query_scalar("SELECT description FROM docker_images WHERE name = $1 AND namespace = $2")
            .bind("postgresql")
            .bind("bitnami")
            .fetch_one(&pool)
            .await?;
    assert_eq!(description, "first");

    Ok(())
}

#[sqlx::test]
#[ignore] // Requires database
async fn test_columns_are_projected(pool: PgPool) -> sqlx::Result<()> {
    let mut sink = PgSink::from_pool(pool.clone());
    let record = normalize(
        repository("kafka", "", &["Messaging", "Integration", "Streaming", "Data science", "Extra"]),
        &source(),
    );

    sink.upsert(&record).await.unwrap();

    let row: (String, String, String, Option<String>, Option<String>, String, i64) = sqlx::query_as(
        r#"
        SELECT storage_size, content_types, category1, category4, category3, image_type, pull_count
        FROM docker_images WHERE name = 'kafka'
        "#,
    )
    .fetch_one(&pool)
    .await?;

    assert_eq!(row.0, "3.00 GB");
    assert_eq!(row.1, "image, unrecognized");
    assert_eq!(row.2, "Messaging");
    assert_eq!(row.3.as_deref(), Some("Data science"));
    assert_eq!(row.4.as_deref(), Some("Streaming"));
    assert_eq!(row.5, "Verified Publisher");
    assert_eq!(row.6, 5_000_000_000);

    Ok(())
}

#[sqlx::test]
#[ignore] // Requires database
async fn test_uncategorized_leaves_slots_null(pool: PgPool) -> sqlx::Result<()> {
    let mut sink = PgSink::from_pool(pool.clone());
    sink.upsert(&normalize(repository("nginx", "", &[]), &source()))
        .await
        .unwrap();

    let nulls: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM docker_images
        WHERE category1 IS NULL AND category2 IS NULL AND category3 IS NULL AND category4 IS NULL
        "#,
    )
    .fetch_one(&pool)
    .await?;
    assert_eq!(nulls, 1);

    Ok(())
}
