use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS exchange_rates (
            cache_key TEXT PRIMARY KEY,
            rate TEXT NOT NULL,
            last_used_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Loads the persisted rate cache, least-recently-used first, so that
/// re-inserting entries in order reproduces the in-memory eviction order.
///
/// A row whose rate no longer parses is dropped; the next pre-warm pass
/// fetches it again.
pub async fn load_rate_cache(pool: &DbPool) -> Result<Vec<(String, Decimal)>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT cache_key, rate FROM exchange_rates ORDER BY last_used_at, cache_key",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(key, rate)| rate.parse().ok().map(|rate| (key, rate)))
        .collect())
}

/// Replaces the persisted cache with this snapshot, stamping recency by
/// snapshot position (least-recently-used first).
pub async fn save_rate_cache(
    pool: &DbPool,
    entries: &[(String, Decimal)],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM exchange_rates")
        .execute(&mut *tx)
        .await?;

    for (seq, (key, rate)) in entries.iter().enumerate() {
        sqlx::query("INSERT INTO exchange_rates (cache_key, rate, last_used_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(rate.to_string())
            .bind(seq as i64)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}
