//! SQLite schema.

use sqlx::{Pool, Sqlite};

/// Idempotent schema creation.
pub(crate) async fn init_schema(pool: &Pool<Sqlite>) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leads (
            lead_id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL,
            source_url TEXT NOT NULL,
            source_url_normalized TEXT NOT NULL,
            source_record_id TEXT,
            title TEXT NOT NULL,
            title_normalized TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            market_sector TEXT NOT NULL,
            city TEXT,
            state TEXT,
            county TEXT,
            latitude REAL,
            longitude REAL,
            location_normalized TEXT NOT NULL DEFAULT '',
            project_stage TEXT NOT NULL,
            estimated_value_cents INTEGER,
            estimated_size_sqft INTEGER,
            published_at TEXT,
            confidence_score REAL NOT NULL,
            quality_score INTEGER NOT NULL DEFAULT 0,
            priority TEXT NOT NULL,
            win_probability REAL NOT NULL DEFAULT 0,
            company_json TEXT,
            contacts_json TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            first_seen_at TEXT NOT NULL,
            last_updated_at TEXT NOT NULL,
            export_record_ids_json TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_leads_source_url ON leads(source_url_normalized)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_leads_source_record
         ON leads(source_id, source_record_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_leads_status ON leads(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_leads_first_seen ON leads(first_seen_at)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dedup_records (
            duplicate_lead_id TEXT PRIMARY KEY,
            canonical_lead_id TEXT NOT NULL,
            similarity REAL NOT NULL,
            recorded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS status_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lead_id TEXT NOT NULL,
            from_status TEXT NOT NULL,
            to_status TEXT NOT NULL,
            changed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS source_state (
            source_id TEXT PRIMARY KEY,
            last_success_at TEXT,
            etag TEXT,
            last_modified TEXT,
            consecutive_failures INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS export_attempts (
            lead_id TEXT PRIMARY KEY,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            last_attempt_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrichment_cache (
            provider TEXT NOT NULL,
            cache_key TEXT NOT NULL,
            value_json TEXT,
            stored_at TEXT NOT NULL,
            ttl_secs INTEGER NOT NULL,
            PRIMARY KEY (provider, cache_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
