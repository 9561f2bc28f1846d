//! LeadStore implementation over sqlx/SQLite.

use crate::dedup::token_set_ratio;
use crate::error::StoreError;
use crate::schema;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use leadflow_enrich::{scoring, CacheKey, ProviderValue};
use leadflow_types::{
    Company, Contact, DedupRecord, Lead, LeadId, LeadStatus, Location, MoneyCents, SourceId,
    SquareFeet, StoreConfig,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of an upsert.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Inserted(LeadId),
    /// Conservative-merged into an existing non-terminal lead
    Merged(LeadId),
    /// Canonical was already past enrichment; only a dedup record was
    /// written
    Duplicate { canonical: LeadId, similarity: f64 },
}

/// A located duplicate: the canonical lead, the similarity that matched,
/// and whether it came from the fuzzy pass (exact URL / record-id hits
/// are re-fetches of the same record, not distinct mentions).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearDuplicate {
    pub lead_id: LeadId,
    pub similarity: f64,
    pub fuzzy: bool,
}

/// Persisted per-source run state.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStateRow {
    pub source_id: SourceId,
    pub last_success_at: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub consecutive_failures: i64,
}

/// Lead store over a SQLite pool.
///
/// The pool is capped at one connection: writes are serialized by the
/// [`crate::StoreWriter`] anyway, and a single connection keeps
/// `sqlite::memory:` databases coherent in tests.
#[derive(Clone)]
pub struct LeadStore {
    pool: Pool<Sqlite>,
    config: StoreConfig,
}

impl LeadStore {
    pub async fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let options = if config.database_path == ":memory:" {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(true)
        };
        // One connection, never recycled: recycling would drop a
        // `:memory:` database on the floor.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        schema::init_schema(&pool).await?;
        info!(path = %config.database_path, "Lead store opened");
        Ok(Self { pool, config })
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(StoreConfig {
            database_path: ":memory:".to_string(),
            ..StoreConfig::default()
        })
        .await
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // CRUD
    // ------------------------------------------------------------------

    pub async fn get(&self, lead_id: &LeadId) -> Result<Lead, StoreError> {
        let row = sqlx::query("SELECT * FROM leads WHERE lead_id = ?")
            .bind(lead_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(*lead_id))?;
        row_to_lead(&row)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_by_status(&self, status: LeadStatus) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn list_by_status(
        &self,
        status: LeadStatus,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM leads WHERE status = ? ORDER BY first_seen_at ASC LIMIT ?",
        )
        .bind(status.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_lead).collect()
    }

    async fn insert_lead(&self, lead: &Lead) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO leads (
                lead_id, source_id, source_url, source_url_normalized,
                source_record_id, title, title_normalized, description,
                market_sector, city, state, county, latitude, longitude,
                location_normalized, project_stage, estimated_value_cents,
                estimated_size_sqft, published_at, confidence_score,
                quality_score, priority, win_probability, company_json,
                contacts_json, status, notes, first_seen_at,
                last_updated_at, export_record_ids_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(lead.lead_id.to_string())
        .bind(lead.source_id.as_str())
        .bind(&lead.source_url)
        .bind(normalize_url(&lead.source_url))
        .bind(&lead.source_record_id)
        .bind(&lead.title)
        .bind(lead.normalized_title())
        .bind(&lead.description)
        .bind(lead.market_sector.as_str())
        .bind(&lead.location.city)
        .bind(&lead.location.state)
        .bind(&lead.location.county)
        .bind(lead.location.coords.map(|c| c.0))
        .bind(lead.location.coords.map(|c| c.1))
        .bind(lead.location.normalized())
        .bind(lead.project_stage.as_str())
        .bind(lead.estimated_value.map(|v| v.0))
        .bind(lead.estimated_size.map(|s| s.0))
        .bind(lead.published_at)
        .bind(lead.confidence_score)
        .bind(i64::from(lead.quality_score))
        .bind(lead.priority.as_str())
        .bind(lead.win_probability)
        .bind(encode_company(&lead.company)?)
        .bind(encode_json(&lead.contacts)?)
        .bind(lead.status.as_str())
        .bind(&lead.notes)
        .bind(lead.first_seen_at)
        .bind(lead.last_updated_at)
        .bind(encode_json(&lead.export_record_ids)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_lead(&self, lead: &Lead) -> Result<(), StoreError> {
        let affected = sqlx::query(
            r#"
            UPDATE leads SET
                source_url = ?, source_url_normalized = ?, source_record_id = ?,
                title = ?, title_normalized = ?, description = ?,
                market_sector = ?, city = ?, state = ?, county = ?,
                latitude = ?, longitude = ?, location_normalized = ?,
                project_stage = ?, estimated_value_cents = ?,
                estimated_size_sqft = ?, published_at = ?,
                confidence_score = ?, quality_score = ?, priority = ?,
                win_probability = ?, company_json = ?, contacts_json = ?,
                status = ?, notes = ?, last_updated_at = ?,
                export_record_ids_json = ?
            WHERE lead_id = ?
            "#,
        )
        .bind(&lead.source_url)
        .bind(normalize_url(&lead.source_url))
        .bind(&lead.source_record_id)
        .bind(&lead.title)
        .bind(lead.normalized_title())
        .bind(&lead.description)
        .bind(lead.market_sector.as_str())
        .bind(&lead.location.city)
        .bind(&lead.location.state)
        .bind(&lead.location.county)
        .bind(lead.location.coords.map(|c| c.0))
        .bind(lead.location.coords.map(|c| c.1))
        .bind(lead.location.normalized())
        .bind(lead.project_stage.as_str())
        .bind(lead.estimated_value.map(|v| v.0))
        .bind(lead.estimated_size.map(|s| s.0))
        .bind(lead.published_at)
        .bind(lead.confidence_score)
        .bind(i64::from(lead.quality_score))
        .bind(lead.priority.as_str())
        .bind(lead.win_probability)
        .bind(encode_company(&lead.company)?)
        .bind(encode_json(&lead.contacts)?)
        .bind(lead.status.as_str())
        .bind(&lead.notes)
        .bind(lead.last_updated_at)
        .bind(encode_json(&lead.export_record_ids)?)
        .bind(lead.lead_id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(StoreError::NotFound(lead.lead_id));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Dedup + upsert
    // ------------------------------------------------------------------

    /// Three-step duplicate search: exact normalized URL, exact per-source
    /// record id, then token-set similarity over (title, location) within
    /// the lookback window.
    pub async fn find_near_duplicate(
        &self,
        lead: &Lead,
        now: DateTime<Utc>,
    ) -> Result<Option<NearDuplicate>, StoreError> {
        let by_url: Option<String> = sqlx::query_scalar(
            "SELECT lead_id FROM leads WHERE source_url_normalized = ? LIMIT 1",
        )
        .bind(normalize_url(&lead.source_url))
        .fetch_optional(&self.pool)
        .await?;
        if let Some(id) = by_url {
            return Ok(Some(NearDuplicate {
                lead_id: parse_lead_id(&id)?,
                similarity: 1.0,
                fuzzy: false,
            }));
        }

        if let Some(record_id) = &lead.source_record_id {
            let by_record: Option<String> = sqlx::query_scalar(
                "SELECT lead_id FROM leads WHERE source_id = ? AND source_record_id = ? LIMIT 1",
            )
            .bind(lead.source_id.as_str())
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await?;
            if let Some(id) = by_record {
                return Ok(Some(NearDuplicate {
                    lead_id: parse_lead_id(&id)?,
                    similarity: 1.0,
                    fuzzy: false,
                }));
            }
        }

        let cutoff = now - ChronoDuration::days(self.config.dedup_lookback_days);
        let rows = sqlx::query(
            "SELECT lead_id, title_normalized, location_normalized
             FROM leads WHERE first_seen_at >= ?",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let title = lead.normalized_title();
        let location = lead.location.normalized();
        let mut best: Option<NearDuplicate> = None;
        for row in rows {
            let other_location: String = row.try_get("location_normalized")?;
            // Locations must agree when both are known; title similarity
            // alone does not make "Riverside Hospital" in two states one
            // project.
            if !location.is_empty() && !other_location.is_empty() && location != other_location {
                continue;
            }
            let other_title: String = row.try_get("title_normalized")?;
            let ratio = token_set_ratio(&title, &other_title);
            if ratio < self.config.dedup_threshold {
                continue;
            }
            let id: String = row.try_get("lead_id")?;
            let id = parse_lead_id(&id)?;
            if best.map(|b| ratio > b.similarity).unwrap_or(true) {
                best = Some(NearDuplicate {
                    lead_id: id,
                    similarity: ratio,
                    fuzzy: true,
                });
            }
        }
        Ok(best)
    }

    /// Upsert one classified lead.
    ///
    /// No duplicate: insert as `new`. Duplicate below `enriched`:
    /// conservative-merge into the canonical and recompute its quality
    /// score. Duplicate at or past `enriched` (or terminal): write a
    /// dedup record only.
    pub async fn upsert(&self, mut lead: Lead, now: DateTime<Utc>) -> Result<UpsertOutcome, StoreError> {
        match self.find_near_duplicate(&lead, now).await? {
            None => {
                lead.status = LeadStatus::New;
                lead.first_seen_at = now;
                lead.last_updated_at = now;
                self.insert_lead(&lead).await?;
                debug!(lead = %lead.lead_id, title = %lead.title, "Lead inserted");
                Ok(UpsertOutcome::Inserted(lead.lead_id))
            }
            Some(dup) => {
                let canonical_id = dup.lead_id;
                let mut existing = self.get(&canonical_id).await?;
                let frozen = existing.status.is_terminal()
                    || existing.status.rank() >= LeadStatus::Enriched.rank();
                if frozen {
                    self.record_dedup(&DedupRecord {
                        duplicate_lead_id: lead.lead_id,
                        canonical_lead_id: canonical_id,
                        similarity: dup.similarity,
                        recorded_at: now,
                    })
                    .await?;
                    debug!(
                        duplicate = %lead.lead_id,
                        canonical = %canonical_id,
                        similarity = dup.similarity,
                        "Duplicate of settled lead, recorded only"
                    );
                    Ok(UpsertOutcome::Duplicate {
                        canonical: canonical_id,
                        similarity: dup.similarity,
                    })
                } else {
                    existing.merge_missing_from(&lead);
                    existing.last_updated_at = now;
                    existing.quality_score = scoring::score_quality(&existing);
                    self.update_lead(&existing).await?;
                    // A fuzzy match is a distinct mention of the same
                    // project and leaves a dedup record; an exact URL or
                    // record-id hit is the same record seen again.
                    if dup.fuzzy {
                        self.record_dedup(&DedupRecord {
                            duplicate_lead_id: lead.lead_id,
                            canonical_lead_id: canonical_id,
                            similarity: dup.similarity,
                            recorded_at: now,
                        })
                        .await?;
                    }
                    debug!(lead = %canonical_id, "Merged duplicate into canonical");
                    Ok(UpsertOutcome::Merged(canonical_id))
                }
            }
        }
    }

    async fn record_dedup(&self, record: &DedupRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO dedup_records (duplicate_lead_id, canonical_lead_id, similarity, recorded_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(duplicate_lead_id) DO NOTHING
            "#,
        )
        .bind(record.duplicate_lead_id.to_string())
        .bind(record.canonical_lead_id.to_string())
        .bind(record.similarity)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn dedup_records(&self) -> Result<Vec<DedupRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM dedup_records ORDER BY recorded_at ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let duplicate: String = row.try_get("duplicate_lead_id")?;
                let canonical: String = row.try_get("canonical_lead_id")?;
                Ok(DedupRecord {
                    duplicate_lead_id: parse_lead_id(&duplicate)?,
                    canonical_lead_id: parse_lead_id(&canonical)?,
                    similarity: row.try_get("similarity")?,
                    recorded_at: row.try_get("recorded_at")?,
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Status transitions
    // ------------------------------------------------------------------

    /// Validated transition along the status DAG, with history.
    pub async fn transition(
        &self,
        lead_id: &LeadId,
        to: LeadStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let lead = self.get(lead_id).await?;
        if !lead.status.can_transition(to) {
            return Err(StoreError::Transition {
                lead_id: *lead_id,
                from: lead.status,
                to,
            });
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE leads SET status = ?, last_updated_at = ? WHERE lead_id = ?")
            .bind(to.as_str())
            .bind(now)
            .bind(lead_id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO status_history (lead_id, from_status, to_status, changed_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(lead_id.to_string())
        .bind(lead.status.as_str())
        .bind(to.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn status_history(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<(LeadStatus, LeadStatus, DateTime<Utc>)>, StoreError> {
        let rows = sqlx::query(
            "SELECT from_status, to_status, changed_at FROM status_history
             WHERE lead_id = ? ORDER BY id ASC",
        )
        .bind(lead_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                let from: String = row.try_get("from_status")?;
                let to: String = row.try_get("to_status")?;
                Ok((
                    parse_enum::<LeadStatus>(&from)?,
                    parse_enum::<LeadStatus>(&to)?,
                    row.try_get("changed_at")?,
                ))
            })
            .collect()
    }

    /// Persist an updated lead body without touching its status.
    pub async fn save_fields(&self, lead: &Lead) -> Result<(), StoreError> {
        let current = self.get(&lead.lead_id).await?;
        let mut updated = lead.clone();
        updated.status = current.status;
        self.update_lead(&updated).await
    }

    // ------------------------------------------------------------------
    // Export support
    // ------------------------------------------------------------------

    /// Enriched leads awaiting export, oldest first.
    pub async fn list_exportable(&self, limit: usize) -> Result<Vec<Lead>, StoreError> {
        self.list_by_status(LeadStatus::Enriched, limit).await
    }

    /// Record a successful export: stores the CRM object ids and advances
    /// the status, clearing any attempt counter.
    pub async fn mark_exported(
        &self,
        lead_id: &LeadId,
        record_ids: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut lead = self.get(lead_id).await?;
        lead.export_record_ids.extend(record_ids.clone());
        sqlx::query("UPDATE leads SET export_record_ids_json = ? WHERE lead_id = ?")
            .bind(encode_json(&lead.export_record_ids)?)
            .bind(lead_id.to_string())
            .execute(&self.pool)
            .await?;
        self.transition(lead_id, LeadStatus::Exported, now).await?;
        sqlx::query("DELETE FROM export_attempts WHERE lead_id = ?")
            .bind(lead_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_export_attempt(
        &self,
        lead_id: &LeadId,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO export_attempts (lead_id, attempts, last_error, last_attempt_at)
            VALUES (?, 1, ?, ?)
            ON CONFLICT(lead_id) DO UPDATE SET
                attempts = attempts + 1,
                last_error = excluded.last_error,
                last_attempt_at = excluded.last_attempt_at
            "#,
        )
        .bind(lead_id.to_string())
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;
        let attempts: i64 =
            sqlx::query_scalar("SELECT attempts FROM export_attempts WHERE lead_id = ?")
                .bind(lead_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(attempts)
    }

    pub async fn export_attempts(&self, lead_id: &LeadId) -> Result<i64, StoreError> {
        let attempts: Option<i64> =
            sqlx::query_scalar("SELECT attempts FROM export_attempts WHERE lead_id = ?")
                .bind(lead_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        Ok(attempts.unwrap_or(0))
    }

    /// Opt-in retention sweep: archive exported leads older than the
    /// horizon. Never runs automatically.
    pub async fn archive_exported_older_than(
        &self,
        horizon: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT lead_id FROM leads WHERE status = ? AND last_updated_at < ?",
        )
        .bind(LeadStatus::Exported.as_str())
        .bind(horizon)
        .fetch_all(&self.pool)
        .await?;
        let mut archived = 0;
        for id in rows {
            let id = parse_lead_id(&id)?;
            self.transition(&id, LeadStatus::Archived, now).await?;
            archived += 1;
        }
        Ok(archived)
    }

    // ------------------------------------------------------------------
    // Per-source run state
    // ------------------------------------------------------------------

    pub async fn record_source_success(
        &self,
        source_id: &SourceId,
        at: DateTime<Utc>,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO source_state (source_id, last_success_at, etag, last_modified, consecutive_failures)
            VALUES (?, ?, ?, ?, 0)
            ON CONFLICT(source_id) DO UPDATE SET
                last_success_at = excluded.last_success_at,
                etag = COALESCE(excluded.etag, source_state.etag),
                last_modified = COALESCE(excluded.last_modified, source_state.last_modified),
                consecutive_failures = 0
            "#,
        )
        .bind(source_id.as_str())
        .bind(at)
        .bind(etag)
        .bind(last_modified)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_source_failure(&self, source_id: &SourceId) -> Result<i64, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO source_state (source_id, consecutive_failures)
            VALUES (?, 1)
            ON CONFLICT(source_id) DO UPDATE SET
                consecutive_failures = source_state.consecutive_failures + 1
            "#,
        )
        .bind(source_id.as_str())
        .execute(&self.pool)
        .await?;
        let failures: i64 = sqlx::query_scalar(
            "SELECT consecutive_failures FROM source_state WHERE source_id = ?",
        )
        .bind(source_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(failures)
    }

    pub async fn load_source_states(&self) -> Result<Vec<SourceStateRow>, StoreError> {
        let rows = sqlx::query("SELECT * FROM source_state")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let id: String = row.try_get("source_id")?;
                Ok(SourceStateRow {
                    source_id: SourceId::new(id)
                        .map_err(|e| StoreError::decode(format!("source id: {e}")))?,
                    last_success_at: row.try_get("last_success_at")?,
                    etag: row.try_get("etag")?,
                    last_modified: row.try_get("last_modified")?,
                    consecutive_failures: row.try_get("consecutive_failures")?,
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Enrichment cache persistence
    // ------------------------------------------------------------------

    /// Replace the persisted cache with the given snapshot.
    pub async fn save_enrichment_cache(
        &self,
        entries: &[(CacheKey, Option<ProviderValue>, Duration)],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM enrichment_cache")
            .execute(&mut *tx)
            .await?;
        for (key, value, remaining) in entries {
            let value_json = value
                .as_ref()
                .map(|v| serde_json::to_string(v))
                .transpose()
                .map_err(|e| StoreError::decode(format!("cache value: {e}")))?;
            sqlx::query(
                r#"
                INSERT INTO enrichment_cache (provider, cache_key, value_json, stored_at, ttl_secs)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&key.provider)
            .bind(&key.key)
            .bind(value_json)
            .bind(now)
            .bind(remaining.as_secs() as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Load still-fresh cache entries with their remaining TTL.
    pub async fn load_enrichment_cache(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(CacheKey, Option<ProviderValue>, Duration)>, StoreError> {
        let rows = sqlx::query("SELECT * FROM enrichment_cache")
            .fetch_all(&self.pool)
            .await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let stored_at: DateTime<Utc> = row.try_get("stored_at")?;
            let ttl_secs: i64 = row.try_get("ttl_secs")?;
            let expires_at = stored_at + ChronoDuration::seconds(ttl_secs);
            if expires_at <= now {
                continue;
            }
            let remaining = (expires_at - now)
                .to_std()
                .unwrap_or(Duration::ZERO);
            let provider: String = row.try_get("provider")?;
            let key: String = row.try_get("cache_key")?;
            let value_json: Option<String> = row.try_get("value_json")?;
            let value = value_json
                .map(|json| serde_json::from_str::<ProviderValue>(&json))
                .transpose()
                .map_err(|e| StoreError::decode(format!("cache value: {e}")))?;
            entries.push((CacheKey::new(provider, key), value, remaining));
        }
        Ok(entries)
    }
}

// ----------------------------------------------------------------------
// Row mapping
// ----------------------------------------------------------------------

fn row_to_lead(row: &SqliteRow) -> Result<Lead, StoreError> {
    let lead_id: String = row.try_get("lead_id")?;
    let source_id: String = row.try_get("source_id")?;
    let sector: String = row.try_get("market_sector")?;
    let stage: String = row.try_get("project_stage")?;
    let priority: String = row.try_get("priority")?;
    let status: String = row.try_get("status")?;
    let company_json: Option<String> = row.try_get("company_json")?;
    let contacts_json: String = row.try_get("contacts_json")?;
    let export_ids_json: String = row.try_get("export_record_ids_json")?;
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;
    let value_cents: Option<i64> = row.try_get("estimated_value_cents")?;
    let size_sqft: Option<i64> = row.try_get("estimated_size_sqft")?;
    let quality: i64 = row.try_get("quality_score")?;

    Ok(Lead {
        lead_id: parse_lead_id(&lead_id)?,
        source_id: SourceId::new(source_id)
            .map_err(|e| StoreError::decode(format!("source id: {e}")))?,
        source_url: row.try_get("source_url")?,
        source_record_id: row.try_get("source_record_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        market_sector: parse_enum(&sector)?,
        location: Location {
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            county: row.try_get("county")?,
            coords: latitude.zip(longitude),
        },
        project_stage: parse_enum(&stage)?,
        estimated_value: value_cents.map(MoneyCents),
        estimated_size: size_sqft.map(SquareFeet),
        published_at: row.try_get("published_at")?,
        confidence_score: row.try_get("confidence_score")?,
        quality_score: quality.clamp(0, 100) as u8,
        priority: parse_enum(&priority)?,
        win_probability: row.try_get("win_probability")?,
        company: company_json
            .map(|json| serde_json::from_str::<Company>(&json))
            .transpose()
            .map_err(|e| StoreError::decode(format!("company: {e}")))?,
        contacts: serde_json::from_str::<Vec<Contact>>(&contacts_json)
            .map_err(|e| StoreError::decode(format!("contacts: {e}")))?,
        status: parse_enum(&status)?,
        notes: row.try_get("notes")?,
        first_seen_at: row.try_get("first_seen_at")?,
        last_updated_at: row.try_get("last_updated_at")?,
        export_record_ids: serde_json::from_str(&export_ids_json)
            .map_err(|e| StoreError::decode(format!("export ids: {e}")))?,
    })
}

fn parse_lead_id(raw: &str) -> Result<LeadId, StoreError> {
    raw.parse::<LeadId>()
        .map_err(|e| StoreError::decode(format!("lead id '{raw}': {e}")))
}

fn parse_enum<T: FromStr<Err = String>>(raw: &str) -> Result<T, StoreError> {
    raw.parse::<T>().map_err(StoreError::Decode)
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::decode(format!("encode: {e}")))
}

fn encode_company(company: &Option<Company>) -> Result<Option<String>, StoreError> {
    company.as_ref().map(encode_json).transpose()
}

/// Lowercase, fragment-free, trailing-slash-free URL key for exact dedup.
fn normalize_url(url: &str) -> String {
    let mut normalized = url.trim().to_lowercase();
    if let Some(fragment) = normalized.find('#') {
        normalized.truncate(fragment);
    }
    while normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("https://Example.com/Projects/#section"),
            "https://example.com/projects"
        );
        assert_eq!(normalize_url("https://a.com/x/"), "https://a.com/x");
    }
}
