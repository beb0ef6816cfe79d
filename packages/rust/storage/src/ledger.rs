//! Acquisition router and staging: the write side of the Triage Ledger.

use std::collections::HashMap;

use hunter_shared::{HunterError, Lead, LeadStatus, Result, RouterEntry};
use libsql::{Connection, TransactionBehavior, params};
use uuid::Uuid;

use crate::{Storage, col_i64, col_text, col_timestamp, col_uuid, now_rfc3339};

/// SQLite's default host-parameter limit is 999 on older builds.
const URL_CHUNK: usize = 500;

/// What [`Storage::record_lead`] did with a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// New router entry and staging record.
    Created(Uuid),
    /// The url was already routed; only `last_seen_at` moved.
    Existing(Uuid),
}

impl RecordOutcome {
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Created(uuid) | Self::Existing(uuid) => *uuid,
        }
    }
}

impl Storage {
    /// Look up which of `urls` already have a router entry.
    pub async fn find_existing_urls(&self, urls: &[&str]) -> Result<HashMap<String, Uuid>> {
        let mut found = HashMap::new();
        for chunk in urls.chunks(URL_CHUNK) {
            let placeholders = (1..=chunk.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT item_url, lead_uuid FROM acquisition_router WHERE item_url IN ({placeholders})"
            );
            let values = chunk
                .iter()
                .map(|url| libsql::Value::Text((*url).to_string()))
                .collect();

            let mut rows = self
                .conn
                .query(&sql, libsql::params::Params::Positional(values))
                .await
                .map_err(HunterError::storage)?;
            while let Some(row) = rows.next().await.map_err(HunterError::storage)? {
                found.insert(col_text(&row, 0)?, col_uuid(&row, 1)?);
            }
        }
        Ok(found)
    }

    /// Record a later sighting of already-routed leads by bumping
    /// `last_seen_at`. Returns the number of entries touched.
    pub async fn touch_router_entries(&self, lead_uuids: &[Uuid]) -> Result<u64> {
        let now = now_rfc3339();
        let mut touched = 0;
        for chunk in lead_uuids.chunks(URL_CHUNK) {
            let placeholders = (2..=chunk.len() + 1)
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE acquisition_router SET last_seen_at = ?1 WHERE lead_uuid IN ({placeholders})"
            );
            let values = std::iter::once(libsql::Value::Text(now.clone()))
                .chain(chunk.iter().map(|uuid| libsql::Value::Text(uuid.to_string())))
                .collect();

            touched += self
                .conn
                .execute(&sql, libsql::params::Params::Positional(values))
                .await
                .map_err(HunterError::storage)?;
        }
        Ok(touched)
    }

    /// Route and stage one lead atomically.
    ///
    /// Upserts the router entry keyed by url. When another filer won the race
    /// for the same url, the existing uuid comes back from the upsert and no
    /// staging record is written.
    pub async fn record_lead(&self, source_id: i64, lead: &Lead) -> Result<RecordOutcome> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(HunterError::storage)?;

        match record_lead_in(&tx, source_id, lead).await {
            Ok(outcome) => {
                tx.commit().await.map_err(HunterError::storage)?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Router entry for a lead.
    pub async fn get_router_entry(&self, lead_uuid: Uuid) -> Result<Option<RouterEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT lead_uuid, source_id, item_url, publication_date, first_seen_at,
                        last_seen_at, status
                 FROM acquisition_router WHERE lead_uuid = ?1",
                params![lead_uuid.to_string()],
            )
            .await
            .map_err(HunterError::storage)?;

        match rows.next().await.map_err(HunterError::storage)? {
            Some(row) => Ok(Some(RouterEntry {
                lead_uuid: col_uuid(&row, 0)?,
                source_id: col_i64(&row, 1)?,
                item_url: col_text(&row, 2)?,
                publication_date: col_timestamp(&row, 3)?,
                first_seen_at: col_timestamp(&row, 4)?,
                last_seen_at: col_timestamp(&row, 5)?,
                status: parse_status(&col_text(&row, 6)?)?,
            })),
            None => Ok(None),
        }
    }

    /// Number of router entries (unique urls ever filed).
    pub async fn count_router_entries(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM acquisition_router").await
    }

    /// Number of staged leads awaiting a terminal decision.
    pub async fn count_staged(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM lead_staging").await
    }

    async fn count(&self, sql: &str) -> Result<u64> {
        let mut rows = self
            .conn
            .query(sql, params![])
            .await
            .map_err(HunterError::storage)?;
        match rows.next().await.map_err(HunterError::storage)? {
            Some(row) => Ok(u64::try_from(col_i64(&row, 0)?).unwrap_or(0)),
            None => Ok(0),
        }
    }
}

async fn record_lead_in(conn: &Connection, source_id: i64, lead: &Lead) -> Result<RecordOutcome> {
    let candidate = Uuid::now_v7();
    let now = now_rfc3339();

    let routed = {
        let mut rows = conn
            .query(
                "INSERT INTO acquisition_router
                   (lead_uuid, source_id, item_url, publication_date, first_seen_at, last_seen_at, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5, 'NEW')
                 ON CONFLICT(item_url) DO UPDATE SET last_seen_at = excluded.last_seen_at
                 RETURNING lead_uuid",
                params![
                    candidate.to_string(),
                    source_id,
                    lead.url(),
                    lead.publication_date().to_rfc3339(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(HunterError::storage)?;
        match rows.next().await.map_err(HunterError::storage)? {
            Some(row) => col_uuid(&row, 0)?,
            None => return Err(HunterError::Storage("router upsert returned no uuid".into())),
        }
    };

    if routed != candidate {
        return Ok(RecordOutcome::Existing(routed));
    }

    conn.execute(
        "INSERT INTO lead_staging
           (lead_uuid, title, source_name, full_text, full_html, image_url, metadata_json, staged_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            routed.to_string(),
            lead.title(),
            lead.source_name(),
            lead.text(),
            lead.html(),
            lead.image_url(),
            lead.metadata().to_json()?,
            now.as_str(),
        ],
    )
    .await
    .map_err(HunterError::storage)?;

    Ok(RecordOutcome::Created(routed))
}

pub(crate) fn parse_status(raw: &str) -> Result<LeadStatus> {
    raw.parse::<LeadStatus>().map_err(HunterError::Storage)
}
