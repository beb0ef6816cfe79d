//! Source Registry: domains, sources, and per-source run state.

use hunter_shared::{HunterError, NewSource, Result, SourceConfig, SourceDomain, SourceRunOutcome};
use libsql::params;

use crate::{Storage, col_i64, col_opt_text, col_opt_timestamp, col_text, now_rfc3339};

const SOURCE_COLUMNS: &str = "s.id, s.name, s.agent_type, s.target, s.domain_id, d.name, s.purpose,
     s.is_active, s.consecutive_failures, s.last_checked_at, s.last_success_at,
     s.last_failure_at, s.last_known_item_id";

impl Storage {
    // -----------------------------------------------------------------------
    // Domain operations
    // -----------------------------------------------------------------------

    /// Insert a domain, or return the id of the existing one with that name.
    pub async fn add_domain(&self, name: &str) -> Result<i64> {
        if name.trim().is_empty() {
            return Err(HunterError::validation("domain name cannot be empty"));
        }
        let mut rows = self
            .conn
            .query(
                "INSERT INTO source_domains (name) VALUES (?1)
                 ON CONFLICT(name) DO UPDATE SET name = excluded.name
                 RETURNING id",
                params![name.trim()],
            )
            .await
            .map_err(HunterError::storage)?;

        match rows.next().await.map_err(HunterError::storage)? {
            Some(row) => col_i64(&row, 0),
            None => Err(HunterError::Storage("domain insert returned no id".into())),
        }
    }

    /// List all domains by name.
    pub async fn list_domains(&self) -> Result<Vec<SourceDomain>> {
        let mut rows = self
            .conn
            .query("SELECT id, name FROM source_domains ORDER BY name", params![])
            .await
            .map_err(HunterError::storage)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(HunterError::storage)? {
            results.push(SourceDomain {
                id: col_i64(&row, 0)?,
                name: col_text(&row, 1)?,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Source operations
    // -----------------------------------------------------------------------

    /// Register a new source. Returns its id.
    pub async fn add_source(&self, source: &NewSource) -> Result<i64> {
        for (field, value) in [
            ("name", &source.name),
            ("agent_type", &source.agent_type),
            ("target", &source.target),
            ("purpose", &source.purpose),
        ] {
            if value.trim().is_empty() {
                return Err(HunterError::validation(format!(
                    "source {field} cannot be empty"
                )));
            }
        }

        let mut rows = self
            .conn
            .query(
                "INSERT INTO sources (name, agent_type, target, domain_id, purpose, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 RETURNING id",
                params![
                    source.name.trim(),
                    source.agent_type.trim(),
                    source.target.as_str(),
                    source.domain_id,
                    source.purpose.trim(),
                    i64::from(source.is_active),
                    now_rfc3339(),
                ],
            )
            .await
            .map_err(HunterError::storage)?;

        match rows.next().await.map_err(HunterError::storage)? {
            Some(row) => col_i64(&row, 0),
            None => Err(HunterError::Storage("source insert returned no id".into())),
        }
    }

    /// Get a source by id.
    pub async fn get_source(&self, id: i64) -> Result<Option<SourceConfig>> {
        let sql = format!(
            "SELECT {SOURCE_COLUMNS} FROM sources s
             JOIN source_domains d ON d.id = s.domain_id
             WHERE s.id = ?1"
        );
        let mut rows = self
            .conn
            .query(&sql, params![id])
            .await
            .map_err(HunterError::storage)?;

        match rows.next().await.map_err(HunterError::storage)? {
            Some(row) => Ok(Some(row_to_source(&row)?)),
            None => Ok(None),
        }
    }

    /// All sources, active or not, grouped by domain.
    pub async fn list_sources(&self) -> Result<Vec<SourceConfig>> {
        let sql = format!(
            "SELECT {SOURCE_COLUMNS} FROM sources s
             JOIN source_domains d ON d.id = s.domain_id
             ORDER BY s.domain_id, s.id"
        );
        self.query_sources(&sql, params![]).await
    }

    /// Active sources with the given purpose, grouped by domain.
    pub async fn list_active_sources(&self, purpose: &str) -> Result<Vec<SourceConfig>> {
        let sql = format!(
            "SELECT {SOURCE_COLUMNS} FROM sources s
             JOIN source_domains d ON d.id = s.domain_id
             WHERE s.is_active = 1 AND s.purpose = ?1
             ORDER BY s.domain_id, s.id"
        );
        self.query_sources(&sql, params![purpose]).await
    }

    async fn query_sources(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<SourceConfig>> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(HunterError::storage)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(HunterError::storage)? {
            results.push(row_to_source(&row)?);
        }
        Ok(results)
    }

    /// Enable or disable a source.
    pub async fn set_source_active(&self, id: i64, active: bool) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE sources SET is_active = ?1 WHERE id = ?2",
                params![i64::from(active), id],
            )
            .await
            .map_err(HunterError::storage)?;
        if changed == 0 {
            return Err(HunterError::NotFound(format!("source {id}")));
        }
        Ok(())
    }

    /// Every agent type referenced by a persisted source, active or not.
    pub async fn list_referenced_agent_types(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT DISTINCT agent_type FROM sources ORDER BY agent_type",
                params![],
            )
            .await
            .map_err(HunterError::storage)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(HunterError::storage)? {
            results.push(col_text(&row, 0)?);
        }
        Ok(results)
    }

    /// Record the outcome of one source's run.
    ///
    /// Success resets the failure counter and replaces the bookmark only when
    /// a new one is given. Failure bumps the counter and leaves the bookmark.
    pub async fn update_source_state(&self, id: i64, outcome: &SourceRunOutcome) -> Result<()> {
        let now = now_rfc3339();
        let changed = match outcome {
            SourceRunOutcome::Success { new_bookmark } => self
                .conn
                .execute(
                    "UPDATE sources SET
                       last_checked_at = ?1,
                       last_success_at = ?1,
                       consecutive_failures = 0,
                       last_known_item_id = COALESCE(?2, last_known_item_id)
                     WHERE id = ?3",
                    params![now.as_str(), new_bookmark.as_deref(), id],
                )
                .await,
            SourceRunOutcome::Failure => self
                .conn
                .execute(
                    "UPDATE sources SET
                       last_checked_at = ?1,
                       last_failure_at = ?1,
                       consecutive_failures = consecutive_failures + 1
                     WHERE id = ?2",
                    params![now.as_str(), id],
                )
                .await,
        }
        .map_err(HunterError::storage)?;

        if changed == 0 {
            return Err(HunterError::NotFound(format!("source {id}")));
        }
        tracing::debug!(source_id = id, ?outcome, "source state updated");
        Ok(())
    }
}

fn row_to_source(row: &libsql::Row) -> Result<SourceConfig> {
    Ok(SourceConfig {
        id: col_i64(row, 0)?,
        name: col_text(row, 1)?,
        agent_type: col_text(row, 2)?,
        target: col_text(row, 3)?,
        domain_id: col_i64(row, 4)?,
        domain_name: col_text(row, 5)?,
        purpose: col_text(row, 6)?,
        is_active: col_i64(row, 7)? != 0,
        consecutive_failures: u32::try_from(col_i64(row, 8)?).unwrap_or(u32::MAX),
        last_checked_at: col_opt_timestamp(row, 9)?,
        last_success_at: col_opt_timestamp(row, 10)?,
        last_failure_at: col_opt_timestamp(row, 11)?,
        last_known_item_id: col_opt_text(row, 12),
    })
}
