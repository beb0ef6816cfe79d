//! Triage side of the ledger: staged leads, status transitions, and cases.

use hunter_shared::{
    Case, HunterError, Lead, LeadMetadata, LeadStatus, NewLead, Result, StagedLead, TriageDecision,
};
use libsql::{Connection, TransactionBehavior, params};
use uuid::Uuid;

use crate::ledger::parse_status;
use crate::{
    Storage, col_i64, col_opt_text, col_text, col_timestamp, col_uuid, now_rfc3339,
};

const STAGED_COLUMNS: &str = "r.lead_uuid, r.source_id, r.item_url, r.publication_date, r.status,
     s.title, s.source_name, s.full_text, s.full_html, s.image_url, s.metadata_json, s.staged_at";

const CASE_COLUMNS: &str = "id, lead_uuid, public_uuid, source_id, source_name, title, url,
     publication_date, full_text, full_html, image_url, metadata_json, created_at";

impl Storage {
    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Staged leads, oldest first. `None` lists every staged lead.
    pub async fn list_staged_leads(&self, status: Option<LeadStatus>) -> Result<Vec<StagedLead>> {
        let mut sql = format!(
            "SELECT {STAGED_COLUMNS} FROM lead_staging s
             JOIN acquisition_router r ON r.lead_uuid = s.lead_uuid"
        );
        let params = match status {
            Some(status) => {
                sql.push_str(" WHERE r.status = ?1");
                vec![libsql::Value::Text(status.as_str().to_string())]
            }
            None => Vec::new(),
        };
        sql.push_str(" ORDER BY r.first_seen_at, r.lead_uuid");

        let mut rows = self
            .conn
            .query(&sql, libsql::params::Params::Positional(params))
            .await
            .map_err(HunterError::storage)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(HunterError::storage)? {
            results.push(row_to_staged(&row)?);
        }
        Ok(results)
    }

    /// A single staged lead.
    pub async fn get_staged_lead(&self, lead_uuid: Uuid) -> Result<Option<StagedLead>> {
        fetch_staged(&self.conn, lead_uuid).await
    }

    /// The case promoted from a lead, if any.
    pub async fn get_case_by_lead(&self, lead_uuid: Uuid) -> Result<Option<Case>> {
        let sql = format!("SELECT {CASE_COLUMNS} FROM cases WHERE lead_uuid = ?1");
        let mut rows = self
            .conn
            .query(&sql, params![lead_uuid.to_string()])
            .await
            .map_err(HunterError::storage)?;

        match rows.next().await.map_err(HunterError::storage)? {
            Some(row) => Ok(Some(row_to_case(&row)?)),
            None => Ok(None),
        }
    }

    /// All cases, newest first.
    pub async fn list_cases(&self) -> Result<Vec<Case>> {
        let sql = format!("SELECT {CASE_COLUMNS} FROM cases ORDER BY id DESC");
        let mut rows = self
            .conn
            .query(&sql, params![])
            .await
            .map_err(HunterError::storage)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(HunterError::storage)? {
            results.push(row_to_case(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Copy the staged content into a new case, mark the lead PROMOTED and
    /// drop its staging record.
    pub async fn promote_lead(&self, lead_uuid: Uuid) -> Result<Case> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(HunterError::storage)?;

        match promote_in(&tx, lead_uuid).await {
            Ok(case) => {
                tx.commit().await.map_err(HunterError::storage)?;
                tracing::info!(%lead_uuid, case_id = case.id, "lead promoted");
                Ok(case)
            }
            Err(e) => {
                rollback(tx).await;
                Err(e)
            }
        }
    }

    /// Mark the lead IGNORED and drop its staging record. No case is created.
    pub async fn ignore_lead(&self, lead_uuid: Uuid) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(HunterError::storage)?;

        match ignore_in(&tx, lead_uuid).await {
            Ok(()) => {
                tx.commit().await.map_err(HunterError::storage)?;
                tracing::info!(%lead_uuid, "lead ignored");
                Ok(())
            }
            Err(e) => {
                rollback(tx).await;
                Err(e)
            }
        }
    }

    /// Move a NEW lead under review. Already-TRIAGED leads are left as is.
    pub async fn mark_triaged(&self, lead_uuid: Uuid) -> Result<LeadStatus> {
        let current = current_status(&self.conn, lead_uuid).await?;
        let next = check_transition(lead_uuid, current, TriageDecision::Skip)?;
        if current != next {
            self.conn
                .execute(
                    "UPDATE acquisition_router SET status = ?1
                     WHERE lead_uuid = ?2 AND status = ?3",
                    params![next.as_str(), lead_uuid.to_string(), current.as_str()],
                )
                .await
                .map_err(HunterError::storage)?;
        }
        Ok(next)
    }
}

async fn rollback(tx: libsql::Transaction) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "rollback failed");
    }
}

async fn current_status(conn: &Connection, lead_uuid: Uuid) -> Result<LeadStatus> {
    let mut rows = conn
        .query(
            "SELECT status FROM acquisition_router WHERE lead_uuid = ?1",
            params![lead_uuid.to_string()],
        )
        .await
        .map_err(HunterError::storage)?;
    match rows.next().await.map_err(HunterError::storage)? {
        Some(row) => parse_status(&col_text(&row, 0)?),
        None => Err(HunterError::NotFound(format!("lead {lead_uuid}"))),
    }
}

fn check_transition(
    lead_uuid: Uuid,
    current: LeadStatus,
    decision: TriageDecision,
) -> Result<LeadStatus> {
    current
        .after(decision)
        .ok_or_else(|| HunterError::invalid_transition(lead_uuid, current, decision))
}

async fn fetch_staged(conn: &Connection, lead_uuid: Uuid) -> Result<Option<StagedLead>> {
    let sql = format!(
        "SELECT {STAGED_COLUMNS} FROM lead_staging s
         JOIN acquisition_router r ON r.lead_uuid = s.lead_uuid
         WHERE s.lead_uuid = ?1"
    );
    let mut rows = conn
        .query(&sql, params![lead_uuid.to_string()])
        .await
        .map_err(HunterError::storage)?;
    match rows.next().await.map_err(HunterError::storage)? {
        Some(row) => Ok(Some(row_to_staged(&row)?)),
        None => Ok(None),
    }
}

async fn staged_for_decision(
    conn: &Connection,
    lead_uuid: Uuid,
    decision: TriageDecision,
) -> Result<StagedLead> {
    let current = current_status(conn, lead_uuid).await?;
    check_transition(lead_uuid, current, decision)?;
    fetch_staged(conn, lead_uuid)
        .await?
        .ok_or_else(|| HunterError::NotFound(format!("staging record for lead {lead_uuid}")))
}

async fn promote_in(conn: &Connection, lead_uuid: Uuid) -> Result<Case> {
    let staged = staged_for_decision(conn, lead_uuid, TriageDecision::Promote).await?;
    let lead = &staged.lead;
    let public_uuid = Uuid::now_v7();
    let created_at = now_rfc3339();
    let metadata_json = lead.metadata().to_json()?;

    let id = {
        let mut rows = conn
            .query(
                "INSERT INTO cases
                   (lead_uuid, public_uuid, source_id, source_name, title, url, publication_date,
                    full_text, full_html, image_url, metadata_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 RETURNING id",
                params![
                    lead_uuid.to_string(),
                    public_uuid.to_string(),
                    staged.source_id,
                    lead.source_name(),
                    lead.title(),
                    lead.url(),
                    lead.publication_date().to_rfc3339(),
                    lead.text(),
                    lead.html(),
                    lead.image_url(),
                    metadata_json.as_str(),
                    created_at.as_str(),
                ],
            )
            .await
            .map_err(HunterError::storage)?;
        match rows.next().await.map_err(HunterError::storage)? {
            Some(row) => col_i64(&row, 0)?,
            None => return Err(HunterError::Storage("case insert returned no id".into())),
        }
    };

    finish_terminal(conn, lead_uuid, LeadStatus::Promoted).await?;

    Ok(Case {
        id,
        lead_uuid,
        public_uuid,
        source_id: staged.source_id,
        source_name: lead.source_name().to_string(),
        title: lead.title().to_string(),
        url: lead.url().to_string(),
        publication_date: lead.publication_date(),
        text: lead.text().map(String::from),
        html: lead.html().map(String::from),
        image_url: lead.image_url().map(String::from),
        metadata_json: Some(metadata_json),
        created_at: crate::parse_timestamp(&created_at)?,
    })
}

async fn ignore_in(conn: &Connection, lead_uuid: Uuid) -> Result<()> {
    staged_for_decision(conn, lead_uuid, TriageDecision::Ignore).await?;
    finish_terminal(conn, lead_uuid, LeadStatus::Ignored).await
}

async fn finish_terminal(conn: &Connection, lead_uuid: Uuid, status: LeadStatus) -> Result<()> {
    conn.execute(
        "UPDATE acquisition_router SET status = ?1 WHERE lead_uuid = ?2",
        params![status.as_str(), lead_uuid.to_string()],
    )
    .await
    .map_err(HunterError::storage)?;
    conn.execute(
        "DELETE FROM lead_staging WHERE lead_uuid = ?1",
        params![lead_uuid.to_string()],
    )
    .await
    .map_err(HunterError::storage)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn row_to_staged(row: &libsql::Row) -> Result<StagedLead> {
    let lead_uuid = col_uuid(row, 0)?;
    let source_name = col_text(row, 6)?;
    let metadata_json = col_opt_text(row, 10);
    let lead = Lead::new(NewLead {
        title: col_text(row, 5)?,
        url: col_text(row, 2)?,
        publication_date: Some(col_timestamp(row, 3)?),
        text: col_opt_text(row, 7),
        html: col_opt_text(row, 8),
        image_url: col_opt_text(row, 9),
        metadata: LeadMetadata::rehydrate(&source_name, metadata_json.as_deref()),
        source_name,
    })
    .map_err(|e| HunterError::Storage(format!("corrupt staging record {lead_uuid}: {e}")))?
    .with_uuid(lead_uuid);

    Ok(StagedLead {
        lead,
        source_id: col_i64(row, 1)?,
        status: parse_status(&col_text(row, 4)?)?,
        staged_at: col_timestamp(row, 11)?,
    })
}

fn row_to_case(row: &libsql::Row) -> Result<Case> {
    Ok(Case {
        id: col_i64(row, 0)?,
        lead_uuid: col_uuid(row, 1)?,
        public_uuid: col_uuid(row, 2)?,
        source_id: col_i64(row, 3)?,
        source_name: col_text(row, 4)?,
        title: col_text(row, 5)?,
        url: col_text(row, 6)?,
        publication_date: col_timestamp(row, 7)?,
        text: col_opt_text(row, 8),
        html: col_opt_text(row, 9),
        image_url: col_opt_text(row, 10),
        metadata_json: col_opt_text(row, 11),
        created_at: col_timestamp(row, 12)?,
    })
}
