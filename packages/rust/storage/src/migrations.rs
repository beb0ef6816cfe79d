//! SQL migration definitions for the Hunter database.
//!
//! Migrations are applied in order on database open. Each migration records
//! its own version in `schema_migrations` as its last statement.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Source registry: source_domains, sources",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Groups of sources sharing an external API (and its rate limits)
CREATE TABLE IF NOT EXISTS source_domains (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

-- Per-source config plus run state owned by the dispatch coordinator
CREATE TABLE IF NOT EXISTS sources (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    name                 TEXT NOT NULL UNIQUE,
    agent_type           TEXT NOT NULL,
    target               TEXT NOT NULL,
    domain_id            INTEGER NOT NULL REFERENCES source_domains(id),
    purpose              TEXT NOT NULL DEFAULT 'lead_generation',
    is_active            INTEGER NOT NULL DEFAULT 1,
    consecutive_failures INTEGER NOT NULL DEFAULT 0,
    last_checked_at      TEXT,
    last_success_at      TEXT,
    last_failure_at      TEXT,
    last_known_item_id   TEXT,
    created_at           TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sources_purpose ON sources(purpose, is_active);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Triage ledger: acquisition_router, lead_staging, cases",
            sql: r#"
-- One row per unique url ever seen; status drives triage
CREATE TABLE IF NOT EXISTS acquisition_router (
    lead_uuid        TEXT PRIMARY KEY,
    source_id        INTEGER NOT NULL REFERENCES sources(id),
    item_url         TEXT NOT NULL UNIQUE,
    publication_date TEXT NOT NULL,
    first_seen_at    TEXT NOT NULL,
    last_seen_at     TEXT NOT NULL,
    status           TEXT NOT NULL DEFAULT 'NEW'
                     CHECK (status IN ('NEW', 'TRIAGED', 'PROMOTED', 'IGNORED'))
);

CREATE INDEX IF NOT EXISTS idx_router_status ON acquisition_router(status);

-- Full content pending triage; removed on any terminal decision
CREATE TABLE IF NOT EXISTS lead_staging (
    lead_uuid     TEXT PRIMARY KEY REFERENCES acquisition_router(lead_uuid),
    title         TEXT NOT NULL,
    source_name   TEXT NOT NULL,
    full_text     TEXT,
    full_html     TEXT,
    image_url     TEXT,
    metadata_json TEXT,
    staged_at     TEXT NOT NULL
);

-- Permanent archive of promoted leads
CREATE TABLE IF NOT EXISTS cases (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    lead_uuid        TEXT NOT NULL UNIQUE REFERENCES acquisition_router(lead_uuid),
    public_uuid      TEXT NOT NULL UNIQUE,
    source_id        INTEGER NOT NULL REFERENCES sources(id),
    source_name      TEXT NOT NULL,
    title            TEXT NOT NULL,
    url              TEXT NOT NULL,
    publication_date TEXT NOT NULL,
    full_text        TEXT,
    full_html        TEXT,
    image_url        TEXT,
    metadata_json    TEXT,
    created_at       TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
