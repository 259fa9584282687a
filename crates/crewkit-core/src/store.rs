//! The capsule: a namespaced, typed record store over SQLite.
//!
//! One global database backs every project, session and crew on the host.
//! Records are addressed by `(namespace, title)`; `save` upserts on that key.
//! Concurrent hook processes are expected, so the connection opens with a
//! busy timeout and every write is a single statement or small transaction.

use crate::error::{CrewkitError, Result};
use crate::types::RecordType;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ContextRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRecord {
    pub namespace: String,
    pub title: String,
    pub summary: String,
    pub record_type: RecordType,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub hit_count: i64,
}

impl ContextRecord {
    /// A record ready to save; timestamps are stamped by `save`.
    pub fn new(
        namespace: impl Into<String>,
        title: impl Into<String>,
        summary: impl Into<String>,
        record_type: RecordType,
    ) -> Self {
        let now = Utc::now();
        Self {
            namespace: namespace.into(),
            title: title.into(),
            summary: summary.into(),
            record_type,
            content: serde_json::Value::Null,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            hit_count: 0,
        }
    }

    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.content = content;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

// ---------------------------------------------------------------------------
// Namespace normalization
// ---------------------------------------------------------------------------

/// Normalize a namespace: lowercase ASCII, `/`-separated, no empty or
/// leading/trailing segments, depth >= 1.
pub fn normalize_namespace(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(CrewkitError::InvalidNamespace(raw.to_string()));
    }
    let mut segments = Vec::new();
    for segment in trimmed.split('/') {
        if segment.is_empty() {
            return Err(CrewkitError::InvalidNamespace(raw.to_string()));
        }
        if !segment.is_ascii() {
            return Err(CrewkitError::InvalidNamespace(raw.to_string()));
        }
        segments.push(segment.to_ascii_lowercase());
    }
    Ok(segments.join("/"))
}

// ---------------------------------------------------------------------------
// Capsule
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    namespace   TEXT NOT NULL,
    title       TEXT NOT NULL,
    summary     TEXT NOT NULL DEFAULT '',
    record_type TEXT NOT NULL,
    content     TEXT NOT NULL DEFAULT 'null',
    tags        TEXT NOT NULL DEFAULT '[]',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    hit_count   INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (namespace, title)
);
CREATE INDEX IF NOT EXISTS idx_records_updated ON records(updated_at);
CREATE INDEX IF NOT EXISTS idx_records_namespace ON records(namespace);
";

pub struct Capsule {
    conn: Connection,
}

impl Capsule {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// In-memory store for tests.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Upsert by `(namespace, title)`. `created_at` survives updates;
    /// `updated_at` always advances to now.
    pub fn save(&self, record: &ContextRecord) -> Result<()> {
        let namespace = normalize_namespace(&record.namespace)?;
        let now = Utc::now().to_rfc3339();
        let content = serde_json::to_string(&record.content)?;
        let tags = serde_json::to_string(&record.tags)?;
        self.conn.execute(
            "INSERT INTO records (namespace, title, summary, record_type, content, tags, created_at, updated_at, hit_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, 0)
             ON CONFLICT(namespace, title) DO UPDATE SET
               summary = excluded.summary,
               record_type = excluded.record_type,
               content = excluded.content,
               tags = excluded.tags,
               updated_at = excluded.updated_at",
            rusqlite::params![
                namespace,
                record.title,
                record.summary,
                record.record_type.as_str(),
                content,
                tags,
                now,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, namespace: &str, title: &str) -> Result<Option<ContextRecord>> {
        let namespace = normalize_namespace(namespace)?;
        let record = self
            .conn
            .prepare(
                "SELECT namespace, title, summary, record_type, content, tags, created_at, updated_at, hit_count
                 FROM records WHERE namespace = ?1 AND title = ?2",
            )?
            .query_row(rusqlite::params![namespace, title], map_record)
            .optional()?;
        Ok(record)
    }

    /// Direct children of a namespace, most recently updated first.
    pub fn list(&self, namespace: &str, limit: usize) -> Result<Vec<ContextRecord>> {
        let namespace = normalize_namespace(namespace)?;
        let mut stmt = self.conn.prepare(
            "SELECT namespace, title, summary, record_type, content, tags, created_at, updated_at, hit_count
             FROM records WHERE namespace = ?1
             ORDER BY updated_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![namespace, limit as i64], map_record)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(CrewkitError::from)
    }

    /// Records anywhere under a namespace prefix, recency-ordered.
    pub fn list_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<ContextRecord>> {
        let prefix = normalize_namespace(prefix)?;
        let pattern = format!("{}/%", like_escape(&prefix));
        let mut stmt = self.conn.prepare(
            "SELECT namespace, title, summary, record_type, content, tags, created_at, updated_at, hit_count
             FROM records WHERE (namespace = ?1 OR namespace LIKE ?2 ESCAPE '\\')
             ORDER BY updated_at DESC LIMIT ?3",
        )?;
        let rows = stmt.query_map(rusqlite::params![prefix, pattern, limit as i64], map_record)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(CrewkitError::from)
    }

    /// Substring match over title and summary, scoped to a namespace
    /// prefix. Relevance: title match beats summary match, then recency.
    pub fn search(&self, prefix: &str, term: &str, limit: usize) -> Result<Vec<ContextRecord>> {
        let prefix = normalize_namespace(prefix)?;
        let ns_pattern = format!("{}/%", like_escape(&prefix));
        let term_pattern = format!("%{}%", like_escape(term));
        let mut stmt = self.conn.prepare(
            "SELECT namespace, title, summary, record_type, content, tags, created_at, updated_at, hit_count
             FROM records
             WHERE (namespace = ?1 OR namespace LIKE ?2 ESCAPE '\\')
               AND (title LIKE ?3 ESCAPE '\\' OR summary LIKE ?3 ESCAPE '\\')
             ORDER BY (title LIKE ?3 ESCAPE '\\') DESC, updated_at DESC
             LIMIT ?4",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![prefix, ns_pattern, term_pattern, limit as i64],
            map_record,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(CrewkitError::from)
    }

    /// Records under a prefix whose summary or content mentions `needle`.
    pub fn mentioning(&self, prefix: &str, needle: &str, limit: usize) -> Result<Vec<ContextRecord>> {
        let prefix = normalize_namespace(prefix)?;
        let ns_pattern = format!("{}/%", like_escape(&prefix));
        let needle_pattern = format!("%{}%", like_escape(needle));
        let mut stmt = self.conn.prepare(
            "SELECT namespace, title, summary, record_type, content, tags, created_at, updated_at, hit_count
             FROM records
             WHERE (namespace = ?1 OR namespace LIKE ?2 ESCAPE '\\')
               AND (summary LIKE ?3 ESCAPE '\\' OR content LIKE ?3 ESCAPE '\\')
             ORDER BY updated_at DESC LIMIT ?4",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![prefix, ns_pattern, needle_pattern, limit as i64],
            map_record,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(CrewkitError::from)
    }

    /// Top records under a prefix ordered by hit count, then recency.
    pub fn top_by_hits(&self, prefix: &str, limit: usize) -> Result<Vec<ContextRecord>> {
        let prefix = normalize_namespace(prefix)?;
        let pattern = format!("{}/%", like_escape(&prefix));
        let mut stmt = self.conn.prepare(
            "SELECT namespace, title, summary, record_type, content, tags, created_at, updated_at, hit_count
             FROM records WHERE (namespace = ?1 OR namespace LIKE ?2 ESCAPE '\\')
             ORDER BY hit_count DESC, updated_at DESC LIMIT ?3",
        )?;
        let rows = stmt.query_map(rusqlite::params![prefix, pattern, limit as i64], map_record)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(CrewkitError::from)
    }

    /// Most recent record under `prefix` carrying `tag`.
    pub fn latest_with_tag(&self, prefix: &str, tag: &str) -> Result<Option<ContextRecord>> {
        let prefix = normalize_namespace(prefix)?;
        let ns_pattern = format!("{}/%", like_escape(&prefix));
        // LIKE over the serialized tag array is a pre-filter; the exact
        // membership check happens on the deserialized record.
        let tag_pattern = format!("%{}%", like_escape(tag));
        let mut stmt = self.conn.prepare(
            "SELECT namespace, title, summary, record_type, content, tags, created_at, updated_at, hit_count
             FROM records
             WHERE (namespace = ?1 OR namespace LIKE ?2 ESCAPE '\\') AND tags LIKE ?3 ESCAPE '\\'
             ORDER BY updated_at DESC LIMIT 20",
        )?;
        let rows = stmt.query_map(rusqlite::params![prefix, ns_pattern, tag_pattern], map_record)?;
        for row in rows {
            let record = row?;
            if record.tags.iter().any(|t| t == tag) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Resolve a namespace down to full records: COLLECTION children and
    /// ALIAS targets are walked until only leaf records remain. Collections
    /// themselves stay in the output; aliases do not. A visited set keeps
    /// alias cycles from looping.
    pub fn resolve(&self, namespace: &str) -> Result<Vec<ContextRecord>> {
        let namespace = normalize_namespace(namespace)?;
        let mut out = Vec::new();
        let mut visited = std::collections::HashSet::new();
        let mut pending = std::collections::VecDeque::from([namespace]);

        while let Some(ns) = pending.pop_front() {
            if !visited.insert(ns.clone()) {
                continue;
            }
            for record in self.list(&ns, 100)? {
                match record.record_type {
                    RecordType::Alias => {
                        if let Some(target) = record.content.get("target").and_then(|v| v.as_str())
                        {
                            if let Ok(target) = normalize_namespace(target) {
                                pending.push_back(target);
                            }
                        }
                    }
                    RecordType::Collection => {
                        let child_ns = format!("{}/{}", record.namespace, record.title);
                        if let Ok(child_ns) = normalize_namespace(&child_ns) {
                            pending.push_back(child_ns);
                        }
                        out.push(record);
                    }
                    _ => out.push(record),
                }
            }
        }
        Ok(out)
    }

    /// Bump the access counter used for discovery ranking.
    pub fn record_hit(&self, namespace: &str, title: &str) -> Result<()> {
        let namespace = normalize_namespace(namespace)?;
        self.conn.execute(
            "UPDATE records SET hit_count = hit_count + 1 WHERE namespace = ?1 AND title = ?2",
            rusqlite::params![namespace, title],
        )?;
        Ok(())
    }

    /// Delete records not touched since `cutoff`. Returns how many went.
    pub fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let n = self.conn.execute(
            "DELETE FROM records WHERE updated_at < ?1",
            rusqlite::params![cutoff.to_rfc3339()],
        )?;
        Ok(n)
    }

    /// Count of records not touched since `cutoff` (for `prune --dry-run`).
    pub fn prunable(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE updated_at < ?1",
            rusqlite::params![cutoff.to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

fn map_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContextRecord> {
    let record_type: String = row.get(3)?;
    let content: String = row.get(4)?;
    let tags: String = row.get(5)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    Ok(ContextRecord {
        namespace: row.get(0)?,
        title: row.get(1)?,
        summary: row.get(2)?,
        record_type: RecordType::from_str(&record_type).unwrap_or(RecordType::Meta),
        content: serde_json::from_str(&content).unwrap_or(serde_json::Value::Null),
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
        hit_count: row.get(8)?,
    })
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn like_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
