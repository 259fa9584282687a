//! Read-only aggregations over the capsule, backing `crewkit stats`.

use crate::error::{CrewkitError, Result};
use crate::store::Capsule;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountRow {
    pub key: String,
    pub count: i64,
}

/// Record counts by type.
pub fn counts_by_type(store: &Capsule) -> Result<Vec<CountRow>> {
    rows(
        store,
        "SELECT record_type, COUNT(*) FROM records GROUP BY record_type ORDER BY COUNT(*) DESC",
        &[],
    )
}

/// Record counts by top-level namespace prefix (first two segments).
pub fn counts_by_prefix(store: &Capsule) -> Result<Vec<CountRow>> {
    let all = rows(
        store,
        "SELECT namespace, COUNT(*) FROM records GROUP BY namespace",
        &[],
    )?;
    let mut merged: std::collections::BTreeMap<String, i64> = std::collections::BTreeMap::new();
    for row in all {
        let prefix: String = row.key.split('/').take(2).collect::<Vec<_>>().join("/");
        *merged.entry(prefix).or_default() += row.count;
    }
    let mut out: Vec<CountRow> = merged
        .into_iter()
        .map(|(key, count)| CountRow { key, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    Ok(out)
}

/// Most frequently touched file titles across all `files` namespaces
/// (including the per-action sub-namespaces).
pub fn top_files(store: &Capsule, limit: usize) -> Result<Vec<CountRow>> {
    rows(
        store,
        "SELECT title, COUNT(*) FROM records
         WHERE namespace LIKE '%/files' OR namespace LIKE '%/files/%'
         GROUP BY title
         ORDER BY COUNT(*) DESC, title LIMIT ?1",
        &[&(limit as i64)],
    )
}

/// Most frequently used sub-agent types.
pub fn top_agents(store: &Capsule, limit: usize) -> Result<Vec<CountRow>> {
    rows(
        store,
        "SELECT COALESCE(json_extract(content, '$.agentType'), title), COUNT(*) FROM records
         WHERE namespace LIKE '%/subagents' GROUP BY 1
         ORDER BY COUNT(*) DESC LIMIT ?1",
        &[&(limit as i64)],
    )
}

/// Records grouped by the `session/<sid>` namespace segment.
pub fn sessions(store: &Capsule) -> Result<Vec<CountRow>> {
    let all = rows(
        store,
        "SELECT namespace, COUNT(*) FROM records WHERE namespace LIKE '%/session/%' GROUP BY namespace",
        &[],
    )?;
    let mut merged: std::collections::BTreeMap<String, i64> = std::collections::BTreeMap::new();
    for row in all {
        let Some(idx) = row.key.find("/session/") else {
            continue;
        };
        let rest = &row.key[idx + "/session/".len()..];
        let sid = rest.split('/').next().unwrap_or(rest);
        *merged.entry(sid.to_string()).or_default() += row.count;
    }
    let mut out: Vec<CountRow> = merged
        .into_iter()
        .map(|(key, count)| CountRow { key, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    Ok(out)
}

/// Session-summary records for one branch, via their `branch:` tag or the
/// stored `content.branch`.
pub fn branch_sessions(store: &Capsule, branch: &str) -> Result<Vec<CountRow>> {
    let tag = format!("branch:{branch}");
    let mut stmt = store.conn().prepare(
        "SELECT namespace || '/' || title FROM records
         WHERE tags LIKE '%' || ?1 || '%' OR json_extract(content, '$.branch') = ?2
         ORDER BY updated_at DESC",
    )?;
    let keys = stmt
        .query_map(rusqlite::params![tag, branch], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(keys.into_iter().map(|key| CountRow { key, count: 1 }).collect())
}

fn rows(store: &Capsule, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<CountRow>> {
    let mut stmt = store.conn().prepare(sql)?;
    let mapped = stmt.query_map(params, |row| {
        Ok(CountRow {
            key: row.get(0)?,
            count: row.get(1)?,
        })
    })?;
    mapped
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(CrewkitError::from)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
