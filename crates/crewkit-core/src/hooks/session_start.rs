//! Session-start hook: prune old records, then synthesize the context
//! string injected into the new session.
//!
//! Section order mirrors usefulness: a handoff beats a reconstructed
//! session summary, which beats raw discovery/file lists.

use super::{HookContext, HookEvent, HookKind, HookResponse};
use crate::config::CrewConfig;
use crate::error::Result;
use crate::store::ContextRecord;
use crate::team::TeamState;
use crate::{git, identity};
use chrono::{Duration, Utc};

const RETENTION_DAYS: i64 = 30;
const TOP_DISCOVERIES: usize = 5;
const RECENT_FILES: usize = 3;
const TEAM_ACTIVITY: usize = 3;

pub(super) fn handle(ctx: &HookContext, _event: &HookEvent) -> Result<Option<String>> {
    let mut sections: Vec<String> = Vec::new();

    let pruned = ctx
        .store
        .prune(Utc::now() - Duration::days(RETENTION_DAYS))
        .unwrap_or(0);
    if pruned > 0 {
        sections.push(format!(
            "Pruned {pruned} context record(s) older than {RETENTION_DAYS} days."
        ));
    }

    let root = ctx.namespace_root();

    match ctx.store.latest_with_tag(&root, "handoff")? {
        Some(handoff) => {
            sections.push(format!("## Session Handoff\n\n{}", handoff.summary.trim()));
        }
        None => {
            if let Some(section) = prior_session_section(ctx, &root)? {
                sections.push(section);
            }
        }
    }

    if let Some(section) = discoveries_section(ctx)? {
        sections.push(section);
    }
    if let Some(section) = recent_files_section(ctx, &root)? {
        sections.push(section);
    }
    if ctx.crew.is_some() {
        if let Some(section) = team_activity_section(ctx)? {
            sections.push(section);
        }
    }
    if let Some(section) = crew_status_section(ctx) {
        sections.push(section);
    }

    if sections.is_empty() {
        return Ok(None);
    }
    let response = HookResponse::new(HookKind::SessionStart, sections.join("\n\n"));
    Ok(Some(serde_json::to_string(&response)?))
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Prefer the most recent session on the current branch; fail closed to
/// the most recent session overall when the branch is unknown or unmatched.
fn prior_session_section(ctx: &HookContext, root: &str) -> Result<Option<String>> {
    let sessions = ctx.store.list(&format!("{root}/session"), 20)?;
    if sessions.is_empty() {
        return Ok(None);
    }

    let current_branch = git::current_branch(&ctx.cwd);
    let branch_match = current_branch.as_deref().and_then(|branch| {
        sessions
            .iter()
            .find(|r| r.content.get("branch").and_then(|v| v.as_str()) == Some(branch))
    });

    Ok(Some(match branch_match {
        Some(record) => format!(
            "## Branch Context ({})\n\n{}",
            current_branch.as_deref().unwrap_or(""),
            record.summary
        ),
        None => format!("## Last Session\n\n{}", sessions[0].summary),
    }))
}

fn discoveries_section(ctx: &HookContext) -> Result<Option<String>> {
    let mut seen = std::collections::HashSet::new();
    let mut top: Vec<ContextRecord> = Vec::new();
    for namespace in ctx.discovery_namespaces() {
        for record in ctx.store.top_by_hits(&namespace, TOP_DISCOVERIES)? {
            if seen.insert((record.namespace.clone(), record.title.clone())) {
                top.push(record);
            }
        }
    }
    if top.is_empty() {
        return Ok(None);
    }
    top.sort_by(|a, b| b.hit_count.cmp(&a.hit_count));
    top.truncate(TOP_DISCOVERIES);

    let mut out = String::from("## Top Discoveries\n");
    for record in &top {
        out.push_str(&format!("\n- **{}** — {}", record.title, record.summary));
    }
    Ok(Some(out))
}

fn recent_files_section(ctx: &HookContext, root: &str) -> Result<Option<String>> {
    let records = ctx.store.list_prefix(root, 200)?;
    let mut files: Vec<&ContextRecord> = records
        .iter()
        .filter(|r| r.namespace.ends_with("/files") || r.namespace.contains("/files/"))
        .take(RECENT_FILES)
        .collect();
    if files.is_empty() {
        return Ok(None);
    }
    files.truncate(RECENT_FILES);

    let mut out = String::from("## Recent Files\n");
    for record in files {
        out.push_str(&format!("\n- {}", record.summary));
    }
    Ok(Some(out))
}

/// What the *other* teammates have been doing, from their session
/// summaries.
fn team_activity_section(ctx: &HookContext) -> Result<Option<String>> {
    let Some(crew) = &ctx.crew else {
        return Ok(None);
    };
    let own = crew.teammate_name.to_ascii_lowercase();
    let prefix = format!("proj/{}/crew", ctx.project_hash);
    let records = ctx.store.list_prefix(&prefix, 200)?;

    let mut entries = Vec::new();
    for record in records {
        let Some(rest) = record.namespace.strip_prefix(&format!("{prefix}/")) else {
            continue;
        };
        let Some((teammate, tail)) = rest.split_once('/') else {
            continue;
        };
        if teammate == own || teammate == "_shared" || tail != "session" {
            continue;
        }
        entries.push(format!("- **{teammate}**: {}", record.summary));
        if entries.len() == TEAM_ACTIVITY {
            break;
        }
    }
    if entries.is_empty() {
        return Ok(None);
    }
    Ok(Some(format!("## Team Activity\n\n{}", entries.join("\n"))))
}

/// Per-profile teammate status table when a crew config exists at the
/// project root. Purely informational; every failure collapses to None.
fn crew_status_section(ctx: &HookContext) -> Option<String> {
    let project_root = git::repo_root(&ctx.cwd).unwrap_or_else(|| ctx.cwd.clone());
    if !CrewConfig::exists(&project_root) {
        return None;
    }
    let config = CrewConfig::load(&project_root).ok()?;
    let hash = identity::project_hash(&project_root);
    let now = Utc::now();

    let mut out = String::from("## Crew Status\n");
    let mut any = false;
    for profile in config.profile_names() {
        let Ok(Some(state)) = TeamState::load(&hash, profile) else {
            continue;
        };
        let threshold = config.stale_after_hours_for(profile);
        any = true;
        out.push_str(&format!("\n### {profile} ({})\n\n", state.status));
        out.push_str("| teammate | status | last active | branch | worktree |\n");
        out.push_str("|---|---|---|---|---|\n");
        for (name, tm) in &state.teammates {
            let (last, stale) = match tm.last_active {
                Some(t) => {
                    let hours = (now - t).num_seconds() as f64 / 3600.0;
                    (format!("{hours:.1}h ago"), hours > threshold)
                }
                None => ("never".to_string(), true),
            };
            let marker = if stale { " (stale)" } else { "" };
            let worktree = tm
                .worktree_path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "| {name} | {}{marker} | {last} | {} | {worktree} |\n",
                tm.status, tm.branch
            ));
        }
    }
    any.then_some(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::testhooks::{event, memory_context};
    use crate::types::RecordType;
    use tempfile::TempDir;

    fn start(ctx: &HookContext) -> Option<String> {
        let ev = event(serde_json::json!({"session_id": "s2"}));
        handle(ctx, &ev)
            .unwrap()
            .map(|raw| {
                let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
                json["hookSpecificOutput"]["additionalContext"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
    }

    #[test]
    fn empty_store_yields_no_output() {
        let dir = TempDir::new().unwrap();
        let ctx = memory_context(dir.path(), None);
        assert!(start(&ctx).is_none());
    }

    #[test]
    fn handoff_wins_over_last_session() {
        let dir = TempDir::new().unwrap();
        let ctx = memory_context(dir.path(), None);
        let root = ctx.namespace_root();

        ctx.store
            .save(
                &ContextRecord::new(format!("{root}/session"), "s1", "old session summary", RecordType::Meta),
            )
            .unwrap();
        ctx.store
            .save(
                &ContextRecord::new(
                    format!("{root}/session/s1/handoff"),
                    "handoff",
                    "## Modified\n\n- `/p/a.rs`",
                    RecordType::Summary,
                )
                .with_tags(["handoff", "pre-compact", "s1"]),
            )
            .unwrap();

        let out = start(&ctx).unwrap();
        assert!(out.contains("## Session Handoff"));
        assert!(out.contains("`/p/a.rs`"));
        assert!(!out.contains("## Last Session"));
    }

    #[test]
    fn falls_back_to_most_recent_session() {
        let dir = TempDir::new().unwrap();
        let ctx = memory_context(dir.path(), None);
        let root = ctx.namespace_root();
        ctx.store
            .save(
                &ContextRecord::new(format!("{root}/session"), "s1", "did the thing", RecordType::Meta),
            )
            .unwrap();

        let out = start(&ctx).unwrap();
        assert!(out.contains("## Last Session"));
        assert!(out.contains("did the thing"));
    }

    #[test]
    fn branch_matched_session_preferred() {
        let dir = TempDir::new().unwrap();
        crate::git::testutil::init_repo(dir.path());
        crate::git::testutil::git(dir.path(), &["checkout", "-b", "feat/x"]);

        let ctx = memory_context(dir.path(), None);
        let root = ctx.namespace_root();
        ctx.store
            .save(
                &ContextRecord::new(format!("{root}/session"), "s-main", "main work", RecordType::Meta)
                    .with_content(serde_json::json!({"branch": "main"})),
            )
            .unwrap();
        ctx.store
            .save(
                &ContextRecord::new(format!("{root}/session"), "s-feat", "feat work", RecordType::Meta)
                    .with_content(serde_json::json!({"branch": "feat/x"})),
            )
            .unwrap();
        // Make the main session the most recent one.
        ctx.store
            .save(
                &ContextRecord::new(format!("{root}/session"), "s-main", "main work", RecordType::Meta)
                    .with_content(serde_json::json!({"branch": "main"})),
            )
            .unwrap();

        let out = start(&ctx).unwrap();
        assert!(out.contains("## Branch Context (feat/x)"));
        assert!(out.contains("feat work"));
        assert!(!out.contains("## Last Session"));
    }

    #[test]
    fn discoveries_and_recent_files_listed() {
        let dir = TempDir::new().unwrap();
        let ctx = memory_context(dir.path(), None);
        let root = ctx.namespace_root();

        let disc_ns = format!("proj/{}/discoveries", ctx.project_hash);
        for i in 0..7 {
            ctx.store
                .save(&ContextRecord::new(&disc_ns, format!("d{i}"), "insight", RecordType::Summary))
                .unwrap();
        }
        ctx.store.record_hit(&disc_ns, "d3").unwrap();

        ctx.store
            .save(
                &ContextRecord::new(
                    format!("{root}/session/s1/files/edit"),
                    "a.rs",
                    "edit: /p/a.rs",
                    RecordType::Meta,
                ),
            )
            .unwrap();

        let out = start(&ctx).unwrap();
        assert!(out.contains("## Top Discoveries"));
        // 5 cap, ranked by hits.
        let bullets = out
            .lines()
            .skip_while(|l| !l.starts_with("## Top Discoveries"))
            .take_while(|l| !l.starts_with("## Recent"))
            .filter(|l| l.starts_with("- "))
            .count();
        assert_eq!(bullets, 5);
        assert!(out.contains("**d3**"));
        assert!(out.contains("## Recent Files"));
        assert!(out.contains("edit: /p/a.rs"));
    }
}
