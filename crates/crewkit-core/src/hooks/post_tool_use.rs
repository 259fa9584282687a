//! Post-tool-use hook: the primary capture path.
//!
//! Persists file operations and sub-agent spawns, surfaces stored
//! discoveries when a file is read, and in crew mode harvests one
//! discovery per specialist sub-agent result.

use super::{is_ignored_path, HookContext, HookEvent};
use crate::error::Result;
use crate::store::ContextRecord;
use crate::types::RecordType;
use chrono::Utc;
use std::path::Path;

/// Markers a specialist result must contain for discovery capture.
const DISCOVERY_MARKERS: &[&str] = &[
    "found",
    "discovered",
    "identified",
    "pattern:",
    "issue:",
    "important:",
    "key finding:",
];

const DISCOVERY_MIN_LEN: usize = 10;
const DISCOVERY_MAX_LEN: usize = 100;

pub(super) fn handle(ctx: &HookContext, event: &HookEvent) -> Result<Option<String>> {
    let tool = event.tool_name.as_deref().unwrap_or("");
    match tool {
        "Read" | "Write" | "Edit" => handle_file_tool(ctx, event, tool),
        "Task" => handle_task_tool(ctx, event),
        _ => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// File tools
// ---------------------------------------------------------------------------

fn handle_file_tool(ctx: &HookContext, event: &HookEvent, tool: &str) -> Result<Option<String>> {
    let Some(path) = event.file_path() else {
        return Ok(None);
    };
    if is_ignored_path(&path) {
        return Ok(None);
    }

    let action = tool.to_ascii_lowercase();
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    // Segmented by action so a read and an edit of the same file are two
    // records: the upsert key stays (namespace, basename), and repeats of
    // the same action on the same file still collapse.
    let namespace = format!(
        "{}/session/{}/files/{action}",
        ctx.namespace_root(),
        event.session_id
    );
    let mut tags = vec!["file".to_string(), action.clone(), event.session_id.clone()];
    if let Some(crew) = &ctx.crew {
        tags.push(crew.teammate_name.clone());
    }

    ctx.store.save(
        &ContextRecord::new(
            namespace,
            &basename,
            format!("{action}: {}", path.display()),
            RecordType::Meta,
        )
        .with_content(serde_json::json!({
            "filePath": path.display().to_string(),
            "action": action,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .with_tags(tags),
    )?;

    // Surfacing is best-effort on top of a completed capture; its failure
    // must not look like a hook failure.
    if action == "read" {
        match related_discoveries(ctx, &path, &basename) {
            Ok(Some(fragment)) => return Ok(Some(fragment)),
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "discovery surfacing failed"),
        }
    }
    Ok(None)
}

fn related_discoveries(ctx: &HookContext, path: &Path, basename: &str) -> Result<Option<String>> {
    let mut hits = Vec::new();
    let full = path.display().to_string();
    for namespace in ctx.discovery_namespaces() {
        for record in ctx.store.mentioning(&namespace, &full, 3)? {
            hits.push(record);
        }
        if hits.is_empty() {
            for record in ctx.store.mentioning(&namespace, basename, 3)? {
                hits.push(record);
            }
        }
    }
    if hits.is_empty() {
        return Ok(None);
    }
    hits.truncate(3);

    let mut out = String::from("### Related Discoveries\n\n");
    for record in &hits {
        let _ = ctx.store.record_hit(&record.namespace, &record.title);
        out.push_str(&format!("- **{}** — {}\n", record.title, record.summary));
    }
    Ok(Some(out))
}

// ---------------------------------------------------------------------------
// Task tool
// ---------------------------------------------------------------------------

fn handle_task_tool(ctx: &HookContext, event: &HookEvent) -> Result<Option<String>> {
    let Some(agent_type) = event.subagent_type() else {
        return Ok(None);
    };
    let prompt = event.prompt().unwrap_or("");
    let now = Utc::now();

    let namespace = format!("{}/session/{}/subagents", ctx.namespace_root(), event.session_id);
    let mut tags = vec!["subagent".to_string(), agent_type.to_string(), event.session_id.clone()];
    if let Some(crew) = &ctx.crew {
        tags.push(crew.teammate_name.clone());
    }

    ctx.store.save(
        &ContextRecord::new(
            namespace,
            format!("{agent_type} - {}", now.to_rfc3339()),
            prompt,
            RecordType::Summary,
        )
        .with_content(serde_json::json!({
            "agentType": agent_type,
            "prompt": prompt,
            "timestamp": now.to_rfc3339(),
        }))
        .with_tags(tags),
    )?;

    if let Some(crew) = &ctx.crew {
        if agent_type != "general-purpose" {
            if let Err(e) = capture_discovery(ctx, event, agent_type, &crew.teammate_name) {
                tracing::debug!(error = %e, "discovery capture failed");
            }
        }
    }
    Ok(None)
}

/// Pull at most one discovery span out of a specialist result.
fn capture_discovery(
    ctx: &HookContext,
    event: &HookEvent,
    agent_type: &str,
    teammate: &str,
) -> Result<()> {
    let text = event.response_text();
    let Some(span) = discovery_span(&text) else {
        return Ok(());
    };

    let namespace = format!("proj/{}/crew/_shared/discoveries", ctx.project_hash);
    ctx.store.save(
        &ContextRecord::new(namespace, &span, &span, RecordType::Summary)
            .with_content(serde_json::json!({
                "agentType": agent_type,
                "teammate": teammate,
                "timestamp": Utc::now().to_rfc3339(),
            }))
            .with_tags([
                "discovery",
                "crew-shared",
                agent_type,
                teammate,
            ]),
    )?;
    Ok(())
}

fn discovery_span(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    for marker in DISCOVERY_MARKERS {
        if let Some(idx) = lower.find(marker) {
            let span: String = text[idx..]
                .chars()
                .take(DISCOVERY_MAX_LEN)
                .take_while(|c| *c != '\n')
                .collect();
            let span = span.trim().to_string();
            if span.chars().count() >= DISCOVERY_MIN_LEN {
                return Some(span);
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::testhooks::{event, memory_context};
    use crate::identity::CrewIdentity;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn crew_id(teammate: &str) -> CrewIdentity {
        CrewIdentity {
            teammate_name: teammate.to_string(),
            project_root: PathBuf::from("/work/app"),
            branch: "feat/a".to_string(),
            team_name: "core".to_string(),
            profile_name: "dev".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn read_then_edit_persists_two_file_records() {
        let dir = TempDir::new().unwrap();
        let ctx = memory_context(dir.path(), None);

        for tool in ["Read", "Edit"] {
            let ev = event(serde_json::json!({
                "session_id": "s1", "tool_name": tool,
                "tool_input": {"file_path": "/p/src/a.ts"}
            }));
            handle(&ctx, &ev).unwrap();
        }

        let ns = format!("{}/session/s1/files", ctx.namespace_root());
        let records = ctx.store.list_prefix(&ns, 10).unwrap();
        assert_eq!(records.len(), 2, "one record per action");
        assert!(records.iter().all(|r| r.title == "a.ts"));
        assert!(records.iter().any(|r| r.summary.starts_with("read: ")));
        assert!(records.iter().any(|r| r.summary.starts_with("edit: ")));
        for record in &records {
            assert_eq!(record.content["filePath"], "/p/src/a.ts");
            assert!(record.tags.contains(&"file".to_string()));
            assert!(record.tags.contains(&"s1".to_string()));
        }
    }

    #[test]
    fn repeated_action_on_same_file_upserts() {
        let dir = TempDir::new().unwrap();
        let ctx = memory_context(dir.path(), None);

        for _ in 0..2 {
            let ev = event(serde_json::json!({
                "session_id": "s1", "tool_name": "Edit",
                "tool_input": {"file_path": "/p/src/a.ts"}
            }));
            handle(&ctx, &ev).unwrap();
        }

        let ns = format!("{}/session/s1/files/edit", ctx.namespace_root());
        assert_eq!(ctx.store.list(&ns, 10).unwrap().len(), 1);
    }

    #[test]
    fn vcs_and_cache_paths_are_skipped() {
        let dir = TempDir::new().unwrap();
        let ctx = memory_context(dir.path(), None);
        for path in ["/p/.git/HEAD", "/p/node_modules/x.js", "/p/target/out"] {
            let ev = event(serde_json::json!({
                "session_id": "s1", "tool_name": "Edit",
                "tool_input": {"file_path": path}
            }));
            handle(&ctx, &ev).unwrap();
        }
        let ns = format!("{}/session/s1/files", ctx.namespace_root());
        assert!(ctx.store.list_prefix(&ns, 10).unwrap().is_empty());
    }

    #[test]
    fn task_records_subagent_summary() {
        let dir = TempDir::new().unwrap();
        let ctx = memory_context(dir.path(), None);
        let ev = event(serde_json::json!({
            "session_id": "s1", "tool_name": "Task",
            "tool_input": {"subagent_type": "error-detective", "prompt": "why NPE?"}
        }));
        handle(&ctx, &ev).unwrap();

        let ns = format!("{}/session/s1/subagents", ctx.namespace_root());
        let records = ctx.store.list(&ns, 10).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].title.starts_with("error-detective - "));
        assert_eq!(records[0].summary, "why NPE?");
        assert_eq!(records[0].record_type, RecordType::Summary);
    }

    #[test]
    fn read_surfaces_related_discoveries_and_counts_hits() {
        let dir = TempDir::new().unwrap();
        let ctx = memory_context(dir.path(), None);
        ctx.store
            .save(
                &ContextRecord::new(
                    format!("proj/{}/discoveries", ctx.project_hash),
                    "auth cache",
                    "found stale reads in /p/src/a.ts",
                    RecordType::Summary,
                ),
            )
            .unwrap();

        let ev = event(serde_json::json!({
            "session_id": "s1", "tool_name": "Read",
            "tool_input": {"file_path": "/p/src/a.ts"}
        }));
        let out = handle(&ctx, &ev).unwrap().unwrap();
        assert!(out.contains("Related Discoveries"));
        assert!(out.contains("auth cache"));

        let ns = format!("proj/{}/discoveries", ctx.project_hash);
        let record = ctx.store.get(&ns, "auth cache").unwrap().unwrap();
        assert_eq!(record.hit_count, 1);
    }

    #[test]
    fn specialist_results_yield_one_shared_discovery() {
        let dir = TempDir::new().unwrap();
        let ctx = memory_context(dir.path(), Some(crew_id("alice")));
        let ev = event(serde_json::json!({
            "session_id": "s1", "tool_name": "Task",
            "tool_input": {"subagent_type": "error-detective", "prompt": "scan"},
            "tool_response": {"content": "I looked around.\nKey finding: the retry loop never backs off under load.\nfound another thing too"}
        }));
        handle(&ctx, &ev).unwrap();

        let ns = format!("proj/{}/crew/_shared/discoveries", ctx.project_hash);
        let records = ctx.store.list(&ns, 10).unwrap();
        assert_eq!(records.len(), 1, "only one discovery per invocation");
        let record = &records[0];
        assert!(record.summary.to_lowercase().starts_with("found"));
        assert!(record.tags.contains(&"crew-shared".to_string()));
        assert!(record.tags.contains(&"alice".to_string()));
    }

    #[test]
    fn general_purpose_agents_produce_no_discoveries() {
        let dir = TempDir::new().unwrap();
        let ctx = memory_context(dir.path(), Some(crew_id("alice")));
        let ev = event(serde_json::json!({
            "session_id": "s1", "tool_name": "Task",
            "tool_input": {"subagent_type": "general-purpose", "prompt": "scan"},
            "tool_response": "found a really interesting thing in the cache layer"
        }));
        handle(&ctx, &ev).unwrap();
        let ns = format!("proj/{}/crew/_shared/discoveries", ctx.project_hash);
        assert!(ctx.store.list(&ns, 10).unwrap().is_empty());
    }

    #[test]
    fn discovery_span_bounds() {
        assert!(discovery_span("nothing interesting here").is_none());
        assert!(discovery_span("found it").is_none()); // under 10 chars
        let long = format!("issue: {}", "x".repeat(200));
        let span = discovery_span(&long).unwrap();
        assert!(span.chars().count() <= 100);
    }
}
