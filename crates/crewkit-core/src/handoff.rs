//! Pre-compaction handoff document.
//!
//! Built from the session's file and sub-agent records while full context
//! is still available; injected verbatim at the next session start. Must
//! never fail loudly — a minimal one-liner is the floor.

use crate::identity::CrewIdentity;
use crate::store::Capsule;
use chrono::{DateTime, Utc};

const REVIEWED_MAX: usize = 5;
const AGENT_SUMMARY_MAX: usize = 180;

/// Render the handoff markdown for a session.
pub fn generate(
    store: &Capsule,
    namespace_root: &str,
    session_id: &str,
    crew: Option<&CrewIdentity>,
) -> String {
    match generate_inner(store, namespace_root, session_id, crew) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!(error = %e, "handoff generation failed; emitting minimal summary");
            format!("Session {session_id} handoff (details unavailable).")
        }
    }
}

fn generate_inner(
    store: &Capsule,
    namespace_root: &str,
    session_id: &str,
    crew: Option<&CrewIdentity>,
) -> crate::error::Result<String> {
    // File records sit in per-action sub-namespaces under `files/`.
    let files = store.list_prefix(&format!("{namespace_root}/session/{session_id}/files"), 200)?;
    let agents = store.list(&format!("{namespace_root}/session/{session_id}/subagents"), 50)?;

    let mut created = Vec::new();
    let mut modified = Vec::new();
    let mut reviewed = Vec::new();
    let mut timestamps: Vec<DateTime<Utc>> = Vec::new();

    for record in &files {
        timestamps.push(record.updated_at);
        let action = record
            .content
            .get("action")
            .and_then(|v| v.as_str())
            .unwrap_or("read");
        let path = record
            .content
            .get("filePath")
            .and_then(|v| v.as_str())
            .unwrap_or(&record.title);
        match action {
            "write" => created.push(path.to_string()),
            "edit" => modified.push(path.to_string()),
            _ => reviewed.push(path.to_string()),
        }
    }

    // No document title here: session-start injects this body under its
    // own "## Session Handoff" heading.
    let mut out = String::new();
    if let Some(id) = crew {
        out.push_str(&format!(
            "Teammate **{}** on branch `{}`.\n\n",
            id.teammate_name, id.branch
        ));
    }

    if !created.is_empty() {
        out.push_str("## Created\n\n");
        for path in &created {
            out.push_str(&format!("- `{path}`\n"));
        }
        out.push('\n');
    }
    if !modified.is_empty() {
        out.push_str("## Modified\n\n");
        for path in &modified {
            out.push_str(&format!("- `{path}`\n"));
        }
        out.push('\n');
    }
    // A long read list is noise in a continuity document.
    if !reviewed.is_empty() && reviewed.len() <= REVIEWED_MAX {
        out.push_str("## Reviewed\n\n");
        for path in &reviewed {
            out.push_str(&format!("- `{path}`\n"));
        }
        out.push('\n');
    }

    if !agents.is_empty() {
        out.push_str("## Sub-Agents Used\n\n");
        for record in &agents {
            timestamps.push(record.updated_at);
            let agent_type = record
                .content
                .get("agentType")
                .and_then(|v| v.as_str())
                .unwrap_or("agent");
            out.push_str(&format!("- {agent_type}: {}\n", truncate(&record.summary, AGENT_SUMMARY_MAX)));
        }
        out.push('\n');
    }

    out.push_str("## Session Summary\n\n");
    out.push_str(&format!(
        "{} file operation(s), {} sub-agent(s).",
        files.len(),
        agents.len()
    ));
    if let (Some(min), Some(max)) = (timestamps.iter().min(), timestamps.iter().max()) {
        let minutes = (*max - *min).num_minutes();
        if minutes > 0 {
            out.push_str(&format!(" About {minutes} minute(s) of work."));
        }
    }
    out.push('\n');
    Ok(out)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}…")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ContextRecord;
    use crate::types::RecordType;

    fn file_record(files_ns: &str, title: &str, path: &str, action: &str) -> ContextRecord {
        ContextRecord::new(
            format!("{files_ns}/{action}"),
            title,
            format!("{action}: {path}"),
            RecordType::Meta,
        )
        .with_content(
            serde_json::json!({"filePath": path, "action": action, "timestamp": Utc::now().to_rfc3339()}),
        )
    }

    #[test]
    fn groups_by_action() {
        let store = Capsule::open_memory().unwrap();
        let files_ns = "proj/x/session/s1/files";
        store.save(&file_record(files_ns, "a.rs", "/p/a.rs", "write")).unwrap();
        store.save(&file_record(files_ns, "b.rs", "/p/b.rs", "edit")).unwrap();
        store.save(&file_record(files_ns, "c.rs", "/p/c.rs", "read")).unwrap();
        store
            .save(
                &ContextRecord::new(
                    "proj/x/session/s1/subagents",
                    "error-detective - t",
                    "why NPE?",
                    RecordType::Summary,
                )
                .with_content(serde_json::json!({"agentType": "error-detective"})),
            )
            .unwrap();

        let doc = generate(&store, "proj/x", "s1", None);
        assert!(doc.contains("## Created"));
        assert!(doc.contains("`/p/a.rs`"));
        assert!(doc.contains("## Modified"));
        assert!(doc.contains("`/p/b.rs`"));
        assert!(doc.contains("## Reviewed"));
        assert!(doc.contains("error-detective: why NPE?"));
        assert!(doc.contains("3 file operation(s), 1 sub-agent(s)."));
    }

    #[test]
    fn long_read_lists_are_dropped() {
        let store = Capsule::open_memory().unwrap();
        let files_ns = "proj/x/session/s2/files";
        for i in 0..6 {
            store
                .save(&file_record(files_ns, &format!("f{i}.rs"), &format!("/p/f{i}.rs"), "read"))
                .unwrap();
        }
        let doc = generate(&store, "proj/x", "s2", None);
        assert!(!doc.contains("## Reviewed"));
        assert!(doc.contains("6 file operation(s)"));
    }

    #[test]
    fn empty_session_still_produces_a_summary() {
        let store = Capsule::open_memory().unwrap();
        let doc = generate(&store, "proj/x", "empty", None);
        assert!(doc.contains("0 file operation(s), 0 sub-agent(s)."));
    }
}
