//! Session-end hook: summarize the session into the store, and in crew
//! mode report the teammate back to its profile's team state.

use super::{HookContext, HookEvent};
use crate::error::Result;
use crate::git;
use crate::store::ContextRecord;
use crate::team::TeamState;
use crate::types::{RecordType, TeammateStatus};
use chrono::Utc;

pub(super) fn handle(ctx: &HookContext, event: &HookEvent) -> Result<Option<String>> {
    if event.session_id.is_empty() {
        return Ok(None);
    }
    let root = ctx.namespace_root();
    let sid = &event.session_id;

    let files = ctx
        .store
        .list_prefix(&format!("{root}/session/{sid}/files"), 500)?
        .len();
    let subagents = ctx.store.list(&format!("{root}/session/{sid}/subagents"), 500)?.len();
    let branch = git::current_branch(&ctx.cwd);
    let now = Utc::now();

    let short_sid: String = sid.chars().take(8).collect();
    let mut summary = format!("Session {short_sid}: {files} file(s), {subagents} subagent(s)");
    if let Some(crew) = &ctx.crew {
        summary.push_str(&format!(" — {}", crew.teammate_name));
    }
    summary.push_str(&format!(" at {}", now.to_rfc3339()));

    let mut tags = vec!["session".to_string(), sid.clone()];
    if let Some(branch) = &branch {
        tags.push(format!("branch:{branch}"));
    }

    ctx.store.save(
        &ContextRecord::new(format!("{root}/session"), sid, summary, RecordType::Meta)
            .with_content(serde_json::json!({
                "files": files,
                "subagents": subagents,
                "branch": branch,
                "teammate": ctx.crew.as_ref().map(|c| c.teammate_name.clone()),
                "endedAt": now.to_rfc3339(),
            }))
            .with_tags(tags),
    )?;

    // Team-state touch is best-effort: a missing or foreign profile must
    // not turn session end into a failure.
    if let Some(crew) = &ctx.crew {
        if let Err(e) = mark_idle(crew) {
            tracing::debug!(error = %e, "team state update skipped");
        }
    }
    Ok(None)
}

fn mark_idle(crew: &crate::identity::CrewIdentity) -> Result<()> {
    let hash = crate::identity::project_hash(&crew.project_root);
    if let Some(mut state) = TeamState::load(&hash, &crew.profile_name)? {
        state.teammate_seen(&crew.teammate_name, TeammateStatus::Idle);
        state.save(&hash)?;
    }
    Ok(())
}
