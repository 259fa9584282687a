//! Pre-compact hook: write the handoff document while full context is
//! still on hand. Anything that goes wrong here must stay silent — this
//! hook runs on the host's compaction path.

use super::{HookContext, HookEvent};
use crate::error::Result;
use crate::handoff;
use crate::store::ContextRecord;
use crate::types::RecordType;

pub(super) fn handle(ctx: &HookContext, event: &HookEvent) -> Result<Option<String>> {
    if event.session_id.is_empty() {
        return Ok(None);
    }
    let root = ctx.namespace_root();
    let doc = handoff::generate(&ctx.store, &root, &event.session_id, ctx.crew.as_ref());

    let mut tags = vec![
        "handoff".to_string(),
        "pre-compact".to_string(),
        event.session_id.clone(),
    ];
    if let Some(crew) = &ctx.crew {
        tags.push(crew.teammate_name.clone());
    }

    ctx.store.save(
        &ContextRecord::new(
            format!("{root}/session/{}/handoff", event.session_id),
            "handoff",
            doc,
            RecordType::Summary,
        )
        .with_tags(tags),
    )?;
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::testhooks::{event, memory_context};
    use tempfile::TempDir;

    #[test]
    fn writes_tagged_handoff_record() {
        let dir = TempDir::new().unwrap();
        let ctx = memory_context(dir.path(), None);
        let root = ctx.namespace_root();
        ctx.store
            .save(
                &ContextRecord::new(
                    format!("{root}/session/s1/files/edit"),
                    "a.rs",
                    "edit: /p/a.rs",
                    RecordType::Meta,
                )
                .with_content(serde_json::json!({"filePath": "/p/a.rs", "action": "edit"})),
            )
            .unwrap();

        let ev = event(serde_json::json!({"session_id": "s1"}));
        assert!(handle(&ctx, &ev).unwrap().is_none());

        let record = ctx.store.latest_with_tag(&root, "handoff").unwrap().unwrap();
        assert_eq!(record.title, "handoff");
        assert!(record.summary.contains("`/p/a.rs`"));
        assert!(record.tags.contains(&"pre-compact".to_string()));
        assert!(record.tags.contains(&"s1".to_string()));
    }

    #[test]
    fn missing_session_id_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let ctx = memory_context(dir.path(), None);
        let ev = event(serde_json::json!({}));
        assert!(handle(&ctx, &ev).unwrap().is_none());
    }
}
