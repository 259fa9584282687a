//! Pre-tool-use hook: advisory only.
//!
//! May suggest the AST chunker for oversized reads. It never rejects or
//! rewrites tool input — the host's semantics must be untouched.

use super::{HookContext, HookEvent, HookKind, HookResponse};
use crate::error::Result;

/// Files larger than this are worth chunking instead of reading whole.
const LARGE_FILE_BYTES: u64 = 256 * 1024;

pub(super) fn handle(_ctx: &HookContext, event: &HookEvent) -> Result<Option<String>> {
    let tool = event.tool_name.as_deref().unwrap_or("");
    if !matches!(tool, "Read" | "Grep" | "Glob") {
        return Ok(None);
    }
    let Some(path) = event.file_path() else {
        return Ok(None);
    };
    let Ok(meta) = std::fs::metadata(&path) else {
        return Ok(None);
    };
    if !meta.is_file() || meta.len() < LARGE_FILE_BYTES {
        return Ok(None);
    }

    let advisory = format!(
        "`{}` is {} KB; consider the AST chunker (`crewkit-chunk`) to read it in \
         structural pieces instead of whole.",
        path.display(),
        meta.len() / 1024
    );
    let response = HookResponse::new(HookKind::PreToolUse, advisory);
    Ok(Some(serde_json::to_string(&response)?))
}
