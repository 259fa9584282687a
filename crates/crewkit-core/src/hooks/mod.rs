//! Tool-event hooks.
//!
//! Each hook is a short-lived process: one JSON event on stdin, an optional
//! protocol response on stdout, exit 0 no matter what. A hook that blocks or
//! crashes the host is worse than a hook that silently does nothing, so the
//! outer runner swallows every error (and panic) after logging to stderr.

mod post_tool_use;
mod pre_compact;
mod pre_tool_use;
mod session_end;
mod session_start;

use crate::identity::{self, CrewIdentity};
use crate::store::Capsule;
use crate::{error::Result, paths};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Event model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    PreToolUse,
    PostToolUse,
    SessionStart,
    PreCompact,
    SessionEnd,
}

impl HookKind {
    pub fn event_name(self) -> &'static str {
        match self {
            HookKind::PreToolUse => "PreToolUse",
            HookKind::PostToolUse => "PostToolUse",
            HookKind::SessionStart => "SessionStart",
            HookKind::PreCompact => "PreCompact",
            HookKind::SessionEnd => "SessionEnd",
        }
    }
}

/// The host runtime's event payload; only the fields the core consumes.
/// Unknown fields are ignored by design.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookEvent {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: serde_json::Value,
    #[serde(default)]
    pub tool_response: serde_json::Value,
}

impl HookEvent {
    pub fn file_path(&self) -> Option<PathBuf> {
        self.tool_input
            .get("file_path")
            .or_else(|| self.tool_input.get("path"))
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
    }

    pub fn subagent_type(&self) -> Option<&str> {
        self.tool_input.get("subagent_type").and_then(|v| v.as_str())
    }

    pub fn prompt(&self) -> Option<&str> {
        self.tool_input.get("prompt").and_then(|v| v.as_str())
    }

    /// Best-effort flattening of `tool_response` to text.
    pub fn response_text(&self) -> String {
        value_text(&self.tool_response)
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join("\n"),
        serde_json::Value::Object(map) => map
            .iter()
            .filter(|(k, _)| matches!(k.as_str(), "content" | "text" | "output" | "result"))
            .map(|(_, v)| value_text(v))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// Wire shape for structured hook responses.
#[derive(Debug, Serialize)]
pub struct HookResponse {
    #[serde(rename = "hookSpecificOutput")]
    pub hook_specific_output: HookOutput,
}

#[derive(Debug, Serialize)]
pub struct HookOutput {
    #[serde(rename = "hookEventName")]
    pub hook_event_name: String,
    #[serde(rename = "additionalContext")]
    pub additional_context: String,
}

impl HookResponse {
    pub fn new(kind: HookKind, additional_context: String) -> Self {
        Self {
            hook_specific_output: HookOutput {
                hook_event_name: kind.event_name().to_string(),
                additional_context,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a handler needs, resolved once per hook process.
pub struct HookContext {
    pub cwd: PathBuf,
    pub project_hash: String,
    pub crew: Option<CrewIdentity>,
    pub store: Capsule,
}

impl HookContext {
    pub fn resolve(event: &HookEvent) -> Result<Self> {
        let cwd = event
            .cwd
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let project_hash = identity::project_hash(&cwd);
        let crew = identity::resolve_crew_identity(&cwd, event.file_path().as_deref());
        let store = Capsule::open(&paths::store_path()?)?;
        Ok(Self {
            cwd,
            project_hash,
            crew,
            store,
        })
    }

    /// `proj/<hash>` or `proj/<hash>/crew/<teammate>`.
    pub fn namespace_root(&self) -> String {
        identity::namespace_root(&self.project_hash, self.crew.as_ref())
    }

    pub fn discovery_namespaces(&self) -> Vec<String> {
        identity::discovery_namespaces(&self.project_hash, self.crew.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Run one hook end to end. Always returns exit code 0; stdout carries the
/// protocol response when there is one, stderr only diagnostics.
pub fn run(kind: HookKind, input: &mut dyn Read, output: &mut dyn std::io::Write) -> i32 {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| run_inner(kind, input)));
    match result {
        Ok(Ok(Some(response))) => {
            let _ = writeln!(output, "{response}");
        }
        Ok(Ok(None)) => {}
        Ok(Err(e)) => {
            tracing::debug!(hook = kind.event_name(), error = %e, "hook degraded silently");
        }
        Err(_) => {
            tracing::debug!(hook = kind.event_name(), "hook panicked; suppressed");
        }
    }
    0
}

fn run_inner(kind: HookKind, input: &mut dyn Read) -> Result<Option<String>> {
    let mut raw = String::new();
    input.take(10 * 1024 * 1024).read_to_string(&mut raw)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let event: HookEvent = match serde_json::from_str(raw) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable hook event");
            return Ok(None);
        }
    };

    let probe_cwd = event
        .cwd
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    if identity::hooks_disabled(&probe_cwd) {
        return Ok(None);
    }

    let ctx = HookContext::resolve(&event)?;
    dispatch(kind, &ctx, &event)
}

/// Route an event to its handler. Public for tests; the CLI goes through
/// `run`.
pub fn dispatch(kind: HookKind, ctx: &HookContext, event: &HookEvent) -> Result<Option<String>> {
    match kind {
        HookKind::PreToolUse => pre_tool_use::handle(ctx, event),
        HookKind::PostToolUse => post_tool_use::handle(ctx, event),
        HookKind::SessionStart => session_start::handle(ctx, event),
        HookKind::PreCompact => pre_compact::handle(ctx, event),
        HookKind::SessionEnd => session_end::handle(ctx, event),
    }
}

/// Path fragments that exclude a file from capture: VCS metadata and
/// dependency caches.
pub(crate) fn is_ignored_path(path: &Path) -> bool {
    path.components().any(|c| {
        matches!(
            c.as_os_str().to_string_lossy().as_ref(),
            ".git" | ".hg" | ".svn" | "node_modules" | "target" | "vendor" | ".venv" | "__pycache__"
        )
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
