use clap::ValueEnum;
use crewkit_core::hooks::{self, HookKind};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HookEventArg {
    PreToolUse,
    PostToolUse,
    SessionStart,
    PreCompact,
    SessionEnd,
}

impl From<HookEventArg> for HookKind {
    fn from(arg: HookEventArg) -> Self {
        match arg {
            HookEventArg::PreToolUse => HookKind::PreToolUse,
            HookEventArg::PostToolUse => HookKind::PostToolUse,
            HookEventArg::SessionStart => HookKind::SessionStart,
            HookEventArg::PreCompact => HookKind::PreCompact,
            HookEventArg::SessionEnd => HookKind::SessionEnd,
        }
    }
}

/// Hooks must never fail the host: exit 0 regardless of what happened
/// inside, stdout reserved for the protocol response.
pub fn run(event: HookEventArg) -> i32 {
    let mut stdin = std::io::stdin().lock();
    let mut stdout = std::io::stdout().lock();
    hooks::run(event.into(), &mut stdin, &mut stdout)
}
