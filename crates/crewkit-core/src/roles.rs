//! Role presets: a closed dictionary of teammate defaults.
//!
//! A role fills in model, permission mode, sub-agent type and a focus
//! prefix; explicit fields on the teammate always win.

pub struct RolePreset {
    pub name: &'static str,
    pub model: &'static str,
    pub mode: &'static str,
    pub subagent_type: &'static str,
    pub focus_prefix: &'static str,
}

const PRESETS: &[RolePreset] = &[
    RolePreset {
        name: "developer",
        model: "sonnet",
        mode: "bypassPermissions",
        subagent_type: "general-purpose",
        focus_prefix: "Implement features, write code, fix bugs in your worktree.",
    },
    RolePreset {
        name: "reviewer",
        model: "sonnet",
        mode: "default",
        subagent_type: "general-purpose",
        focus_prefix: "Review code for bugs, security, quality. Read-only — do not modify files.",
    },
    RolePreset {
        name: "tester",
        model: "haiku",
        mode: "bypassPermissions",
        subagent_type: "general-purpose",
        focus_prefix: "Write and run tests. Ensure coverage for new features.",
    },
    RolePreset {
        name: "architect",
        model: "opus",
        mode: "default",
        subagent_type: "general-purpose",
        focus_prefix: "Design architecture, review patterns, suggest improvements. Read-only.",
    },
];

pub fn preset(name: &str) -> Option<&'static RolePreset> {
    PRESETS.iter().find(|p| p.name == name)
}

pub fn is_known(name: &str) -> bool {
    preset(name).is_some()
}

pub fn known_names() -> Vec<&'static str> {
    PRESETS.iter().map(|p| p.name).collect()
}
