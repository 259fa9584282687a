//! Launch prompt synthesis.
//!
//! Pure functions over (profile, team state, worktree map, staleness): no
//! filesystem or git access here. The lead prompt is what `start` prints for
//! the user to paste into the host agent; spawn prompts are embedded per
//! teammate and carry the path isolation rules.

use crate::config::ResolvedTeammate;
use crate::team::TeamState;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub struct PromptInputs<'a> {
    pub project_root: &'a Path,
    pub team_name: &'a str,
    pub profile_name: &'a str,
    pub config_hash: &'a str,
    pub teammates: &'a [ResolvedTeammate],
    pub worktree_paths: &'a BTreeMap<String, PathBuf>,
    pub previous: Option<&'a TeamState>,
    pub stale_after_hours: f64,
    pub resume: bool,
    pub now: DateTime<Utc>,
}

/// The document `start` saves and prints.
pub fn lead_prompt(inputs: &PromptInputs<'_>) -> String {
    if inputs.resume {
        resume_prompt(inputs)
    } else {
        fresh_prompt(inputs)
    }
}

fn resume_prompt(inputs: &PromptInputs<'_>) -> String {
    let mut out = String::new();
    let hours = inputs
        .previous
        .and_then(|p| p.hours_since_activity(inputs.now))
        .unwrap_or(0.0);
    out.push_str(&format!(
        "# Resume team \"{}\" ({:.1}h since last activity)\n\n",
        inputs.team_name, hours
    ));

    for tm in inputs.teammates {
        let wt = inputs
            .worktree_paths
            .get(&tm.name)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(no worktree)".to_string());
        let saved = inputs.previous.and_then(|p| p.teammates.get(&tm.name));
        let agent = saved.and_then(|s| s.agent_id.as_deref());
        let stale = saved
            .and_then(|s| s.last_active)
            .map(|last| (inputs.now - last).num_seconds() as f64 / 3600.0 > inputs.stale_after_hours)
            .unwrap_or(true);

        out.push_str(&format!("## {}\n", tm.name));
        out.push_str(&format!("- branch: `{}`\n", tm.branch));
        out.push_str(&format!("- worktree: `{wt}`\n"));
        match (agent, stale) {
            (Some(id), false) => {
                out.push_str(&format!("- agent: `{id}`\n"));
                out.push_str(&format!(
                    "- action: resume the existing agent `{id}` and tell it to continue its task.\n\n"
                ));
            }
            (Some(id), true) => {
                out.push_str(&format!("- agent: `{id}` (STALE — spawn fresh)\n"));
                out.push_str("- action: spawn a fresh teammate with the prompt below.\n\n");
                out.push_str(&spawn_block(tm, inputs));
            }
            (None, _) => {
                out.push_str("- agent: none (STALE — spawn fresh)\n");
                out.push_str("- action: spawn a fresh teammate with the prompt below.\n\n");
                out.push_str(&spawn_block(tm, inputs));
            }
        }
    }
    out
}

fn fresh_prompt(inputs: &PromptInputs<'_>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# Launch team \"{}\" (profile `{}`, config {})\n\n",
        inputs.team_name, inputs.profile_name, inputs.config_hash
    ));

    out.push_str("## Step 1 — create the team container\n\n");
    out.push_str(&format!(
        "Create a team named `{}` to coordinate the teammates below.\n\n",
        inputs.team_name
    ));

    out.push_str("## Step 2 — create one task per teammate\n\n");
    for tm in inputs.teammates {
        out.push_str(&format!(
            "- task `{}`: work on branch `{}`. {}\n",
            tm.name,
            tm.branch,
            first_sentence(&tm.focus)
        ));
    }
    out.push('\n');

    out.push_str("## Step 3 — spawn all teammates IN PARALLEL\n\n");
    out.push_str("One spawn invocation per teammate, all in a single message:\n\n");
    for tm in inputs.teammates {
        out.push_str(&spawn_block(tm, inputs));
    }

    out.push_str("## Step 4 — assign tasks\n\n");
    out.push_str("Assign each task to the teammate of the same name.\n");
    out
}

fn spawn_block(tm: &ResolvedTeammate, inputs: &PromptInputs<'_>) -> String {
    let mut out = String::new();
    out.push_str(&format!("```\nname: {}\n", tm.name));
    out.push_str(&format!("team: {}\n", inputs.team_name));
    out.push_str(&format!("subagent_type: {}\n", tm.subagent_type));
    out.push_str(&format!("mode: {}\n", tm.mode));
    out.push_str(&format!("model: {}\n", tm.model));
    out.push_str("prompt: |\n");
    for line in spawn_prompt(tm, inputs).lines() {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("```\n\n");
    out
}

/// The prompt body a freshly spawned teammate receives. This is the heart
/// of crew isolation: every tool call must stay inside the worktree.
pub fn spawn_prompt(tm: &ResolvedTeammate, inputs: &PromptInputs<'_>) -> String {
    let worktree = inputs
        .worktree_paths
        .get(&tm.name)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| inputs.project_root.display().to_string());
    let project_root = inputs.project_root.display().to_string();

    let focus = tm
        .focus
        .replace("{WORKTREE_PATH}", &worktree)
        .replace("{PROJECT_ROOT}", &project_root)
        .replace("{TEAMMATE_NAME}", &tm.name);

    let mut out = String::new();
    out.push_str(&format!(
        "You are **{}**, a teammate on team \"{}\".\n\n",
        tm.name, inputs.team_name
    ));
    out.push_str(&format!("Your branch: `{}`\n", tm.branch));
    out.push_str(&format!("Your worktree: `{worktree}`\n\n"));

    out.push_str("### Path rules\n\n");
    out.push_str("| Tool | Rule |\n|---|---|\n");
    out.push_str(&format!(
        "| Read/Write/Edit | paths MUST start with `{worktree}` |\n"
    ));
    out.push_str(&format!("| Bash | `cd {worktree}` first; never leave it |\n"));
    out.push_str(&format!(
        "| any | NEVER touch paths under `{project_root}` — that is the lead's checkout |\n\n"
    ));

    if !focus.trim().is_empty() {
        out.push_str("### Focus\n\n");
        out.push_str(focus.trim());
        out.push_str("\n\n");
    }

    out.push_str("### Workflow\n\n");
    out.push_str("1. Claim your task.\n");
    out.push_str("2. Work on it inside your worktree, committing to your branch.\n");
    out.push_str("3. Mark the task complete.\n");
    out.push_str("4. Poll for the next available task; if none, go idle.\n");
    out
}

fn first_sentence(text: &str) -> &str {
    match text.find(". ") {
        Some(i) => &text[..=i],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
