use crate::output::print_json;
use anyhow::Context;
use crewkit_core::config::CrewConfig;
use crewkit_core::team::TeamState;
use crewkit_core::{identity, worktree};
use std::path::Path;

pub fn run(root: &Path, profile: Option<&str>, cleanup: bool, json: bool) -> anyhow::Result<()> {
    let project_hash = identity::project_hash(root);
    let profile_name = match profile {
        Some(p) => p.to_string(),
        None => default_profile_name(root),
    };

    let Some(mut state) = TeamState::load(&project_hash, &profile_name)? else {
        println!("No team state for profile '{profile_name}'; nothing to stop.");
        return Ok(());
    };

    state.mark_stopped();
    state.save(&project_hash).context("failed to save team state")?;

    let mut removed = Vec::new();
    if cleanup {
        for name in state.teammates.keys() {
            match worktree::remove(root, &project_hash, name) {
                Ok(()) => removed.push(name.clone()),
                Err(e) => eprintln!("error: removing worktree for '{name}': {e:#}"),
            }
        }
    }

    if json {
        print_json(&serde_json::json!({
            "profile": profile_name,
            "status": "stopped",
            "removed_worktrees": removed,
        }))?;
    } else {
        println!("Stopped profile '{profile_name}'.");
        for name in &removed {
            println!("Removed worktree for '{name}'.");
        }
    }
    Ok(())
}

/// The profile `stop`/`status` target when none is named: the config's
/// resolution order when a config exists, else "default".
pub fn default_profile_name(root: &Path) -> String {
    CrewConfig::load(root)
        .ok()
        .and_then(|cfg| cfg.resolve(None, None).ok().map(|r| r.profile_name))
        .unwrap_or_else(|| crewkit_core::config::DEFAULT_PROFILE.to_string())
}
