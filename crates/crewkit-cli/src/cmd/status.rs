use crate::output::{print_json, print_table};
use chrono::Utc;
use crewkit_core::identity;
use crewkit_core::team::TeamState;
use std::path::Path;

pub fn run(root: &Path, profile: Option<&str>, json: bool) -> anyhow::Result<()> {
    let project_hash = identity::project_hash(root);
    let profiles = match profile {
        Some(p) => vec![p.to_string()],
        None => TeamState::list_profiles(&project_hash).unwrap_or_default(),
    };

    if profiles.is_empty() {
        println!("No team state recorded for this project.");
        return Ok(());
    }

    let mut states = Vec::new();
    for name in &profiles {
        match TeamState::load(&project_hash, name) {
            Ok(Some(state)) => states.push(state),
            Ok(None) => println!("No team state for profile '{name}'."),
            Err(e) => eprintln!("error: profile '{name}': {e:#}"),
        }
    }

    if json {
        return print_json(&states);
    }

    let now = Utc::now();
    for state in &states {
        println!(
            "\nProfile '{}' — team \"{}\" ({}, config {})",
            state.profile_name, state.team_name, state.status, state.config_hash
        );
        let rows = state
            .teammates
            .iter()
            .map(|(name, tm)| {
                let last = tm
                    .last_active
                    .map(|t| {
                        let hours = (now - t).num_seconds() as f64 / 3600.0;
                        format!("{hours:.1}h ago")
                    })
                    .unwrap_or_else(|| "never".to_string());
                vec![
                    name.clone(),
                    tm.status.to_string(),
                    last,
                    tm.branch.clone(),
                    tm.agent_id.clone().unwrap_or_else(|| "-".to_string()),
                    tm.worktree_path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ]
            })
            .collect();
        print_table(
            &["teammate", "status", "last active", "branch", "agent", "worktree"],
            rows,
        );
    }
    Ok(())
}
