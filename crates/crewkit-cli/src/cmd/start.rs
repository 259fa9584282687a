use crate::output::print_json;
use anyhow::{bail, Context};
use chrono::Utc;
use crewkit_core::config::CrewConfig;
use crewkit_core::prompt::{self, PromptInputs};
use crewkit_core::team::{self, TeamState};
use crewkit_core::{identity, io, paths, worktree};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub fn run(
    root: &Path,
    profile: Option<&str>,
    crew: Option<&str>,
    fresh: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = CrewConfig::load(root).context("failed to load crew config")?;
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(crewkit_core::CrewkitError::InvalidConfig(errors).into());
    }

    let resolved = config.resolve(profile, crew)?;
    if resolved.teammates.is_empty() {
        bail!(
            "no teammates selected{}",
            crew.map(|c| format!(" for crew '{c}'")).unwrap_or_default()
        );
    }
    let config_hash = config.hash();
    let stale_after = config.stale_after_hours_for(&resolved.profile_name);
    let project_hash = identity::project_hash(root);
    let main_branch = &config.project.main_branch;
    let now = Utc::now();

    let previous = TeamState::load(&project_hash, &resolved.profile_name)?;
    let resume = !fresh
        && previous
            .as_ref()
            .map(|p| p.resumable(&config_hash, stale_after, now))
            .unwrap_or(false);

    // Provision worktrees. A teammate whose directory is unusable is
    // reported and skipped; the rest of the team still launches.
    let mut worktree_paths: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut skipped: Vec<(String, String)> = Vec::new();
    for tm in resolved.teammates.iter().filter(|t| t.worktree) {
        match worktree::provision(
            root,
            &project_hash,
            &resolved.profile_name,
            &resolved.team_name,
            tm,
            main_branch,
        ) {
            Ok(outcome) => {
                for warning in &outcome.warnings {
                    eprintln!("warning: {warning}");
                }
                worktree_paths.insert(tm.name.clone(), outcome.path);
            }
            Err(e) => {
                eprintln!("error: teammate '{}': {e:#}", tm.name);
                skipped.push((tm.name.clone(), e.to_string()));
            }
        }
    }
    if worktree_paths.is_empty() && resolved.teammates.iter().any(|t| t.worktree) {
        bail!("no worktree could be provisioned; aborting start");
    }

    let inputs = PromptInputs {
        project_root: root,
        team_name: &resolved.team_name,
        profile_name: &resolved.profile_name,
        config_hash: &config_hash,
        teammates: &resolved.teammates,
        worktree_paths: &worktree_paths,
        previous: previous.as_ref(),
        stale_after_hours: stale_after,
        resume,
        now,
    };
    let lead = prompt::lead_prompt(&inputs);
    io::atomic_write(
        &paths::lead_prompt_path(&project_hash, &resolved.profile_name)?,
        lead.as_bytes(),
    )?;

    let mut state = team::next_state(previous.as_ref(), &resolved, &config_hash, resume, &worktree_paths);
    for tm in &resolved.teammates {
        state
            .spawn_prompts
            .insert(tm.name.clone(), prompt::spawn_prompt(tm, &inputs));
    }
    state.save(&project_hash)?;

    if json {
        print_json(&serde_json::json!({
            "profile": resolved.profile_name,
            "team": resolved.team_name,
            "config_hash": config_hash,
            "resume": resume,
            "worktrees": worktree_paths,
            "skipped": skipped,
            "lead_prompt": lead,
        }))?;
    } else {
        println!("{lead}");
    }
    Ok(())
}
