use crate::output::{print_json, print_table};
use anyhow::Context;
use crewkit_core::config::CrewConfig;
use crewkit_core::merge::{self, MergeOptions};
use std::path::Path;

fn teammate_branches(root: &Path, profile: Option<&str>) -> anyhow::Result<Vec<(String, String)>> {
    let config = CrewConfig::load(root).context("failed to load crew config")?;
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(crewkit_core::CrewkitError::InvalidConfig(errors).into());
    }
    let resolved = config.resolve(profile, None)?;
    Ok(resolved
        .teammates
        .iter()
        .map(|t| (t.name.clone(), t.branch.clone()))
        .collect())
}

pub fn preview(root: &Path, profile: Option<&str>, json: bool) -> anyhow::Result<()> {
    let config = CrewConfig::load(root).context("failed to load crew config")?;
    let main_branch = config.project.main_branch.clone();
    let branches = teammate_branches(root, profile)?;

    let previews = merge::preview(root, &main_branch, &branches);
    let overlaps = merge::detect_overlaps(&previews);

    if json {
        return print_json(&serde_json::json!({
            "main_branch": main_branch,
            "branches": previews,
            "overlaps": overlaps,
        }));
    }

    let rows = previews
        .iter()
        .map(|p| {
            vec![
                p.teammate.clone(),
                p.branch.clone(),
                format!("{:?}", p.status).to_lowercase(),
                p.changed_files.len().to_string(),
                if p.conflict_files.is_empty() {
                    p.message.clone().unwrap_or_default()
                } else {
                    p.conflict_files.join(", ")
                },
            ]
        })
        .collect();
    print_table(&["teammate", "branch", "status", "changed", "conflicts / note"], rows);

    if !overlaps.is_empty() {
        println!("\nOverlapping files:");
        for overlap in &overlaps {
            println!(
                "  {} <-> {}: {}",
                overlap.teammates.0,
                overlap.teammates.1,
                overlap.files.join(", ")
            );
        }
    }
    Ok(())
}

pub fn execute(
    root: &Path,
    profile: Option<&str>,
    test: Option<&str>,
    no_backup: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = CrewConfig::load(root).context("failed to load crew config")?;
    let main_branch = config.project.main_branch.clone();
    let branches = teammate_branches(root, profile)?;

    let options = MergeOptions {
        create_backup: !no_backup,
        test_command: test.map(str::to_string),
    };
    let report = merge::execute(root, &main_branch, &branches, &options)
        .context("merge execution failed")?;

    if json {
        return print_json(&report);
    }

    if let Some(tag) = &report.backup_tag {
        println!("Backup tag: {tag}");
    }
    for branch in &report.success {
        println!("merged   {branch}");
    }
    for (branch, reason) in &report.failed {
        println!("failed   {branch}: {reason}");
    }
    for (branch, reason) in &report.skipped {
        println!("skipped  {branch}: {reason}");
    }
    Ok(())
}
