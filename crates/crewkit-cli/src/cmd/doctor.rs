use crate::output::{print_json, print_table};
use chrono::Utc;
use crewkit_core::config::{CrewConfig, DEFAULT_STALE_AFTER_HOURS};
use crewkit_core::team::TeamState;
use crewkit_core::{health, identity};
use std::path::Path;

pub fn run(root: &Path, profile: Option<&str>, json: bool) -> anyhow::Result<()> {
    let project_hash = identity::project_hash(root);
    let config = CrewConfig::load(root).ok();
    let profiles = match profile {
        Some(p) => vec![p.to_string()],
        None => TeamState::list_profiles(&project_hash).unwrap_or_default(),
    };

    if profiles.is_empty() {
        println!("No team state recorded; nothing to examine.");
        return Ok(());
    }

    let now = Utc::now();
    let mut all = Vec::new();
    for name in &profiles {
        let Ok(Some(state)) = TeamState::load(&project_hash, name) else {
            continue;
        };
        let threshold = config
            .as_ref()
            .map(|c| c.stale_after_hours_for(name))
            .unwrap_or(DEFAULT_STALE_AFTER_HOURS);
        let report = health::report(&state, threshold, now);
        all.push((name.clone(), report));
    }

    if json {
        let value: serde_json::Value = all
            .iter()
            .map(|(name, report)| (name.clone(), serde_json::to_value(report).unwrap_or_default()))
            .collect::<serde_json::Map<_, _>>()
            .into();
        return print_json(&value);
    }

    for (name, report) in &all {
        println!("\nProfile '{name}'");
        let rows = report
            .iter()
            .map(|h| {
                vec![
                    h.name.clone(),
                    h.status.to_string(),
                    h.hours_since_active
                        .map(|v| format!("{v:.1}h"))
                        .unwrap_or_else(|| "-".to_string()),
                    h.recent_commits.to_string(),
                    h.recommendation.clone(),
                ]
            })
            .collect();
        print_table(
            &["teammate", "health", "last active", "commits (24h)", "recommendation"],
            rows,
        );
    }
    Ok(())
}
