use crate::output::{print_json, print_table};
use crewkit_core::gc::{self, GcOptions};

pub fn run(delete_branches: bool, force: bool, json: bool) -> anyhow::Result<()> {
    let options = GcOptions {
        stale_after_hours: None,
        delete_branches,
    };
    let orphans = gc::find_orphans(&options)?;

    if orphans.is_empty() {
        if json {
            print_json(&serde_json::json!({"orphans": [], "removed": []}))?;
        } else {
            println!("No orphaned worktrees.");
        }
        return Ok(());
    }

    if !force {
        if json {
            return print_json(&serde_json::json!({"orphans": orphans, "removed": []}));
        }
        print_orphans(&orphans);
        println!("\nRun again with --force to remove.");
        return Ok(());
    }

    let report = gc::reclaim(&orphans, &options)?;
    if json {
        return print_json(&serde_json::json!({"orphans": orphans, "removed": report.removed, "failed": report.failed}));
    }
    for orphan in &report.removed {
        println!("removed {} ({})", orphan.path.display(), orphan.reason);
    }
    for (path, reason) in &report.failed {
        println!("failed  {}: {reason}", path.display());
    }
    Ok(())
}

fn print_orphans(orphans: &[gc::Orphan]) {
    let rows = orphans
        .iter()
        .map(|o| {
            vec![
                o.name.clone(),
                o.branch.clone(),
                o.path.display().to_string(),
                format!("{:.1} MB", o.size_bytes as f64 / (1024.0 * 1024.0)),
                o.reason.clone(),
            ]
        })
        .collect();
    print_table(&["teammate", "branch", "path", "size", "reason"], rows);
}
