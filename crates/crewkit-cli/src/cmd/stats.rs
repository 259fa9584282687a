use crate::output::{print_json, print_table};
use clap::ValueEnum;
use crewkit_core::store::Capsule;
use crewkit_core::{paths, stats};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatsView {
    /// Record counts by type and namespace prefix
    Summary,
    /// Most frequently touched files
    Files,
    /// Most frequently used sub-agents
    Agents,
    /// Record counts per session
    Sessions,
    /// Sessions recorded for a branch (arg = branch name)
    Branches,
}

const DEFAULT_TOP_K: usize = 10;

pub fn run(view: StatsView, arg: Option<&str>, json: bool) -> anyhow::Result<()> {
    let store = Capsule::open(&paths::store_path()?)?;
    let limit = arg
        .and_then(|a| a.parse::<usize>().ok())
        .unwrap_or(DEFAULT_TOP_K);

    let (label, rows) = match view {
        StatsView::Summary => {
            let by_type = stats::counts_by_type(&store)?;
            let by_prefix = stats::counts_by_prefix(&store)?;
            if json {
                return print_json(&serde_json::json!({
                    "by_type": by_type,
                    "by_prefix": by_prefix,
                }));
            }
            println!("By type:");
            print_rows(&by_type);
            println!("\nBy project:");
            print_rows(&by_prefix);
            return Ok(());
        }
        StatsView::Files => ("file", stats::top_files(&store, limit)?),
        StatsView::Agents => ("agent", stats::top_agents(&store, limit)?),
        StatsView::Sessions => ("session", stats::sessions(&store)?),
        StatsView::Branches => {
            let branch = arg.unwrap_or("main");
            ("record", stats::branch_sessions(&store, branch)?)
        }
    };

    if json {
        return print_json(&rows);
    }
    print_table(
        &[label, "count"],
        rows.iter()
            .map(|r| vec![r.key.clone(), r.count.to_string()])
            .collect(),
    );
    Ok(())
}

fn print_rows(rows: &[stats::CountRow]) {
    print_table(
        &["key", "count"],
        rows.iter()
            .map(|r| vec![r.key.clone(), r.count.to_string()])
            .collect(),
    );
}
