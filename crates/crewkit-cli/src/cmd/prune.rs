use crate::output::print_json;
use chrono::{Duration, Utc};
use crewkit_core::paths;
use crewkit_core::store::Capsule;

pub fn run(days: u32, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let store = Capsule::open(&paths::store_path()?)?;
    let cutoff = Utc::now() - Duration::days(i64::from(days));

    let count = if dry_run {
        store.prunable(cutoff)?
    } else {
        store.prune(cutoff)?
    };

    if json {
        print_json(&serde_json::json!({
            "days": days,
            "dry_run": dry_run,
            "records": count,
        }))?;
    } else if dry_run {
        println!("{count} record(s) older than {days} days would be deleted.");
    } else {
        println!("Deleted {count} record(s) older than {days} days.");
    }
    Ok(())
}
