//! Teammate liveness classification for `doctor`.
//!
//! Classes are derived from `last_active` relative to the staleness
//! threshold, cross-checked against recent commits in the worktree.

use crate::git;
use crate::team::{TeamState, TeammateState};
use crate::types::HealthStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Window used when counting "recent" commits in a worktree.
const COMMIT_WINDOW_HOURS: f64 = 24.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeammateHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours_since_active: Option<f64>,
    pub recent_commits: u64,
    pub recommendation: String,
}

/// Classify one teammate.
///
/// - `active` — last_active within the threshold;
/// - `idle` — between one and two thresholds;
/// - `crashed` — beyond two thresholds with a worktree that shows no
///   recent commits;
/// - `unresponsive` — beyond the threshold with nothing better to say
///   (including no `last_active` at all).
pub fn classify(
    state: Option<&TeammateState>,
    stale_after_hours: f64,
    now: DateTime<Utc>,
) -> (HealthStatus, Option<f64>, u64) {
    let Some(state) = state else {
        return (HealthStatus::Unknown, None, 0);
    };

    let recent_commits = state
        .worktree_path
        .as_deref()
        .filter(|p| p.exists())
        .and_then(|p| git::commits_since_hours(p, COMMIT_WINDOW_HOURS))
        .unwrap_or(0);

    let Some(last_active) = state.last_active else {
        return (HealthStatus::Unresponsive, None, recent_commits);
    };
    let hours = (now - last_active).num_seconds() as f64 / 3600.0;

    let status = if hours <= stale_after_hours {
        HealthStatus::Active
    } else if hours <= 2.0 * stale_after_hours {
        HealthStatus::Idle
    } else if state
        .worktree_path
        .as_deref()
        .map(|p| p.exists())
        .unwrap_or(false)
        && recent_commits == 0
    {
        HealthStatus::Crashed
    } else {
        HealthStatus::Unresponsive
    };
    (status, Some(hours), recent_commits)
}

/// Full doctor report for a profile's team state.
pub fn report(team: &TeamState, stale_after_hours: f64, now: DateTime<Utc>) -> Vec<TeammateHealth> {
    team.teammates
        .iter()
        .map(|(name, state)| {
            let (status, hours, commits) = classify(Some(state), stale_after_hours, now);
            TeammateHealth {
                name: name.clone(),
                status,
                hours_since_active: hours,
                recent_commits: commits,
                recommendation: recommend(status, commits),
            }
        })
        .collect()
}

fn recommend(status: HealthStatus, recent_commits: u64) -> String {
    match status {
        HealthStatus::Active => "healthy".to_string(),
        HealthStatus::Idle => "resume with the saved agent id".to_string(),
        HealthStatus::Crashed => "spawn fresh; the worktree shows no recent commits".to_string(),
        HealthStatus::Unresponsive if recent_commits > 0 => format!(
            "worktree has {recent_commits} recent commit(s) but no heartbeat; check the agent"
        ),
        HealthStatus::Unresponsive => "spawn fresh".to_string(),
        HealthStatus::Unknown => "no state recorded; start the profile".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TeammateStatus;
    use chrono::Duration;
    use std::path::PathBuf;

    fn state(hours_ago: Option<i64>, worktree: Option<PathBuf>) -> TeammateState {
        TeammateState {
            branch: "feat/a".to_string(),
            worktree_path: worktree,
            status: TeammateStatus::Active,
            agent_id: None,
            last_active: hours_ago.map(|h| Utc::now() - Duration::hours(h)),
        }
    }

    #[test]
    fn classes_by_elapsed_time() {
        let now = Utc::now();
        let (s, _, _) = classify(Some(&state(Some(1), None)), 4.0, now);
        assert_eq!(s, HealthStatus::Active);

        let (s, _, _) = classify(Some(&state(Some(6), None)), 4.0, now);
        assert_eq!(s, HealthStatus::Idle);

        let (s, _, _) = classify(Some(&state(Some(20), None)), 4.0, now);
        assert_eq!(s, HealthStatus::Unresponsive);

        let (s, hours, _) = classify(Some(&state(None, None)), 4.0, now);
        assert_eq!(s, HealthStatus::Unresponsive);
        assert!(hours.is_none());

        let (s, _, _) = classify(None, 4.0, now);
        assert_eq!(s, HealthStatus::Unknown);
    }

    #[test]
    fn stale_worktree_with_recent_commits_is_unresponsive() {
        let dir = tempfile::TempDir::new().unwrap();
        crate::git::testutil::init_repo(dir.path());
        // The init commit is recent, so first check the unresponsive side
        // with a long window passed: recent_commits > 0 → unresponsive.
        let now = Utc::now();
        let (s, _, commits) = classify(
            Some(&state(Some(20), Some(dir.path().to_path_buf()))),
            4.0,
            now,
        );
        assert!(commits > 0);
        assert_eq!(s, HealthStatus::Unresponsive);
    }

    #[test]
    fn stale_worktree_without_recent_commits_is_crashed() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = dir.path();
        let run = |args: &[&str]| {
            let ok = std::process::Command::new("git")
                .arg("-C")
                .arg(repo)
                .args(args)
                .env("GIT_AUTHOR_DATE", "2000-01-01T00:00:00Z")
                .env("GIT_COMMITTER_DATE", "2000-01-01T00:00:00Z")
                .status()
                .unwrap()
                .success();
            assert!(ok, "git {args:?} failed");
        };
        run(&["init", "-b", "main"]);
        run(&["config", "user.name", "Crewkit Test"]);
        run(&["config", "user.email", "test@crewkit.local"]);
        std::fs::write(repo.join("README.md"), "seed\n").unwrap();
        run(&["add", "."]);
        run(&["commit", "-m", "ancient"]);

        let (s, _, commits) = classify(
            Some(&state(Some(20), Some(repo.to_path_buf()))),
            4.0,
            Utc::now(),
        );
        assert_eq!(commits, 0);
        assert_eq!(s, HealthStatus::Crashed);
    }

    #[test]
    fn report_covers_every_teammate() {
        let mut team = TeamState::new("core", "dev", "cafe01234567");
        team.teammates.insert("alice".to_string(), state(Some(1), None));
        team.teammates.insert("bob".to_string(), state(None, None));
        let rows = report(&team, 4.0, Utc::now());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "alice");
        assert_eq!(rows[0].status, HealthStatus::Active);
        assert_eq!(rows[1].status, HealthStatus::Unresponsive);
    }
}
