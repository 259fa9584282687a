//! Worktree garbage collection.
//!
//! Scans every project-hash directory under the global crew area and
//! reclaims worktrees whose owner is gone: directory missing, team or
//! teammate stopped, or activity past the staleness threshold.

use crate::config::DEFAULT_STALE_AFTER_HOURS;
use crate::error::Result;
use crate::team::TeamState;
use crate::types::{TeamStatus, TeammateStatus};
use crate::worktree::{self, WorktreeRegistry};
use crate::{git, paths};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orphan {
    pub project_hash: String,
    pub name: String,
    pub branch: String,
    pub path: PathBuf,
    pub reason: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default)]
pub struct GcOptions {
    pub stale_after_hours: Option<f64>,
    pub delete_branches: bool,
}

/// Scan the whole crew area for orphaned worktree registrations.
pub fn find_orphans(options: &GcOptions) -> Result<Vec<Orphan>> {
    let root = paths::crew_root()?;
    if !root.exists() {
        return Ok(Vec::new());
    }
    let threshold = options.stale_after_hours.unwrap_or(DEFAULT_STALE_AFTER_HOURS);
    let now = Utc::now();

    let mut orphans = Vec::new();
    for entry in std::fs::read_dir(&root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let hash = entry.file_name().to_string_lossy().into_owned();
        let registry = match WorktreeRegistry::load(&hash) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(hash = %hash, error = %e, "skipping unreadable registry");
                continue;
            }
        };

        let states: Vec<TeamState> = TeamState::list_profiles(&hash)
            .unwrap_or_default()
            .iter()
            .filter_map(|p| TeamState::load(&hash, p).ok().flatten())
            .collect();

        for wt in &registry.worktrees {
            if let Some(reason) = orphan_reason(wt.path.as_path(), &wt.name, &states, threshold, now)
            {
                orphans.push(Orphan {
                    project_hash: hash.clone(),
                    name: wt.name.clone(),
                    branch: wt.branch.clone(),
                    path: wt.path.clone(),
                    reason,
                    size_bytes: dir_size(&wt.path),
                });
            }
        }
    }
    Ok(orphans)
}

fn orphan_reason(
    path: &Path,
    name: &str,
    states: &[TeamState],
    threshold_hours: f64,
    now: chrono::DateTime<Utc>,
) -> Option<String> {
    if !path.exists() {
        return Some("directory no longer exists".to_string());
    }

    let teammate = states.iter().find_map(|s| s.teammates.get(name).map(|t| (s, t)));
    match teammate {
        Some((team, tm)) => {
            if team.status == TeamStatus::Stopped {
                return Some(format!("team '{}' is stopped", team.team_name));
            }
            if tm.status == TeammateStatus::Stopped {
                return Some("teammate is stopped".to_string());
            }
            let hours = tm
                .last_active
                .map(|t| (now - t).num_seconds() as f64 / 3600.0);
            match hours {
                Some(h) if h > threshold_hours => {
                    Some(format!("inactive for {h:.1}h (threshold {threshold_hours:.1}h)"))
                }
                Some(_) => None,
                None => {
                    // Never active: age by team start instead.
                    let h = (now - team.started_at).num_seconds() as f64 / 3600.0;
                    (h > threshold_hours)
                        .then(|| format!("never active, started {h:.1}h ago"))
                }
            }
        }
        None => Some("no teammate record in any team state".to_string()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReclaimReport {
    pub removed: Vec<Orphan>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Remove orphaned worktrees and their registry entries.
pub fn reclaim(orphans: &[Orphan], options: &GcOptions) -> Result<ReclaimReport> {
    let mut report = ReclaimReport {
        removed: Vec::new(),
        failed: Vec::new(),
    };

    for orphan in orphans {
        let project_root = infer_project_root(&orphan.path);
        let repo = project_root.as_deref().unwrap_or(orphan.path.as_path());

        match worktree::remove_path(repo, &orphan.path) {
            Ok(()) => {
                if options.delete_branches {
                    if let Some(root) = project_root.as_deref() {
                        let (ok, _, stderr) =
                            git::run_status(root, &["branch", "-D", &orphan.branch])?;
                        if !ok {
                            tracing::debug!(branch = %orphan.branch, error = %stderr.trim(), "branch delete failed");
                        }
                    }
                }
                let mut registry = WorktreeRegistry::load(&orphan.project_hash)?;
                registry.remove(&orphan.name);
                registry.save(&orphan.project_hash)?;
                report.removed.push(orphan.clone());
            }
            Err(e) => report.failed.push((orphan.path.clone(), e.to_string())),
        }
    }
    Ok(report)
}

/// Recover the main project root from a worktree path.
///
/// Worktree paths are `<root>[-<profile>]-<sanitized-branch>`; strip suffix
/// segments until a directory with a real (non-worktree) `.git` directory
/// appears, then fall back to walking up from the worktree.
pub fn infer_project_root(wt_path: &Path) -> Option<PathBuf> {
    let name = wt_path.file_name()?.to_string_lossy().into_owned();
    let parent = wt_path.parent()?;

    let mut candidate = name.as_str();
    while let Some(idx) = candidate.rfind('-') {
        candidate = &candidate[..idx];
        let root = parent.join(candidate);
        if root.join(".git").is_dir() {
            return Some(root);
        }
    }

    let mut dir = wt_path.parent()?.to_path_buf();
    loop {
        if dir.join(".git").is_dir() {
            return Some(dir);
        }
        match dir.parent() {
            Some(p) => dir = p.to_path_buf(),
            None => return None,
        }
    }
}

fn dir_size(path: &Path) -> u64 {
    let mut total = 0;
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    for entry in entries.flatten() {
        let Ok(meta) = entry.metadata() else { continue };
        if meta.is_dir() {
            total += dir_size(&entry.path());
        } else {
            total += meta.len();
        }
    }
    total
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResolvedProfile, ResolvedTeammate};
    use crate::git::testutil::init_repo;
    use crate::team;
    use crate::testenv::isolated_home;
    use crate::worktree::provision;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn teammate(name: &str, branch: &str) -> ResolvedTeammate {
        ResolvedTeammate {
            name: name.to_string(),
            branch: branch.to_string(),
            worktree: true,
            crew: "default".to_string(),
            role: None,
            model: "sonnet".to_string(),
            mode: "default".to_string(),
            subagent_type: "general-purpose".to_string(),
            focus: String::new(),
        }
    }

    fn start_profile(root: &Path, hash: &str) -> PathBuf {
        let tm = teammate("alice", "feat/a");
        let outcome = provision(root, hash, "dev", "core", &tm, "main").unwrap();
        let resolved = ResolvedProfile {
            profile_name: "dev".to_string(),
            team_name: "core".to_string(),
            teammates: vec![tm],
        };
        let mut wts = BTreeMap::new();
        wts.insert("alice".to_string(), outcome.path.clone());
        let state = team::next_state(None, &resolved, "cafe01234567", false, &wts);
        state.save(hash).unwrap();
        outcome.path
    }

    #[test]
    fn stopped_team_worktrees_are_orphans_and_reclaimable() {
        let _home = isolated_home();
        let container = TempDir::new().unwrap();
        let root = container.path().join("app");
        std::fs::create_dir_all(&root).unwrap();
        init_repo(&root);

        let hash = "feedbeef0001";
        let wt = start_profile(&root, hash);

        // Active team, recent start: nothing to collect yet (started_at is
        // fresh so the never-active branch stays).
        let orphans = find_orphans(&GcOptions::default()).unwrap();
        assert!(orphans.is_empty(), "fresh team must not be collected: {orphans:?}");

        let mut state = TeamState::load(hash, "dev").unwrap().unwrap();
        state.mark_stopped();
        state.save(hash).unwrap();

        let orphans = find_orphans(&GcOptions::default()).unwrap();
        assert_eq!(orphans.len(), 1);
        assert!(orphans[0].reason.contains("stopped"));
        assert_eq!(orphans[0].path, wt);

        let report = reclaim(&orphans, &GcOptions::default()).unwrap();
        assert_eq!(report.removed.len(), 1);
        assert!(report.failed.is_empty());
        assert!(!wt.exists());
        assert!(WorktreeRegistry::load(hash).unwrap().worktrees.is_empty());

        // A second scan is clean.
        assert!(find_orphans(&GcOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_an_orphan() {
        let _home = isolated_home();
        let mut registry = WorktreeRegistry::default();
        registry.upsert(crate::worktree::WorktreeEntry {
            name: "ghost".to_string(),
            branch: "feat/g".to_string(),
            path: PathBuf::from("/nonexistent/app-feat--g"),
            created_at: Utc::now(),
        });
        registry.save("feedbeef0002").unwrap();

        let orphans = find_orphans(&GcOptions::default()).unwrap();
        assert_eq!(orphans.len(), 1);
        assert!(orphans[0].reason.contains("no longer exists"));
    }

    #[test]
    fn infer_root_strips_deterministic_suffix() {
        let container = TempDir::new().unwrap();
        let root = container.path().join("app");
        std::fs::create_dir_all(&root).unwrap();
        init_repo(&root);

        let wt = container.path().join("app-dev-feat--a");
        assert_eq!(infer_project_root(&wt), Some(root.clone()));

        let wt = container.path().join("app-feat--a");
        assert_eq!(infer_project_root(&wt), Some(root));
    }
}
