//! Worktree provisioning and teardown.
//!
//! Each teammate gets a sibling checkout of the project at a deterministic
//! path, with a hybrid state directory: shared tooling is symlinked from the
//! main project's state dir, session-local state stays inside the worktree.
//!
//! Teardown contract: symlinks inside the worktree state dir are unlinked
//! before anything recursive touches the directory, so removal can never
//! traverse into the main project's shared state.

use crate::config::ResolvedTeammate;
use crate::error::{CrewkitError, Result};
use crate::identity::CrewIdentity;
use crate::{git, io, paths};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Warn when a resumed branch trails the main branch by more than this.
const BEHIND_MAIN_WARN_THRESHOLD: u64 = 100;

// ---------------------------------------------------------------------------
// Branch sanitization and path mapping
// ---------------------------------------------------------------------------

/// Make a branch name filesystem-safe: `/` becomes `--`, anything outside
/// `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_branch(branch: &str) -> String {
    branch
        .replace('/', "--")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Deterministic worktree location for a (profile, branch) pair:
/// `<root>-<branch>` for the default profile, `<root>-<profile>-<branch>`
/// for named profiles.
pub fn resolve_worktree_path(project_root: &Path, profile: &str, branch: &str) -> PathBuf {
    let root = project_root.as_os_str().to_string_lossy();
    let branch = sanitize_branch(branch);
    if profile == crate::config::DEFAULT_PROFILE {
        PathBuf::from(format!("{root}-{branch}"))
    } else {
        PathBuf::from(format!("{root}-{profile}-{branch}"))
    }
}

// ---------------------------------------------------------------------------
// WorktreeRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorktreeEntry {
    pub name: String,
    pub branch: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Authoritative per-project list of active worktrees, used for crew
/// identity disambiguation and GC.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorktreeRegistry {
    #[serde(default)]
    pub worktrees: Vec<WorktreeEntry>,
}

impl WorktreeRegistry {
    pub fn load(project_hash: &str) -> Result<Self> {
        let path = paths::registry_path(project_hash)?;
        if !path.exists() {
            return Ok(Self::default());
        }
        io::read_json(&path)
    }

    pub fn save(&self, project_hash: &str) -> Result<()> {
        io::write_json(&paths::registry_path(project_hash)?, self)
    }

    pub fn upsert(&mut self, entry: WorktreeEntry) {
        self.worktrees.retain(|w| w.name != entry.name);
        self.worktrees.push(entry);
    }

    pub fn remove(&mut self, name: &str) {
        self.worktrees.retain(|w| w.name != name);
    }

    pub fn find(&self, name: &str) -> Option<&WorktreeEntry> {
        self.worktrees.iter().find(|w| w.name == name)
    }
}

// ---------------------------------------------------------------------------
// Provisioning
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ProvisionOutcome {
    pub path: PathBuf,
    pub created: bool,
    pub warnings: Vec<String>,
}

/// Create (or adopt) the worktree for a teammate.
///
/// Branch resolution: existing local branch is checked out; a branch on
/// `origin` gets a tracking branch; otherwise a new branch forks from the
/// main branch. Existing directories are only accepted when git already
/// knows them as worktrees.
pub fn provision(
    project_root: &Path,
    project_hash: &str,
    profile: &str,
    team_name: &str,
    teammate: &ResolvedTeammate,
    main_branch: &str,
) -> Result<ProvisionOutcome> {
    let wt_path = resolve_worktree_path(project_root, profile, &teammate.branch);
    let mut warnings = Vec::new();

    let created = if wt_path.exists() {
        if !git::is_registered_worktree(project_root, &wt_path)? {
            return Err(CrewkitError::UnregisteredWorktreeDir(
                wt_path.display().to_string(),
            ));
        }
        false
    } else {
        add_worktree(project_root, &wt_path, &teammate.branch, main_branch, &mut warnings)?;
        true
    };

    build_state_dir(project_root, &wt_path)?;

    CrewIdentity {
        teammate_name: teammate.name.clone(),
        project_root: project_root.to_path_buf(),
        branch: teammate.branch.clone(),
        team_name: team_name.to_string(),
        profile_name: profile.to_string(),
        created_at: Utc::now(),
    }
    .save(&wt_path)?;

    let mut registry = WorktreeRegistry::load(project_hash)?;
    registry.upsert(WorktreeEntry {
        name: teammate.name.clone(),
        branch: teammate.branch.clone(),
        path: wt_path.clone(),
        created_at: Utc::now(),
    });
    registry.save(project_hash)?;

    Ok(ProvisionOutcome {
        path: wt_path,
        created,
        warnings,
    })
}

fn add_worktree(
    repo: &Path,
    wt_path: &Path,
    branch: &str,
    main_branch: &str,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let wt = wt_path.to_string_lossy();
    if git::branch_exists(repo, branch) {
        git::run_checked(repo, &["worktree", "add", &wt, branch])?;
        if let Some(behind) = git::commits_between(repo, branch, main_branch) {
            if behind > BEHIND_MAIN_WARN_THRESHOLD {
                warnings.push(format!(
                    "branch '{branch}' is {behind} commits behind '{main_branch}'"
                ));
            }
        }
    } else if git::remote_branch_exists(repo, branch) {
        git::run_checked(
            repo,
            &["worktree", "add", "--track", "-b", branch, &wt, &format!("origin/{branch}")],
        )?;
    } else {
        git::run_checked(repo, &["worktree", "add", "-b", branch, &wt, main_branch])?;
    }
    Ok(())
}

/// Build the hybrid state directory: a real `.crewkit/` in the worktree,
/// with symlinks into the main project's shared tooling subtree.
fn build_state_dir(project_root: &Path, wt_path: &Path) -> Result<()> {
    let source = paths::state_dir(project_root);
    let target = paths::state_dir(wt_path);
    io::ensure_dir(&target)?;

    for name in paths::SHARED_STATE_DIRS {
        let src = source.join(name);
        if src.is_dir() {
            link_into(&src, &target.join(name))?;
        }
    }
    for name in paths::SHARED_STATE_FILES {
        let src = source.join(name);
        if src.is_file() {
            link_into(&src, &target.join(name))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn link_into(src: &Path, dst: &Path) -> Result<()> {
    match std::fs::symlink_metadata(dst) {
        Ok(meta) if meta.file_type().is_symlink() => {
            std::fs::remove_file(dst)?;
        }
        Ok(_) => return Ok(()), // a real file/dir shadows the link; leave it
        Err(_) => {}
    }
    std::os::unix::fs::symlink(src, dst)?;
    Ok(())
}

#[cfg(not(unix))]
fn link_into(_src: &Path, _dst: &Path) -> Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

/// Remove a worktree and its registry entry.
///
/// Symlinks in the state dir are unlinked first, unconditionally: a
/// recursive delete that followed them into the main project's shared
/// state would be the worst failure this system can produce.
pub fn remove(project_root: &Path, project_hash: &str, name: &str) -> Result<()> {
    let mut registry = WorktreeRegistry::load(project_hash)?;
    let Some(entry) = registry.find(name).cloned() else {
        return Ok(());
    };

    remove_path(project_root, &entry.path)?;

    registry.remove(name);
    registry.save(project_hash)?;
    Ok(())
}

/// Remove a worktree directory that may or may not still be registered.
pub fn remove_path(project_root: &Path, wt_path: &Path) -> Result<()> {
    if wt_path.exists() {
        unlink_state_dir(wt_path)?;
        let wt = wt_path.to_string_lossy();
        let (ok, _, stderr) =
            git::run_status(project_root, &["worktree", "remove", "--force", &wt])?;
        if !ok {
            tracing::debug!(worktree = %wt, error = %stderr.trim(), "git worktree remove failed; removing directly");
            std::fs::remove_dir_all(wt_path)?;
            let _ = git::run_status(project_root, &["worktree", "prune"]);
        }
    } else {
        let _ = git::run_status(project_root, &["worktree", "prune"]);
    }
    Ok(())
}

fn unlink_state_dir(wt_path: &Path) -> Result<()> {
    let state = paths::state_dir(wt_path);
    if !state.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(&state)? {
        let entry = entry?;
        let meta = std::fs::symlink_metadata(entry.path())?;
        if meta.file_type().is_symlink() {
            std::fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
