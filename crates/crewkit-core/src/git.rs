//! Child-process git helpers.
//!
//! Every call shells out to `git -C <repo>`; nothing links libgit2. Callers
//! that can tolerate a missing repo use the `Option`-returning variants.

use crate::error::{CrewkitError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn run(repo: &Path, args: &[&str]) -> Result<Output> {
    Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .map_err(|e| CrewkitError::Git(format!("failed to run git {}: {e}", args.join(" "))))
}

/// Run git and return trimmed stdout, mapping a non-zero exit to an error.
pub fn run_checked(repo: &Path, args: &[&str]) -> Result<String> {
    let output = run(repo, args)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CrewkitError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run git where a non-zero exit is a valid answer. Returns
/// `(exit_success, stdout, stderr)`.
pub fn run_status(repo: &Path, args: &[&str]) -> Result<(bool, String, String)> {
    let output = run(repo, args)?;
    Ok((
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    ))
}

pub fn is_repo(dir: &Path) -> bool {
    run(dir, &["rev-parse", "--git-dir"])
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub fn repo_root(dir: &Path) -> Option<PathBuf> {
    let out = run(dir, &["rev-parse", "--show-toplevel"]).ok()?;
    if !out.status.success() {
        return None;
    }
    let root = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if root.is_empty() {
        None
    } else {
        Some(PathBuf::from(root))
    }
}

/// The `origin` remote URL, if configured.
pub fn origin_url(repo: &Path) -> Option<String> {
    let out = run(repo, &["remote", "get-url", "origin"]).ok()?;
    if !out.status.success() {
        return None;
    }
    let url = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if url.is_empty() {
        None
    } else {
        Some(url)
    }
}

/// Current branch name; `None` on detached HEAD or outside a repo.
pub fn current_branch(repo: &Path) -> Option<String> {
    let out = run(repo, &["branch", "--show-current"]).ok()?;
    if !out.status.success() {
        return None;
    }
    let branch = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if branch.is_empty() {
        None
    } else {
        Some(branch)
    }
}

pub fn branch_exists(repo: &Path, branch: &str) -> bool {
    run(repo, &["rev-parse", "--verify", "--quiet", &format!("refs/heads/{branch}")])
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub fn remote_branch_exists(repo: &Path, branch: &str) -> bool {
    run(
        repo,
        &["rev-parse", "--verify", "--quiet", &format!("refs/remotes/origin/{branch}")],
    )
    .map(|o| o.status.success())
    .unwrap_or(false)
}

/// Detect the main branch: `origin/HEAD` symbolic ref, else `main`, else
/// `master`, else just "main".
pub fn detect_main_branch(repo: &Path) -> String {
    if let Ok(out) = run(repo, &["symbolic-ref", "refs/remotes/origin/HEAD"]) {
        if out.status.success() {
            let full = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if let Some(name) = full.rsplit('/').next() {
                if !name.is_empty() {
                    return name.to_string();
                }
            }
        }
    }
    for candidate in ["main", "master"] {
        if branch_exists(repo, candidate) {
            return candidate.to_string();
        }
    }
    "main".to_string()
}

/// Number of commits reachable from `upper` but not `lower`.
pub fn commits_between(repo: &Path, lower: &str, upper: &str) -> Option<u64> {
    let out = run(repo, &["rev-list", "--count", &format!("{lower}..{upper}")]).ok()?;
    if !out.status.success() {
        return None;
    }
    String::from_utf8_lossy(&out.stdout).trim().parse().ok()
}

/// Commits made in `repo` within the last `hours`.
pub fn commits_since_hours(repo: &Path, hours: f64) -> Option<u64> {
    let since = format!("{} hours ago", hours.max(0.0));
    let out = run(repo, &["rev-list", "--count", "--since", &since, "HEAD"]).ok()?;
    if !out.status.success() {
        return None;
    }
    String::from_utf8_lossy(&out.stdout).trim().parse().ok()
}

/// Registered worktree paths for the repository, porcelain-parsed.
pub fn worktree_paths(repo: &Path) -> Result<Vec<PathBuf>> {
    let stdout = run_checked(repo, &["worktree", "list", "--porcelain"])?;
    Ok(stdout
        .lines()
        .filter_map(|line| line.strip_prefix("worktree "))
        .map(|p| PathBuf::from(p.trim()))
        .collect())
}

pub fn is_registered_worktree(repo: &Path, path: &Path) -> Result<bool> {
    let registered = worktree_paths(repo)?;
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    Ok(registered
        .iter()
        .any(|p| p == path || p == &canonical || p.canonicalize().map(|c| c == canonical).unwrap_or(false)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
