//! Merge pilot: preview teammate branches against main, then optionally
//! merge them.
//!
//! Preview never mutates the working tree — conflict detection goes through
//! `git merge-tree`. Execution is the only path that checks branches out,
//! and it always tags a backup of main first. Conflict resolution stays with
//! the user.

use crate::error::Result;
use crate::git;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchMergeStatus {
    Clean,
    Conflict,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchPreview {
    pub teammate: String,
    pub branch: String,
    pub status: BranchMergeStatus,
    pub changed_files: Vec<String>,
    pub conflict_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Dry-run every teammate branch against `main_branch`.
pub fn preview(
    repo: &Path,
    main_branch: &str,
    branches: &[(String, String)], // (teammate, branch)
) -> Vec<BranchPreview> {
    branches
        .iter()
        .filter(|(_, branch)| branch.as_str() != main_branch)
        .map(|(teammate, branch)| preview_branch(repo, main_branch, teammate, branch))
        .collect()
}

fn preview_branch(repo: &Path, main: &str, teammate: &str, branch: &str) -> BranchPreview {
    if !git::branch_exists(repo, branch) {
        return BranchPreview {
            teammate: teammate.to_string(),
            branch: branch.to_string(),
            status: BranchMergeStatus::Error,
            changed_files: Vec::new(),
            conflict_files: Vec::new(),
            message: Some(format!("branch '{branch}' does not exist")),
        };
    }

    let changed_files = changed_files(repo, main, branch).unwrap_or_default();

    match detect_conflicts(repo, main, branch) {
        Ok(None) => BranchPreview {
            teammate: teammate.to_string(),
            branch: branch.to_string(),
            status: BranchMergeStatus::Clean,
            changed_files,
            conflict_files: Vec::new(),
            message: None,
        },
        Ok(Some(conflicts)) => {
            // Inconclusive parse with conflicts indicated: fall back to the
            // whole changed set rather than understating the blast radius.
            let conflict_files = if conflicts.is_empty() {
                changed_files.clone()
            } else {
                conflicts
            };
            BranchPreview {
                teammate: teammate.to_string(),
                branch: branch.to_string(),
                status: BranchMergeStatus::Conflict,
                changed_files,
                conflict_files,
                message: None,
            }
        }
        Err(e) => BranchPreview {
            teammate: teammate.to_string(),
            branch: branch.to_string(),
            status: BranchMergeStatus::Error,
            changed_files,
            conflict_files: Vec::new(),
            message: Some(e.to_string()),
        },
    }
}

fn changed_files(repo: &Path, main: &str, branch: &str) -> Result<Vec<String>> {
    let out = git::run_checked(repo, &["diff", "--name-only", &format!("{main}...{branch}")])?;
    Ok(out.lines().map(str::to_string).filter(|l| !l.is_empty()).collect())
}

/// `Ok(None)` means clean; `Ok(Some(files))` means conflicts, possibly with
/// an empty (unparsed) file list.
fn detect_conflicts(repo: &Path, main: &str, branch: &str) -> Result<Option<Vec<String>>> {
    let (ok, stdout, stderr) =
        git::run_status(repo, &["merge-tree", "--write-tree", "--name-only", main, branch])?;
    if ok {
        return Ok(None);
    }
    // Unknown-option means an older git without --write-tree; fall back to
    // the ancestor-based form. Any other failure is exit code 1: conflicts.
    if stderr.contains("usage:") || stderr.contains("unknown option") {
        return detect_conflicts_ancestor(repo, main, branch);
    }
    // Output shape: tree oid, conflicted file names, blank line, then
    // informational messages. Only the middle section is file names.
    let files: Vec<String> = stdout
        .lines()
        .skip(1)
        .take_while(|l| !l.trim().is_empty())
        .map(|l| l.trim().to_string())
        .collect();
    Ok(Some(files))
}

fn detect_conflicts_ancestor(repo: &Path, main: &str, branch: &str) -> Result<Option<Vec<String>>> {
    let base = git::run_checked(repo, &["merge-base", main, branch])?;
    let (_, stdout, _) = git::run_status(repo, &["merge-tree", &base, main, branch])?;
    if !stdout.contains("<<<<<<<") && !stdout.contains("changed in both") {
        return Ok(None);
    }
    // The legacy output interleaves diffs; file names are not reliably
    // recoverable, so report conflicts with an empty list and let the
    // caller widen to the changed set.
    Ok(Some(Vec::new()))
}

// ---------------------------------------------------------------------------
// Overlap detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Overlap {
    pub teammates: (String, String),
    pub files: Vec<String>,
}

/// Files touched by more than one teammate — contention surfaced before
/// any merge begins.
pub fn detect_overlaps(previews: &[BranchPreview]) -> Vec<Overlap> {
    let mut out = Vec::new();
    for (i, a) in previews.iter().enumerate() {
        let a_files: BTreeSet<&String> = a.changed_files.iter().collect();
        for b in &previews[i + 1..] {
            let shared: Vec<String> = b
                .changed_files
                .iter()
                .filter(|f| a_files.contains(f))
                .cloned()
                .collect();
            if !shared.is_empty() {
                out.push(Overlap {
                    teammates: (a.teammate.clone(), b.teammate.clone()),
                    files: shared,
                });
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub create_backup: bool,
    pub test_command: Option<String>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            create_backup: true,
            test_command: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReport {
    pub success: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub skipped: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_tag: Option<String>,
}

/// Merge teammate branches into `main_branch`, clean branches first.
///
/// A failed merge is aborted and recorded; a merge whose post-merge test
/// fails is rolled back with a hard reset to the pre-merge commit.
pub fn execute(
    repo: &Path,
    main_branch: &str,
    branches: &[(String, String)],
    options: &MergeOptions,
) -> Result<MergeReport> {
    let previews = preview(repo, main_branch, branches);

    let mut report = MergeReport {
        success: Vec::new(),
        failed: Vec::new(),
        skipped: Vec::new(),
        backup_tag: None,
    };

    if options.create_backup {
        let tag = format!("crew-backup-{}", Utc::now().format("%Y%m%dT%H%M%SZ"));
        git::run_checked(repo, &["tag", &tag, main_branch])?;
        report.backup_tag = Some(tag);
    }

    git::run_checked(repo, &["checkout", main_branch])?;

    // Clean first so a conflicting branch cannot poison easy wins.
    let ordered = previews
        .iter()
        .filter(|p| p.status == BranchMergeStatus::Clean)
        .chain(previews.iter().filter(|p| p.status == BranchMergeStatus::Conflict));

    for p in previews.iter().filter(|p| p.status == BranchMergeStatus::Error) {
        report.skipped.push((
            p.branch.clone(),
            p.message.clone().unwrap_or_else(|| "unknown error".to_string()),
        ));
    }

    for p in ordered {
        let before = git::run_checked(repo, &["rev-parse", "HEAD"])?;
        let (ok, _, stderr) = git::run_status(repo, &["merge", "--no-edit", &p.branch])?;
        if !ok {
            let _ = git::run_status(repo, &["merge", "--abort"]);
            report.failed.push((p.branch.clone(), stderr.trim().to_string()));
            continue;
        }

        if let Some(cmd) = &options.test_command {
            if !run_test_command(repo, cmd) {
                git::run_checked(repo, &["reset", "--hard", &before])?;
                report
                    .failed
                    .push((p.branch.clone(), format!("tests failed after merge: {cmd}")));
                continue;
            }
        }

        report.success.push(p.branch.clone());
    }

    Ok(report)
}

fn run_test_command(repo: &Path, cmd: &str) -> bool {
    std::process::Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .current_dir(repo)
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
