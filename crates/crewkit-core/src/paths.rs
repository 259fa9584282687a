use crate::error::{CrewkitError, Result};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File and directory names
// ---------------------------------------------------------------------------

/// Per-project crew configuration, at the project root.
pub const CREW_CONFIG_FILE: &str = ".crew-config.json";

/// State directory inside the main project and inside each worktree.
pub const STATE_DIR: &str = ".crewkit";

/// Identity file written at a worktree root during provisioning.
pub const IDENTITY_FILE: &str = "crew-identity.json";

/// Marker file that disables all hook side effects when found anywhere
/// between the CWD and the filesystem root.
pub const DISABLE_MARKER: &str = ".crewkit-disable";

/// Canonical record-store filename under the global config dir.
pub const STORE_FILE: &str = "capsule.db";

/// Older installs used this filename; honored when the canonical file
/// is absent.
pub const LEGACY_STORE_FILE: &str = "context.db";

/// Per-project worktree registry filename.
pub const REGISTRY_FILE: &str = "worktrees.json";

/// Per-profile team state filename.
pub const TEAM_STATE_FILE: &str = "team-state.json";

/// Env var pointing hooks at the active worktree when the process CWD
/// is not inside it.
pub const WORKTREE_ENV: &str = "CREWKIT_WORKTREE";

/// Subdirectories of the main project's state dir that worktrees share
/// via symlink. Everything else in a worktree state dir stays local.
pub const SHARED_STATE_DIRS: &[&str] = &["agents", "skills", "commands"];

/// Files of the main project's state dir shared via symlink.
pub const SHARED_STATE_FILES: &[&str] = &["settings.json"];

// ---------------------------------------------------------------------------
// Global locations
// ---------------------------------------------------------------------------

/// `~/.config/crewkit` — the global state area shared by every project.
pub fn global_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(CrewkitError::HomeNotFound)?;
    Ok(home.join(".config").join("crewkit"))
}

/// Path of the global record store. The canonical filename wins; a
/// legacy-named database is used only when the canonical one is absent.
pub fn store_path() -> Result<PathBuf> {
    let dir = global_dir()?;
    let canonical = dir.join(STORE_FILE);
    if canonical.exists() {
        return Ok(canonical);
    }
    let legacy = dir.join(LEGACY_STORE_FILE);
    if legacy.exists() {
        return Ok(legacy);
    }
    Ok(canonical)
}

/// `~/.config/crewkit/crew` — root of all per-project crew state.
pub fn crew_root() -> Result<PathBuf> {
    Ok(global_dir()?.join("crew"))
}

/// Per-project crew state directory, keyed by project hash.
pub fn project_crew_dir(project_hash: &str) -> Result<PathBuf> {
    Ok(crew_root()?.join(project_hash))
}

/// Worktree registry for a project.
pub fn registry_path(project_hash: &str) -> Result<PathBuf> {
    Ok(project_crew_dir(project_hash)?.join(REGISTRY_FILE))
}

/// Team state for a profile of a project.
pub fn team_state_path(project_hash: &str, profile: &str) -> Result<PathBuf> {
    Ok(project_crew_dir(project_hash)?.join(profile).join(TEAM_STATE_FILE))
}

/// Pre-migration flat team state location (no profile subdirectory).
pub fn legacy_team_state_path(project_hash: &str) -> Result<PathBuf> {
    Ok(project_crew_dir(project_hash)?.join(TEAM_STATE_FILE))
}

/// Where the generated lead prompt for a profile is kept.
pub fn lead_prompt_path(project_hash: &str, profile: &str) -> Result<PathBuf> {
    Ok(project_crew_dir(project_hash)?.join(profile).join("lead-prompt.md"))
}

// ---------------------------------------------------------------------------
// Project-relative locations
// ---------------------------------------------------------------------------

pub fn crew_config_path(root: &Path) -> PathBuf {
    root.join(CREW_CONFIG_FILE)
}

pub fn state_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR)
}

pub fn identity_path(worktree_root: &Path) -> PathBuf {
    worktree_root.join(IDENTITY_FILE)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
