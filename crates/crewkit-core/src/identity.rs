//! Project and crew identity resolution.
//!
//! The project hash tenants the global record store; the crew identity, when
//! present, re-scopes namespaces to one teammate. Crew identity is discovered
//! from uncoordinated hints, so resolution is an ordered strategy list where
//! the first hit wins.

use crate::error::Result;
use crate::worktree::WorktreeRegistry;
use crate::{git, paths};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Project hash
// ---------------------------------------------------------------------------

/// Stable 12-hex-char project identity: sha256 over the origin remote URL
/// when one exists, else over the absolute project path. The remote form
/// keeps the hash stable across clones of the same repository.
pub fn project_hash(root: &Path) -> String {
    let seed = match git::origin_url(root) {
        Some(url) => url,
        None => root
            .canonicalize()
            .unwrap_or_else(|_| root.to_path_buf())
            .to_string_lossy()
            .into_owned(),
    };
    short_sha256(&seed)
}

pub(crate) fn short_sha256(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..12].to_string()
}

// ---------------------------------------------------------------------------
// CrewIdentity
// ---------------------------------------------------------------------------

/// Written to `crew-identity.json` at a worktree root during provisioning;
/// never symlinked, always local to the worktree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewIdentity {
    pub teammate_name: String,
    pub project_root: PathBuf,
    pub branch: String,
    pub team_name: String,
    pub profile_name: String,
    pub created_at: DateTime<Utc>,
}

impl CrewIdentity {
    pub fn load(worktree_root: &Path) -> Option<Self> {
        let path = paths::identity_path(worktree_root);
        crate::io::read_json(&path).ok()
    }

    pub fn save(&self, worktree_root: &Path) -> Result<()> {
        crate::io::write_json(&paths::identity_path(worktree_root), self)
    }
}

/// Resolve the active crew identity, trying in order:
///
/// 1. identity file at the CWD or under `<CWD>/.crewkit/`;
/// 2. the `CREWKIT_WORKTREE` env hint, looking for the identity file there;
/// 3. the project worktree registry — matched by `file_hint` prefix when one
///    is given, or taken outright when exactly one worktree is registered.
///
/// Ambiguity resolves to `None` (solo namespaces), never to a guess. The
/// `file_hint` matters because teammates often execute from a parent
/// directory while touching absolute paths inside their worktree.
pub fn resolve_crew_identity(cwd: &Path, file_hint: Option<&Path>) -> Option<CrewIdentity> {
    if let Some(id) = CrewIdentity::load(cwd) {
        return Some(id);
    }
    if let Some(id) = CrewIdentity::load(&paths::state_dir(cwd)) {
        return Some(id);
    }

    if let Ok(hint) = std::env::var(paths::WORKTREE_ENV) {
        if !hint.trim().is_empty() {
            if let Some(id) = CrewIdentity::load(Path::new(hint.trim())) {
                return Some(id);
            }
        }
    }

    let hash = project_hash(cwd);
    let registry = WorktreeRegistry::load(&hash).ok()?;
    if registry.worktrees.is_empty() {
        return None;
    }

    if let Some(hint) = file_hint {
        for entry in &registry.worktrees {
            if hint.starts_with(&entry.path) {
                return CrewIdentity::load(&entry.path);
            }
        }
    }

    if registry.worktrees.len() == 1 {
        return CrewIdentity::load(&registry.worktrees[0].path);
    }

    None
}

// ---------------------------------------------------------------------------
// Disable marker
// ---------------------------------------------------------------------------

/// True when a disable marker exists anywhere from `cwd` up to the
/// filesystem root. Hooks early-exit cleanly when set.
pub fn hooks_disabled(cwd: &Path) -> bool {
    let mut dir = cwd.to_path_buf();
    loop {
        if dir.join(paths::DISABLE_MARKER).exists() {
            return true;
        }
        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => return false,
        }
    }
}

// ---------------------------------------------------------------------------
// Namespace scoping
// ---------------------------------------------------------------------------

/// The namespace root for the current invocation: `proj/<hash>` solo, or
/// `proj/<hash>/crew/<teammate>` when a crew identity is active.
pub fn namespace_root(hash: &str, crew: Option<&CrewIdentity>) -> String {
    match crew {
        Some(id) => format!("proj/{hash}/crew/{}", id.teammate_name.to_ascii_lowercase()),
        None => format!("proj/{hash}"),
    }
}

/// Where discoveries are read and written for this invocation.
pub fn discovery_namespaces(hash: &str, crew: Option<&CrewIdentity>) -> Vec<String> {
    let mut out = vec![format!("proj/{hash}/discoveries")];
    if crew.is_some() {
        out.push(format!("proj/{hash}/crew/_shared/discoveries"));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn hash_is_12_hex_and_stable() {
        let dir = TempDir::new().unwrap();
        let a = project_hash(dir.path());
        let b = project_hash(dir.path());
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_differs_per_path() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        assert_ne!(project_hash(a.path()), project_hash(b.path()));
    }

    #[test]
    fn identity_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let id = CrewIdentity {
            teammate_name: "alice".into(),
            project_root: PathBuf::from("/work/app"),
            branch: "feat/a".into(),
            team_name: "core".into(),
            profile_name: "dev".into(),
            created_at: Utc::now(),
        };
        id.save(dir.path()).unwrap();
        let back = CrewIdentity::load(dir.path()).unwrap();
        assert_eq!(back.teammate_name, "alice");
        assert_eq!(back.branch, "feat/a");
    }

    #[test]
    fn identity_found_under_state_dir() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join(paths::STATE_DIR);
        std::fs::create_dir_all(&state).unwrap();
        let id = CrewIdentity {
            teammate_name: "bob".into(),
            project_root: dir.path().to_path_buf(),
            branch: "feat/b".into(),
            team_name: "core".into(),
            profile_name: "default".into(),
            created_at: Utc::now(),
        };
        id.save(&state).unwrap();
        let resolved = resolve_crew_identity(dir.path(), None).unwrap();
        assert_eq!(resolved.teammate_name, "bob");
    }

    #[test]
    fn disable_marker_walks_up() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        assert!(!hooks_disabled(&nested));
        std::fs::write(dir.path().join(paths::DISABLE_MARKER), b"").unwrap();
        assert!(hooks_disabled(&nested));
    }

    #[test]
    fn namespace_scoping() {
        let id = CrewIdentity {
            teammate_name: "Alice".into(),
            project_root: PathBuf::from("/p"),
            branch: "b".into(),
            team_name: "t".into(),
            profile_name: "default".into(),
            created_at: Utc::now(),
        };
        assert_eq!(namespace_root("abc", None), "proj/abc");
        assert_eq!(namespace_root("abc", Some(&id)), "proj/abc/crew/alice");
        assert_eq!(
            discovery_namespaces("abc", Some(&id)),
            vec![
                "proj/abc/discoveries".to_string(),
                "proj/abc/crew/_shared/discoveries".to_string()
            ]
        );
    }
}
