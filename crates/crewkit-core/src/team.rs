//! Persistent per-profile team state.
//!
//! One JSON snapshot per (project, profile) under the global crew area.
//! `config_hash` gates resumption: a changed config invalidates the saved
//! agent ids. The flat pre-profile layout is migrated into `default/` the
//! first time it is read.

use crate::config::ResolvedProfile;
use crate::error::Result;
use crate::types::{TeamStatus, TeammateStatus};
use crate::{io, paths};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeammateState {
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<PathBuf>,
    pub status: TeammateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamState {
    pub team_name: String,
    pub profile_name: String,
    pub config_hash: String,
    pub status: TeamStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub teammates: BTreeMap<String, TeammateState>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub spawn_prompts: BTreeMap<String, String>,
}

impl TeamState {
    pub fn new(team_name: &str, profile_name: &str, config_hash: &str) -> Self {
        let now = Utc::now();
        Self {
            team_name: team_name.to_string(),
            profile_name: profile_name.to_string(),
            config_hash: config_hash.to_string(),
            status: TeamStatus::Active,
            started_at: now,
            updated_at: now,
            teammates: BTreeMap::new(),
            spawn_prompts: BTreeMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Load the state for a profile, migrating a legacy flat file into
    /// `default/team-state.json` when found.
    pub fn load(project_hash: &str, profile: &str) -> Result<Option<Self>> {
        migrate_legacy(project_hash)?;
        let path = paths::team_state_path(project_hash, profile)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(io::read_json(&path)?))
    }

    pub fn save(&self, project_hash: &str) -> Result<()> {
        let path = paths::team_state_path(project_hash, &self.profile_name)?;
        io::write_json(&path, self)
    }

    /// Profiles that currently have saved state for a project.
    pub fn list_profiles(project_hash: &str) -> Result<Vec<String>> {
        migrate_legacy(project_hash)?;
        let dir = paths::project_crew_dir(project_hash)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() && entry.path().join(paths::TEAM_STATE_FILE).exists() {
                out.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        out.sort();
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn mark_stopped(&mut self) {
        self.status = TeamStatus::Stopped;
        for tm in self.teammates.values_mut() {
            tm.status = TeammateStatus::Stopped;
        }
        self.touch();
    }

    /// Record activity from a teammate (session-end hook).
    pub fn teammate_seen(&mut self, name: &str, status: TeammateStatus) {
        if let Some(tm) = self.teammates.get_mut(name) {
            tm.status = status;
            tm.last_active = Some(Utc::now());
            self.touch();
        }
    }

    /// Hours since any teammate was last active; `None` when nothing has
    /// ever reported in.
    pub fn hours_since_activity(&self, now: DateTime<Utc>) -> Option<f64> {
        self.teammates
            .values()
            .filter_map(|tm| tm.last_active)
            .max()
            .map(|latest| (now - latest).num_seconds() as f64 / 3600.0)
    }

    /// Whether the saved state can be resumed against `config_hash` within
    /// the staleness window.
    pub fn resumable(&self, config_hash: &str, stale_after_hours: f64, now: DateTime<Utc>) -> bool {
        if self.config_hash != config_hash {
            return false;
        }
        match self.hours_since_activity(now) {
            Some(hours) => hours <= stale_after_hours,
            None => false,
        }
    }
}

/// Build the fresh-or-resumed state for a `start`, carrying `agent_id` and
/// `last_active` forward for teammates that survive a resume.
pub fn next_state(
    previous: Option<&TeamState>,
    resolved: &ResolvedProfile,
    config_hash: &str,
    resume: bool,
    worktree_paths: &BTreeMap<String, PathBuf>,
) -> TeamState {
    let mut state = TeamState::new(&resolved.team_name, &resolved.profile_name, config_hash);
    for tm in &resolved.teammates {
        let carried = if resume {
            previous.and_then(|p| p.teammates.get(&tm.name))
        } else {
            None
        };
        state.teammates.insert(
            tm.name.clone(),
            TeammateState {
                branch: tm.branch.clone(),
                worktree_path: worktree_paths.get(&tm.name).cloned(),
                status: carried.map(|c| c.status).unwrap_or(TeammateStatus::Pending),
                agent_id: carried.and_then(|c| c.agent_id.clone()),
                last_active: carried.and_then(|c| c.last_active),
            },
        );
    }
    state
}

fn migrate_legacy(project_hash: &str) -> Result<()> {
    let legacy = paths::legacy_team_state_path(project_hash)?;
    if !legacy.is_file() {
        return Ok(());
    }
    let target = paths::team_state_path(project_hash, crate::config::DEFAULT_PROFILE)?;
    if target.exists() {
        // Both exist; the profile layout wins and the flat file is retired.
        std::fs::remove_file(&legacy)?;
        return Ok(());
    }
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(&legacy, &target)?;
    tracing::debug!(hash = project_hash, "migrated legacy team state into default/");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
