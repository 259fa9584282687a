//! Crew configuration: load, validate, resolve, hash.
//!
//! `.crew-config.json` admits two shapes — a single `team` or a named
//! `profiles` map. Loading is permissive (shape problems surface through
//! `validate`, not as parse errors), and the raw document is kept so the
//! config hash is computed over exactly what the user wrote, key order
//! included.

use crate::error::{CrewkitError, Result};
use crate::{identity, paths, roles};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;

static NAME_RE: OnceLock<Regex> = OnceLock::new();

/// Teammate names become namespace segments and registry keys, so they are
/// held to the same character set as sanitized branches.
fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("static regex"))
}

pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_STALE_AFTER_HOURS: f64 = 4.0;

// ---------------------------------------------------------------------------
// Declarative shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeammateSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default = "default_true")]
    pub worktree: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subagent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrewGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub teammates: Vec<TeammateSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub teammates: Vec<TeammateSpec>,
    #[serde(default)]
    pub crews: Vec<CrewGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_after_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSection {
    #[serde(default = "default_main_branch")]
    pub main_branch: String,
}

fn default_main_branch() -> String {
    "main".to_string()
}

// ---------------------------------------------------------------------------
// CrewConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CrewConfig {
    /// The document exactly as parsed; key order preserved for hashing.
    raw: Value,
    pub project: ProjectSection,
    pub stale_after_hours: Option<f64>,
    pub default_profile: Option<String>,
    /// Profiles in declaration order. A single-team config appears here as
    /// one profile named "default".
    profiles: Vec<(String, TeamConfig)>,
}

impl CrewConfig {
    pub fn exists(root: &Path) -> bool {
        paths::crew_config_path(root).exists()
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::crew_config_path(root);
        if !path.exists() {
            return Err(CrewkitError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(data)?;

        let project = raw
            .get("project")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();

        let stale_after_hours = raw.get("stale_after_hours").and_then(Value::as_f64);
        let default_profile = raw
            .get("default")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut profiles = Vec::new();
        if let Some(team) = raw.get("team") {
            let team: TeamConfig = serde_json::from_value(team.clone())?;
            profiles.push((DEFAULT_PROFILE.to_string(), team));
        }
        if let Some(Value::Object(map)) = raw.get("profiles") {
            for (name, value) in map {
                let team: TeamConfig = serde_json::from_value(value.clone())?;
                profiles.push((name.clone(), team));
            }
        }

        Ok(Self {
            raw,
            project,
            stale_after_hours,
            default_profile,
            profiles,
        })
    }

    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn profile(&self, name: &str) -> Option<&TeamConfig> {
        self.profiles
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, team)| team)
    }

    /// Staleness window in hours for a profile: per-profile setting, then
    /// top-level, then the 4-hour default.
    pub fn stale_after_hours_for(&self, profile: &str) -> f64 {
        self.profile(profile)
            .and_then(|t| t.stale_after_hours)
            .or(self.stale_after_hours)
            .unwrap_or(DEFAULT_STALE_AFTER_HOURS)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Human-readable problems; empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let has_team = self.raw.get("team").is_some();
        let has_profiles = self.raw.get("profiles").is_some();
        match (has_team, has_profiles) {
            (true, true) => {
                errors.push("config must have either 'team' or 'profiles', not both".to_string())
            }
            (false, false) => {
                errors.push("config must have a 'team' or a 'profiles' section".to_string())
            }
            _ => {}
        }

        if has_profiles && self.profiles.is_empty() {
            errors.push("'profiles' must not be empty".to_string());
        }

        if let Some(default) = &self.default_profile {
            if self.profile(default).is_none() {
                errors.push(format!("default profile '{default}' does not exist"));
            }
        }

        for (profile_name, team) in &self.profiles {
            if team.name.trim().is_empty() {
                errors.push(format!("profile '{profile_name}': team name must be a non-empty string"));
            }
            let teammates = flatten_team(team, None);
            if teammates.is_empty() {
                errors.push(format!("profile '{profile_name}': team has no teammates"));
            }
            let mut seen = std::collections::HashSet::new();
            for (i, tm) in teammates.iter().enumerate() {
                let label = if tm.spec.name.trim().is_empty() {
                    format!("teammate #{}", i + 1)
                } else {
                    format!("teammate '{}'", tm.spec.name)
                };
                if tm.spec.name.trim().is_empty() {
                    errors.push(format!("profile '{profile_name}': {label} is missing a name"));
                } else if !name_re().is_match(&tm.spec.name) {
                    errors.push(format!(
                        "profile '{profile_name}': {label} has an invalid name (allowed: letters, digits, '.', '_', '-')"
                    ));
                } else if !seen.insert(tm.spec.name.clone()) {
                    errors.push(format!(
                        "profile '{profile_name}': duplicate teammate name '{}'",
                        tm.spec.name
                    ));
                }
                if tm.spec.branch.trim().is_empty() {
                    errors.push(format!("profile '{profile_name}': {label} is missing a branch"));
                }
                if let Some(role) = &tm.spec.role {
                    if !roles::is_known(role) {
                        errors.push(format!(
                            "profile '{profile_name}': {label} has unknown role '{role}' (known: {})",
                            roles::known_names().join(", ")
                        ));
                    }
                }
            }
        }

        errors
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Pick a profile (explicit arg → config default → first declared) and
    /// flatten its crews into role-resolved teammates.
    pub fn resolve(&self, profile: Option<&str>, crew_filter: Option<&str>) -> Result<ResolvedProfile> {
        let name = match profile {
            Some(p) => p.to_string(),
            None => self
                .default_profile
                .clone()
                .or_else(|| self.profiles.first().map(|(n, _)| n.clone()))
                .ok_or_else(|| CrewkitError::UnknownProfile("<none>".to_string()))?,
        };
        let team = self
            .profile(&name)
            .ok_or_else(|| CrewkitError::UnknownProfile(name.clone()))?;

        let mut teammates = Vec::new();
        for flat in flatten_team(team, crew_filter) {
            teammates.push(resolve_teammate(&flat)?);
        }

        Ok(ResolvedProfile {
            profile_name: name,
            team_name: team.name.clone(),
            teammates,
        })
    }

    /// First 12 hex chars of sha256 over the canonical serialization of the
    /// full document. Key order is the file's own, so rewriting the file
    /// with the same content yields the same hash.
    pub fn hash(&self) -> String {
        let canonical = serde_json::to_string(&self.raw).unwrap_or_default();
        identity::short_sha256(&canonical)
    }
}

// ---------------------------------------------------------------------------
// Flattening and role resolution
// ---------------------------------------------------------------------------

struct FlatTeammate {
    spec: TeammateSpec,
    crew: String,
}

fn flatten_team(team: &TeamConfig, crew_filter: Option<&str>) -> Vec<FlatTeammate> {
    let mut out = Vec::new();
    for spec in &team.teammates {
        out.push(FlatTeammate {
            spec: spec.clone(),
            crew: DEFAULT_PROFILE.to_string(),
        });
    }
    for group in &team.crews {
        let crew_name = if group.name.trim().is_empty() {
            DEFAULT_PROFILE.to_string()
        } else {
            group.name.clone()
        };
        for spec in &group.teammates {
            out.push(FlatTeammate {
                spec: spec.clone(),
                crew: crew_name.clone(),
            });
        }
    }
    match crew_filter {
        Some(filter) => out.into_iter().filter(|t| t.crew == filter).collect(),
        None => out,
    }
}

/// A teammate after role defaults and overrides are applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedTeammate {
    pub name: String,
    pub branch: String,
    pub worktree: bool,
    pub crew: String,
    pub role: Option<String>,
    pub model: String,
    pub mode: String,
    pub subagent_type: String,
    pub focus: String,
}

fn resolve_teammate(flat: &FlatTeammate) -> Result<ResolvedTeammate> {
    let spec = &flat.spec;
    let preset = match &spec.role {
        Some(role) => Some(roles::preset(role).ok_or_else(|| CrewkitError::UnknownRole {
            role: role.clone(),
            teammate: spec.name.clone(),
        })?),
        None => None,
    };

    let focus = {
        let prefix = preset.map(|p| p.focus_prefix).unwrap_or("");
        match (&spec.focus, prefix.is_empty()) {
            (Some(user), false) => format!("{prefix} {user}"),
            (Some(user), true) => user.clone(),
            (None, _) => prefix.to_string(),
        }
    };

    Ok(ResolvedTeammate {
        name: spec.name.clone(),
        branch: spec.branch.clone(),
        worktree: spec.worktree,
        crew: flat.crew.clone(),
        role: spec.role.clone(),
        model: spec
            .model
            .clone()
            .or_else(|| preset.map(|p| p.model.to_string()))
            .unwrap_or_else(|| "sonnet".to_string()),
        mode: spec
            .mode
            .clone()
            .or_else(|| preset.map(|p| p.mode.to_string()))
            .unwrap_or_else(|| "default".to_string()),
        subagent_type: spec
            .subagent_type
            .clone()
            .or_else(|| preset.map(|p| p.subagent_type.to_string()))
            .unwrap_or_else(|| "general-purpose".to_string()),
        focus,
    })
}

#[derive(Debug, Clone)]
pub struct ResolvedProfile {
    pub profile_name: String,
    pub team_name: String,
    pub teammates: Vec<ResolvedTeammate>,
}

// ---------------------------------------------------------------------------
// Config template (init)
// ---------------------------------------------------------------------------

pub fn template(main_branch: &str) -> String {
    format!(
        r#"{{
  "team": {{
    "name": "core",
    "teammates": [
      {{ "name": "alice", "branch": "feat/alice", "role": "developer" }},
      {{ "name": "bob", "branch": "feat/bob", "role": "reviewer" }}
    ]
  }},
  "project": {{ "main_branch": "{main_branch}" }},
  "stale_after_hours": 4
}}
"#
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
