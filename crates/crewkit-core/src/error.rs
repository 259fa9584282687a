use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrewkitError {
    #[error("no crew config: run 'crewkit init'")]
    NotInitialized,

    #[error("crew config already exists at {0}")]
    ConfigExists(String),

    #[error("invalid crew config:\n{}", .0.join("\n"))]
    InvalidConfig(Vec<String>),

    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    #[error("unknown role '{role}' for teammate '{teammate}'")]
    UnknownRole { role: String, teammate: String },

    #[error("invalid namespace '{0}': segments must be non-empty lowercase ASCII")]
    InvalidNamespace(String),

    #[error("unknown record type: {0}")]
    InvalidRecordType(String),

    #[error("destination exists but is not a registered worktree: {0}")]
    UnregisteredWorktreeDir(String),

    #[error("git: {0}")]
    Git(String),

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, CrewkitError>;
