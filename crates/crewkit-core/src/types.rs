use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// RecordType
// ---------------------------------------------------------------------------

/// How a consumer should treat a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    /// Consume the summary directly.
    Summary,
    /// Structured sidecar data; look at `content`.
    Meta,
    /// Browse children under this namespace.
    Collection,
    /// Pointer to an external artifact.
    Source,
    /// Redirect to another namespace (content carries the target).
    Alias,
}

impl RecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::Summary => "summary",
            RecordType::Meta => "meta",
            RecordType::Collection => "collection",
            RecordType::Source => "source",
            RecordType::Alias => "alias",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordType {
    type Err = crate::error::CrewkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summary" => Ok(RecordType::Summary),
            "meta" => Ok(RecordType::Meta),
            "collection" => Ok(RecordType::Collection),
            "source" => Ok(RecordType::Source),
            "alias" => Ok(RecordType::Alias),
            _ => Err(crate::error::CrewkitError::InvalidRecordType(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// TeamStatus / TeammateStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamStatus {
    Active,
    Stopped,
}

impl fmt::Display for TeamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TeamStatus::Active => "active",
            TeamStatus::Stopped => "stopped",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeammateStatus {
    Pending,
    Active,
    Idle,
    Stopped,
}

impl fmt::Display for TeammateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TeammateStatus::Pending => "pending",
            TeammateStatus::Active => "active",
            TeammateStatus::Idle => "idle",
            TeammateStatus::Stopped => "stopped",
        })
    }
}

// ---------------------------------------------------------------------------
// HealthStatus
// ---------------------------------------------------------------------------

/// Liveness classification produced by the health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Active,
    Idle,
    Crashed,
    Unresponsive,
    Unknown,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Active => "active",
            HealthStatus::Idle => "idle",
            HealthStatus::Crashed => "crashed",
            HealthStatus::Unresponsive => "unresponsive",
            HealthStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn record_type_roundtrip() {
        for t in [
            RecordType::Summary,
            RecordType::Meta,
            RecordType::Collection,
            RecordType::Source,
            RecordType::Alias,
        ] {
            assert_eq!(RecordType::from_str(t.as_str()).unwrap(), t);
        }
    }

    #[test]
    fn record_type_unknown_rejected() {
        assert!(RecordType::from_str("blob").is_err());
    }

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&TeammateStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&TeamStatus::Stopped).unwrap(),
            "\"stopped\""
        );
    }
}
