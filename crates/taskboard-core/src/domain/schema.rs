//! Schema versions of the on-chain board contract.
//!
//! The client decodes exactly one schema version at a time. Each version fixes
//! the ordered variant tags for task status and member role, and the field
//! names the decoder reads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A contract schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    /// Tasks are standalone objects listed inline on the board, members are an
    /// inline address list, descriptions are optional strings.
    Legacy,

    /// Tasks and members live in tables under the board, descriptions are
    /// opaque byte blobs, completion goes through a verification step.
    #[default]
    Verified,
}

const LEGACY_STATUS: &[&str] = &["Backlog", "InProgress", "InReview", "Done"];
const VERIFIED_STATUS: &[&str] = &["Todo", "InProgress", "AwaitingCheck", "Verified", "Failed"];

const LEGACY_STATUS_LABELS: &[&str] = &["Backlog", "In Progress", "In Review", "Done"];
const VERIFIED_STATUS_LABELS: &[&str] =
    &["To Do", "In Progress", "Awaiting Check", "Verified", "Failed"];

const LEGACY_ROLES: &[&str] = &["Contributor", "Admin"];
const VERIFIED_ROLES: &[&str] = &["None", "Contributor", "Admin"];

/// Field names that differ between schema versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldNames {
    pub members: &'static [&'static str],
    pub tasks: &'static str,
    pub task_parent: &'static str,
    pub task_description: &'static str,
    pub task_due: &'static str,
    pub task_effort: &'static str,
}

const LEGACY_FIELDS: FieldNames = FieldNames {
    members: &["members", "active_members"],
    tasks: "tasks",
    task_parent: "parent",
    task_description: "description",
    task_due: "due_date",
    task_effort: "effort_estimation",
};

const VERIFIED_FIELDS: FieldNames = FieldNames {
    members: &["members", "active_members"],
    tasks: "tasks",
    task_parent: "parent_id",
    task_description: "description_cipher",
    task_due: "due_ts_ms",
    task_effort: "weight_pct",
};

impl SchemaVersion {
    /// Ordered status tags. Index 0 is the initial status.
    pub fn status_tags(self) -> &'static [&'static str] {
        match self {
            Self::Legacy => LEGACY_STATUS,
            Self::Verified => VERIFIED_STATUS,
        }
    }

    pub fn status_labels(self) -> &'static [&'static str] {
        match self {
            Self::Legacy => LEGACY_STATUS_LABELS,
            Self::Verified => VERIFIED_STATUS_LABELS,
        }
    }

    /// Ordered role tags. Index 0 is the default role.
    pub fn role_tags(self) -> &'static [&'static str] {
        match self {
            Self::Legacy => LEGACY_ROLES,
            Self::Verified => VERIFIED_ROLES,
        }
    }

    /// Role granted to a new member when the caller does not pick one.
    pub fn default_member_role(self) -> u8 {
        match self {
            Self::Legacy => 0,
            Self::Verified => 1,
        }
    }

    pub fn admin_role(self) -> u8 {
        (self.role_tags().len() - 1) as u8
    }

    /// Status that counts as done.
    pub fn completed_status(self) -> u8 {
        3
    }

    /// Terminal failure status reachable from any non-terminal status.
    pub fn failure_status(self) -> Option<u8> {
        match self {
            Self::Legacy => None,
            Self::Verified => Some(4),
        }
    }

    pub fn fields(self) -> &'static FieldNames {
        match self {
            Self::Legacy => &LEGACY_FIELDS,
            Self::Verified => &VERIFIED_FIELDS,
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Verified => f.write_str("verified"),
        }
    }
}

impl FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "v1" => Ok(Self::Legacy),
            "verified" | "v2" => Ok(Self::Verified),
            other => Err(format!("unknown schema version `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_sets_and_labels_line_up() {
        for schema in [SchemaVersion::Legacy, SchemaVersion::Verified] {
            assert_eq!(schema.status_tags().len(), schema.status_labels().len());
            assert!((schema.completed_status() as usize) < schema.status_tags().len());
        }
        assert_eq!(SchemaVersion::Verified.admin_role(), 2);
        assert_eq!(SchemaVersion::Legacy.admin_role(), 1);
    }

    #[test]
    fn parses_from_config_strings() {
        assert_eq!("Verified".parse::<SchemaVersion>(), Ok(SchemaVersion::Verified));
        assert_eq!("v1".parse::<SchemaVersion>(), Ok(SchemaVersion::Legacy));
        assert!("v3".parse::<SchemaVersion>().is_err());
    }
}
