//! User-maintained exclusion entries and the read-consistent snapshot the
//! decision engine consumes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DeviceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExclusionOrigin {
    Manual,
    Review,
    Auto,
}

impl ExclusionOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Review => "review",
            Self::Auto => "auto",
        }
    }
}

impl std::str::FromStr for ExclusionOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "review" => Ok(Self::Review),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown exclusion origin {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionEntry {
    pub reason: String,
    /// ISO-8601 UTC timestamp.
    pub added: DateTime<Utc>,
    pub added_by: ExclusionOrigin,
}

/// Immutable view of the exclusion store taken at session start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionSnapshot {
    pub version: u64,
    pub entries: BTreeMap<DeviceId, ExclusionEntry>,
}

impl ExclusionSnapshot {
    pub fn new(version: u64, entries: BTreeMap<DeviceId, ExclusionEntry>) -> Self {
        Self { version, entries }
    }

    pub fn get(&self, id: &DeviceId) -> Option<&ExclusionEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_parses_case_insensitively() {
        assert_eq!("Manual".parse::<ExclusionOrigin>(), Ok(ExclusionOrigin::Manual));
        assert!("robot".parse::<ExclusionOrigin>().is_err());
    }

    #[test]
    fn entry_json_shape() {
        let entry: ExclusionEntry = serde_json::from_str(
            r#"{"reason": "recalled", "added": "2026-01-15T09:30:00Z", "added_by": "review"}"#,
        )
        .unwrap();
        assert_eq!(entry.added_by, ExclusionOrigin::Review);
        assert_eq!(entry.added.to_rfc3339(), "2026-01-15T09:30:00+00:00");
    }

    #[test]
    fn snapshot_lookup() {
        let id = DeviceId::parse("K100001").unwrap();
        let mut entries = BTreeMap::new();
        entries.insert(
            id.clone(),
            ExclusionEntry {
                reason: "class I recall".into(),
                added: "2026-01-15T09:30:00Z".parse().unwrap(),
                added_by: ExclusionOrigin::Manual,
            },
        );
        let snapshot = ExclusionSnapshot::new(3, entries);
        assert!(snapshot.contains(&id));
        assert!(!snapshot.contains(&DeviceId::parse("K241335").unwrap()));
        assert_eq!(snapshot.len(), 1);
    }
}
