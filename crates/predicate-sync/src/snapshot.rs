//! Offline registry backed by a JSON snapshot file.
//!
//! ```json
//! { "devices": { "K241335": { "attributes": { ... }, "validation": { ... } } } }
//! ```
//!
//! A device absent from `devices` (or with `attributes: null`) resolves as
//! not found; a device without `validation` has no validator answer.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use predicate_core::{AttributeLookup, DeviceAttributes, DeviceId, ValidationReport};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AttributeResolver, ExternalValidator, SyncError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDevice {
    #[serde(default)]
    pub attributes: Option<DeviceAttributes>,
    #[serde(default)]
    pub validation: Option<ValidationReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSource {
    #[serde(default)]
    devices: BTreeMap<DeviceId, SnapshotDevice>,
}

impl SnapshotSource {
    pub fn new(devices: BTreeMap<DeviceId, SnapshotDevice>) -> Self {
        Self { devices }
    }

    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let text = std::fs::read_to_string(path).map_err(|source| SyncError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot = Self::from_json(&text)?;
        info!(path = %path.display(), devices = snapshot.len(), "loaded registry snapshot");
        Ok(snapshot)
    }

    pub fn from_json(text: &str) -> Result<Self, SyncError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[async_trait]
impl AttributeResolver for SnapshotSource {
    async fn resolve(&self, id: &DeviceId) -> Result<AttributeLookup, SyncError> {
        Ok(match self.devices.get(id).and_then(|d| d.attributes.clone()) {
            Some(attributes) => AttributeLookup::Found { attributes },
            None => AttributeLookup::NotFound,
        })
    }
}

#[async_trait]
impl ExternalValidator for SnapshotSource {
    async fn validate(&self, id: &DeviceId) -> Result<ValidationReport, SyncError> {
        self.devices
            .get(id)
            .and_then(|d| d.validation.clone())
            .ok_or_else(|| SyncError::NoValidation(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use predicate_core::WebFlag;

    const SNAPSHOT: &str = r#"{
        "devices": {
            "k241335": {
                "attributes": { "product_code": "QAS", "decision_date": "2023-06-01", "recalls": [] },
                "validation": {
                    "web": { "flag": "GREEN", "rationale": "clean" },
                    "compliance": { "compliant": true }
                }
            },
            "K100001": { "attributes": null }
        }
    }"#;

    fn id(s: &str) -> DeviceId {
        DeviceId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn resolves_from_snapshot() {
        let source = SnapshotSource::from_json(SNAPSHOT).unwrap();
        assert_eq!(source.len(), 2);

        let found = source.resolve(&id("K241335")).await.unwrap();
        let attrs = found.attributes().unwrap();
        assert_eq!(attrs.product_code.as_deref(), Some("QAS"));
        assert_eq!(attrs.recalls.as_deref(), Some(&[][..]));

        assert_eq!(source.resolve(&id("K100001")).await.unwrap(), AttributeLookup::NotFound);
        assert_eq!(source.resolve(&id("K999999")).await.unwrap(), AttributeLookup::NotFound);
    }

    #[tokio::test]
    async fn validation_from_snapshot() {
        let source = SnapshotSource::from_json(SNAPSHOT).unwrap();
        let report = source.validate(&id("K241335")).await.unwrap();
        assert_eq!(report.web.flag, WebFlag::Green);
        assert!(report.compliance.failed_criteria.is_empty());

        let err = source.validate(&id("K100001")).await.unwrap_err();
        assert!(matches!(err, SyncError::NoValidation(_)));
    }

    #[test]
    fn bad_device_key_is_rejected() {
        let err = SnapshotSource::from_json(r#"{"devices": {"X1": {}}}"#).unwrap_err();
        assert!(matches!(err, SyncError::Json(_)));
    }

    #[test]
    fn load_missing_file() {
        let err = SnapshotSource::load(Path::new("/nonexistent/snapshot.json")).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
    }
}
