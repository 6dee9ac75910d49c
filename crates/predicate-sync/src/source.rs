//! The two registry contracts the review consumes.

use async_trait::async_trait;
use predicate_core::{AttributeLookup, DeviceId, ValidationReport};

use crate::SyncError;

/// Looks up regulatory attributes for a cited device.
///
/// An identifier the registry does not know is `Ok(AttributeLookup::NotFound)`,
/// never an error.
#[async_trait]
pub trait AttributeResolver: Send + Sync {
    async fn resolve(&self, id: &DeviceId) -> Result<AttributeLookup, SyncError>;
}

/// Upstream web validation plus the regulatory-criteria compliance check.
#[async_trait]
pub trait ExternalValidator: Send + Sync {
    async fn validate(&self, id: &DeviceId) -> Result<ValidationReport, SyncError>;
}
