//! Registry boundary: resolver and validator contracts, their implementations,
//! and the bounded enricher that drives them.

mod error;
pub use error::SyncError;

pub mod enrich;
pub mod snapshot;
pub mod source;

pub use enrich::{EnrichConfig, Enricher};
pub use snapshot::{SnapshotDevice, SnapshotSource};
pub use source::{AttributeResolver, ExternalValidator};

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::HttpRegistryClient;
