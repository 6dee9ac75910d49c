//! Persistence: exclusion store, hash-chained audit log, Arrow export, DuckDB queries.

mod error;
pub use error::StoreError;

pub mod audit_log;
pub mod exclusion;
pub mod export;
pub mod lock;

pub use audit_log::{AuditEntry, AuditLog, ChainSummary, GENESIS_HASH};
pub use exclusion::ExclusionStore;
pub use export::{audit_log_batch, read_ipc, review_batch, write_ipc};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::AuditQuery;
