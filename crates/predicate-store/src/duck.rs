//! DuckDB query layer over the audit log.

use std::collections::BTreeMap;

use arrow::array::{Array, Int64Array, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use duckdb::{Connection, params};
use tracing::info;

use crate::StoreError;
use crate::audit_log::AuditEntry;

/// In-memory DuckDB view of audit entries for ad-hoc SQL.
///
/// The `audit_log` table mirrors [`predicate_core::review::audit_log_schema`]
/// plus `adjusted_score`.
pub struct AuditQuery {
    conn: Connection,
}

impl AuditQuery {
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Replace the `audit_log` table with `entries`.
    pub fn load_entries(&self, entries: &[AuditEntry]) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE OR REPLACE TABLE audit_log (
                seq BIGINT NOT NULL,
                device_id VARCHAR NOT NULL,
                decision VARCHAR NOT NULL,
                rule VARCHAR NOT NULL,
                adjusted_score BIGINT,
                fingerprint VARCHAR NOT NULL,
                prev_hash VARCHAR NOT NULL,
                hash VARCHAR NOT NULL,
                supersedes VARCHAR,
                created_at TIMESTAMP NOT NULL
            )",
        )?;

        let mut stmt = self.conn.prepare(
            "INSERT INTO audit_log VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP))",
        )?;
        for entry in entries {
            let r = &entry.record;
            stmt.execute(params![
                entry.seq as i64,
                r.device_id.as_str(),
                r.decision.as_str(),
                r.rule.as_str(),
                r.adjusted_score,
                r.fingerprint,
                entry.prev_hash,
                entry.hash,
                entry.supersedes,
                r.created_at.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            ])?;
        }
        info!(count = entries.len(), "loaded audit_log table");
        Ok(())
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT count(*)::BIGINT AS cnt FROM audit_log")?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        let batch = batches.first().ok_or(StoreError::NoResults)?;
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| StoreError::Other("count column not i64".into()))?;
        Ok(col.value(0) as usize)
    }

    /// Every entry for one device, oldest first.
    pub fn device_history(&self, device_id: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, decision, rule, adjusted_score, created_at
             FROM audit_log WHERE device_id = ? ORDER BY seq",
        )?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([device_id])?.collect();
        Ok(batches)
    }

    /// Count of current (not superseded) decisions per outcome.
    pub fn latest_decisions(&self) -> Result<BTreeMap<String, usize>, StoreError> {
        let batches = self.query_arrow(
            "SELECT decision, count(*)::BIGINT AS cnt
             FROM audit_log
             WHERE hash NOT IN (SELECT supersedes FROM audit_log WHERE supersedes IS NOT NULL)
             GROUP BY decision
             ORDER BY decision",
        )?;
        let mut out = BTreeMap::new();
        for batch in &batches {
            // DuckDB may hand VARCHAR back as a large or view string column.
            let decisions = arrow::compute::cast(batch.column(0), &DataType::Utf8)?;
            let decisions = decisions
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| StoreError::Other("decision column not utf8".into()))?;
            let counts = batch
                .column(1)
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| StoreError::Other("count column not i64".into()))?;
            for i in 0..batch.num_rows() {
                if !decisions.is_null(i) {
                    out.insert(decisions.value(i).to_string(), counts.value(i) as usize);
                }
            }
        }
        Ok(out)
    }

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }
}
