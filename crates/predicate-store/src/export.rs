//! Arrow export of review results and the audit log.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Date32Array, Float64Array, Int32Array, ListBuilder, StringArray,
    StringBuilder, TimestampNanosecondArray, UInt32Array, UInt64Array,
};
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, Utc};
use predicate_core::{AuditRecord, SectionCategory, review};
use tracing::info;

use crate::StoreError;
use crate::audit_log::AuditEntry;

fn days_since_epoch(date: NaiveDate) -> i32 {
    date.signed_duration_since(DateTime::UNIX_EPOCH.date_naive())
        .num_days() as i32
}

fn nanos(ts: &DateTime<Utc>) -> Result<i64, StoreError> {
    ts.timestamp_nanos_opt()
        .ok_or_else(|| StoreError::Other(format!("timestamp {ts} outside nanosecond range")))
}

fn to_i32(value: Option<i64>) -> Option<i32> {
    value.and_then(|v| i32::try_from(v).ok())
}

/// One row per audit record, in [`review::review_record_schema`] layout.
pub fn review_batch(records: &[AuditRecord]) -> Result<RecordBatch, StoreError> {
    let mut flags = ListBuilder::new(StringBuilder::new());
    for r in records {
        for flag in &r.flags {
            flags.values().append_value(flag.kind.as_str());
        }
        flags.append(true);
    }

    let created: Vec<i64> = records
        .iter()
        .map(|r| nanos(&r.created_at))
        .collect::<Result<_, _>>()?;

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.device_id.as_str()))),
        Arc::new(Date32Array::from_iter_values(records.iter().map(|r| days_since_epoch(r.review_date)))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.decision.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.rule.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.rationale.as_str()))),
        Arc::new(Int32Array::from_iter(
            records.iter().map(|r| r.score.as_ref().map(|s| s.total as i32)),
        )),
        Arc::new(Int32Array::from_iter(records.iter().map(|r| to_i32(r.adjusted_score)))),
        Arc::new(Int32Array::from_iter(
            records.iter().map(|r| r.bonus.as_ref().map(|b| b.total as i32)),
        )),
        Arc::new(UInt32Array::from_iter_values(
            records.iter().map(|r| r.citations.unique_source_count as u32),
        )),
        Arc::new(Float64Array::from_iter_values(
            records.iter().map(|r| r.citations.weighted_citation_score),
        )),
        Arc::new(UInt32Array::from_iter_values(records.iter().map(|r| {
            r.citations
                .histogram
                .get(&SectionCategory::Se)
                .copied()
                .unwrap_or(0) as u32
        }))),
        Arc::new(UInt32Array::from_iter_values(
            records.iter().map(|r| r.citations.total_mentions() as u32),
        )),
        Arc::new(flags.finish()),
        Arc::new(StringArray::from_iter(records.iter().map(|r| {
            r.flags.iter().map(|f| f.severity).max().map(|s| s.as_str())
        }))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.role.to.as_str()))),
        Arc::new(BooleanArray::from_iter(records.iter().map(|r| Some(r.role.changed())))),
        Arc::new(StringArray::from_iter(
            records.iter().map(|r| r.governing_citation.as_deref()),
        )),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.fingerprint.as_str()))),
        Arc::new(TimestampNanosecondArray::from(created).with_timezone("UTC")),
    ];

    Ok(RecordBatch::try_new(Arc::new(review::review_record_schema()), columns)?)
}

/// One row per audit log entry, in [`review::audit_log_schema`] layout.
pub fn audit_log_batch(entries: &[AuditEntry]) -> Result<RecordBatch, StoreError> {
    let created: Vec<i64> = entries
        .iter()
        .map(|e| nanos(&e.record.created_at))
        .collect::<Result<_, _>>()?;

    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(entries.iter().map(|e| e.seq))),
        Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.record.device_id.as_str()))),
        Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.record.decision.as_str()))),
        Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.record.rule.as_str()))),
        Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.record.fingerprint.as_str()))),
        Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.prev_hash.as_str()))),
        Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.hash.as_str()))),
        Arc::new(StringArray::from_iter(entries.iter().map(|e| e.supersedes.as_deref()))),
        Arc::new(TimestampNanosecondArray::from(created).with_timezone("UTC")),
    ];

    Ok(RecordBatch::try_new(Arc::new(review::audit_log_schema()), columns)?)
}

/// Write a batch to an Arrow IPC file.
pub fn write_ipc(path: &Path, batch: &RecordBatch) -> Result<(), StoreError> {
    let file = File::create(path).map_err(|e| StoreError::io(path, e))?;
    let mut writer = FileWriter::try_new(file, &batch.schema())?;
    writer.write(batch)?;
    writer.finish()?;
    info!(path = %path.display(), rows = batch.num_rows(), "wrote arrow ipc");
    Ok(())
}

/// Read every batch from an Arrow IPC file.
pub fn read_ipc(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    let reader = FileReader::try_new(file, None)?;
    Ok(reader.collect::<Result<Vec<_>, _>>()?)
}
