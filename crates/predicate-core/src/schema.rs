/// Arrow schema definitions for exported review results.
pub mod review {
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
    use std::sync::Arc;

    fn utf8_list(name: &str) -> Field {
        Field::new(
            name,
            DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
            true,
        )
    }

    /// One row per reviewed device.
    pub fn review_record_schema() -> Schema {
        Schema::new(vec![
            Field::new("device_id", DataType::Utf8, false),
            Field::new("review_date", DataType::Date32, false),
            Field::new("decision", DataType::Utf8, false),
            Field::new("rule", DataType::Utf8, false),
            Field::new("rationale", DataType::Utf8, false),
            Field::new("base_score", DataType::Int32, true),
            Field::new("adjusted_score", DataType::Int32, true),
            Field::new("bonus_score", DataType::Int32, true),
            Field::new("unique_source_count", DataType::UInt32, false),
            Field::new("weighted_citation_score", DataType::Float64, false),
            Field::new("se_mentions", DataType::UInt32, false),
            Field::new("total_mentions", DataType::UInt32, false),
            utf8_list("flags"),
            Field::new("highest_severity", DataType::Utf8, true),
            Field::new("role", DataType::Utf8, false),
            Field::new("role_changed", DataType::Boolean, false),
            Field::new("governing_citation", DataType::Utf8, true),
            Field::new("fingerprint", DataType::Utf8, false),
            Field::new(
                "created_at",
                DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into())),
                false,
            ),
        ])
    }

    /// Schema of the append-only audit log when loaded for querying.
    pub fn audit_log_schema() -> Schema {
        Schema::new(vec![
            Field::new("seq", DataType::UInt64, false),
            Field::new("device_id", DataType::Utf8, false),
            Field::new("decision", DataType::Utf8, false),
            Field::new("rule", DataType::Utf8, false),
            Field::new("fingerprint", DataType::Utf8, false),
            Field::new("prev_hash", DataType::Utf8, false),
            Field::new("hash", DataType::Utf8, false),
            Field::new("supersedes", DataType::Utf8, true),
            Field::new(
                "created_at",
                DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into())),
                false,
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::review;

    #[test]
    fn review_record_schema_has_expected_fields() {
        let schema = review::review_record_schema();
        assert_eq!(schema.fields().len(), 19);
        assert!(schema.field_with_name("device_id").is_ok());
        assert!(schema.field_with_name("base_score").unwrap().is_nullable());
    }

    #[test]
    fn audit_log_schema_has_expected_fields() {
        let schema = review::audit_log_schema();
        assert_eq!(schema.fields().len(), 9);
        assert!(schema.field_with_name("prev_hash").is_ok());
    }
}
