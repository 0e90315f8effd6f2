use gpudb_types::{FieldKind, OutputSchema, StructValue, KEY_KIND};
use std::collections::HashMap;
use std::sync::Arc;

/// A record produced by the monitor source, ready for the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    /// Monitored table the record came from
    pub source_table: String,
    /// Per-session sequence number; also the record key
    pub offset: u64,
    /// Destination topic
    pub topic: String,
    pub value: StructValue,
}

impl SourceRecord {
    /// Source partition map: `{"table": <table>}`.
    pub fn source_partition(&self) -> HashMap<String, String> {
        HashMap::from([("table".to_string(), self.source_table.clone())])
    }

    /// Source offset map: `{"record": <sequence number>}`.
    pub fn source_offset(&self) -> HashMap<String, u64> {
        HashMap::from([("record".to_string(), self.offset)])
    }

    pub fn key(&self) -> i64 {
        self.offset as i64
    }

    pub fn key_kind(&self) -> FieldKind {
        KEY_KIND
    }

    pub fn schema(&self) -> &Arc<OutputSchema> {
        self.value.schema()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "table": self.source_table,
            "topic": self.topic,
            "key": self.key(),
            "value": self.value.to_json(),
        })
    }
}
