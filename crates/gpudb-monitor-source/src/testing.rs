//! In-memory collaborators for exercising the source task without a GPUdb
//! server or a ZeroMQ publisher.

use crate::catalog::{MonitorCatalog, TableInfo, TableMonitor, COLLECTION_DESCRIPTION};
use crate::decoder::BinarySchema;
use crate::error::{Error, Result};
use crate::record::SourceRecord;
use crate::transport::{Subscriber, SubscriberFactory};
use apache_avro::schema::SchemaKind;
use apache_avro::types::Value as AvroValue;
use apache_avro::Schema;
use bytes::Bytes;
use gpudb_types::{translate_columns, ColumnDescriptor, DecodedRecord, FieldValue, StructValue};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Binary schema of a two-column `(id long, name string)` table.
pub const USERS_TYPE_SCHEMA: &str = r#"{
    "type": "record",
    "name": "type_name",
    "fields": [
        {"name": "id", "type": "long"},
        {"name": "name", "type": "string"}
    ]
}"#;

/// Counters of catalog calls made against a [`MockCatalog`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogCalls {
    pub show_table: usize,
    pub show_system_property: usize,
    pub create_table_monitor: usize,
    /// Topic ids passed to `clear_table_monitor`, in call order
    pub cleared: Vec<String>,
}

/// Scriptable [`MonitorCatalog`].
pub struct MockCatalog {
    pub type_schema: String,
    pub topic_id: String,
    pub monitor_port: Option<String>,
    pub collection: bool,
    pub fail_create: bool,
    pub fail_clear: bool,
    calls: Mutex<CatalogCalls>,
}

impl MockCatalog {
    /// A catalog with monitors enabled on port 9002.
    pub fn new(type_schema: impl Into<String>) -> Self {
        Self {
            type_schema: type_schema.into(),
            topic_id: "monitor-topic".to_string(),
            monitor_port: Some("9002".to_string()),
            collection: false,
            fail_create: false,
            fail_clear: false,
            calls: Mutex::new(CatalogCalls::default()),
        }
    }

    pub fn with_monitor_port(mut self, port: Option<&str>) -> Self {
        self.monitor_port = port.map(str::to_string);
        self
    }

    pub fn as_collection(mut self) -> Self {
        self.collection = true;
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_clear(mut self) -> Self {
        self.fail_clear = true;
        self
    }

    pub fn calls(&self) -> CatalogCalls {
        self.lock_calls().clone()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, CatalogCalls> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failure(endpoint: &str) -> Error {
        Error::Gpudb {
            endpoint: endpoint.to_string(),
            message: "scripted failure".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl MonitorCatalog for MockCatalog {
    async fn show_table(&self, table_name: &str) -> Result<TableInfo> {
        self.lock_calls().show_table += 1;
        let descriptions = if self.collection {
            vec![vec![COLLECTION_DESCRIPTION.to_string()]]
        } else {
            vec![Vec::new()]
        };
        Ok(TableInfo {
            table_name: table_name.to_string(),
            descriptions,
        })
    }

    async fn show_system_property(&self, _key: &str) -> Result<Option<String>> {
        self.lock_calls().show_system_property += 1;
        Ok(self.monitor_port.clone())
    }

    async fn create_table_monitor(&self, table_name: &str) -> Result<TableMonitor> {
        self.lock_calls().create_table_monitor += 1;
        if self.fail_create {
            return Err(Self::failure("/create/tablemonitor"));
        }
        Ok(TableMonitor {
            topic_id: self.topic_id.clone(),
            table_name: table_name.to_string(),
            type_schema: self.type_schema.clone(),
        })
    }

    async fn clear_table_monitor(&self, topic_id: &str) -> Result<()> {
        self.lock_calls().cleared.push(topic_id.to_string());
        if self.fail_clear {
            return Err(Self::failure("/clear/tablemonitor"));
        }
        Ok(())
    }
}

/// One scripted outcome of a subscriber receive.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Message(Vec<Bytes>),
    Error(String),
}

/// Build a monitor message: the topic id frame followed by one frame per
/// payload.
pub fn monitor_message(topic_id: &str, payloads: Vec<Vec<u8>>) -> ScriptStep {
    let frames = std::iter::once(Bytes::copy_from_slice(topic_id.as_bytes()))
        .chain(payloads.into_iter().map(Bytes::from))
        .collect();
    ScriptStep::Message(frames)
}

/// [`SubscriberFactory`] that replays a fixed script. Once the script runs
/// out, receives time out.
pub struct ScriptedSubscriberFactory {
    script: Mutex<VecDeque<ScriptStep>>,
    fail_connect: bool,
    hang_connect: bool,
    connections: Mutex<Vec<(String, String)>>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedSubscriberFactory {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            fail_connect: false,
            hang_connect: false,
            connections: Mutex::new(Vec::new()),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_connect() -> Self {
        Self {
            fail_connect: true,
            ..Self::new(Vec::new())
        }
    }

    /// A factory whose subscribe never completes, like a connect to a
    /// publisher that is not listening.
    pub fn hanging_connect() -> Self {
        Self {
            hang_connect: true,
            ..Self::new(Vec::new())
        }
    }

    /// `(endpoint, topic_id)` of every subscribe call.
    pub fn connections(&self) -> Vec<(String, String)> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SubscriberFactory for ScriptedSubscriberFactory {
    async fn subscribe(&self, endpoint: &str, topic_id: &str) -> Result<Box<dyn Subscriber>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((endpoint.to_string(), topic_id.to_string()));
        if self.fail_connect {
            return Err(Error::Transport(format!("connection refused: {endpoint}")));
        }
        if self.hang_connect {
            std::future::pending::<()>().await;
        }

        let steps = std::mem::take(&mut *self.script.lock().unwrap_or_else(PoisonError::into_inner));
        Ok(Box::new(ScriptedSubscriber {
            steps,
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct ScriptedSubscriber {
    steps: VecDeque<ScriptStep>,
    closed: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Subscriber for ScriptedSubscriber {
    async fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<Bytes>>> {
        match self.steps.pop_front() {
            Some(ScriptStep::Message(frames)) => Ok(Some(frames)),
            Some(ScriptStep::Error(message)) => Err(Error::Transport(message)),
            None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }

    async fn close(self: Box<Self>) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Avro-encode one row the way a table monitor publishes it.
pub fn encode_row(schema: &BinarySchema, values: Vec<(&str, FieldValue)>) -> Result<Vec<u8>> {
    let Schema::Record(record) = schema.avro() else {
        return Err(Error::AvroDecode("not a record schema".to_string()));
    };

    let mut fields = Vec::with_capacity(record.fields.len());
    for field in &record.fields {
        let value = values
            .iter()
            .find(|(name, _)| *name == field.name)
            .map(|(_, value)| to_avro(value.clone()))
            .ok_or_else(|| Error::AvroDecode(format!("no value for {}", field.name)))?;
        fields.push((field.name.clone(), wrap_union(&field.schema, value)?));
    }

    apache_avro::to_avro_datum(schema.avro(), AvroValue::Record(fields))
        .map_err(|e| Error::AvroDecode(e.to_string()))
}

fn to_avro(value: FieldValue) -> AvroValue {
    match value {
        FieldValue::Bytes(b) => AvroValue::Bytes(b),
        FieldValue::Float64(v) => AvroValue::Double(v),
        FieldValue::Float32(v) => AvroValue::Float(v),
        FieldValue::Int32(v) => AvroValue::Int(v),
        FieldValue::Int64(v) => AvroValue::Long(v),
        FieldValue::String(s) => AvroValue::String(s),
        FieldValue::Null => AvroValue::Null,
    }
}

fn wrap_union(schema: &Schema, value: AvroValue) -> Result<AvroValue> {
    let Schema::Union(union) = schema else {
        return Ok(value);
    };
    let kind = SchemaKind::from(&value);
    let index = union
        .variants()
        .iter()
        .position(|variant| SchemaKind::from(variant) == kind)
        .ok_or_else(|| Error::AvroDecode(format!("no union variant for {kind:?}")))?;
    Ok(AvroValue::Union(index as u32, Box::new(value)))
}

/// A single-column record with the given offset, for queue tests.
pub fn sample_record(offset: u64) -> SourceRecord {
    let schema = Arc::new(
        translate_columns("samples", &[ColumnDescriptor::new("id", "long")])
            .expect("long is a supported column type"),
    );
    let decoded: DecodedRecord = [("id".to_string(), FieldValue::Int64(offset as i64))]
        .into_iter()
        .collect();
    SourceRecord {
        source_table: "samples".to_string(),
        offset,
        topic: "samples-topic".to_string(),
        value: StructValue::from_decoded(&schema, decoded)
            .expect("sample value matches its schema"),
    }
}
