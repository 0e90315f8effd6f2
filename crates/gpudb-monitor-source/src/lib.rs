//! GPUdb table monitor source.
//!
//! Watches one GPUdb table for inserts and hands the inserted rows, decoded
//! and typed, to a polling consumer in the order they were published.
//!
//! ```text
//! SourceTask::start
//!   → resolve_monitor_endpoint (collection check, monitor port lookup)
//!   → spawn MonitorSession
//!       create table monitor → translate schema → subscribe
//!       loop: receive frames → AvroDecoder → StructValue → hand-off queue
//!       clear table monitor
//! SourceTask::poll  → block until ≥ 1 record, drain up to the batch ceiling
//! SourceTask::stop  → cancel the session and wait for it to close
//! ```

/// GPUdb REST calls used by the monitor, behind the `MonitorCatalog` trait
pub mod catalog;
pub mod config;
pub mod decoder;
pub mod endpoint;
pub mod error;
pub mod queue;
pub mod record;
pub mod session;
pub mod task;
/// In-memory catalog and subscriber doubles
pub mod testing;
/// ZeroMQ subscription behind the `Subscriber` trait
pub mod transport;

pub use catalog::{GpudbClient, MonitorCatalog, TableInfo, TableMonitor};
pub use config::MonitorSourceConfig;
pub use decoder::{AvroDecoder, BinarySchema};
pub use endpoint::{parse_monitor_port, resolve_monitor_endpoint};
pub use error::{Error, Result};
pub use queue::{handoff_queue, HandoffReceiver, HandoffSender};
pub use record::SourceRecord;
pub use session::{MonitorSession, SessionSettings, SessionState};
pub use task::{SourceTask, VERSION};
pub use transport::{Subscriber, SubscriberFactory, ZmqSubscriberFactory};
