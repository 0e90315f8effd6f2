//! Monitor session: one table monitor subscription and its decode loop.
//!
//! A session walks through
//!
//! ```text
//! Created → Subscribing → Streaming → Draining → Closed
//!                │             │          ▲
//!                └──→ Failed ←─┘──────────┘
//! ```
//!
//! and always ends in `Closed`. Whenever the table monitor was created, it is
//! cleared again on the way out, whatever made the session stop.

use crate::catalog::{MonitorCatalog, TableMonitor};
use crate::decoder::{AvroDecoder, BinarySchema};
use crate::error::{Error, Result};
use crate::queue::HandoffSender;
use crate::record::SourceRecord;
use crate::transport::{Subscriber, SubscriberFactory};
use gpudb_types::{translate_columns, OutputSchema, StructValue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Subscribing,
    Streaming,
    Draining,
    Closed,
    Failed,
}

/// What a session needs to know besides its collaborators.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub table_name: String,
    /// Destination topic stamped on every record
    pub topic: String,
    /// Resolved pub/sub endpoint of the table monitor publisher
    pub endpoint: String,
    pub receive_timeout: Duration,
}

pub struct MonitorSession<C, F> {
    catalog: Arc<C>,
    subscribers: Arc<F>,
    settings: SessionSettings,
    queue: HandoffSender,
    state: watch::Sender<SessionState>,
}

impl<C, F> MonitorSession<C, F>
where
    C: MonitorCatalog,
    F: SubscriberFactory,
{
    /// Create a session in the `Created` state, along with a receiver that
    /// observes its state changes.
    pub fn new(
        catalog: Arc<C>,
        subscribers: Arc<F>,
        settings: SessionSettings,
        queue: HandoffSender,
    ) -> (Self, watch::Receiver<SessionState>) {
        let (state, state_rx) = watch::channel(SessionState::Created);
        (
            Self {
                catalog,
                subscribers,
                settings,
                queue,
                state,
            },
            state_rx,
        )
    }

    fn set_state(&self, state: SessionState) {
        debug!(
            "Monitor session for {} entering {state:?}",
            self.settings.table_name
        );
        self.state.send_replace(state);
    }

    /// Run the session until `cancel` fires or an error ends it.
    ///
    /// Returns the number of records handed off. Errors are logged here as
    /// well, since a session running in the background has no other way to
    /// report them.
    pub async fn run(self, cancel: CancellationToken) -> Result<u64> {
        let table_name = &self.settings.table_name;
        self.set_state(SessionState::Subscribing);

        let monitor = match self.catalog.create_table_monitor(table_name).await {
            Ok(monitor) => monitor,
            Err(e) => {
                error!(
                    "Could not create table monitor for {table_name} at {}: {e}",
                    self.settings.endpoint
                );
                self.set_state(SessionState::Failed);
                self.set_state(SessionState::Closed);
                return Err(e);
            }
        };
        info!(
            "Created table monitor {} for {table_name}",
            monitor.topic_id
        );

        let outcome = self.stream(&monitor, &cancel).await;
        match &outcome {
            Ok(count) => info!("Table monitor for {table_name} stopped after {count} records"),
            Err(e @ Error::Schema(_)) => {
                error!("Could not build record schema for {table_name}: {e}");
            }
            Err(e) => {
                error!(
                    "Could not access table monitor for {table_name} at {}: {e}",
                    self.settings.endpoint
                );
            }
        }
        if outcome.is_err() {
            self.set_state(SessionState::Failed);
        }

        self.set_state(SessionState::Draining);
        self.clear(&monitor).await;
        self.set_state(SessionState::Closed);

        outcome
    }

    async fn stream(&self, monitor: &TableMonitor, cancel: &CancellationToken) -> Result<u64> {
        let binary_schema = BinarySchema::parse(&monitor.type_schema)?;
        let schema = Arc::new(translate_columns(
            &self.settings.table_name,
            binary_schema.columns(),
        )?);
        let decoder = AvroDecoder::new(binary_schema);

        // Connecting retries until the publisher is reachable.
        let mut subscriber = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(
                    "Monitor session for {} cancelled while connecting to {}",
                    self.settings.table_name, self.settings.endpoint
                );
                return Ok(0);
            }
            subscriber = self.subscribers.subscribe(&self.settings.endpoint, &monitor.topic_id) => subscriber?,
        };
        self.set_state(SessionState::Streaming);

        let result = self
            .stream_loop(subscriber.as_mut(), &decoder, &schema, cancel)
            .await;
        subscriber.close().await;
        result
    }

    async fn stream_loop(
        &self,
        subscriber: &mut dyn Subscriber,
        decoder: &AvroDecoder,
        schema: &Arc<OutputSchema>,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let mut next_offset: u64 = 0;

        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                message = subscriber.recv(self.settings.receive_timeout) => message?,
            };

            let Some(frames) = message else {
                trace!("No table monitor message within receive timeout");
                continue;
            };

            // The first frame is the topic id.
            for payload in frames.iter().skip(1) {
                let decoded = decoder.decode(payload)?;
                let value = StructValue::from_decoded(schema, decoded)
                    .map_err(|e| Error::AvroDecode(e.to_string()))?;

                self.queue.enqueue(SourceRecord {
                    source_table: self.settings.table_name.clone(),
                    offset: next_offset,
                    topic: self.settings.topic.clone(),
                    value,
                });
                next_offset += 1;
            }
        }

        Ok(next_offset)
    }

    async fn clear(&self, monitor: &TableMonitor) {
        match self.catalog.clear_table_monitor(&monitor.topic_id).await {
            Ok(()) => info!(
                "Cleared table monitor {} for {}",
                monitor.topic_id, self.settings.table_name
            ),
            Err(e) => error!(
                "Could not clear table monitor for {}: {e}",
                self.settings.table_name
            ),
        }
    }
}
