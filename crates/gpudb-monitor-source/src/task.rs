//! Source task facade: the start/poll/stop contract a hosting framework drives.

use crate::catalog::{GpudbClient, MonitorCatalog};
use crate::config::MonitorSourceConfig;
use crate::endpoint::resolve_monitor_endpoint;
use crate::error::Result;
use crate::queue::{handoff_queue, HandoffReceiver};
use crate::record::SourceRecord;
use crate::session::{MonitorSession, SessionSettings, SessionState};
use crate::transport::{SubscriberFactory, ZmqSubscriberFactory};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Version reported by [`SourceTask::version`].
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A running table monitor source task.
///
/// Start-up problems (bad configuration, collection tables, monitors
/// disabled on the server) fail `start` directly. Anything that goes wrong
/// once the background session runs is only logged: `poll` has no error
/// channel, so a failed session shows up as a stream that stays empty.
pub struct SourceTask {
    config: MonitorSourceConfig,
    queue: tokio::sync::Mutex<HandoffReceiver>,
    interrupt: CancellationToken,
    session: Mutex<Option<JoinHandle<Result<u64>>>>,
    state: watch::Receiver<SessionState>,
}

impl SourceTask {
    /// Start from a framework property map, talking to GPUdb over HTTP and
    /// ZeroMQ.
    pub async fn start(props: &HashMap<String, String>) -> Result<Self> {
        let config = MonitorSourceConfig::from_props(props)?;
        Self::start_with_config(config).await
    }

    pub async fn start_with_config(config: MonitorSourceConfig) -> Result<Self> {
        config.validate()?;
        let catalog = Arc::new(GpudbClient::new(&config)?);
        Self::start_with(config, catalog, Arc::new(ZmqSubscriberFactory)).await
    }

    /// Start with explicit collaborators.
    ///
    /// Resolves the monitor endpoint, then spawns the monitor session and
    /// returns without waiting for it to subscribe.
    pub async fn start_with<C, F>(
        config: MonitorSourceConfig,
        catalog: Arc<C>,
        subscribers: Arc<F>,
    ) -> Result<Self>
    where
        C: MonitorCatalog + 'static,
        F: SubscriberFactory + 'static,
    {
        config.validate()?;
        let url = config.url()?;
        let endpoint = resolve_monitor_endpoint(catalog.as_ref(), &url, &config.table_name).await?;

        let (sender, receiver) = handoff_queue(config.poll_batch_size);
        let settings = SessionSettings {
            table_name: config.table_name.clone(),
            topic: config.topic.clone(),
            endpoint,
            receive_timeout: config.receive_timeout(),
        };
        let (session, state) = MonitorSession::new(catalog, subscribers, settings, sender);

        let interrupt = CancellationToken::new();
        let handle = tokio::spawn(session.run(interrupt.clone()));

        info!(
            "Started table monitor source task {VERSION} for {} -> {}",
            config.table_name, config.topic
        );

        Ok(Self {
            config,
            queue: tokio::sync::Mutex::new(receiver),
            interrupt,
            session: Mutex::new(Some(handle)),
            state,
        })
    }

    /// Return the next batch of records, waiting while none are queued.
    ///
    /// The batch is empty only when `stop` interrupts the wait.
    pub async fn poll(&self) -> Vec<SourceRecord> {
        let mut queue = self.queue.lock().await;
        let batch = queue.poll(&self.interrupt).await;
        info!("Sourced {} records", batch.len());
        batch
    }

    /// Stop the monitor session and wait until it has cleared its table
    /// monitor. Calling it again is a no-op.
    pub async fn stop(&self) {
        self.interrupt.cancel();

        let handle = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            debug!("Source task for {} already stopped", self.config.table_name);
            return;
        };

        match handle.await {
            Ok(Ok(count)) => info!(
                "Stopped source task for {} after {count} records",
                self.config.table_name
            ),
            // Already logged by the session.
            Ok(Err(_)) => {}
            Err(e) => error!(
                "Monitor session for {} ended abnormally: {e}",
                self.config.table_name
            ),
        }
    }

    /// Current state of the monitor session.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Resolves once the monitor session reaches `state`, or when the session
    /// is gone.
    pub async fn wait_for_state(&self, state: SessionState) {
        let mut rx = self.state.clone();
        let _ = rx.wait_for(|s| *s == state).await;
    }

    pub fn config(&self) -> &MonitorSourceConfig {
        &self.config
    }

    pub fn version() -> &'static str {
        VERSION
    }
}

impl Drop for SourceTask {
    fn drop(&mut self) {
        // Lets a session that was never stopped clear its table monitor.
        self.interrupt.cancel();
    }
}
