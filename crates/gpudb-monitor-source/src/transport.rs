//! Pub/sub transport for table monitor messages.
//!
//! GPUdb publishes monitor messages on a ZeroMQ PUB socket. Every message is
//! a multi-frame envelope: the topic id frame first, then one frame per
//! inserted row.

use crate::error::Result;
use bytes::Bytes;
use std::time::Duration;
use tracing::warn;
use zeromq::{Socket, SocketRecv, SubSocket};

/// An open subscription on the monitor publisher.
#[async_trait::async_trait]
pub trait Subscriber: Send {
    /// Wait up to `timeout` for the next message. `Ok(None)` means nothing
    /// arrived in time, which is not an error.
    async fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<Bytes>>>;

    /// Close the subscription and release the socket.
    async fn close(self: Box<Self>);
}

/// Opens subscriptions; one per monitor session.
#[async_trait::async_trait]
pub trait SubscriberFactory: Send + Sync {
    /// Connect to `endpoint` and subscribe with `topic_id` as filter prefix.
    async fn subscribe(&self, endpoint: &str, topic_id: &str) -> Result<Box<dyn Subscriber>>;
}

/// ZeroMQ SUB socket transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZmqSubscriberFactory;

#[async_trait::async_trait]
impl SubscriberFactory for ZmqSubscriberFactory {
    async fn subscribe(&self, endpoint: &str, topic_id: &str) -> Result<Box<dyn Subscriber>> {
        let mut socket = SubSocket::new();
        socket.connect(endpoint).await?;
        socket.subscribe(topic_id).await?;
        Ok(Box::new(ZmqSubscriber { socket }))
    }
}

pub struct ZmqSubscriber {
    socket: SubSocket,
}

#[async_trait::async_trait]
impl Subscriber for ZmqSubscriber {
    async fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<Bytes>>> {
        match tokio::time::timeout(timeout, self.socket.recv()).await {
            Err(_) => Ok(None),
            Ok(Ok(message)) => Ok(Some(message.into_vecdeque().into_iter().collect())),
            Ok(Err(e)) => Err(e.into()),
        }
    }

    async fn close(self: Box<Self>) {
        for e in self.socket.close().await {
            warn!("Error while closing table monitor socket: {e}");
        }
    }
}
