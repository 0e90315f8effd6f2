//! Hand-off queue between the monitor session and the polling consumer.
//!
//! Unbounded and FIFO. The session is the only producer; `poll` blocks until
//! at least one record is available and then drains up to the batch ceiling.

use crate::record::SourceRecord;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Create a connected sender/receiver pair.
pub fn handoff_queue(batch_ceiling: usize) -> (HandoffSender, HandoffReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        HandoffSender { tx },
        HandoffReceiver {
            rx,
            batch_ceiling: batch_ceiling.max(1),
        },
    )
}

/// Producer side, owned by the monitor session.
#[derive(Debug, Clone)]
pub struct HandoffSender {
    tx: mpsc::UnboundedSender<SourceRecord>,
}

impl HandoffSender {
    /// Enqueue without blocking. Records enqueued after the consumer side is
    /// gone are dropped.
    pub fn enqueue(&self, record: SourceRecord) {
        if self.tx.send(record).is_err() {
            debug!("Hand-off queue consumer is gone, dropping record");
        }
    }
}

/// Consumer side, owned by the task facade.
#[derive(Debug)]
pub struct HandoffReceiver {
    rx: mpsc::UnboundedReceiver<SourceRecord>,
    batch_ceiling: usize,
}

impl HandoffReceiver {
    /// Wait for at least one record, then return up to the batch ceiling in
    /// FIFO order.
    ///
    /// Returns an empty batch only when `interrupt` fires before any record
    /// arrives. Once the producer is gone and the queue is drained this waits
    /// for `interrupt` rather than returning early.
    pub async fn poll(&mut self, interrupt: &CancellationToken) -> Vec<SourceRecord> {
        let mut batch = Vec::new();

        tokio::select! {
            biased;
            received = self.rx.recv_many(&mut batch, self.batch_ceiling) => {
                if received == 0 {
                    interrupt.cancelled().await;
                }
            }
            _ = interrupt.cancelled() => {}
        }

        batch
    }

    /// Number of records currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_record;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready};

    #[tokio::test]
    async fn test_poll_blocks_until_record_arrives() {
        let (tx, mut rx) = handoff_queue(10);
        let interrupt = CancellationToken::new();

        {
            let mut poll = tokio_test::task::spawn(rx.poll(&interrupt));
            assert_pending!(poll.poll());

            tx.enqueue(sample_record(0));
            assert!(poll.is_woken());
            let batch = assert_ready!(poll.poll());
            assert_eq!(batch.len(), 1);
            assert_eq!(batch[0].offset, 0);
        }
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn test_poll_respects_batch_ceiling_in_fifo_order() {
        let (tx, mut rx) = handoff_queue(3);
        let interrupt = CancellationToken::new();
        for i in 0..5 {
            tx.enqueue(sample_record(i));
        }

        let first = rx.poll(&interrupt).await;
        let second = rx.poll(&interrupt).await;

        assert_eq!(
            first.iter().map(|r| r.offset).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(
            second.iter().map(|r| r.offset).collect::<Vec<_>>(),
            vec![3, 4]
        );
    }

    #[tokio::test]
    async fn test_poll_never_returns_more_than_available() {
        let (tx, mut rx) = handoff_queue(1000);
        let interrupt = CancellationToken::new();
        tx.enqueue(sample_record(0));
        tx.enqueue(sample_record(1));

        assert_eq!(rx.poll(&interrupt).await.len(), 2);
    }

    #[tokio::test]
    async fn test_interrupt_returns_empty_batch() {
        let (_tx, mut rx) = handoff_queue(10);
        let interrupt = CancellationToken::new();

        let canceller = {
            let interrupt = interrupt.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                interrupt.cancel();
            })
        };

        assert!(rx.poll(&interrupt).await.is_empty());
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_records_win_over_interrupt() {
        let (tx, mut rx) = handoff_queue(10);
        let interrupt = CancellationToken::new();
        tx.enqueue(sample_record(0));
        interrupt.cancel();

        assert_eq!(rx.poll(&interrupt).await.len(), 1);
        assert!(rx.poll(&interrupt).await.is_empty());
    }

    #[tokio::test]
    async fn test_closed_queue_waits_for_interrupt() {
        let (tx, mut rx) = handoff_queue(10);
        let interrupt = CancellationToken::new();
        drop(tx);

        let mut poll = tokio_test::task::spawn(rx.poll(&interrupt));
        assert_pending!(poll.poll());

        interrupt.cancel();
        assert!(assert_ready!(poll.poll()).is_empty());
    }
}
