//! Bounded multi-producer / multi-consumer batch queue.
//!
//! A tokio bounded mpsc channel carries the batches; the single receiver is
//! shared by all loaders behind an async mutex, which turns the channel
//! into an MPMC FIFO. `send` blocking on a full channel is the pipeline's
//! sole backpressure path.

use crate::model::RowFingerprint;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

pub type BatchSender = mpsc::Sender<Vec<RowFingerprint>>;

/// Outcome of a timed poll.
#[derive(Debug)]
pub enum Poll {
    /// A batch was dequeued.
    Batch(Vec<RowFingerprint>),
    /// Nothing arrived within the timeout.
    Timeout,
    /// All producers are done and the queue is drained.
    Closed,
}

/// Shared consuming end of the batch queue.
#[derive(Clone)]
pub struct BatchReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Vec<RowFingerprint>>>>,
}

impl BatchReceiver {
    /// Dequeue one batch, waiting at most `timeout`.
    pub async fn poll(&self, timeout: Duration) -> Poll {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(batch)) => Poll::Batch(batch),
            Ok(None) => Poll::Closed,
            Err(_) => Poll::Timeout,
        }
    }
}

/// Create a queue with the given capacity in batches.
pub fn batch_queue(capacity: usize) -> (BatchSender, BatchReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        tx,
        BatchReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(n: i32) -> RowFingerprint {
        RowFingerprint {
            tid: 1,
            pk_hash: format!("pk{}", n),
            column_hash: format!("col{}", n),
            pk: format!("{{\"id\": \"{}\"}}", n),
        }
    }

    #[tokio::test]
    async fn fifo_per_producer() {
        let (tx, rx) = batch_queue(10);
        tx.send(vec![fp(1)]).await.unwrap();
        tx.send(vec![fp(2)]).await.unwrap();
        drop(tx);

        match rx.poll(Duration::from_millis(100)).await {
            Poll::Batch(b) => assert_eq!(b[0].pk_hash, "pk1"),
            other => panic!("unexpected {:?}", other),
        }
        match rx.poll(Duration::from_millis(100)).await {
            Poll::Batch(b) => assert_eq!(b[0].pk_hash, "pk2"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            rx.poll(Duration::from_millis(10)).await,
            Poll::Closed
        ));
    }

    #[tokio::test]
    async fn poll_times_out_on_empty_queue() {
        let (_tx, rx) = batch_queue(1);
        assert!(matches!(
            rx.poll(Duration::from_millis(10)).await,
            Poll::Timeout
        ));
    }

    #[tokio::test]
    async fn full_queue_applies_backpressure() {
        let (tx, rx) = batch_queue(1);
        tx.send(vec![fp(1)]).await.unwrap();

        // The queue is full: the next send must not complete until a
        // consumer removes a batch. No batch is ever dropped.
        let tx2 = tx.clone();
        let blocked = tokio::spawn(async move { tx2.send(vec![fp(2)]).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());

        match rx.poll(Duration::from_millis(100)).await {
            Poll::Batch(b) => assert_eq!(b[0].pk_hash, "pk1"),
            other => panic!("unexpected {:?}", other),
        }
        blocked.await.unwrap().unwrap();
        match rx.poll(Duration::from_millis(100)).await {
            Poll::Batch(b) => assert_eq!(b[0].pk_hash, "pk2"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn multiple_consumers_share_the_queue() {
        let (tx, rx) = batch_queue(10);
        for n in 0..4 {
            tx.send(vec![fp(n)]).await.unwrap();
        }
        drop(tx);

        let rx2 = rx.clone();
        let a = tokio::spawn(async move {
            let mut seen = 0;
            while let Poll::Batch(_) = rx2.poll(Duration::from_millis(50)).await {
                seen += 1;
            }
            seen
        });
        let b = tokio::spawn(async move {
            let mut seen = 0;
            while let Poll::Batch(_) = rx.poll(Duration::from_millis(50)).await {
                seen += 1;
            }
            seen
        });

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a + b, 4);
    }
}
