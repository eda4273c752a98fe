use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::broker::{Broker, BrokerError, FragmentMessage};

/// Keeps published messages in memory. Backs `--broker memory` and the tests.
#[derive(Debug, Default)]
pub struct MemoryBroker {
    messages: Mutex<Vec<FragmentMessage>>,
    notifications: AtomicUsize,
    closed: AtomicBool,
    fail_at: Option<u64>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker that rejects the fragment with the given sequence number.
    pub fn failing_at(sequence: u64) -> Self {
        Self {
            fail_at: Some(sequence),
            ..Self::default()
        }
    }

    pub async fn messages(&self) -> Vec<FragmentMessage> {
        self.messages.lock().await.clone()
    }

    pub fn notifications(&self) -> usize {
        self.notifications.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, message: FragmentMessage) -> Result<(), BrokerError> {
        if self.is_closed() {
            return Err("broker is closed".into());
        }
        if self.fail_at == Some(message.sequence) {
            return Err(format!("queue rejected fragment {}", message.sequence).into());
        }
        tracing::debug!(
            "queued fragment {} of {} ({} bytes)",
            message.sequence,
            message.file_id,
            message.payload.len()
        );
        self.messages.lock().await.push(message);
        Ok(())
    }

    async fn notify_consumers(&self) {
        self.notifications.fetch_add(1, Ordering::SeqCst);
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_records_in_publish_order() {
        let broker = MemoryBroker::new();
        broker
            .publish(FragmentMessage::new("f", 1, Bytes::from_static(b"a")))
            .await
            .unwrap();
        broker
            .publish(FragmentMessage::new("f", 2, Bytes::from_static(b"b")))
            .await
            .unwrap();
        broker.notify_consumers().await;

        let seqs: Vec<u64> = broker.messages().await.iter().map(|m| m.sequence).collect();
        assert_eq!(seqs, [1, 2]);
        assert_eq!(broker.notifications(), 1);
    }

    #[tokio::test]
    async fn test_failing_at() {
        let broker = MemoryBroker::failing_at(2);
        assert!(broker.publish(FragmentMessage::new("f", 1, Bytes::new())).await.is_ok());
        assert!(broker.publish(FragmentMessage::new("f", 2, Bytes::new())).await.is_err());
        assert_eq!(broker.messages().await.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_broker_rejects_publish() {
        let broker = MemoryBroker::new();
        broker.close().await.unwrap();
        assert!(broker.is_closed());
        assert!(broker.publish(FragmentMessage::new("f", 1, Bytes::new())).await.is_err());
    }
}
