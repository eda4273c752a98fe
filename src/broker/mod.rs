//! Message broker seam for the ingest pipeline
//!
//! Submodules:
//! - `amqp`: durable AMQP queue with publisher confirms (lapin)
//! - `memory`: in-process broker recording every message
//! - `notify`: HTTP wake-up of the out-of-process consumers
//!
pub mod amqp;
pub mod memory;
pub mod notify;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

pub use amqp::{AmqpBroker, AmqpConfig};
pub use memory::MemoryBroker;
pub use notify::ConsumerNotifier;

pub type BrokerError = Box<dyn std::error::Error + Send + Sync>;

pub const HEADER_ID: &str = "id";
pub const HEADER_FRAGMENT_NUMBER: &str = "fragment_number";

/// One chunk of an upload, as handed to the broker.
#[derive(Debug, Clone)]
pub struct FragmentMessage {
    pub file_id: String,
    /// 1-based position of the chunk in the file.
    pub sequence: u64,
    pub payload: Bytes,
    pub durable: bool,
    pub timestamp: DateTime<Utc>,
}

impl FragmentMessage {
    pub fn new(file_id: impl Into<String>, sequence: u64, payload: Bytes) -> Self {
        Self {
            file_id: file_id.into(),
            sequence,
            payload,
            durable: true,
            timestamp: Utc::now(),
        }
    }

    /// `{id, fragment_number}` headers the consumer keys on.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            (HEADER_ID, self.file_id.clone()),
            (HEADER_FRAGMENT_NUMBER, self.sequence.to_string()),
        ]
    }
}

#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, message: FragmentMessage) -> Result<(), BrokerError>;

    /// Wakes the external consumers. Failures are logged, never returned.
    async fn notify_consumers(&self);

    /// Releases the connection to the broker. Called once, on shutdown.
    async fn close(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_headers() {
        let msg = FragmentMessage::new("abc", 12, Bytes::from_static(b"x"));
        assert!(msg.durable);
        assert_eq!(
            msg.headers(),
            vec![("id", "abc".to_string()), ("fragment_number", "12".to_string())]
        );
    }
}
