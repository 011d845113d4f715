//! Session abstractions over the broker client.
//!
//! The pipelines only talk to these traits. [`KafkaStore`](super::KafkaStore)
//! implements them on top of rdkafka; tests substitute in-memory sessions.

use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// A record read from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub headers: BTreeMap<String, String>,
    pub partition: i32,
    pub offset: i64,
}

/// A record to publish. Partition and offset are assigned by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRecord {
    pub key: String,
    pub value: Vec<u8>,
    pub headers: BTreeMap<String, String>,
}

/// A live consumer bound to one topic.
///
/// `read_next` must be cancel safe: dropping the future before it resolves
/// must not lose a record that was not yet returned.
#[async_trait]
pub trait ConsumerSession: Send {
    async fn read_next(&mut self) -> Result<Record>;

    /// Releases the session. Called exactly once on every exit path.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A live producer bound to one topic.
#[async_trait]
pub trait ProducerSession: Send {
    /// Publishes one record and waits for the broker acknowledgement.
    async fn write(&mut self, record: ProduceRecord) -> Result<()>;

    /// Flushes outstanding records and releases the session.
    async fn close(self: Box<Self>) -> Result<()>;

    /// Drops every record still queued or in flight, then releases the
    /// session. Used instead of `close` once a write failed or timed out, so
    /// nothing reported as unpublished reaches the broker later.
    async fn discard(self: Box<Self>) -> Result<()>;
}

/// Builds sessions from a fixed configuration.
///
/// Opening a session must not block on the network; connection problems
/// show up on the first read or write.
pub trait SessionFactory: Send + Sync {
    fn open_consumer(&self) -> Result<Box<dyn ConsumerSession>>;

    fn open_producer(&self) -> Result<Box<dyn ProducerSession>>;
}
