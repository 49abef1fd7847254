//! Queue and storage provider traits — the core abstractions for backends
//!
//! The poller only ever talks to a `QueueProvider` and the evidence capture
//! only to a `StorageProvider`, so the AWS backends can be swapped for the
//! in-memory ones without changing application code.

use crate::error::Result;
use crate::types::QueueMessage;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

pub mod aws;
pub mod memory;

/// Core trait for command queue backends
///
/// Delivery is at-least-once: a received message stays on the queue and
/// becomes visible again after the backend's visibility timeout unless it
/// is deleted with its receipt handle.
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Receive up to `max_messages`, waiting up to `wait` for the first one
    ///
    /// Returns an empty batch when the wait elapses without messages.
    async fn receive(&self, max_messages: usize, wait: Duration) -> Result<Vec<QueueMessage>>;

    /// Delete one delivery of a message
    async fn delete(&self, receipt_handle: &str) -> Result<()>;

    /// Provider name (e.g., "sqs", "memory")
    fn name(&self) -> &str;
}

/// Access level for stored objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Private,
    PublicRead,
}

/// Core trait for object storage backends
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Store `body` under `key`, replacing any existing object
    async fn put_object(&self, key: &str, body: Bytes, visibility: Visibility) -> Result<()>;

    /// Provider name (e.g., "s3", "memory")
    fn name(&self) -> &str;
}
