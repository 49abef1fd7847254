//! In-memory queue and storage providers
//!
//! `MemoryQueue` mimics SQS semantics closely enough to exercise the poller:
//! long-poll receive, per-delivery receipt handles, visibility timeout and
//! redelivery of messages that are never deleted. `MemoryStorage` keeps the
//! latest object per key plus an upload log.
//!
//! Timestamps use `tokio::time::Instant`, so tests on a paused clock see
//! deterministic timings.

use super::{QueueProvider, StorageProvider, Visibility};
use crate::error::{GateError, Result};
use crate::types::QueueMessage;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Configuration for `MemoryQueue`
#[derive(Debug, Clone)]
pub struct MemoryQueueConfig {
    /// How long a received message stays hidden before redelivery
    pub visibility_timeout: Duration,
}

impl Default for MemoryQueueConfig {
    fn default() -> Self {
        // SQS default
        Self {
            visibility_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    body: String,
    receive_count: u32,
    receipt_handle: Option<String>,
    invisible_until: Option<Instant>,
}

impl StoredMessage {
    fn is_visible(&self, now: Instant) -> bool {
        !matches!(self.invisible_until, Some(until) if until > now)
    }
}

#[derive(Default)]
struct QueueState {
    messages: Vec<StoredMessage>,
    deleted: Vec<String>,
}

/// In-memory at-least-once queue
pub struct MemoryQueue {
    config: MemoryQueueConfig,
    state: Mutex<QueueState>,
    notify: Notify,
    receive_failures: AtomicUsize,
    delete_failures: AtomicUsize,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(MemoryQueueConfig::default())
    }
}

impl MemoryQueue {
    pub fn new(config: MemoryQueueConfig) -> Self {
        Self {
            config,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            receive_failures: AtomicUsize::new(0),
            delete_failures: AtomicUsize::new(0),
        }
    }

    /// Enqueue a message body, returning its message id
    pub fn send(&self, body: impl Into<String>) -> String {
        let id = format!("msg-{}", uuid::Uuid::new_v4());
        self.with_state(|s| {
            s.messages.push(StoredMessage {
                id: id.clone(),
                body: body.into(),
                receive_count: 0,
                receipt_handle: None,
                invisible_until: None,
            })
        });
        self.notify.notify_waiters();
        id
    }

    /// Messages still on the queue (visible or in flight)
    pub fn len(&self) -> usize {
        self.with_state(|s| s.messages.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Message ids deleted so far, in order
    pub fn deleted(&self) -> Vec<String> {
        self.with_state(|s| s.deleted.clone())
    }

    /// Whether a message has been deleted
    pub fn is_deleted(&self, message_id: &str) -> bool {
        self.with_state(|s| s.deleted.iter().any(|id| id == message_id))
    }

    /// How many times a message has been delivered
    pub fn receive_count(&self, message_id: &str) -> Option<u32> {
        self.with_state(|s| {
            s.messages
                .iter()
                .find(|m| m.id == message_id)
                .map(|m| m.receive_count)
        })
    }

    /// Make the next `n` receives fail
    pub fn fail_next_receives(&self, n: usize) {
        self.receive_failures.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` deletes fail
    pub fn fail_next_deletes(&self, n: usize) {
        self.delete_failures.store(n, Ordering::SeqCst);
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut QueueState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Claim up to `max` visible messages, or report when the next hidden
    /// one becomes visible again
    fn claim(&self, max: usize) -> (Vec<QueueMessage>, Option<Instant>) {
        let now = Instant::now();
        let visibility_timeout = self.config.visibility_timeout;

        self.with_state(|s| {
            let mut batch = Vec::new();
            let mut next_visible: Option<Instant> = None;

            for msg in s.messages.iter_mut() {
                if batch.len() >= max {
                    break;
                }
                if !msg.is_visible(now) {
                    if let Some(until) = msg.invisible_until {
                        next_visible = Some(next_visible.map_or(until, |n| n.min(until)));
                    }
                    continue;
                }

                let handle = format!("rh-{}", uuid::Uuid::new_v4());
                msg.receive_count += 1;
                msg.receipt_handle = Some(handle.clone());
                msg.invisible_until = Some(now + visibility_timeout);

                batch.push(QueueMessage::new(handle, msg.body.clone()).with_message_id(&msg.id));
            }

            (batch, next_visible)
        })
    }
}

#[async_trait]
impl QueueProvider for MemoryQueue {
    async fn receive(&self, max_messages: usize, wait: Duration) -> Result<Vec<QueueMessage>> {
        if Self::take_failure(&self.receive_failures) {
            return Err(GateError::Queue("injected receive failure".to_string()));
        }

        let deadline = Instant::now() + wait;
        loop {
            let notified = self.notify.notified();
            let (batch, next_visible) = self.claim(max_messages.max(1));
            if !batch.is_empty() || Instant::now() >= deadline {
                return Ok(batch);
            }

            let wake = next_visible.map_or(deadline, |n| n.min(deadline));
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(wake) => {}
            }
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        if Self::take_failure(&self.delete_failures) {
            return Err(GateError::Queue("injected delete failure".to_string()));
        }

        self.with_state(|s| -> Result<()> {
            let pos = s
                .messages
                .iter()
                .position(|m| m.receipt_handle.as_deref() == Some(receipt_handle))
                .ok_or_else(|| {
                    GateError::Queue(format!("Receipt handle not found: {}", receipt_handle))
                })?;
            let msg = s.messages.remove(pos);
            s.deleted.push(msg.id);
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// A stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub visibility: Visibility,
    pub stored_at: Instant,
}

/// A recorded upload attempt
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub key: String,
    pub size: usize,
    pub succeeded: bool,
    pub at: Instant,
}

#[derive(Default)]
struct StorageState {
    objects: HashMap<String, StoredObject>,
    uploads: Vec<UploadRecord>,
    failing: bool,
}

/// In-memory object storage
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<StorageState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest object stored under `key`
    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.with_state(|s| s.objects.get(key).cloned())
    }

    /// Every upload attempt, in order
    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.with_state(|s| s.uploads.clone())
    }

    /// Upload attempts for one key, in order
    pub fn uploads_for(&self, key: &str) -> Vec<UploadRecord> {
        self.with_state(|s| s.uploads.iter().filter(|u| u.key == key).cloned().collect())
    }

    /// Make every upload fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.with_state(|s| s.failing = failing)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut StorageState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn put_object(&self, key: &str, body: Bytes, visibility: Visibility) -> Result<()> {
        let now = Instant::now();
        self.with_state(|s| {
            let succeeded = !s.failing;
            s.uploads.push(UploadRecord {
                key: key.to_string(),
                size: body.len(),
                succeeded,
                at: now,
            });

            if !succeeded {
                return Err(GateError::Storage {
                    key: key.to_string(),
                    reason: "injected upload failure".to_string(),
                });
            }

            s.objects.insert(
                key.to_string(),
                StoredObject {
                    body,
                    visibility,
                    stored_at: now,
                },
            );
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
