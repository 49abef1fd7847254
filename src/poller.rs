//! Queue poller — the receive / dispatch / acknowledge loop
//!
//! The poller long-polls the queue and spawns one detached task per message.
//! It never waits for a message to be handled before fetching the next
//! batch. A handling task deletes its message only after the command
//! executed successfully; on any failure the message stays on the queue and
//! is redelivered after the visibility timeout.

use crate::error::Result;
use crate::interpreter::CommandInterpreter;
use crate::provider::QueueProvider;
use crate::types::{Command, QueueMessage};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Long-poll wait per receive
pub const RECEIVE_WAIT_SECS: u64 = 20;

/// Messages requested per receive
pub const RECEIVE_BATCH_SIZE: usize = 10;

/// Pause before polling again after a failed receive
pub const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Poller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Dispatching,
    Draining,
    Stopped,
}

/// Poller events for monitoring
#[derive(Debug, Clone)]
pub enum PollerEvent {
    /// A message was received and a handling task spawned
    MessageReceived {
        receipt_handle: String,
        message_id: Option<String>,
    },
    /// A message was executed and deleted
    MessageHandled {
        receipt_handle: String,
        message_id: Option<String>,
        command: Command,
    },
    /// A message was left on the queue after a failure
    MessageFailed {
        receipt_handle: String,
        message_id: Option<String>,
        error: String,
    },
    /// A receive call failed
    ReceiveFailed { error: String },
    /// The loop has exited
    Stopped,
}

/// Running message counters
#[derive(Debug, Default)]
pub struct PollerStats {
    received: AtomicU64,
    handled: AtomicU64,
    failed: AtomicU64,
    receive_errors: AtomicU64,
}

/// Point-in-time copy of `PollerStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub handled: u64,
    pub failed: u64,
    pub receive_errors: u64,
}

impl PollerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
        }
    }
}

/// Long-polling message dispatcher
pub struct QueuePoller {
    queue: Arc<dyn QueueProvider>,
    interpreter: CommandInterpreter,
    state_tx: watch::Sender<PollerState>,
    event_tx: broadcast::Sender<PollerEvent>,
    stats: Arc<PollerStats>,
}

impl QueuePoller {
    pub fn new(queue: Arc<dyn QueueProvider>, interpreter: CommandInterpreter) -> Self {
        let (state_tx, _) = watch::channel(PollerState::Idle);
        let (event_tx, _) = broadcast::channel(100);
        Self {
            queue,
            interpreter,
            state_tx,
            event_tx,
            stats: Arc::new(PollerStats::default()),
        }
    }

    /// Current state
    pub fn state(&self) -> PollerState {
        *self.state_tx.borrow()
    }

    /// Watch state changes
    pub fn subscribe_state(&self) -> watch::Receiver<PollerState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to poller events
    pub fn subscribe(&self) -> broadcast::Receiver<PollerEvent> {
        self.event_tx.subscribe()
    }

    /// Current counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Poll until `shutdown` resolves
    ///
    /// Handling tasks still in flight at shutdown are abandoned, not
    /// awaited. Receive failures are logged and retried; nothing stops the
    /// loop except `shutdown`.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!(queue = self.queue.name(), "Pulling messages off the queue");

        loop {
            let polled = tokio::select! {
                _ = &mut shutdown => break,
                polled = self.poll_once() => polled,
            };

            if let Err(e) = polled {
                tracing::error!(error = %e, "Failed to receive messages");
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(RECEIVE_ERROR_BACKOFF) => {}
                }
            }
        }

        self.set_state(PollerState::Draining);
        tracing::info!(stats = ?self.stats(), "Poller draining; in-flight messages abandoned");
        self.set_state(PollerState::Stopped);
        let _ = self.event_tx.send(PollerEvent::Stopped);
        tracing::info!("Finished");
    }

    /// Receive one batch and spawn a handling task per message
    ///
    /// Returns the task handles; dropping them leaves the tasks running.
    pub async fn poll_once(&self) -> Result<Vec<JoinHandle<()>>> {
        self.set_state(PollerState::Polling);

        let batch = match self
            .queue
            .receive(RECEIVE_BATCH_SIZE, Duration::from_secs(RECEIVE_WAIT_SECS))
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                self.stats.receive_errors.fetch_add(1, Ordering::Relaxed);
                let _ = self.event_tx.send(PollerEvent::ReceiveFailed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        if batch.is_empty() {
            tracing::debug!("No messages in queue");
            return Ok(Vec::new());
        }

        self.set_state(PollerState::Dispatching);
        let handles = batch.into_iter().map(|msg| self.dispatch(msg)).collect();
        Ok(handles)
    }

    /// Spawn the handling task for one message
    fn dispatch(&self, msg: QueueMessage) -> JoinHandle<()> {
        tracing::info!(
            message_id = ?msg.message_id,
            body = %msg.body,
            "Message received"
        );
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        let _ = self.event_tx.send(PollerEvent::MessageReceived {
            receipt_handle: msg.receipt_handle.clone(),
            message_id: msg.message_id.clone(),
        });

        let queue = self.queue.clone();
        let interpreter = self.interpreter.clone();
        let event_tx = self.event_tx.clone();
        let stats = self.stats.clone();

        tokio::spawn(async move {
            match handle_message(queue.as_ref(), &interpreter, &msg).await {
                Ok(command) => {
                    tracing::info!(
                        message_id = ?msg.message_id,
                        %command,
                        "Message finished"
                    );
                    stats.handled.fetch_add(1, Ordering::Relaxed);
                    let _ = event_tx.send(PollerEvent::MessageHandled {
                        receipt_handle: msg.receipt_handle,
                        message_id: msg.message_id,
                        command,
                    });
                }
                Err(e) => {
                    tracing::error!(
                        message_id = ?msg.message_id,
                        receipt_handle = %msg.receipt_handle,
                        body = %msg.body,
                        error = %e,
                        detail = ?e,
                        "Message handling failed; leaving it on the queue"
                    );
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    let _ = event_tx.send(PollerEvent::MessageFailed {
                        receipt_handle: msg.receipt_handle,
                        message_id: msg.message_id,
                        error: e.to_string(),
                    });
                }
            }
        })
    }

    fn set_state(&self, state: PollerState) {
        self.state_tx.send_replace(state);
    }
}

/// Execute a message and delete it once the command has completed
async fn handle_message(
    queue: &dyn QueueProvider,
    interpreter: &CommandInterpreter,
    msg: &QueueMessage,
) -> Result<Command> {
    let command = interpreter.handle(&msg.body).await?;
    queue.delete(&msg.receipt_handle).await?;
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::memory::MemoryCamera;
    use crate::capture::EvidenceCapture;
    use crate::hardware::memory::MemoryGpio;
    use crate::provider::memory::{MemoryQueue, MemoryStorage};
    use crate::relay::RelayController;

    fn poller(queue: Arc<MemoryQueue>) -> QueuePoller {
        let gpio = Arc::new(MemoryGpio::new());
        let relay = Arc::new(RelayController::new(gpio));
        relay.init().unwrap();
        let evidence = EvidenceCapture::new(
            Arc::new(MemoryCamera::default()),
            Arc::new(MemoryStorage::new()),
        );
        QueuePoller::new(queue, CommandInterpreter::new(relay, evidence))
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_once_empty_queue() {
        let queue = Arc::new(MemoryQueue::default());
        let poller = poller(queue);

        let handles = poller.poll_once().await.unwrap();

        assert!(handles.is_empty());
        assert_eq!(poller.state(), PollerState::Polling);
        assert_eq!(poller.stats(), StatsSnapshot::default());
    }

    #[tokio::test]
    async fn test_poll_once_dispatches_each_message() {
        let queue = Arc::new(MemoryQueue::default());
        let photo = queue.send(r#"{"Message":"photo"}"#);
        let unknown = queue.send(r#"{"Message":"up"}"#);
        let broken = queue.send("not json");
        let poller = poller(queue.clone());

        let handles = poller.poll_once().await.unwrap();
        assert_eq!(handles.len(), 3);
        assert_eq!(poller.state(), PollerState::Dispatching);
        futures::future::join_all(handles).await;

        assert!(queue.is_deleted(&photo));
        assert!(queue.is_deleted(&unknown));
        assert!(!queue.is_deleted(&broken));
        assert_eq!(queue.len(), 1);

        let stats = poller.stats();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.handled, 2);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_delete_failure_counts_as_failed() {
        let queue = Arc::new(MemoryQueue::default());
        let id = queue.send(r#"{"Message":"photo"}"#);
        queue.fail_next_deletes(1);
        let poller = poller(queue.clone());
        let mut events = poller.subscribe();

        let handles = poller.poll_once().await.unwrap();
        futures::future::join_all(handles).await;

        assert!(!queue.is_deleted(&id));
        assert!(matches!(events.recv().await.unwrap(), PollerEvent::MessageReceived { .. }));
        match events.recv().await.unwrap() {
            PollerEvent::MessageFailed { message_id, error, .. } => {
                assert_eq!(message_id.as_deref(), Some(id.as_str()));
                assert!(error.contains("injected delete failure"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_poll_once_receive_failure() {
        let queue = Arc::new(MemoryQueue::default());
        queue.fail_next_receives(1);
        let poller = poller(queue);

        assert!(poller.poll_once().await.is_err());
        assert_eq!(poller.stats().receive_errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let queue = Arc::new(MemoryQueue::default());
        let poller = poller(queue);
        let mut states = poller.subscribe_state();
        assert_eq!(*states.borrow_and_update(), PollerState::Idle);

        poller.run(tokio::time::sleep(Duration::from_secs(45))).await;

        assert_eq!(poller.state(), PollerState::Stopped);
        assert!(states.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_receive_failures() {
        let queue = Arc::new(MemoryQueue::default());
        queue.fail_next_receives(3);
        let id = queue.send(r#"{"Message":"up"}"#);
        let poller = poller(queue.clone());

        poller.run(tokio::time::sleep(Duration::from_secs(60))).await;

        assert_eq!(poller.stats().receive_errors, 3);
        assert!(queue.is_deleted(&id));
    }
}
