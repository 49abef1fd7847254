//! Process lifecycle — wiring, hardware init/release, shutdown signals

use crate::capture::fswebcam::FsWebcam;
use crate::capture::{Camera, EvidenceCapture};
use crate::config::GateConfig;
use crate::error::Result;
use crate::hardware::sysfs::SysfsGpio;
use crate::hardware::GpioDriver;
use crate::interpreter::CommandInterpreter;
use crate::poller::QueuePoller;
use crate::provider::aws::{self, S3Storage, SqsQueue};
use crate::provider::{QueueProvider, StorageProvider};
use crate::relay::RelayController;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Why the process is stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupt => f.write_str("interrupt"),
            ShutdownReason::Terminate => f.write_str("terminate"),
        }
    }
}

/// Wait for SIGINT or SIGTERM
pub async fn shutdown_signal() -> ShutdownReason {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        ShutdownReason::Interrupt
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
        ShutdownReason::Terminate
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<ShutdownReason>();

    tokio::select! {
        reason = ctrl_c => reason,
        reason = terminate => reason,
    }
}

/// The assembled gate controller
pub struct Gate {
    relay: Arc<RelayController>,
    poller: QueuePoller,
}

impl Gate {
    /// Assemble from explicit collaborators
    pub fn new(
        gpio: Arc<dyn GpioDriver>,
        camera: Arc<dyn Camera>,
        storage: Arc<dyn StorageProvider>,
        queue: Arc<dyn QueueProvider>,
    ) -> Self {
        let relay = Arc::new(RelayController::new(gpio));
        let evidence = EvidenceCapture::new(camera, storage);
        let interpreter = CommandInterpreter::new(relay.clone(), evidence);
        let poller = QueuePoller::new(queue, interpreter);
        Self { relay, poller }
    }

    /// Assemble the production stack: sysfs GPIO, fswebcam, S3 and SQS
    ///
    /// Touches no hardware; lines are configured by `run_until`.
    pub async fn connect(config: &GateConfig) -> Self {
        let sdk_config = aws::load_sdk_config().await;
        let queue = SqsQueue::from_config(&sdk_config, config.queue_url.clone());
        let storage = S3Storage::from_config(&sdk_config, config.s3_bucket.clone());

        tracing::info!(
            queue = %config.queue_url,
            bucket = %config.s3_bucket,
            "Gate assembled"
        );

        Self::new(
            Arc::new(SysfsGpio::new()),
            Arc::new(FsWebcam::new()),
            Arc::new(storage),
            Arc::new(queue),
        )
    }

    /// Get the relay controller
    pub fn relay(&self) -> &RelayController {
        &self.relay
    }

    /// Get the queue poller
    pub fn poller(&self) -> &QueuePoller {
        &self.poller
    }

    /// Drive both relays idle, poll until `shutdown`, then release hardware
    ///
    /// Hardware is released on every exit path, including a failed init or
    /// a panic. Only a failed init is returned as an error.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let _release = ReleaseGuard(self.relay.as_ref());

        self.relay.init()?;
        tracing::info!("Hardware initialized");

        self.poller.run(shutdown).await;
        Ok(())
    }
}

/// Releases the relay lines when dropped
struct ReleaseGuard<'a>(&'a RelayController);

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        match self.0.release() {
            Ok(()) => tracing::info!("Hardware released"),
            Err(e) => tracing::warn!(error = %e, "Failed to release hardware"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::memory::MemoryCamera;
    use crate::error::GateError;
    use crate::hardware::memory::MemoryGpio;
    use crate::hardware::Level;
    use crate::poller::PollerState;
    use crate::provider::memory::{MemoryQueue, MemoryStorage};
    use crate::relay::{LEFT_CHANNEL, RIGHT_CHANNEL};
    use crate::types::QueueMessage;
    use async_trait::async_trait;
    use futures::FutureExt;
    use std::panic::AssertUnwindSafe;
    use std::time::Duration;

    /// Queue backend that panics on receive
    struct CrashingQueue;

    #[async_trait]
    impl QueueProvider for CrashingQueue {
        async fn receive(
            &self,
            _max_messages: usize,
            _wait: Duration,
        ) -> Result<Vec<QueueMessage>> {
            panic!("queue backend crashed");
        }

        async fn delete(&self, _receipt_handle: &str) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "crashing"
        }
    }

    fn gate(gpio: Arc<MemoryGpio>, queue: Arc<MemoryQueue>) -> Gate {
        Gate::new(
            gpio,
            Arc::new(MemoryCamera::default()),
            Arc::new(MemoryStorage::new()),
            queue,
        )
    }

    #[test]
    fn test_shutdown_reason_display() {
        assert_eq!(ShutdownReason::Interrupt.to_string(), "interrupt");
        assert_eq!(ShutdownReason::Terminate.to_string(), "terminate");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_initializes_then_releases() {
        let gpio = Arc::new(MemoryGpio::new());
        let queue = Arc::new(MemoryQueue::default());
        let gate = gate(gpio.clone(), queue);

        tokio_test::assert_ok!(gate.run_until(tokio::time::sleep(Duration::from_secs(30))).await);

        let writes = gpio.transitions();
        assert_eq!(writes.len(), 2);
        assert!(writes.iter().all(|t| t.level == Level::High));
        assert_eq!(writes[0].channel, LEFT_CHANNEL);
        assert_eq!(writes[1].channel, RIGHT_CHANNEL);
        assert!(gpio.is_cleaned_up());
        assert_eq!(gate.poller().state(), PollerState::Stopped);
    }

    #[tokio::test]
    async fn test_init_failure_still_releases() {
        let gpio = Arc::new(MemoryGpio::new());
        gpio.fail_channel(RIGHT_CHANNEL);
        let gate = gate(gpio.clone(), Arc::new(MemoryQueue::default()));

        let err = tokio_test::assert_err!(gate.run_until(async {}).await);

        assert!(matches!(err, GateError::Gpio { channel: 25, .. }));
        assert!(gpio.is_cleaned_up());
        assert_eq!(gate.poller().state(), PollerState::Idle);
    }

    #[tokio::test]
    async fn test_panic_while_polling_still_releases() {
        let gpio = Arc::new(MemoryGpio::new());
        let gate = Gate::new(
            gpio.clone(),
            Arc::new(MemoryCamera::default()),
            Arc::new(MemoryStorage::new()),
            Arc::new(CrashingQueue),
        );

        let outcome = AssertUnwindSafe(gate.run_until(std::future::pending::<()>()))
            .catch_unwind()
            .await;

        assert!(outcome.is_err());
        assert!(gpio.is_cleaned_up());
        assert_eq!(gpio.level(LEFT_CHANNEL), None);
    }
}
