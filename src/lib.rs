//! # a3s-gate
//!
//! Queue-driven gate relay controller with before/after photo evidence.
//!
//! ## Overview
//!
//! `a3s-gate` long-polls a command queue, pulses one of two relay channels
//! for `left`/`right` commands, and uploads `before.jpg` / `after.jpg`
//! photos of the gate to object storage. Delivery is at-least-once: a
//! message is deleted only after its command completed, and every action is
//! safe to repeat.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_gate::{Gate, MemoryCamera, MemoryGpio, MemoryQueue, MemoryStorage};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> a3s_gate::Result<()> {
//! let queue = Arc::new(MemoryQueue::default());
//! queue.send(r#"{"Message":"photo"}"#);
//!
//! let gate = Gate::new(
//!     Arc::new(MemoryGpio::new()),
//!     Arc::new(MemoryCamera::default()),
//!     Arc::new(MemoryStorage::new()),
//!     queue,
//! );
//!
//! gate.run_until(tokio::time::sleep(Duration::from_secs(1))).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! - **sysfs** / **memory** — `GpioDriver` for the relay lines
//! - **fswebcam** / **memory** — `Camera` for evidence photos
//! - **s3** / **memory** — `StorageProvider` for uploads
//! - **sqs** / **memory** — `QueueProvider` for commands
//!
//! ## Architecture
//!
//! - **RelayController** — idempotent pulse on one side
//! - **EvidenceCapture** — capture + upload, awaited or detached
//! - **CommandInterpreter** — decode a body, sequence relay and captures
//! - **QueuePoller** — receive, spawn one task per message, delete on success
//! - **Gate** — hardware init, poll until shutdown, hardware release

pub mod capture;
pub mod config;
pub mod error;
pub mod hardware;
pub mod interpreter;
pub mod lifecycle;
pub mod poller;
pub mod provider;
pub mod relay;
pub mod types;

// Re-export core types
pub use capture::{Camera, EvidenceCapture};
pub use config::GateConfig;
pub use error::{GateError, Result};
pub use hardware::{GpioDriver, Level};
pub use interpreter::{CommandInterpreter, SETTLE_DELAY};
pub use lifecycle::{shutdown_signal, Gate, ShutdownReason};
pub use poller::{PollerEvent, PollerState, QueuePoller, StatsSnapshot};
pub use provider::{QueueProvider, StorageProvider, Visibility};
pub use relay::{RelayController, PULSE_DWELL};
pub use types::{Command, Envelope, QueueMessage, Side, AFTER_PHOTO, BEFORE_PHOTO};

// Re-export backends for convenience
pub use capture::fswebcam::FsWebcam;
pub use capture::memory::MemoryCamera;
pub use hardware::memory::MemoryGpio;
pub use hardware::sysfs::SysfsGpio;
pub use provider::aws::{S3Storage, SqsQueue};
pub use provider::memory::{MemoryQueue, MemoryQueueConfig, MemoryStorage};
