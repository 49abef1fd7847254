//! In-memory camera for tests and dry runs

use super::Camera;
use crate::error::{GateError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Camera returning a fixed image, optionally after a delay or with an error
pub struct MemoryCamera {
    image: Bytes,
    delay: Duration,
    failing: bool,
    captures: Mutex<Vec<Instant>>,
}

impl Default for MemoryCamera {
    fn default() -> Self {
        Self::with_image(Bytes::from_static(b"\xff\xd8\xff\xe0memory-camera\xff\xd9"))
    }
}

impl MemoryCamera {
    /// Camera returning `image` on every capture
    pub fn with_image(image: impl Into<Bytes>) -> Self {
        Self {
            image: image.into(),
            delay: Duration::ZERO,
            failing: false,
            captures: Mutex::new(Vec::new()),
        }
    }

    /// Camera whose every capture fails
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Take `delay` to produce each image
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of captures started
    pub fn capture_count(&self) -> usize {
        self.captures().len()
    }

    /// Start time of every capture, in order
    pub fn captures(&self) -> Vec<Instant> {
        self.captures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Camera for MemoryCamera {
    async fn capture(&self) -> Result<Bytes> {
        self.captures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Instant::now());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing {
            return Err(GateError::Capture("injected capture failure".to_string()));
        }
        Ok(self.image.clone())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
