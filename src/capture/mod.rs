//! Evidence capture — take a photo and upload it under a logical name
//!
//! Captures are best-effort. `EvidenceCapture::spawn` runs one as a detached
//! task whose failure is logged and dropped, so a broken camera or an
//! unreachable bucket never holds up the relay or the queue acknowledgement.

use crate::error::Result;
use crate::provider::{StorageProvider, Visibility};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub mod fswebcam;
pub mod memory;

/// Image source
#[async_trait]
pub trait Camera: Send + Sync {
    /// Capture one image and return its raw bytes
    ///
    /// The bytes are not validated and may be empty.
    async fn capture(&self) -> Result<Bytes>;

    /// Camera name (e.g., "fswebcam", "memory")
    fn name(&self) -> &str;
}

/// Capture-then-upload unit of work
#[derive(Clone)]
pub struct EvidenceCapture {
    camera: Arc<dyn Camera>,
    storage: Arc<dyn StorageProvider>,
}

impl EvidenceCapture {
    pub fn new(camera: Arc<dyn Camera>, storage: Arc<dyn StorageProvider>) -> Self {
        Self { camera, storage }
    }

    /// Capture an image and store it publicly readable under `name`
    ///
    /// No timeout is applied; a hung camera stalls only the caller.
    pub async fn capture_and_store(&self, name: &str) -> Result<()> {
        let image = self.camera.capture().await?;
        let size = image.len();
        if size == 0 {
            tracing::warn!(key = name, camera = self.camera.name(), "Captured an empty image");
        }

        self.storage
            .put_object(name, image, Visibility::PublicRead)
            .await?;

        tracing::info!(key = name, size, storage = self.storage.name(), "Uploaded");
        Ok(())
    }

    /// Run `capture_and_store` as a detached task
    ///
    /// Errors are logged inside the task. The handle may be dropped.
    pub fn spawn(&self, name: impl Into<String>) -> JoinHandle<()> {
        let this = self.clone();
        let name = name.into();
        tokio::spawn(async move {
            if let Err(e) = this.capture_and_store(&name).await {
                tracing::error!(key = %name, error = %e, "Evidence capture failed");
            }
        })
    }
}
