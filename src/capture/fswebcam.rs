//! `fswebcam` subprocess camera

use super::Camera;
use crate::error::{GateError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::process::Stdio;
use tokio::process::Command;

/// Default capture program
pub const FSWEBCAM_PROGRAM: &str = "fswebcam";

/// Upside-down mount, 640x360, JPEG quality 80, timestamp overlay, to stdout
pub const FSWEBCAM_ARGS: &[&str] = &[
    "-q",
    "--rotate",
    "180",
    "-r",
    "640x360",
    "--jpeg",
    "80",
    "--timestamp",
    "%D %T (%Z)",
    "-",
];

/// Camera that runs an external capture tool and reads the image from stdout
pub struct FsWebcam {
    program: String,
    args: Vec<String>,
}

impl FsWebcam {
    /// `fswebcam` with the fixed capture arguments
    pub fn new() -> Self {
        Self::with_command(FSWEBCAM_PROGRAM, FSWEBCAM_ARGS.iter().copied())
    }

    /// Any program that writes an image to stdout
    pub fn with_command<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Program and arguments, for logging
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for FsWebcam {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Camera for FsWebcam {
    async fn capture(&self) -> Result<Bytes> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GateError::Capture(format!("Failed to start {}: {}", self.program, e)))?;

        let pid = child.id();
        tracing::info!(command = %self.command_line(), ?pid, "Capture started");

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| GateError::Capture(format!("Failed to wait for {}: {}", self.program, e)))?;

        // A failing tool still yields whatever it wrote to stdout
        if output.status.success() {
            tracing::info!(?pid, size = output.stdout.len(), "Capture done");
        } else {
            tracing::warn!(
                ?pid,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Capture failed"
            );
        }

        Ok(Bytes::from(output.stdout))
    }

    fn name(&self) -> &str {
        "fswebcam"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_line() {
        let camera = FsWebcam::new();
        assert_eq!(
            camera.command_line(),
            "fswebcam -q --rotate 180 -r 640x360 --jpeg 80 --timestamp %D %T (%Z) -"
        );
    }

    #[tokio::test]
    async fn test_capture_reads_stdout() {
        let camera = FsWebcam::with_command("sh", ["-c", "printf 'JPEGDATA'"]);
        let image = camera.capture().await.unwrap();
        assert_eq!(image, Bytes::from_static(b"JPEGDATA"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_returns_partial_output() {
        let camera = FsWebcam::with_command("sh", ["-c", "printf 'partial'; echo oops >&2; exit 3"]);
        let image = camera.capture().await.unwrap();
        assert_eq!(image, Bytes::from_static(b"partial"));
    }

    #[tokio::test]
    async fn test_missing_program_is_capture_error() {
        let camera = FsWebcam::with_command("/nonexistent/a3s-gate-camera", Vec::<String>::new());
        let err = camera.capture().await.unwrap_err();
        assert!(matches!(err, GateError::Capture(ref m) if m.contains("Failed to start")));
    }
}
