//! Command interpreter — decodes message bodies and sequences gate actions
//!
//! An open command runs as:
//!
//! 1. spawn the `before.jpg` capture (not awaited)
//! 2. pulse the relay and wait for it to finish
//! 3. wait `SETTLE_DELAY` for the gate to stop moving
//! 4. spawn the `after.jpg` capture (not awaited)
//!
//! The command is complete after step 3. A photo command captures
//! `after.jpg` and waits for the attempt to finish.

use crate::capture::EvidenceCapture;
use crate::error::Result;
use crate::relay::RelayController;
use crate::types::{Command, Envelope, Side, AFTER_PHOTO, BEFORE_PHOTO};
use std::sync::Arc;
use std::time::Duration;

/// Delay between the end of a pulse and the after photo
pub const SETTLE_DELAY: Duration = Duration::from_secs(15);

/// Decodes and executes gate commands
#[derive(Clone)]
pub struct CommandInterpreter {
    relay: Arc<RelayController>,
    evidence: EvidenceCapture,
}

impl CommandInterpreter {
    pub fn new(relay: Arc<RelayController>, evidence: EvidenceCapture) -> Self {
        Self { relay, evidence }
    }

    /// Decode a raw message body into a command
    ///
    /// Fails if the body is not JSON or has no string `Message` field.
    pub fn decode(body: &str) -> Result<Command> {
        let envelope = Envelope::from_body(body)?;
        Ok(Command::parse(&envelope.message))
    }

    /// Decode and execute a message body
    pub async fn handle(&self, body: &str) -> Result<Command> {
        let command = Self::decode(body)?;
        self.execute(&command).await?;
        Ok(command)
    }

    /// Execute a command
    ///
    /// Unrecognized commands do nothing and succeed, so their message is
    /// acknowledged instead of being redelivered forever.
    pub async fn execute(&self, command: &Command) -> Result<()> {
        match command {
            Command::PhotoOnly => {
                if let Err(e) = self.evidence.capture_and_store(AFTER_PHOTO).await {
                    tracing::error!(key = AFTER_PHOTO, error = %e, "Photo command capture failed");
                }
                Ok(())
            }
            Command::OpenSide(side) => self.open(*side).await,
            Command::Unrecognized(keyword) => {
                tracing::warn!(keyword = %keyword, "Ignoring unrecognized command");
                Ok(())
            }
        }
    }

    async fn open(&self, side: Side) -> Result<()> {
        self.evidence.spawn(BEFORE_PHOTO);

        self.relay.pulse(side).await?;

        tokio::time::sleep(SETTLE_DELAY).await;

        self.evidence.spawn(AFTER_PHOTO);
        tracing::info!(%side, "Open command complete");
        Ok(())
    }
}
