//! Relay controller — pulses one side of the gate actuator
//!
//! Each side owns one active-low output line. A pulse drives the line LOW,
//! holds it for `PULSE_DWELL`, then drives it HIGH again. Pulses on the same
//! side are not serialized: overlapping pulses only lengthen the active
//! window, because every write is an absolute level.

use crate::error::Result;
use crate::hardware::{GpioDriver, Level};
use crate::types::Side;
use std::sync::Arc;
use std::time::Duration;

/// How long a pulse keeps the relay energized
pub const PULSE_DWELL: Duration = Duration::from_secs(2);

/// BCM pin driving the left relay
pub const LEFT_CHANNEL: u32 = 24;

/// BCM pin driving the right relay
pub const RIGHT_CHANNEL: u32 = 25;

/// Owner of the two relay output lines
pub struct RelayController {
    gpio: Arc<dyn GpioDriver>,
}

impl RelayController {
    /// Create a controller over an injected driver handle
    pub fn new(gpio: Arc<dyn GpioDriver>) -> Self {
        Self { gpio }
    }

    /// Output line for a side
    pub fn channel(side: Side) -> u32 {
        match side {
            Side::Left => LEFT_CHANNEL,
            Side::Right => RIGHT_CHANNEL,
        }
    }

    /// Configure both lines as outputs and drive them idle (HIGH)
    pub fn init(&self) -> Result<()> {
        for side in Side::ALL {
            let channel = Self::channel(side);
            self.gpio.setup_output(channel, Level::High)?;
            tracing::info!(%side, channel, driver = self.gpio.name(), "Relay channel idle");
        }
        Ok(())
    }

    /// Energize a side for the dwell time, then return it to idle
    ///
    /// The line is driven HIGH again even if this future is dropped
    /// mid-dwell.
    pub async fn pulse(&self, side: Side) -> Result<()> {
        let channel = Self::channel(side);

        let guard = IdleGuard {
            gpio: self.gpio.as_ref(),
            channel,
            armed: true,
        };

        self.gpio.write(channel, Level::Low)?;
        tracing::info!(%side, channel, "Relay energized");

        tokio::time::sleep(PULSE_DWELL).await;

        guard.release()?;
        tracing::info!(%side, channel, "Relay released");
        Ok(())
    }

    /// Release every line via the driver's cleanup
    pub fn release(&self) -> Result<()> {
        self.gpio.cleanup()
    }

    /// Get the underlying driver
    pub fn driver(&self) -> &dyn GpioDriver {
        self.gpio.as_ref()
    }
}

/// Drives a channel HIGH when dropped, unless already released
struct IdleGuard<'a> {
    gpio: &'a dyn GpioDriver,
    channel: u32,
    armed: bool,
}

impl IdleGuard<'_> {
    fn release(mut self) -> Result<()> {
        self.armed = false;
        self.gpio.write(self.channel, Level::High)
    }
}

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.gpio.write(self.channel, Level::High) {
            tracing::error!(channel = self.channel, error = %e, "Failed to return relay to idle");
        }
    }
}
