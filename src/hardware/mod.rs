//! GPIO driver trait — the hardware seam for relay channels
//!
//! The relay board is active-low: `High` is idle, `Low` energizes the coil.
//! A single driver handle is created at process start and injected into
//! `RelayController`; nothing else writes to the lines.

use crate::error::Result;

pub mod memory;
pub mod sysfs;

/// Output line level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    High,
    Low,
}

impl Level {
    /// Sysfs `value` representation
    pub fn as_value(&self) -> &'static str {
        match self {
            Level::High => "1",
            Level::Low => "0",
        }
    }

    /// Sysfs `direction` representation (output with initial level)
    pub fn as_direction(&self) -> &'static str {
        match self {
            Level::High => "high",
            Level::Low => "low",
        }
    }
}

/// Core trait for GPIO backends
///
/// Writes are single-direction commands, never toggles, so repeating one
/// is harmless. Calls are synchronous: a line write is a few bytes to a
/// kernel file and must also be possible from `Drop`.
pub trait GpioDriver: Send + Sync {
    /// Configure a channel as an output, driven to `initial`
    fn setup_output(&self, channel: u32, initial: Level) -> Result<()>;

    /// Drive an output channel
    fn write(&self, channel: u32, level: Level) -> Result<()>;

    /// Release every channel configured by this driver
    fn cleanup(&self) -> Result<()>;

    /// Driver name (e.g., "sysfs", "memory")
    fn name(&self) -> &str;
}
