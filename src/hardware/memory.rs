//! In-memory GPIO driver for tests and dry runs
//!
//! Records every line write with a tokio timestamp so tests running on a
//! paused clock can assert on pulse timing.

use super::{GpioDriver, Level};
use crate::error::{GateError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::time::Instant;

/// A recorded line write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub channel: u32,
    pub level: Level,
    pub at: Instant,
}

#[derive(Default)]
struct MemoryGpioState {
    levels: HashMap<u32, Level>,
    transitions: Vec<Transition>,
    failing: HashSet<u32>,
    cleaned_up: bool,
}

/// In-memory GPIO driver
#[derive(Default)]
pub struct MemoryGpio {
    state: Mutex<MemoryGpioState>,
}

impl MemoryGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current level of a channel, if it was ever configured
    pub fn level(&self, channel: u32) -> Option<Level> {
        self.with_state(|s| s.levels.get(&channel).copied())
    }

    /// Every write so far, in order
    pub fn transitions(&self) -> Vec<Transition> {
        self.with_state(|s| s.transitions.clone())
    }

    /// Writes to one channel, in order
    pub fn transitions_for(&self, channel: u32) -> Vec<Transition> {
        self.with_state(|s| {
            s.transitions
                .iter()
                .filter(|t| t.channel == channel)
                .copied()
                .collect()
        })
    }

    /// Whether `cleanup()` has been called
    pub fn is_cleaned_up(&self) -> bool {
        self.with_state(|s| s.cleaned_up)
    }

    /// Make writes to a channel fail
    pub fn fail_channel(&self, channel: u32) {
        self.with_state(|s| {
            s.failing.insert(channel);
        })
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryGpioState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    fn record(&self, channel: u32, level: Level) -> Result<()> {
        self.with_state(|s| {
            if s.failing.contains(&channel) {
                return Err(GateError::Gpio {
                    channel,
                    reason: "injected failure".to_string(),
                });
            }
            s.levels.insert(channel, level);
            s.transitions.push(Transition {
                channel,
                level,
                at: Instant::now(),
            });
            Ok(())
        })
    }
}

impl GpioDriver for MemoryGpio {
    fn setup_output(&self, channel: u32, initial: Level) -> Result<()> {
        self.record(channel, initial)
    }

    fn write(&self, channel: u32, level: Level) -> Result<()> {
        if self.level(channel).is_none() {
            return Err(GateError::Gpio {
                channel,
                reason: "channel not configured as output".to_string(),
            });
        }
        self.record(channel, level)
    }

    fn cleanup(&self) -> Result<()> {
        self.with_state(|s| {
            s.levels.clear();
            s.cleaned_up = true;
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
