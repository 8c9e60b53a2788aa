//! Newtype wrappers and type aliases for domain concepts.
//!
//! IRQ lines and sequence numbers are newtypes so they cannot be mixed up
//! with ticks or durations. Plain quantities (ticks, program counter values)
//! are type aliases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One unit of the logical simulation clock.
pub type Tick = u64;

/// Program counter value of the main process (logical instruction index).
pub type Pc = u64;

/// Hardware interrupt line a device raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IrqLine(pub u8);

impl fmt::Display for IrqLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IRQ{}", self.0)
    }
}

/// Generation order of a request. Final tie-break in the pending queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct SeqNo(pub u64);

/// Monotonic tick counter owned by the simulation driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimClock {
    now: Tick,
}

impl SimClock {
    pub fn new() -> Self {
        Self { now: 0 }
    }

    /// Current tick.
    pub fn now(&self) -> Tick {
        self.now
    }

    /// Advance by one tick.
    pub fn advance(&mut self) {
        self.now = self.now.saturating_add(1);
    }
}
