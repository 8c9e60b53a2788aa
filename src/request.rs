//! Interrupt requests and their arbitration order.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::types::{IrqLine, SeqNo, Tick};

/// Service duration used when an arrival carries no estimate.
pub const DEFAULT_SERVICE_TICKS: u32 = 3;

/// A device activation as signalled by an event source, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arrival {
    pub line: IrqLine,
    /// Estimated service duration in ticks. `None` selects
    /// [`DEFAULT_SERVICE_TICKS`].
    pub duration: Option<i64>,
}

impl Arrival {
    pub fn new(device: Device, duration: i64) -> Self {
        Arrival {
            line: device.line(),
            duration: Some(duration),
        }
    }

    /// Arrival on a raw IRQ line, which may not be wired to any device.
    pub fn on_line(line: IrqLine, duration: Option<i64>) -> Self {
        Arrival { line, duration }
    }
}

/// Reasons an arrival is rejected at request-creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// No device is wired to the signalled IRQ line.
    UnknownDevice(IrqLine),
    /// The estimated service duration is zero or negative.
    NonPositiveDuration { device: Device, duration: i64 },
    /// The estimated service duration does not fit in a `u32` tick count.
    DurationOverflow { device: Device, duration: i64 },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::UnknownDevice(line) => write!(f, "no device on {line}"),
            RequestError::NonPositiveDuration { device, duration } => {
                write!(f, "{device}: service duration must be positive, got {duration}")
            }
            RequestError::DurationOverflow { device, duration } => {
                write!(f, "{device}: service duration {duration} exceeds {} ticks", u32::MAX)
            }
        }
    }
}

impl std::error::Error for RequestError {}

/// A validated interrupt request. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InterruptRequest {
    pub device: Device,
    pub arrival: Tick,
    /// Service duration in ticks, always > 0.
    pub duration: u32,
    pub seq: SeqNo,
}

impl InterruptRequest {
    /// Validate an arrival into a request.
    pub fn new(arrival_tick: Tick, arrival: Arrival, seq: SeqNo) -> Result<Self, RequestError> {
        let device =
            Device::from_line(arrival.line).ok_or(RequestError::UnknownDevice(arrival.line))?;
        let duration = match arrival.duration {
            None => DEFAULT_SERVICE_TICKS,
            Some(d) if d <= 0 => {
                return Err(RequestError::NonPositiveDuration {
                    device,
                    duration: d,
                })
            }
            Some(d) => u32::try_from(d).map_err(|_| RequestError::DurationOverflow {
                device,
                duration: d,
            })?,
        };
        Ok(InterruptRequest {
            device,
            arrival: arrival_tick,
            duration,
            seq,
        })
    }

    pub fn rank(&self) -> u8 {
        self.device.rank()
    }

    /// Arbitration key: (rank, arrival tick, generation order).
    pub fn key(&self) -> (u8, Tick, SeqNo) {
        (self.rank(), self.arrival, self.seq)
    }
}

impl Ord for InterruptRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.arrival.cmp(&other.arrival))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for InterruptRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
