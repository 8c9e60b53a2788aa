//! Structured event stream produced by the simulator.
//!
//! Every scheduler transition is recorded as a `TraceEvent` stamped with the
//! logical tick. The core only talks to an [`EventSink`]; rendering to text
//! lives in [`crate::fmt`].

use serde::Serialize;

use crate::device::{Device, PriorityLabel};
use crate::driver::ExitKind;
use crate::request::RequestError;
use crate::types::{IrqLine, Pc, Tick};

/// Consumer of the event stream.
pub trait EventSink {
    fn record(&mut self, event: TraceEvent);

    /// The main process is running at `tick` with program counter `pc`.
    /// Sampled periodically; not part of the event stream.
    fn heartbeat(&mut self, _tick: Tick, _pc: Pc) {}
}

impl EventSink for Vec<TraceEvent> {
    fn record(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn record(&mut self, event: TraceEvent) {
        (**self).record(event);
    }

    fn heartbeat(&mut self, tick: Tick, pc: Pc) {
        (**self).heartbeat(tick, pc);
    }
}

/// A single event in the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    pub tick: Tick,
    #[serde(flatten)]
    pub kind: TraceKind,
}

/// Why an arrival never became a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    UnknownDevice,
    NonPositiveDuration { duration: i64 },
    DurationOverflow { duration: i64 },
}

impl From<&RequestError> for RejectReason {
    fn from(err: &RequestError) -> Self {
        match err {
            RequestError::UnknownDevice(_) => RejectReason::UnknownDevice,
            RequestError::NonPositiveDuration { duration, .. } => {
                RejectReason::NonPositiveDuration {
                    duration: *duration,
                }
            }
            RequestError::DurationOverflow { duration, .. } => RejectReason::DurationOverflow {
                duration: *duration,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceKind {
    /// Two or more requests arrived at the same tick. Devices are listed in
    /// service order.
    Collision { devices: Vec<Device> },
    /// A lone arrival had to wait behind an in-service or pending interrupt.
    RequestQueued { device: Device, pending: usize },
    /// An arrival failed validation and was dropped.
    ArrivalRejected { line: IrqLine, reason: RejectReason },
    /// The main process was suspended and its program counter saved.
    ContextSaved { device: Device, pc: Pc },
    /// Service of an interrupt began.
    InterruptStart {
        device: Device,
        label: PriorityLabel,
        duration: u32,
        latency: Tick,
    },
    /// One more tick of service; `remaining` is counted before this tick.
    ServiceContinue { device: Device, remaining: u32 },
    ServiceDone { device: Device },
    /// Saved state restored; `pc` is the saved program counter.
    ContextRestored { device: Device, pc: Pc },
    /// The main process owns the CPU again and continues at `next_pc`.
    MainResumed { next_pc: Pc },
}

impl TraceKind {
    /// Stable upper-case name of the event kind.
    pub fn name(&self) -> &'static str {
        match self {
            TraceKind::Collision { .. } => "COLLISION",
            TraceKind::RequestQueued { .. } => "REQUEST_QUEUED",
            TraceKind::ArrivalRejected { .. } => "ARRIVAL_REJECTED",
            TraceKind::ContextSaved { .. } => "CONTEXT_SAVED",
            TraceKind::InterruptStart { .. } => "INTERRUPT_START",
            TraceKind::ServiceContinue { .. } => "SERVICE_CONTINUE",
            TraceKind::ServiceDone { .. } => "SERVICE_DONE",
            TraceKind::ContextRestored { .. } => "CONTEXT_RESTORED",
            TraceKind::MainResumed { .. } => "MAIN_RESUMED",
        }
    }

    /// Device the event refers to, if it refers to exactly one.
    pub fn device(&self) -> Option<Device> {
        match self {
            TraceKind::RequestQueued { device, .. }
            | TraceKind::ContextSaved { device, .. }
            | TraceKind::InterruptStart { device, .. }
            | TraceKind::ServiceContinue { device, .. }
            | TraceKind::ServiceDone { device }
            | TraceKind::ContextRestored { device, .. } => Some(*device),
            TraceKind::Collision { .. }
            | TraceKind::ArrivalRejected { .. }
            | TraceKind::MainResumed { .. } => None,
        }
    }
}

/// A complete simulation trace, in emission order.
#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    events: Vec<TraceEvent>,
    /// Number of ticks the driver executed.
    ticks: Tick,
    exit_kind: ExitKind,
    #[serde(skip)]
    heartbeats: Vec<(Tick, Pc)>,
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for Trace {
    fn record(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    fn heartbeat(&mut self, tick: Tick, pc: Pc) {
        self.heartbeats.push((tick, pc));
    }
}

impl Trace {
    pub fn new() -> Self {
        Trace {
            events: Vec::new(),
            ticks: 0,
            exit_kind: ExitKind::Normal,
            heartbeats: Vec::new(),
        }
    }

    pub(crate) fn finish(&mut self, ticks: Tick, exit_kind: ExitKind) {
        self.ticks = ticks;
        self.exit_kind = exit_kind;
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Number of ticks simulated.
    pub fn ticks(&self) -> Tick {
        self.ticks
    }

    pub fn exit_kind(&self) -> &ExitKind {
        &self.exit_kind
    }

    /// `(tick, pc)` samples of the running main process.
    pub fn heartbeats(&self) -> &[(Tick, Pc)] {
        &self.heartbeats
    }

    /// Devices in the order their service started.
    pub fn service_order(&self) -> Vec<Device> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                TraceKind::ContextSaved { device, .. } => Some(device),
                _ => None,
            })
            .collect()
    }

    /// `(tick, kind name)` pairs, the compact form used for comparing runs.
    pub fn kinds(&self) -> Vec<(Tick, &'static str)> {
        self.events.iter().map(|e| (e.tick, e.kind.name())).collect()
    }

    /// Count events whose kind has the given name.
    pub fn count(&self, name: &str) -> usize {
        self.events.iter().filter(|e| e.kind.name() == name).count()
    }

    /// Count completed services of a device.
    pub fn serviced_count(&self, device: Device) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::ServiceDone { device: d } if d == device))
            .count()
    }

    /// Tick of the last recorded event.
    pub fn last_tick(&self) -> Option<Tick> {
        self.events.last().map(|e| e.tick)
    }

    /// Write the trace as pretty-printed JSON.
    pub fn write_json(&self, writer: &mut impl std::io::Write) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, self)
    }

    /// Pretty-print the trace for debugging.
    pub fn dump(&self) {
        for event in &self.events {
            eprintln!("{}", crate::fmt::render_event(event));
        }
    }
}
