//! Interrupt scheduler and context-switch engine.
//!
//! The scheduler owns the pending queue and the main-process context and
//! drives each interrupt through a fixed lifecycle:
//!
//! ```text
//! Idle -> ContextSaved -> Servicing -> ContextRestored -> Idle
//! ```
//!
//! `ContextSaved` and `ContextRestored` are left within the same call that
//! enters them, so between calls the engine is either `Idle` or `Servicing`.
//! Service is non-preemptible: a request can only be started from `Idle`.

use std::fmt;

use tracing::{debug, trace};

use crate::context::Context;
use crate::device::Device;
use crate::queue::PendingQueue;
use crate::request::{Arrival, InterruptRequest, RequestError};
use crate::trace::{EventSink, TraceEvent, TraceKind};
use crate::types::{SeqNo, Tick};

/// Lifecycle state of the interrupt currently owning the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Idle,
    ContextSaved {
        request: InterruptRequest,
    },
    Servicing {
        request: InterruptRequest,
        remaining: u32,
    },
    ContextRestored {
        request: InterruptRequest,
    },
}

impl EngineState {
    pub fn name(&self) -> &'static str {
        match self {
            EngineState::Idle => "IDLE",
            EngineState::ContextSaved { .. } => "CONTEXT_SAVED",
            EngineState::Servicing { .. } => "SERVICING",
            EngineState::ContextRestored { .. } => "CONTEXT_RESTORED",
        }
    }

    /// Device in service, if any.
    pub fn device(&self) -> Option<Device> {
        match self {
            EngineState::Idle => None,
            EngineState::ContextSaved { request }
            | EngineState::Servicing { request, .. }
            | EngineState::ContextRestored { request } => Some(request.device),
        }
    }
}

/// Scheduler logic defects. Always fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Service of `device` was attempted while the engine was in `state`.
    InvariantViolation {
        tick: Tick,
        state: &'static str,
        device: Device,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::InvariantViolation {
                tick,
                state,
                device,
            } => write!(
                f,
                "tick {tick}: cannot start servicing {device} while engine is {state}"
            ),
        }
    }
}

impl std::error::Error for SchedulerError {}

#[derive(Debug, Default)]
pub struct Scheduler {
    queue: PendingQueue,
    context: Context,
    state: EngineState,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            queue: PendingQueue::new(),
            context: Context::new(),
            state: EngineState::Idle,
            next_seq: 0,
        }
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == EngineState::Idle
    }

    /// Validate an arrival and queue the resulting request.
    ///
    /// Sequence numbers are handed out in submission order, so requests of
    /// equal rank and tick are serviced first-come first-served.
    pub fn submit(&mut self, tick: Tick, arrival: Arrival) -> Result<InterruptRequest, RequestError> {
        let request = InterruptRequest::new(tick, arrival, SeqNo(self.next_seq))?;
        self.next_seq += 1;
        trace!(
            tick,
            device = request.device.name(),
            seq = request.seq.0,
            "enqueue"
        );
        self.queue.enqueue(request);
        Ok(request)
    }

    /// Start the next pending request if the engine is idle.
    ///
    /// Returns `Ok(None)` when nothing is pending; the main process keeps
    /// running in that case.
    pub fn dispatch(
        &mut self,
        tick: Tick,
        sink: &mut impl EventSink,
    ) -> Result<Option<InterruptRequest>, SchedulerError> {
        if let Some(next) = self.queue.peek() {
            if !self.is_idle() {
                return Err(SchedulerError::InvariantViolation {
                    tick,
                    state: self.state.name(),
                    device: next.device,
                });
            }
        }
        let Some(request) = self.queue.dequeue_next() else {
            return Ok(None);
        };
        self.begin_service(tick, request, sink)?;
        Ok(Some(request))
    }

    /// Move `request` through `Idle -> ContextSaved -> Servicing`.
    pub fn begin_service(
        &mut self,
        tick: Tick,
        request: InterruptRequest,
        sink: &mut impl EventSink,
    ) -> Result<(), SchedulerError> {
        if !self.is_idle() {
            return Err(SchedulerError::InvariantViolation {
                tick,
                state: self.state.name(),
                device: request.device,
            });
        }

        let device = request.device;
        let pc = self.context.save(tick);
        self.state = EngineState::ContextSaved { request };
        sink.record(TraceEvent {
            tick,
            kind: TraceKind::ContextSaved { device, pc },
        });

        let latency = tick.saturating_sub(request.arrival);
        self.state = EngineState::Servicing {
            request,
            remaining: request.duration,
        };
        debug!(
            tick,
            device = device.name(),
            pc,
            duration = request.duration,
            latency,
            "interrupt start"
        );
        sink.record(TraceEvent {
            tick,
            kind: TraceKind::InterruptStart {
                device,
                label: device.label(),
                duration: request.duration,
                latency,
            },
        });
        Ok(())
    }

    /// Spend one tick on the interrupt in service.
    ///
    /// When the last cycle is consumed the engine restores the context,
    /// resumes the main process and returns to `Idle` within the same tick.
    /// Returns the request that completed, if any.
    pub fn advance(
        &mut self,
        tick: Tick,
        sink: &mut impl EventSink,
    ) -> Option<InterruptRequest> {
        let EngineState::Servicing { request, remaining } = self.state else {
            return None;
        };
        let device = request.device;

        sink.record(TraceEvent {
            tick,
            kind: TraceKind::ServiceContinue { device, remaining },
        });
        let remaining = remaining.saturating_sub(1);
        if remaining > 0 {
            self.state = EngineState::Servicing { request, remaining };
            return None;
        }

        sink.record(TraceEvent {
            tick,
            kind: TraceKind::ServiceDone { device },
        });

        let (saved_pc, next_pc) = self.context.restore();
        self.state = EngineState::ContextRestored { request };
        sink.record(TraceEvent {
            tick,
            kind: TraceKind::ContextRestored {
                device,
                pc: saved_pc,
            },
        });

        self.context.resume();
        self.state = EngineState::Idle;
        debug!(tick, device = device.name(), next_pc, "main process resumed");
        sink.record(TraceEvent {
            tick,
            kind: TraceKind::MainResumed { next_pc },
        });
        Some(request)
    }

    /// Let the main process execute one instruction. Only valid while idle.
    pub(crate) fn run_main(&mut self) {
        debug_assert!(self.is_idle());
        self.context.step();
    }
}
