//! irqsim - Deterministic tick-based simulator for interrupt arbitration.
//!
//! A single main process runs on one CPU and is interrupted by peripheral
//! devices of fixed priority. Simultaneous requests are serialized by
//! priority, each interrupt is serviced non-preemptively between a context
//! save and restore, and every transition is recorded as a structured event.
//!
//! # Architecture
//!
//! - **Device registry**: closed set of devices with rank, label and IRQ line
//! - **Pending queue**: requests ordered by (rank, arrival tick, generation order)
//! - **Scheduler**: context-switch state machine owning the queue and context
//! - **Driver**: tick loop feeding arrivals from an event source to the scheduler
//! - **Trace**: structured event stream, statistics and text rendering
//!
//! # Usage
//!
//! ```rust
//! use irqsim::*;
//!
//! let scenario = Scenario::builder()
//!     .max_ticks(20)
//!     .arrival(9, Device::Keyboard, 3)
//!     .arrival(9, Device::Disk, 2)
//!     .build();
//!
//! let trace = Simulator::new(scenario).run_scenario().unwrap();
//! assert_eq!(trace.service_order(), vec![Device::Keyboard, Device::Disk]);
//! ```

pub mod context;
pub mod device;
pub mod driver;
pub mod engine;
pub mod fmt;
pub mod queue;
pub mod request;
pub mod scenario;
pub mod source;
pub mod stats;
pub mod trace;
pub mod types;

// Re-export the main public types for convenience.
pub use context::{Context, ContextStatus};
pub use device::{priority_of, Device, PriorityLabel};
pub use driver::{ExitKind, RunOutcome, Simulator};
pub use engine::{EngineState, Scheduler, SchedulerError};
pub use fmt::{render_event, render_heartbeat, write_report, SimFormat};
pub use queue::PendingQueue;
pub use request::{Arrival, InterruptRequest, RequestError, DEFAULT_SERVICE_TICKS};
pub use scenario::{load_scenario, DeviceProfile, Scenario, ScenarioError};
pub use source::{EventSource, RandomSource, ScriptedSource};
pub use stats::{DeviceStats, SimStats};
pub use trace::{EventSink, RejectReason, Trace, TraceEvent, TraceKind};
pub use types::{IrqLine, Pc, SeqNo, SimClock, Tick};
