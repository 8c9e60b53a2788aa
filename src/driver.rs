//! Tick-driven simulation loop.
//!
//! The driver owns the clock. On every tick it pulls arrivals from the event
//! source, hands them to the scheduler, reports collisions, advances the
//! interrupt in service and, when the CPU is free, lets the main process run.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::device::Device;
use crate::engine::{Scheduler, SchedulerError};
use crate::scenario::{Scenario, ScenarioError};
use crate::source::{source_for, EventSource};
use crate::trace::{EventSink, Trace, TraceEvent, TraceKind};
use crate::types::{SimClock, Tick};

/// How often the running main process is reported, in main-process ticks.
const MAIN_HEARTBEAT_TICKS: u64 = 5;

/// How a simulation terminated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitKind {
    /// Ran for the configured number of ticks.
    #[default]
    Normal,
    /// Stopped after the configured number of serviced interrupts.
    InterruptLimit,
    /// A scheduler invariant was broken; the run was aborted.
    InvariantViolation(String),
}

/// Result of a run streamed into an arbitrary sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Ticks executed.
    pub ticks: Tick,
    /// Interrupts whose service completed.
    pub serviced: u64,
    pub exit_kind: ExitKind,
}

pub struct Simulator {
    scenario: Scenario,
}

impl Simulator {
    pub fn new(scenario: Scenario) -> Self {
        Simulator { scenario }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Run with the event source the scenario describes.
    pub fn run_scenario(&self) -> Result<Trace, ScenarioError> {
        self.scenario.validate()?;
        let mut source = source_for(&self.scenario)?;
        Ok(self.run(source.as_mut()))
    }

    /// Run against `source` and collect the trace.
    ///
    /// A scheduler invariant violation ends the run early; it is reported
    /// through [`Trace::exit_kind`].
    pub fn run<S: EventSource + ?Sized>(&self, source: &mut S) -> Trace {
        let mut trace = Trace::new();
        let result = self.run_with_sink(source, &mut trace);
        finish_trace(&mut trace, result);
        trace
    }

    /// Run against `source`, streaming every event into `sink`.
    pub fn run_with_sink<S, K>(&self, source: &mut S, sink: &mut K) -> Result<RunOutcome, SchedulerError>
    where
        S: EventSource + ?Sized,
        K: EventSink,
    {
        let max_ticks = self.scenario.max_ticks;
        let max_interrupts = self.scenario.max_interrupts;
        let mut clock = SimClock::new();
        let mut sched = Scheduler::new();
        let mut serviced = 0u64;
        let mut main_ticks = 0u64;

        info!(max_ticks, ?max_interrupts, "simulation start");

        let exit_kind = loop {
            let tick = clock.now();
            // Only reachable with a zero limit; later limits stop mid-tick.
            if max_interrupts.is_some_and(|max| serviced >= max) {
                break ExitKind::InterruptLimit;
            }
            if tick >= max_ticks {
                break ExitKind::Normal;
            }

            accept_arrivals(tick, source, &mut sched, sink);

            let busy = !sched.is_idle();
            if sched.advance(tick, sink).is_some() {
                serviced += 1;
                if max_interrupts.is_some_and(|max| serviced >= max) {
                    clock.advance();
                    break ExitKind::InterruptLimit;
                }
            }

            let started = if sched.is_idle() {
                sched.dispatch(tick, sink).inspect_err(|e| {
                    error!(tick, error = %e, "scheduler invariant violated, aborting");
                })?
            } else {
                None
            };

            if !busy && started.is_none() {
                if main_ticks % MAIN_HEARTBEAT_TICKS == 0 {
                    let pc = sched.context().pc();
                    debug!(tick, pc, "main process running");
                    sink.heartbeat(tick, pc);
                }
                sched.run_main();
                main_ticks += 1;
            }

            clock.advance();
        };

        let pending: Vec<Device> = sched.queue().ordered().iter().map(|r| r.device).collect();
        info!(
            ticks = clock.now(),
            serviced,
            ?pending,
            ?exit_kind,
            "simulation end"
        );
        Ok(RunOutcome {
            ticks: clock.now(),
            serviced,
            exit_kind,
        })
    }
}

/// Record how a run ended on its trace. A scheduler error aborts the run at
/// the tick it was raised in.
fn finish_trace(trace: &mut Trace, result: Result<RunOutcome, SchedulerError>) {
    match result {
        Ok(outcome) => trace.finish(outcome.ticks, outcome.exit_kind),
        Err(e) => {
            let SchedulerError::InvariantViolation { tick, .. } = e;
            trace.finish(tick + 1, ExitKind::InvariantViolation(e.to_string()));
        }
    }
}

/// Validate and queue this tick's arrivals, then report collisions.
///
/// Rejected arrivals are logged and dropped. A collision is reported whenever
/// two or more queued requests share the current arrival tick, even while
/// another interrupt is in service.
fn accept_arrivals<S, K>(tick: Tick, source: &mut S, sched: &mut Scheduler, sink: &mut K)
where
    S: EventSource + ?Sized,
    K: EventSink,
{
    let mut accepted = Vec::new();
    for arrival in source.generate_arrivals(tick) {
        if let Some(device) = Device::from_line(arrival.line) {
            if sched.queue().contains(device, tick) {
                debug!(tick, device = device.name(), "repeated request in one tick");
            }
        }
        match sched.submit(tick, arrival) {
            Ok(request) => accepted.push(request),
            Err(e) => {
                warn!(tick, line = arrival.line.0, error = %e, "arrival rejected");
                sink.record(TraceEvent {
                    tick,
                    kind: TraceKind::ArrivalRejected {
                        line: arrival.line,
                        reason: (&e).into(),
                    },
                });
            }
        }
    }

    let simultaneous = sched.queue().peek_simultaneous(tick);
    if simultaneous.len() > 1 {
        let devices: Vec<_> = simultaneous.iter().map(|r| r.device).collect();
        info!(tick, ?devices, "simultaneous interrupts");
        sink.record(TraceEvent {
            tick,
            kind: TraceKind::Collision { devices },
        });
    } else if let [request] = accepted.as_slice() {
        let pending = sched.queue().len();
        if !sched.is_idle() || pending > 1 {
            sink.record(TraceEvent {
                tick,
                kind: TraceKind::RequestQueued {
                    device: request.device,
                    pending,
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Arrival;
    use crate::source::ScriptedSource;

    fn scripted(arrivals: &[(Tick, Device, i64)]) -> ScriptedSource {
        arrivals
            .iter()
            .map(|&(t, d, n)| (t, Arrival::new(d, n)))
            .collect()
    }

    #[test]
    fn test_idle_run_emits_nothing() {
        let sim = Simulator::new(Scenario::builder().max_ticks(10).build());
        let trace = sim.run(&mut ScriptedSource::new());
        assert!(trace.events().is_empty());
        assert_eq!(trace.ticks(), 10);
        assert_eq!(trace.exit_kind(), &ExitKind::Normal);
    }

    #[test]
    fn test_interrupt_limit() {
        let sim = Simulator::new(Scenario::builder().max_ticks(100).max_interrupts(2).build());
        let mut source = scripted(&[
            (0, Device::Disk, 1),
            (0, Device::Printer, 1),
            (0, Device::Keyboard, 1),
        ]);
        let trace = sim.run(&mut source);
        assert_eq!(trace.exit_kind(), &ExitKind::InterruptLimit);
        assert_eq!(trace.service_order(), vec![Device::Keyboard, Device::Printer]);
        // Second service completes at tick 2; the run stops there.
        assert_eq!(trace.ticks(), 3);
        assert_eq!(trace.last_tick(), Some(2));
    }

    #[test]
    fn test_lone_arrival_behind_service_is_queued() {
        let sim = Simulator::new(Scenario::builder().max_ticks(10).build());
        let mut source = scripted(&[(0, Device::Disk, 3), (1, Device::Keyboard, 1)]);
        let trace = sim.run(&mut source);
        assert!(trace.events().contains(&TraceEvent {
            tick: 1,
            kind: TraceKind::RequestQueued {
                device: Device::Keyboard,
                pending: 1
            }
        }));
        assert_eq!(trace.service_order(), vec![Device::Disk, Device::Keyboard]);
    }

    #[test]
    fn test_run_with_sink_counts_services() {
        let sim = Simulator::new(Scenario::builder().max_ticks(20).build());
        let mut source = scripted(&[(1, Device::Printer, 2), (5, Device::Disk, 2)]);
        let mut events: Vec<TraceEvent> = Vec::new();
        let outcome = sim.run_with_sink(&mut source, &mut events).unwrap();
        assert_eq!(
            outcome,
            RunOutcome {
                ticks: 20,
                serviced: 2,
                exit_kind: ExitKind::Normal
            }
        );
        assert_eq!(events.iter().filter(|e| e.kind.name() == "SERVICE_DONE").count(), 2);
    }

    #[test]
    fn test_run_scenario_uses_scripted_arrivals() {
        let scenario = Scenario::builder()
            .max_ticks(10)
            .arrival(2, Device::Printer, 1)
            .build();
        let trace = Simulator::new(scenario).run_scenario().unwrap();
        assert_eq!(trace.service_order(), vec![Device::Printer]);
    }

    #[test]
    fn test_zero_interrupt_limit_stops_immediately() {
        let sim = Simulator::new(Scenario::builder().max_ticks(20).max_interrupts(0).build());
        let mut source = scripted(&[(0, Device::Disk, 1)]);
        let trace = sim.run(&mut source);
        assert_eq!(trace.exit_kind(), &ExitKind::InterruptLimit);
        assert!(trace.events().is_empty());
        assert_eq!(trace.ticks(), 0);

        let mut events: Vec<TraceEvent> = Vec::new();
        let outcome = sim
            .run_with_sink(&mut scripted(&[(0, Device::Disk, 1)]), &mut events)
            .unwrap();
        assert_eq!(outcome.serviced, 0);
        assert_eq!(outcome.exit_kind, ExitKind::InterruptLimit);
    }

    #[test]
    fn test_scheduler_error_aborts_trace() {
        let mut trace = Trace::new();
        let err = SchedulerError::InvariantViolation {
            tick: 7,
            state: "SERVICING",
            device: Device::Keyboard,
        };
        finish_trace(&mut trace, Err(err.clone()));

        assert_eq!(trace.ticks(), 8);
        assert_eq!(trace.exit_kind(), &ExitKind::InvariantViolation(err.to_string()));
    }

    #[test]
    fn test_heartbeat_every_five_main_ticks() {
        let sim = Simulator::new(Scenario::builder().max_ticks(20).build());
        // Ticks 3..=5 are spent servicing Printer.
        let trace = sim.run(&mut scripted(&[(3, Device::Printer, 2)]));
        // Main ticks 0, 5, 10 and 15 fall on ticks 0, 8, 13 and 18. The
        // three service ticks advanced pc by one.
        assert_eq!(trace.heartbeats(), &[(0, 0), (8, 6), (13, 11), (18, 16)]);
        assert_eq!(trace.count("MAIN_RESUMED"), 1);
    }
}
