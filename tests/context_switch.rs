//! Context save/restore, non-preemption and queue draining.

use irqsim::*;

mod common;

/// Between a CONTEXT_SAVED and its MAIN_RESUMED, no other context is saved.
fn assert_non_preemptive(trace: &Trace) {
    let mut in_service: Option<Device> = None;
    for event in trace.events() {
        match &event.kind {
            TraceKind::ContextSaved { device, .. } => {
                assert!(
                    in_service.is_none(),
                    "tick {}: {device} saved while {:?} in service",
                    event.tick,
                    in_service
                );
                in_service = Some(*device);
            }
            TraceKind::ServiceContinue { device, .. } | TraceKind::ServiceDone { device } => {
                assert_eq!(in_service, Some(*device), "tick {}", event.tick);
            }
            TraceKind::MainResumed { .. } => {
                assert!(in_service.take().is_some(), "tick {}", event.tick);
            }
            _ => {}
        }
    }
}

#[test]
fn test_no_preemption_by_higher_priority() {
    common::setup_test();

    // Keyboard arrives mid-way through a long Disk service.
    let trace = common::run_scripted(40, &[(0, Device::Disk, 6), (2, Device::Keyboard, 1)]);
    assert_non_preemptive(&trace);

    assert_eq!(trace.service_order(), vec![Device::Disk, Device::Keyboard]);
    assert!(trace.events().contains(&TraceEvent {
        tick: 6,
        kind: TraceKind::ContextSaved {
            device: Device::Keyboard,
            pc: 1
        }
    }));
}

/// Restoring resumes at the instruction after the one saved.
#[test]
fn test_restore_resumes_next_instruction() {
    common::setup_test();

    let trace = common::run_scripted(20, &[(4, Device::Printer, 2)]);

    // Ticks 0..=3 run the main process: pc is 4 when Printer arrives.
    let saved: Vec<_> = trace
        .events()
        .iter()
        .filter_map(|e| match e.kind {
            TraceKind::ContextSaved { pc, .. } => Some(pc),
            TraceKind::ContextRestored { pc, .. } => Some(pc),
            TraceKind::MainResumed { next_pc } => Some(next_pc),
            _ => None,
        })
        .collect();
    assert_eq!(saved, vec![4, 4, 5]);
}

#[test]
fn test_scheduler_context_after_service() {
    common::setup_test();

    let mut sched = Scheduler::new();
    let mut events: Vec<TraceEvent> = Vec::new();

    sched.submit(0, Arrival::new(Device::Keyboard, 2)).unwrap();
    sched.dispatch(0, &mut events).unwrap();
    assert_eq!(sched.context().status(), ContextStatus::Saved);
    assert_eq!(sched.context().saved_pc(), Some(0));
    assert_eq!(sched.state().device(), Some(Device::Keyboard));

    assert!(sched.advance(1, &mut events).is_none());
    let done = sched.advance(2, &mut events).unwrap();
    assert_eq!(done.device, Device::Keyboard);

    assert!(sched.is_idle());
    assert_eq!(sched.context().status(), ContextStatus::Running);
    assert_eq!(sched.context().pc(), 1);
}

/// Once the queue is empty and nothing is in service, no further events are
/// emitted.
#[test]
fn test_queue_drains() {
    common::setup_test();

    let trace = common::run_scripted(
        60,
        &[
            (3, Device::Disk, 2),
            (3, Device::Printer, 4),
            (3, Device::Keyboard, 3),
            (5, Device::Keyboard, 2),
            (6, Device::Disk, 3),
        ],
    );
    assert_non_preemptive(&trace);
    assert_eq!(trace.serviced_count(Device::Keyboard), 2);
    assert_eq!(trace.serviced_count(Device::Printer), 1);
    assert_eq!(trace.serviced_count(Device::Disk), 2);

    let last = trace.events().last().unwrap();
    assert!(matches!(last.kind, TraceKind::MainResumed { .. }));
    assert_eq!(last.tick, 17);
    assert_eq!(trace.ticks(), 60);

    // Services run back to back from tick 3 through tick 17.
    let stats = SimStats::from_trace(&trace);
    assert_eq!(stats.total_service_ticks(), 14);
    assert_eq!(stats.main_ticks, 60 - 15);
}

#[test]
fn test_bad_arrivals_are_rejected() {
    common::setup_test();

    let mut source = |tick: Tick| match tick {
        1 => vec![
            Arrival::on_line(IrqLine(5), Some(2)),
            Arrival::new(Device::Disk, 0),
            Arrival::new(Device::Printer, -3),
            Arrival::new(Device::Disk, 5_000_000_000),
            Arrival::new(Device::Keyboard, 1),
        ],
        _ => Vec::new(),
    };
    let sim = Simulator::new(Scenario::builder().max_ticks(10).build());
    let trace = sim.run(&mut source);

    assert_eq!(trace.count("ARRIVAL_REJECTED"), 4);
    assert_eq!(trace.count("COLLISION"), 0);
    assert_eq!(trace.service_order(), vec![Device::Keyboard]);
    assert!(trace.events().contains(&TraceEvent {
        tick: 1,
        kind: TraceKind::ArrivalRejected {
            line: IrqLine(5),
            reason: RejectReason::UnknownDevice
        }
    }));
    assert!(trace.events().contains(&TraceEvent {
        tick: 1,
        kind: TraceKind::ArrivalRejected {
            line: Device::Printer.line(),
            reason: RejectReason::NonPositiveDuration { duration: -3 }
        }
    }));
    assert!(trace.events().contains(&TraceEvent {
        tick: 1,
        kind: TraceKind::ArrivalRejected {
            line: Device::Disk.line(),
            reason: RejectReason::DurationOverflow {
                duration: 5_000_000_000
            }
        }
    }));
    assert_eq!(SimStats::from_trace(&trace).rejected, 4);
}

/// An arrival without a duration is serviced for the default number of
/// ticks.
#[test]
fn test_default_service_duration() {
    common::setup_test();

    let mut source = |tick: Tick| match tick {
        0 => vec![Arrival::on_line(Device::Disk.line(), None)],
        _ => Vec::new(),
    };
    let trace = Simulator::new(Scenario::builder().max_ticks(10).build()).run(&mut source);

    assert!(trace.events().contains(&TraceEvent {
        tick: DEFAULT_SERVICE_TICKS as Tick,
        kind: TraceKind::ServiceDone {
            device: Device::Disk
        }
    }));
}

#[test]
fn test_interrupt_limit_stops_run() {
    common::setup_test();

    let scenario = Scenario::builder()
        .max_ticks(60)
        .max_interrupts(1)
        .arrival(2, Device::Printer, 2)
        .arrival(2, Device::Disk, 1)
        .build();
    let trace = Simulator::new(scenario).run_scenario().unwrap();

    assert_eq!(trace.exit_kind(), &ExitKind::InterruptLimit);
    assert_eq!(trace.service_order(), vec![Device::Printer]);
    assert_eq!(trace.count("SERVICE_DONE"), 1);
    // Printer completes at tick 4; Disk is never started.
    assert_eq!(trace.ticks(), 5);
    assert_eq!(trace.last_tick(), Some(4));
}
