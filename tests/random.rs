//! Randomized runs checked against a reference model of the arbitration
//! rule.

use irqsim::*;

mod common;

struct Recorded {
    tick: Tick,
    device: Device,
    duration: u32,
}

/// Run `scenario` with its random source, recording every arrival.
fn run_recorded(scenario: &Scenario) -> (Trace, Vec<Recorded>) {
    let mut log = Vec::new();
    let mut random = RandomSource::new(scenario.seed, scenario).unwrap();
    let mut recording = |tick: Tick| {
        let arrivals = random.generate_arrivals(tick);
        for arrival in &arrivals {
            log.push(Recorded {
                tick,
                device: Device::from_line(arrival.line).unwrap(),
                duration: arrival.duration.unwrap() as u32,
            });
        }
        arrivals
    };
    let trace = Simulator::new(scenario.clone()).run(&mut recording);
    (trace, log)
}

/// Every service start picks the pending request with the lowest
/// (rank, arrival tick, generation order).
fn check_against_model(trace: &Trace, log: &[Recorded]) {
    let mut pending: Vec<usize> = Vec::new();
    let mut next = 0;
    let mut started: Option<usize> = None;

    for event in trace.events() {
        match &event.kind {
            TraceKind::ContextSaved { device, .. } => {
                while next < log.len() && log[next].tick <= event.tick {
                    pending.push(next);
                    next += 1;
                }
                let (pos, &idx) = pending
                    .iter()
                    .enumerate()
                    .min_by_key(|&(_, &i)| (log[i].device.rank(), log[i].tick, i))
                    .unwrap_or_else(|| panic!("tick {}: nothing pending", event.tick));
                assert_eq!(*device, log[idx].device, "tick {}", event.tick);
                pending.remove(pos);
                started = Some(idx);
            }
            TraceKind::InterruptStart {
                duration, latency, ..
            } => {
                let r = &log[started.unwrap()];
                assert_eq!(*duration, r.duration);
                assert_eq!(*latency, event.tick - r.tick);
            }
            _ => {}
        }
    }
}

#[test]
fn test_random_runs_follow_priority_rule() {
    common::setup_test();

    for seed in 0..100 {
        let scenario = Scenario::builder().max_ticks(120).seed(seed).build();
        let (trace, log) = run_recorded(&scenario);

        assert_eq!(trace.exit_kind(), &ExitKind::Normal, "seed {seed}");
        check_against_model(&trace, &log);

        // Every started interrupt except possibly the last completes.
        let starts = trace.count("CONTEXT_SAVED");
        let resumes = trace.count("MAIN_RESUMED");
        assert!(starts == resumes || starts == resumes + 1, "seed {seed}");
        assert_eq!(trace.count("SERVICE_DONE"), resumes);
        assert_eq!(trace.count("CONTEXT_RESTORED"), resumes);
    }
}

#[test]
fn test_heavy_load_starves_low_priority() {
    common::setup_test();

    // Keyboard fires on every tick and keeps the CPU busy forever.
    let scenario = Scenario::builder()
        .max_ticks(50)
        .seed(3)
        .device(
            Device::Keyboard,
            DeviceProfile {
                probability: 1.0,
                min_duration: 1,
                max_duration: 1,
                ..DeviceProfile::default()
            },
        )
        .build();
    let (trace, log) = run_recorded(&scenario);
    check_against_model(&trace, &log);

    assert!(trace.serviced_count(Device::Keyboard) > 40);
    assert_eq!(trace.serviced_count(Device::Disk), 0);
    assert_eq!(trace.serviced_count(Device::Printer), 0);
}

#[test]
fn test_disabled_devices_never_fire() {
    common::setup_test();

    let scenario = Scenario::builder()
        .max_ticks(200)
        .seed(11)
        .probability(0.5)
        .disable(Device::Keyboard)
        .disable(Device::Disk)
        .build();
    let (trace, log) = run_recorded(&scenario);

    assert!(!log.is_empty());
    assert!(log.iter().all(|r| r.device == Device::Printer));
    assert!(log.iter().all(|r| (2..=4).contains(&r.duration)));
    assert_eq!(trace.service_order().len(), trace.count("INTERRUPT_START"));
    assert!(trace
        .service_order()
        .iter()
        .all(|&d| d == Device::Printer));
}

#[test]
fn test_zero_probability_is_quiet() {
    common::setup_test();

    let scenario = Scenario::builder().max_ticks(100).probability(0.0).build();
    let trace = Simulator::new(scenario).run_scenario().unwrap();
    assert!(trace.events().is_empty());
    assert_eq!(SimStats::from_trace(&trace).main_ticks, 100);
}
