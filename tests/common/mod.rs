#![allow(dead_code)]

use irqsim::{Arrival, Device, Scenario, ScriptedSource, SimFormat, Simulator, Tick, Trace};

/// Initialize tracing from `RUST_LOG`.
///
/// `try_init()` is idempotent: the first call in the process installs the
/// subscriber, later calls are ignored.
pub fn setup_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .event_format(SimFormat)
        .try_init();
}

/// Build a scripted source from `(tick, device, duration)` triples. Triples
/// sharing a tick are generated in slice order.
pub fn scripted(arrivals: &[(Tick, Device, i64)]) -> ScriptedSource {
    arrivals
        .iter()
        .map(|&(tick, device, duration)| (tick, Arrival::new(device, duration)))
        .collect()
}

/// Run `arrivals` for `max_ticks` ticks and return the trace.
pub fn run_scripted(max_ticks: Tick, arrivals: &[(Tick, Device, i64)]) -> Trace {
    let scenario = Scenario::builder().max_ticks(max_ticks).build();
    Simulator::new(scenario).run(&mut scripted(arrivals))
}
