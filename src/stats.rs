//! Aggregate statistics computed from a trace.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::device::Device;
use crate::trace::{Trace, TraceKind};
use crate::types::Tick;

/// Per-device service statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Interrupts whose service started.
    pub started: usize,
    /// Interrupts whose service completed.
    pub completed: usize,
    /// Sum of estimated service durations of started interrupts.
    pub service_ticks: u64,
    pub max_latency: Tick,
    total_latency: Tick,
}

impl DeviceStats {
    /// Mean ticks between arrival and service start.
    pub fn mean_latency(&self) -> Option<f64> {
        if self.started == 0 {
            return None;
        }
        Some(self.total_latency as f64 / self.started as f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimStats {
    pub per_device: BTreeMap<Device, DeviceStats>,
    /// Ticks in which the main process executed.
    pub main_ticks: u64,
    /// Ticks with two or more simultaneous arrivals.
    pub collisions: usize,
    pub rejected: usize,
    pub ticks: Tick,
}

impl SimStats {
    pub fn from_trace(trace: &Trace) -> Self {
        let mut per_device: BTreeMap<Device, DeviceStats> =
            Device::ALL.iter().map(|&d| (d, DeviceStats::default())).collect();
        let mut busy: BTreeSet<Tick> = BTreeSet::new();
        let mut collisions = 0;
        let mut rejected = 0;

        for event in trace.events() {
            match &event.kind {
                TraceKind::Collision { .. } => collisions += 1,
                TraceKind::ArrivalRejected { .. } => rejected += 1,
                TraceKind::ContextSaved { .. } => {
                    busy.insert(event.tick);
                }
                TraceKind::ServiceContinue { .. } => {
                    busy.insert(event.tick);
                }
                TraceKind::InterruptStart {
                    device,
                    duration,
                    latency,
                    ..
                } => {
                    let s = per_device.entry(*device).or_default();
                    s.started += 1;
                    s.service_ticks += u64::from(*duration);
                    s.total_latency += *latency;
                    s.max_latency = s.max_latency.max(*latency);
                }
                TraceKind::ServiceDone { device } => {
                    per_device.entry(*device).or_default().completed += 1;
                }
                TraceKind::RequestQueued { .. }
                | TraceKind::ContextRestored { .. }
                | TraceKind::MainResumed { .. } => {}
            }
        }

        SimStats {
            per_device,
            main_ticks: trace.ticks().saturating_sub(busy.len() as Tick),
            collisions,
            rejected,
            ticks: trace.ticks(),
        }
    }

    pub fn device(&self, device: Device) -> DeviceStats {
        self.per_device.get(&device).cloned().unwrap_or_default()
    }

    /// Interrupts whose service started, across all devices.
    pub fn total_interrupts(&self) -> usize {
        self.per_device.values().map(|s| s.started).sum()
    }

    pub fn total_service_ticks(&self) -> u64 {
        self.per_device.values().map(|s| s.service_ticks).sum()
    }
}

impl fmt::Display for SimStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "STATISTICS:")?;
        writeln!(f, "{}", "-".repeat(80))?;
        writeln!(f, "Total interrupts: {}", self.total_interrupts())?;
        for (device, s) in &self.per_device {
            let label = format!("{} ({} priority):", device, device.label());
            let latency = match s.mean_latency() {
                Some(mean) => format!("mean latency {mean:.2}u, max {}u", s.max_latency),
                None => "no service".to_string(),
            };
            writeln!(f, "  * {label:<28} {:3}  ({latency})", s.started)?;
        }
        writeln!(f)?;
        writeln!(f, "Total service time: {} units", self.total_service_ticks())?;
        writeln!(f, "Main process execution cycles: {}", self.main_ticks)?;
        writeln!(f, "Simultaneous interrupt cases: {}", self.collisions)?;
        write!(f, "Rejected arrivals: {}", self.rejected)
    }
}
