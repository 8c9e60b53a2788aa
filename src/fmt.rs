//! Text rendering of the event stream and the `tracing` formatter.

use std::fmt;
use std::io::{self, Write};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::device::Device;
use crate::driver::ExitKind;
use crate::scenario::Scenario;
use crate::stats::SimStats;
use crate::trace::{RejectReason, Trace, TraceEvent, TraceKind};
use crate::types::{Pc, Tick};

const RULE_WIDTH: usize = 80;

/// Tick stamp used as the prefix of every log line: `[Tick 09]`.
pub struct FmtTick(pub Tick);

impl fmt::Display for FmtTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Tick {:02}]", self.0)
    }
}

fn join_devices(devices: &[Device]) -> String {
    devices
        .iter()
        .map(|d| d.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Message text of an event, without the tick prefix.
pub fn describe(kind: &TraceKind) -> String {
    match kind {
        TraceKind::Collision { devices } => format!(
            "[!] MULTIPLE simultaneous interrupts: {} (priority test)",
            join_devices(devices)
        ),
        TraceKind::RequestQueued { device, pending } => {
            format!("[+] Interrupt from {device} added to queue ({pending} pending).")
        }
        TraceKind::ArrivalRejected { line, reason } => match reason {
            RejectReason::UnknownDevice => {
                format!("[x] Arrival on {line} rejected: no device on this line")
            }
            RejectReason::NonPositiveDuration { duration } => {
                format!("[x] Arrival on {line} rejected: non-positive duration {duration}")
            }
            RejectReason::DurationOverflow { duration } => {
                format!("[x] Arrival on {line} rejected: duration {duration} too large")
            }
        },
        TraceKind::ContextSaved { device, pc } => format!(
            "[*] Interrupt: {device} ({}) -> Saving context: PC={pc}, Status='saved'",
            device.line()
        ),
        TraceKind::InterruptStart {
            label,
            duration,
            latency,
            ..
        } => format!(
            "    -> Service start (Priority: {label}, Latency: {latency}u, {duration} cycles estimated)"
        ),
        TraceKind::ServiceContinue { device, remaining } => {
            format!("[>] Continuing service of {device} ({remaining} cycles remaining)")
        }
        TraceKind::ServiceDone { device } => format!("[OK] {device} interrupt handled."),
        TraceKind::ContextRestored { pc, .. } => format!("    -> Restoring context (PC={pc})."),
        TraceKind::MainResumed { next_pc } => {
            format!("[<] Main process resumed (next instruction: {next_pc})")
        }
    }
}

/// One log line: `[Tick 09] - <message>`.
pub fn render_event(event: &TraceEvent) -> String {
    format!("{} - {}", FmtTick(event.tick), describe(&event.kind))
}

/// Report line for a main-process heartbeat sample.
pub fn render_heartbeat(tick: Tick, pc: Pc) -> String {
    format!("{} - [ ] Main process running (PC={pc})", FmtTick(tick))
}

fn rule(w: &mut impl Write, ch: char) -> io::Result<()> {
    writeln!(w, "{}", ch.to_string().repeat(RULE_WIDTH))
}

/// Write the full simulation report: header, legend, event log and
/// statistics.
pub fn write_report(w: &mut impl Write, scenario: &Scenario, trace: &Trace) -> io::Result<()> {
    rule(w, '=')?;
    writeln!(w, "I/O MANAGEMENT SIMULATION WITH INTERRUPTS")?;
    rule(w, '=')?;
    writeln!(w, "Simulated time: {} units", trace.ticks())?;
    if scenario.is_scripted() {
        writeln!(w, "Arrivals: scripted ({})", scenario.arrivals.len())?;
    } else {
        writeln!(w, "Seed: {}", scenario.seed)?;
        for device in Device::ALL {
            let p = scenario.profile(device);
            if p.enabled {
                writeln!(
                    w,
                    "Interrupt probability ({device}): {:.0}%, service {}..={} cycles",
                    p.probability * 100.0,
                    p.min_duration,
                    p.max_duration
                )?;
            }
        }
    }
    rule(w, '=')?;
    writeln!(w)?;

    writeln!(w, "LEGEND:")?;
    writeln!(w, "  [!]  = Multiple simultaneous interrupts (priority test)")?;
    writeln!(w, "  [+]  = Interrupt added to the waiting queue")?;
    writeln!(w, "  [x]  = Arrival rejected")?;
    writeln!(w, "  [*]  = Interrupt being processed")?;
    writeln!(w, "  [>]  = Service continues")?;
    writeln!(w, "  [OK] = Interrupt finished")?;
    writeln!(w, "  [<]  = Main process resumed")?;
    writeln!(w, "  [ ]  = Main process running normally")?;
    rule(w, '=')?;
    writeln!(w)?;

    writeln!(w, "EVENT LOG:")?;
    rule(w, '-')?;
    writeln!(w, "{} - [INIT] Simulation started.", FmtTick(0))?;
    // Heartbeats fall on ticks without service, so they slot in after every
    // event of an earlier or equal tick.
    let mut heartbeats = trace.heartbeats().iter().peekable();
    for event in trace.events() {
        while let Some(&(tick, pc)) = heartbeats.next_if(|&&(t, _)| t < event.tick) {
            writeln!(w, "{}", render_heartbeat(tick, pc))?;
        }
        writeln!(w, "{}", render_event(event))?;
    }
    for &(tick, pc) in heartbeats {
        writeln!(w, "{}", render_heartbeat(tick, pc))?;
    }
    match trace.exit_kind() {
        ExitKind::InvariantViolation(msg) => {
            writeln!(w, "{} - [ABORT] {msg}", FmtTick(trace.ticks()))?
        }
        ExitKind::InterruptLimit => writeln!(
            w,
            "{} - [END] Interrupt limit reached.",
            FmtTick(trace.ticks())
        )?,
        ExitKind::Normal => writeln!(w, "{} - [END] Simulation finished.", FmtTick(trace.ticks()))?,
    }
    writeln!(w)?;

    rule(w, '=')?;
    writeln!(w, "{}", SimStats::from_trace(trace))?;
    rule(w, '=')
}

/// Event formatter that stamps diagnostics with the simulated tick instead
/// of wall-clock time.
///
/// Events carrying a `tick` field are prefixed with it; the field itself is
/// not repeated in the key=value list.
pub struct SimFormat;

impl<S, N> FormatEvent<S, N> for SimFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = FieldCollector::default();
        event.record(&mut visitor);

        match visitor.tick {
            Some(tick) => write!(writer, "[{tick:>6}] ")?,
            None => write!(writer, "[{:>6}] ", "-")?,
        }

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::ERROR => "\x1b[31m",
                Level::WARN => "\x1b[33m",
                Level::INFO => "\x1b[32m",
                Level::DEBUG => "\x1b[34m",
                Level::TRACE => "\x1b[35m",
            };
            write!(writer, "{color}{level:>5}\x1b[0m ")?;
        } else {
            write!(writer, "{level:>5} ")?;
        }

        write!(writer, "{}", visitor.message)?;
        for (key, value) in &visitor.fields {
            write!(writer, " {key}={value}")?;
        }
        writeln!(writer)
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    tick: Option<u64>,
    fields: Vec<(String, String)>,
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .push((field.name().to_string(), format!("{value:?}")));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "tick" {
            self.tick = Some(value);
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .push((field.name().to_string(), value.to_string()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .push((field.name().to_string(), value.to_string()));
    }
}
