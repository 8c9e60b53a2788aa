//! Scenario definition, builder API and JSON loading.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::device::Device;
use crate::types::Tick;

/// Default PRNG seed used when no seed is specified.
pub const DEFAULT_SEED: u64 = 42;

/// Default run length in ticks.
pub const DEFAULT_MAX_TICKS: Tick = 60;

/// Default per-tick activation probability of each device.
pub const DEFAULT_PROBABILITY: f64 = 0.25;

/// How a device behaves under the random event source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    pub enabled: bool,
    /// Chance that the device raises an interrupt on any given tick.
    pub probability: f64,
    /// Inclusive service duration range in ticks.
    pub min_duration: u32,
    pub max_duration: u32,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        DeviceProfile {
            enabled: true,
            probability: DEFAULT_PROBABILITY,
            min_duration: 2,
            max_duration: 4,
        }
    }
}

impl DeviceProfile {
    pub fn validate(&self, device: Device) -> Result<(), ScenarioError> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(ScenarioError::InvalidValue(format!(
                "{device}: probability must be within [0, 1], got {}",
                self.probability
            )));
        }
        if self.min_duration == 0 {
            return Err(ScenarioError::InvalidValue(format!(
                "{device}: min_duration must be positive"
            )));
        }
        if self.min_duration > self.max_duration {
            return Err(ScenarioError::InvalidValue(format!(
                "{device}: min_duration ({}) exceeds max_duration ({})",
                self.min_duration, self.max_duration
            )));
        }
        Ok(())
    }
}

/// A fixed arrival in a scripted scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedArrival {
    pub tick: Tick,
    pub device: Device,
    #[serde(default)]
    pub duration: Option<i64>,
}

/// Errors from building or loading a scenario.
#[derive(Debug)]
pub enum ScenarioError {
    Json(serde_json::Error),
    InvalidValue(String),
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioError::Json(e) => write!(f, "JSON parse error: {e}"),
            ScenarioError::InvalidValue(msg) => write!(f, "invalid value: {msg}"),
        }
    }
}

impl std::error::Error for ScenarioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScenarioError::Json(e) => Some(e),
            ScenarioError::InvalidValue(_) => None,
        }
    }
}

impl From<serde_json::Error> for ScenarioError {
    fn from(e: serde_json::Error) -> Self {
        ScenarioError::Json(e)
    }
}

/// A complete simulation configuration.
///
/// When `arrivals` is non-empty the run replays exactly those arrivals;
/// otherwise devices fire at random according to their profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    /// Stop after this many ticks.
    pub max_ticks: Tick,
    /// Stop once this many interrupts have been fully serviced.
    pub max_interrupts: Option<u64>,
    pub seed: u64,
    pub devices: BTreeMap<Device, DeviceProfile>,
    pub arrivals: Vec<ScriptedArrival>,
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario {
            max_ticks: DEFAULT_MAX_TICKS,
            max_interrupts: None,
            seed: DEFAULT_SEED,
            devices: Device::ALL
                .iter()
                .map(|&d| (d, DeviceProfile::default()))
                .collect(),
            arrivals: Vec::new(),
        }
    }
}

impl Scenario {
    pub fn builder() -> ScenarioBuilder {
        ScenarioBuilder {
            scenario: Scenario::default(),
        }
    }

    /// Profile of `device`. Devices missing from the map are disabled.
    pub fn profile(&self, device: Device) -> DeviceProfile {
        self.devices.get(&device).copied().unwrap_or(DeviceProfile {
            enabled: false,
            ..DeviceProfile::default()
        })
    }

    pub fn is_scripted(&self) -> bool {
        !self.arrivals.is_empty()
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        for (&device, profile) in &self.devices {
            profile.validate(device)?;
        }
        if self.max_interrupts == Some(0) {
            return Err(ScenarioError::InvalidValue(
                "max_interrupts must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing scenarios.
pub struct ScenarioBuilder {
    scenario: Scenario,
}

impl ScenarioBuilder {
    pub fn max_ticks(mut self, ticks: Tick) -> Self {
        self.scenario.max_ticks = ticks;
        self
    }

    pub fn max_interrupts(mut self, n: u64) -> Self {
        self.scenario.max_interrupts = Some(n);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.scenario.seed = seed;
        self
    }

    /// Set the activation probability of every device.
    pub fn probability(mut self, p: f64) -> Self {
        for profile in self.scenario.devices.values_mut() {
            profile.probability = p;
        }
        self
    }

    pub fn device(mut self, device: Device, profile: DeviceProfile) -> Self {
        self.scenario.devices.insert(device, profile);
        self
    }

    pub fn disable(mut self, device: Device) -> Self {
        self.scenario
            .devices
            .entry(device)
            .or_default()
            .enabled = false;
        self
    }

    pub fn duration_range(mut self, device: Device, min: u32, max: u32) -> Self {
        let profile = self.scenario.devices.entry(device).or_default();
        profile.min_duration = min;
        profile.max_duration = max;
        self
    }

    /// Add a scripted arrival. Scripted arrivals replace random generation.
    pub fn arrival(mut self, tick: Tick, device: Device, duration: i64) -> Self {
        self.scenario.arrivals.push(ScriptedArrival {
            tick,
            device,
            duration: Some(duration),
        });
        self
    }

    pub fn build(self) -> Scenario {
        self.scenario
    }
}

/// Parse and validate a JSON scenario.
pub fn load_scenario(json: &str) -> Result<Scenario, ScenarioError> {
    let scenario: Scenario = serde_json::from_str(json)?;
    scenario.validate()?;
    Ok(scenario)
}

/// Parse a seed string: a `u64` integer or `"entropy"` for OS randomness.
///
/// Returns `DEFAULT_SEED` for `None` or empty strings.
pub fn parse_seed(s: Option<&str>) -> Result<u64, ScenarioError> {
    match s.map(str::trim) {
        None | Some("") => Ok(DEFAULT_SEED),
        Some(s) if s.eq_ignore_ascii_case("entropy") => {
            let seed: u64 = rand::random();
            warn!(
                seed,
                "seed=entropy: seeding PRNG with OS randomness \
                 (set seed={seed} to reproduce this run)"
            );
            Ok(seed)
        }
        Some(s) => s.parse::<u64>().map_err(|_| {
            ScenarioError::InvalidValue(format!(
                "seed={s:?}: expected a u64 integer or \"entropy\""
            ))
        }),
    }
}
