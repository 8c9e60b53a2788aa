//! Event sources: where device activations come from.
//!
//! The driver asks its source for the arrivals of each tick. Randomness is
//! confined to [`RandomSource`], which is seeded explicitly, so a scheduler
//! run is fully determined by the arrival sequence it is fed.

use std::collections::BTreeMap;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::device::Device;
use crate::request::Arrival;
use crate::scenario::{DeviceProfile, Scenario, ScenarioError};
use crate::types::Tick;

pub trait EventSource {
    /// Arrivals signalled at `tick`, in generation order. May be empty.
    fn generate_arrivals(&mut self, tick: Tick) -> Vec<Arrival>;
}

impl<F> EventSource for F
where
    F: FnMut(Tick) -> Vec<Arrival>,
{
    fn generate_arrivals(&mut self, tick: Tick) -> Vec<Arrival> {
        self(tick)
    }
}

/// Replays a fixed list of arrivals.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    arrivals: BTreeMap<Tick, Vec<Arrival>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        ScriptedSource {
            arrivals: BTreeMap::new(),
        }
    }

    pub fn from_scenario(scenario: &Scenario) -> Self {
        scenario
            .arrivals
            .iter()
            .map(|a| {
                (
                    a.tick,
                    Arrival {
                        line: a.device.line(),
                        duration: a.duration,
                    },
                )
            })
            .collect()
    }

    /// Queue an arrival at `tick`. Arrivals at the same tick keep the order
    /// they were pushed in.
    pub fn push(&mut self, tick: Tick, arrival: Arrival) {
        self.arrivals.entry(tick).or_default().push(arrival);
    }

    /// Tick of the last scripted arrival.
    pub fn last_tick(&self) -> Option<Tick> {
        self.arrivals.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.arrivals.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.arrivals.is_empty()
    }
}

impl FromIterator<(Tick, Arrival)> for ScriptedSource {
    fn from_iter<I: IntoIterator<Item = (Tick, Arrival)>>(iter: I) -> Self {
        let mut source = ScriptedSource::new();
        for (tick, arrival) in iter {
            source.push(tick, arrival);
        }
        source
    }
}

impl EventSource for ScriptedSource {
    fn generate_arrivals(&mut self, tick: Tick) -> Vec<Arrival> {
        self.arrivals.remove(&tick).unwrap_or_default()
    }
}

/// Fires each enabled device independently on every tick.
///
/// Devices are polled in priority order and each draws its service
/// duration uniformly from its profile's range, so the same seed always
/// yields the same arrival sequence.
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: SmallRng,
    profiles: Vec<(Device, DeviceProfile)>,
}

impl RandomSource {
    pub fn new(seed: u64, scenario: &Scenario) -> Result<Self, ScenarioError> {
        let mut profiles = Vec::new();
        for device in Device::ALL {
            let profile = scenario.profile(device);
            if !profile.enabled {
                continue;
            }
            profile.validate(device)?;
            profiles.push((device, profile));
        }
        Ok(RandomSource {
            rng: SmallRng::seed_from_u64(seed),
            profiles,
        })
    }
}

impl EventSource for RandomSource {
    fn generate_arrivals(&mut self, _tick: Tick) -> Vec<Arrival> {
        let mut arrivals = Vec::new();
        for &(device, profile) in &self.profiles {
            if self.rng.gen_bool(profile.probability) {
                let duration = self
                    .rng
                    .gen_range(profile.min_duration..=profile.max_duration);
                arrivals.push(Arrival::new(device, i64::from(duration)));
            }
        }
        arrivals
    }
}

/// Build the event source a scenario describes.
pub fn source_for(scenario: &Scenario) -> Result<Box<dyn EventSource>, ScenarioError> {
    if scenario.is_scripted() {
        Ok(Box::new(ScriptedSource::from_scenario(scenario)))
    } else {
        Ok(Box::new(RandomSource::new(scenario.seed, scenario)?))
    }
}
