//! Static device registry.
//!
//! The device set is closed: every device has a fixed priority rank, a
//! priority label and the legacy ISA IRQ line it raises. Lower rank means
//! higher priority.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::IrqLine;

/// A peripheral device that can raise interrupts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Keyboard,
    Printer,
    Disk,
}

/// Human-readable priority class of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriorityLabel {
    High,
    Medium,
    Low,
}

impl fmt::Display for PriorityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PriorityLabel::High => "High",
            PriorityLabel::Medium => "Medium",
            PriorityLabel::Low => "Low",
        })
    }
}

struct DeviceInfo {
    device: Device,
    rank: u8,
    label: PriorityLabel,
    line: IrqLine,
    name: &'static str,
}

const REGISTRY: [DeviceInfo; 3] = [
    DeviceInfo {
        device: Device::Keyboard,
        rank: 1,
        label: PriorityLabel::High,
        line: IrqLine(1),
        name: "Keyboard",
    },
    DeviceInfo {
        device: Device::Printer,
        rank: 2,
        label: PriorityLabel::Medium,
        line: IrqLine(7),
        name: "Printer",
    },
    DeviceInfo {
        device: Device::Disk,
        rank: 3,
        label: PriorityLabel::Low,
        line: IrqLine(14),
        name: "Disk",
    },
];

/// Priority rank and label of a device.
pub fn priority_of(device: Device) -> (u8, PriorityLabel) {
    let info = device.info();
    (info.rank, info.label)
}

impl Device {
    /// All devices in priority order.
    pub const ALL: [Device; 3] = [Device::Keyboard, Device::Printer, Device::Disk];

    fn info(self) -> &'static DeviceInfo {
        // REGISTRY is indexed in declaration order of the enum.
        &REGISTRY[self as usize]
    }

    pub fn rank(self) -> u8 {
        self.info().rank
    }

    pub fn label(self) -> PriorityLabel {
        self.info().label
    }

    pub fn line(self) -> IrqLine {
        self.info().line
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Resolve the device wired to an IRQ line, if any.
    pub fn from_line(line: IrqLine) -> Option<Device> {
        REGISTRY.iter().find(|i| i.line == line).map(|i| i.device)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for device names that are not in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDeviceName(pub String);

impl fmt::Display for UnknownDeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown device: {:?}", self.0)
    }
}

impl std::error::Error for UnknownDeviceName {}

impl FromStr for Device {
    type Err = UnknownDeviceName;

    /// Case-insensitive. The Portuguese names used by older log files are
    /// accepted as aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyboard" | "teclado" => Ok(Device::Keyboard),
            "printer" | "impressora" => Ok(Device::Printer),
            "disk" | "disco" => Ok(Device::Disk),
            _ => Err(UnknownDeviceName(s.to_string())),
        }
    }
}

/// Scenario files name devices the way `FromStr` accepts them.
impl<'de> Deserialize<'de> for Device {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
