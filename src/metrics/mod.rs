//! Typed metric readings consumed by the decision engine.
//!
//! The engine never parses vendor sensor output itself; it consumes the
//! small set of enumerations and readings defined here. When a source is
//! unavailable the affected reading degrades to `Unknown` (or zero) rather
//! than failing the whole status computation.

pub mod sampler;

pub use sampler::{ProcessSample, Sampler};

use serde::{Deserialize, Serialize};

/// Memory pressure levels as reported by the OS (or derived from usage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPressure {
    /// Green - no compression or swapping of note
    Normal,
    /// Yellow - system starting to compress
    Warn,
    /// Red - heavy swapping/compression
    Critical,
    /// Pressure source unavailable
    Unknown,
}

impl MemoryPressure {
    /// Derive a pressure level from used-memory percentage when no native
    /// pressure reading is available. Thresholds match the original
    /// monitor's table: >=90 critical, >=75 warn.
    pub fn from_percent(percent: f64) -> Self {
        if percent >= 90.0 {
            Self::Critical
        } else if percent >= 75.0 {
            Self::Warn
        } else {
            Self::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warn => "warn",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }
}

/// Thermal state classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermalState {
    /// < 50C - normal operation
    Cool,
    /// 50-70C - light load
    Warm,
    /// 70-85C - heavy load
    Hot,
    /// 85-95C - throttling likely
    Critical,
    /// > 95C - thermal emergency
    Danger,
    /// No thermal sensor readable
    Unknown,
}

impl ThermalState {
    /// Classify a CPU temperature in Celsius.
    pub fn from_celsius(temp: f64) -> Self {
        if temp > 95.0 {
            Self::Danger
        } else if temp > 85.0 {
            Self::Critical
        } else if temp > 70.0 {
            Self::Hot
        } else if temp > 50.0 {
            Self::Warm
        } else {
            Self::Cool
        }
    }

    /// Severity rank for floor comparisons. `Unknown` has no rank and never
    /// satisfies a floor.
    pub fn severity(&self) -> Option<u8> {
        match self {
            Self::Cool => Some(0),
            Self::Warm => Some(1),
            Self::Hot => Some(2),
            Self::Critical => Some(3),
            Self::Danger => Some(4),
            Self::Unknown => None,
        }
    }

    /// True when this state is at least as severe as `floor`.
    pub fn at_least(&self, floor: ThermalState) -> bool {
        match (self.severity(), floor.severity()) {
            (Some(s), Some(f)) => s >= f,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cool => "cool",
            Self::Warm => "warm",
            Self::Hot => "hot",
            Self::Critical => "critical",
            Self::Danger => "danger",
            Self::Unknown => "unknown",
        }
    }
}

/// CPU throttle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleState {
    None,
    Light,
    Moderate,
    Heavy,
    Emergency,
    Unknown,
}

impl ThrottleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Heavy => "heavy",
            Self::Emergency => "emergency",
            Self::Unknown => "unknown",
        }
    }
}

/// Point-in-time fast-path reading (CPU + memory).
#[derive(Debug, Clone)]
pub struct SystemReading {
    /// Global CPU usage, 0-100
    pub cpu_percent: f64,
    /// Used physical memory, 0-100
    pub memory_percent: f64,
    pub pressure: MemoryPressure,
    /// Swap in use, bytes
    pub swap_used: u64,
    pub total_memory: u64,
    pub used_memory: u64,
}

/// Slow-path thermal reading.
#[derive(Debug, Clone, Copy)]
pub struct ThermalReading {
    pub state: ThermalState,
    pub throttle: ThrottleState,
    /// Hottest zone temperature, if any sensor was readable
    pub cpu_temp: Option<f64>,
}

impl Default for ThermalReading {
    fn default() -> Self {
        Self {
            state: ThermalState::Unknown,
            throttle: ThrottleState::Unknown,
            cpu_temp: None,
        }
    }
}

/// Disk occupancy for the volume holding the user's home directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

impl DiskUsage {
    pub fn percent_used(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.used as f64 / self.total as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressure_fallback_thresholds() {
        assert_eq!(MemoryPressure::from_percent(40.0), MemoryPressure::Normal);
        assert_eq!(MemoryPressure::from_percent(75.0), MemoryPressure::Warn);
        assert_eq!(MemoryPressure::from_percent(89.9), MemoryPressure::Warn);
        assert_eq!(MemoryPressure::from_percent(90.0), MemoryPressure::Critical);
    }

    #[test]
    fn thermal_classification_bands() {
        assert_eq!(ThermalState::from_celsius(35.0), ThermalState::Cool);
        assert_eq!(ThermalState::from_celsius(60.0), ThermalState::Warm);
        assert_eq!(ThermalState::from_celsius(80.0), ThermalState::Hot);
        assert_eq!(ThermalState::from_celsius(90.0), ThermalState::Critical);
        assert_eq!(ThermalState::from_celsius(99.0), ThermalState::Danger);
    }

    #[test]
    fn unknown_never_satisfies_a_floor() {
        assert!(!ThermalState::Unknown.at_least(ThermalState::Cool));
        assert!(!ThermalState::Hot.at_least(ThermalState::Unknown));
        assert!(ThermalState::Danger.at_least(ThermalState::Hot));
        assert!(!ThermalState::Warm.at_least(ThermalState::Hot));
    }
}
