//! Auto-cleanup trigger state machine.
//!
//! Four states (off / conservative / balanced / aggressive); transitions
//! happen only through an explicit `set_mode`, never as a side effect of
//! evaluation. Each tick is checked against the active mode's thresholds
//! behind an unconditional cooldown guard, and conditions are evaluated in
//! a fixed order with first-match-wins semantics.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::metrics::{MemoryPressure, ThermalState};

/// Auto-cleanup operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoCleanMode {
    Off,
    /// Only when critical
    Conservative,
    /// Default behavior
    Balanced,
    /// Proactive cleanup
    Aggressive,
}

impl AutoCleanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
        }
    }

    /// Threshold triple for this mode; `None` for `Off`.
    pub fn thresholds(&self) -> Option<ModeThresholds> {
        match self {
            Self::Off => None,
            Self::Conservative => Some(ModeThresholds {
                cpu: 90.0,
                memory: 95.0,
                thermal_floor: ThermalState::Critical,
            }),
            Self::Balanced => Some(ModeThresholds {
                cpu: 70.0,
                memory: 85.0,
                thermal_floor: ThermalState::Hot,
            }),
            Self::Aggressive => Some(ModeThresholds {
                cpu: 50.0,
                memory: 70.0,
                thermal_floor: ThermalState::Warm,
            }),
        }
    }

    /// Score/CPU floors for the kill pass dispatched behind a trigger.
    pub fn kill_pass_floors(&self) -> (f64, f64) {
        if *self == Self::Aggressive {
            (30.0, 20.0)
        } else {
            (50.0, 30.0)
        }
    }
}

impl fmt::Display for AutoCleanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutoCleanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "conservative" => Ok(Self::Conservative),
            "balanced" => Ok(Self::Balanced),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(format!(
                "unknown mode '{other}' (expected off, conservative, balanced or aggressive)"
            )),
        }
    }
}

/// Trigger thresholds for one mode.
#[derive(Debug, Clone, Copy)]
pub struct ModeThresholds {
    pub cpu: f64,
    pub memory: f64,
    /// Thermal severity treated as an alert condition in status reporting
    pub thermal_floor: ThermalState,
}

/// Emitted when a tick crosses a threshold and the cooldown has elapsed.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub reason: String,
    pub mode: AutoCleanMode,
}

/// The trigger state machine. Written only by the single evaluation path;
/// workers receive a snapshot of mode and floors at dispatch time.
pub struct AutoCleanController {
    mode: AutoCleanMode,
    cooldown: Duration,
    last_trigger: Option<Instant>,
}

impl AutoCleanController {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            mode: AutoCleanMode::Off,
            cooldown,
            last_trigger: None,
        }
    }

    pub fn mode(&self) -> AutoCleanMode {
        self.mode
    }

    /// Switch modes. Takes effect on the next evaluation; never alters the
    /// cooldown clock.
    pub fn set_mode(&mut self, mode: AutoCleanMode) {
        self.mode = mode;
    }

    /// Evaluate one metric tick against the active mode.
    pub fn evaluate(
        &mut self,
        cpu_percent: f64,
        memory_percent: f64,
        pressure: MemoryPressure,
    ) -> Option<TriggerEvent> {
        self.evaluate_at(Instant::now(), cpu_percent, memory_percent, pressure)
    }

    /// Evaluation with an explicit clock, for deterministic tests.
    pub fn evaluate_at(
        &mut self,
        now: Instant,
        cpu_percent: f64,
        memory_percent: f64,
        pressure: MemoryPressure,
    ) -> Option<TriggerEvent> {
        let thresholds = self.mode.thresholds()?;

        // Cooldown guard is unconditional: no action fires inside the
        // window no matter how far metrics exceed thresholds.
        if let Some(last) = self.last_trigger {
            if now.saturating_duration_since(last) < self.cooldown {
                return None;
            }
        }

        // Fixed evaluation order, first match wins.
        let reason = if cpu_percent > thresholds.cpu {
            format!("CPU at {cpu_percent:.0}%")
        } else if memory_percent > thresholds.memory {
            format!("Memory at {memory_percent:.0}%")
        } else if pressure == MemoryPressure::Critical {
            "Critical memory pressure".to_string()
        } else if pressure == MemoryPressure::Warn && self.mode == AutoCleanMode::Aggressive {
            "Memory pressure warning".to_string()
        } else {
            return None;
        };

        self.last_trigger = Some(now);
        Some(TriggerEvent {
            reason,
            mode: self.mode,
        })
    }

    /// Seconds until the next trigger is possible, zero when armed.
    pub fn cooldown_remaining(&self, now: Instant) -> Duration {
        match self.last_trigger {
            Some(last) => self
                .cooldown
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(180);

    fn controller(mode: AutoCleanMode) -> AutoCleanController {
        let mut c = AutoCleanController::new(COOLDOWN);
        c.set_mode(mode);
        c
    }

    #[test]
    fn off_mode_never_evaluates() {
        let mut c = controller(AutoCleanMode::Off);
        let event = c.evaluate_at(Instant::now(), 100.0, 100.0, MemoryPressure::Critical);
        assert!(event.is_none());
    }

    #[test]
    fn conservative_cpu_trigger_carries_reason() {
        let mut c = controller(AutoCleanMode::Conservative);
        let event = c
            .evaluate_at(Instant::now(), 95.0, 40.0, MemoryPressure::Normal)
            .expect("should trigger");
        assert_eq!(event.reason, "CPU at 95%");
        assert_eq!(event.mode, AutoCleanMode::Conservative);
    }

    #[test]
    fn conservative_below_thresholds_is_quiet() {
        let mut c = controller(AutoCleanMode::Conservative);
        // 85% CPU is loud, but conservative only wakes above 90.
        assert!(c
            .evaluate_at(Instant::now(), 85.0, 40.0, MemoryPressure::Normal)
            .is_none());
    }

    #[test]
    fn first_matching_condition_wins() {
        // Aggressive, CPU over threshold and pressure at warn: CPU is
        // checked first and supplies the reason.
        let mut c = controller(AutoCleanMode::Aggressive);
        let event = c
            .evaluate_at(Instant::now(), 60.0, 40.0, MemoryPressure::Warn)
            .expect("should trigger");
        assert_eq!(event.reason, "CPU at 60%");
    }

    #[test]
    fn warn_pressure_only_fires_in_aggressive() {
        let t0 = Instant::now();
        let mut balanced = controller(AutoCleanMode::Balanced);
        assert!(balanced
            .evaluate_at(t0, 10.0, 10.0, MemoryPressure::Warn)
            .is_none());

        let mut aggressive = controller(AutoCleanMode::Aggressive);
        let event = aggressive
            .evaluate_at(t0, 10.0, 10.0, MemoryPressure::Warn)
            .expect("should trigger");
        assert_eq!(event.reason, "Memory pressure warning");
    }

    #[test]
    fn critical_pressure_fires_in_any_active_mode() {
        for mode in [
            AutoCleanMode::Conservative,
            AutoCleanMode::Balanced,
            AutoCleanMode::Aggressive,
        ] {
            let mut c = controller(mode);
            let event = c
                .evaluate_at(Instant::now(), 10.0, 10.0, MemoryPressure::Critical)
                .expect("should trigger");
            assert_eq!(event.reason, "Critical memory pressure");
        }
    }

    #[test]
    fn unknown_pressure_never_triggers_on_its_own() {
        let mut c = controller(AutoCleanMode::Aggressive);
        assert!(c
            .evaluate_at(Instant::now(), 10.0, 10.0, MemoryPressure::Unknown)
            .is_none());
    }

    #[test]
    fn cooldown_suppresses_second_tick() {
        let mut c = controller(AutoCleanMode::Balanced);
        let t0 = Instant::now();

        assert!(c.evaluate_at(t0, 95.0, 40.0, MemoryPressure::Normal).is_some());
        // 10 seconds later, still cooling down.
        let t1 = t0 + Duration::from_secs(10);
        assert!(c.evaluate_at(t1, 95.0, 40.0, MemoryPressure::Normal).is_none());
    }

    #[test]
    fn expired_cooldown_allows_second_trigger() {
        let mut c = controller(AutoCleanMode::Balanced);
        let t0 = Instant::now();

        assert!(c.evaluate_at(t0, 95.0, 40.0, MemoryPressure::Normal).is_some());
        let t1 = t0 + Duration::from_secs(200);
        assert!(c.evaluate_at(t1, 95.0, 40.0, MemoryPressure::Normal).is_some());
    }

    #[test]
    fn mode_switch_applies_on_next_evaluation() {
        let mut c = controller(AutoCleanMode::Conservative);
        let t0 = Instant::now();
        assert!(c.evaluate_at(t0, 60.0, 40.0, MemoryPressure::Normal).is_none());

        c.set_mode(AutoCleanMode::Aggressive);
        let event = c
            .evaluate_at(t0 + Duration::from_secs(2), 60.0, 40.0, MemoryPressure::Normal)
            .expect("aggressive threshold crossed");
        assert_eq!(event.reason, "CPU at 60%");
    }

    #[test]
    fn kill_pass_floors_scale_with_mode() {
        assert_eq!(AutoCleanMode::Aggressive.kill_pass_floors(), (30.0, 20.0));
        assert_eq!(AutoCleanMode::Balanced.kill_pass_floors(), (50.0, 30.0));
        assert_eq!(AutoCleanMode::Conservative.kill_pass_floors(), (50.0, 30.0));
    }
}
