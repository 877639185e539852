//! Real-time system monitoring.
//!
//! Two independent cadences: a fast tick that refreshes CPU/memory and
//! feeds the trigger state machine, and a slow thermal tick that updates
//! a shared thermal reading (temperature sources are expensive to poll
//! and drift slowly). Side-effect passes run on the blocking pool behind
//! a single-slot busy flag so a slow pass is skipped over, never queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::cleaner::{format_size, CleanupCategory, DiskCleaner};
use crate::core::{AutoCleanController, AutoCleanMode, ReclaimConfig};
use crate::metrics::{Sampler, SystemReading, ThermalReading};
use crate::process::{terminate, ProtectionVerdict, TerminateOutcome};

/// Thermal sources are polled on their own slow cadence.
const THERMAL_INTERVAL: Duration = Duration::from_secs(10);
/// Delay between the two CPU refreshes a usage delta needs.
const CPU_SAMPLE_DELAY: Duration = Duration::from_millis(200);
/// Readings kept for trend stats.
const MAX_HISTORY: usize = 1800;

/// What one kill pass did.
#[derive(Debug, Clone, Default)]
pub struct KillPassReport {
    pub examined: usize,
    pub killed: Vec<(u32, String, f64)>,
    pub refused: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MonitorStats {
    pub sample_count: usize,
    pub avg_cpu: f64,
    pub max_cpu: f64,
    pub avg_memory: f64,
    pub max_memory: f64,
}

/// The monitoring loop. Owns the sampler and the trigger state machine;
/// shares the latest thermal reading with the slow task.
pub struct RealtimeMonitor {
    interval: Duration,
    config: ReclaimConfig,
    controller: AutoCleanController,
    thermal: Arc<RwLock<ThermalReading>>,
    history: Arc<RwLock<Vec<SystemReading>>>,
    pass_running: Arc<AtomicBool>,
}

impl RealtimeMonitor {
    pub fn new(interval_secs: u64, mode: AutoCleanMode, config: ReclaimConfig) -> Self {
        let mut controller =
            AutoCleanController::new(Duration::from_secs(config.cooldown_secs));
        controller.set_mode(mode);

        Self {
            interval: Duration::from_secs(interval_secs),
            config,
            controller,
            thermal: Arc::new(RwLock::new(ThermalReading::default())),
            history: Arc::new(RwLock::new(Vec::new())),
            pass_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Latest thermal reading, shared with the slow task.
    pub fn thermal_handle(&self) -> Arc<RwLock<ThermalReading>> {
        Arc::clone(&self.thermal)
    }

    pub async fn stats(&self) -> MonitorStats {
        let history = self.history.read().await;
        if history.is_empty() {
            return MonitorStats::default();
        }
        let n = history.len() as f64;
        MonitorStats {
            sample_count: history.len(),
            avg_cpu: history.iter().map(|r| r.cpu_percent).sum::<f64>() / n,
            max_cpu: history.iter().map(|r| r.cpu_percent).fold(0.0, f64::max),
            avg_memory: history.iter().map(|r| r.memory_percent).sum::<f64>() / n,
            max_memory: history.iter().map(|r| r.memory_percent).fold(0.0, f64::max),
        }
    }

    /// Run the loop until the task is cancelled.
    pub async fn start(mut self) {
        info!(
            mode = %self.controller.mode(),
            interval_secs = self.interval.as_secs(),
            "monitoring started"
        );

        let thermal = Arc::clone(&self.thermal);
        tokio::spawn(async move {
            loop {
                let reading = tokio::task::spawn_blocking(|| Sampler::new().thermal()).await;
                match reading {
                    Ok(reading) => {
                        debug!(state = reading.state.as_str(), temp = ?reading.cpu_temp, "thermal tick");
                        *thermal.write().await = reading;
                    }
                    Err(e) => warn!(error = %e, "thermal sampling task failed"),
                }
                tokio::time::sleep(THERMAL_INTERVAL).await;
            }
        });

        let mut sampler = Sampler::new();
        loop {
            sampler.refresh();
            let reading = sampler.reading();
            debug!(
                cpu = %format_args!("{:.1}", reading.cpu_percent),
                memory = %format_args!("{:.1}", reading.memory_percent),
                pressure = reading.pressure.as_str(),
                "tick"
            );

            {
                let mut history = self.history.write().await;
                if history.len() >= MAX_HISTORY {
                    history.remove(0);
                }
                history.push(reading.clone());
            }

            if let Some(event) = self.controller.evaluate(
                reading.cpu_percent,
                reading.memory_percent,
                reading.pressure,
            ) {
                self.dispatch_pass(event.reason, event.mode);
            }

            tokio::time::sleep(self.interval).await;
        }
    }

    /// Hand the pass to the blocking pool unless one is already running.
    /// Mode and floors are snapshotted here; a mode switch mid-pass does
    /// not affect work already dispatched.
    fn dispatch_pass(&self, reason: String, mode: AutoCleanMode) {
        if self
            .pass_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(reason = %reason, "trigger fired while a pass is running; skipped");
            return;
        }

        info!(reason = %reason, mode = %mode, "auto cleanup triggered");

        let (min_score, min_cpu) = mode.kill_pass_floors();
        let config = self.config.clone();
        let flag = Arc::clone(&self.pass_running);
        tokio::task::spawn_blocking(move || {
            let report = run_kill_pass(&config, min_score, min_cpu, config.auto_kill_cap);
            for (pid, name, score) in &report.killed {
                info!(pid, name = %name, score, "terminated");
            }
            if !report.errors.is_empty() {
                warn!(errors = report.errors.len(), "kill pass had errors");
            }

            if config.auto_clean_caches {
                let home = dirs::home_dir().unwrap_or_else(|| "/".into());
                let mut cleaner = DiskCleaner::new(&home);
                let outcomes = cleaner.clean(
                    Some(&[CleanupCategory::UserCache, CleanupCategory::TempFiles]),
                    false,
                    false,
                );
                let freed: u64 = outcomes.iter().map(|o| o.bytes_freed).sum();
                info!(freed = %format_size(freed), "cache pass finished");
            }

            flag.store(false, Ordering::Release);
        });
    }
}

/// One scoring-and-termination pass: snapshot processes, rank them, kill
/// up to `cap` candidates above the floors. Each candidate is re-sampled
/// and re-validated immediately before signalling.
pub fn run_kill_pass(
    config: &ReclaimConfig,
    min_score: f64,
    min_cpu: f64,
    cap: usize,
) -> KillPassReport {
    use crate::core::ProcessScorer;

    let mut sampler = Sampler::new();
    sampler.refresh();
    // Second refresh after a short delay so per-process CPU has a delta.
    std::thread::sleep(CPU_SAMPLE_DELAY);
    sampler.refresh();

    let shielded = sampler.own_ancestry();
    let scorer = ProcessScorer::new(config, shielded.clone());
    let samples = sampler.processes();
    let mut candidates = scorer.killable(&samples, min_score, min_cpu);
    candidates.truncate(cap);

    let mut report = KillPassReport {
        examined: samples.len(),
        ..Default::default()
    };

    let grace = Duration::from_secs_f64(config.grace_period_secs);
    for candidate in candidates {
        // Probing needs `&mut sampler`, so the verdict is taken once here
        // rather than inside the Fn closure `terminate` expects.
        let verdict = probe_once(&mut sampler, &scorer, &shielded, candidate.pid);

        match terminate(candidate.pid, grace, |_| verdict) {
            Ok(TerminateOutcome::Terminated | TerminateOutcome::ForceKilled) => {
                report
                    .killed
                    .push((candidate.pid, candidate.name.clone(), candidate.kill_score));
            }
            Ok(TerminateOutcome::Refused) => report.refused += 1,
            Ok(TerminateOutcome::AlreadyGone) => {}
            Err(e) => {
                error!(pid = candidate.pid, error = %e, "termination failed");
                report.errors.push(e.to_string());
            }
        }
    }
    report
}

fn probe_once(
    sampler: &mut Sampler,
    scorer: &crate::core::ProcessScorer,
    shielded: &std::collections::HashSet<u32>,
    pid: u32,
) -> ProtectionVerdict {
    use crate::core::is_protected;

    match sampler.sample_process(pid) {
        None => ProtectionVerdict::Gone,
        Some(sample) => {
            let record = scorer.record(&sample);
            if is_protected(
                pid,
                record.category,
                sample.children_count,
                sample.has_open_files_in_home,
                shielded,
            ) {
                ProtectionVerdict::Protected
            } else {
                ProtectionVerdict::Clear
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_pass_with_impossible_floors_kills_nothing() {
        let config = ReclaimConfig::default();
        let report = run_kill_pass(&config, f64::MAX, f64::MAX, 5);
        assert!(report.killed.is_empty());
        assert!(report.examined > 0);
    }

    #[tokio::test]
    async fn stats_start_empty() {
        let monitor = RealtimeMonitor::new(2, AutoCleanMode::Off, ReclaimConfig::default());
        let stats = monitor.stats().await;
        assert_eq!(stats.sample_count, 0);
    }
}
