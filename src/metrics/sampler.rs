//! sysinfo-backed metric source.
//!
//! Produces the fast-path `SystemReading`, the slow-path `ThermalReading`,
//! disk occupancy, and an enumerable snapshot of live processes with the
//! per-process data the scorer needs. On Linux the snapshot is enriched
//! from /proc (fd counts, thread counts); elsewhere those fields degrade
//! to zero.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use sysinfo::{Components, Disks, Pid, System, Users};

use super::{DiskUsage, MemoryPressure, SystemReading, ThermalReading, ThermalState, ThrottleState};

/// Longest command line retained per process.
const CMDLINE_MAX: usize = 200;

/// Raw per-process snapshot taken at sample time. Classification and
/// scoring are layered on top by the decision engine; this struct carries
/// only what the OS reports.
#[derive(Debug, Clone)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    /// Space-joined command line, truncated to `CMDLINE_MAX` chars
    pub cmdline: String,
    pub username: String,
    /// CPU usage, 0-100 (per core, may exceed 100 on multicore)
    pub cpu_percent: f64,
    /// Share of total physical memory, 0-100
    pub memory_percent: f64,
    pub thread_count: u32,
    /// Open file descriptors (0 when unavailable)
    pub fd_count: u32,
    /// Unix timestamp of process creation
    pub start_time: u64,
    pub children_count: u32,
    /// Whether any open descriptor resolves under the user's home
    pub has_open_files_in_home: bool,
}

/// Metric source wrapping a sysinfo `System`.
pub struct Sampler {
    system: System,
    users: Users,
    home: PathBuf,
}

impl Sampler {
    pub fn new() -> Self {
        Self {
            system: System::new_all(),
            users: Users::new_with_refreshed_list(),
            home: dirs::home_dir().unwrap_or_else(|| PathBuf::from("/")),
        }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Refresh CPU, memory and process tables. CPU usage needs two refresh
    /// passes to produce a delta; callers on a periodic tick get that for
    /// free.
    pub fn refresh(&mut self) {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.system.refresh_processes();
    }

    /// Fast-path reading: CPU%, memory%, derived pressure, swap.
    pub fn reading(&self) -> SystemReading {
        let total = self.system.total_memory();
        let used = self.system.used_memory();
        let memory_percent = if total == 0 {
            0.0
        } else {
            used as f64 / total as f64 * 100.0
        };

        SystemReading {
            cpu_percent: f64::from(self.system.global_cpu_info().cpu_usage()),
            memory_percent,
            pressure: MemoryPressure::from_percent(memory_percent),
            swap_used: self.system.used_swap(),
            total_memory: total,
            used_memory: used,
        }
    }

    /// Slow-path thermal reading. Tries sysinfo components first, then the
    /// sysfs thermal zones on Linux; degrades to `Unknown` when neither
    /// yields a temperature.
    pub fn thermal(&self) -> ThermalReading {
        let temp = hottest_component().or_else(read_thermal_sysfs);

        match temp {
            Some(celsius) => {
                let state = ThermalState::from_celsius(celsius);
                // Throttle level is estimated from temperature; exact
                // throttle reporting needs vendor tooling we do not shell
                // out to.
                let throttle = match state {
                    ThermalState::Danger => ThrottleState::Heavy,
                    ThermalState::Critical => ThrottleState::Light,
                    _ => ThrottleState::None,
                };
                ThermalReading {
                    state,
                    throttle,
                    cpu_temp: Some(celsius),
                }
            }
            None => ThermalReading::default(),
        }
    }

    /// Disk occupancy for the volume holding the home directory.
    pub fn disk_usage(&self) -> DiskUsage {
        let disks = Disks::new_with_refreshed_list();
        let mut best: Option<(usize, DiskUsage)> = None;

        for disk in disks.list() {
            let mount = disk.mount_point();
            if self.home.starts_with(mount) {
                let depth = mount.components().count();
                let total = disk.total_space();
                let free = disk.available_space();
                let usage = DiskUsage {
                    total,
                    used: total.saturating_sub(free),
                    free,
                };
                if best.map_or(true, |(d, _)| depth > d) {
                    best = Some((depth, usage));
                }
            }
        }

        best.map(|(_, u)| u).unwrap_or_default()
    }

    /// Snapshot all live processes.
    pub fn processes(&self) -> Vec<ProcessSample> {
        let children = self.children_counts();
        let total_memory = self.system.total_memory();

        self.system
            .processes()
            .iter()
            .map(|(pid, proc)| self.build_sample(pid.as_u32(), proc, &children, total_memory))
            .collect()
    }

    /// Re-sample a single process; `None` when it has exited.
    pub fn sample_process(&mut self, pid: u32) -> Option<ProcessSample> {
        self.system.refresh_processes();
        let proc = self.system.process(Pid::from_u32(pid))?;
        let children = self.children_counts();
        let total_memory = self.system.total_memory();
        Some(self.build_sample(pid, proc, &children, total_memory))
    }

    /// All descendants of `pid` in discovery order.
    pub fn descendants(&self, pid: u32) -> Vec<u32> {
        let mut by_parent: HashMap<u32, Vec<u32>> = HashMap::new();
        for (child, proc) in self.system.processes() {
            if let Some(parent) = proc.parent() {
                by_parent.entry(parent.as_u32()).or_default().push(child.as_u32());
            }
        }

        let mut found = Vec::new();
        let mut queue = vec![pid];
        while let Some(next) = queue.pop() {
            if let Some(kids) = by_parent.get(&next) {
                for &kid in kids {
                    if kid != pid && !found.contains(&kid) {
                        found.push(kid);
                        queue.push(kid);
                    }
                }
            }
        }
        found
    }

    /// PIDs of this process and every ancestor up to init. These are always
    /// shielded from termination.
    pub fn own_ancestry(&self) -> HashSet<u32> {
        let mut ancestry = HashSet::new();
        let Ok(mut pid) = sysinfo::get_current_pid() else {
            return ancestry;
        };

        loop {
            if !ancestry.insert(pid.as_u32()) {
                break; // cycle guard
            }
            match self.system.process(pid).and_then(|p| p.parent()) {
                Some(parent) => pid = parent,
                None => break,
            }
        }
        ancestry
    }

    fn children_counts(&self) -> HashMap<u32, u32> {
        let mut counts: HashMap<u32, u32> = HashMap::new();
        for proc in self.system.processes().values() {
            if let Some(parent) = proc.parent() {
                *counts.entry(parent.as_u32()).or_default() += 1;
            }
        }
        counts
    }

    fn build_sample(
        &self,
        pid: u32,
        proc: &sysinfo::Process,
        children: &HashMap<u32, u32>,
        total_memory: u64,
    ) -> ProcessSample {
        let cmdline = truncate_chars(&proc.cmd().join(" "), CMDLINE_MAX);
        let username = proc
            .user_id()
            .and_then(|uid| self.users.get_user_by_id(uid))
            .map(|u| u.name().to_string())
            .unwrap_or_default();
        let memory_percent = if total_memory == 0 {
            0.0
        } else {
            proc.memory() as f64 / total_memory as f64 * 100.0
        };
        let (fd_count, has_open_files_in_home) = fd_stats(pid, &self.home);

        ProcessSample {
            pid,
            name: proc.name().to_string(),
            cmdline,
            username,
            cpu_percent: f64::from(proc.cpu_usage()),
            memory_percent,
            thread_count: thread_count(pid),
            fd_count,
            start_time: proc.start_time(),
            children_count: children.get(&pid).copied().unwrap_or(0),
            has_open_files_in_home,
        }
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Hottest temperature across sysinfo hardware components.
fn hottest_component() -> Option<f64> {
    let components = Components::new_with_refreshed_list();
    components
        .list()
        .iter()
        .map(|c| f64::from(c.temperature()))
        .filter(|t| t.is_finite() && *t > 0.0)
        .fold(None, |acc: Option<f64>, t| {
            Some(acc.map_or(t, |prev| prev.max(t)))
        })
}

/// Linux fallback: walk /sys/class/thermal/thermal_zone*/temp (millidegrees).
#[cfg(target_os = "linux")]
fn read_thermal_sysfs() -> Option<f64> {
    let mut max_temp: Option<f64> = None;
    let entries = std::fs::read_dir("/sys/class/thermal").ok()?;
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with("thermal_zone") {
            continue;
        }
        if let Ok(content) = std::fs::read_to_string(entry.path().join("temp")) {
            if let Ok(millideg) = content.trim().parse::<i64>() {
                let celsius = millideg as f64 / 1000.0;
                max_temp = Some(max_temp.map_or(celsius, |prev: f64| prev.max(celsius)));
            }
        }
    }
    max_temp
}

#[cfg(not(target_os = "linux"))]
fn read_thermal_sysfs() -> Option<f64> {
    None
}

/// Count open descriptors and check whether any resolves under `home`.
#[cfg(target_os = "linux")]
fn fd_stats(pid: u32, home: &Path) -> (u32, bool) {
    let dir = format!("/proc/{pid}/fd");
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return (0, false);
    };

    let mut count = 0u32;
    let mut in_home = false;
    for entry in entries.flatten() {
        count += 1;
        if !in_home {
            if let Ok(target) = std::fs::read_link(entry.path()) {
                if target.starts_with(home) {
                    in_home = true;
                }
            }
        }
    }
    (count, in_home)
}

#[cfg(not(target_os = "linux"))]
fn fd_stats(_pid: u32, _home: &Path) -> (u32, bool) {
    (0, false)
}

/// Thread count from /proc/[pid]/stat (field 17 after the comm field).
#[cfg(target_os = "linux")]
fn thread_count(pid: u32) -> u32 {
    let path = format!("/proc/{pid}/stat");
    let Ok(content) = std::fs::read_to_string(&path) else {
        return 0;
    };
    // The comm field can contain spaces and parentheses; skip past the
    // last ')' before splitting.
    let Some(comm_end) = content.rfind(')') else {
        return 0;
    };
    content[comm_end + 1..]
        .split_whitespace()
        .nth(17)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn thread_count(_pid: u32) -> u32 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
        let s = "é".repeat(10);
        assert_eq!(truncate_chars(&s, 4).chars().count(), 4);
    }

    #[test]
    fn ancestry_includes_self() {
        let sampler = Sampler::new();
        let ancestry = sampler.own_ancestry();
        let own = sysinfo::get_current_pid().expect("current pid").as_u32();
        assert!(ancestry.contains(&own));
    }

    #[test]
    fn descendants_find_a_spawned_child() {
        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("spawn sleep");

        let mut sampler = Sampler::new();
        sampler.refresh();
        let own = sysinfo::get_current_pid().expect("current pid").as_u32();
        let descendants = sampler.descendants(own);
        assert!(descendants.contains(&child.id()));

        let _ = child.kill();
        let _ = child.wait();
    }

    #[test]
    fn snapshot_contains_current_process() {
        let mut sampler = Sampler::new();
        sampler.refresh();
        let own = sysinfo::get_current_pid().expect("current pid").as_u32();
        assert!(sampler.processes().iter().any(|p| p.pid == own));
    }
}
