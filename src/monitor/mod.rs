//! Continuous monitoring loop and the side-effect passes it dispatches.

pub mod realtime;

pub use realtime::{run_kill_pass, KillPassReport, MonitorStats, RealtimeMonitor};
