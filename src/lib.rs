//! sysreclaim
//!
//! A resource reclamation engine: it watches CPU, memory, thermal and
//! disk metrics, ranks running processes by how safe they are to kill,
//! and frees disk space from a curated catalog of cache locations.
//!
//! ## Safety
//!
//! - Protection is binary and checked twice: once when ranking, again
//!   immediately before any signal is sent
//! - System-critical, development and terminal processes are never
//!   termination candidates, nor is this process or its ancestors
//! - Sudo-gated cleanup locations are listed but never touched
//! - A cooldown throttles automatic action regardless of system state
//! - Dry-run mode previews every cleanup

pub mod cleaner;
pub mod core;
pub mod metrics;
pub mod monitor;
pub mod process;

// Re-exports
pub use cleaner::{CleanupCategory, CleanupOutcome, DiskCleaner};
pub use core::{
    AutoCleanController, AutoCleanMode, Classifier, ProcessCategory, ProcessRecord,
    ProcessScorer, ReclaimConfig, TriggerEvent,
};
pub use metrics::{
    DiskUsage, MemoryPressure, ProcessSample, Sampler, SystemReading, ThermalReading,
    ThermalState,
};
pub use monitor::{run_kill_pass, RealtimeMonitor};
pub use process::{terminate, terminate_tree, TerminateError, TerminateOutcome};
