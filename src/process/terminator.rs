//! Graceful-then-forceful process termination.
//!
//! Every kill goes through the same two-phase sequence: re-validate the
//! target against the protection rule immediately before acting (the
//! ranked snapshot it came from may be seconds stale), send SIGTERM, poll
//! for exit through a grace period, then escalate to SIGKILL. The caller
//! supplies the protection probe so the decision stays with the engine
//! and this module only sequences signals.

use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

/// Liveness poll interval during the grace period.
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How long to wait for SIGKILL to take effect before reporting failure.
const KILL_CONFIRM: Duration = Duration::from_millis(500);

/// Fresh protection verdict for a pid, produced by the caller's probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionVerdict {
    /// Safe to terminate
    Clear,
    /// Protection rule matched; do not touch
    Protected,
    /// Process no longer exists
    Gone,
}

/// How a termination attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateOutcome {
    /// Exited within the grace period after SIGTERM
    Terminated,
    /// Needed SIGKILL
    ForceKilled,
    /// Already gone before any signal was sent
    AlreadyGone,
    /// Protection re-validation refused the kill
    Refused,
}

#[derive(Debug, Error)]
pub enum TerminateError {
    #[error("permission denied signalling pid {0}")]
    PermissionDenied(u32),
    #[error("pid {0} survived SIGKILL")]
    Unkillable(u32),
    #[error("process termination is not supported on this platform")]
    Unsupported,
}

/// Terminate one process. `probe` is consulted immediately before
/// signalling; a `Protected` verdict aborts with `Refused`.
#[cfg(unix)]
pub fn terminate<F>(pid: u32, grace: Duration, probe: F) -> Result<TerminateOutcome, TerminateError>
where
    F: Fn(u32) -> ProtectionVerdict,
{
    match probe(pid) {
        ProtectionVerdict::Protected => {
            warn!(pid, "termination refused: protection rule matched at kill time");
            return Ok(TerminateOutcome::Refused);
        }
        ProtectionVerdict::Gone => return Ok(TerminateOutcome::AlreadyGone),
        ProtectionVerdict::Clear => {}
    }

    match send_signal(pid, libc::SIGTERM) {
        SignalResult::Delivered => {}
        SignalResult::NoSuchProcess => return Ok(TerminateOutcome::AlreadyGone),
        SignalResult::PermissionDenied => {
            return Err(TerminateError::PermissionDenied(pid));
        }
    }

    if wait_for_exit(pid, grace) {
        info!(pid, "terminated gracefully");
        return Ok(TerminateOutcome::Terminated);
    }

    // Grace expired; escalate.
    match send_signal(pid, libc::SIGKILL) {
        SignalResult::Delivered => {}
        SignalResult::NoSuchProcess => return Ok(TerminateOutcome::Terminated),
        SignalResult::PermissionDenied => {
            return Err(TerminateError::PermissionDenied(pid));
        }
    }

    if wait_for_exit(pid, KILL_CONFIRM) {
        info!(pid, "force killed after grace period");
        Ok(TerminateOutcome::ForceKilled)
    } else {
        Err(TerminateError::Unkillable(pid))
    }
}

#[cfg(not(unix))]
pub fn terminate<F>(
    _pid: u32,
    _grace: Duration,
    _probe: F,
) -> Result<TerminateOutcome, TerminateError>
where
    F: Fn(u32) -> ProtectionVerdict,
{
    Err(TerminateError::Unsupported)
}

/// Terminate a process and its descendants, children first so parents
/// cannot respawn them mid-pass. `descendants` comes from the sampler's
/// process-tree walk; each kill gets half the grace of the root.
/// Returns how many processes actually went away.
pub fn terminate_tree<F>(
    pid: u32,
    descendants: &[u32],
    grace: Duration,
    probe: F,
) -> (usize, Vec<TerminateError>)
where
    F: Fn(u32) -> ProtectionVerdict,
{
    let mut killed = 0;
    let mut errors = Vec::new();

    for &child in descendants.iter().rev() {
        match terminate(child, grace / 2, &probe) {
            Ok(TerminateOutcome::Terminated | TerminateOutcome::ForceKilled) => killed += 1,
            Ok(TerminateOutcome::AlreadyGone | TerminateOutcome::Refused) => {}
            Err(e) => errors.push(e),
        }
    }

    match terminate(pid, grace, &probe) {
        Ok(TerminateOutcome::Terminated | TerminateOutcome::ForceKilled) => killed += 1,
        Ok(TerminateOutcome::AlreadyGone | TerminateOutcome::Refused) => {}
        Err(e) => errors.push(e),
    }

    (killed, errors)
}

#[cfg(unix)]
enum SignalResult {
    Delivered,
    NoSuchProcess,
    PermissionDenied,
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: libc::c_int) -> SignalResult {
    let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if rc == 0 {
        return SignalResult::Delivered;
    }
    match std::io::Error::last_os_error().raw_os_error() {
        Some(libc::ESRCH) => SignalResult::NoSuchProcess,
        Some(libc::EPERM) => SignalResult::PermissionDenied,
        _ => SignalResult::NoSuchProcess,
    }
}

/// Poll liveness with signal 0 until the process exits or the deadline
/// passes. EPERM means alive but unsignallable, which still counts as
/// alive here.
#[cfg(unix)]
fn wait_for_exit(pid: u32, deadline: Duration) -> bool {
    let start = Instant::now();
    loop {
        let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
        if rc != 0
            && std::io::Error::last_os_error().raw_os_error() == Some(libc::ESRCH)
        {
            return true;
        }
        if start.elapsed() >= deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;

    fn spawn_sleeper() -> std::process::Child {
        Command::new("sleep")
            .arg("60")
            .spawn()
            .expect("spawn sleep")
    }

    fn clear(_: u32) -> ProtectionVerdict {
        ProtectionVerdict::Clear
    }

    /// Reap the child in a background thread so the liveness poll sees
    /// ESRCH instead of a zombie once the signal lands.
    fn reap(mut child: std::process::Child) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            let _ = child.wait();
        })
    }

    #[test]
    fn sigterm_is_enough_for_a_sleeper() {
        let child = spawn_sleeper();
        let pid = child.id();
        let reaper = reap(child);

        let outcome = terminate(pid, Duration::from_secs(2), clear).expect("terminate");
        assert_eq!(outcome, TerminateOutcome::Terminated);
        reaper.join().unwrap();
    }

    #[test]
    fn protected_verdict_refuses_without_signalling() {
        let mut child = spawn_sleeper();
        let outcome = terminate(child.id(), Duration::from_secs(1), |_| {
            ProtectionVerdict::Protected
        })
        .expect("terminate");
        assert_eq!(outcome, TerminateOutcome::Refused);

        // The sleeper must still be alive.
        assert!(child.try_wait().expect("try_wait").is_none());
        let _ = child.kill();
        let _ = child.wait();
    }

    #[test]
    fn exited_process_reports_already_gone() {
        let mut child = spawn_sleeper();
        let pid = child.id();
        child.kill().expect("kill");
        child.wait().expect("wait");

        let outcome = terminate(pid, Duration::from_secs(1), clear).expect("terminate");
        assert_eq!(outcome, TerminateOutcome::AlreadyGone);
    }

    #[test]
    fn gone_verdict_short_circuits() {
        let outcome = terminate(u32::MAX - 1, Duration::from_secs(1), |_| {
            ProtectionVerdict::Gone
        })
        .expect("terminate");
        assert_eq!(outcome, TerminateOutcome::AlreadyGone);
    }

    #[test]
    fn tree_kill_counts_children_and_root() {
        let parent = spawn_sleeper();
        let child_a = spawn_sleeper();
        let child_b = spawn_sleeper();
        let pids = (parent.id(), child_a.id(), child_b.id());
        let reapers = [reap(parent), reap(child_a), reap(child_b)];

        // These are siblings, not a real tree; the sequencing under test
        // does not care who spawned whom.
        let descendants = vec![pids.1, pids.2];
        let (killed, errors) =
            terminate_tree(pids.0, &descendants, Duration::from_secs(2), clear);

        assert_eq!(killed, 3);
        assert!(errors.is_empty());
        for r in reapers {
            r.join().unwrap();
        }
    }
}
