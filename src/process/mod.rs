//! Process termination with protection re-validation and escalation.

pub mod terminator;

pub use terminator::{
    terminate, terminate_tree, ProtectionVerdict, TerminateError, TerminateOutcome,
};
