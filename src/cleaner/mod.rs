//! Disk cleanup: the target catalog and the execution pass.

pub mod executor;
pub mod targets;

pub use executor::{dir_size, format_size, CleanupOutcome, DiskCleaner};
pub use targets::{default_targets, CleanupCategory, CleanupTarget};
