//! The decision engine: classification, scoring, configuration, and the
//! auto-cleanup trigger.

pub mod classifier;
pub mod config;
pub mod controller;
pub mod scorer;

pub use classifier::{is_protected, Classifier, ProcessCategory};
pub use config::{ConfigError, ReclaimConfig, ScoreWeights};
pub use controller::{AutoCleanController, AutoCleanMode, ModeThresholds, TriggerEvent};
pub use scorer::{category_modifier, ProcessRecord, ProcessScorer};
