//! Candidate evaluation and scan orchestration.
//!
//! The staged filter funnel per symbol/side, the composite ranking score,
//! and the two-pass bounded-concurrency scan engine.

mod engine;
mod evaluator;
mod score;
mod settings;

pub use engine::{PassNeeds, ScanEngine, ScanOutcome, ScanSummary};
pub use evaluator::{evaluate_side, max_safe_leverage, Candidate};
pub use score::composite_score;
pub use settings::{Pass, ScanSettings};
