//! Suppression rules and the feedback that creates them.

pub mod engine;
pub mod feedback;

pub use engine::{RuleSet, RuleTarget, SuppressionEngine};
pub use feedback::{FeedbackInput, FeedbackOutcome, FeedbackService};
