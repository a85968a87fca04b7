//! DocDrift data model.

pub mod agent_task;
pub mod claim;
pub mod co_change;
pub mod code;
pub mod feedback;
pub mod mapping;
pub mod scan;
pub mod suppression;
pub mod verification;

pub use agent_task::{
    AgentMode, AgentTask, AgentTaskStatus, AgentTaskType, AgentVerdict, ClassificationPayload,
    ClassificationResult, EvidenceFile, ExtractionPayload, ExtractionResult,
    FeedbackInterpretation, FeedbackInterpretationPayload, FixGenerationPayload, FixResult,
    InterpretedAction, PostCheckPayload, VerificationPayload,
};
pub use claim::{Claim, ClaimType, ExtractedValue, ExtractionMethod, Testability, VerificationStatus};
pub use co_change::CoChange;
pub use code::{CodeEntity, EntityType, RepoManifest};
pub use feedback::{Feedback, FeedbackType, QuickPickReason};
pub use mapping::{CandidateSet, ClaimMapping, MappingMethod, MappingStatus, MappingWeights};
pub use scan::{ScanRun, ScanStatus};
pub use suppression::{RuleSource, SuppressionRule, SuppressionScope};
pub use verification::{Severity, Tier, Verdict, VerificationPath, VerificationResult};

/// Implements `as_str`, `Display` and `FromStr` for a fieldless snake_case enum.
/// The string forms match the serde representation and the SQLite columns.
macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok($ty::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($ty), other)),
                }
            }
        }
    };
}

pub(crate) use string_enum;
