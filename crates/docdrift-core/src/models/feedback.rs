//! User feedback on verification results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::string_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    ThumbsUp,
    ThumbsDown,
    FixAccepted,
    FixDismissed,
    AllDismissed,
}

string_enum!(FeedbackType {
    ThumbsUp => "thumbs_up",
    ThumbsDown => "thumbs_down",
    FixAccepted => "fix_accepted",
    FixDismissed => "fix_dismissed",
    AllDismissed => "all_dismissed",
});

impl FeedbackType {
    /// Counts toward count-based suppression.
    pub fn is_negative(&self) -> bool {
        matches!(self, Self::ThumbsDown | Self::FixDismissed | Self::AllDismissed)
    }

    /// Confirms the finding was useful.
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::ThumbsUp | Self::FixAccepted)
    }
}

/// Structured dismissal reasons offered alongside negative feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickPickReason {
    FalsePositive,
    IntentionallyDifferent,
    DocsAreAspirational,
    NotRelevant,
    WillFixLater,
}

string_enum!(QuickPickReason {
    FalsePositive => "false_positive",
    IntentionallyDifferent => "intentionally_different",
    DocsAreAspirational => "docs_are_aspirational",
    NotRelevant => "not_relevant",
    WillFixLater => "will_fix_later",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    pub repo_id: String,
    pub claim_id: String,
    #[serde(default)]
    pub verification_result_id: Option<String>,
    pub feedback_type: FeedbackType,
    #[serde(default)]
    pub quick_pick: Option<QuickPickReason>,
    #[serde(default)]
    pub free_text: Option<String>,
    pub created_at: DateTime<Utc>,
}
