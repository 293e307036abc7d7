use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Title written at placeholder creation, replaced exactly once by the pipeline.
pub const PLACEHOLDER_TITLE: &str = "Story in Progress...";
/// Body written at placeholder creation, replaced exactly once by the pipeline.
pub const PLACEHOLDER_BODY: &str = "Your story is being generated...";

pub const FAILURE_TITLE: &str = "Story Generation Failed";
pub const FAILURE_BODY: &str =
    "We encountered an error while generating your story. Please try again.";

/// Lifecycle of a story job.
///
/// Status only moves forward: `InProgress -> New -> Viewed`. Both successful
/// and failed generations land in `New`; a failure is recognisable by its
/// [`FAILURE_TITLE`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StoryStatus {
    InProgress,
    New,
    Viewed,
}

impl StoryStatus {
    /// Whether a row currently in `self` may be moved to `next`.
    ///
    /// `Viewed -> Viewed` is accepted so that marking a story viewed twice is
    /// an idempotent acknowledgement.
    pub fn can_transition_to(self, next: StoryStatus) -> bool {
        matches!(
            (self, next),
            (StoryStatus::InProgress, StoryStatus::New)
                | (StoryStatus::New, StoryStatus::Viewed)
                | (StoryStatus::Viewed, StoryStatus::Viewed)
        )
    }

    /// Statuses a row must be in for a transition to `self` to apply.
    pub fn predecessors(self) -> &'static [StoryStatus] {
        match self {
            StoryStatus::InProgress => &[],
            StoryStatus::New => &[StoryStatus::InProgress],
            StoryStatus::Viewed => &[StoryStatus::New, StoryStatus::Viewed],
        }
    }
}

/// Output kinds a client may request.
///
/// Accepts the legacy client labels ("Text Story", "Comic Book") as aliases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StoryFormat {
    #[serde(alias = "Text Story")]
    #[strum(to_string = "text", serialize = "Text Story")]
    Text,
    #[serde(alias = "Comic Book")]
    #[strum(to_string = "illustrated", serialize = "Comic Book")]
    Illustrated,
}

impl StoryFormat {
    pub fn defaults() -> Vec<StoryFormat> {
        vec![StoryFormat::Illustrated, StoryFormat::Text]
    }
}

/// A persisted story job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Story {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub prompt: String,
    pub illustrations: Vec<String>,
    pub requested_formats: Vec<StoryFormat>,
    pub owner: Option<String>,
    pub status: StoryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Story {
    pub fn wants_illustrations(&self) -> bool {
        self.requested_formats.contains(&StoryFormat::Illustrated)
    }

    pub fn is_placeholder(&self) -> bool {
        self.title == PLACEHOLDER_TITLE && self.body == PLACEHOLDER_BODY
    }
}

/// Fields supplied when the placeholder row is created.
#[derive(Debug, Clone)]
pub struct NewStory {
    pub prompt: String,
    pub formats: Vec<StoryFormat>,
    pub owner: Option<String>,
}

/// Final content written by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryContent {
    pub title: String,
    pub body: String,
    pub illustrations: Vec<String>,
}

impl StoryContent {
    pub fn failure() -> Self {
        Self {
            title: FAILURE_TITLE.to_string(),
            body: FAILURE_BODY.to_string(),
            illustrations: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_only_moves_forward() {
        use StoryStatus::*;
        assert!(InProgress.can_transition_to(New));
        assert!(New.can_transition_to(Viewed));
        assert!(Viewed.can_transition_to(Viewed));

        assert!(!New.can_transition_to(InProgress));
        assert!(!Viewed.can_transition_to(InProgress));
        assert!(!Viewed.can_transition_to(New));
        assert!(!InProgress.can_transition_to(Viewed));
        assert!(!InProgress.can_transition_to(InProgress));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(StoryStatus::InProgress.to_string(), "IN_PROGRESS");
        assert_eq!(StoryStatus::from_str("VIEWED").unwrap(), StoryStatus::Viewed);
        assert_eq!(
            serde_json::to_string(&StoryStatus::New).unwrap(),
            "\"NEW\""
        );
    }

    #[test]
    fn test_format_accepts_legacy_labels() {
        let formats: Vec<StoryFormat> =
            serde_json::from_str(r#"["Comic Book", "text"]"#).unwrap();
        assert_eq!(formats, vec![StoryFormat::Illustrated, StoryFormat::Text]);
        assert_eq!(StoryFormat::from_str("Text Story").unwrap(), StoryFormat::Text);
        assert_eq!(StoryFormat::Illustrated.to_string(), "illustrated");
    }
}
