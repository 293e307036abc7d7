use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::story::{Story, StoryFormat, StoryStatus};

/// Maximum accepted prompt length, in characters.
pub const MAX_PROMPT_CHARS: usize = 4000;

/// Request to generate a story.
///
/// An empty prompt is allowed and produces a story on a generic theme.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitStoryRequest {
    #[serde(default)]
    #[garde(length(chars, max = 4000))]
    pub prompt: String,

    #[serde(default = "StoryFormat::defaults")]
    #[garde(length(min = 1, max = 2))]
    pub formats: Vec<StoryFormat>,
}

/// Response after submitting a story request.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitStoryResponse {
    pub story_id: Uuid,
    pub status: StoryStatus,
    pub message: String,
}

/// Response for polling a story job.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoryStatusResponse {
    pub story_id: Uuid,
    pub status: StoryStatus,
    pub title: String,
    pub story: String,
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Story> for StoryStatusResponse {
    fn from(story: Story) -> Self {
        Self {
            story_id: story.id,
            status: story.status,
            title: story.title,
            story: story.body,
            image_urls: story.illustrations,
            created_at: story.created_at,
            updated_at: story.updated_at,
        }
    }
}

/// One entry of an owner's story list.
#[derive(Debug, Serialize, Deserialize)]
pub struct StorySummary {
    pub id: Uuid,
    pub title: String,
    pub story_content: String,
    pub prompt: String,
    pub image_urls: Vec<String>,
    pub formats: Vec<StoryFormat>,
    pub status: StoryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Story> for StorySummary {
    fn from(story: Story) -> Self {
        Self {
            id: story.id,
            title: story.title,
            story_content: story.body,
            prompt: story.prompt,
            image_urls: story.illustrations,
            formats: story.requested_formats,
            status: story.status,
            created_at: story.created_at,
            updated_at: story.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MyStoriesResponse {
    pub stories: Vec<StorySummary>,
    pub new_stories_count: i64,
}

/// Request for a set of fun facts. An empty prompt asks for general facts.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct FunFactsRequest {
    #[serde(default)]
    #[garde(length(chars, max = 4000))]
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunFact {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FunFactsResponse {
    pub facts: Vec<FunFact>,
}
