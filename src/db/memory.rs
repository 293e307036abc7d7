//! Process-local store used when no database is configured, and by tests.
//!
//! Holds the same invariants as the Postgres store: content is written only
//! while a story is `IN_PROGRESS`, and status only moves forward.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::store::{JobStore, PersistenceError, PersonaStore, TransitionOutcome};
use crate::models::persona::Persona;
use crate::models::story::{
    NewStory, Story, StoryContent, StoryStatus, PLACEHOLDER_BODY, PLACEHOLDER_TITLE,
};
use crate::services::clock::{Clock, SystemClock};

#[derive(Clone)]
pub struct InMemoryStore {
    stories: Arc<RwLock<HashMap<Uuid, Story>>>,
    personas: Arc<RwLock<HashMap<String, Persona>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            stories: Arc::new(RwLock::new(HashMap::new())),
            personas: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Make `persona` the owner's active persona, replacing any previous one.
    pub async fn set_persona(&self, owner: &str, persona: Persona) {
        self.personas.write().await.insert(owner.to_string(), persona);
    }

    pub async fn len(&self) -> usize {
        self.stories.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.stories.read().await.is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn create_placeholder(&self, new: &NewStory) -> Result<Uuid, PersistenceError> {
        let now = self.clock.now();
        let story = Story {
            id: Uuid::new_v4(),
            title: PLACEHOLDER_TITLE.to_string(),
            body: PLACEHOLDER_BODY.to_string(),
            prompt: new.prompt.clone(),
            illustrations: Vec::new(),
            requested_formats: new.formats.clone(),
            owner: new.owner.clone(),
            status: StoryStatus::InProgress,
            created_at: now,
            updated_at: now,
        };
        let id = story.id;
        self.stories.write().await.insert(id, story);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Story>, PersistenceError> {
        Ok(self.stories.read().await.get(&id).cloned())
    }

    async fn update_content(
        &self,
        id: Uuid,
        content: &StoryContent,
        status: StoryStatus,
    ) -> Result<bool, PersistenceError> {
        let mut stories = self.stories.write().await;
        let Some(story) = stories.get_mut(&id) else {
            return Ok(false);
        };
        if story.status != StoryStatus::InProgress || !story.status.can_transition_to(status) {
            return Ok(false);
        }

        story.title = content.title.clone();
        story.body = content.body.clone();
        story.illustrations = content.illustrations.clone();
        story.status = status;
        story.updated_at = self.clock.now();
        Ok(true)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: StoryStatus,
    ) -> Result<TransitionOutcome, PersistenceError> {
        let mut stories = self.stories.write().await;
        let Some(story) = stories.get_mut(&id) else {
            return Ok(TransitionOutcome::NotFound);
        };
        if !story.status.can_transition_to(status) {
            return Ok(TransitionOutcome::Rejected(story.status));
        }

        story.status = status;
        story.updated_at = self.clock.now();
        Ok(TransitionOutcome::Applied)
    }

    async fn list_for_owner(
        &self,
        owner: &str,
        limit: i64,
    ) -> Result<Vec<Story>, PersistenceError> {
        let stories = self.stories.read().await;
        let mut owned: Vec<Story> = stories
            .values()
            .filter(|s| s.owner.as_deref() == Some(owner))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        owned.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(owned)
    }

    async fn count_new_for_owner(&self, owner: &str) -> Result<i64, PersistenceError> {
        let stories = self.stories.read().await;
        let count = stories
            .values()
            .filter(|s| s.owner.as_deref() == Some(owner) && s.status == StoryStatus::New)
            .count();
        Ok(count as i64)
    }
}

#[async_trait]
impl PersonaStore for InMemoryStore {
    async fn get_active_persona(&self, owner: &str) -> Result<Option<Persona>, PersistenceError> {
        Ok(self.personas.read().await.get(owner).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::story::StoryFormat;

    fn new_story(owner: Option<&str>) -> NewStory {
        NewStory {
            prompt: "a brave mouse".to_string(),
            formats: vec![StoryFormat::Text],
            owner: owner.map(str::to_string),
        }
    }

    fn content(title: &str) -> StoryContent {
        StoryContent {
            title: title.to_string(),
            body: "body".to_string(),
            illustrations: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_placeholder_is_overwritten_once() {
        let store = InMemoryStore::new();
        let id = store.create_placeholder(&new_story(None)).await.unwrap();

        let story = store.get(id).await.unwrap().unwrap();
        assert!(story.is_placeholder());
        assert_eq!(story.status, StoryStatus::InProgress);

        assert!(store.update_content(id, &content("First"), StoryStatus::New).await.unwrap());
        assert!(!store.update_content(id, &content("Second"), StoryStatus::New).await.unwrap());

        let story = store.get(id).await.unwrap().unwrap();
        assert_eq!(story.title, "First");
        assert_eq!(story.status, StoryStatus::New);
    }

    #[tokio::test]
    async fn test_status_transitions_are_forward_only() {
        let store = InMemoryStore::new();
        let id = store.create_placeholder(&new_story(None)).await.unwrap();

        assert_eq!(
            store.update_status(id, StoryStatus::Viewed).await.unwrap(),
            TransitionOutcome::Rejected(StoryStatus::InProgress)
        );
        assert!(store.update_content(id, &content("T"), StoryStatus::New).await.unwrap());
        assert_eq!(
            store.update_status(id, StoryStatus::Viewed).await.unwrap(),
            TransitionOutcome::Applied
        );
        assert_eq!(
            store.update_status(id, StoryStatus::New).await.unwrap(),
            TransitionOutcome::Rejected(StoryStatus::Viewed)
        );
        assert_eq!(
            store.update_status(Uuid::new_v4(), StoryStatus::Viewed).await.unwrap(),
            TransitionOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_owner_listing_and_new_count() {
        let store = InMemoryStore::new();
        let a = store.create_placeholder(&new_story(Some("u1"))).await.unwrap();
        store.create_placeholder(&new_story(Some("u1"))).await.unwrap();
        store.create_placeholder(&new_story(Some("u2"))).await.unwrap();
        store.update_content(a, &content("Done"), StoryStatus::New).await.unwrap();

        assert_eq!(store.list_for_owner("u1", 50).await.unwrap().len(), 2);
        assert_eq!(store.list_for_owner("u1", 1).await.unwrap().len(), 1);
        assert_eq!(store.count_new_for_owner("u1").await.unwrap(), 1);
        assert_eq!(store.count_new_for_owner("u2").await.unwrap(), 0);
    }
}
