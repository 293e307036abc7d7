use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;
use crate::models::persona::Persona;
use crate::models::story::{NewStory, Story, StoryContent, StoryStatus};

/// Result of a status transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    NotFound,
    /// The row exists but its current status does not allow the transition.
    Rejected(StoryStatus),
}

/// Persistence contract for story jobs.
///
/// Each row has a single writer: the pipeline run that owns the job writes its
/// content, and only status transitions arrive from elsewhere. Implementations
/// enforce the forward-only lifecycle at the storage layer instead of relying
/// on optimistic versioning.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a row with the placeholder title/body and `IN_PROGRESS` status.
    async fn create_placeholder(&self, new: &NewStory) -> Result<Uuid, PersistenceError>;

    async fn get(&self, id: Uuid) -> Result<Option<Story>, PersistenceError>;

    /// Replaces the placeholder content. Applies only while the row is
    /// `IN_PROGRESS` and `status` is a legal successor; returns whether the
    /// write happened.
    async fn update_content(
        &self,
        id: Uuid,
        content: &StoryContent,
        status: StoryStatus,
    ) -> Result<bool, PersistenceError>;

    async fn update_status(
        &self,
        id: Uuid,
        status: StoryStatus,
    ) -> Result<TransitionOutcome, PersistenceError>;

    /// Most recent stories first.
    async fn list_for_owner(&self, owner: &str, limit: i64)
        -> Result<Vec<Story>, PersistenceError>;

    async fn count_new_for_owner(&self, owner: &str) -> Result<i64, PersistenceError>;
}

/// Read access to user-defined personas.
#[async_trait]
pub trait PersonaStore: Send + Sync {
    async fn get_active_persona(&self, owner: &str) -> Result<Option<Persona>, PersistenceError>;
}

/// Postgres-backed [`JobStore`] and [`PersonaStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn create_placeholder(&self, new: &NewStory) -> Result<Uuid, PersistenceError> {
        Ok(queries::create_story_placeholder(&self.pool, new).await?)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Story>, PersistenceError> {
        queries::get_story(&self.pool, id).await
    }

    async fn update_content(
        &self,
        id: Uuid,
        content: &StoryContent,
        status: StoryStatus,
    ) -> Result<bool, PersistenceError> {
        if !StoryStatus::InProgress.can_transition_to(status) {
            return Ok(false);
        }
        Ok(queries::update_story_content(&self.pool, id, content, status).await?)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: StoryStatus,
    ) -> Result<TransitionOutcome, PersistenceError> {
        if queries::update_story_status(&self.pool, id, status).await? {
            return Ok(TransitionOutcome::Applied);
        }

        Ok(match queries::get_story_status(&self.pool, id).await? {
            Some(current) => TransitionOutcome::Rejected(current),
            None => TransitionOutcome::NotFound,
        })
    }

    async fn list_for_owner(
        &self,
        owner: &str,
        limit: i64,
    ) -> Result<Vec<Story>, PersistenceError> {
        queries::list_stories_for_owner(&self.pool, owner, limit).await
    }

    async fn count_new_for_owner(&self, owner: &str) -> Result<i64, PersistenceError> {
        Ok(queries::count_new_stories(&self.pool, owner).await?)
    }
}

#[async_trait]
impl PersonaStore for PgStore {
    async fn get_active_persona(&self, owner: &str) -> Result<Option<Persona>, PersistenceError> {
        Ok(queries::get_active_persona(&self.pool, owner).await?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored row is malformed: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
