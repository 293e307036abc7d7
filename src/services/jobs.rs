//! Client-facing operations on story jobs: submit, poll, mark viewed, list.

use garde::Validate;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::store::{JobStore, PersistenceError, TransitionOutcome};
use crate::models::request::{
    MyStoriesResponse, StoryStatusResponse, StorySummary, SubmitStoryRequest, SubmitStoryResponse,
};
use crate::models::story::{NewStory, StoryStatus};
use crate::services::clock::Clock;
use crate::services::dedup::SubmissionGuard;
use crate::services::orchestrator::{JobOutcome, JobSpec, StoryPipeline};

const SUBMITTED_MESSAGE: &str = "Story generation started! Check My Stories for updates.";

/// An accepted submission. The handle resolves when the background run ends;
/// dropping it does not cancel the job.
pub struct Submission {
    pub response: SubmitStoryResponse,
    pub handle: JoinHandle<JobOutcome>,
}

pub struct StoryService {
    jobs: Arc<dyn JobStore>,
    guard: Arc<dyn SubmissionGuard>,
    clock: Arc<dyn Clock>,
    pipeline: Arc<StoryPipeline>,
}

impl StoryService {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        guard: Arc<dyn SubmissionGuard>,
        clock: Arc<dyn Clock>,
        pipeline: Arc<StoryPipeline>,
    ) -> Self {
        Self {
            jobs,
            guard,
            clock,
            pipeline,
        }
    }

    pub fn pipeline(&self) -> &Arc<StoryPipeline> {
        &self.pipeline
    }

    /// Validates the request, applies the duplicate guard, creates the
    /// placeholder row and starts the pipeline in the background.
    pub async fn submit(
        &self,
        request: SubmitStoryRequest,
        owner: Option<String>,
    ) -> Result<Submission, StoryServiceError> {
        if let Err(report) = request.validate() {
            metrics::counter!("story_jobs_rejected_total", "reason" => "validation").increment(1);
            return Err(StoryServiceError::Validation(report));
        }

        if !self
            .guard
            .admit(owner.as_deref(), &request.prompt, self.clock.now())
        {
            warn!(owner = ?owner, "Duplicate submission rejected");
            metrics::counter!("story_jobs_rejected_total", "reason" => "duplicate").increment(1);
            return Err(StoryServiceError::RateLimited);
        }

        let mut formats = request.formats;
        formats.dedup();

        let created = self
            .jobs
            .create_placeholder(&NewStory {
                prompt: request.prompt.clone(),
                formats: formats.clone(),
                owner: owner.clone(),
            })
            .await;
        let id = match created {
            Ok(id) => id,
            Err(e) => {
                // No job exists, so a retry must not be rejected as a duplicate.
                self.guard.release(owner.as_deref(), &request.prompt);
                return Err(e.into());
            }
        };

        info!(job_id = %id, owner = ?owner, "Story job submitted");
        metrics::counter!("story_jobs_submitted_total").increment(1);

        let handle = self.pipeline.spawn(JobSpec {
            id,
            prompt: request.prompt,
            formats,
            owner,
        });

        Ok(Submission {
            response: SubmitStoryResponse {
                story_id: id,
                status: StoryStatus::InProgress,
                message: SUBMITTED_MESSAGE.to_string(),
            },
            handle,
        })
    }

    pub async fn get_status(&self, id: Uuid) -> Result<StoryStatusResponse, StoryServiceError> {
        self.jobs
            .get(id)
            .await?
            .map(StoryStatusResponse::from)
            .ok_or(StoryServiceError::NotFound(id))
    }

    /// Moves a finished story to `VIEWED`. Repeating the call is a no-op.
    pub async fn mark_viewed(&self, id: Uuid) -> Result<(), StoryServiceError> {
        match self.jobs.update_status(id, StoryStatus::Viewed).await? {
            TransitionOutcome::Applied => {
                info!(job_id = %id, "Story marked as viewed");
                Ok(())
            }
            TransitionOutcome::NotFound => Err(StoryServiceError::NotFound(id)),
            TransitionOutcome::Rejected(current) => {
                Err(StoryServiceError::InvalidTransition { id, current })
            }
        }
    }

    /// The owner's most recent stories and how many are still unread.
    pub async fn list_for_owner(
        &self,
        owner: &str,
        limit: i64,
    ) -> Result<MyStoriesResponse, StoryServiceError> {
        let stories = self.jobs.list_for_owner(owner, limit).await?;
        let new_stories_count = self.jobs.count_new_for_owner(owner).await?;

        Ok(MyStoriesResponse {
            stories: stories.into_iter().map(StorySummary::from).collect(),
            new_stories_count,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoryServiceError {
    #[error("Invalid request: {0}")]
    Validation(garde::Report),

    #[error("An identical story request was just submitted, please wait a moment")]
    RateLimited,

    #[error("Story {0} not found")]
    NotFound(Uuid),

    #[error("Story {id} cannot be marked viewed while {current}")]
    InvalidTransition { id: Uuid, current: StoryStatus },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
