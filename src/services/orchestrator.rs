//! Background pipeline that turns a placeholder job into a finished story.
//!
//! Each job runs once, detached from the request that created it:
//! enrichment, story text, then (if requested) breakdown and panels, and a
//! single terminal write to the job store. Text failures produce the failure
//! record; illustration failures are handled per [`IllustrationFailurePolicy`].

use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use strum::Display;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::store::{JobStore, PersonaStore};
use crate::models::story::{StoryContent, StoryFormat, StoryStatus};
use crate::services::breakdown::break_into_four;
use crate::services::enrichment::{
    character_references, detect_and_enrich, personalization_note, EnrichedPrompt,
};
use crate::services::openai::{ImageSynthesis, TextCompletion, UpstreamError};
use crate::services::panels::{is_placeholder_url, PanelJob, PanelRenderer};
use crate::services::storage::ObjectStore;
use crate::services::story::{compile_story, CompiledStory};

const EVENT_CAPACITY: usize = 64;
const DEV_MARKER: &str = "(dev)";

/// What happens to a job whose story text succeeded but whose illustration
/// stage failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IllustrationFailurePolicy {
    /// Keep the story and store it without illustrations.
    #[default]
    Isolate,
    /// Discard the story and write the failure record.
    FailJob,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub failure_policy: IllustrationFailurePolicy,
    /// Panels returned for prompts containing "(dev)".
    pub dev_panels: Option<[String; 4]>,
}

/// External services the pipeline calls.
#[derive(Clone)]
pub struct Collaborators {
    pub text: Arc<dyn TextCompletion>,
    pub images: Arc<dyn ImageSynthesis>,
    pub objects: Arc<dyn ObjectStore>,
    pub jobs: Arc<dyn JobStore>,
    pub personas: Arc<dyn PersonaStore>,
}

/// A job whose placeholder row already exists.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub id: Uuid,
    pub prompt: String,
    pub formats: Vec<StoryFormat>,
    pub owner: Option<String>,
}

impl JobSpec {
    fn wants_illustrations(&self) -> bool {
        self.formats.contains(&StoryFormat::Illustrated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FailureStage {
    Story,
    Illustrations,
}

/// Terminal result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The story was written with `status = NEW`. `failed_panels` counts
    /// placeholder URLs among the stored illustrations.
    Completed { panels: usize, failed_panels: usize },
    /// The failure record was written with `status = NEW`.
    Failed { stage: FailureStage, reason: String },
    /// The terminal write did not happen; the row stays `IN_PROGRESS`.
    Unpersisted { reason: String },
}

/// Published once per job after its terminal write attempt.
#[derive(Debug, Clone)]
pub struct JobEvent {
    pub job_id: Uuid,
    pub outcome: JobOutcome,
}

pub struct StoryPipeline {
    deps: Collaborators,
    settings: PipelineSettings,
    events: broadcast::Sender<JobEvent>,
}

impl StoryPipeline {
    pub fn new(deps: Collaborators, settings: PipelineSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            deps,
            settings,
            events,
        }
    }

    /// Receives an event for every job that finishes after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Runs the job on the tokio runtime and returns its handle.
    pub fn spawn(self: &Arc<Self>, job: JobSpec) -> JoinHandle<JobOutcome> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.run(job).await })
    }

    /// Generates the job's content and performs its terminal write.
    pub async fn run(&self, job: JobSpec) -> JobOutcome {
        let start = Instant::now();
        info!(job_id = %job.id, formats = ?job.formats, "Story job started");

        let (content, outcome) = match self.generate(&job).await {
            Ok(content) => {
                let outcome = JobOutcome::Completed {
                    panels: content.illustrations.len(),
                    failed_panels: content
                        .illustrations
                        .iter()
                        .filter(|u| is_placeholder_url(u))
                        .count(),
                };
                (content, outcome)
            }
            Err((stage, reason)) => {
                error!(job_id = %job.id, stage = %stage, error = %reason, "Story job failed");
                (StoryContent::failure(), JobOutcome::Failed { stage, reason })
            }
        };

        let outcome = match self
            .deps
            .jobs
            .update_content(job.id, &content, StoryStatus::New)
            .await
        {
            Ok(true) => outcome,
            Ok(false) => {
                warn!(job_id = %job.id, "Job row missing or no longer in progress, result dropped");
                JobOutcome::Unpersisted {
                    reason: "job row missing or no longer in progress".to_string(),
                }
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to persist story result");
                JobOutcome::Unpersisted {
                    reason: e.to_string(),
                }
            }
        };

        record_metrics(&outcome, start);
        info!(
            job_id = %job.id,
            duration_ms = start.elapsed().as_millis() as u64,
            outcome = ?outcome,
            "Story job finished"
        );

        // No subscribers is not an error.
        let _ = self.events.send(JobEvent {
            job_id: job.id,
            outcome: outcome.clone(),
        });
        outcome
    }

    async fn generate(&self, job: &JobSpec) -> Result<StoryContent, (FailureStage, String)> {
        let enriched =
            detect_and_enrich(self.deps.personas.as_ref(), &job.prompt, job.owner.as_deref())
                .await;

        let story = compile_story(self.deps.text.as_ref(), &enriched.text)
            .await
            .map_err(|e| (FailureStage::Story, e.to_string()))?;

        let illustrations = if job.wants_illustrations() {
            match self.illustrate(job, &enriched, &story).await {
                Ok(urls) => urls,
                Err(e) => match self.settings.failure_policy {
                    IllustrationFailurePolicy::Isolate => {
                        warn!(
                            job_id = %job.id,
                            error = %e,
                            "Illustration stage failed, keeping story without illustrations"
                        );
                        Vec::new()
                    }
                    IllustrationFailurePolicy::FailJob => {
                        return Err((FailureStage::Illustrations, e.to_string()));
                    }
                },
            }
        } else {
            Vec::new()
        };

        Ok(StoryContent {
            title: story.title,
            body: story.body,
            illustrations,
        })
    }

    async fn illustrate(
        &self,
        job: &JobSpec,
        enriched: &EnrichedPrompt,
        story: &CompiledStory,
    ) -> Result<Vec<String>, UpstreamError> {
        if is_dev_prompt(&job.prompt) {
            if let Some(panels) = &self.settings.dev_panels {
                info!(job_id = %job.id, "Dev prompt, returning configured panels");
                return Ok(panels.to_vec());
            }
        }

        let parts = break_into_four(self.deps.text.as_ref(), &story.body).await;
        let references = character_references(&enriched.text);
        let note = enriched.persona.as_ref().map(personalization_note);

        let renderer = PanelRenderer {
            text: self.deps.text.as_ref(),
            images: self.deps.images.as_ref(),
            objects: self.deps.objects.as_ref(),
        };
        let urls = renderer
            .render_panels(PanelJob {
                job_id: job.id,
                title: &story.title,
                story: &story.body,
                parts: &parts,
                character_references: references.as_deref(),
                personalization_note: note.as_deref(),
            })
            .await?;
        Ok(urls.to_vec())
    }
}

fn is_dev_prompt(prompt: &str) -> bool {
    prompt.to_lowercase().contains(DEV_MARKER)
}

fn record_metrics(outcome: &JobOutcome, start: Instant) {
    match outcome {
        JobOutcome::Completed { .. } => {
            metrics::counter!("story_jobs_completed_total").increment(1);
        }
        JobOutcome::Failed { stage, .. } => {
            metrics::counter!("story_jobs_failed_total", "stage" => stage.to_string())
                .increment(1);
        }
        JobOutcome::Unpersisted { .. } => {
            metrics::counter!("story_jobs_unpersisted_total").increment(1);
        }
    }
    metrics::histogram!("story_job_duration_seconds").record(start.elapsed().as_secs_f64());
}
