//! Renders the four comic panels of an illustrated story concurrently.

use futures::future::join_all;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::services::openai::{ImageSynthesis, TextCompletion, UpstreamError};
use crate::services::storage::{sniff_image, ObjectStore, StorageError};

/// Stored in a panel slot when generating or uploading that panel failed.
pub const PANEL_FAILED_URL: &str =
    "https://via.placeholder.com/400x300?text=Comic+Generation+Failed";

/// Stored in a panel slot when the image was generated but no object store
/// is configured.
pub const UPLOAD_DISABLED_URL: &str =
    "https://via.placeholder.com/400x300?text=Image+Upload+Disabled";

const GUIDE_MAX_TOKENS: u32 = 600;
const GUIDE_TEMPERATURE: f32 = 0.1;

const GUIDE_SYSTEM_PROMPT: &str = "You are an expert comic book artist specialising in \
character consistency. Write a visual style guide that keeps characters identical across \
several comic panels. If character references are provided, treat them as the definitive \
character descriptions. Cover character appearance, colour palettes and art style.";

const PANEL_LAYOUT: &str = "LAYOUT:\n\
- Create exactly 4 panels in a 2x2 grid layout\n\
- Panel arrangement: [Panel 1] [Panel 2]\n\
                     [Panel 3] [Panel 4]\n\
- Each panel moves this part of the story forward in order";

const PANEL_STYLE: &str = "VISUAL REQUIREMENTS:\n\
- Cute, friendly characters with big eyes and gentle expressions\n\
- Soft pastel colours and a storybook look\n\
- Speech bubbles or captions where they help\n\
- Clear visual storytelling suitable for children aged 3 to 5";

/// Inputs for one illustrated story.
#[derive(Debug, Clone, Copy)]
pub struct PanelJob<'a> {
    pub job_id: Uuid,
    pub title: &'a str,
    pub story: &'a str,
    pub parts: &'a [String; 4],
    pub character_references: Option<&'a str>,
    pub personalization_note: Option<&'a str>,
}

/// Produces panel URLs from story parts using the text, image and object
/// store collaborators.
pub struct PanelRenderer<'a> {
    pub text: &'a dyn TextCompletion,
    pub images: &'a dyn ImageSynthesis,
    pub objects: &'a dyn ObjectStore,
}

impl PanelRenderer<'_> {
    /// Returns one URL per part, in part order.
    ///
    /// Only a failure to build the shared consistency guide is returned as an
    /// error. A panel that fails on its own gets a placeholder URL.
    pub async fn render_panels(&self, job: PanelJob<'_>) -> Result<[String; 4], UpstreamError> {
        let guide = self.consistency_guide(&job).await?;

        let start = Instant::now();
        let job_id = job.job_id;
        let renders = job.parts.iter().enumerate().map(|(index, part)| {
            let prompt = panel_prompt(&job, part, &guide, index);
            async move { (index, self.render_one(job_id, index, &prompt).await) }
        });

        let mut urls: [String; 4] = Default::default();
        for (index, url) in join_all(renders).await {
            urls[index] = url;
        }

        let failed = urls.iter().filter(|u| is_placeholder_url(u)).count();
        info!(
            job_id = %job.job_id,
            duration_ms = start.elapsed().as_millis() as u64,
            failed_panels = failed,
            "Panels rendered"
        );
        Ok(urls)
    }

    async fn consistency_guide(&self, job: &PanelJob<'_>) -> Result<String, UpstreamError> {
        let references = job.character_references.unwrap_or("");
        let user_prompt = format!(
            "Create a detailed visual consistency guide for this story:\n\n\
             STORY:\n{}\n\n{references}\n\n\
             REQUIREMENTS:\n\
             - Use any character references above exactly for character appearances\n\
             - Give consistent art style notes for all characters and scenes\n\
             - Specify colour palettes that must stay identical across all panels\n\
             - Note distinctive features that must appear in every panel featuring each character\n\
             - Keep the comic style cute and child-friendly",
            job.story
        );

        let start = Instant::now();
        let guide = self
            .text
            .complete(GUIDE_SYSTEM_PROMPT, &user_prompt, GUIDE_MAX_TOKENS, GUIDE_TEMPERATURE)
            .await?;
        info!(
            job_id = %job.job_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Consistency guide generated"
        );
        Ok(guide)
    }

    async fn render_one(&self, job_id: Uuid, index: usize, prompt: &str) -> String {
        let panel = index + 1;

        let bytes = match self.images.generate(prompt).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(job_id = %job_id, panel, error = %e, "Panel image generation failed");
                metrics::counter!("story_panels_failed_total").increment(1);
                return PANEL_FAILED_URL.to_string();
            }
        };

        let (content_type, ext) = sniff_image(&bytes);
        let key = format!("stories/{job_id}_image_{panel}.{ext}");
        match self.objects.put(&key, bytes, content_type).await {
            Ok(url) => url,
            Err(StorageError::Unavailable) => {
                warn!(job_id = %job_id, panel, "Object storage disabled, skipping upload");
                UPLOAD_DISABLED_URL.to_string()
            }
            Err(e) => {
                error!(job_id = %job_id, panel, error = %e, "Panel upload failed");
                metrics::counter!("story_panels_failed_total").increment(1);
                PANEL_FAILED_URL.to_string()
            }
        }
    }
}

/// True for both placeholder markers.
pub fn is_placeholder_url(url: &str) -> bool {
    url == PANEL_FAILED_URL || url == UPLOAD_DISABLED_URL
}

/// Image prompt for the panel at `index`.
pub fn panel_prompt(job: &PanelJob<'_>, part: &str, guide: &str, index: usize) -> String {
    let mut prompt = format!(
        "Create a 4-panel comic-style illustration for \"{}\".\n\n\
         STORY CONTENT:\n{part}\n\n\
         CHARACTER & STYLE CONSISTENCY GUIDE:\n{guide}\n\n\
         {PANEL_LAYOUT}\n\n{PANEL_STYLE}\n",
        job.title
    );
    if let Some(note) = job.personalization_note {
        prompt.push_str(&format!("\nPERSONALISATION:\n{note}\n"));
    }
    prompt.push_str(&format!(
        "\nThis is image {} of 4 in the story series. Characters must look identical to the \
         consistency guide and the other images.",
        index + 1
    ));
    prompt
}
