//! Story text generation and normalisation.

use std::time::Instant;
use tracing::{info, warn};

use crate::services::openai::{TextCompletion, UpstreamError};

/// Closing line every story body ends with.
pub const STORY_TERMINATOR: &str = "The End! (Created By - MyStoryBuddy)";

/// Unbranded closing line the model sometimes produces on its own.
pub const BARE_TERMINATOR: &str = "The End!";

/// Title used when the model output has no separate title section.
pub const FALLBACK_TITLE: &str = "A Magical Story";

const OPEN_ENDED_USER_PROMPT: &str = "Create a delightful story for young children";

const STORY_MAX_TOKENS: u32 = 900;
const STORY_TEMPERATURE: f32 = 0.7;

/// A generated story, split into title and branded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStory {
    pub title: String,
    pub body: String,
}

/// Instructions for the storyteller model. `open_ended` is used when the
/// client sent no prompt of its own.
pub fn system_prompt(open_ended: bool) -> String {
    let theme = if open_ended {
        "Invent a completely original adventure full of fun, twists and surprises that would \
         delight young children. "
    } else {
        "If the request is about a concept such as kindness, sharing or friendship, weave it \
         into an exciting adventure rather than a lesson. "
    };

    format!(
        "You are a friendly, imaginative storyteller writing for children aged 3 to 5. \
         {theme}\
         Use simple words a young child understands and keep sentences short and clear. \
         Give the story a clear beginning, middle and end, with characters who go on an \
         adventure, face a challenge and discover something wonderful. Animals, toys, magical \
         creatures and gentle humour are all welcome. Aim for roughly 200 to 250 words meant \
         to be read aloud, told across 8 to 12 short paragraphs separated by blank lines. \
         Always finish with the line '{STORY_TERMINATOR}' on its own line.\n\
         Format your response exactly like this:\n\
         Title: [Your Title]\n\n\
         [Story paragraphs]\n\n\
         {STORY_TERMINATOR}"
    )
}

/// Generates a story for `prompt` with a single model call.
///
/// Errors from the text client are returned as-is; the caller decides how a
/// failed story is recorded.
pub async fn compile_story(
    text: &dyn TextCompletion,
    prompt: &str,
) -> Result<CompiledStory, UpstreamError> {
    let open_ended = prompt.trim().is_empty();
    let user_prompt = if open_ended {
        OPEN_ENDED_USER_PROMPT
    } else {
        prompt
    };

    let start = Instant::now();
    let raw = text
        .complete(
            &system_prompt(open_ended),
            user_prompt,
            STORY_MAX_TOKENS,
            STORY_TEMPERATURE,
        )
        .await?;

    let story = parse_story(&raw);
    info!(
        duration_ms = start.elapsed().as_millis() as u64,
        title = %story.title,
        open_ended,
        "Story text generated"
    );
    Ok(story)
}

/// Splits raw model output on the first blank line into title and body, and
/// brands the body.
pub fn parse_story(raw: &str) -> CompiledStory {
    let raw = raw.replace("\r\n", "\n");
    let raw = raw.trim();

    let (title, body) = match raw.split_once("\n\n") {
        Some((head, rest)) => (clean_title(head), rest.trim()),
        None => {
            warn!("Story output has no title section, using fallback title");
            (String::new(), raw)
        }
    };

    CompiledStory {
        title: if title.is_empty() {
            FALLBACK_TITLE.to_string()
        } else {
            title
        },
        body: ensure_branding(body),
    }
}

fn clean_title(head: &str) -> String {
    let head = head.trim().trim_matches(|c| c == '#' || c == '*').trim();
    head.strip_prefix("Title:")
        .unwrap_or(head)
        .trim()
        .trim_matches(|c| c == '*' || c == '"')
        .trim()
        .to_string()
}

/// Returns `body` ending with exactly one [`STORY_TERMINATOR`].
///
/// Bare or foreign-branded closing lines are removed before the branded one is
/// appended. Bodies that already end correctly are returned trimmed.
pub fn ensure_branding(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.ends_with(STORY_TERMINATOR) && trimmed.matches(STORY_TERMINATOR).count() == 1 {
        return trimmed.to_string();
    }

    let stripped = trimmed
        .replace(STORY_TERMINATOR, "")
        .replace(BARE_TERMINATOR, "");

    let paragraphs: Vec<String> = stripped
        .split("\n\n")
        .map(|paragraph| {
            paragraph
                .lines()
                .filter(|line| !line.trim_start().starts_with("(Created By"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|paragraph| !paragraph.is_empty())
        .collect();

    if paragraphs.is_empty() {
        STORY_TERMINATOR.to_string()
    } else {
        format!("{}\n\n{STORY_TERMINATOR}", paragraphs.join("\n\n"))
    }
}
