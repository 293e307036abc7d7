//! Splits a story body into the four beats drawn as comic panels.

use tracing::{info, warn};

use crate::services::openai::TextCompletion;
use crate::services::story::BARE_TERMINATOR;

/// Token the model is told to place between beats.
pub const PART_DELIMITER: &str = "---PART BREAK---";

const BREAKDOWN_MAX_TOKENS: u32 = 800;
const BREAKDOWN_TEMPERATURE: f32 = 0.3;

/// Filler used for a bucket the fallback grouping could not populate.
const CONTINUATION_BEATS: [&str; 4] = [
    "Our story begins.",
    "The adventure continues.",
    "Something exciting happens!",
    "And everyone lived happily ever after.",
];

const BREAKDOWN_SYSTEM_PROMPT: &str = "You split children's stories into exactly four parts \
for a four-panel comic. Part 1 is the setup, part 2 the development, part 3 the climax and \
part 4 the resolution. Keep the original wording of the story, do not add new events, and \
make every part non-empty. Separate the parts with the line ---PART BREAK--- and output \
nothing else.";

/// Returns exactly four non-empty beats for `body`.
///
/// The model is asked first; a malformed answer or a failed call falls back
/// to grouping the body's paragraphs.
pub async fn break_into_four(text: &dyn TextCompletion, body: &str) -> [String; 4] {
    let user_prompt = format!(
        "Split this story into exactly 4 parts separated by {PART_DELIMITER}:\n\n{body}"
    );

    match text
        .complete(
            BREAKDOWN_SYSTEM_PROMPT,
            &user_prompt,
            BREAKDOWN_MAX_TOKENS,
            BREAKDOWN_TEMPERATURE,
        )
        .await
    {
        Ok(raw) => match parse_breakdown(&raw) {
            Some(parts) => {
                info!("Story split into four parts by the model");
                parts
            }
            None => {
                warn!("Malformed story breakdown, grouping paragraphs instead");
                fallback_breakdown(body)
            }
        },
        Err(e) => {
            warn!(error = %e, "Story breakdown call failed, grouping paragraphs instead");
            fallback_breakdown(body)
        }
    }
}

/// Accepts the model output only when it has exactly four non-empty parts.
/// Blank segments, such as those left by a leading or trailing delimiter,
/// are dropped before counting.
pub fn parse_breakdown(raw: &str) -> Option<[String; 4]> {
    let parts: Vec<String> = raw
        .split(PART_DELIMITER)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();

    parts.try_into().ok()
}

/// Groups paragraphs into four contiguous buckets, the last taking any
/// remainder. Empty buckets are padded with a short continuation line.
pub fn fallback_breakdown(body: &str) -> [String; 4] {
    let normalized = body.replace("\r\n", "\n");
    let paragraphs: Vec<&str> = normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty() && !p.starts_with(BARE_TERMINATOR))
        .collect();

    let n = paragraphs.len();
    let per_part = (n / 4).max(1);

    std::array::from_fn(|i| {
        let start = (i * per_part).min(n);
        let end = if i == 3 {
            n
        } else {
            ((i + 1) * per_part).min(n)
        };
        let joined = paragraphs[start..end].join("\n\n");
        if joined.is_empty() {
            CONTINUATION_BEATS[i].to_string()
        } else {
            joined
        }
    })
}
