//! Question and answer fun facts for young readers, generated on request.

use garde::Validate;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::models::request::{FunFact, FunFactsRequest};
use crate::services::openai::{TextCompletion, UpstreamError};

/// Number of facts in every response.
pub const FACT_COUNT: usize = 10;

const FUN_FACTS_MAX_TOKENS: u32 = 800;
const FUN_FACTS_TEMPERATURE: f32 = 0.8;

const FILLER_QUESTION: &str = "Did you know reading stories helps your imagination grow?";
const FILLER_ANSWER: &str = "Yes! Every story takes you on a magical adventure in your mind.";

const GENERAL_TOPIC_PROMPT: &str = "Create 10 fun facts about animals, nature, friendship, \
and adventures that would interest children";

const FUN_FACTS_SYSTEM_PROMPT: &str = "You are a friendly educator who creates fascinating \
fun facts for children aged 3 to 5. Generate exactly 10 fun facts in question and answer \
format. Keep them simple, educational and entertaining, and related to the given context when \
possible. Start every question with 'Did you know...' and keep answers short and exciting.\n\n\
Format every fact as two lines:\n\
Q: Did you know cats can sleep for 16 hours a day?\n\
A: Yes! Cats love to nap and dream just like us.";

#[derive(Debug, thiserror::Error)]
pub enum FunFactsError {
    #[error("Invalid request: {0}")]
    Validation(garde::Report),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

pub struct FunFactsService {
    text: Arc<dyn TextCompletion>,
}

impl FunFactsService {
    pub fn new(text: Arc<dyn TextCompletion>) -> Self {
        Self { text }
    }

    /// Makes one text completion call and returns exactly [`FACT_COUNT`] facts.
    pub async fn generate(&self, request: &FunFactsRequest) -> Result<Vec<FunFact>, FunFactsError> {
        request.validate().map_err(FunFactsError::Validation)?;

        let prompt = request.prompt.trim();
        let user_prompt = if prompt.is_empty() {
            GENERAL_TOPIC_PROMPT.to_string()
        } else {
            format!(
                "Create 10 fun facts related to the theme or characters from this story idea: '{prompt}'"
            )
        };

        let start = Instant::now();
        let raw = self
            .text
            .complete(
                FUN_FACTS_SYSTEM_PROMPT,
                &user_prompt,
                FUN_FACTS_MAX_TOKENS,
                FUN_FACTS_TEMPERATURE,
            )
            .await
            .inspect_err(|e| {
                warn!(error = %e, "Fun facts generation failed");
                metrics::counter!("fun_facts_failed_total").increment(1);
            })?;

        let facts = parse_fun_facts(&raw);
        info!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Fun facts generated"
        );
        Ok(facts)
    }
}

/// Pairs each `Q:` line with the next `A:` line, then pads with a filler
/// fact or truncates to [`FACT_COUNT`]. Other lines are ignored, as is an
/// answer with no pending question.
pub fn parse_fun_facts(raw: &str) -> Vec<FunFact> {
    let mut facts = Vec::with_capacity(FACT_COUNT);
    let mut question: Option<String> = None;

    for line in raw.lines().map(str::trim) {
        if let Some(q) = line.strip_prefix("Q:") {
            question = Some(q.trim().to_string());
        } else if let Some(a) = line.strip_prefix("A:") {
            if let Some(q) = question.take().filter(|q| !q.is_empty()) {
                facts.push(FunFact {
                    question: q,
                    answer: a.trim().to_string(),
                });
            }
        }
    }

    facts.truncate(FACT_COUNT);
    facts.resize_with(FACT_COUNT, || FunFact {
        question: FILLER_QUESTION.to_string(),
        answer: FILLER_ANSWER.to_string(),
    });
    facts
}
