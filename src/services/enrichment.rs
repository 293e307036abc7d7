//! Injects a user's persona into the story prompt when the prompt names it.

use tracing::{debug, info, warn};

use crate::db::store::PersonaStore;
use crate::models::persona::Persona;

/// Heading that opens each injected persona block.
pub const CHARACTER_MARKER: &str = "CHARACTER DETAILS FOR";

/// The prompt sent to the story compiler, plus the persona it mentions.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedPrompt {
    pub text: String,
    pub persona: Option<Persona>,
}

impl EnrichedPrompt {
    fn unchanged(prompt: &str) -> Self {
        Self {
            text: prompt.to_string(),
            persona: None,
        }
    }
}

/// Looks up the owner's active persona and, if the prompt mentions it by
/// name, appends its traits to the prompt.
///
/// Lookup failures are logged and treated as "no persona".
pub async fn detect_and_enrich(
    personas: &dyn PersonaStore,
    prompt: &str,
    owner: Option<&str>,
) -> EnrichedPrompt {
    let Some(owner) = owner else {
        return EnrichedPrompt::unchanged(prompt);
    };

    let persona = match personas.get_active_persona(owner).await {
        Ok(Some(persona)) => persona,
        Ok(None) => return EnrichedPrompt::unchanged(prompt),
        Err(e) => {
            warn!(owner = %owner, error = %e, "Persona lookup failed, continuing without enrichment");
            return EnrichedPrompt::unchanged(prompt);
        }
    };

    if !mentions(prompt, &persona.name) {
        debug!(owner = %owner, "Prompt does not mention the owner's persona");
        return EnrichedPrompt::unchanged(prompt);
    }

    info!(owner = %owner, persona = %persona.name.trim(), "Enriching prompt with persona traits");
    EnrichedPrompt {
        text: enrich(prompt, &persona),
        persona: Some(persona),
    }
}

/// Case-insensitive substring match on the persona's trimmed name.
pub fn mentions(prompt: &str, name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && prompt.to_lowercase().contains(&name.to_lowercase())
}

/// Appends the persona block to `prompt`.
pub fn enrich(prompt: &str, persona: &Persona) -> String {
    let name = persona.name.trim();
    let mut block = format!("\n\n{CHARACTER_MARKER} {name}:\n");

    let personality = persona.personality_description.trim();
    if !personality.is_empty() {
        block.push_str(&format!("Personality: {personality}\n"));
    }
    if let Some(visual) = persona
        .visual_description
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        block.push_str(&format!("Appearance: {visual}\n"));
    }
    block.push_str(&format!(
        "Please ensure {name} appears in the story with these exact traits and characteristics."
    ));

    format!("{prompt}{block}")
}

/// Collects the persona blocks of an enriched prompt into a reference card
/// section for the illustration style guide.
pub fn character_references(enriched: &str) -> Option<String> {
    let mut sections = enriched.split(CHARACTER_MARKER).skip(1).peekable();
    sections.peek()?;

    let mut references = String::from("=== STORED CHARACTER REFERENCES ===\n");
    for section in sections {
        let (name, details) = section.split_once(':').unwrap_or((section, ""));
        references.push_str(&format!(
            "\nCHARACTER: {}\n{}\n",
            name.trim(),
            details.trim()
        ));
    }
    references.push_str("\n=== END CHARACTER REFERENCES ===");
    Some(references)
}

/// Per-panel instruction that keeps the persona recognisable.
pub fn personalization_note(persona: &Persona) -> String {
    let name = persona.name.trim();
    format!(
        "This story stars {name}, a character created by the reader. {name} must be drawn \
         exactly as described in the character references in every panel where {name} appears."
    )
}
