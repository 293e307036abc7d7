use serde::{Deserialize, Serialize};

/// A recurring character defined by a user.
///
/// Read-only from the story pipeline's point of view; at most one persona is
/// active per owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Persona {
    pub name: String,
    pub personality_description: String,
    pub visual_description: Option<String>,
}
