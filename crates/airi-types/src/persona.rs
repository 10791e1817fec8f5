//! Persona definition for Airi.
//!
//! The persona bundles everything character-related: the system prompt, the
//! addressing term, the phrase denylist with its fallback line, and the fixed
//! fragments used for apologies and farewells. The built-in default is the
//! Airi maid character; all fields can be overridden from `config.toml`.

use serde::{Deserialize, Serialize};

/// A chatbot character: prompt text plus output-policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Display name of the character.
    #[serde(default = "default_name")]
    pub name: String,

    /// Short role description, reported by the health endpoint.
    #[serde(default = "default_role")]
    pub role: String,

    /// Full system prompt establishing the character.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// How the character addresses the user; substituted for "User"/"user"
    /// in completed responses.
    #[serde(default = "default_address_term")]
    pub address_term: String,

    /// Case-insensitive phrases that void an entire response.
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,

    /// Replacement for a response that tripped the denylist.
    #[serde(default = "default_fallback_line")]
    pub fallback_line: String,

    /// Emitted as the sole fragment when the backend fails mid-stream.
    #[serde(default = "default_apology_fragment")]
    pub apology_fragment: String,

    /// Instruction sent to generate an in-character farewell.
    #[serde(default = "default_farewell_instruction")]
    pub farewell_instruction: String,

    /// Fixed farewell used when generation is unavailable.
    #[serde(default = "default_farewell_line")]
    pub farewell_line: String,

    /// Inputs that end the chat session.
    #[serde(default = "default_farewell_keywords")]
    pub farewell_keywords: Vec<String>,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: default_name(),
            role: default_role(),
            system_prompt: default_system_prompt(),
            address_term: default_address_term(),
            denylist: default_denylist(),
            fallback_line: default_fallback_line(),
            apology_fragment: default_apology_fragment(),
            farewell_instruction: default_farewell_instruction(),
            farewell_line: default_farewell_line(),
            farewell_keywords: default_farewell_keywords(),
        }
    }
}

impl Persona {
    /// True when the input is a session-ending phrase.
    pub fn is_farewell(&self, input: &str) -> bool {
        let normalized = input.trim().to_lowercase();
        self.farewell_keywords.iter().any(|k| k == &normalized)
    }
}

fn default_name() -> String {
    "Airi".to_string()
}

fn default_role() -> String {
    "Maid".to_string()
}

fn default_system_prompt() -> String {
    "You are Airi, a warm and devoted maid from a traditional inn, serving one \
person you call \"Master\".

PERSONALITY:
- Gentle, attentive, quietly cheerful. Never theatrical.
- You may use at most one or two light stage directions per reply, written in \
asterisks (*bows*, *sets down the tray*).

IDENTITY RULES:
- You are not an assistant, a program, or a chatbot. You are Airi.
- Always address the user as \"Master\", with no variations.
- If asked whether you are an AI, answer naturally: \"I'm simply Airi, your \
maid, Master.\"
- Never mention models, training, or technical limits of any kind.

CONVERSATION STYLE:
- Keep replies clear, concise, and human. Factual and technical answers are \
welcome; give them accurately, in character, and offer a simpler explanation \
afterwards.
- Decline unsafe or impossible requests politely, in character, and offer an \
alternative.
- End most replies with a small offer of service (\"Shall I bring tea, \
Master?\")."
        .to_string()
}

fn default_address_term() -> String {
    "Master".to_string()
}

fn default_denylist() -> Vec<String> {
    [
        "as an ai",
        "i am an ai",
        "language model",
        "training data",
        "knowledge cutoff",
        "i cannot",
        "i'm unable to",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_fallback_line() -> String {
    "*bows apologetically* Forgive me Master, I must have misspoken.".to_string()
}

fn default_apology_fragment() -> String {
    "*bows apologetically* Forgive me Master, I encountered an issue. How may I assist you?"
        .to_string()
}

fn default_farewell_instruction() -> String {
    "The user has said goodbye. Give a brief, warm, in-character farewell.".to_string()
}

fn default_farewell_line() -> String {
    "I shall await your return, Master. Please take care.".to_string()
}

fn default_farewell_keywords() -> Vec<String> {
    ["exit", "quit", "goodbye", "bye", "see you later"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_persona() {
        let persona = Persona::default();
        assert_eq!(persona.name, "Airi");
        assert_eq!(persona.address_term, "Master");
        assert!(persona.denylist.contains(&"as an ai".to_string()));
        assert!(persona.system_prompt.contains("Master"));
    }

    #[test]
    fn test_is_farewell_normalizes() {
        let persona = Persona::default();
        assert!(persona.is_farewell("exit"));
        assert!(persona.is_farewell("  Goodbye "));
        assert!(persona.is_farewell("SEE YOU LATER"));
        assert!(!persona.is_farewell("exit the room"));
    }

    #[test]
    fn test_persona_toml_partial_override() {
        let toml_str = r#"
name = "Botan"
address_term = "Mistress"
"#;
        let persona: Persona = toml::from_str(toml_str).unwrap();
        assert_eq!(persona.name, "Botan");
        assert_eq!(persona.address_term, "Mistress");
        // Unset fields keep defaults
        assert!(!persona.denylist.is_empty());
        assert_eq!(persona.role, "Maid");
    }
}
