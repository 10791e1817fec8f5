//! Output post-filter keeping responses in character.
//!
//! A completed response is scanned case-insensitively against the persona
//! denylist. Any hit voids the whole response -- it is replaced with the
//! persona's fixed fallback line, never partially redacted. Clean
//! responses only get literal addressing-term substitution and a trim.
//!
//! Literal containment is a blunt instrument (substrings and paraphrases
//! both slip through it in opposite directions); the denylist is kept
//! short and the fallback is harmless.

use airi_types::persona::Persona;

/// Result of running the guard over a completed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Response passed; text has addressing substitution applied.
    Clean(String),
    /// Denylist hit; the entire response was replaced with the fallback.
    Replaced(String),
}

impl Verdict {
    /// The final text regardless of outcome.
    pub fn into_text(self) -> String {
        match self {
            Verdict::Clean(text) | Verdict::Replaced(text) => text,
        }
    }
}

/// Enforce the character policy on a completed response.
pub fn enforce(persona: &Persona, response: &str) -> Verdict {
    let lowered = response.to_lowercase();
    if persona
        .denylist
        .iter()
        .any(|phrase| lowered.contains(phrase.as_str()))
    {
        return Verdict::Replaced(persona.fallback_line.clone());
    }

    let substituted = response
        .replace("User", &persona.address_term)
        .replace("user", &persona.address_term);

    Verdict::Clean(substituted.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denylist_hit_replaces_everything() {
        let persona = Persona::default();
        let verdict = enforce(
            &persona,
            "Well, As An AI I really should not brew tea for you.",
        );
        match verdict {
            Verdict::Replaced(text) => {
                assert_eq!(text, persona.fallback_line);
                assert!(!text.contains("brew tea"));
            }
            other => panic!("expected Replaced, got {other:?}"),
        }
    }

    #[test]
    fn test_denylist_is_case_insensitive() {
        let persona = Persona::default();
        for sample in ["AS AN AI", "as an ai", "As An aI"] {
            let verdict = enforce(&persona, &format!("something {sample} something"));
            assert!(matches!(verdict, Verdict::Replaced(_)));
        }
    }

    #[test]
    fn test_clean_response_gets_address_substitution() {
        let persona = Persona::default();
        let verdict = enforce(&persona, "Of course, dear user, right away. ");
        assert_eq!(
            verdict,
            Verdict::Clean("Of course, dear Master, right away.".to_string())
        );
    }

    #[test]
    fn test_enforce_is_idempotent_on_clean_text() {
        let persona = Persona::default();
        let first = enforce(&persona, "Right away, Master. *bows*").into_text();
        let second = enforce(&persona, &first).into_text();
        assert_eq!(first, second);
    }

    #[test]
    fn test_fallback_line_itself_passes_the_guard() {
        // The fallback must not trip the denylist, or enforcement would
        // never converge.
        let persona = Persona::default();
        let verdict = enforce(&persona, &persona.fallback_line);
        assert!(matches!(verdict, Verdict::Clean(_)));
    }
}
