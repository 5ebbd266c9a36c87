//! Message validation, cache-key normalization, and canned replies.
//!
//! Validation runs at the transport boundary (HTTP handler, CLI) before the
//! pipeline ever sees the message. Normalization produces the cache lookup
//! key: two messages differing only in case, surrounding whitespace, or
//! trailing punctuation map to the same key.

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Reply for empty or whitespace-only input.
pub const EMPTY_INPUT_REPLY: &str = "It looks like the question didn't come through. \
     Could you please provide the question you'd like answered?";

/// Reply for messages matched by the greeting lexicon.
pub const GREETING_REPLY: &str =
    "Hello! Thanks for reaching out. How can I assist you today?";

/// Fixed contact message returned when the knowledge base has nothing
/// relevant. Also quoted verbatim in the generator prompt so the model can
/// fall back to it on its own.
pub const FALLBACK_CONTACT: &str = "I'm sorry, I don't have that information at hand. \
     Please reach out to our support team directly and they'll be happy to help.";

/// Greetings short-circuit the pipeline: matched by case-insensitive
/// substring containment against the normalized message.
const GREETING_LEXICON: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "greetings",
];

/// Validate a raw inbound message against the configured limits.
///
/// Rejects messages that are empty, longer than the character bound, or
/// dominated by non-alphanumeric characters (bot/abuse heuristic).
pub fn validate(message: &str, limits: &LimitsConfig) -> Result<(), PipelineError> {
    if message.is_empty() {
        return Err(PipelineError::InputRejected(
            "message must not be empty".to_string(),
        ));
    }

    let char_count = message.chars().count();
    if char_count > limits.max_message_chars {
        return Err(PipelineError::InputRejected(format!(
            "message exceeds {} characters",
            limits.max_message_chars
        )));
    }

    let symbol_count = message.chars().filter(|c| !c.is_alphanumeric()).count();
    let ratio = symbol_count as f64 / char_count as f64;
    if ratio > limits.max_symbol_ratio {
        return Err(PipelineError::InputRejected(
            "too many special characters".to_string(),
        ));
    }

    Ok(())
}

/// Lowercase, trim, and strip trailing punctuation.
fn normalize(message: &str) -> String {
    message
        .trim()
        .to_lowercase()
        .trim_end_matches(['?', '!', '.', ',', ';', ':'])
        .trim_end()
        .to_string()
}

/// Derive the namespaced cache key for a message.
pub fn normalized_key(namespace: &str, message: &str) -> String {
    format!("{}:{}", namespace, normalize(message))
}

/// Whether the message is a greeting (normalized substring containment
/// against the lexicon).
pub fn is_greeting(message: &str) -> bool {
    let normalized = normalize(message);
    GREETING_LEXICON
        .iter()
        .any(|entry| normalized.contains(entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> LimitsConfig {
        LimitsConfig::default()
    }

    #[test]
    fn rejects_empty_message() {
        assert!(validate("", &limits()).is_err());
    }

    #[test]
    fn rejects_oversized_message() {
        let long = "a".repeat(501);
        let err = validate(&long, &limits()).unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn rejects_symbol_heavy_message() {
        assert!(validate("?!?!?!?!?!", &limits()).is_err());
    }

    #[test]
    fn accepts_ordinary_question() {
        assert!(validate("What are your opening hours?", &limits()).is_ok());
    }

    #[test]
    fn key_ignores_case_whitespace_and_trailing_punctuation() {
        let a = normalized_key("faq", "What is your address?");
        let b = normalized_key("faq", "  what is your address  ");
        let c = normalized_key("faq", "what is your address!!");
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a, "faq:what is your address");
    }

    #[test]
    fn key_preserves_interior_punctuation() {
        let key = normalized_key("faq", "What's the Wi-Fi password?");
        assert_eq!(key, "faq:what's the wi-fi password");
    }

    #[test]
    fn greeting_lexicon_matches() {
        assert!(is_greeting("hello"));
        assert!(is_greeting("Hello!"));
        assert!(is_greeting("Good Morning"));
        assert!(is_greeting("hey there"));
    }

    #[test]
    fn plain_question_is_not_a_greeting() {
        assert!(!is_greeting("what is your address"));
    }
}
