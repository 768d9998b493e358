//! Synthetic responses used when no provider produced text.

pub const TEMPLATES: [&str; 4] = [
    "I can't reach my language models right now, but I heard you: \"{message}\".",
    "Thanks for your message \"{message}\". I'm offline at the moment and will be able to say more once a provider is available.",
    "Got it: \"{message}\". I don't have a model connection right now, so this is just an acknowledgement.",
    "You said \"{message}\". No AI provider is configured or reachable, so I can only echo that back for now.",
];

/// Template chosen for a message. Stable for a given input.
pub fn template_index(message: &str) -> usize {
    message.bytes().map(usize::from).sum::<usize>() % TEMPLATES.len()
}

/// Fill a template with the sanitized message.
pub fn synthesize(sanitized: &str) -> String {
    TEMPLATES[template_index(sanitized)].replace("{message}", sanitized)
}

/// Whether `text` is one of the templates filled with `sanitized`.
pub fn is_synthetic(text: &str, sanitized: &str) -> bool {
    TEMPLATES
        .iter()
        .any(|t| t.replace("{message}", sanitized) == text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_message() {
        let out = synthesize("hello");
        assert!(out.contains("\"hello\""));
        assert!(is_synthetic(&out, "hello"));
    }

    #[test]
    fn deterministic() {
        assert_eq!(synthesize("same input"), synthesize("same input"));
    }

    #[test]
    fn index_in_range_for_empty() {
        assert_eq!(template_index(""), 0);
        assert!(template_index("zzzzzzzz") < TEMPLATES.len());
    }

    #[test]
    fn provider_text_is_not_synthetic() {
        assert!(!is_synthetic("A language.", "what is rust"));
    }
}
