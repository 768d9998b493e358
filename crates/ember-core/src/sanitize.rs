//! Text sanitization applied to everything that reaches the wire.
//!
//! The runtime treats sanitization as a pure-function collaborator; the
//! [`Sanitizer`] trait is the seam and [`TextSanitizer`] is the default
//! implementation used when the host does not supply its own.

use std::sync::LazyLock;

use regex::Regex;

/// Longest text accepted or emitted, in characters.
pub const DEFAULT_MAX_CHARS: usize = 4000;

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^<>]*>").expect("markup tag pattern is valid"));

pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, text: &str) -> String;
    fn is_valid(&self, text: &str) -> bool;
}

/// Strips markup tags, stray angle brackets and control characters, trims,
/// and caps the length. `sanitize` is idempotent.
#[derive(Clone, Debug)]
pub struct TextSanitizer {
    max_chars: usize,
}

impl TextSanitizer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl Default for TextSanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS)
    }
}

impl Sanitizer for TextSanitizer {
    fn sanitize(&self, text: &str) -> String {
        let without_tags = MARKUP_TAG.replace_all(text, "");
        let cleaned: String = without_tags
            .chars()
            .filter(|c| *c != '<' && *c != '>')
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect();
        cleaned.trim().chars().take(self.max_chars).collect::<String>().trim_end().to_string()
    }

    fn is_valid(&self, text: &str) -> bool {
        let trimmed = text.trim();
        !trimmed.is_empty() && !trimmed.contains('\0') && trimmed.chars().count() <= self.max_chars
    }
}
