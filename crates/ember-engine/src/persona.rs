//! Persona tags: model selection and response voice.

/// Model used for tags outside the table.
pub const DEFAULT_MODEL: &str = "gpt-oss:120b";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Persona {
    Assistant,
    Casual,
    Professional,
    Creative,
    Technical,
}

impl Persona {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "assistant" => Some(Self::Assistant),
            "casual" => Some(Self::Casual),
            "professional" => Some(Self::Professional),
            "creative" => Some(Self::Creative),
            "technical" => Some(Self::Technical),
            _ => None,
        }
    }

    pub fn model(self) -> &'static str {
        match self {
            Self::Assistant | Self::Professional => "gpt-oss:120b",
            Self::Casual => "gpt-oss:20b",
            Self::Creative => "deepseek-v3.1:671b",
            Self::Technical => "qwen3-coder:480b",
        }
    }

    pub fn decorate(self, text: &str) -> String {
        match self {
            Self::Assistant => format!("Assistant: {text}"),
            Self::Casual => format!("Hey there! {text}"),
            Self::Professional => format!("{text}\n\nBest regards."),
            Self::Creative => format!("✨ {text} ✨"),
            Self::Technical => format!("[technical] {text}"),
        }
    }
}

/// Upstream model for a persona tag.
pub fn model_for(tag: &str) -> &'static str {
    Persona::parse(tag).map_or(DEFAULT_MODEL, Persona::model)
}

/// Apply the persona voice. Unknown tags leave the text unchanged.
pub fn decorate(tag: &str, text: &str) -> String {
    match Persona::parse(tag) {
        Some(p) => p.decorate(text),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_table() {
        assert_eq!(model_for("assistant"), "gpt-oss:120b");
        assert_eq!(model_for("casual"), "gpt-oss:20b");
        assert_eq!(model_for("creative"), "deepseek-v3.1:671b");
        assert_eq!(model_for("technical"), "qwen3-coder:480b");
        assert_eq!(model_for("pirate"), DEFAULT_MODEL);
    }

    #[test]
    fn decorations_are_distinct() {
        let tags = ["assistant", "casual", "professional", "creative", "technical"];
        let mut out: Vec<_> = tags.iter().map(|t| decorate(t, "ok")).collect();
        assert!(out.iter().all(|s| s.contains("ok") && s != "ok"));
        out.sort();
        out.dedup();
        assert_eq!(out.len(), tags.len());
    }

    #[test]
    fn unknown_tag_is_identity() {
        assert_eq!(decorate("pirate", "ahoy"), "ahoy");
        assert_eq!(decorate("", "ahoy"), "ahoy");
    }
}
