use serde::{Deserialize, Serialize};

/// A scalar stored in the flat preference mirror.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PrefValue {
    String(String),
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f64),
}

impl PrefValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
        }
    }

    /// Text form used by column-oriented stores.
    pub fn encode(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Long(l) => l.to_string(),
            Self::Float(f) => f.to_string(),
        }
    }

    /// Inverse of [`PrefValue::encode`] given the stored kind tag.
    pub fn decode(kind: &str, raw: &str) -> Option<Self> {
        match kind {
            "string" => Some(Self::String(raw.to_string())),
            "bool" => raw.parse().ok().map(Self::Bool),
            "int" => raw.parse().ok().map(Self::Int),
            "long" => raw.parse().ok().map(Self::Long),
            "float" => raw.parse().ok().map(Self::Float),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral view; int and long widen, floats are not truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(i64::from(*i)),
            Self::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(f64::from(*i)),
            Self::Long(l) => Some(*l as f64),
            _ => None,
        }
    }
}
