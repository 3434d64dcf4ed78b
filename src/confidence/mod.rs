//! Confidence classification
//!
//! The answering service reports confidence either as a numeric score
//! (0-100, sometimes sent as a string) or as a legacy tier word. Both are
//! captured in [`ConfidenceInput`] and folded into a single [`Tier`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Score at or above which an answer is High confidence
pub const HIGH_THRESHOLD: f64 = 80.0;

/// Score at or above which an answer is Medium confidence
pub const MEDIUM_THRESHOLD: f64 = 50.0;

/// Discretized confidence of an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Medium,
    Low,
    /// No usable confidence was reported
    Unknown,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Medium => "medium",
            Tier::Low => "low",
            Tier::Unknown => "unknown",
        }
    }

    /// Case-insensitive parse of a tier name
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Tier::High),
            "medium" => Some(Tier::Medium),
            "low" => Some(Tier::Low),
            "unknown" => Some(Tier::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tier::High => "High",
            Tier::Medium => "Medium",
            Tier::Low => "Low",
            Tier::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Tier vocabulary used by older backend versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegacyTier {
    High,
    Medium,
    Low,
}

impl LegacyTier {
    fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("high") {
            Some(LegacyTier::High)
        } else if s.eq_ignore_ascii_case("medium") {
            Some(LegacyTier::Medium)
        } else if s.eq_ignore_ascii_case("low") {
            Some(LegacyTier::Low)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LegacyTier::High => "high",
            LegacyTier::Medium => "medium",
            LegacyTier::Low => "low",
        }
    }
}

/// Raw confidence as received from the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ConfidenceInput {
    /// Numeric score, always finite
    Numeric(f64),
    /// Numeric score that arrived as a string; `text` is kept verbatim
    NumericText { score: f64, text: String },
    /// One of the legacy tier words
    LegacyTier(LegacyTier),
    /// Present but neither numeric nor a tier word (kept verbatim)
    Unrecognized(String),
    Missing,
}

impl ConfidenceInput {
    /// Build from an optional JSON value.
    ///
    /// Strings are tried as numbers first, then as legacy tier words.
    /// Non-finite numbers (`"NaN"`, `"inf"`) do not count as numeric.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => ConfidenceInput::Missing,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(score) if score.is_finite() => ConfidenceInput::Numeric(score),
                _ => ConfidenceInput::Unrecognized(n.to_string()),
            },
            Some(Value::String(s)) => Self::from_text(s),
            Some(other) => ConfidenceInput::Unrecognized(other.to_string()),
        }
    }

    /// Build from text (numeric-looking string or tier word)
    pub fn from_text(s: &str) -> Self {
        if let Ok(score) = s.trim().parse::<f64>() {
            if score.is_finite() {
                return ConfidenceInput::NumericText {
                    score,
                    text: s.to_string(),
                };
            }
        }

        match LegacyTier::parse(s) {
            Some(tier) => ConfidenceInput::LegacyTier(tier),
            None => ConfidenceInput::Unrecognized(s.to_string()),
        }
    }

    /// Numeric score, if any
    pub fn score(&self) -> Option<f64> {
        match self {
            ConfidenceInput::Numeric(score) | ConfidenceInput::NumericText { score, .. } => {
                Some(*score)
            }
            _ => None,
        }
    }

    /// Text as it should appear in exports (empty when missing)
    pub fn display_value(&self) -> String {
        match self {
            ConfidenceInput::Numeric(score) => score.to_string(),
            ConfidenceInput::NumericText { text, .. } => text.clone(),
            ConfidenceInput::LegacyTier(tier) => tier.as_str().to_string(),
            ConfidenceInput::Unrecognized(raw) => raw.clone(),
            ConfidenceInput::Missing => String::new(),
        }
    }
}

/// Classify a confidence input into a tier. Total and pure.
pub fn classify(input: &ConfidenceInput) -> Tier {
    match input {
        ConfidenceInput::Numeric(score) | ConfidenceInput::NumericText { score, .. } => {
            classify_score(*score)
        }
        ConfidenceInput::LegacyTier(LegacyTier::High) => Tier::High,
        ConfidenceInput::LegacyTier(LegacyTier::Medium) => Tier::Medium,
        ConfidenceInput::LegacyTier(LegacyTier::Low) => Tier::Low,
        ConfidenceInput::Unrecognized(_) | ConfidenceInput::Missing => Tier::Unknown,
    }
}

/// Classify a raw JSON confidence value
pub fn classify_value(value: Option<&Value>) -> Tier {
    classify(&ConfidenceInput::from_value(value))
}

fn classify_score(score: f64) -> Tier {
    if score >= HIGH_THRESHOLD {
        Tier::High
    } else if score >= MEDIUM_THRESHOLD {
        Tier::Medium
    } else {
        Tier::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_boundaries() {
        assert_eq!(classify(&ConfidenceInput::Numeric(80.0)), Tier::High);
        assert_eq!(classify(&ConfidenceInput::Numeric(79.9)), Tier::Medium);
        assert_eq!(classify(&ConfidenceInput::Numeric(50.0)), Tier::Medium);
        assert_eq!(classify(&ConfidenceInput::Numeric(49.9)), Tier::Low);
        assert_eq!(classify(&ConfidenceInput::Numeric(100.0)), Tier::High);
        assert_eq!(classify(&ConfidenceInput::Numeric(0.0)), Tier::Low);
    }

    #[test]
    fn test_legacy_words_case_insensitive() {
        assert_eq!(classify_value(Some(&json!("high"))), Tier::High);
        assert_eq!(classify_value(Some(&json!("MEDIUM"))), Tier::Medium);
        assert_eq!(classify_value(Some(&json!(" Low "))), Tier::Low);
    }

    #[test]
    fn test_unknown_outcomes() {
        assert_eq!(classify_value(Some(&json!("bogus"))), Tier::Unknown);
        assert_eq!(classify_value(None), Tier::Unknown);
        assert_eq!(classify_value(Some(&Value::Null)), Tier::Unknown);
        assert_eq!(classify_value(Some(&json!(true))), Tier::Unknown);
        assert_eq!(classify_value(Some(&json!("NaN"))), Tier::Unknown);
    }

    #[test]
    fn test_numeric_strings_parse_before_tier_words() {
        assert_eq!(
            ConfidenceInput::from_value(Some(&json!("85"))),
            ConfidenceInput::NumericText {
                score: 85.0,
                text: "85".to_string()
            }
        );
        assert_eq!(classify_value(Some(&json!(" 62.5 "))), Tier::Medium);
    }

    #[test]
    fn test_display_value() {
        assert_eq!(ConfidenceInput::Numeric(95.0).display_value(), "95");
        assert_eq!(ConfidenceInput::Numeric(79.9).display_value(), "79.9");
        assert_eq!(
            ConfidenceInput::LegacyTier(LegacyTier::Medium).display_value(),
            "medium"
        );
        assert_eq!(ConfidenceInput::Missing.display_value(), "");
    }

    #[test]
    fn test_numeric_string_keeps_received_text() {
        let input = ConfidenceInput::from_value(Some(&json!("85.50")));
        assert_eq!(input.score(), Some(85.5));
        assert_eq!(input.display_value(), "85.50");
        assert_eq!(classify(&input), Tier::High);

        let padded = ConfidenceInput::from_value(Some(&json!("085")));
        assert_eq!(padded.display_value(), "085");
        assert_eq!(classify(&padded), Tier::High);
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!(Tier::parse("High"), Some(Tier::High));
        assert_eq!(Tier::parse("unknown"), Some(Tier::Unknown));
        assert_eq!(Tier::parse("all"), None);
    }
}
