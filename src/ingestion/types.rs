// Shared types for the ingestion pipeline
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::confidence::{ConfidenceInput, Tier};

/// One question item exactly as the backend sent it.
///
/// Every field is optional so a malformed item never aborts a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawQuestion {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub question: Option<Value>,
    #[serde(default, rename = "suggestedAnswer")]
    pub suggested_answer: Option<Value>,
    /// Legacy tier word ("high" / "medium" / "low")
    #[serde(default)]
    pub confidence: Option<Value>,
    /// Numeric 0-100 score
    #[serde(default)]
    pub confidence_score: Option<Value>,
    #[serde(default)]
    pub references: Option<Value>,
    #[serde(default)]
    pub all_matches: Option<Value>,
}

impl RawQuestion {
    /// Raw confidence, preferring the numeric field when both are present
    pub fn confidence_value(&self) -> Option<&Value> {
        match &self.confidence_score {
            Some(v) if !v.is_null() => Some(v),
            _ => self.confidence.as_ref(),
        }
    }
}

/// Successful batch submission response body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchPayload {
    #[serde(default)]
    pub message: Option<String>,
    /// Kept as raw values so one bad item cannot fail the whole payload
    #[serde(default)]
    pub results: Vec<Value>,
}

impl BatchPayload {
    pub fn from_items(items: Vec<RawQuestion>) -> Self {
        let results = items
            .into_iter()
            .map(|item| serde_json::to_value(item).unwrap_or(Value::Null))
            .collect();
        Self {
            message: None,
            results,
        }
    }

    /// Parse a saved response: either the full object or a bare results array
    pub fn from_json_str(content: &str) -> crate::error::Result<Self> {
        let value: Value =
            serde_json::from_str(content).map_err(|e| crate::error::TriageError::Json {
                source: e,
                context: "Failed to parse batch payload".to_string(),
            })?;

        match value {
            Value::Array(results) => Ok(Self {
                message: None,
                results,
            }),
            other => serde_json::from_value(other).map_err(|e| crate::error::TriageError::Json {
                source: e,
                context: "Batch payload is neither an object nor an array".to_string(),
            }),
        }
    }
}

/// Which stage of the answer parser produced the normalized text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStage {
    /// Answer arrived as an object with a `text` property
    Object,
    /// String parsed as strict JSON
    StrictJson,
    /// String parsed as JSON after swapping single quotes for double quotes
    QuoteRepaired,
    /// `text` value rescued by pattern match
    PatternMatch,
    /// Original value used as-is
    Raw,
}

impl ParseStage {
    /// Stage number in parser order (1..=5)
    pub fn number(&self) -> u8 {
        match self {
            ParseStage::Object => 1,
            ParseStage::StrictJson => 2,
            ParseStage::QuoteRepaired => 3,
            ParseStage::PatternMatch => 4,
            ParseStage::Raw => 5,
        }
    }

    /// True when the text came out of a structured field
    pub fn is_structured(&self) -> bool {
        !matches!(self, ParseStage::Raw)
    }
}

/// Output of the answer parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAnswer {
    pub stage: ParseStage,
    pub text: String,
}

impl ParsedAnswer {
    pub fn new(stage: ParseStage, text: impl Into<String>) -> Self {
        Self {
            stage,
            text: text.into(),
        }
    }
}

/// Reviewer verdict on an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feedback {
    Approved,
    Rejected,
}

impl Feedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feedback::Approved => "Approved",
            Feedback::Rejected => "Rejected",
        }
    }
}

/// One normalized question/answer pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: String,
    pub question_text: String,
    /// Answer exactly as received
    pub raw_answer: Value,
    pub normalized_answer_text: String,
    pub answer_stage: ParseStage,
    pub confidence_raw: ConfidenceInput,
    pub confidence_tier: Tier,
    pub references: Vec<String>,
    pub feedback: Option<Feedback>,
    #[serde(default)]
    pub all_matches: Vec<String>,
}

impl QuestionRecord {
    pub fn is_answered(&self) -> bool {
        !self.normalized_answer_text.trim().is_empty()
    }
}
