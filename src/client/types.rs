use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

use crate::confidence::{classify, ConfidenceInput, Tier};
use crate::error::{Result, TriageError};
use crate::ingestion::{normalize_references, parse_answer, ParsedAnswer};

/// A questionnaire file ready for upload
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Read `path`, rejecting empty files and extensions outside `allowed`
    pub fn from_path(path: &Path, allowed: &[String]) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&extension)) {
            return Err(TriageError::UnsupportedUpload {
                file_name,
                allowed: allowed.to_vec(),
            });
        }

        let bytes = std::fs::read(path).map_err(|e| TriageError::Io {
            source: e,
            context: format!("Failed to read questionnaire: {:?}", path),
        })?;
        if bytes.is_empty() {
            return Err(TriageError::EmptyUpload {
                path: path.to_path_buf(),
            });
        }

        Ok(Self { file_name, bytes })
    }

    /// MIME type sent with the multipart part
    pub fn mime_type(&self) -> &'static str {
        let extension = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => "text/csv",
            "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "xls" => "application/vnd.ms-excel",
            "pdf" => "application/pdf",
            _ => "application/octet-stream",
        }
    }
}

/// Reply to a single conversational query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub references: Option<Value>,
    #[serde(default)]
    pub confidence_score: Option<Value>,
    #[serde(default)]
    pub all_matches: Option<Value>,
}

impl QueryResponse {
    /// Answer text, run through the same parser as batch answers
    pub fn answer(&self) -> ParsedAnswer {
        parse_answer(self.content.as_ref())
    }

    pub fn references(&self) -> Vec<String> {
        normalize_references(self.references.as_ref())
    }

    pub fn confidence(&self) -> ConfidenceInput {
        ConfidenceInput::from_value(self.confidence_score.as_ref())
    }

    pub fn tier(&self) -> Tier {
        classify(&self.confidence())
    }
}

/// Conversation history commands understood by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryCommand {
    List,
    Select(String),
    New,
    Delete,
    Edit,
    Rename(String),
}

impl fmt::Display for HistoryCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryCommand::List => write!(f, "list"),
            HistoryCommand::Select(id) => write!(f, "select {}", id),
            HistoryCommand::New => write!(f, "new"),
            HistoryCommand::Delete => write!(f, "delete"),
            HistoryCommand::Edit => write!(f, "edit"),
            HistoryCommand::Rename(title) => write!(f, "rename {}", title),
        }
    }
}

/// A saved conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Value>,
}

/// One message of a saved conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub content: Value,
}

impl ChatMessage {
    pub fn text(&self) -> String {
        parse_answer(Some(&self.content)).text
    }
}

fn id_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Decoded reply to a [`HistoryCommand`]
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryReply {
    Topics(Vec<Topic>),
    Messages(Vec<ChatMessage>),
    /// Id of a freshly created conversation
    TopicId(String),
    /// Plain status such as `NoActiveThread`
    Status(String),
}

impl HistoryReply {
    /// Interpret the backend's JSON reply in light of the command sent
    pub fn from_value(command: &HistoryCommand, value: Value) -> Self {
        match (command, value) {
            (HistoryCommand::List, value @ Value::Array(_)) => {
                match serde_json::from_value(value.clone()) {
                    Ok(topics) => HistoryReply::Topics(topics),
                    Err(_) => HistoryReply::Status(value.to_string()),
                }
            }
            (HistoryCommand::Select(_), value @ Value::Array(_)) => {
                match serde_json::from_value(value.clone()) {
                    Ok(messages) => HistoryReply::Messages(messages),
                    Err(_) => HistoryReply::Status(value.to_string()),
                }
            }
            (HistoryCommand::New, Value::String(id)) => HistoryReply::TopicId(id),
            (HistoryCommand::New, Value::Number(id)) => HistoryReply::TopicId(id.to_string()),
            (_, Value::String(status)) => HistoryReply::Status(status),
            (_, other) => HistoryReply::Status(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_command_wire_form() {
        assert_eq!(HistoryCommand::List.to_string(), "list");
        assert_eq!(HistoryCommand::Select("42".into()).to_string(), "select 42");
        assert_eq!(
            HistoryCommand::Rename("Vendor review".into()).to_string(),
            "rename Vendor review"
        );
    }

    #[test]
    fn test_history_reply_decoding() {
        let topics = HistoryReply::from_value(
            &HistoryCommand::List,
            json!([{"id": 1, "title": "SOC2", "active": true}, {"id": "t2", "title": "ISO"}]),
        );
        match topics {
            HistoryReply::Topics(t) => {
                let ids: Vec<&str> = t.iter().map(|topic| topic.id.as_str()).collect();
                assert_eq!(ids, vec!["1", "t2"]);
                assert!(t[0].active);
                assert_eq!(t[1].title, "ISO");
            }
            other => panic!("expected topics, got {:?}", other),
        }

        let status = HistoryReply::from_value(&HistoryCommand::List, json!("NoActiveThread"));
        assert_eq!(status, HistoryReply::Status("NoActiveThread".into()));

        let new = HistoryReply::from_value(&HistoryCommand::New, json!("abc"));
        assert_eq!(new, HistoryReply::TopicId("abc".into()));

        let messages = HistoryReply::from_value(
            &HistoryCommand::Select("1".into()),
            json!([{"type": "user", "content": "hi"}]),
        );
        match messages {
            HistoryReply::Messages(m) => assert_eq!(m[0].text(), "hi"),
            other => panic!("expected messages, got {:?}", other),
        }
    }

    #[test]
    fn test_query_response_reuses_answer_parser() {
        let response: QueryResponse = serde_json::from_value(json!({
            "content": "{\"text\": \"Yes, quarterly.\"}",
            "references": "Risk Assessment Policy.pdf",
            "confidence_score": 64
        }))
        .unwrap();

        assert_eq!(response.answer().text, "Yes, quarterly.");
        assert_eq!(response.references(), vec!["Risk Assessment Policy.pdf"]);
        assert_eq!(response.tier(), Tier::Medium);
    }

    #[test]
    fn test_upload_validation() {
        let dir = tempfile::TempDir::new().unwrap();
        let allowed = vec!["csv".to_string(), "pdf".to_string()];

        let doc = dir.path().join("notes.docx");
        std::fs::write(&doc, b"x").unwrap();
        assert!(matches!(
            Upload::from_path(&doc, &allowed),
            Err(TriageError::UnsupportedUpload { .. })
        ));

        let empty = dir.path().join("empty.csv");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(
            Upload::from_path(&empty, &allowed),
            Err(TriageError::EmptyUpload { .. })
        ));

        let ok = dir.path().join("Vendor.CSV");
        std::fs::write(&ok, b"Question\nDo you encrypt?").unwrap();
        let upload = Upload::from_path(&ok, &allowed).unwrap();
        assert_eq!(upload.file_name, "Vendor.CSV");
        assert_eq!(upload.mime_type(), "text/csv");
    }
}
