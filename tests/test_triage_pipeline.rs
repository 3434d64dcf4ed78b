// Integration test for ingestion -> classification -> store -> filter -> export
use chrono::{TimeZone, Utc};
use qtriage::confidence::Tier;
use qtriage::export::{to_csv, write_export};
use qtriage::filtering::{filter_questions, TierFilter};
use qtriage::ingestion::{BatchPayload, Feedback, ParseStage};
use qtriage::triage::{TierCounts, TriageStore};

const RESPONSE: &str = r#"{
    "message": "Processed 4 questions",
    "results": [
        {
            "id": "Q1",
            "question": "Is data encrypted at rest, and how?",
            "suggestedAnswer": {"text": "Yes, AES-256 via \"KMS\" keys."},
            "confidence_score": 95,
            "references": ["Encryption Standard Policy.pdf, page 3"]
        },
        {
            "id": "Q2",
            "question": "Do you perform annual penetration tests?",
            "suggestedAnswer": "{\"text\": \"Yes, by an external firm.\"}",
            "confidence_score": 60,
            "references": "Vulnerability Management Policy.docx"
        },
        {
            "id": "Q3",
            "question": "Is there a documented BCP?",
            "suggestedAnswer": "{'text': 'Partially.'}",
            "confidence_score": 30
        },
        {
            "id": "Q4",
            "question": "Do you enforce MFA?",
            "suggestedAnswer": "Plain answer without structure",
            "confidence": "medium"
        }
    ]
}"#;

fn load() -> (TriageStore, BatchPayload) {
    let payload = BatchPayload::from_json_str(RESPONSE).unwrap();
    let store = TriageStore::new();
    store.set_results(&payload);
    (store, payload)
}

#[test]
fn test_end_to_end_tiers_and_counts() {
    let (store, _) = load();
    let state = store.snapshot();

    let tiers: Vec<Tier> = state.records().iter().map(|r| r.confidence_tier).collect();
    assert_eq!(tiers, vec![Tier::High, Tier::Medium, Tier::Low, Tier::Medium]);
    assert_eq!(
        state.tier_counts(),
        TierCounts {
            high: 1,
            medium: 2,
            low: 1
        }
    );
    assert_eq!(state.tier_counts().needs_review(), 3);

    let stages: Vec<ParseStage> = state.records().iter().map(|r| r.answer_stage).collect();
    assert_eq!(
        stages,
        vec![
            ParseStage::Object,
            ParseStage::StrictJson,
            ParseStage::QuoteRepaired,
            ParseStage::Raw
        ]
    );
}

#[test]
fn test_bare_array_payload() {
    let payload = BatchPayload::from_json_str(r#"[{"question": "a"}, {"question": "b"}]"#).unwrap();
    let store = TriageStore::new();
    let state = store.set_results(&payload);

    let ids: Vec<&str> = state.records().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["Q1", "Q2"]);
    assert!(BatchPayload::from_json_str("not json").is_err());
}

#[test]
fn test_filter_preserves_order_and_feedback_keeps_tiers() {
    let (store, _) = load();
    store.set_feedback("Q3", Feedback::Approved);
    store.set_feedback("Q1", Feedback::Rejected);
    let state = store.snapshot();

    let medium: Vec<&str> = filter_questions(state.records(), &TierFilter::Only(Tier::Medium))
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(medium, vec!["Q2", "Q4"]);

    assert_eq!(filter_questions(state.records(), &TierFilter::All).len(), 4);
    assert_eq!(state.tier_counts().low, 1);
    assert_eq!(state.tier_counts().high, 1);
}

#[test]
fn test_selection_bulk_verdict() {
    let (store, _) = load();
    store.select_all(["Q2", "Q4", "missing"]);
    let state = store.set_feedback_for_selection(Feedback::Approved);

    let approved: Vec<&str> = state
        .approved_records()
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(approved, vec!["Q2", "Q4"]);
    assert!(!state.is_selected("missing"));
}

#[test]
fn test_csv_export_round_trip() {
    let (store, _) = load();
    store.set_feedback("Q3", Feedback::Rejected);
    let state = store.snapshot();
    let batch = state.batch().unwrap();

    let csv = to_csv(batch);
    let lines: Vec<&str> = csv.split('\n').collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(
        lines[0],
        "ID,Question,Answer,Confidence Score,Status,References"
    );

    let first = split_csv_line(lines[1]);
    assert_eq!(first[1], "Is data encrypted at rest, and how?");
    assert_eq!(first[2], "Yes, AES-256 via \"KMS\" keys.");
    assert_eq!(first[3], "95");
    assert_eq!(first[4], "Approved");
    assert_eq!(first[5], "Encryption Standard Policy.pdf, page 3");

    let statuses: Vec<String> = lines[1..]
        .iter()
        .map(|l| split_csv_line(l)[4].clone())
        .collect();
    assert_eq!(
        statuses,
        vec!["Approved", "Needs Review", "Rejected", "Needs Review"]
    );
}

#[test]
fn test_write_export_file_name() {
    let (store, _) = load();
    let state = store.snapshot();
    let dir = tempfile::TempDir::new().unwrap();
    let at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();

    let path = write_export(state.batch().unwrap(), dir.path(), at).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "security-questionnaire-results-2025-03-04T05-06-07-000Z.csv"
    );
    assert!(std::fs::read_to_string(path).unwrap().contains("Q4,"));
}

/// Minimal RFC 4180 splitter for a single line
fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            ('"', true) => quoted = false,
            ('"', false) if cell.is_empty() => quoted = true,
            (',', false) => cells.push(std::mem::take(&mut cell)),
            (c, _) => cell.push(c),
        }
    }
    cells.push(cell);
    cells
}
