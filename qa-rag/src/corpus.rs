//! Corpus loading.
//!
//! The corpus is a JSON array of objects with string fields `QUESTION` and
//! `ANSWER`. It is read once at startup and turned into one [`Document`] per
//! record, preserving order.

use std::path::Path;

use tracing::{debug, info};

use crate::document::{Document, QaRecord};
use crate::error::{RagError, Result};

/// Parse corpus records from a JSON string.
///
/// `source` names the origin in error messages.
///
/// # Errors
///
/// Returns [`RagError::CorpusLoadError`] if the input is not a JSON array of
/// objects that each carry string `QUESTION` and `ANSWER` fields.
pub fn parse_records(json: &str, source: &str) -> Result<Vec<QaRecord>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)
        .map_err(|e| RagError::corpus(source, format!("malformed corpus: {e}")))?;

    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            serde_json::from_value::<QaRecord>(value)
                .map_err(|e| RagError::corpus(source, format!("record {i}: {e}")))
        })
        .collect()
}

/// Read and parse the corpus file at `path`.
///
/// # Errors
///
/// Returns [`RagError::CorpusLoadError`] if the file is missing, unreadable,
/// or malformed.
pub async fn load_records(path: impl AsRef<Path>) -> Result<Vec<QaRecord>> {
    let path = path.as_ref();
    let source = path.display().to_string();
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RagError::corpus(&source, format!("cannot read corpus: {e}")))?;
    let records = parse_records(&json, &source)?;
    info!(corpus = %source, record_count = records.len(), "loaded corpus");
    Ok(records)
}

/// Normalize records into documents, one per record, in order.
pub fn to_documents(records: &[QaRecord]) -> Vec<Document> {
    let documents: Vec<Document> =
        records.iter().enumerate().map(|(i, r)| Document::from_record(i, r)).collect();
    debug!(document_count = documents.len(), "normalized corpus records");
    documents
}

/// Load the corpus at `path` straight into documents.
///
/// # Errors
///
/// See [`load_records`].
pub async fn load_documents(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let records = load_records(path).await?;
    Ok(to_documents(&records))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records_in_order() {
        let json = r#"[
            {"QUESTION": "What are the admission requirements?", "ANSWER": "A diploma."},
            {"QUESTION": "Where is the campus?", "ANSWER": "Warsaw."}
        ]"#;
        let records = parse_records(json, "inline").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].question, "Where is the campus?");

        let docs = to_documents(&records);
        assert_eq!(docs[0].id, "qa_0");
        assert!(docs[0].text.starts_with("Question: What are the admission"));
        assert!(docs[1].text.ends_with("Answer: Warsaw."));
    }

    #[test]
    fn missing_field_is_a_load_error() {
        let err = parse_records(r#"[{"QUESTION": "Only a question"}]"#, "inline").unwrap_err();
        match err {
            RagError::CorpusLoadError { path, message } => {
                assert_eq!(path, "inline");
                assert!(message.contains("record 0"), "{message}");
                assert!(message.contains("ANSWER"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_string_field_is_a_load_error() {
        let err = parse_records(r#"[{"QUESTION": "Q", "ANSWER": 42}]"#, "inline").unwrap_err();
        assert!(matches!(err, RagError::CorpusLoadError { .. }));
    }

    #[test]
    fn malformed_json_is_a_load_error() {
        assert!(matches!(
            parse_records("{not json", "inline"),
            Err(RagError::CorpusLoadError { .. })
        ));
        assert!(matches!(
            parse_records(r#"{"QUESTION": "Q", "ANSWER": "A"}"#, "inline"),
            Err(RagError::CorpusLoadError { .. })
        ));
    }

    #[tokio::test]
    async fn missing_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_records(dir.path().join("absent.json")).await.unwrap_err();
        match err {
            RagError::CorpusLoadError { path, .. } => assert!(path.ends_with("absent.json")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn loads_documents_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.json");
        std::fs::write(&path, r#"[{"QUESTION": "Q1", "ANSWER": "A1"}]"#).unwrap();
        let docs = load_documents(&path).await.unwrap();
        assert_eq!(docs, vec![Document { id: "qa_0".into(), text: "Question: Q1\nAnswer: A1".into() }]);
    }
}
