use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::state::{content::TeamProfile, event::EventState};

pub const EVENT_DOC_ID: &str = "event::current";
pub const TEAM_PREFIX: &str = "team::";
pub const PACKAGE_PREFIX: &str = "package::";
pub const QUESTION_PREFIX: &str = "question::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Envelope shared by every stored document. The domain value is nested
/// rather than flattened so non-string map keys keep round-tripping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub body: T,
}

impl<T> CouchDocument<T> {
    pub fn new(id: String, body: T) -> Self {
        Self {
            id,
            rev: None,
            body,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBody {
    pub revision: u64,
    pub state: EventState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamBody {
    pub position: usize,
    pub team: TeamProfile,
}

pub fn team_doc_id(id: Uuid) -> String {
    format!("{TEAM_PREFIX}{id}")
}

pub fn package_doc_id(id: Uuid) -> String {
    format!("{PACKAGE_PREFIX}{id}")
}

pub fn question_doc_id(id: Uuid) -> String {
    format!("{QUESTION_PREFIX}{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_omits_missing_revision() {
        let doc = CouchDocument::new(team_doc_id(Uuid::nil()), 7u32);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "_id": "team::00000000-0000-0000-0000-000000000000",
                "body": 7
            })
        );
    }
}
