//! Serde model of the per-document bahia JSON object.
//!
//! ```json
//! {
//!   "text": "San Francisco",
//!   "external_key": "doc-17",
//!   "meta": {"source": "news"},
//!   "taggers": [
//!     {
//!       "tagger": {"library": {"name": "spacy", "version": "3.2.1"}},
//!       "tags": {
//!         "ent": [{"start": 0, "end": 13, "labels": [{"value": "GPE"}]}],
//!         "token": [{"start": 0, "end": 3}, {"start": 4, "end": 13}]
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! Absent fields stay absent on re-serialization. Tag names map to lists in
//! a sorted map so exported documents render deterministically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One document in the bahia interchange format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BahiaDocument {
    /// UTF-8 document text.
    pub text: String,
    /// Caller-supplied stable key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_key: Option<String>,
    /// Free-form metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    /// Free-form statistics emitted by the pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat: Option<Value>,
    /// Per-tagger tag sets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taggers: Vec<BahiaTagger>,
}

impl BahiaDocument {
    /// A document with text only.
    pub fn new(text: impl Into<String>) -> Self {
        BahiaDocument {
            text: text.into(),
            external_key: None,
            meta: None,
            stat: None,
            taggers: Vec::new(),
        }
    }
}

/// One tagger's contribution to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BahiaTagger {
    /// The tagger signature.
    pub tagger: Value,
    /// Tag name to tag list.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, Vec<BahiaTag>>,
}

/// A single tag. Tags without `start`/`end` are document-level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BahiaTag {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<BahiaLabel>>,
    /// Position of the parent tag in the same list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<u32>,
}

impl BahiaTag {
    /// A spanned tag without labels.
    pub fn spanned(start: u64, end: u64) -> Self {
        BahiaTag {
            start: Some(start),
            end: Some(end),
            labels: None,
            parent: None,
        }
    }

    /// Append a label.
    pub fn with_label(mut self, value: impl Into<String>) -> Self {
        self.labels
            .get_or_insert_with(Vec::new)
            .push(BahiaLabel {
                value: value.into(),
                score: None,
            });
        self
    }

    /// Append a scored label.
    pub fn with_scored_label(mut self, value: impl Into<String>, score: f64) -> Self {
        self.labels
            .get_or_insert_with(Vec::new)
            .push(BahiaLabel {
                value: value.into(),
                score: Some(score),
            });
        self
    }

    /// Set the parent index.
    pub fn with_parent(mut self, parent: u32) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// A label value with an optional score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BahiaLabel {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_fields_stay_absent() {
        let doc = BahiaDocument::new("hello");
        let rendered = serde_json::to_string(&doc).unwrap();
        assert_eq!(rendered, r#"{"text":"hello"}"#);
    }

    #[test]
    fn round_trips_through_json() {
        let mut doc = BahiaDocument::new("San Francisco");
        doc.external_key = Some("doc-17".to_string());
        doc.taggers.push(BahiaTagger {
            tagger: json!({"library": {"name": "spacy"}}),
            tags: BTreeMap::from([(
                "ent".to_string(),
                vec![BahiaTag::spanned(0, 13).with_scored_label("GPE", 0.5)],
            )]),
        });
        let rendered = serde_json::to_string(&doc).unwrap();
        let back: BahiaDocument = serde_json::from_str(&rendered).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn spanless_tags_parse() {
        let tag: BahiaTag =
            serde_json::from_str(r#"{"labels": [{"value": "news"}]}"#).unwrap();
        assert_eq!(tag.start, None);
        assert_eq!(tag.end, None);
        assert_eq!(tag.labels.unwrap()[0].value, "news");
    }
}
