//! Read-side facade: documents, tag handles and label projection.
//!
//! There is no distinction between structural tags (sentence, token) and
//! label tags (pos, ent): everything is a span with labels, possibly
//! contained in another span. The facade offers exactly two access
//! primitives over a container span:
//!
//! - the list of tags of a name whose spans are strictly contained in the
//!   container (`sentence -> tokens`), and
//! - the single tag of a name whose span equals the container exactly
//!   (`token -> pos`), projected through the entry's label type.
//!
//! A missing aligned tag projects to the label type's empty value, never an
//! error: asking a token for its `sentence` label yields `""` when no
//! sentence is aligned to the token span.

use std::fmt;

use crate::archive::Archive;
use crate::code::Code;
use crate::document::{CodeData, DocumentRecord, Label};
use crate::error::{ArribaError, Result};
use crate::selector::{View, ViewEntry};
use crate::span::{Span, SpanTable};

// ============================================================================
// Label Projection
// ============================================================================

/// How a tag's labels are projected when read through the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelType {
    /// Values joined by `|`; the empty string for no labels. No escaping is
    /// applied when a value itself contains `|`; use [`LabelType::Strs`] to
    /// disambiguate.
    Str,
    /// The list of values.
    Strs,
    /// The full `(value, score)` records.
    Labels,
}

impl LabelType {
    /// Default projection for a tag name: `str`, except morphological names
    /// which default to `strs`.
    pub fn default_for(name: &str) -> LabelType {
        match name {
            "morph" | "feats" => LabelType::Strs,
            _ => LabelType::Str,
        }
    }
}

/// A projected label reading.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelValue {
    Str(String),
    Strs(Vec<String>),
    Labels(Vec<Label>),
}

impl LabelValue {
    /// Project labels through a label type.
    pub fn project(labels: Vec<Label>, label_type: LabelType) -> LabelValue {
        match label_type {
            LabelType::Str => LabelValue::Str(
                labels
                    .iter()
                    .map(|l| l.value.as_str())
                    .collect::<Vec<_>>()
                    .join("|"),
            ),
            LabelType::Strs => {
                LabelValue::Strs(labels.into_iter().map(|l| l.value).collect())
            }
            LabelType::Labels => LabelValue::Labels(labels),
        }
    }

    /// The empty value of a label type, used when no tag is aligned.
    pub fn empty(label_type: LabelType) -> LabelValue {
        LabelValue::project(Vec::new(), label_type)
    }

    /// The joined string, for `Str` projections.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LabelValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The value list, for `Strs` projections.
    pub fn as_strs(&self) -> Option<&[String]> {
        match self {
            LabelValue::Strs(v) => Some(v),
            _ => None,
        }
    }

    /// The label records, for `Labels` projections.
    pub fn as_labels(&self) -> Option<&[Label]> {
        match self {
            LabelValue::Labels(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelValue::Str(s) => f.write_str(s),
            LabelValue::Strs(v) => write!(f, "{}", v.join("|")),
            LabelValue::Labels(v) => {
                let joined = v
                    .iter()
                    .map(|l| l.value.clone())
                    .collect::<Vec<_>>()
                    .join("|");
                f.write_str(&joined)
            }
        }
    }
}

// ============================================================================
// DocumentView
// ============================================================================

/// One document materialized under a view.
///
/// The record and span table are decoded once on construction and cached on
/// this cursor; dropping the view releases them.
#[derive(Debug)]
pub struct DocumentView<'a> {
    archive: &'a Archive,
    view: &'a View,
    index: usize,
    record: DocumentRecord,
    spans: SpanTable,
}

impl<'a> DocumentView<'a> {
    pub(crate) fn new(archive: &'a Archive, view: &'a View, index: usize) -> Result<Self> {
        let record = archive.record(index)?;
        let spans = record.span_table()?;
        Ok(DocumentView {
            archive,
            view,
            index,
            record,
            spans,
        })
    }

    /// Position of this document in the archive.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The document text.
    pub fn text(&self) -> &str {
        &self.record.text
    }

    /// Parsed document metadata, if any.
    pub fn meta(&self) -> Result<Option<serde_json::Value>> {
        self.record.meta_json()
    }

    /// The decoded record.
    pub fn record(&self) -> &DocumentRecord {
        &self.record
    }

    /// The decoded span table.
    pub fn spans(&self) -> &SpanTable {
        &self.spans
    }

    /// The span covering the whole document text.
    pub fn doc_span(&self) -> Span {
        Span::new(0, self.record.text.len() as u64)
    }

    /// All tags exported under `name`, in span-sorted order, including
    /// document-level tags.
    pub fn tags<'v>(&'v self, name: &str) -> Result<Vec<TagHandle<'v>>> {
        let entry = self.entry(name)?;
        let Some((data, code)) = self.data_for(entry) else {
            return Ok(Vec::new());
        };
        (0..data.tag_count())
            .map(|i| {
                Ok(TagHandle {
                    doc: self,
                    entry,
                    data,
                    code,
                    index: i,
                })
            })
            .collect()
    }

    /// Tags of `name` whose spans are strictly contained in `container`.
    ///
    /// A tag whose span equals the container exactly is not listed; it is
    /// reachable through [`aligned`]. Document-level tags never appear in
    /// containment queries.
    ///
    /// [`aligned`]: DocumentView::aligned
    pub fn tags_in<'v>(&'v self, container: Span, name: &str) -> Result<Vec<TagHandle<'v>>> {
        let entry = self.entry(name)?;
        let Some((data, code)) = self.data_for(entry) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for i in 0..data.tag_count() {
            let Some(span_id) = data.span_of(i)? else {
                continue;
            };
            let Some(span) = self.spans.get(span_id) else {
                continue;
            };
            // Tags are span-sorted, so once a span starts past the container
            // nothing further can be contained.
            if span.start > container.end {
                break;
            }
            if span != container && container.contains(&span) {
                out.push(TagHandle {
                    doc: self,
                    entry,
                    data,
                    code,
                    index: i,
                });
            }
        }
        Ok(out)
    }

    /// The single tag of `name` whose span equals `container` exactly.
    pub fn aligned<'v>(&'v self, container: Span, name: &str) -> Result<Option<TagHandle<'v>>> {
        let entry = self.entry(name)?;
        let Some((data, code)) = self.data_for(entry) else {
            return Ok(None);
        };
        let Some(span_id) = self.spans.find_aligned(container.start, container.end) else {
            return Ok(None);
        };
        Ok(data.find_by_span(span_id).map(|index| TagHandle {
            doc: self,
            entry,
            data,
            code,
            index,
        }))
    }

    /// Projected label of the tag aligned to `container`, or the label
    /// type's empty value when none is aligned.
    pub fn value(&self, container: Span, name: &str) -> Result<LabelValue> {
        let entry = self.entry(name)?;
        match self.aligned(container, name)? {
            Some(tag) => tag.value(),
            None => Ok(LabelValue::empty(entry.label_type)),
        }
    }

    /// Tags of every view entry contained in `container`, grouped by code in
    /// the order the view lists them.
    pub fn all_tags_in<'v>(&'v self, container: Span) -> Result<Vec<TagHandle<'v>>> {
        let mut out = Vec::new();
        for entry in self.view.entries() {
            out.extend(self.tags_in(container, &entry.export)?);
        }
        Ok(out)
    }

    fn entry(&self, name: &str) -> Result<&'a ViewEntry> {
        self.view.lookup(name).ok_or_else(|| ArribaError::UnknownTag {
            name: name.to_string(),
        })
    }

    fn data_for(&self, entry: &ViewEntry) -> Option<(&CodeData, &'a Code)> {
        let code = entry.code?;
        let data = self.record.code_data(code)?;
        Some((data, &self.archive.codes()[code.index()]))
    }
}

// ============================================================================
// TagHandle
// ============================================================================

/// A single tag within a document view.
///
/// The handle is an index into the document's columns, not an owning
/// object; navigation (parent, contained tags, aligned labels) goes back
/// through the document.
#[derive(Debug, Clone, Copy)]
pub struct TagHandle<'v> {
    doc: &'v DocumentView<'v>,
    entry: &'v ViewEntry,
    data: &'v CodeData,
    code: &'v Code,
    index: usize,
}

impl<'v> TagHandle<'v> {
    /// The name this tag is exported under.
    pub fn name(&self) -> &str {
        &self.entry.export
    }

    /// Position of this tag among its code's tags in the document.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The tag's span, or `None` for a document-level tag.
    pub fn span(&self) -> Result<Option<Span>> {
        Ok(self
            .data
            .span_of(self.index)?
            .and_then(|id| self.doc.spans.get(id)))
    }

    /// The covered text, or the whole document for a document-level tag.
    pub fn text(&self) -> Result<&'v str> {
        let span = self.span()?.unwrap_or_else(|| self.doc.doc_span());
        Ok(&self.doc.record.text[span.start as usize..span.end as usize])
    }

    /// The tag's labels in order.
    pub fn labels(&self) -> Result<Vec<Label>> {
        self.data.labels_of(self.index, self.code)
    }

    /// The labels projected through the entry's label type.
    pub fn value(&self) -> Result<LabelValue> {
        Ok(LabelValue::project(self.labels()?, self.entry.label_type))
    }

    /// The parent tag, or `None` for a root.
    pub fn parent(&self) -> Result<Option<TagHandle<'v>>> {
        Ok(self.data.parent_of(self.index)?.map(|index| TagHandle {
            index,
            ..*self
        }))
    }

    /// The tag's embedding vector, or `None`.
    pub fn vector(&self) -> Option<Vec<f64>> {
        self.data.vector_of(self.index)
    }

    /// Tags of `name` contained in this tag's span. A document-level tag
    /// contains everything.
    pub fn tags(&self, name: &str) -> Result<Vec<TagHandle<'v>>> {
        let container = self.span()?.unwrap_or_else(|| self.doc.doc_span());
        self.doc.tags_in(container, name)
    }

    /// Projected label of the tag of `name` aligned to this tag's span;
    /// the empty value when none is aligned.
    pub fn get(&self, name: &str) -> Result<LabelValue> {
        let container = self.span()?.unwrap_or_else(|| self.doc.doc_span());
        self.doc.value(container, name)
    }
}

// ============================================================================
// Tests
// ============================================================================
