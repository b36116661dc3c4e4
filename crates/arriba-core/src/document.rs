//! Document records: the write-side builder and the on-disk column bundles.
//!
//! A document record bundles the text, its metadata JSON, the span table
//! (as parallel `starts`/`lens` columns) and one [`CodeData`] per code that
//! tagged the document. Tags of a code are stored as parallel columns
//! ordered by span id ascending, which is also span-start order; tags
//! without a span sort first under the `-1` sentinel.
//!
//! The builder accumulates spans and tag drafts in arrival order, then
//! `finalize` establishes the canonical span order, remaps every reference
//! through the renumbering permutation, interns label values into the
//! archive-global code dictionary and packs all columns at their minimal
//! widths.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::code::{Code, CodeId, CodeTable};
use crate::column::{FloatColumn, IntColumn, UintColumn};
use crate::error::{ArribaError, Result};
use crate::span::{Span, SpanId, SpanTable};

// ============================================================================
// Labels and Tags
// ============================================================================

/// A label: a value string with an optional confidence score.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    /// Non-empty label value.
    pub value: String,
    /// Finite score, or absent.
    pub score: Option<f64>,
}

impl Label {
    /// Label without a score.
    pub fn new(value: impl Into<String>) -> Self {
        Label {
            value: value.into(),
            score: None,
        }
    }

    /// Label with a score.
    pub fn scored(value: impl Into<String>, score: f64) -> Self {
        Label {
            value: value.into(),
            score: Some(score),
        }
    }
}

/// A tag draft accumulated by the document builder.
///
/// `parent` refers to the position of another tag in the same code's list
/// for this document, in the order the tags were added; `finalize` remaps it
/// into span-sorted order.
#[derive(Debug, Clone, Default)]
pub struct Tag {
    /// Span id from the builder's span table, or none for document-level
    /// tags.
    pub span: Option<SpanId>,
    /// Ordered labels; empty is legal.
    pub labels: Vec<Label>,
    /// Parent tag index within the same code's tag list.
    pub parent: Option<u32>,
    /// Dense embedding vector.
    pub vector: Option<Vec<f64>>,
}

impl Tag {
    /// A document-level tag with no span.
    pub fn new() -> Self {
        Tag::default()
    }

    /// A tag anchored to a span.
    pub fn spanned(span: SpanId) -> Self {
        Tag {
            span: Some(span),
            ..Tag::default()
        }
    }

    /// Append an unscored label.
    pub fn with_label(mut self, value: impl Into<String>) -> Self {
        self.labels.push(Label::new(value));
        self
    }

    /// Append a scored label.
    pub fn with_scored_label(mut self, value: impl Into<String>, score: f64) -> Self {
        self.labels.push(Label::scored(value, score));
        self
    }

    /// Set the parent tag index (position in add order).
    pub fn with_parent(mut self, parent: u32) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Attach an embedding vector.
    pub fn with_vector(mut self, vector: Vec<f64>) -> Self {
        self.vector = Some(vector);
        self
    }
}

// ============================================================================
// Column Bundles
// ============================================================================

/// Label columns for one code in one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelColumns {
    /// Flat concatenation of label value ids across all tags.
    pub values: UintColumn,
    /// Scores aligned with `values`; `None` when no tag has any, `NaN` for
    /// an absent score inside a partially-scored code.
    pub scores: FloatColumn,
    /// Exclusive end offset of tag i's label slice; `None` when every tag
    /// has exactly one label.
    pub groups: UintColumn,
}

/// Per-tag embedding columns for one code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorColumns {
    /// Flat concatenation of vector elements across all tags.
    pub data: FloatColumn,
    /// Exclusive end offset of tag i's slice in `data`.
    pub groups: UintColumn,
}

/// The tag columns of one code in one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeData {
    /// Code index in the archive's code table.
    pub code: CodeId,
    /// Span id per tag, `-1` for document-level tags; `None` when every tag
    /// is document-level.
    pub spans: IntColumn,
    /// Label columns.
    pub labels: LabelColumns,
    /// Parent index per tag, `-1` for roots; `None` when no tag has one.
    pub parents: IntColumn,
    /// Embeddings; absent when the code has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectors: Option<VectorColumns>,
}

impl CodeData {
    /// Number of tags in this bundle.
    pub fn tag_count(&self) -> usize {
        if !self.spans.is_none() {
            self.spans.len()
        } else if !self.labels.groups.is_none() {
            self.labels.groups.len()
        } else if !self.labels.values.is_none() {
            // No group column means one label per tag.
            self.labels.values.len()
        } else {
            self.parents.len()
        }
    }

    /// Span id of tag `i`, or `None` for a document-level tag.
    pub fn span_of(&self, i: usize) -> Result<Option<SpanId>> {
        Ok(self.spans.get_index(i)?.map(|s| SpanId(s as u32)))
    }

    /// The half-open range of tag `i`'s labels in the flat label columns.
    pub fn label_range(&self, i: usize) -> (usize, usize) {
        if self.labels.groups.is_none() {
            if self.labels.values.is_none() {
                (0, 0)
            } else {
                (i, i + 1)
            }
        } else {
            let end = self.labels.groups.get(i).unwrap_or(0) as usize;
            let start = if i == 0 {
                0
            } else {
                self.labels.groups.get(i - 1).unwrap_or(0) as usize
            };
            (start, end)
        }
    }

    /// Labels of tag `i`, resolved through the code's value dictionary.
    pub fn labels_of(&self, i: usize, code: &Code) -> Result<Vec<Label>> {
        let (start, end) = self.label_range(i);
        (start..end)
            .map(|j| {
                let id = self.labels.values.get(j).ok_or_else(|| {
                    ArribaError::corrupt(format!("label column ends before offset {j}"))
                })?;
                let value = code.value(id).ok_or_else(|| {
                    ArribaError::corrupt(format!(
                        "value id {id} out of range for code '{}'",
                        code.name
                    ))
                })?;
                Ok(Label {
                    value: value.to_string(),
                    score: self.labels.scores.get_present(j),
                })
            })
            .collect()
    }

    /// Parent tag index of tag `i`, or `None` for a root.
    pub fn parent_of(&self, i: usize) -> Result<Option<usize>> {
        self.parents.get_index(i)
    }

    /// Embedding vector of tag `i`, or `None`.
    pub fn vector_of(&self, i: usize) -> Option<Vec<f64>> {
        let vectors = self.vectors.as_ref()?;
        let end = vectors.groups.get(i)? as usize;
        let start = if i == 0 {
            0
        } else {
            vectors.groups.get(i - 1)? as usize
        };
        if start == end {
            return None;
        }
        Some((start..end).filter_map(|j| vectors.data.get(j)).collect())
    }

    /// Position of the first tag referencing `span`, if any. Binary search
    /// over the span column, which is sorted ascending.
    pub fn find_by_span(&self, span: SpanId) -> Option<usize> {
        let n = self.tag_count();
        let target = span.0 as i64;
        let mut lo = 0usize;
        let mut hi = n;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.spans.get(mid).unwrap_or(-1) < target {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        (lo < n && self.spans.get(lo) == Some(target)).then_some(lo)
    }

    /// Cross-column consistency checks, run on first read access.
    pub fn validate(&self, span_count: usize, code_count: usize) -> Result<()> {
        let n = self.tag_count();
        if self.code.index() >= code_count {
            return Err(ArribaError::corrupt(format!(
                "code index {} out of range",
                self.code
            )));
        }
        if !self.spans.is_none() {
            let mut prev = i64::MIN;
            for i in 0..n {
                let s = self.spans.get(i).unwrap_or(-1);
                if s < -1 || s >= span_count as i64 {
                    return Err(ArribaError::corrupt(format!(
                        "span reference {s} out of range"
                    )));
                }
                if s < prev {
                    return Err(ArribaError::corrupt(
                        "tags are not sorted by span id",
                    ));
                }
                prev = s;
            }
        }
        if !self.labels.groups.is_none() {
            if self.labels.groups.len() != n {
                return Err(ArribaError::corrupt("group column length mismatch"));
            }
            let mut prev = 0u64;
            for i in 0..n {
                let g = self.labels.groups.get(i).unwrap_or(0);
                if g < prev {
                    return Err(ArribaError::corrupt("group offsets decrease"));
                }
                prev = g;
            }
            if prev as usize != self.labels.values.len() {
                return Err(ArribaError::corrupt(
                    "group offsets do not cover the value column",
                ));
            }
        } else if !self.labels.values.is_none() && self.labels.values.len() != n {
            return Err(ArribaError::corrupt(
                "value column length mismatch for single-label tags",
            ));
        }
        if !self.labels.scores.is_none() && self.labels.scores.len() != self.labels.values.len()
        {
            return Err(ArribaError::corrupt("score column length mismatch"));
        }
        if !self.parents.is_none() {
            if self.parents.len() != n {
                return Err(ArribaError::corrupt("parent column length mismatch"));
            }
            for i in 0..n {
                let p = self.parents.get(i).unwrap_or(-1);
                if p < -1 || p >= n as i64 {
                    return Err(ArribaError::corrupt(format!(
                        "parent index {p} out of range"
                    )));
                }
            }
        }
        if let Some(vectors) = &self.vectors {
            if vectors.groups.len() != n {
                return Err(ArribaError::corrupt("vector group length mismatch"));
            }
            if vectors.groups.get(n.saturating_sub(1)).unwrap_or(0) as usize
                != vectors.data.len()
            {
                return Err(ArribaError::corrupt(
                    "vector group offsets do not cover the data column",
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// DocumentRecord
// ============================================================================

/// One document as stored in the archive: a self-describing message holding
/// the text, metadata and all tag columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// UTF-8 document text.
    pub text: String,
    /// Metadata JSON text; empty when the document has none.
    pub meta: String,
    /// Span start offsets, in canonical span order.
    pub starts: UintColumn,
    /// Span lengths, parallel to `starts`.
    pub lens: UintColumn,
    /// Per-code tag bundles, sorted by code index.
    pub tags: Vec<CodeData>,
}

impl DocumentRecord {
    /// Decode the span table, re-checking the order invariant.
    pub fn span_table(&self) -> Result<SpanTable> {
        if self.starts.len() != self.lens.len() {
            return Err(ArribaError::corrupt(
                "span start and length columns differ in length",
            ));
        }
        let text_len = self.text.len() as u64;
        let spans: Vec<Span> = self
            .starts
            .to_vec()
            .into_iter()
            .zip(self.lens.to_vec())
            .map(|(start, len)| {
                let end = start.checked_add(len).ok_or_else(|| {
                    ArribaError::corrupt(format!("span at {start} overflows the offset range"))
                })?;
                if end > text_len {
                    return Err(ArribaError::corrupt(format!(
                        "span {start}..{end} exceeds document text of {text_len} bytes"
                    )));
                }
                Ok(Span::new(start, end))
            })
            .collect::<Result<_>>()?;
        SpanTable::from_sorted(spans)
    }

    /// Parsed metadata, or `None` when the document has none.
    pub fn meta_json(&self) -> Result<Option<serde_json::Value>> {
        if self.meta.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&self.meta)
            .map(Some)
            .map_err(|e| ArribaError::corrupt(format!("metadata is not valid JSON: {e}")))
    }

    /// The tag bundle for a code, by binary search over the sorted list.
    pub fn code_data(&self, code: CodeId) -> Option<&CodeData> {
        self.tags
            .binary_search_by_key(&code, |cd| cd.code)
            .ok()
            .map(|i| &self.tags[i])
    }

    /// Structural checks run on first read access.
    pub fn validate(&self, code_count: usize) -> Result<()> {
        let span_count = self.starts.len();
        for window in self.tags.windows(2) {
            if window[0].code >= window[1].code {
                return Err(ArribaError::corrupt(
                    "code bundles are not sorted by code index",
                ));
            }
        }
        for bundle in &self.tags {
            bundle.validate(span_count, code_count)?;
        }
        Ok(())
    }
}

// ============================================================================
// DocumentBuilder
// ============================================================================

/// Accumulates one document's spans and tags before packing.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    text: String,
    meta: Option<serde_json::Value>,
    spans: SpanTable,
    tags: BTreeMap<CodeId, Vec<Tag>>,
}

impl DocumentBuilder {
    /// Start a document over the given text.
    pub fn new(text: impl Into<String>) -> Self {
        DocumentBuilder {
            text: text.into(),
            ..DocumentBuilder::default()
        }
    }

    /// The document text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Attach metadata.
    pub fn set_meta(&mut self, meta: serde_json::Value) {
        self.meta = Some(meta);
    }

    /// Insert a span, deduplicating identical intervals.
    ///
    /// Fails with `OUT_OF_RANGE` when the endpoints do not satisfy
    /// `start <= end <= len(text)`.
    pub fn span(&mut self, start: u64, end: u64) -> Result<SpanId> {
        if start > end || end > self.text.len() as u64 {
            return Err(ArribaError::OutOfRange {
                start,
                end,
                len: self.text.len() as u64,
            });
        }
        Ok(self.spans.insert(start, end))
    }

    /// Add a tag under a code.
    pub fn add_tag(&mut self, code: CodeId, tag: Tag) {
        self.tags.entry(code).or_default().push(tag);
    }

    /// Number of tags added for a code so far. The next tag added for the
    /// code gets this position, which is what `parent` references point at.
    pub fn tag_count(&self, code: CodeId) -> usize {
        self.tags.get(&code).map_or(0, Vec::len)
    }

    /// Finalize into a document record, interning label values into the
    /// archive-global code table.
    ///
    /// Establishes the canonical span order, remaps span and parent
    /// references, and packs every column at its minimal width. Consistency
    /// violations (parent out of range, empty label value, non-finite
    /// score) fail with `CORRUPT_ARCHIVE`.
    pub fn finalize(mut self, codes: &mut CodeTable) -> Result<DocumentRecord> {
        let perm = self.spans.sort_and_renumber();
        let starts: Vec<u64> = self.spans.as_slice().iter().map(|s| s.start).collect();
        let lens: Vec<u64> = self.spans.as_slice().iter().map(|s| s.len()).collect();

        let mut bundles = Vec::with_capacity(self.tags.len());
        for (code, tags) in self.tags {
            if tags.is_empty() {
                continue;
            }
            bundles.push(pack_code(code, tags, &perm, codes)?);
        }

        let meta = match self.meta {
            Some(value) => value.to_string(),
            None => String::new(),
        };

        Ok(DocumentRecord {
            text: self.text,
            meta,
            starts: UintColumn::pack(&starts),
            lens: UintColumn::pack(&lens),
            tags: bundles,
        })
    }
}

/// Pack one code's tag drafts into columns.
fn pack_code(
    code: CodeId,
    mut tags: Vec<Tag>,
    span_perm: &[u32],
    codes: &mut CodeTable,
) -> Result<CodeData> {
    for tag in &mut tags {
        if let Some(span) = tag.span {
            tag.span = Some(SpanId(span_perm[span.index()]));
        }
    }

    // Sort into span-id order; the permutation also remaps parent indices,
    // which referenced positions in add order.
    let mut order: Vec<usize> = (0..tags.len()).collect();
    order.sort_by_key(|&i| tags[i].span.map_or(-1, |s| s.0 as i64));
    let mut old_to_new = vec![0usize; tags.len()];
    for (new, &old) in order.iter().enumerate() {
        old_to_new[old] = new;
    }
    let mut sorted = Vec::with_capacity(tags.len());
    for &old in &order {
        sorted.push(tags[old].clone());
    }

    for tag in &sorted {
        if let Some(p) = tag.parent {
            if p as usize >= sorted.len() {
                return Err(ArribaError::corrupt(format!(
                    "parent index {p} out of range for code {code}"
                )));
            }
        }
        for label in &tag.labels {
            if label.value.is_empty() {
                return Err(ArribaError::corrupt("empty label value"));
            }
            if let Some(score) = label.score {
                if !score.is_finite() {
                    return Err(ArribaError::corrupt("label score is not finite"));
                }
            }
        }
    }

    let span_refs: Vec<i64> = sorted
        .iter()
        .map(|t| t.span.map_or(-1, |s| s.0 as i64))
        .collect();

    let mut value_ids = Vec::new();
    let mut scores = Vec::new();
    let mut groups = Vec::with_capacity(sorted.len());
    let mut any_score = false;
    let mut all_single = true;
    for tag in &sorted {
        if tag.labels.len() != 1 {
            all_single = false;
        }
        for label in &tag.labels {
            value_ids.push(codes.intern_value(code, &label.value));
            match label.score {
                Some(score) => {
                    any_score = true;
                    scores.push(score);
                }
                None => scores.push(f64::NAN),
            }
        }
        groups.push(value_ids.len() as u64);
    }

    let parents: Vec<i64> = sorted
        .iter()
        .map(|t| t.parent.map_or(-1, |p| old_to_new[p as usize] as i64))
        .collect();

    let vectors = if sorted.iter().any(|t| t.vector.is_some()) {
        let mut data = Vec::new();
        let mut vector_groups = Vec::with_capacity(sorted.len());
        for tag in &sorted {
            if let Some(vector) = &tag.vector {
                data.extend_from_slice(vector);
            }
            vector_groups.push(data.len() as u64);
        }
        Some(VectorColumns {
            data: FloatColumn::pack(&data),
            groups: UintColumn::pack(&vector_groups),
        })
    } else {
        None
    };

    Ok(CodeData {
        code,
        spans: IntColumn::pack(&span_refs),
        labels: LabelColumns {
            values: UintColumn::pack(&value_ids),
            scores: if any_score {
                FloatColumn::pack(&scores)
            } else {
                FloatColumn::None
            },
            groups: if all_single {
                UintColumn::None
            } else {
                UintColumn::pack(&groups)
            },
        },
        parents: IntColumn::pack(&parents),
        vectors,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::tagger::TaggerId;

    fn code_table() -> (CodeTable, CodeId) {
        let mut codes = CodeTable::new();
        let code = codes.intern(TaggerId(0), "pos");
        (codes, code)
    }

    mod builder {
        use super::*;

        #[test]
        fn span_endpoints_are_validated_against_the_text() {
            let mut doc = DocumentBuilder::new("San Francisco");
            assert!(doc.span(0, 13).is_ok());
            let err = doc.span(5, 20).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::OutOfRange);
            let err = doc.span(7, 3).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::OutOfRange);
        }

        #[test]
        fn finalize_sorts_spans_and_remaps_references() {
            let (mut codes, code) = code_table();
            let mut doc = DocumentBuilder::new("San Francisco");
            let inner = doc.span(0, 3).unwrap();
            let outer = doc.span(0, 13).unwrap();
            doc.add_tag(code, Tag::spanned(inner).with_label("PROPN"));
            doc.add_tag(code, Tag::spanned(outer).with_label("GPE"));
            let record = doc.finalize(&mut codes).unwrap();

            // Outer-before-inner on equal start.
            assert_eq!(record.starts.to_vec(), vec![0, 0]);
            assert_eq!(record.lens.to_vec(), vec![13, 3]);

            // Tags re-sorted into span order: GPE (span 0) before PROPN (span 1).
            let bundle = &record.tags[0];
            assert_eq!(bundle.spans.get(0), Some(0));
            assert_eq!(bundle.spans.get(1), Some(1));
            let labels = bundle.labels_of(0, codes.get(code)).unwrap();
            assert_eq!(labels[0].value, "GPE");
        }

        #[test]
        fn parent_indices_follow_the_tag_permutation() {
            let (mut codes, code) = code_table();
            let mut doc = DocumentBuilder::new("a b");
            let first = doc.span(2, 3).unwrap();
            let second = doc.span(0, 1).unwrap();
            // Tag 0 (span 2..3) is the child of tag 1 (span 0..1).
            doc.add_tag(code, Tag::spanned(first).with_label("b").with_parent(1));
            doc.add_tag(code, Tag::spanned(second).with_label("a"));
            let record = doc.finalize(&mut codes).unwrap();

            let bundle = &record.tags[0];
            // After span sorting, "a" is tag 0 and "b" is tag 1.
            assert_eq!(bundle.parent_of(0).unwrap(), None);
            assert_eq!(bundle.parent_of(1).unwrap(), Some(0));
        }

        #[test]
        fn out_of_range_parent_is_rejected() {
            let (mut codes, code) = code_table();
            let mut doc = DocumentBuilder::new("x");
            doc.add_tag(code, Tag::new().with_label("A").with_parent(7));
            let err = doc.finalize(&mut codes).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::CorruptArchive);
        }

        #[test]
        fn empty_label_values_are_rejected() {
            let (mut codes, code) = code_table();
            let mut doc = DocumentBuilder::new("x");
            doc.add_tag(code, Tag::new().with_label(""));
            assert!(doc.finalize(&mut codes).is_err());
        }
    }

    mod columns {
        use super::*;

        #[test]
        fn single_label_tags_omit_the_group_column() {
            let (mut codes, code) = code_table();
            let mut doc = DocumentBuilder::new("a b");
            let s = doc.span(0, 1).unwrap();
            doc.add_tag(code, Tag::spanned(s).with_label("X"));
            let record = doc.finalize(&mut codes).unwrap();
            assert!(record.tags[0].labels.groups.is_none());
            assert_eq!(record.tags[0].tag_count(), 1);
        }

        #[test]
        fn multi_label_tags_write_group_offsets() {
            let (mut codes, code) = code_table();
            let mut doc = DocumentBuilder::new("a");
            let s = doc.span(0, 1).unwrap();
            doc.add_tag(
                code,
                Tag::spanned(s)
                    .with_scored_label("A", 0.875)
                    .with_scored_label("B", 0.125),
            );
            doc.add_tag(code, Tag::spanned(s).with_label("C"));
            let record = doc.finalize(&mut codes).unwrap();
            let bundle = &record.tags[0];
            assert_eq!(bundle.labels.groups.to_vec(), vec![2, 3]);
            assert_eq!(bundle.label_range(0), (0, 2));
            assert_eq!(bundle.label_range(1), (2, 3));
        }

        #[test]
        fn scoreless_codes_write_no_score_column() {
            let (mut codes, code) = code_table();
            let mut doc = DocumentBuilder::new("a");
            let s = doc.span(0, 1).unwrap();
            doc.add_tag(code, Tag::spanned(s).with_label("X"));
            let record = doc.finalize(&mut codes).unwrap();
            assert!(record.tags[0].labels.scores.is_none());
        }

        #[test]
        fn partially_scored_codes_mark_absent_scores_as_nan() {
            let (mut codes, code) = code_table();
            let mut doc = DocumentBuilder::new("a b");
            let s0 = doc.span(0, 1).unwrap();
            let s1 = doc.span(2, 3).unwrap();
            doc.add_tag(code, Tag::spanned(s0).with_scored_label("A", 0.5));
            doc.add_tag(code, Tag::spanned(s1).with_label("B"));
            let record = doc.finalize(&mut codes).unwrap();
            let bundle = &record.tags[0];
            let code_ref = codes.get(code);
            assert_eq!(
                bundle.labels_of(0, code_ref).unwrap()[0].score,
                Some(0.5)
            );
            assert_eq!(bundle.labels_of(1, code_ref).unwrap()[0].score, None);
        }

        #[test]
        fn spanless_tags_sort_first_and_pack_to_none_when_alone() {
            let (mut codes, code) = code_table();
            let mut doc = DocumentBuilder::new("a");
            doc.add_tag(code, Tag::new().with_label("doc-level"));
            let record = doc.finalize(&mut codes).unwrap();
            let bundle = &record.tags[0];
            assert!(bundle.spans.is_none());
            assert_eq!(bundle.tag_count(), 1);
            assert_eq!(bundle.span_of(0).unwrap(), None);
        }

        #[test]
        fn vectors_pack_per_tag_with_group_offsets() {
            let (mut codes, code) = code_table();
            let mut doc = DocumentBuilder::new("a b");
            let s0 = doc.span(0, 1).unwrap();
            let s1 = doc.span(2, 3).unwrap();
            doc.add_tag(
                code,
                Tag::spanned(s0).with_label("A").with_vector(vec![0.5, 1.5]),
            );
            doc.add_tag(code, Tag::spanned(s1).with_label("B"));
            let record = doc.finalize(&mut codes).unwrap();
            let bundle = &record.tags[0];
            assert_eq!(bundle.vector_of(0), Some(vec![0.5, 1.5]));
            assert_eq!(bundle.vector_of(1), None);
        }
    }

    mod widths {
        use super::*;

        #[test]
        fn short_documents_pack_offsets_into_bytes() {
            let (mut codes, code) = code_table();
            let text = "x".repeat(100);
            let mut doc = DocumentBuilder::new(text);
            for i in 0..50 {
                let s = doc.span(i, i + 2).unwrap();
                doc.add_tag(code, Tag::spanned(s).with_label("T"));
            }
            let record = doc.finalize(&mut codes).unwrap();
            assert_eq!(record.starts.width(), Some(8));
            assert_eq!(record.lens.width(), Some(8));
            assert_eq!(record.tags[0].spans.width(), Some(8));
        }

        #[test]
        fn long_documents_widen_their_own_columns_only() {
            let (mut codes, code) = code_table();
            let text = "x".repeat(70_000);
            let mut doc = DocumentBuilder::new(text);
            let s = doc.span(69_000, 69_010).unwrap();
            doc.add_tag(code, Tag::spanned(s).with_label("T"));
            let record = doc.finalize(&mut codes).unwrap();
            assert_eq!(record.starts.width(), Some(32));
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn round_trip_through_validate_passes() {
            let (mut codes, code) = code_table();
            let mut doc = DocumentBuilder::new("San Francisco");
            let s = doc.span(0, 13).unwrap();
            doc.add_tag(code, Tag::spanned(s).with_label("GPE"));
            let record = doc.finalize(&mut codes).unwrap();
            record.validate(codes.len()).unwrap();
            record.span_table().unwrap();
        }

        #[test]
        fn span_exceeding_text_is_detected_on_read() {
            let record = DocumentRecord {
                text: "ab".to_string(),
                meta: String::new(),
                starts: UintColumn::pack(&[0]),
                lens: UintColumn::pack(&[5]),
                tags: vec![],
            };
            assert!(record.span_table().is_err());
        }

        #[test]
        fn misordered_code_bundles_are_detected() {
            let (mut codes, _) = code_table();
            let second = codes.intern(TaggerId(0), "ent");
            let mut doc = DocumentBuilder::new("x");
            doc.add_tag(second, Tag::new().with_label("A"));
            let mut record = doc.finalize(&mut codes).unwrap();
            record.tags.push(record.tags[0].clone());
            assert!(record.validate(codes.len()).is_err());
        }
    }
}
