//! Per-document span table with containment queries.
//!
//! A span is a half-open byte interval `[start, end)` into a document's
//! UTF-8 text. Spans are deduplicated per document: two tags covering the
//! same interval share one span id.
//!
//! ## Canonical order
//!
//! A finalized table stores spans sorted by `(start ASC, start − end ASC)`:
//! ties on `start` are broken longer-first, so an outer span precedes the
//! spans it contains. Span ids are positions in this order, which makes
//! containment iteration a bounded forward scan.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ArribaError, Result};

// ============================================================================
// Span
// ============================================================================

/// Half-open byte interval `[start, end)` into a document's UTF-8 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: u64,
    /// End byte offset (exclusive). `start <= end` always holds.
    pub end: u64,
}

impl Span {
    /// Create a new span. The caller guarantees `start <= end`.
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Span { start, end }
    }

    /// Length of the interval in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// True for zero-length spans, which are legal.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Containment: `self.start <= other.start && other.end <= self.end`.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Sort key implementing the canonical order: start ascending, then
    /// longer-first on ties (outer before inner).
    fn order_key(&self) -> (u64, Reverse<u64>) {
        (self.start, Reverse(self.end))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

// ============================================================================
// SpanId
// ============================================================================

/// Position of a span in its document's canonical span order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct SpanId(pub u32);

impl SpanId {
    /// Create a new span ID.
    pub fn new(id: u32) -> Self {
        SpanId(id)
    }

    /// Index into the span table.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "span_{}", self.0)
    }
}

// ============================================================================
// SpanTable
// ============================================================================

/// Per-document span table.
///
/// During document construction spans are appended in arrival order and
/// deduplicated through a side map. `sort_and_renumber` establishes the
/// canonical order once, returning the old-to-new id mapping that the caller
/// applies to all tag references. Read-side tables are built directly from
/// decoded columns with `from_sorted`, which re-checks the invariant.
#[derive(Debug, Clone, Default)]
pub struct SpanTable {
    spans: Vec<Span>,
    by_endpoints: HashMap<(u64, u64), SpanId>,
    sorted: bool,
}

impl SpanTable {
    /// Create an empty table.
    pub fn new() -> Self {
        SpanTable::default()
    }

    /// Build a table from spans already in canonical order (the read side).
    ///
    /// Fails with `CORRUPT_ARCHIVE` if the order invariant does not hold or
    /// if an interval is repeated.
    pub fn from_sorted(spans: Vec<Span>) -> Result<Self> {
        for window in spans.windows(2) {
            let (a, b) = (window[0], window[1]);
            if a.order_key() > b.order_key() {
                return Err(ArribaError::corrupt(format!(
                    "span order violated: {a} precedes {b}"
                )));
            }
            if a == b {
                return Err(ArribaError::corrupt(format!("duplicate span {a}")));
            }
        }
        Ok(SpanTable {
            spans,
            by_endpoints: HashMap::new(),
            sorted: true,
        })
    }

    /// Number of spans in the table.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// True if the table holds no spans.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// The span with the given id, if present.
    pub fn get(&self, id: SpanId) -> Option<Span> {
        self.spans.get(id.index()).copied()
    }

    /// All spans, in table order.
    pub fn as_slice(&self) -> &[Span] {
        &self.spans
    }

    /// Insert a span, returning the existing id if an identical interval is
    /// already present.
    ///
    /// Range validation against the document text happens in the document
    /// builder, which knows the text length.
    pub fn insert(&mut self, start: u64, end: u64) -> SpanId {
        if let Some(&id) = self.by_endpoints.get(&(start, end)) {
            return id;
        }
        let id = SpanId(self.spans.len() as u32);
        self.spans.push(Span::new(start, end));
        self.by_endpoints.insert((start, end), id);
        self.sorted = false;
        id
    }

    /// Sort spans into canonical order and renumber them.
    ///
    /// Returns the permutation from old ids to new ids; the caller applies it
    /// to every tag that references a span. Called once at document
    /// finalization.
    pub fn sort_and_renumber(&mut self) -> Vec<u32> {
        let mut order: Vec<u32> = (0..self.spans.len() as u32).collect();
        order.sort_by_key(|&i| self.spans[i as usize].order_key());

        let mut old_to_new = vec![0u32; self.spans.len()];
        for (new, &old) in order.iter().enumerate() {
            old_to_new[old as usize] = new as u32;
        }

        let reordered: Vec<Span> = order.iter().map(|&old| self.spans[old as usize]).collect();
        self.spans = reordered;
        self.by_endpoints.clear();
        self.sorted = true;
        old_to_new
    }

    /// Find the span with exactly these endpoints.
    ///
    /// O(1) through the side map while building, O(log n) by binary search on
    /// a finalized table. This answers "is there a tag of name X perfectly
    /// aligned to this container".
    pub fn find_aligned(&self, start: u64, end: u64) -> Option<SpanId> {
        if !self.sorted {
            return self.by_endpoints.get(&(start, end)).copied();
        }
        let probe = Span::new(start, end);
        self.spans
            .binary_search_by(|s| s.order_key().cmp(&probe.order_key()))
            .ok()
            .map(|i| SpanId(i as u32))
    }

    /// Iterate over span ids strictly contained in the given span, in
    /// document order. The span itself is not yielded.
    ///
    /// Containment is `outer.start <= inner.start && inner.end <= outer.end`;
    /// zero-length spans sitting exactly at `outer.end` qualify.
    pub fn children_of(&self, id: SpanId) -> Children<'_> {
        debug_assert!(self.sorted);
        let outer = self.spans[id.index()];
        let first = self.spans.partition_point(|s| s.start < outer.start);
        Children {
            spans: &self.spans,
            outer,
            outer_index: id.index(),
            next: first,
        }
    }

    /// Iterate over `(id, span)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (SpanId, Span)> + '_ {
        self.spans
            .iter()
            .enumerate()
            .map(|(i, &s)| (SpanId(i as u32), s))
    }
}

/// Iterator over the span ids contained in an outer span.
#[derive(Debug)]
pub struct Children<'a> {
    spans: &'a [Span],
    outer: Span,
    outer_index: usize,
    next: usize,
}

impl Iterator for Children<'_> {
    type Item = SpanId;

    fn next(&mut self) -> Option<SpanId> {
        while self.next < self.spans.len() {
            let i = self.next;
            let candidate = self.spans[i];
            if candidate.start > self.outer.end {
                return None;
            }
            self.next += 1;
            if i != self.outer_index && self.outer.contains(&candidate) {
                return Some(SpanId(i as u32));
            }
        }
        None
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn table(intervals: &[(u64, u64)]) -> SpanTable {
        let mut t = SpanTable::new();
        for &(s, e) in intervals {
            t.insert(s, e);
        }
        t.sort_and_renumber();
        t
    }

    mod insertion {
        use super::*;

        #[test]
        fn identical_spans_share_an_id() {
            let mut t = SpanTable::new();
            let a = t.insert(0, 5);
            let b = t.insert(0, 5);
            assert_eq!(a, b);
            assert_eq!(t.len(), 1);
        }

        #[test]
        fn zero_length_spans_are_legal() {
            let mut t = SpanTable::new();
            let id = t.insert(3, 3);
            assert_eq!(t.get(id), Some(Span::new(3, 3)));
        }
    }

    mod canonical_order {
        use super::*;

        #[test]
        fn ties_on_start_put_outer_first() {
            let t = table(&[(0, 3), (0, 13), (4, 13)]);
            let spans = t.as_slice();
            assert_eq!(spans[0], Span::new(0, 13));
            assert_eq!(spans[1], Span::new(0, 3));
            assert_eq!(spans[2], Span::new(4, 13));
        }

        #[test]
        fn renumber_permutation_maps_old_ids_to_new() {
            let mut t = SpanTable::new();
            let inner = t.insert(0, 3);
            let outer = t.insert(0, 13);
            let perm = t.sort_and_renumber();
            assert_eq!(perm[inner.index()], 1);
            assert_eq!(perm[outer.index()], 0);
        }

        #[test]
        fn order_invariant_holds_after_renumber() {
            let t = table(&[(4, 13), (0, 3), (0, 13), (4, 7), (2, 2)]);
            for w in t.as_slice().windows(2) {
                assert!(w[0].order_key() <= w[1].order_key());
            }
        }

        #[test]
        fn from_sorted_rejects_misordered_spans() {
            let err =
                SpanTable::from_sorted(vec![Span::new(4, 7), Span::new(0, 3)]).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::CorruptArchive);
        }

        #[test]
        fn from_sorted_rejects_duplicates() {
            let err =
                SpanTable::from_sorted(vec![Span::new(0, 3), Span::new(0, 3)]).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::CorruptArchive);
        }
    }

    mod alignment {
        use super::*;

        #[test]
        fn find_aligned_hits_exact_endpoints_only() {
            let t = table(&[(0, 13), (0, 3), (4, 13)]);
            assert_eq!(t.find_aligned(0, 3), Some(SpanId(1)));
            assert_eq!(t.find_aligned(0, 4), None);
            assert_eq!(t.find_aligned(1, 3), None);
        }

        #[test]
        fn find_aligned_works_on_read_side_tables() {
            let t = SpanTable::from_sorted(vec![
                Span::new(0, 13),
                Span::new(0, 3),
                Span::new(4, 13),
            ])
            .unwrap();
            assert_eq!(t.find_aligned(4, 13), Some(SpanId(2)));
        }
    }

    mod containment {
        use super::*;

        #[test]
        fn children_are_exactly_the_contained_spans() {
            let t = table(&[(0, 13), (0, 3), (4, 13), (4, 7), (14, 20)]);
            let outer = t.find_aligned(0, 13).unwrap();
            let children: Vec<Span> =
                t.children_of(outer).map(|id| t.get(id).unwrap()).collect();
            assert_eq!(
                children,
                vec![Span::new(0, 3), Span::new(4, 13), Span::new(4, 7)]
            );
        }

        #[test]
        fn children_exclude_self_and_partial_overlaps() {
            let t = table(&[(0, 10), (5, 15)]);
            let outer = t.find_aligned(0, 10).unwrap();
            assert_eq!(t.children_of(outer).count(), 0);
        }

        #[test]
        fn empty_span_at_outer_end_is_contained() {
            let t = table(&[(0, 10), (10, 10)]);
            let outer = t.find_aligned(0, 10).unwrap();
            let children: Vec<Span> =
                t.children_of(outer).map(|id| t.get(id).unwrap()).collect();
            assert_eq!(children, vec![Span::new(10, 10)]);
        }

        #[test]
        fn children_come_back_in_document_order() {
            let t = table(&[(0, 20), (12, 15), (1, 4), (6, 9)]);
            let outer = t.find_aligned(0, 20).unwrap();
            let starts: Vec<u64> = t
                .children_of(outer)
                .map(|id| t.get(id).unwrap().start)
                .collect();
            assert_eq!(starts, vec![1, 6, 12]);
        }
    }
}
