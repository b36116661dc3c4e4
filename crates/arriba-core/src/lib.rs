//! Core engine for arriba archives.
//!
//! An arriba archive stores NLP tagging results (labeled character spans
//! over document text, optionally with embedding vectors) produced by one
//! or more taggers over a corpus. This crate provides:
//!
//! - The unified document/tag data model: spans, labels, tags, codes,
//!   taggers
//! - Width-adaptive column codecs for the compact on-disk layout
//! - The archive container: incremental writer, memory-mapped reader
//! - Selector resolution and views across overlapping tagger namespaces
//! - The read-side document facade with containment and alignment queries

pub mod archive;
pub mod code;
pub mod column;
pub mod document;
pub mod error;
pub mod selector;
pub mod span;
pub mod tagger;
pub mod view;
