//! JSON interchange for arriba archives.
//!
//! The bahia format is the human-readable sibling of the binary arriba
//! layout: one JSON object per document, carrying the text, optional
//! metadata and the tags of each tagger, packed into a zip container.
//! This crate provides:
//!
//! - The serde model of the per-document JSON object
//! - The zip container reader/writer
//! - The bridge that ingests bahia documents into an arriba archive and
//!   exports arriba documents back out

pub mod bridge;
pub mod container;
pub mod document;
pub mod error;
