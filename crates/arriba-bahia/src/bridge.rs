//! Bridge between bahia JSON documents and arriba archives.
//!
//! Ingest deduplicates taggers by canonical signature bytes (GUIDs are not
//! compared) and synthesizes GUIDs from the signature fingerprint. Tags
//! without `start`/`end` become document-level tags with no span.
//!
//! An arriba document record has a single metadata slot, while bahia
//! carries `external_key`, `meta` and `stat` separately. The bridge folds
//! them into one envelope object under those three keys; export unpacks an
//! object whose keys are a subset of the three, and treats anything else as
//! plain `meta`.
//!
//! Export reproduces the original JSON up to canonical span reordering,
//! span-id renumbering and whitespace.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use arriba_core::archive::{Archive, ArchiveWriter};
use arriba_core::document::{DocumentBuilder, Tag};
use arriba_core::tagger::Signature;

use crate::container::{BahiaReader, BahiaWriter};
use crate::document::{BahiaDocument, BahiaLabel, BahiaTag, BahiaTagger};
use crate::error::Result;

// ============================================================================
// Ingest
// ============================================================================

/// Ingest one bahia document into an archive writer.
pub fn ingest_document(writer: &mut ArchiveWriter, document: &BahiaDocument) -> Result<()> {
    let mut builder = DocumentBuilder::new(document.text.clone());
    if let Some(meta) = pack_envelope(document) {
        builder.set_meta(meta);
    }

    for tagger_entry in &document.taggers {
        let signature = Signature::from_value(tagger_entry.tagger.clone())?;
        let tagger = match writer.tagger_by_fingerprint(&signature.fingerprint()) {
            Some(id) => id,
            None => writer.add_tagger(&signature),
        };
        for (name, tags) in &tagger_entry.tags {
            let code = writer.intern_code(tagger, name);
            for tag in tags {
                let mut draft = match (tag.start, tag.end) {
                    (Some(start), Some(end)) => Tag::spanned(builder.span(start, end)?),
                    // Tags with no (or half) endpoints are document-level.
                    _ => Tag::new(),
                };
                if let Some(labels) = &tag.labels {
                    for label in labels {
                        draft = match label.score {
                            Some(score) => draft.with_scored_label(&label.value, score),
                            None => draft.with_label(&label.value),
                        };
                    }
                }
                if let Some(parent) = tag.parent {
                    draft = draft.with_parent(parent);
                }
                builder.add_tag(code, draft);
            }
        }
    }

    writer.write_document(builder)?;
    Ok(())
}

/// Ingest every document of a bahia container, returning the count.
pub fn ingest_container(writer: &mut ArchiveWriter, reader: &mut BahiaReader) -> Result<usize> {
    let count = reader.len();
    for index in 0..count {
        let document = reader.document(index)?;
        ingest_document(writer, &document)?;
    }
    debug!(documents = count, "ingested bahia container");
    Ok(count)
}

// ============================================================================
// Export
// ============================================================================

/// Export the document at `index` as a bahia JSON object.
pub fn export_document(archive: &Archive, index: usize) -> Result<BahiaDocument> {
    let record = archive.record(index)?;
    let spans = record.span_table()?;

    let mut document = BahiaDocument::new(record.text.clone());
    unpack_envelope(&mut document, record.meta_json()?);

    let mut per_tagger: BTreeMap<u32, BTreeMap<String, Vec<BahiaTag>>> = BTreeMap::new();
    for bundle in &record.tags {
        let code = &archive.codes()[bundle.code.index()];
        let tags = per_tagger
            .entry(code.tagger.0)
            .or_default()
            .entry(code.name.clone())
            .or_default();
        for i in 0..bundle.tag_count() {
            let span = bundle.span_of(i)?.and_then(|id| spans.get(id));
            let labels: Vec<BahiaLabel> = bundle
                .labels_of(i, code)?
                .into_iter()
                .map(|l| BahiaLabel {
                    value: l.value,
                    score: l.score,
                })
                .collect();
            tags.push(BahiaTag {
                start: span.map(|s| s.start),
                end: span.map(|s| s.end),
                labels: (!labels.is_empty()).then_some(labels),
                parent: bundle.parent_of(i)?.map(|p| p as u32),
            });
        }
    }

    for (tagger_index, tags) in per_tagger {
        document.taggers.push(BahiaTagger {
            tagger: archive.signatures()[tagger_index as usize].as_value().clone(),
            tags,
        });
    }
    Ok(document)
}

/// Export a whole archive into a bahia container at `path`.
pub fn export_container(archive: &Archive, path: impl AsRef<std::path::Path>) -> Result<()> {
    let mut writer = BahiaWriter::create(path)?;
    for index in 0..archive.len() {
        writer.write_document(&export_document(archive, index)?)?;
    }
    writer.finish()
}

// ============================================================================
// Metadata envelope
// ============================================================================

const ENVELOPE_KEYS: [&str; 3] = ["external_key", "meta", "stat"];

fn pack_envelope(document: &BahiaDocument) -> Option<Value> {
    if document.external_key.is_none() && document.meta.is_none() && document.stat.is_none() {
        return None;
    }
    let mut map = serde_json::Map::new();
    if let Some(key) = &document.external_key {
        map.insert("external_key".to_string(), Value::String(key.clone()));
    }
    if let Some(meta) = &document.meta {
        map.insert("meta".to_string(), meta.clone());
    }
    if let Some(stat) = &document.stat {
        map.insert("stat".to_string(), stat.clone());
    }
    Some(Value::Object(map))
}

fn unpack_envelope(document: &mut BahiaDocument, meta: Option<Value>) {
    let Some(value) = meta else {
        return;
    };
    match value {
        Value::Object(mut map)
            if map.keys().all(|k| ENVELOPE_KEYS.contains(&k.as_str())) =>
        {
            document.external_key = map
                .remove("external_key")
                .and_then(|v| v.as_str().map(String::from));
            document.meta = map.remove("meta");
            document.stat = map.remove("stat");
        }
        other => document.meta = Some(other),
    }
}

// ============================================================================
// Tests
// ============================================================================
