//! Zip container of per-document bahia JSON entries.
//!
//! Layout: one `docs/NNNNNNNN.json` entry per document in insertion order,
//! plus a `manifest.json` carrying the container version. Readers accept
//! containers without a manifest (any `.json` entry is a document) so that
//! hand-built zips remain ingestable.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::document::BahiaDocument;
use crate::error::{BahiaError, Result};

/// Current bahia container version.
pub const BAHIA_VERSION: u64 = 1;

const MANIFEST_NAME: &str = "manifest.json";

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    version: u64,
    documents: u64,
}

// ============================================================================
// Writer
// ============================================================================

/// Streams bahia documents into a zip container.
#[derive(Debug)]
pub struct BahiaWriter {
    zip: ZipWriter<File>,
    count: u64,
}

impl BahiaWriter {
    /// Create a container at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Ok(BahiaWriter {
            zip: ZipWriter::new(file),
            count: 0,
        })
    }

    /// Append one document.
    pub fn write_document(&mut self, document: &BahiaDocument) -> Result<()> {
        let name = format!("docs/{:08}.json", self.count);
        self.zip.start_file(name, SimpleFileOptions::default())?;
        serde_json::to_writer(&mut self.zip, document)?;
        self.count += 1;
        Ok(())
    }

    /// Number of documents written so far.
    pub fn len(&self) -> u64 {
        self.count
    }

    /// True when no document has been written.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Write the manifest and close the container.
    pub fn finish(mut self) -> Result<()> {
        self.zip
            .start_file(MANIFEST_NAME, SimpleFileOptions::default())?;
        serde_json::to_writer(
            &mut self.zip,
            &Manifest {
                version: BAHIA_VERSION,
                documents: self.count,
            },
        )?;
        self.zip.finish()?;
        debug!(documents = self.count, "sealed bahia container");
        Ok(())
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Reads bahia documents out of a zip container.
#[derive(Debug)]
pub struct BahiaReader {
    zip: ZipArchive<File>,
    names: Vec<String>,
}

impl BahiaReader {
    /// Open a container, validating the manifest when one is present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let mut zip = ZipArchive::new(file)?;

        if let Ok(manifest) = zip.by_name(MANIFEST_NAME) {
            let manifest: Manifest = serde_json::from_reader(manifest)?;
            if manifest.version != BAHIA_VERSION {
                return Err(BahiaError::format(format!(
                    "unsupported container version {}",
                    manifest.version
                )));
            }
        }

        let mut names: Vec<String> = zip
            .file_names()
            .filter(|n| n.ends_with(".json") && *n != MANIFEST_NAME)
            .map(String::from)
            .collect();
        names.sort();
        Ok(BahiaReader { zip, names })
    }

    /// Number of documents in the container.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when the container holds no documents.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Decode the document at `index` (insertion order).
    pub fn document(&mut self, index: usize) -> Result<BahiaDocument> {
        let name = self
            .names
            .get(index)
            .ok_or_else(|| BahiaError::format(format!("document index {index} out of range")))?
            .clone();
        let entry = self.zip.by_name(&name)?;
        Ok(serde_json::from_reader(entry)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
