//! Archive container: envelope, writer and memory-mapped reader.
//!
//! On-disk layout, in order:
//!
//! ```text
//! magic (8 bytes) | version:u64 LE | header_len:u64 LE | header | documents
//! ```
//!
//! The header and every document record are self-describing MessagePack
//! messages. The header holds the tagger table, the code table and the
//! document index; document byte ranges are relative to the start of the
//! document region at file offset `24 + header_len`.
//!
//! The writer spools document records to an anonymous temp file while the
//! tagger and code tables grow, then `finish` assembles the final file next
//! to the target path and renames it into place. A crash before `finish`
//! leaves nothing at the target path, so a file that exists is complete.
//!
//! Readers are thread-safe: an opened archive is an immutable handle over a
//! shared memory mapping, and concurrent iteration from many threads yields
//! independent cursors.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::code::{Code, CodeId, CodeTable};
use crate::document::{DocumentBuilder, DocumentRecord};
use crate::error::{ArribaError, ErrorKind, Result};
use crate::selector::{Selector, TagSpec, View};
use crate::tagger::{Signature, Tagger, TaggerId};
use crate::view::DocumentView;

/// Current format version. Writers always emit it; readers reject anything
/// else.
pub const FORMAT_VERSION: u64 = 1;

const MAGIC: &[u8; 8] = b"ARRIBA\r\n";
const FILE_HEAD_LEN: u64 = 24;

// ============================================================================
// Header
// ============================================================================

/// Byte range of one document record, relative to the document region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// First byte of the record.
    pub start: u64,
    /// One past the last byte of the record.
    pub end: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    taggers: Vec<Tagger>,
    codes: Vec<Code>,
    documents: Vec<DocumentRef>,
}

// ============================================================================
// ArchiveWriter
// ============================================================================

/// Single-threaded archive writer.
///
/// Taggers, codes and documents are append-only; nothing already written can
/// be updated. Call [`finish`] to seal the archive.
///
/// [`finish`]: ArchiveWriter::finish
#[derive(Debug)]
pub struct ArchiveWriter {
    path: PathBuf,
    spool: File,
    spooled: u64,
    taggers: Vec<Tagger>,
    signatures: Vec<Signature>,
    fingerprints: Vec<String>,
    codes: CodeTable,
    documents: Vec<DocumentRef>,
}

impl ArchiveWriter {
    /// Create a writer that will seal the archive at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(ArchiveWriter {
            path: path.as_ref().to_path_buf(),
            spool: tempfile::tempfile()?,
            spooled: 0,
            taggers: Vec::new(),
            signatures: Vec::new(),
            fingerprints: Vec::new(),
            codes: CodeTable::new(),
            documents: Vec::new(),
        })
    }

    /// Append a tagger, synthesizing its GUID from the signature
    /// fingerprint.
    pub fn add_tagger(&mut self, signature: &Signature) -> TaggerId {
        let guid = signature.fingerprint();
        self.add_tagger_with_guid(guid, signature)
    }

    /// Append a tagger with an explicit GUID.
    ///
    /// Taggers with identical signatures but different GUIDs are distinct
    /// rows; no deduplication happens here.
    pub fn add_tagger_with_guid(
        &mut self,
        guid: impl Into<String>,
        signature: &Signature,
    ) -> TaggerId {
        let id = TaggerId(self.taggers.len() as u32);
        let text = String::from_utf8(signature.canonical_bytes())
            .expect("canonical JSON is UTF-8");
        self.taggers.push(Tagger::new(guid, text));
        self.fingerprints.push(signature.fingerprint());
        self.signatures.push(signature.clone());
        id
    }

    /// The tagger whose signature has this fingerprint, if one was added.
    /// This is the ingest-side identity: canonical signature bytes, GUIDs
    /// not compared.
    pub fn tagger_by_fingerprint(&self, fingerprint: &str) -> Option<TaggerId> {
        self.fingerprints
            .iter()
            .position(|f| f == fingerprint)
            .map(|i| TaggerId(i as u32))
    }

    /// Signatures added so far, indexed by tagger id.
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Register a new code for a tagger.
    ///
    /// Fails with `DUPLICATE_CODE` if `(tagger, name)` is already
    /// registered.
    pub fn register_code(&mut self, tagger: TaggerId, name: &str) -> Result<CodeId> {
        debug_assert!(tagger.index() < self.taggers.len());
        self.codes.register(tagger, name)
    }

    /// Return the code for `(tagger, name)`, registering it on first sight.
    pub fn intern_code(&mut self, tagger: TaggerId, name: &str) -> CodeId {
        debug_assert!(tagger.index() < self.taggers.len());
        self.codes.intern(tagger, name)
    }

    /// Finalize a document and append its record to the spool.
    pub fn write_document(&mut self, builder: DocumentBuilder) -> Result<()> {
        let record = builder.finalize(&mut self.codes)?;
        let bytes = rmp_serde::to_vec_named(&record)
            .map_err(|e| ArribaError::corrupt(format!("failed to encode document: {e}")))?;
        self.spool.write_all(&bytes)?;
        self.documents.push(DocumentRef {
            start: self.spooled,
            end: self.spooled + bytes.len() as u64,
        });
        self.spooled += bytes.len() as u64;
        Ok(())
    }

    /// Number of documents written so far.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// True when no document has been written.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Seal the archive: write the header and document region to a temp
    /// file next to the target and atomically rename it into place.
    pub fn finish(mut self) -> Result<()> {
        for (i, tagger) in self.taggers.iter_mut().enumerate() {
            tagger.codes = self.codes.codes_for(TaggerId(i as u32));
        }
        let document_count = self.documents.len();
        let header = Header {
            taggers: self.taggers,
            codes: self.codes.into_codes(),
            documents: self.documents,
        };
        let header_bytes = rmp_serde::to_vec_named(&header)
            .map_err(|e| ArribaError::corrupt(format!("failed to encode header: {e}")))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut output = tempfile::NamedTempFile::new_in(dir)?;
        output.write_all(MAGIC)?;
        output.write_all(&FORMAT_VERSION.to_le_bytes())?;
        output.write_all(&(header_bytes.len() as u64).to_le_bytes())?;
        output.write_all(&header_bytes)?;
        self.spool.seek(SeekFrom::Start(0))?;
        io::copy(&mut self.spool, &mut output)?;
        output.as_file().sync_all()?;
        output
            .persist(&self.path)
            .map_err(|e| ArribaError::Io(e.error))?;

        debug!(
            path = %self.path.display(),
            documents = document_count,
            taggers = header.taggers.len(),
            codes = header.codes.len(),
            "sealed archive"
        );
        Ok(())
    }
}

// ============================================================================
// Archive (reader)
// ============================================================================

/// An opened archive: an immutable, thread-safe handle over a memory-mapped
/// file.
#[derive(Debug)]
pub struct Archive {
    mmap: Mmap,
    version: u64,
    header: Header,
    signatures: Vec<Signature>,
    doc_base: usize,
}

impl Archive {
    /// Open and validate an archive file.
    ///
    /// Fails with `UNSUPPORTED_VERSION` for unknown format versions and
    /// `CORRUPT_ARCHIVE` for a truncated or undecodable header.
    pub fn open(path: impl AsRef<Path>) -> Result<Archive> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // Safety: the mapping is read-only and the archive contract forbids
        // concurrent mutation of sealed files.
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < FILE_HEAD_LEN as usize {
            return Err(ArribaError::corrupt("file too small for archive head"));
        }
        if &mmap[..8] != MAGIC {
            return Err(ArribaError::corrupt("bad magic"));
        }
        let version = u64::from_le_bytes(mmap[8..16].try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(ArribaError::UnsupportedVersion {
                found: version,
                current: FORMAT_VERSION,
            });
        }
        let header_len = u64::from_le_bytes(mmap[16..24].try_into().unwrap());
        let doc_base = FILE_HEAD_LEN
            .checked_add(header_len)
            .filter(|&end| end <= mmap.len() as u64)
            .ok_or_else(|| ArribaError::corrupt("declared header exceeds file size"))?
            as usize;

        let header: Header = rmp_serde::from_slice(&mmap[FILE_HEAD_LEN as usize..doc_base])
            .map_err(|e| ArribaError::corrupt(format!("undecodable header: {e}")))?;

        let region = (mmap.len() - doc_base) as u64;
        for (i, doc) in header.documents.iter().enumerate() {
            if doc.start > doc.end || doc.end > region {
                return Err(ArribaError::corrupt(format!(
                    "document {i} range {}..{} exceeds region of {region} bytes",
                    doc.start, doc.end
                )));
            }
        }

        let signatures = header
            .taggers
            .iter()
            .map(|t| {
                t.parsed_signature()
                    .map_err(|e| ArribaError::corrupt(format!("tagger signature: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            path = %path.display(),
            documents = header.documents.len(),
            taggers = header.taggers.len(),
            codes = header.codes.len(),
            "opened archive"
        );
        Ok(Archive {
            mmap,
            version,
            header,
            signatures,
            doc_base,
        })
    }

    /// The archive's format version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.header.documents.len()
    }

    /// True when the archive holds no documents.
    pub fn is_empty(&self) -> bool {
        self.header.documents.is_empty()
    }

    /// The tagger table.
    pub fn taggers(&self) -> &[Tagger] {
        &self.header.taggers
    }

    /// Parsed tagger signatures, indexed by tagger id.
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// The code table.
    pub fn codes(&self) -> &[Code] {
        &self.header.codes
    }

    /// Resolve a selector to the single tagger it matches.
    pub fn select(&self, selector: &Selector) -> Result<TaggerId> {
        selector.resolve(&self.signatures)
    }

    /// Synthesize the default view over every code in the archive.
    ///
    /// Fails with `AMBIGUOUS_TAGS` when taggers produce overlapping names.
    pub fn default_view(&self) -> Result<View> {
        View::default_view(&self.header.codes)
    }

    /// Resolve tag specs into a view over this archive.
    pub fn view(&self, specs: &[TagSpec]) -> Result<View> {
        View::resolve(specs, &self.signatures, &self.header.codes)
    }

    /// A view over all tags of the single tagger a selector resolves to.
    pub fn view_for(&self, selector: &Selector) -> Result<View> {
        let tagger = self.select(selector)?;
        Ok(View::for_tagger(tagger, &self.header.codes))
    }

    /// Decode and validate the document record at `index`.
    pub fn record(&self, index: usize) -> Result<DocumentRecord> {
        let doc = self
            .header
            .documents
            .get(index)
            .ok_or_else(|| ArribaError::corrupt(format!("document index {index} out of range")))?;
        let start = self.doc_base + doc.start as usize;
        let end = self.doc_base + doc.end as usize;
        let record: DocumentRecord = rmp_serde::from_slice(&self.mmap[start..end])
            .map_err(|e| ArribaError::corrupt(format!("undecodable document {index}: {e}")))?;
        record.validate(self.header.codes.len())?;
        Ok(record)
    }

    /// Materialize the document at `index` under a view.
    pub fn document<'a>(&'a self, index: usize, view: &'a View) -> Result<DocumentView<'a>> {
        DocumentView::new(self, view, index)
    }

    /// Iterate documents in insertion order under a view.
    pub fn iter<'a>(&'a self, view: &'a View) -> Documents<'a> {
        Documents {
            archive: self,
            view,
            next: 0,
            skip_corrupt: false,
        }
    }
}

// ============================================================================
// Documents cursor
// ============================================================================

/// Pull-based document cursor. Dropping it releases all decoded state;
/// nothing is mutated, so a partial read leaves no residue.
#[derive(Debug)]
pub struct Documents<'a> {
    archive: &'a Archive,
    view: &'a View,
    next: usize,
    skip_corrupt: bool,
}

impl<'a> Documents<'a> {
    /// Skip documents that fail decoding or validation, logging each skip,
    /// instead of yielding the error. Sibling documents are unaffected by a
    /// corrupt record either way.
    pub fn lenient(mut self) -> Self {
        self.skip_corrupt = true;
        self
    }
}

impl<'a> Iterator for Documents<'a> {
    type Item = Result<DocumentView<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.archive.len() {
            let index = self.next;
            self.next += 1;
            match self.archive.document(index, self.view) {
                Ok(doc) => return Some(Ok(doc)),
                Err(err) if self.skip_corrupt && err.kind() == ErrorKind::CorruptArchive => {
                    warn!(index, error = %err, "skipping corrupt document");
                }
                Err(err) => return Some(Err(err)),
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
    use crate::document::Tag;
    use serde_json::json;
    use tempfile::TempDir;

    fn spacy_signature() -> Signature {
        Signature::from_value(json!({"library": {"name": "spacy", "version": "3.2.1"}}))
            .unwrap()
    }

    fn small_archive(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("corpus.arriba");
        let mut writer = ArchiveWriter::create(&path).unwrap();
        let tagger = writer.add_tagger(&spacy_signature());
        let token = writer.register_code(tagger, "token").unwrap();
        let mut doc = DocumentBuilder::new("San Francisco");
        let s0 = doc.span(0, 3).unwrap();
        let s1 = doc.span(4, 13).unwrap();
        doc.add_tag(token, Tag::spanned(s0).with_label("-"));
        doc.add_tag(token, Tag::spanned(s1).with_label("-"));
        writer.write_document(doc).unwrap();
        writer.finish().unwrap();
        path
    }

    mod envelope {
        use super::*;

        #[test]
        fn write_then_open_round_trips_the_tables() {
            let dir = TempDir::new().unwrap();
            let path = small_archive(&dir);
            let archive = Archive::open(&path).unwrap();
            assert_eq!(archive.version(), FORMAT_VERSION);
            assert_eq!(archive.len(), 1);
            assert_eq!(archive.taggers().len(), 1);
            assert_eq!(archive.codes().len(), 1);
            assert_eq!(archive.codes()[0].name, "token");
            assert_eq!(archive.taggers()[0].codes, vec![CodeId(0)]);
        }

        #[test]
        fn bad_magic_is_corrupt() {
            let dir = TempDir::new().unwrap();
            let path = small_archive(&dir);
            let mut bytes = std::fs::read(&path).unwrap();
            bytes[0] = b'X';
            std::fs::write(&path, &bytes).unwrap();
            let err = Archive::open(&path).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::CorruptArchive);
        }

        #[test]
        fn unknown_version_is_rejected() {
            let dir = TempDir::new().unwrap();
            let path = small_archive(&dir);
            let mut bytes = std::fs::read(&path).unwrap();
            bytes[8] = 0xFF;
            std::fs::write(&path, &bytes).unwrap();
            let err = Archive::open(&path).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
        }

        #[test]
        fn truncated_header_is_corrupt() {
            let dir = TempDir::new().unwrap();
            let path = small_archive(&dir);
            let bytes = std::fs::read(&path).unwrap();
            std::fs::write(&path, &bytes[..30]).unwrap();
            let err = Archive::open(&path).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::CorruptArchive);
        }
    }

    mod records {
        use super::*;

        #[test]
        fn record_round_trips_tags() {
            let dir = TempDir::new().unwrap();
            let path = small_archive(&dir);
            let archive = Archive::open(&path).unwrap();
            let record = archive.record(0).unwrap();
            assert_eq!(record.text, "San Francisco");
            assert_eq!(record.tags.len(), 1);
            assert_eq!(record.tags[0].tag_count(), 2);
        }

        #[test]
        fn out_of_range_index_is_an_error() {
            let dir = TempDir::new().unwrap();
            let path = small_archive(&dir);
            let archive = Archive::open(&path).unwrap();
            assert!(archive.record(5).is_err());
        }
    }
}
