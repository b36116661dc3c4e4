//! Error types and stable error kind names for the arriba engine.
//!
//! This module provides a unified error type (`ArribaError`) covering every
//! failure the engine surfaces, together with `ErrorKind`, the stable names
//! under which those failures are reported to callers:
//!
//! - `NO_MATCH` / `AMBIGUOUS`: selector resolution
//! - `NAME_CLASH` / `AMBIGUOUS_TAGS`: view resolution
//! - `DUPLICATE_CODE`: duplicate `(tagger, name)` registration
//! - `UNSUPPORTED_VERSION`: archive version unknown
//! - `CORRUPT_ARCHIVE`: header unreadable, span invariants violated,
//!   column widths inconsistent
//! - `OUT_OF_RANGE`: span endpoints exceed the document text
//! - `INVALID_SIGNATURE`: tagger signature text is not valid YAML/JSON
//! - `IO_FAILURE`: underlying storage error
//!
//! All errors surface to the caller; there is no silent recovery.

use std::fmt;

use thiserror::Error;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, ArribaError>;

// ============================================================================
// Error Kinds
// ============================================================================

/// Stable error kind names.
///
/// Each `ArribaError` variant maps to exactly one kind. The names are part of
/// the public contract and never change across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Zero taggers matched a selector.
    NoMatch,
    /// More than one tagger matched a selector.
    Ambiguous,
    /// Two view entries export the same name.
    NameClash,
    /// Taggers produce overlapping tag names and no view was supplied.
    AmbiguousTags,
    /// The same `(tagger, name)` pair was registered twice.
    DuplicateCode,
    /// The archive was written with a format version this reader rejects.
    UnsupportedVersion,
    /// The archive or a document record is structurally invalid.
    CorruptArchive,
    /// Span endpoints exceed the document text.
    OutOfRange,
    /// A tagger signature could not be parsed.
    InvalidSignature,
    /// Underlying storage error.
    IoFailure,
}

impl ErrorKind {
    /// Stable name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::NoMatch => "NO_MATCH",
            ErrorKind::Ambiguous => "AMBIGUOUS",
            ErrorKind::NameClash => "NAME_CLASH",
            ErrorKind::AmbiguousTags => "AMBIGUOUS_TAGS",
            ErrorKind::DuplicateCode => "DUPLICATE_CODE",
            ErrorKind::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorKind::CorruptArchive => "CORRUPT_ARCHIVE",
            ErrorKind::OutOfRange => "OUT_OF_RANGE",
            ErrorKind::InvalidSignature => "INVALID_SIGNATURE",
            ErrorKind::IoFailure => "IO_FAILURE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for the arriba engine.
#[derive(Debug, Error)]
pub enum ArribaError {
    /// No tagger matches the selector.
    #[error("no tagger matches selector {selector}")]
    NoMatch { selector: String },

    /// More than one tagger matches the selector.
    #[error("selector {selector} matches {count} taggers")]
    Ambiguous { selector: String, count: usize },

    /// Two view entries export the same name.
    #[error("exported tag name '{name}' appears more than once in the view")]
    NameClash { name: String },

    /// Overlapping tag names across taggers with no view supplied.
    #[error("tag name '{name}' is produced by more than one tagger; supply a view")]
    AmbiguousTags { name: String },

    /// A tag name the active view does not export.
    #[error("view exports no tag named '{name}'")]
    UnknownTag { name: String },

    /// Duplicate `(tagger, name)` registration.
    #[error("code '{name}' is already registered for tagger {tagger}")]
    DuplicateCode { tagger: u32, name: String },

    /// Unknown archive format version.
    #[error("archive version {found} is not supported (current version is {current})")]
    UnsupportedVersion { found: u64, current: u64 },

    /// Structurally invalid archive or document record.
    #[error("corrupt archive: {message}")]
    CorruptArchive { message: String },

    /// Span endpoints exceed the document text.
    #[error("span {start}..{end} exceeds document text of {len} bytes")]
    OutOfRange { start: u64, end: u64, len: u64 },

    /// Unparseable tagger signature.
    #[error("invalid tagger signature: {message}")]
    InvalidSignature { message: String },

    /// Underlying storage error.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl ArribaError {
    /// Create a `CorruptArchive` error with the given message.
    pub fn corrupt(message: impl Into<String>) -> Self {
        ArribaError::CorruptArchive {
            message: message.into(),
        }
    }

    /// Create an `InvalidSignature` error with the given message.
    pub fn invalid_signature(message: impl Into<String>) -> Self {
        ArribaError::InvalidSignature {
            message: message.into(),
        }
    }

    /// The stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArribaError::NoMatch { .. } => ErrorKind::NoMatch,
            ArribaError::Ambiguous { .. } => ErrorKind::Ambiguous,
            ArribaError::NameClash { .. } => ErrorKind::NameClash,
            ArribaError::AmbiguousTags { .. } => ErrorKind::AmbiguousTags,
            ArribaError::UnknownTag { .. } => ErrorKind::NoMatch,
            ArribaError::DuplicateCode { .. } => ErrorKind::DuplicateCode,
            ArribaError::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
            ArribaError::CorruptArchive { .. } => ErrorKind::CorruptArchive,
            ArribaError::OutOfRange { .. } => ErrorKind::OutOfRange,
            ArribaError::InvalidSignature { .. } => ErrorKind::InvalidSignature,
            ArribaError::Io(_) => ErrorKind::IoFailure,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
