//! Tagger records and signature canonicalization.
//!
//! A tagger is the producer of tags: a tool + model + configuration,
//! described by a structured YAML/JSON signature and identified by a stable
//! GUID. Within one archive, two taggers with identical signatures but
//! different GUIDs are distinct rows. Across the interchange boundary,
//! identity is the canonical signature byte string; GUIDs are not compared.
//!
//! Canonical form: compact JSON with lexicographically ordered object keys
//! (the default `serde_json` map is ordered). The sha-256 hex digest of the
//! canonical bytes is the signature fingerprint, used to deduplicate taggers
//! on ingest and to synthesize GUIDs where the source supplies none.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::code::CodeId;
use crate::error::{ArribaError, Result};

// ============================================================================
// TaggerId
// ============================================================================

/// Index of a tagger in the archive's tagger table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct TaggerId(pub u32);

impl TaggerId {
    /// Create a new tagger ID.
    pub fn new(id: u32) -> Self {
        TaggerId(id)
    }

    /// Index into the tagger table.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TaggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tagger_{}", self.0)
    }
}

// ============================================================================
// Signature
// ============================================================================

/// Parsed tagger signature.
///
/// Canonical fields are `type`, `env.{platform, machine, runtime.*}`,
/// `library.{name, version}`, `model.{name, version, lang?}`, `vectors`,
/// plus implementation-defined extensions such as `renames`. The signature
/// is held as a JSON object tree; selectors match against its leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(serde_json::Value);

impl Signature {
    /// Wrap an already-parsed JSON value. Must be an object.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(ArribaError::invalid_signature(
                "signature must be a mapping",
            ));
        }
        Ok(Signature(value))
    }

    /// Parse signature text. YAML is a superset of JSON, so a single parser
    /// accepts both forms the archive stores.
    pub fn parse(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_yaml::from_str(text)
            .map_err(|e| ArribaError::invalid_signature(e.to_string()))?;
        Signature::from_value(value)
    }

    /// The signature as a JSON tree.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Canonical byte rendering: compact JSON with ordered keys.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // The default serde_json map is a BTreeMap, so key order is already
        // lexicographic and the rendering is canonical.
        serde_json::to_vec(&self.0).expect("JSON value serialization cannot fail")
    }

    /// sha-256 hex digest of the canonical bytes.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tagger
// ============================================================================

/// A tagger row in the archive header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tagger {
    /// Stable GUID. Not part of signature identity.
    pub guid: String,
    /// Signature text as supplied (YAML or JSON).
    pub signature: String,
    /// Indices of the codes this tagger produced, in registration order.
    pub codes: Vec<CodeId>,
}

impl Tagger {
    /// Create a tagger row with no codes yet.
    pub fn new(guid: impl Into<String>, signature: impl Into<String>) -> Self {
        Tagger {
            guid: guid.into(),
            signature: signature.into(),
            codes: Vec::new(),
        }
    }

    /// Parse the stored signature text.
    pub fn parsed_signature(&self) -> Result<Signature> {
        Signature::parse(&self.signature)
    }
}

// ============================================================================
// Tests
// ============================================================================
