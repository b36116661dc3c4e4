//! Global code dictionary: interned `(tagger, tag-name)` pairs and their
//! label value dictionaries.
//!
//! A code is uniquely identified by `(tagger_index, tag_name)`. Its value
//! dictionary holds every distinct label string that appears for the code
//! anywhere in the archive; `values[i]` is the canonical string for value
//! id `i`. Ids are assigned at first interning and stay stable for the
//! archive's lifetime: document records already spooled to disk reference
//! them, so the dictionary is append-only and never re-sorted.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ArribaError, Result};
use crate::tagger::TaggerId;

// ============================================================================
// CodeId
// ============================================================================

/// Index of a code in the archive's code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct CodeId(pub u32);

impl CodeId {
    /// Create a new code ID.
    pub fn new(id: u32) -> Self {
        CodeId(id)
    }

    /// Index into the code table.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code_{}", self.0)
    }
}

// ============================================================================
// Code
// ============================================================================

/// An interned `(tagger, name)` pair plus its value dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Code {
    /// The tagger that produces this code.
    pub tagger: TaggerId,
    /// Tag name, e.g. `token`, `pos`, `ent`.
    pub name: String,
    /// Deduplicated label values in interning order.
    pub values: Vec<String>,
}

impl Code {
    /// The canonical string for a value id, if in range.
    pub fn value(&self, id: u64) -> Option<&str> {
        self.values.get(id as usize).map(String::as_str)
    }
}

// ============================================================================
// CodeTable
// ============================================================================

/// Write-side interning table for codes and their label values.
#[derive(Debug, Default)]
pub struct CodeTable {
    entries: Vec<CodeEntry>,
    by_key: HashMap<(TaggerId, String), CodeId>,
}

#[derive(Debug)]
struct CodeEntry {
    code: Code,
    value_ids: HashMap<String, u64>,
}

impl CodeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        CodeTable::default()
    }

    /// Number of codes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no code has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a new `(tagger, name)` code.
    ///
    /// Fails with `DUPLICATE_CODE` if the pair is already registered.
    pub fn register(&mut self, tagger: TaggerId, name: &str) -> Result<CodeId> {
        if self.lookup(tagger, name).is_some() {
            return Err(ArribaError::DuplicateCode {
                tagger: tagger.0,
                name: name.to_string(),
            });
        }
        Ok(self.push(tagger, name))
    }

    /// Return the id for `(tagger, name)`, registering it on first sight.
    ///
    /// This is the ingest path; explicit registration uses [`register`].
    ///
    /// [`register`]: CodeTable::register
    pub fn intern(&mut self, tagger: TaggerId, name: &str) -> CodeId {
        if let Some(id) = self.lookup(tagger, name) {
            return id;
        }
        self.push(tagger, name)
    }

    /// The id of an already-registered code.
    pub fn lookup(&self, tagger: TaggerId, name: &str) -> Option<CodeId> {
        self.by_key.get(&(tagger, name.to_string())).copied()
    }

    /// Intern a label value for a code, returning its stable value id.
    ///
    /// Registering the same value twice returns the same id.
    pub fn intern_value(&mut self, code: CodeId, value: &str) -> u64 {
        let entry = &mut self.entries[code.index()];
        if let Some(&id) = entry.value_ids.get(value) {
            return id;
        }
        let id = entry.code.values.len() as u64;
        entry.code.values.push(value.to_string());
        entry.value_ids.insert(value.to_string(), id);
        id
    }

    /// The code with the given id.
    pub fn get(&self, code: CodeId) -> &Code {
        &self.entries[code.index()].code
    }

    /// Ids of the codes a tagger produced, in registration order.
    pub fn codes_for(&self, tagger: TaggerId) -> Vec<CodeId> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.code.tagger == tagger)
            .map(|(i, _)| CodeId(i as u32))
            .collect()
    }

    /// Consume the table into the code list written to the archive header.
    pub fn into_codes(self) -> Vec<Code> {
        self.entries.into_iter().map(|e| e.code).collect()
    }

    fn push(&mut self, tagger: TaggerId, name: &str) -> CodeId {
        let id = CodeId(self.entries.len() as u32);
        self.entries.push(CodeEntry {
            code: Code {
                tagger,
                name: name.to_string(),
                values: Vec::new(),
            },
            value_ids: HashMap::new(),
        });
        self.by_key.insert((tagger, name.to_string()), id);
        id
    }
}

// ============================================================================
// Tests
// ============================================================================
