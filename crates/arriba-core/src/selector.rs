//! Tagger selectors and view resolution.
//!
//! A selector is a nested mapping of string keys to leaf values or further
//! mappings, matched structurally against tagger signatures: a tagger
//! matches iff every selector leaf equals the corresponding signature leaf.
//! Dotted keys (`"library.name": "spacy"`) are sugar for nesting
//! (`"library": {"name": "spacy"}`).
//!
//! A view is an ordered list of tag specs, each picking one tag name from a
//! selected tagger, optionally renaming it and fixing its label type. The
//! resolved view is what the document facade consults at read time.
//!
//! Selectors are plain data: matching is a tree comparison over parsed
//! structured values, never reflection.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde_json::{Map, Value};

use crate::code::{Code, CodeId};
use crate::error::{ArribaError, Result};
use crate::tagger::{Signature, TaggerId};
use crate::view::LabelType;

// ============================================================================
// Selector
// ============================================================================

/// A signature query: nested string mapping with dotted-key sugar.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selector(Map<String, Value>);

impl Selector {
    /// The empty selector, which matches every tagger.
    pub fn new() -> Self {
        Selector::default()
    }

    /// Build a selector from a JSON mapping, expanding dotted keys.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(ArribaError::invalid_signature(
                "selector must be a mapping",
            ));
        };
        let mut expanded = Map::new();
        expand_into(&mut expanded, map);
        Ok(Selector(expanded))
    }

    /// Add a `key = value` constraint; `key` may be dotted.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        let path: Vec<&str> = key.split('.').collect();
        insert_path(&mut self.0, &path, value.into());
        self
    }

    /// True when the selector has no constraints.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Structural subset match against a signature.
    ///
    /// Every selector leaf must equal the corresponding signature leaf. An
    /// empty mapping under an existing key matches any mapping at that key;
    /// a missing key never matches.
    pub fn matches(&self, signature: &Signature) -> bool {
        node_matches(&self.0, signature.as_value())
    }

    /// Resolve the selector against a tagger table.
    ///
    /// Fails with `NO_MATCH` if zero taggers match and `AMBIGUOUS` if more
    /// than one does. Resolution is deterministic: the same selector over
    /// the same archive always yields the same tagger.
    pub fn resolve(&self, signatures: &[Signature]) -> Result<TaggerId> {
        let mut matches = signatures
            .iter()
            .enumerate()
            .filter(|(_, sig)| self.matches(sig))
            .map(|(i, _)| TaggerId(i as u32));
        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(id),
            (None, _) => Err(ArribaError::NoMatch {
                selector: self.to_string(),
            }),
            (Some(_), Some(_)) => Err(ArribaError::Ambiguous {
                selector: self.to_string(),
                count: 2 + matches.count(),
            }),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

fn expand_into(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        let value = match value {
            Value::Object(inner) => {
                let mut expanded = Map::new();
                expand_into(&mut expanded, inner);
                Value::Object(expanded)
            }
            leaf => leaf,
        };
        let path: Vec<&str> = key.split('.').collect();
        insert_path(target, &path, value);
    }
}

fn insert_path(node: &mut Map<String, Value>, path: &[&str], value: Value) {
    let [segment, rest @ ..] = path else {
        return;
    };
    if rest.is_empty() {
        node.insert(segment.to_string(), value);
        return;
    }
    let child = node
        .entry(segment.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    if let Value::Object(child_map) = child {
        insert_path(child_map, rest, value);
    }
}

fn node_matches(selector: &Map<String, Value>, signature: &Value) -> bool {
    let Some(signature) = signature.as_object() else {
        return false;
    };
    selector.iter().all(|(key, constraint)| {
        let Some(actual) = signature.get(key) else {
            return false;
        };
        match constraint {
            Value::Object(inner) => node_matches(inner, actual),
            leaf => leaf_eq(leaf, actual),
        }
    })
}

/// Leaf comparison: equal values match, otherwise both sides are coerced to
/// their string rendering so `"3"` matches the number `3`.
fn leaf_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    coerce(a) == coerce(b)
}

fn coerce(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// TagSpec
// ============================================================================

/// One tag picked from a selected tagger, with optional rename and label
/// type override.
#[derive(Debug, Clone)]
pub struct TagSpec {
    /// Picks the producing tagger.
    pub selector: Selector,
    /// Tag name at the tagger.
    pub name: String,
    /// Name the view exports the tag under; defaults to `name`.
    pub rename: Option<String>,
    /// Label projection override; defaults per tag name.
    pub label_type: Option<LabelType>,
}

impl TagSpec {
    /// Pick `name` from the tagger the selector resolves to.
    pub fn new(selector: Selector, name: impl Into<String>) -> Self {
        TagSpec {
            selector,
            name: name.into(),
            rename: None,
            label_type: None,
        }
    }

    /// Export the tag under a different name.
    pub fn to(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    /// Fix the label projection for this tag.
    pub fn with_label_type(mut self, label_type: LabelType) -> Self {
        self.label_type = Some(label_type);
        self
    }
}

// ============================================================================
// View
// ============================================================================

/// A resolved view entry: one exported tag name bound to a concrete code.
#[derive(Debug, Clone)]
pub struct ViewEntry {
    /// Producing tagger.
    pub tagger: TaggerId,
    /// Tag name at the tagger.
    pub name: String,
    /// Exported name on the document facade.
    pub export: String,
    /// Label projection applied when reading through the facade.
    pub label_type: LabelType,
    /// Code index, when the archive holds data for `(tagger, name)`.
    /// A view may name a tag the archive has no data for; reads then see
    /// empty tag lists rather than an error.
    pub code: Option<CodeId>,
}

/// An ordered list of resolved view entries with unique exported names.
#[derive(Debug, Clone, Default)]
pub struct View {
    entries: Vec<ViewEntry>,
}

impl View {
    /// Resolve tag specs against an archive's taggers and codes.
    ///
    /// Fails with `NO_MATCH`/`AMBIGUOUS` from selector resolution and with
    /// `NAME_CLASH` if two specs export the same name.
    pub fn resolve(specs: &[TagSpec], signatures: &[Signature], codes: &[Code]) -> Result<View> {
        let mut entries = Vec::with_capacity(specs.len());
        let mut seen = HashSet::new();
        for spec in specs {
            let tagger = spec.selector.resolve(signatures)?;
            let export = spec.rename.clone().unwrap_or_else(|| spec.name.clone());
            if !seen.insert(export.clone()) {
                return Err(ArribaError::NameClash { name: export });
            }
            entries.push(ViewEntry {
                tagger,
                name: spec.name.clone(),
                export,
                label_type: spec
                    .label_type
                    .unwrap_or_else(|| LabelType::default_for(&spec.name)),
                code: find_code(codes, tagger, &spec.name),
            });
        }
        Ok(View { entries })
    }

    /// Synthesize the default view: every code in the archive under its own
    /// name.
    ///
    /// Fails with `AMBIGUOUS_TAGS` if two taggers produce the same tag name,
    /// since neither could claim it.
    pub fn default_view(codes: &[Code]) -> Result<View> {
        let mut producers: HashMap<&str, HashSet<TaggerId>> = HashMap::new();
        for code in codes {
            producers.entry(&code.name).or_default().insert(code.tagger);
        }
        if let Some((name, _)) = producers
            .iter()
            .filter(|(_, taggers)| taggers.len() > 1)
            .min_by_key(|(name, _)| *name)
        {
            return Err(ArribaError::AmbiguousTags {
                name: name.to_string(),
            });
        }
        Ok(View {
            entries: codes
                .iter()
                .enumerate()
                .map(|(i, code)| ViewEntry {
                    tagger: code.tagger,
                    name: code.name.clone(),
                    export: code.name.clone(),
                    label_type: LabelType::default_for(&code.name),
                    code: Some(CodeId(i as u32)),
                })
                .collect(),
        })
    }

    /// Synthesize a view over a single tagger's codes. Names within one
    /// tagger are unique by construction, so this cannot clash.
    pub fn for_tagger(tagger: TaggerId, codes: &[Code]) -> View {
        View {
            entries: codes
                .iter()
                .enumerate()
                .filter(|(_, code)| code.tagger == tagger)
                .map(|(i, code)| ViewEntry {
                    tagger,
                    name: code.name.clone(),
                    export: code.name.clone(),
                    label_type: LabelType::default_for(&code.name),
                    code: Some(CodeId(i as u32)),
                })
                .collect(),
        }
    }

    /// Entries in view order.
    pub fn entries(&self) -> &[ViewEntry] {
        &self.entries
    }

    /// The entry exported under `name`.
    pub fn lookup(&self, name: &str) -> Option<&ViewEntry> {
        self.entries.iter().find(|e| e.export == name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the view exports nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn find_code(codes: &[Code], tagger: TaggerId, name: &str) -> Option<CodeId> {
    codes
        .iter()
        .position(|c| c.tagger == tagger && c.name == name)
        .map(|i| CodeId(i as u32))
}

// ============================================================================
// Tests
// ============================================================================
