//! Width-adaptive column codecs.
//!
//! Every integer column in a document record is stored at the narrowest
//! width that fits the column's observed extremes: unsigned 8/16/32 bits,
//! plus 64 for span offsets; signed 8/16/32 bits with `-1` a representable
//! sentinel. Float columns are stored at 32 bits unless any value is not
//! exactly representable in `f32`, in which case the whole column widens to
//! 64 bits. A column that is entirely empty or entirely default is the
//! `None` discriminant and carries no payload.
//!
//! Widths are chosen per document, not per archive: a short document packs
//! its offsets into bytes even when a sibling document needs 32 bits.

use serde::{Deserialize, Serialize};

use crate::error::{ArribaError, Result};

// ============================================================================
// Unsigned Columns
// ============================================================================

/// Unsigned integer column at the narrowest width that fits.
///
/// Used for span starts and lengths, label value ids, and group offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UintColumn {
    /// Empty column; no payload.
    None,
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
}

impl UintColumn {
    /// Pack values at the narrowest width admitting the observed maximum.
    pub fn pack(values: &[u64]) -> UintColumn {
        let Some(&max) = values.iter().max() else {
            return UintColumn::None;
        };
        if max <= u8::MAX as u64 {
            UintColumn::U8(values.iter().map(|&v| v as u8).collect())
        } else if max <= u16::MAX as u64 {
            UintColumn::U16(values.iter().map(|&v| v as u16).collect())
        } else if max <= u32::MAX as u64 {
            UintColumn::U32(values.iter().map(|&v| v as u32).collect())
        } else {
            UintColumn::U64(values.to_vec())
        }
    }

    /// Number of elements; zero for `None`.
    pub fn len(&self) -> usize {
        match self {
            UintColumn::None => 0,
            UintColumn::U8(v) => v.len(),
            UintColumn::U16(v) => v.len(),
            UintColumn::U32(v) => v.len(),
            UintColumn::U64(v) => v.len(),
        }
    }

    /// True when the column carries no payload.
    pub fn is_none(&self) -> bool {
        matches!(self, UintColumn::None)
    }

    /// True when the column has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `i`, widened to `u64`.
    pub fn get(&self, i: usize) -> Option<u64> {
        match self {
            UintColumn::None => None,
            UintColumn::U8(v) => v.get(i).map(|&x| x as u64),
            UintColumn::U16(v) => v.get(i).map(|&x| x as u64),
            UintColumn::U32(v) => v.get(i).map(|&x| x as u64),
            UintColumn::U64(v) => v.get(i).copied(),
        }
    }

    /// All elements, widened to `u64`.
    pub fn to_vec(&self) -> Vec<u64> {
        match self {
            UintColumn::None => Vec::new(),
            UintColumn::U8(v) => v.iter().map(|&x| x as u64).collect(),
            UintColumn::U16(v) => v.iter().map(|&x| x as u64).collect(),
            UintColumn::U32(v) => v.iter().map(|&x| x as u64).collect(),
            UintColumn::U64(v) => v.clone(),
        }
    }

    /// Element width in bits, if the column carries a payload.
    pub fn width(&self) -> Option<u8> {
        match self {
            UintColumn::None => None,
            UintColumn::U8(_) => Some(8),
            UintColumn::U16(_) => Some(16),
            UintColumn::U32(_) => Some(32),
            UintColumn::U64(_) => Some(64),
        }
    }
}

// ============================================================================
// Signed Columns
// ============================================================================

/// Signed integer column at the narrowest width that fits.
///
/// Used for span references and parent indices, where `-1` means "none".
/// A column that is empty or all `-1` packs to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntColumn {
    /// Empty or all-default column; no payload.
    None,
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
}

impl IntColumn {
    /// Pack values at the narrowest signed width admitting the observed
    /// extremes (and therefore the `-1` sentinel).
    ///
    /// Values must fit `i32`; indices in a document record never exceed it.
    pub fn pack(values: &[i64]) -> IntColumn {
        if values.is_empty() || values.iter().all(|&v| v == -1) {
            return IntColumn::None;
        }
        let min = *values.iter().min().unwrap();
        let max = *values.iter().max().unwrap();
        debug_assert!(min >= i32::MIN as i64 && max <= i32::MAX as i64);
        if min >= i8::MIN as i64 && max <= i8::MAX as i64 {
            IntColumn::I8(values.iter().map(|&v| v as i8).collect())
        } else if min >= i16::MIN as i64 && max <= i16::MAX as i64 {
            IntColumn::I16(values.iter().map(|&v| v as i16).collect())
        } else {
            IntColumn::I32(values.iter().map(|&v| v as i32).collect())
        }
    }

    /// Number of elements; zero for `None`.
    pub fn len(&self) -> usize {
        match self {
            IntColumn::None => 0,
            IntColumn::I8(v) => v.len(),
            IntColumn::I16(v) => v.len(),
            IntColumn::I32(v) => v.len(),
        }
    }

    /// True when the column carries no payload.
    pub fn is_none(&self) -> bool {
        matches!(self, IntColumn::None)
    }

    /// True when the column has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `i`, widened to `i64`.
    pub fn get(&self, i: usize) -> Option<i64> {
        match self {
            IntColumn::None => None,
            IntColumn::I8(v) => v.get(i).map(|&x| x as i64),
            IntColumn::I16(v) => v.get(i).map(|&x| x as i64),
            IntColumn::I32(v) => v.get(i).map(|&x| x as i64),
        }
    }

    /// Element at `i` as an index, with `-1` mapped to `None`.
    ///
    /// Fails with `CORRUPT_ARCHIVE` on any other negative value.
    pub fn get_index(&self, i: usize) -> Result<Option<usize>> {
        match self.get(i) {
            None | Some(-1) => Ok(None),
            Some(v) if v >= 0 => Ok(Some(v as usize)),
            Some(v) => Err(ArribaError::corrupt(format!(
                "negative column value {v} where an index was expected"
            ))),
        }
    }

    /// Element width in bits, if the column carries a payload.
    pub fn width(&self) -> Option<u8> {
        match self {
            IntColumn::None => None,
            IntColumn::I8(_) => Some(8),
            IntColumn::I16(_) => Some(16),
            IntColumn::I32(_) => Some(32),
        }
    }
}

// ============================================================================
// Float Columns
// ============================================================================

/// Float column, 32-bit unless lossless 32-bit storage is impossible.
///
/// Used for label scores and embedding vectors. Scores are finite by
/// definition, so `NaN` doubles as the "absent" marker inside a
/// partially-scored column; a column with no present value at all packs to
/// `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FloatColumn {
    /// Empty or all-absent column; no payload.
    None,
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl FloatColumn {
    /// Pack values, widening the whole column to 64 bits if any value is not
    /// exactly representable in `f32`.
    pub fn pack(values: &[f64]) -> FloatColumn {
        if values.is_empty() || values.iter().all(|v| v.is_nan()) {
            return FloatColumn::None;
        }
        let lossless = values
            .iter()
            .all(|&v| v.is_nan() || (v as f32) as f64 == v);
        if lossless {
            FloatColumn::F32(values.iter().map(|&v| v as f32).collect())
        } else {
            FloatColumn::F64(values.to_vec())
        }
    }

    /// Number of elements; zero for `None`.
    pub fn len(&self) -> usize {
        match self {
            FloatColumn::None => 0,
            FloatColumn::F32(v) => v.len(),
            FloatColumn::F64(v) => v.len(),
        }
    }

    /// True when the column carries no payload.
    pub fn is_none(&self) -> bool {
        matches!(self, FloatColumn::None)
    }

    /// True when the column has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw element at `i`, widened to `f64`. `NaN` means "absent".
    pub fn get(&self, i: usize) -> Option<f64> {
        match self {
            FloatColumn::None => None,
            FloatColumn::F32(v) => v.get(i).map(|&x| x as f64),
            FloatColumn::F64(v) => v.get(i).copied(),
        }
    }

    /// Element at `i` with the `NaN` absence marker mapped to `None`.
    pub fn get_present(&self, i: usize) -> Option<f64> {
        self.get(i).filter(|v| !v.is_nan())
    }

    /// Element width in bits, if the column carries a payload.
    pub fn width(&self) -> Option<u8> {
        match self {
            FloatColumn::None => None,
            FloatColumn::F32(_) => Some(32),
            FloatColumn::F64(_) => Some(64),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
