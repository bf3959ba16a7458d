// store.rs - Structure-of-arrays output columns

//! Structure-of-arrays output storage.
//!
//! An [`OutputStore`] owns one densely packed column per destination slot.
//! Float, integer and boolean columns are separate allocations so consumers
//! can walk one field across a whole batch without touching the others.
//! Boolean columns are bit-packed, 64 records per word.
//!
//! A store can be disposed explicitly; every access after that fails with
//! [`StoreError::Disposed`] instead of reading released memory.

use super::table::FieldDescriptorTable;
use super::types::ColumnKind;
use crate::error::StoreError;

/// Records per word of a boolean column
pub const BITS_PER_WORD: usize = 64;

fn words_for(len: usize) -> usize {
    len.div_ceil(BITS_PER_WORD)
}

/// Bit-packed boolean column
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BitColumn {
    words: Vec<u64>,
    len: usize,
}

impl BitColumn {
    /// Column of `len` cleared bits
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; words_for(len)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read one bit
    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.len {
            return None;
        }
        Some(self.words[index / BITS_PER_WORD] & (1u64 << (index % BITS_PER_WORD)) != 0)
    }

    /// Write one bit, returns false when out of range
    pub fn set(&mut self, index: usize, value: bool) -> bool {
        if index >= self.len {
            return false;
        }
        write_bit(&mut self.words, index, value);
        true
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate over every bit in record order
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len)
            .map(move |i| self.words[i / BITS_PER_WORD] & (1u64 << (i % BITS_PER_WORD)) != 0)
    }

    /// Packed words, bit `i % 64` of word `i / 64` is record `i`
    pub fn as_words(&self) -> &[u64] {
        &self.words
    }

    fn clear(&mut self) {
        self.words.fill(0);
    }

    fn resize(&mut self, len: usize) {
        self.words.resize(words_for(len), 0);
        self.len = len;
    }
}

#[inline(always)]
fn write_bit(words: &mut [u64], index: usize, value: bool) {
    let word = &mut words[index / BITS_PER_WORD];
    let mask = 1u64 << (index % BITS_PER_WORD);
    if value {
        *word |= mask;
    } else {
        *word &= !mask;
    }
}

/// Mutable window over a boolean column
#[derive(Debug)]
pub struct BitsMut<'a> {
    words: &'a mut [u64],
    len: usize,
}

impl<'a> BitsMut<'a> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Write bit `index` of this window
    #[inline(always)]
    pub fn set(&mut self, index: usize, value: bool) {
        write_bit(self.words, index, value);
    }

    /// Split into `[0, at)` and `[at, len)`
    ///
    /// `at` must be a multiple of [`BITS_PER_WORD`] or equal to `len`, so both
    /// halves start on a word boundary.
    fn split_at(self, at: usize) -> (BitsMut<'a>, BitsMut<'a>) {
        debug_assert!(at % BITS_PER_WORD == 0 || at == self.len);
        let (head, tail) = self.words.split_at_mut(words_for(at).min(self.words.len()));
        (
            BitsMut {
                words: head,
                len: at,
            },
            BitsMut {
                words: tail,
                len: self.len - at,
            },
        )
    }
}

/// One owned output column
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(Vec<f32>),
    Bool(BitColumn),
    UInt(Vec<u32>),
    Int(Vec<i32>),
}

impl Column {
    fn new(kind: ColumnKind, len: usize) -> Self {
        match kind {
            ColumnKind::Float => Column::Float(vec![0.0; len]),
            ColumnKind::Bool => Column::Bool(BitColumn::new(len)),
            ColumnKind::UInt => Column::UInt(vec![0; len]),
            ColumnKind::Int => Column::Int(vec![0; len]),
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Float(_) => ColumnKind::Float,
            Column::Bool(_) => ColumnKind::Bool,
            Column::UInt(_) => ColumnKind::UInt,
            Column::Int(_) => ColumnKind::Int,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Bool(b) => b.len(),
            Column::UInt(v) => v.len(),
            Column::Int(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self) {
        match self {
            Column::Float(v) => v.fill(0.0),
            Column::Bool(b) => b.clear(),
            Column::UInt(v) => v.fill(0),
            Column::Int(v) => v.fill(0),
        }
    }

    fn resize(&mut self, len: usize) {
        match self {
            Column::Float(v) => v.resize(len, 0.0),
            Column::Bool(b) => b.resize(len),
            Column::UInt(v) => v.resize(len, 0),
            Column::Int(v) => v.resize(len, 0),
        }
    }

    fn slice_mut(&mut self, count: usize) -> ColumnSliceMut<'_> {
        match self {
            Column::Float(v) => ColumnSliceMut::Float(&mut v[..count]),
            Column::Bool(b) => ColumnSliceMut::Bool(BitsMut {
                words: &mut b.words[..words_for(count)],
                len: count,
            }),
            Column::UInt(v) => ColumnSliceMut::UInt(&mut v[..count]),
            Column::Int(v) => ColumnSliceMut::Int(&mut v[..count]),
        }
    }

    fn bit_identical(&self, other: &Column) -> bool {
        match (self, other) {
            (Column::Float(a), Column::Float(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (Column::Bool(a), Column::Bool(b)) => a == b,
            (Column::UInt(a), Column::UInt(b)) => a == b,
            (Column::Int(a), Column::Int(b)) => a == b,
            _ => false,
        }
    }
}

/// Borrowed, read-only view of a column
#[derive(Debug, Clone, Copy)]
pub enum ColumnView<'a> {
    Float(&'a [f32]),
    Bool(&'a BitColumn),
    UInt(&'a [u32]),
    Int(&'a [i32]),
}

impl ColumnView<'_> {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnView::Float(_) => ColumnKind::Float,
            ColumnView::Bool(_) => ColumnKind::Bool,
            ColumnView::UInt(_) => ColumnKind::UInt,
            ColumnView::Int(_) => ColumnKind::Int,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnView::Float(v) => v.len(),
            ColumnView::Bool(b) => b.len(),
            ColumnView::UInt(v) => v.len(),
            ColumnView::Int(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mutable window over the first records of one column
///
/// This is what extraction writes through. Windows of different columns
/// are disjoint borrows, and a window can be split by record range so
/// worker threads each own their part of every column.
#[derive(Debug)]
pub enum ColumnSliceMut<'a> {
    Float(&'a mut [f32]),
    Bool(BitsMut<'a>),
    UInt(&'a mut [u32]),
    Int(&'a mut [i32]),
}

impl<'a> ColumnSliceMut<'a> {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnSliceMut::Float(_) => ColumnKind::Float,
            ColumnSliceMut::Bool(_) => ColumnKind::Bool,
            ColumnSliceMut::UInt(_) => ColumnKind::UInt,
            ColumnSliceMut::Int(_) => ColumnKind::Int,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnSliceMut::Float(v) => v.len(),
            ColumnSliceMut::Bool(b) => b.len(),
            ColumnSliceMut::UInt(v) => v.len(),
            ColumnSliceMut::Int(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split into records `[0, at)` and `[at, len)`
    ///
    /// For boolean windows `at` must be word aligned or the full length.
    pub(crate) fn split_at(self, at: usize) -> (ColumnSliceMut<'a>, ColumnSliceMut<'a>) {
        match self {
            ColumnSliceMut::Float(v) => {
                let (a, b) = v.split_at_mut(at);
                (ColumnSliceMut::Float(a), ColumnSliceMut::Float(b))
            }
            ColumnSliceMut::Bool(bits) => {
                let (a, b) = bits.split_at(at);
                (ColumnSliceMut::Bool(a), ColumnSliceMut::Bool(b))
            }
            ColumnSliceMut::UInt(v) => {
                let (a, b) = v.split_at_mut(at);
                (ColumnSliceMut::UInt(a), ColumnSliceMut::UInt(b))
            }
            ColumnSliceMut::Int(v) => {
                let (a, b) = v.split_at_mut(at);
                (ColumnSliceMut::Int(a), ColumnSliceMut::Int(b))
            }
        }
    }
}

/// Split every column window at the same record index
pub(crate) fn split_columns<'a>(
    columns: Vec<ColumnSliceMut<'a>>,
    at: usize,
) -> (Vec<ColumnSliceMut<'a>>, Vec<ColumnSliceMut<'a>>) {
    columns.into_iter().map(|c| c.split_at(at)).unzip()
}

/// Owned structure-of-arrays output for one batch
#[derive(Debug, Clone)]
pub struct OutputStore {
    columns: Vec<Column>,
    capacity: usize,
    disposed: bool,
}

impl OutputStore {
    /// Allocate one column per slot of `table`, each holding `capacity` records
    pub fn allocate(table: &FieldDescriptorTable, capacity: usize) -> Self {
        Self::with_columns(table.column_kinds(), capacity)
    }

    /// Allocate an arbitrary column layout, slot `i` gets `kinds[i]`
    pub fn with_columns(kinds: &[ColumnKind], capacity: usize) -> Self {
        log::debug!(
            "Allocating output store: {} columns x {} records",
            kinds.len(),
            capacity
        );
        Self {
            columns: kinds.iter().map(|&k| Column::new(k, capacity)).collect(),
            capacity,
            disposed: false,
        }
    }

    /// Records every column can hold
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of columns (zero after disposal)
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn check_live(&self) -> Result<(), StoreError> {
        if self.disposed {
            return Err(StoreError::Disposed);
        }
        Ok(())
    }

    fn get(&self, slot: usize) -> Result<&Column, StoreError> {
        self.check_live()?;
        self.columns.get(slot).ok_or(StoreError::SlotOutOfRange {
            slot,
            count: self.columns.len(),
        })
    }

    /// Read-only view of one column
    pub fn column(&self, slot: usize) -> Result<ColumnView<'_>, StoreError> {
        Ok(match self.get(slot)? {
            Column::Float(v) => ColumnView::Float(v),
            Column::Bool(b) => ColumnView::Bool(b),
            Column::UInt(v) => ColumnView::UInt(v),
            Column::Int(v) => ColumnView::Int(v),
        })
    }

    fn mismatch(slot: usize, expected: ColumnKind, actual: &Column) -> StoreError {
        StoreError::KindMismatch {
            slot,
            expected,
            actual: actual.kind(),
        }
    }

    /// Float column at `slot`
    pub fn floats(&self, slot: usize) -> Result<&[f32], StoreError> {
        match self.get(slot)? {
            Column::Float(v) => Ok(v),
            other => Err(Self::mismatch(slot, ColumnKind::Float, other)),
        }
    }

    /// Boolean column at `slot`
    pub fn bools(&self, slot: usize) -> Result<&BitColumn, StoreError> {
        match self.get(slot)? {
            Column::Bool(b) => Ok(b),
            other => Err(Self::mismatch(slot, ColumnKind::Bool, other)),
        }
    }

    /// Unsigned column at `slot`
    pub fn uints(&self, slot: usize) -> Result<&[u32], StoreError> {
        match self.get(slot)? {
            Column::UInt(v) => Ok(v),
            other => Err(Self::mismatch(slot, ColumnKind::UInt, other)),
        }
    }

    /// Signed column at `slot`
    pub fn ints(&self, slot: usize) -> Result<&[i32], StoreError> {
        match self.get(slot)? {
            Column::Int(v) => Ok(v),
            other => Err(Self::mismatch(slot, ColumnKind::Int, other)),
        }
    }

    /// Zero every column, keeping the allocation for the next batch
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.check_live()?;
        self.columns.iter_mut().for_each(Column::clear);
        Ok(())
    }

    /// Grow every column to at least `capacity` records
    pub fn reserve(&mut self, capacity: usize) -> Result<(), StoreError> {
        self.check_live()?;
        if capacity > self.capacity {
            for column in &mut self.columns {
                column.resize(capacity);
            }
            self.capacity = capacity;
        }
        Ok(())
    }

    /// Release all column storage; later accesses fail with `Disposed`
    pub fn dispose(&mut self) {
        if !self.disposed {
            log::debug!("Disposing output store ({} columns)", self.columns.len());
        }
        self.columns = Vec::new();
        self.capacity = 0;
        self.disposed = true;
    }

    /// Compare contents exactly, floats by bit pattern
    pub fn bit_identical(&self, other: &OutputStore) -> bool {
        self.disposed == other.disposed
            && self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.bit_identical(b))
    }

    pub(crate) fn column_kind(&self, slot: usize) -> Option<ColumnKind> {
        self.columns.get(slot).map(Column::kind)
    }

    pub(crate) fn column_len(&self, slot: usize) -> usize {
        self.columns.get(slot).map_or(0, Column::len)
    }

    /// Mutable windows over the first `count` records of every column
    ///
    /// Callers check `count` against every column length first.
    pub(crate) fn slices_mut(&mut self, count: usize) -> Vec<ColumnSliceMut<'_>> {
        self.columns.iter_mut().map(|c| c.slice_mut(count)).collect()
    }
}
