//! Error types for table construction, extraction and output storage

use crate::demux::types::{ColumnKind, DestinationEncoding, SourceEncoding};
use std::fmt;

/// Why a single descriptor was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldProblemKind {
    #[error("bit size must be positive")]
    ZeroSize,

    #[error("bits {bit_offset}..{bit_end} exceed the {record_bits}-bit record")]
    OutOfRange {
        bit_offset: u32,
        bit_end: u64,
        record_bits: u32,
    },

    #[error("{encoding:?} cannot be {bit_size} bits wide (allowed {min}..={max})")]
    WidthMismatch {
        encoding: SourceEncoding,
        bit_size: u32,
        min: u32,
        max: u32,
    },

    #[error("float32 field at bit {bit_offset} is not byte aligned")]
    UnalignedFloat { bit_offset: u32 },

    #[error("big-endian field at bit {bit_offset} ({bit_size} bits) does not cover whole bytes")]
    ByteOrderSpan { bit_offset: u32, bit_size: u32 },

    #[error("slot {slot} is already used by descriptor {first}")]
    DuplicateSlot { slot: u32, first: usize },

    #[error("slot {slot} is outside the dense range 0..{count}")]
    SlotNotDense { slot: u32, count: usize },

    #[error("{encoding:?} -> {destination:?} ({bit_size} bits) can lose range or precision")]
    LossyConversion {
        encoding: SourceEncoding,
        destination: DestinationEncoding,
        bit_size: u32,
    },
}

/// One offending descriptor, by position in the declaration list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldProblem {
    pub index: usize,
    pub kind: FieldProblemKind,
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "descriptor {}: {}", self.index, self.kind)
    }
}

fn join_problems(problems: &[FieldProblem]) -> String {
    problems
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while building a descriptor table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("record size must be a positive multiple of 8 bits, got {bits}")]
    RecordSize { bits: u32 },

    #[error("descriptor table is empty")]
    Empty,

    #[error("invalid field descriptors: {}", join_problems(.0))]
    InvalidFields(Vec<FieldProblem>),
}

impl ConfigError {
    /// Offending descriptors, empty for table-wide errors
    pub fn problems(&self) -> &[FieldProblem] {
        match self {
            ConfigError::InvalidFields(problems) => problems,
            _ => &[],
        }
    }
}

/// Errors raised by output store access
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("output store has been disposed")]
    Disposed,

    #[error("slot {slot} out of range (store has {count} columns)")]
    SlotOutOfRange { slot: usize, count: usize },

    #[error("slot {slot} holds {actual:?} values, not {expected:?}")]
    KindMismatch {
        slot: usize,
        expected: ColumnKind,
        actual: ColumnKind,
    },
}

/// Errors raised while encoding fields into a raw record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("bits {bit_offset}..{bit_end} exceed the {record_bits}-bit record")]
    OutOfBounds {
        bit_offset: u32,
        bit_end: u64,
        record_bits: usize,
    },

    #[error("field width {bit_size} is outside 1..=32")]
    InvalidWidth { bit_size: u32 },

    #[error("field at bit {bit_offset} must be byte aligned")]
    Unaligned { bit_offset: u32 },

    #[error("record is {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Errors raised while demultiplexing a batch
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("requested {count} records but the buffer holds {available}")]
    NotEnoughRecords { count: usize, available: usize },

    #[error("requested {count} records but column {slot} holds {capacity}")]
    NotEnoughCapacity {
        slot: usize,
        count: usize,
        capacity: usize,
    },

    #[error("output store has no column for slot {slot}")]
    MissingColumn { slot: usize },

    #[error("column {slot} holds {actual:?} values, descriptor writes {expected:?}")]
    ColumnKindMismatch {
        slot: usize,
        expected: ColumnKind,
        actual: ColumnKind,
    },

    #[error("output store has been disposed")]
    StoreDisposed,

    #[error("output columns do not match the {layout} layout")]
    LayoutMismatch { layout: &'static str },

    #[error("record is {actual} bytes, larger than the {expected}-byte layout")]
    RecordTooLarge { expected: usize, actual: usize },

    #[error("worker count must be positive")]
    NoWorkers,

    #[error("demux worker panicked")]
    WorkerPanicked,
}
