//! Field descriptor table
//!
//! A table is the validated, immutable form of a device layout. Building
//! one checks every descriptor against the record size, the encoding widths
//! and the slot numbering, and resolves each descriptor's extraction
//! function. A table never exists in a partially valid state, so the
//! extraction loop does no per-record bounds or alignment work.
//!
//! Tables are `Send + Sync` and are shared by reference or `Arc` between
//! any number of concurrent demux calls.

use std::collections::HashMap;

use super::extract::{FieldPlan, Sample};
use super::types::{
    ByteOrder, ColumnKind, DestinationEncoding, FieldDescriptor, RangePolicy, SourceEncoding,
    TableOptions, BITS_PER_BYTE, F32_EXACT_INTEGER_BITS, FLOAT32_BITS, MAX_INTEGER_FIELD_BITS,
};
use crate::error::{ConfigError, FieldProblem, FieldProblemKind};

/// Validated, immutable list of field descriptors for one record layout
#[derive(Debug, Clone)]
pub struct FieldDescriptorTable {
    record_bits: u32,
    options: TableOptions,
    plans: Vec<FieldPlan>,
    hot_order: Vec<usize>,
    column_kinds: Vec<ColumnKind>,
}

impl FieldDescriptorTable {
    /// Build a table with default options (native byte order, saturating)
    pub fn build(descriptors: &[FieldDescriptor], record_bits: u32) -> Result<Self, ConfigError> {
        Self::build_with(descriptors, record_bits, TableOptions::default())
    }

    /// Build a table with explicit byte order and range policy
    pub fn build_with(
        descriptors: &[FieldDescriptor],
        record_bits: u32,
        options: TableOptions,
    ) -> Result<Self, ConfigError> {
        if record_bits == 0 || record_bits % BITS_PER_BYTE != 0 {
            return Err(ConfigError::RecordSize { bits: record_bits });
        }
        if descriptors.is_empty() {
            return Err(ConfigError::Empty);
        }

        let mut problems = Vec::new();
        for (index, descriptor) in descriptors.iter().enumerate() {
            problems.extend(
                check_descriptor(descriptor, record_bits, &options)
                    .into_iter()
                    .map(|kind| FieldProblem { index, kind }),
            );
        }
        problems.extend(check_slots(descriptors));

        if !problems.is_empty() {
            problems.sort_by_key(|p| p.index);
            log::debug!(
                "Rejected descriptor table ({} fields): {} problem(s)",
                descriptors.len(),
                problems.len()
            );
            return Err(ConfigError::InvalidFields(problems));
        }

        let plans: Vec<FieldPlan> = descriptors
            .iter()
            .map(|d| FieldPlan::new(*d, options.byte_order))
            .collect();

        let mut hot_order: Vec<usize> = (0..plans.len()).collect();
        hot_order.sort_by_key(|&i| !plans[i].descriptor.hot);

        let mut column_kinds = vec![ColumnKind::Float; plans.len()];
        for plan in &plans {
            column_kinds[plan.slot()] = plan.descriptor.destination.column_kind();
        }

        log::debug!(
            "Built descriptor table: {} fields, {}-bit records, {:?} byte order",
            plans.len(),
            record_bits,
            options.byte_order
        );

        Ok(Self {
            record_bits,
            options,
            plans,
            hot_order,
            column_kinds,
        })
    }

    /// Record size in bits
    pub fn record_bits(&self) -> u32 {
        self.record_bits
    }

    /// Record size in bytes
    pub fn record_bytes(&self) -> usize {
        (self.record_bits / BITS_PER_BYTE) as usize
    }

    pub fn options(&self) -> TableOptions {
        self.options
    }

    /// Number of descriptors, which is also the number of output slots
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Descriptors in declaration order
    pub fn descriptors(&self) -> impl ExactSizeIterator<Item = &FieldDescriptor> + '_ {
        self.plans.iter().map(|p| &p.descriptor)
    }

    /// Resolved fields in declaration order
    pub fn plans(&self) -> &[FieldPlan] {
        &self.plans
    }

    /// Declaration indices with hot fields first, otherwise stable
    ///
    /// The table-driven path reads in declaration order; hand-written layouts
    /// read their fields in this order.
    pub fn hot_order(&self) -> &[usize] {
        &self.hot_order
    }

    /// Column kind of every slot, indexed by slot
    pub fn column_kinds(&self) -> &[ColumnKind] {
        &self.column_kinds
    }

    /// Index of the descriptor writing `slot`
    pub fn field_for_slot(&self, slot: usize) -> Option<usize> {
        self.plans.iter().position(|p| p.slot() == slot)
    }

    /// Decode descriptor `index` from a single record
    pub fn decode(&self, index: usize, record: &[u8]) -> Option<Sample> {
        let plan = self.plans.get(index)?;
        if record.len() < self.record_bytes() {
            return None;
        }
        Some(plan.decode(record))
    }
}

fn width_bounds(source: SourceEncoding) -> (u32, u32) {
    match source {
        SourceEncoding::Float32 => (FLOAT32_BITS, FLOAT32_BITS),
        SourceEncoding::UnsignedBits => (1, MAX_INTEGER_FIELD_BITS),
        SourceEncoding::TwosComplementSignedBits | SourceEncoding::ExcessKSignedBits => {
            (2, MAX_INTEGER_FIELD_BITS)
        }
    }
}

/// Whether `source` at `bit_size` can produce values `destination` cannot hold exactly
fn is_lossy(source: SourceEncoding, destination: DestinationEncoding, bit_size: u32) -> bool {
    match (source, destination) {
        (_, DestinationEncoding::Bool) => false,
        (SourceEncoding::Float32, DestinationEncoding::Float) => false,
        (SourceEncoding::Float32, _) => true,
        (SourceEncoding::UnsignedBits, DestinationEncoding::Float) => {
            bit_size > F32_EXACT_INTEGER_BITS
        }
        (_, DestinationEncoding::Float) => bit_size > F32_EXACT_INTEGER_BITS + 1,
        (SourceEncoding::UnsignedBits, DestinationEncoding::UInt) => false,
        (SourceEncoding::UnsignedBits, DestinationEncoding::Int) => {
            bit_size >= MAX_INTEGER_FIELD_BITS
        }
        (_, DestinationEncoding::UInt) => true,
        (_, DestinationEncoding::Int) => false,
    }
}

fn check_descriptor(
    d: &FieldDescriptor,
    record_bits: u32,
    options: &TableOptions,
) -> Vec<FieldProblemKind> {
    if d.bit_size == 0 {
        return vec![FieldProblemKind::ZeroSize];
    }

    let mut problems = Vec::new();

    if d.bit_end() > u64::from(record_bits) {
        problems.push(FieldProblemKind::OutOfRange {
            bit_offset: d.bit_offset,
            bit_end: d.bit_end(),
            record_bits,
        });
    }

    let (min, max) = width_bounds(d.source);
    if d.bit_size < min || d.bit_size > max {
        problems.push(FieldProblemKind::WidthMismatch {
            encoding: d.source,
            bit_size: d.bit_size,
            min,
            max,
        });
    }

    if d.source == SourceEncoding::Float32 && !d.is_byte_aligned() {
        problems.push(FieldProblemKind::UnalignedFloat {
            bit_offset: d.bit_offset,
        });
    }

    if options.byte_order == ByteOrder::Big {
        let shift = d.bit_offset % BITS_PER_BYTE;
        let spans_bytes = if d.bit_size > BITS_PER_BYTE {
            shift != 0 || d.bit_size % BITS_PER_BYTE != 0
        } else {
            shift + d.bit_size > BITS_PER_BYTE
        };
        if spans_bytes {
            problems.push(FieldProblemKind::ByteOrderSpan {
                bit_offset: d.bit_offset,
                bit_size: d.bit_size,
            });
        }
    }

    if options.range_policy == RangePolicy::Reject && is_lossy(d.source, d.destination, d.bit_size)
    {
        problems.push(FieldProblemKind::LossyConversion {
            encoding: d.source,
            destination: d.destination,
            bit_size: d.bit_size,
        });
    }

    problems
}

fn check_slots(descriptors: &[FieldDescriptor]) -> Vec<FieldProblem> {
    let count = descriptors.len();
    let mut first_use: HashMap<u32, usize> = HashMap::with_capacity(count);
    let mut problems = Vec::new();

    for (index, d) in descriptors.iter().enumerate() {
        if d.slot as usize >= count {
            problems.push(FieldProblem {
                index,
                kind: FieldProblemKind::SlotNotDense {
                    slot: d.slot,
                    count,
                },
            });
            continue;
        }
        if let Some(&first) = first_use.get(&d.slot) {
            problems.push(FieldProblem {
                index,
                kind: FieldProblemKind::DuplicateSlot {
                    slot: d.slot,
                    first,
                },
            });
        } else {
            first_use.insert(d.slot, index);
        }
    }

    problems
}
