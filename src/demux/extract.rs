//! Per-field extraction functions
//!
//! Every `(source encoding, destination encoding, byte order)` triple maps to
//! one monomorphized function. The table resolves the pointer once per
//! descriptor when it is built; the hot loop only calls it.

use super::bits::{self, BitSpan};
use super::store::ColumnSliceMut;
use super::types::{ByteOrder, DestinationEncoding, FieldDescriptor, SourceEncoding};

/// Decodes one field into a [`Sample`]
pub(crate) type DecodeFn = fn(&[u8], &FieldPlan) -> Sample;

/// Decodes one field and stores it at `index` of its column window
pub(crate) type WriteFn = fn(&[u8], &FieldPlan, &mut ColumnSliceMut<'_>, usize);

/// A field value as read from the record, before destination conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Unsigned(u32),
    Signed(i32),
    Float(f32),
}

impl Sample {
    /// Convert for a float column; floats keep their exact bit pattern
    #[inline(always)]
    pub fn to_f32(self) -> f32 {
        match self {
            Sample::Unsigned(v) => v as f32,
            Sample::Signed(v) => v as f32,
            Sample::Float(v) => v,
        }
    }

    /// Convert for a bool column, nonzero is `true`
    #[inline(always)]
    pub fn to_bool(self) -> bool {
        match self {
            Sample::Unsigned(v) => v != 0,
            Sample::Signed(v) => v != 0,
            Sample::Float(v) => v != 0.0,
        }
    }

    /// Convert for an unsigned column, saturating
    #[inline(always)]
    pub fn to_u32(self) -> u32 {
        match self {
            Sample::Unsigned(v) => v,
            Sample::Signed(v) => v.max(0) as u32,
            Sample::Float(v) => v as u32,
        }
    }

    /// Convert for a signed column, saturating
    #[inline(always)]
    pub fn to_i32(self) -> i32 {
        match self {
            Sample::Unsigned(v) => v.min(i32::MAX as u32) as i32,
            Sample::Signed(v) => v,
            Sample::Float(v) => v as i32,
        }
    }

    /// Destination value widened to `f32`; booleans become 1.0 or 0.0
    pub fn to_output_f32(self, destination: DestinationEncoding) -> f32 {
        match destination {
            DestinationEncoding::Float => self.to_f32(),
            DestinationEncoding::Bool => {
                if self.to_bool() {
                    1.0
                } else {
                    0.0
                }
            }
            DestinationEncoding::UInt => self.to_u32() as f32,
            DestinationEncoding::Int => self.to_i32() as f32,
        }
    }
}

/// A validated descriptor with its location and extraction functions resolved
#[derive(Debug, Clone, Copy)]
pub struct FieldPlan {
    pub descriptor: FieldDescriptor,
    pub(crate) span: BitSpan,
    pub(crate) decode: DecodeFn,
    pub(crate) write: WriteFn,
}

impl FieldPlan {
    pub(crate) fn new(descriptor: FieldDescriptor, order: ByteOrder) -> Self {
        let (decode, write) = resolve(descriptor.source, descriptor.destination, order);
        Self {
            descriptor,
            span: BitSpan::new(descriptor.bit_offset, descriptor.bit_size),
            decode,
            write,
        }
    }

    /// Output slot written by this field
    #[inline(always)]
    pub fn slot(&self) -> usize {
        self.descriptor.slot as usize
    }

    /// Decode the field from one record
    #[inline(always)]
    pub fn decode(&self, record: &[u8]) -> Sample {
        (self.decode)(record, self)
    }

    /// Decode the field from one record into `column[index]`
    #[inline(always)]
    pub fn write(&self, record: &[u8], column: &mut ColumnSliceMut<'_>, index: usize) {
        (self.write)(record, self, column, index)
    }

    /// Whether any of the field's bits is set in a change mask
    #[inline(always)]
    pub fn touches(&self, mask: &[u8]) -> bool {
        self.span.any_set(mask)
    }
}

trait ReadBits {
    fn bits(record: &[u8], span: &BitSpan) -> u32;
    fn float(record: &[u8], at: usize) -> f32;
}

enum LittleEndian {}
enum BigEndian {}

impl ReadBits for LittleEndian {
    #[inline(always)]
    fn bits(record: &[u8], span: &BitSpan) -> u32 {
        span.read_lsb(record)
    }

    #[inline(always)]
    fn float(record: &[u8], at: usize) -> f32 {
        f32::from_le_bytes(bits::quad(record, at))
    }
}

impl ReadBits for BigEndian {
    #[inline(always)]
    fn bits(record: &[u8], span: &BitSpan) -> u32 {
        // narrow fields never cross a byte under big-endian tables
        if span.is_whole_bytes() {
            span.read_msb(record)
        } else {
            span.read_lsb(record)
        }
    }

    #[inline(always)]
    fn float(record: &[u8], at: usize) -> f32 {
        f32::from_be_bytes(bits::quad(record, at))
    }
}

trait Decode {
    fn decode<R: ReadBits>(record: &[u8], plan: &FieldPlan) -> Sample;
}

enum Float32 {}
enum Unsigned {}
enum TwosComplement {}
enum ExcessK {}

impl Decode for Float32 {
    #[inline(always)]
    fn decode<R: ReadBits>(record: &[u8], plan: &FieldPlan) -> Sample {
        Sample::Float(R::float(record, plan.span.byte_start))
    }
}

impl Decode for Unsigned {
    #[inline(always)]
    fn decode<R: ReadBits>(record: &[u8], plan: &FieldPlan) -> Sample {
        Sample::Unsigned(R::bits(record, &plan.span))
    }
}

impl Decode for TwosComplement {
    #[inline(always)]
    fn decode<R: ReadBits>(record: &[u8], plan: &FieldPlan) -> Sample {
        let raw = R::bits(record, &plan.span);
        Sample::Signed(bits::sign_extend(raw, plan.span.bit_size))
    }
}

impl Decode for ExcessK {
    #[inline(always)]
    fn decode<R: ReadBits>(record: &[u8], plan: &FieldPlan) -> Sample {
        let raw = R::bits(record, &plan.span);
        Sample::Signed(bits::excess_k(raw, plan.span.bit_size))
    }
}

trait Sink {
    fn store(column: &mut ColumnSliceMut<'_>, index: usize, sample: Sample);
}

enum FloatSink {}
enum BoolSink {}
enum UIntSink {}
enum IntSink {}

// Column kinds are checked against the table before a batch runs, so the
// non-matching arms are never taken.
impl Sink for FloatSink {
    #[inline(always)]
    fn store(column: &mut ColumnSliceMut<'_>, index: usize, sample: Sample) {
        if let ColumnSliceMut::Float(values) = column {
            values[index] = sample.to_f32();
        }
    }
}

impl Sink for BoolSink {
    #[inline(always)]
    fn store(column: &mut ColumnSliceMut<'_>, index: usize, sample: Sample) {
        if let ColumnSliceMut::Bool(bits) = column {
            bits.set(index, sample.to_bool());
        }
    }
}

impl Sink for UIntSink {
    #[inline(always)]
    fn store(column: &mut ColumnSliceMut<'_>, index: usize, sample: Sample) {
        if let ColumnSliceMut::UInt(values) = column {
            values[index] = sample.to_u32();
        }
    }
}

impl Sink for IntSink {
    #[inline(always)]
    fn store(column: &mut ColumnSliceMut<'_>, index: usize, sample: Sample) {
        if let ColumnSliceMut::Int(values) = column {
            values[index] = sample.to_i32();
        }
    }
}

fn write_field<R: ReadBits, D: Decode, S: Sink>(
    record: &[u8],
    plan: &FieldPlan,
    column: &mut ColumnSliceMut<'_>,
    index: usize,
) {
    S::store(column, index, D::decode::<R>(record, plan));
}

fn resolve(
    source: SourceEncoding,
    destination: DestinationEncoding,
    order: ByteOrder,
) -> (DecodeFn, WriteFn) {
    match order {
        ByteOrder::Little => resolve_source::<LittleEndian>(source, destination),
        ByteOrder::Big => resolve_source::<BigEndian>(source, destination),
    }
}

fn resolve_source<R: ReadBits>(
    source: SourceEncoding,
    destination: DestinationEncoding,
) -> (DecodeFn, WriteFn) {
    match source {
        SourceEncoding::Float32 => resolve_destination::<R, Float32>(destination),
        SourceEncoding::UnsignedBits => resolve_destination::<R, Unsigned>(destination),
        SourceEncoding::TwosComplementSignedBits => {
            resolve_destination::<R, TwosComplement>(destination)
        }
        SourceEncoding::ExcessKSignedBits => resolve_destination::<R, ExcessK>(destination),
    }
}

fn resolve_destination<R: ReadBits, D: Decode>(
    destination: DestinationEncoding,
) -> (DecodeFn, WriteFn) {
    let write: WriteFn = match destination {
        DestinationEncoding::Float => write_field::<R, D, FloatSink>,
        DestinationEncoding::Bool => write_field::<R, D, BoolSink>,
        DestinationEncoding::UInt => write_field::<R, D, UIntSink>,
        DestinationEncoding::Int => write_field::<R, D, IntSink>,
    };
    let decode: DecodeFn = D::decode::<R>;
    (decode, write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::store::OutputStore;
    use crate::demux::types::ColumnKind;

    fn plan(descriptor: FieldDescriptor, order: ByteOrder) -> FieldPlan {
        FieldPlan::new(descriptor, order)
    }

    #[test]
    fn test_sample_conversions() {
        assert_eq!(Sample::Unsigned(255).to_f32(), 255.0);
        assert_eq!(Sample::Signed(-3).to_u32(), 0);
        assert_eq!(Sample::Unsigned(u32::MAX).to_i32(), i32::MAX);
        assert_eq!(Sample::Float(1.0).to_u32(), 1);
        assert_eq!(Sample::Float(-2.7).to_i32(), -2);
        assert_eq!(Sample::Float(f32::NAN).to_u32(), 0);
        assert_eq!(Sample::Float(1e20).to_i32(), i32::MAX);
        assert!(Sample::Signed(-1).to_bool());
        assert!(!Sample::Float(0.0).to_bool());
        assert!(!Sample::Float(-0.0).to_bool());
    }

    #[test]
    fn test_output_f32() {
        assert_eq!(Sample::Unsigned(1).to_output_f32(DestinationEncoding::Bool), 1.0);
        assert_eq!(Sample::Unsigned(0).to_output_f32(DestinationEncoding::Bool), 0.0);
        assert_eq!(Sample::Signed(-5).to_output_f32(DestinationEncoding::UInt), 0.0);
        assert_eq!(Sample::Float(2.5).to_output_f32(DestinationEncoding::Int), 2.0);
    }

    #[test]
    fn test_float32_keeps_bits() {
        let bits = 0x7FC0_1234u32;
        let mut record = [0u8; 8];
        record[4..8].copy_from_slice(&bits.to_le_bytes());
        let p = plan(FieldDescriptor::float32(32, 0), ByteOrder::Little);
        match p.decode(&record) {
            Sample::Float(v) => assert_eq!(v.to_bits(), bits),
            other => panic!("unexpected sample {:?}", other),
        }
    }

    #[test]
    fn test_float32_big_endian() {
        let record = 1.5f32.to_be_bytes();
        let p = plan(FieldDescriptor::float32(0, 0), ByteOrder::Big);
        assert_eq!(p.decode(&record), Sample::Float(1.5));
    }

    #[test]
    fn test_signed_decoders() {
        let record = (-1234i16).to_le_bytes();
        let twos = FieldDescriptor::new(
            0,
            16,
            SourceEncoding::TwosComplementSignedBits,
            DestinationEncoding::Int,
            0,
        );
        assert_eq!(plan(twos, ByteOrder::Little).decode(&record), Sample::Signed(-1234));

        let record = [0x00u8];
        let excess = FieldDescriptor::new(
            0,
            8,
            SourceEncoding::ExcessKSignedBits,
            DestinationEncoding::Int,
            0,
        );
        assert_eq!(plan(excess, ByteOrder::Little).decode(&record), Sample::Signed(-128));
    }

    #[test]
    fn test_big_endian_integer() {
        let record = [0x12u8, 0x34];
        let d = FieldDescriptor::new(
            0,
            16,
            SourceEncoding::UnsignedBits,
            DestinationEncoding::UInt,
            0,
        );
        assert_eq!(plan(d, ByteOrder::Big).decode(&record), Sample::Unsigned(0x1234));
        assert_eq!(plan(d, ByteOrder::Little).decode(&record), Sample::Unsigned(0x3412));
    }

    #[test]
    fn test_write_into_each_column_kind() {
        let record = [0b0000_0110u8, 0xFF];
        let mut store = OutputStore::with_columns(
            &[ColumnKind::Float, ColumnKind::Bool, ColumnKind::UInt, ColumnKind::Int],
            3,
        );
        let unsigned = |slot, destination| {
            plan(
                FieldDescriptor::new(1, 2, SourceEncoding::UnsignedBits, destination, slot),
                ByteOrder::Little,
            )
        };
        let plans = [
            unsigned(0, DestinationEncoding::Float),
            unsigned(1, DestinationEncoding::Bool),
            unsigned(2, DestinationEncoding::UInt),
            plan(
                FieldDescriptor::new(
                    8,
                    8,
                    SourceEncoding::TwosComplementSignedBits,
                    DestinationEncoding::Int,
                    3,
                ),
                ByteOrder::Little,
            ),
        ];
        {
            let mut columns = store.slices_mut(3);
            for p in &plans {
                p.write(&record, &mut columns[p.slot()], 2);
            }
        }
        assert_eq!(store.floats(0).unwrap()[2], 3.0);
        assert_eq!(store.bools(1).unwrap().get(2), Some(true));
        assert_eq!(store.uints(2).unwrap()[2], 3);
        assert_eq!(store.ints(3).unwrap()[2], -1);
    }

    #[test]
    fn test_touches_change_mask() {
        let p = plan(FieldDescriptor::flag(9, 0), ByteOrder::Little);
        assert!(p.touches(&[0x00, 0b10]));
        assert!(!p.touches(&[0xFF, 0b01]));
    }
}
