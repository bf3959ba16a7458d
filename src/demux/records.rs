//! Raw record batches and a reference field encoder
//!
//! [`RecordBuffer`] owns a contiguous run of fixed-size records, the shape
//! the demuxer consumes. [`RecordWriter`] packs field values into one record
//! using the same bit numbering the extractor reads with; producers and
//! tests use it to build input.

use super::bits::BitSpan;
use super::table::FieldDescriptorTable;
use super::types::{ByteOrder, SourceEncoding, BITS_PER_BYTE, MAX_INTEGER_FIELD_BITS};
use crate::error::RecordError;

/// Contiguous batch of fixed-size raw records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBuffer {
    bytes: Vec<u8>,
    record_bytes: usize,
}

impl RecordBuffer {
    /// Empty buffer for records of `record_bytes` bytes (at least one)
    pub fn new(record_bytes: usize) -> Self {
        Self::with_capacity(record_bytes, 0)
    }

    /// Empty buffer with room for `records` records
    pub fn with_capacity(record_bytes: usize, records: usize) -> Self {
        let record_bytes = record_bytes.max(1);
        Self {
            bytes: Vec::with_capacity(record_bytes * records),
            record_bytes,
        }
    }

    /// `count` all-zero records
    pub fn zeroed(record_bytes: usize, count: usize) -> Self {
        let record_bytes = record_bytes.max(1);
        Self {
            bytes: vec![0; record_bytes * count],
            record_bytes,
        }
    }

    /// Wrap bytes produced elsewhere; the length must be a whole number of records
    pub fn from_bytes(bytes: Vec<u8>, record_bytes: usize) -> Result<Self, RecordError> {
        let record_bytes = record_bytes.max(1);
        if bytes.len() % record_bytes != 0 {
            return Err(RecordError::SizeMismatch {
                expected: (bytes.len() / record_bytes + 1) * record_bytes,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes,
            record_bytes,
        })
    }

    /// Bytes per record
    pub fn record_bytes(&self) -> usize {
        self.record_bytes
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.bytes.len() / self.record_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// All records back to back
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn record(&self, index: usize) -> Option<&[u8]> {
        let start = index.checked_mul(self.record_bytes)?;
        let end = start.checked_add(self.record_bytes)?;
        self.bytes.get(start..end)
    }

    pub fn record_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let start = index.checked_mul(self.record_bytes)?;
        let end = start.checked_add(self.record_bytes)?;
        self.bytes.get_mut(start..end)
    }

    /// Encoder over record `index`
    pub fn writer(&mut self, index: usize, order: ByteOrder) -> Option<RecordWriter<'_>> {
        self.record_mut(index).map(|r| RecordWriter::new(r, order))
    }

    /// Append a copy of `record`
    pub fn push(&mut self, record: &[u8]) -> Result<(), RecordError> {
        if record.len() != self.record_bytes {
            return Err(RecordError::SizeMismatch {
                expected: self.record_bytes,
                actual: record.len(),
            });
        }
        self.bytes.extend_from_slice(record);
        Ok(())
    }

    /// Append an all-zero record and return it for filling
    pub fn push_zeroed(&mut self) -> &mut [u8] {
        let start = self.bytes.len();
        self.bytes.resize(start + self.record_bytes, 0);
        &mut self.bytes[start..]
    }

    /// Iterate over records in order
    pub fn iter(&self) -> std::slice::ChunksExact<'_, u8> {
        self.bytes.chunks_exact(self.record_bytes)
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// `count` pseudo-random records for `table`, reproducible from `seed`
    ///
    /// Float fields get finite values in `[-100, 100)`; integer fields get
    /// arbitrary bits. Bytes no field covers stay zero.
    pub fn synthetic(
        table: &FieldDescriptorTable,
        count: usize,
        seed: u64,
    ) -> Result<Self, RecordError> {
        let order = table.options().byte_order;
        let mut buffer = Self::zeroed(table.record_bytes(), count);
        let mut state = seed | 1;
        let record_bytes = buffer.record_bytes;
        for record in buffer.bytes.chunks_exact_mut(record_bytes) {
            let mut writer = RecordWriter::new(record, order);
            for d in table.descriptors() {
                // xorshift64*
                state ^= state >> 12;
                state ^= state << 25;
                state ^= state >> 27;
                let random = state.wrapping_mul(0x2545_F491_4F6C_DD1D);
                match d.source {
                    SourceEncoding::Float32 => {
                        let value = ((random >> 40) as i32 % 20_000) - 10_000;
                        writer.write_f32(d.bit_offset, value as f32 * 0.01)?;
                    }
                    _ => writer.write_bits(d.bit_offset, d.bit_size, (random >> 32) as u32)?,
                }
            }
        }
        Ok(buffer)
    }
}

/// Packs field values into one raw record
#[derive(Debug)]
pub struct RecordWriter<'a> {
    record: &'a mut [u8],
    order: ByteOrder,
}

impl<'a> RecordWriter<'a> {
    pub fn new(record: &'a mut [u8], order: ByteOrder) -> Self {
        Self { record, order }
    }

    fn span(&self, bit_offset: u32, bit_size: u32) -> Result<BitSpan, RecordError> {
        if bit_size == 0 || bit_size > MAX_INTEGER_FIELD_BITS {
            return Err(RecordError::InvalidWidth { bit_size });
        }
        let record_bits = self.record.len() * BITS_PER_BYTE as usize;
        let bit_end = u64::from(bit_offset) + u64::from(bit_size);
        if bit_end > record_bits as u64 {
            return Err(RecordError::OutOfBounds {
                bit_offset,
                bit_end,
                record_bits,
            });
        }
        Ok(BitSpan::new(bit_offset, bit_size))
    }

    /// Write the low `bit_size` bits of `value`
    pub fn write_bits(
        &mut self,
        bit_offset: u32,
        bit_size: u32,
        value: u32,
    ) -> Result<(), RecordError> {
        let span = self.span(bit_offset, bit_size)?;
        if self.order == ByteOrder::Big && span.is_whole_bytes() {
            span.write_msb(self.record, value);
        } else {
            span.write_lsb(self.record, value);
        }
        Ok(())
    }

    /// Write a two's complement value truncated to `bit_size` bits
    pub fn write_signed(
        &mut self,
        bit_offset: u32,
        bit_size: u32,
        value: i32,
    ) -> Result<(), RecordError> {
        self.write_bits(bit_offset, bit_size, value as u32)
    }

    /// Write an excess-K value, biased by 2^(bit_size - 1)
    pub fn write_excess_k(
        &mut self,
        bit_offset: u32,
        bit_size: u32,
        value: i32,
    ) -> Result<(), RecordError> {
        self.span(bit_offset, bit_size)?;
        let biased = i64::from(value) + (1i64 << (bit_size - 1));
        self.write_bits(bit_offset, bit_size, biased as u32)
    }

    /// Write a single flag bit
    pub fn write_flag(&mut self, bit_offset: u32, value: bool) -> Result<(), RecordError> {
        self.write_bits(bit_offset, 1, u32::from(value))
    }

    /// Write an IEEE-754 binary32 at a byte-aligned offset
    pub fn write_f32(&mut self, bit_offset: u32, value: f32) -> Result<(), RecordError> {
        if bit_offset % BITS_PER_BYTE != 0 {
            return Err(RecordError::Unaligned { bit_offset });
        }
        let span = self.span(bit_offset, 32)?;
        let bytes = match self.order {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        };
        self.record[span.byte_start..span.byte_start + 4].copy_from_slice(&bytes);
        Ok(())
    }
}
