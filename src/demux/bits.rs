//! Bit and byte slicing over raw record bytes
//!
//! Bit 0 is the least significant bit of the first byte. Callers are
//! responsible for bounds: the table validates every field range once, so
//! these helpers index the record directly.

use super::types::BITS_PER_BYTE;

/// Location of a field inside a record, precomputed from its descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitSpan {
    /// First byte touched by the field
    pub byte_start: usize,
    /// Number of bytes touched (at most 5 for a 32-bit field)
    pub byte_len: usize,
    /// Bit position of the field inside `byte_start`
    pub shift: u32,
    /// Width in bits
    pub bit_size: u32,
    /// Mask of `bit_size` low bits
    pub mask: u32,
}

impl BitSpan {
    pub fn new(bit_offset: u32, bit_size: u32) -> Self {
        let shift = bit_offset % BITS_PER_BYTE;
        Self {
            byte_start: (bit_offset / BITS_PER_BYTE) as usize,
            byte_len: (shift + bit_size).div_ceil(BITS_PER_BYTE) as usize,
            shift,
            bit_size,
            mask: low_mask(bit_size),
        }
    }

    /// Whether the span covers whole bytes only
    pub fn is_whole_bytes(&self) -> bool {
        self.shift == 0 && self.bit_size % BITS_PER_BYTE == 0
    }

    /// Read the field LSB-first, bytes assembled little-endian
    #[inline(always)]
    pub fn read_lsb(&self, record: &[u8]) -> u32 {
        let bytes = &record[self.byte_start..self.byte_start + self.byte_len];
        let mut acc = 0u64;
        for (i, byte) in bytes.iter().enumerate() {
            acc |= u64::from(*byte) << (BITS_PER_BYTE as usize * i);
        }
        ((acc >> self.shift) as u32) & self.mask
    }

    /// Read a whole-byte field with its bytes assembled big-endian
    #[inline(always)]
    pub fn read_msb(&self, record: &[u8]) -> u32 {
        let bytes = &record[self.byte_start..self.byte_start + self.byte_len];
        let mut acc = 0u32;
        for byte in bytes {
            acc = (acc << BITS_PER_BYTE) | u32::from(*byte);
        }
        acc
    }

    /// Whether any bit of the field is set in `bits`
    #[inline(always)]
    pub fn any_set(&self, bits: &[u8]) -> bool {
        self.read_lsb(bits) != 0
    }

    /// Write the field LSB-first, leaving neighbouring bits untouched
    pub fn write_lsb(&self, record: &mut [u8], value: u32) {
        let bytes = &mut record[self.byte_start..self.byte_start + self.byte_len];
        let field_mask = u64::from(self.mask) << self.shift;
        let bits = (u64::from(value & self.mask)) << self.shift;
        for (i, byte) in bytes.iter_mut().enumerate() {
            let at = BITS_PER_BYTE as usize * i;
            let keep = !((field_mask >> at) as u8);
            *byte = (*byte & keep) | ((bits >> at) as u8);
        }
    }

    /// Write a whole-byte field with its bytes in big-endian order
    pub fn write_msb(&self, record: &mut [u8], value: u32) {
        let bytes = &mut record[self.byte_start..self.byte_start + self.byte_len];
        let len = bytes.len();
        for (i, byte) in bytes.iter_mut().enumerate() {
            let at = BITS_PER_BYTE as usize * (len - 1 - i);
            *byte = (value >> at) as u8;
        }
    }
}

/// Mask with the low `bits` bits set
pub fn low_mask(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

/// Sign-extend a two's complement value of `bits` width
#[inline(always)]
pub fn sign_extend(raw: u32, bits: u32) -> i32 {
    let unused = 32 - bits;
    ((raw << unused) as i32) >> unused
}

/// Remove the excess-K bias of a `bits` wide value
#[inline(always)]
pub fn excess_k(raw: u32, bits: u32) -> i32 {
    (i64::from(raw) - (1i64 << (bits - 1))) as i32
}

/// Four bytes starting at `at`
#[inline(always)]
pub fn quad(record: &[u8], at: usize) -> [u8; 4] {
    [record[at], record[at + 1], record[at + 2], record[at + 3]]
}
