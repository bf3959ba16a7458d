// types.rs - Core types and enums for the record demultiplexer

//! Core types and enumerations for the demultiplexer.
//!
//! This module defines the descriptor that locates one field inside a raw
//! record, the encodings a field can be read as and written to, and the
//! configuration knobs that decide byte order and range handling.

/// Bits per byte, used throughout offset arithmetic
pub const BITS_PER_BYTE: u32 = 8;

/// Widest integer field the extractor reads in one go
pub const MAX_INTEGER_FIELD_BITS: u32 = 32;

/// Width of an IEEE-754 binary32 field
pub const FLOAT32_BITS: u32 = 32;

/// Largest integer magnitude an `f32` represents exactly (2^24)
pub const F32_EXACT_INTEGER_BITS: u32 = 24;

/// How the raw bits of a field are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceEncoding {
    /// IEEE-754 binary32, exactly 32 byte-aligned bits
    Float32,
    /// Unsigned magnitude, taken as-is
    UnsignedBits,
    /// Two's complement signed integer, sign-extended from the top bit
    TwosComplementSignedBits,
    /// Excess-K signed integer, biased by 2^(width - 1)
    ExcessKSignedBits,
}

impl SourceEncoding {
    /// Whether the encoding yields a signed integer
    pub fn is_signed_integer(self) -> bool {
        matches!(
            self,
            SourceEncoding::TwosComplementSignedBits | SourceEncoding::ExcessKSignedBits
        )
    }

    /// Name used in layout files
    pub fn name(self) -> &'static str {
        match self {
            SourceEncoding::Float32 => "float32",
            SourceEncoding::UnsignedBits => "unsigned",
            SourceEncoding::TwosComplementSignedBits => "twos_complement",
            SourceEncoding::ExcessKSignedBits => "excess_k",
        }
    }

    /// Parse a layout file name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "float32" | "f32" => Some(SourceEncoding::Float32),
            "unsigned" | "unsigned_bits" | "bits" => Some(SourceEncoding::UnsignedBits),
            "twos_complement" | "signed" => Some(SourceEncoding::TwosComplementSignedBits),
            "excess_k" => Some(SourceEncoding::ExcessKSignedBits),
            _ => None,
        }
    }
}

/// Type written into the output column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationEncoding {
    /// `f32` column
    Float,
    /// Bit-packed boolean column, nonzero reads as `true`
    Bool,
    /// `u32` column
    UInt,
    /// `i32` column
    Int,
}

impl DestinationEncoding {
    /// Column kind that stores this encoding
    pub fn column_kind(self) -> ColumnKind {
        match self {
            DestinationEncoding::Float => ColumnKind::Float,
            DestinationEncoding::Bool => ColumnKind::Bool,
            DestinationEncoding::UInt => ColumnKind::UInt,
            DestinationEncoding::Int => ColumnKind::Int,
        }
    }

    /// Name used in layout files
    pub fn name(self) -> &'static str {
        match self {
            DestinationEncoding::Float => "float",
            DestinationEncoding::Bool => "bool",
            DestinationEncoding::UInt => "uint",
            DestinationEncoding::Int => "int",
        }
    }

    /// Parse a layout file name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "float" | "f32" => Some(DestinationEncoding::Float),
            "bool" => Some(DestinationEncoding::Bool),
            "uint" | "u32" => Some(DestinationEncoding::UInt),
            "int" | "i32" => Some(DestinationEncoding::Int),
            _ => None,
        }
    }
}

/// Storage type of one output column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Float,
    Bool,
    UInt,
    Int,
}

/// Byte order of multi-byte fields inside a record
///
/// Bit numbering is always least-significant-bit first within the record;
/// the byte order only changes how whole bytes of a wide field are assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the machine the crate was compiled for
    #[cfg(target_endian = "little")]
    pub const NATIVE: ByteOrder = ByteOrder::Little;
    /// Byte order of the machine the crate was compiled for
    #[cfg(target_endian = "big")]
    pub const NATIVE: ByteOrder = ByteOrder::Big;

    /// Parse a layout file name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "little" | "le" => Some(ByteOrder::Little),
            "big" | "be" => Some(ByteOrder::Big),
            "native" => Some(ByteOrder::NATIVE),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ByteOrder::Little => "little",
            ByteOrder::Big => "big",
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        ByteOrder::NATIVE
    }
}

/// What to do with encoding pairs whose destination cannot hold every source value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RangePolicy {
    /// Clamp to the destination range (negative to zero for `UInt`, NaN to zero)
    #[default]
    Saturate,
    /// Refuse lossy pairs when the table is built
    Reject,
}

impl RangePolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "saturate" => Some(RangePolicy::Saturate),
            "reject" => Some(RangePolicy::Reject),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RangePolicy::Saturate => "saturate",
            RangePolicy::Reject => "reject",
        }
    }
}

/// Table-wide configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TableOptions {
    pub byte_order: ByteOrder,
    pub range_policy: RangePolicy,
}

/// Describes how to extract one logical value from a raw record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    /// Bit position of the field's least significant bit
    pub bit_offset: u32,
    /// Number of bits the field occupies
    pub bit_size: u32,
    pub source: SourceEncoding,
    pub destination: DestinationEncoding,
    /// Output column the value is written to
    pub slot: u32,
    /// Field expected to change on most records
    pub hot: bool,
}

impl FieldDescriptor {
    /// Create a descriptor with the hot hint cleared
    pub fn new(
        bit_offset: u32,
        bit_size: u32,
        source: SourceEncoding,
        destination: DestinationEncoding,
        slot: u32,
    ) -> Self {
        Self {
            bit_offset,
            bit_size,
            source,
            destination,
            slot,
            hot: false,
        }
    }

    /// 32-bit float read into a float column
    pub fn float32(bit_offset: u32, slot: u32) -> Self {
        Self::new(
            bit_offset,
            FLOAT32_BITS,
            SourceEncoding::Float32,
            DestinationEncoding::Float,
            slot,
        )
    }

    /// Single bit read into a bool column
    pub fn flag(bit_offset: u32, slot: u32) -> Self {
        Self::new(
            bit_offset,
            1,
            SourceEncoding::UnsignedBits,
            DestinationEncoding::Bool,
            slot,
        )
    }

    /// Set the hot field hint
    pub fn with_hot(mut self, hot: bool) -> Self {
        self.hot = hot;
        self
    }

    /// One past the last bit the field occupies
    pub fn bit_end(&self) -> u64 {
        u64::from(self.bit_offset) + u64::from(self.bit_size)
    }

    /// Whether the field starts on a byte boundary
    pub fn is_byte_aligned(&self) -> bool {
        self.bit_offset % BITS_PER_BYTE == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_names_round_trip() {
        for source in [
            SourceEncoding::Float32,
            SourceEncoding::UnsignedBits,
            SourceEncoding::TwosComplementSignedBits,
            SourceEncoding::ExcessKSignedBits,
        ] {
            assert_eq!(SourceEncoding::from_name(source.name()), Some(source));
        }
        for destination in [
            DestinationEncoding::Float,
            DestinationEncoding::Bool,
            DestinationEncoding::UInt,
            DestinationEncoding::Int,
        ] {
            assert_eq!(DestinationEncoding::from_name(destination.name()), Some(destination));
        }
        assert_eq!(SourceEncoding::from_name("FLOAT32"), Some(SourceEncoding::Float32));
        assert_eq!(SourceEncoding::from_name("double"), None);
    }

    #[test]
    fn test_destination_column_kind() {
        assert_eq!(DestinationEncoding::Float.column_kind(), ColumnKind::Float);
        assert_eq!(DestinationEncoding::Bool.column_kind(), ColumnKind::Bool);
        assert_eq!(DestinationEncoding::UInt.column_kind(), ColumnKind::UInt);
        assert_eq!(DestinationEncoding::Int.column_kind(), ColumnKind::Int);
    }

    #[test]
    fn test_byte_order_names() {
        assert_eq!(ByteOrder::from_name("LE"), Some(ByteOrder::Little));
        assert_eq!(ByteOrder::from_name("big"), Some(ByteOrder::Big));
        assert_eq!(ByteOrder::from_name("native"), Some(ByteOrder::NATIVE));
        assert_eq!(ByteOrder::default(), ByteOrder::NATIVE);
    }

    #[test]
    fn test_descriptor_helpers() {
        let d = FieldDescriptor::float32(64, 2).with_hot(true);
        assert_eq!(d.bit_size, 32);
        assert_eq!(d.bit_end(), 96);
        assert!(d.hot);
        assert!(d.is_byte_aligned());

        let f = FieldDescriptor::flag(193, 7);
        assert_eq!(f.destination, DestinationEncoding::Bool);
        assert!(!f.is_byte_aligned());
    }

    #[test]
    fn test_signed_integer_sources() {
        assert!(SourceEncoding::TwosComplementSignedBits.is_signed_integer());
        assert!(SourceEncoding::ExcessKSignedBits.is_signed_integer());
        assert!(!SourceEncoding::UnsignedBits.is_signed_integer());
        assert!(!SourceEncoding::Float32.is_signed_integer());
    }
}
