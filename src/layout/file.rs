//! Device layout files
//!
//! A layout file names a record layout and lists its fields:
//!
//! ```text
//! # Two-button pointer
//! name = pointer
//! record_bits = 72
//! byte_order = little
//! range_policy = saturate
//! field.x = float32 0 32 float 0 hot
//! field.y = float32 32 32 float 1 hot
//! field.left = unsigned 64 1 bool 2
//! field.right = unsigned 65 1 bool 3
//! ```
//!
//! Each `field.<name>` value is `<source> <bit_offset> <bit_size>
//! <destination> <slot>` with an optional trailing `hot`. Fields keep the
//! order they are declared in.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::propfile::parse_propfile;
use crate::demux::table::FieldDescriptorTable;
use crate::demux::types::{
    ByteOrder, DestinationEncoding, FieldDescriptor, RangePolicy, SourceEncoding, TableOptions,
};
use crate::error::ConfigError;

const FIELD_PREFIX: &str = "field.";

static FIELD_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("field name pattern is valid")
});

/// Errors raised while reading or writing a layout file
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("failed to access layout file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("layout is missing required key `{0}`")]
    MissingKey(&'static str),

    #[error("line {line}: invalid value `{value}` for `{key}`: {reason}")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
        reason: String,
    },

    #[error("line {line}: unknown key `{key}`")]
    UnknownKey { line: usize, key: String },

    #[error("line {line}: field name `{name}` must be an identifier")]
    BadFieldName { line: usize, name: String },

    #[error("line {line}: field `{name}` is declared twice")]
    DuplicateField { line: usize, name: String },

    #[error(transparent)]
    Table(#[from] ConfigError),
}

/// One named field of a device layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedField {
    pub name: String,
    pub descriptor: FieldDescriptor,
}

/// A named record layout, as read from or written to a layout file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLayout {
    pub name: String,
    pub record_bits: u32,
    pub options: TableOptions,
    pub fields: Vec<NamedField>,
}

fn invalid(line: usize, key: &str, value: &str, reason: impl Into<String>) -> LayoutError {
    LayoutError::InvalidValue {
        line,
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_field(line: usize, key: &str, value: &str) -> Result<FieldDescriptor, LayoutError> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    let (hot, parts) = match parts.split_last() {
        Some((last, rest)) if last.eq_ignore_ascii_case("hot") => (true, rest),
        _ => (false, &parts[..]),
    };
    let &[source, bit_offset, bit_size, destination, slot] = parts else {
        return Err(invalid(
            line,
            key,
            value,
            "expected `<source> <bit_offset> <bit_size> <destination> <slot> [hot]`",
        ));
    };

    let source = SourceEncoding::from_name(source)
        .ok_or_else(|| invalid(line, key, value, format!("unknown source encoding `{source}`")))?;
    let destination = DestinationEncoding::from_name(destination).ok_or_else(|| {
        invalid(line, key, value, format!("unknown destination encoding `{destination}`"))
    })?;
    let number = |text: &str, what: &str| {
        text.parse::<u32>()
            .map_err(|e| invalid(line, key, value, format!("{what}: {e}")))
    };

    Ok(FieldDescriptor::new(
        number(bit_offset, "bit offset")?,
        number(bit_size, "bit size")?,
        source,
        destination,
        number(slot, "slot")?,
    )
    .with_hot(hot))
}

impl DeviceLayout {
    /// Empty layout with default options
    pub fn new(name: impl Into<String>, record_bits: u32) -> Self {
        Self {
            name: name.into(),
            record_bits,
            options: TableOptions::default(),
            fields: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: TableOptions) -> Self {
        self.options = options;
        self
    }

    /// Append a field
    pub fn field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.fields.push(NamedField {
            name: name.into(),
            descriptor,
        });
        self
    }

    /// Parse layout file text
    pub fn parse(text: &str) -> Result<Self, LayoutError> {
        let mut name = None;
        let mut record_bits = None;
        let mut options = TableOptions::default();
        let mut fields: Vec<NamedField> = Vec::new();
        let mut first_error = None;

        parse_propfile(text, &mut |line, key, value| {
            if first_error.is_some() {
                return;
            }
            let result = match key {
                "name" => {
                    name = Some(value.to_string());
                    Ok(())
                }
                "record_bits" => value
                    .parse::<u32>()
                    .map(|bits| record_bits = Some(bits))
                    .map_err(|e| invalid(line, key, value, e.to_string())),
                "byte_order" => ByteOrder::from_name(value)
                    .map(|order| options.byte_order = order)
                    .ok_or_else(|| invalid(line, key, value, "expected little, big or native")),
                "range_policy" => RangePolicy::from_name(value)
                    .map(|policy| options.range_policy = policy)
                    .ok_or_else(|| invalid(line, key, value, "expected saturate or reject")),
                _ => match key.strip_prefix(FIELD_PREFIX) {
                    Some(field) if !FIELD_NAME.is_match(field) => Err(LayoutError::BadFieldName {
                        line,
                        name: field.to_string(),
                    }),
                    Some(field) if fields.iter().any(|f| f.name == field) => {
                        Err(LayoutError::DuplicateField {
                            line,
                            name: field.to_string(),
                        })
                    }
                    Some(field) => parse_field(line, key, value).map(|descriptor| {
                        fields.push(NamedField {
                            name: field.to_string(),
                            descriptor,
                        })
                    }),
                    None => Err(LayoutError::UnknownKey {
                        line,
                        key: key.to_string(),
                    }),
                },
            };
            if let Err(e) = result {
                first_error = Some(e);
            }
        });

        if let Some(e) = first_error {
            return Err(e);
        }

        let layout = Self {
            name: name.ok_or(LayoutError::MissingKey("name"))?,
            record_bits: record_bits.ok_or(LayoutError::MissingKey("record_bits"))?,
            options,
            fields,
        };
        log::debug!(
            "Parsed layout '{}': {} fields, {} bits",
            layout.name,
            layout.fields.len(),
            layout.record_bits
        );
        Ok(layout)
    }

    /// Read and parse a layout file
    pub fn load(path: &Path) -> Result<Self, LayoutError> {
        let text = fs::read_to_string(path).map_err(|source| LayoutError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Layout file text; [`parse`](Self::parse) reads it back unchanged
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        // writing to a String cannot fail
        let _ = writeln!(text, "# Device layout: {}", self.name);
        let _ = writeln!(text);
        let _ = writeln!(text, "name = {}", self.name);
        let _ = writeln!(text, "record_bits = {}", self.record_bits);
        let _ = writeln!(text, "byte_order = {}", self.options.byte_order.name());
        let _ = writeln!(text, "range_policy = {}", self.options.range_policy.name());
        if !self.fields.is_empty() {
            let _ = writeln!(text);
        }
        for field in &self.fields {
            let d = &field.descriptor;
            let _ = writeln!(
                text,
                "{}{} = {} {} {} {} {}{}",
                FIELD_PREFIX,
                field.name,
                d.source.name(),
                d.bit_offset,
                d.bit_size,
                d.destination.name(),
                d.slot,
                if d.hot { " hot" } else { "" }
            );
        }
        text
    }

    /// Write the layout file
    pub fn save(&self, path: &Path) -> Result<(), LayoutError> {
        fs::write(path, self.to_text()).map_err(|source| LayoutError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Field descriptors in declaration order
    pub fn descriptors(&self) -> Vec<FieldDescriptor> {
        self.fields.iter().map(|f| f.descriptor).collect()
    }

    /// Validate the layout into a descriptor table
    pub fn build_table(&self) -> Result<FieldDescriptorTable, ConfigError> {
        FieldDescriptorTable::build_with(&self.descriptors(), self.record_bits, self.options)
    }

    /// Output slot of the field called `name`
    pub fn slot_of(&self, name: &str) -> Option<u32> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.descriptor.slot)
    }

    /// Name of the field writing `slot`
    pub fn name_of(&self, slot: u32) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.descriptor.slot == slot)
            .map(|f| f.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const POINTER: &str = "\
# Two-button pointer
name = pointer
record_bits = 72
byte_order = little
range_policy = saturate
field.x = float32 0 32 float 0 hot
field.y = float32 32 32 float 1 hot
field.left = unsigned 64 1 bool 2
field.right = unsigned 65 1 bool 3
";

    #[test]
    fn test_parse_layout() {
        let layout = DeviceLayout::parse(POINTER).unwrap();
        assert_eq!(layout.name, "pointer");
        assert_eq!(layout.record_bits, 72);
        assert_eq!(layout.options.byte_order, ByteOrder::Little);
        assert_eq!(layout.fields.len(), 4);
        assert_eq!(layout.fields[0].descriptor, FieldDescriptor::float32(0, 0).with_hot(true));
        assert_eq!(layout.fields[3].descriptor, FieldDescriptor::flag(65, 3));
        assert_eq!(layout.slot_of("left"), Some(2));
        assert_eq!(layout.slot_of("middle"), None);
        assert_eq!(layout.name_of(1), Some("y"));
    }

    #[test]
    fn test_text_round_trip() {
        let layout = DeviceLayout::parse(POINTER).unwrap();
        assert_eq!(DeviceLayout::parse(&layout.to_text()).unwrap(), layout);
    }

    #[test]
    fn test_build_table_from_layout() {
        let table = DeviceLayout::parse(POINTER).unwrap().build_table().unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.record_bytes(), 9);
        assert_eq!(table.hot_order()[..2], [0, 1]);
    }

    #[test]
    fn test_invalid_table_reported() {
        let text = "name = bad\nrecord_bits = 8\nfield.a = unsigned 4 8 uint 0\n";
        let err = DeviceLayout::parse(text).unwrap().build_table().unwrap_err();
        assert_eq!(err.problems().len(), 1);
    }

    #[test]
    fn test_missing_keys() {
        assert!(matches!(
            DeviceLayout::parse("record_bits = 8"),
            Err(LayoutError::MissingKey("name"))
        ));
        assert!(matches!(
            DeviceLayout::parse("name = x"),
            Err(LayoutError::MissingKey("record_bits"))
        ));
    }

    #[test]
    fn test_bad_values_carry_line_numbers() {
        let err = DeviceLayout::parse("name = x\nrecord_bits = many\n").unwrap_err();
        assert!(matches!(err, LayoutError::InvalidValue { line: 2, .. }));

        let err = DeviceLayout::parse("name = x\nfield.a = float64 0 64 float 0\n").unwrap_err();
        assert!(err.to_string().contains("unknown source encoding `float64`"));

        let err = DeviceLayout::parse("field.a = unsigned 0 1 bool\n").unwrap_err();
        assert!(matches!(err, LayoutError::InvalidValue { line: 1, .. }));

        let err = DeviceLayout::parse("byte_order = middle").unwrap_err();
        assert!(matches!(err, LayoutError::InvalidValue { .. }));
    }

    #[test]
    fn test_field_names_checked() {
        let err = DeviceLayout::parse("field.2x = unsigned 0 1 bool 0").unwrap_err();
        assert!(matches!(err, LayoutError::BadFieldName { line: 1, .. }));

        let text = "field.a = unsigned 0 1 bool 0\nfield.a = unsigned 1 1 bool 1";
        let err = DeviceLayout::parse(text).unwrap_err();
        assert!(matches!(err, LayoutError::DuplicateField { line: 2, .. }));

        let err = DeviceLayout::parse("colour = blue").unwrap_err();
        assert!(matches!(err, LayoutError::UnknownKey { line: 1, .. }));
    }

    #[test]
    fn test_native_byte_order_keyword() {
        let layout = DeviceLayout::parse("name = n\nrecord_bits = 8\nbyte_order = native").unwrap();
        assert_eq!(layout.options.byte_order, ByteOrder::NATIVE);
    }

    #[test]
    fn test_load_and_save() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", POINTER).unwrap();
        let layout = DeviceLayout::load(file.path()).unwrap();
        assert_eq!(layout.fields.len(), 4);

        let out = NamedTempFile::new().unwrap();
        layout.save(out.path()).unwrap();
        assert_eq!(DeviceLayout::load(out.path()).unwrap(), layout);
    }

    #[test]
    fn test_load_missing_file() {
        let err = DeviceLayout::load(Path::new("/nonexistent/pointer.layout")).unwrap_err();
        assert!(matches!(err, LayoutError::Io { .. }));
    }
}
