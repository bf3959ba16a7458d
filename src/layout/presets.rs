//! Built-in device layouts
//!
//! The mouse layout is available both as a [`StaticLayout`] with hand
//! written field reads and as a descriptor list; the gamepad layout is
//! descriptor driven only. The `*State` structs mirror the raw records and
//! encode them the way a device backend would.

use std::mem::size_of;

use memoffset::offset_of;

use super::file::{DeviceLayout, NamedField};
use crate::demux::bits;
use crate::demux::engine::StaticLayout;
use crate::demux::store::ColumnSliceMut;
use crate::demux::types::{DestinationEncoding, FieldDescriptor, SourceEncoding, BITS_PER_BYTE};
use crate::error::{ExtractionError, RecordError};

/// Raw mouse record
///
/// Button bits are numbered from the least significant bit of the first
/// button byte: left, right, middle, forward, back.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MouseState {
    pub position: [f32; 2],
    pub delta: [f32; 2],
    pub scroll: [f32; 2],
    pub buttons: u16,
    pub display_index: u16,
}

const _: () = assert!(size_of::<MouseState>() == 28);

/// Mouse buttons in bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left = 0,
    Right = 1,
    Middle = 2,
    Forward = 3,
    Back = 4,
}

impl MouseState {
    pub const RECORD_BYTES: usize = size_of::<MouseState>();
    pub const RECORD_BITS: u32 = (Self::RECORD_BYTES as u32) * BITS_PER_BYTE;

    pub fn with_button(mut self, button: MouseButton, pressed: bool) -> Self {
        let mask = 1u16 << button as u16;
        if pressed {
            self.buttons |= mask;
        } else {
            self.buttons &= !mask;
        }
        self
    }

    /// Encode into `record`, which must be exactly one record long
    pub fn write_to(&self, record: &mut [u8]) -> Result<(), RecordError> {
        if record.len() != Self::RECORD_BYTES {
            return Err(RecordError::SizeMismatch {
                expected: Self::RECORD_BYTES,
                actual: record.len(),
            });
        }
        let floats = [
            (offset_of!(MouseState, position), self.position),
            (offset_of!(MouseState, delta), self.delta),
            (offset_of!(MouseState, scroll), self.scroll),
        ];
        for (at, [x, y]) in floats {
            record[at..at + 4].copy_from_slice(&x.to_ne_bytes());
            record[at + 4..at + 8].copy_from_slice(&y.to_ne_bytes());
        }
        let at = offset_of!(MouseState, buttons);
        record[at..at + 2].copy_from_slice(&self.buttons.to_le_bytes());
        let at = offset_of!(MouseState, display_index);
        record[at..at + 2].copy_from_slice(&self.display_index.to_ne_bytes());
        Ok(())
    }
}

fn bit_of(byte_offset: usize) -> u32 {
    byte_offset as u32 * BITS_PER_BYTE
}

/// Named fields of the mouse layout, in slot order
pub fn mouse_fields() -> Vec<NamedField> {
    let position = bit_of(offset_of!(MouseState, position));
    let delta = bit_of(offset_of!(MouseState, delta));
    let scroll = bit_of(offset_of!(MouseState, scroll));
    let buttons = bit_of(offset_of!(MouseState, buttons));

    let fields = [
        ("position_x", FieldDescriptor::float32(position, 0).with_hot(true)),
        ("position_y", FieldDescriptor::float32(position + 32, 1).with_hot(true)),
        ("delta_x", FieldDescriptor::float32(delta, 2).with_hot(true)),
        ("delta_y", FieldDescriptor::float32(delta + 32, 3).with_hot(true)),
        ("scroll_x", FieldDescriptor::float32(scroll, 4)),
        ("scroll_y", FieldDescriptor::float32(scroll + 32, 5)),
        ("left_button", FieldDescriptor::flag(buttons + MouseButton::Left as u32, 6)),
        ("right_button", FieldDescriptor::flag(buttons + MouseButton::Right as u32, 7)),
        ("middle_button", FieldDescriptor::flag(buttons + MouseButton::Middle as u32, 8)),
        ("forward_button", FieldDescriptor::flag(buttons + MouseButton::Forward as u32, 9)),
        ("back_button", FieldDescriptor::flag(buttons + MouseButton::Back as u32, 10)),
    ];
    fields
        .into_iter()
        .map(|(name, descriptor)| NamedField {
            name: name.to_string(),
            descriptor,
        })
        .collect()
}

/// The mouse layout as a [`DeviceLayout`]
pub fn mouse_layout() -> DeviceLayout {
    DeviceLayout {
        fields: mouse_fields(),
        ..DeviceLayout::new("mouse", MouseState::RECORD_BITS)
    }
}

/// Mouse layout with every field read written out
pub enum MouseLayout {}

impl MouseLayout {
    pub const POSITION_X: usize = 0;
    pub const POSITION_Y: usize = 1;
    pub const DELTA_X: usize = 2;
    pub const DELTA_Y: usize = 3;
    pub const SCROLL_X: usize = 4;
    pub const SCROLL_Y: usize = 5;
    pub const LEFT_BUTTON: usize = 6;
    pub const RIGHT_BUTTON: usize = 7;
    pub const MIDDLE_BUTTON: usize = 8;
    pub const FORWARD_BUTTON: usize = 9;
    pub const BACK_BUTTON: usize = 10;
}

impl StaticLayout for MouseLayout {
    const NAME: &'static str = "mouse";
    const RECORD_BITS: u32 = MouseState::RECORD_BITS;

    fn descriptors() -> Vec<FieldDescriptor> {
        mouse_fields().into_iter().map(|f| f.descriptor).collect()
    }

    fn demux_chunk(
        records: &[u8],
        columns: &mut [ColumnSliceMut<'_>],
    ) -> Result<(), ExtractionError> {
        let [
            ColumnSliceMut::Float(position_x),
            ColumnSliceMut::Float(position_y),
            ColumnSliceMut::Float(delta_x),
            ColumnSliceMut::Float(delta_y),
            ColumnSliceMut::Float(scroll_x),
            ColumnSliceMut::Float(scroll_y),
            ColumnSliceMut::Bool(left),
            ColumnSliceMut::Bool(right),
            ColumnSliceMut::Bool(middle),
            ColumnSliceMut::Bool(forward),
            ColumnSliceMut::Bool(back),
        ] = columns
        else {
            return Err(ExtractionError::LayoutMismatch { layout: Self::NAME });
        };

        let position = offset_of!(MouseState, position);
        let delta = offset_of!(MouseState, delta);
        let scroll = offset_of!(MouseState, scroll);
        let buttons = offset_of!(MouseState, buttons);

        for (i, record) in records.chunks_exact(MouseState::RECORD_BYTES).enumerate() {
            position_x[i] = f32::from_ne_bytes(bits::quad(record, position));
            position_y[i] = f32::from_ne_bytes(bits::quad(record, position + 4));
            delta_x[i] = f32::from_ne_bytes(bits::quad(record, delta));
            delta_y[i] = f32::from_ne_bytes(bits::quad(record, delta + 4));
            scroll_x[i] = f32::from_ne_bytes(bits::quad(record, scroll));
            scroll_y[i] = f32::from_ne_bytes(bits::quad(record, scroll + 4));

            let pressed = record[buttons];
            left.set(i, pressed & (1 << MouseButton::Left as u8) != 0);
            right.set(i, pressed & (1 << MouseButton::Right as u8) != 0);
            middle.set(i, pressed & (1 << MouseButton::Middle as u8) != 0);
            forward.set(i, pressed & (1 << MouseButton::Forward as u8) != 0);
            back.set(i, pressed & (1 << MouseButton::Back as u8) != 0);
        }
        Ok(())
    }
}

/// Raw XInput-style gamepad record
///
/// Button bits are numbered from the least significant bit of `buttons`
/// as stored little-endian; see [`GAMEPAD_BUTTONS`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GamepadState {
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub left_stick: [i16; 2],
    pub right_stick: [i16; 2],
}

const _: () = assert!(size_of::<GamepadState>() == 12);

/// Gamepad button names and their bit within the button word
pub const GAMEPAD_BUTTONS: [(&str, u32); 14] = [
    ("dpad_up", 0),
    ("dpad_down", 1),
    ("dpad_left", 2),
    ("dpad_right", 3),
    ("start", 4),
    ("select", 5),
    ("left_thumb", 6),
    ("right_thumb", 7),
    ("left_shoulder", 8),
    ("right_shoulder", 9),
    ("a", 12),
    ("b", 13),
    ("x", 14),
    ("y", 15),
];

impl GamepadState {
    pub const RECORD_BYTES: usize = size_of::<GamepadState>();
    pub const RECORD_BITS: u32 = (Self::RECORD_BYTES as u32) * BITS_PER_BYTE;

    /// Set or clear the button called `name`; false if no such button
    pub fn set_button(&mut self, name: &str, pressed: bool) -> bool {
        let Some(&(_, bit)) = GAMEPAD_BUTTONS.iter().find(|(n, _)| *n == name) else {
            return false;
        };
        if pressed {
            self.buttons |= 1 << bit;
        } else {
            self.buttons &= !(1 << bit);
        }
        true
    }

    /// Encode into `record`, which must be exactly one record long
    pub fn write_to(&self, record: &mut [u8]) -> Result<(), RecordError> {
        if record.len() != Self::RECORD_BYTES {
            return Err(RecordError::SizeMismatch {
                expected: Self::RECORD_BYTES,
                actual: record.len(),
            });
        }
        let at = offset_of!(GamepadState, buttons);
        record[at..at + 2].copy_from_slice(&self.buttons.to_le_bytes());
        record[offset_of!(GamepadState, left_trigger)] = self.left_trigger;
        record[offset_of!(GamepadState, right_trigger)] = self.right_trigger;
        let sticks = [
            (offset_of!(GamepadState, left_stick), self.left_stick),
            (offset_of!(GamepadState, right_stick), self.right_stick),
        ];
        for (at, [x, y]) in sticks {
            record[at..at + 2].copy_from_slice(&x.to_ne_bytes());
            record[at + 2..at + 4].copy_from_slice(&y.to_ne_bytes());
        }
        Ok(())
    }
}

/// Named fields of the gamepad layout, in slot order
pub fn gamepad_fields() -> Vec<NamedField> {
    let buttons = bit_of(offset_of!(GamepadState, buttons));
    let mut fields: Vec<NamedField> = GAMEPAD_BUTTONS
        .iter()
        .enumerate()
        .map(|(slot, &(name, bit))| NamedField {
            name: name.to_string(),
            descriptor: FieldDescriptor::flag(buttons + bit, slot as u32),
        })
        .collect();

    let trigger = |name: &str, byte_offset: usize, slot: usize| NamedField {
        name: name.to_string(),
        descriptor: FieldDescriptor::new(
            bit_of(byte_offset),
            8,
            SourceEncoding::UnsignedBits,
            DestinationEncoding::Float,
            slot as u32,
        ),
    };
    let axis = |name: &str, byte_offset: usize, slot: usize| NamedField {
        name: name.to_string(),
        descriptor: FieldDescriptor::new(
            bit_of(byte_offset),
            16,
            SourceEncoding::TwosComplementSignedBits,
            DestinationEncoding::Float,
            slot as u32,
        )
        .with_hot(true),
    };

    let base = fields.len();
    let left_stick = offset_of!(GamepadState, left_stick);
    let right_stick = offset_of!(GamepadState, right_stick);
    fields.extend([
        trigger("left_trigger", offset_of!(GamepadState, left_trigger), base),
        trigger("right_trigger", offset_of!(GamepadState, right_trigger), base + 1),
        axis("left_stick_x", left_stick, base + 2),
        axis("left_stick_y", left_stick + 2, base + 3),
        axis("right_stick_x", right_stick, base + 4),
        axis("right_stick_y", right_stick + 2, base + 5),
    ]);
    fields
}

/// The gamepad layout as a [`DeviceLayout`]
pub fn gamepad_layout() -> DeviceLayout {
    DeviceLayout {
        fields: gamepad_fields(),
        ..DeviceLayout::new("gamepad", GamepadState::RECORD_BITS)
    }
}

/// Built-in layout by name
pub fn preset(name: &str) -> Option<DeviceLayout> {
    match name {
        "mouse" => Some(mouse_layout()),
        "gamepad" => Some(gamepad_layout()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::engine::{run, run_with, DemuxStrategy, StaticDemuxer};
    use crate::demux::store::OutputStore;
    use crate::demux::types::ColumnKind;

    #[test]
    fn test_mouse_layout_geometry() {
        let layout = mouse_layout();
        assert_eq!(layout.record_bits, 224);
        let descriptors = layout.descriptors();
        let floats: Vec<u32> = descriptors[..6].iter().map(|d| d.bit_offset).collect();
        assert_eq!(floats, vec![0, 32, 64, 96, 128, 160]);
        let flags: Vec<u32> = descriptors[6..].iter().map(|d| d.bit_offset).collect();
        assert_eq!(flags, vec![192, 193, 194, 195, 196]);
        assert_eq!(layout.slot_of("middle_button"), Some(MouseLayout::MIDDLE_BUTTON as u32));
        assert!(layout.build_table().is_ok());
    }

    #[test]
    fn test_mouse_state_encoding() {
        let state = MouseState {
            position: [1.0, 2.0],
            scroll: [0.0, -3.5],
            display_index: 2,
            ..MouseState::default()
        }
        .with_button(MouseButton::Middle, true)
        .with_button(MouseButton::Back, true);

        let mut record = [0u8; MouseState::RECORD_BYTES];
        state.write_to(&mut record).unwrap();
        assert_eq!(record[24], 0b1_0100);
        assert_eq!(&record[4..8], &2.0f32.to_ne_bytes());
        assert!(state.write_to(&mut record[..27]).is_err());
    }

    #[test]
    fn test_static_mouse_matches_table() {
        let demuxer = StaticDemuxer::<MouseLayout>::new().unwrap();
        let mut records = vec![0u8; MouseState::RECORD_BYTES * 130];
        for (i, record) in records.chunks_exact_mut(MouseState::RECORD_BYTES).enumerate() {
            MouseState {
                position: [i as f32, -(i as f32)],
                delta: [0.25, i as f32 * 0.5],
                scroll: [1.0, 0.0],
                buttons: (i % 32) as u16,
                display_index: 0,
            }
            .write_to(record)
            .unwrap();
        }

        let mut fixed = OutputStore::allocate(demuxer.table(), 130);
        run_with(&demuxer, &records, 130, &mut fixed).unwrap();
        let mut dynamic = OutputStore::allocate(demuxer.table(), 130);
        run(demuxer.table(), &records, 130, &mut dynamic).unwrap();

        assert!(fixed.bit_identical(&dynamic));
        assert_eq!(fixed.floats(MouseLayout::POSITION_Y).unwrap()[7], -7.0);
        assert_eq!(fixed.bools(MouseLayout::FORWARD_BUTTON).unwrap().get(8), Some(true));
        assert_eq!(fixed.bools(MouseLayout::LEFT_BUTTON).unwrap().get(8), Some(false));
    }

    #[test]
    fn test_static_mouse_rejects_wrong_columns() {
        let mut store = OutputStore::with_columns(&[ColumnKind::Float; 11], 1);
        let mut columns = store.slices_mut(1);
        assert_eq!(
            MouseLayout::demux_chunk(&[0; 28], &mut columns),
            Err(ExtractionError::LayoutMismatch { layout: "mouse" })
        );
    }

    #[test]
    fn test_gamepad_layout() {
        let layout = gamepad_layout();
        assert_eq!(layout.record_bits, 96);
        assert_eq!(layout.fields.len(), 20);
        let table = layout.build_table().unwrap();

        let mut state = GamepadState {
            left_trigger: 200,
            left_stick: [-32768, 12345],
            right_stick: [0, -1],
            ..GamepadState::default()
        };
        assert!(state.set_button("a", true));
        assert!(state.set_button("dpad_left", true));
        assert!(!state.set_button("turbo", true));

        let mut record = [0u8; GamepadState::RECORD_BYTES];
        state.write_to(&mut record).unwrap();
        let mut out = OutputStore::allocate(&table, 1);
        run(&table, &record, 1, &mut out).unwrap();

        let slot = |name: &str| layout.slot_of(name).unwrap() as usize;
        assert_eq!(out.bools(slot("a")).unwrap().get(0), Some(true));
        assert_eq!(out.bools(slot("b")).unwrap().get(0), Some(false));
        assert_eq!(out.bools(slot("dpad_left")).unwrap().get(0), Some(true));
        assert_eq!(out.floats(slot("left_trigger")).unwrap()[0], 200.0);
        assert_eq!(out.floats(slot("right_trigger")).unwrap()[0], 0.0);
        assert_eq!(out.floats(slot("left_stick_x")).unwrap()[0], -32768.0);
        assert_eq!(out.floats(slot("left_stick_y")).unwrap()[0], 12345.0);
        assert_eq!(out.floats(slot("right_stick_y")).unwrap()[0], -1.0);
    }

    #[test]
    fn test_preset_lookup() {
        assert_eq!(preset("mouse").map(|l| l.fields.len()), Some(11));
        assert!(preset("gamepad").is_some());
        assert!(preset("wheel").is_none());
    }
}
