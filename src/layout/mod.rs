// mod.rs - Device layouts

//! Device layouts: layout files and the built-in presets.
//!
//! - `propfile` - `key = value` scanner
//! - `file` - [`DeviceLayout`] parsing, saving and table building
//! - `presets` - mouse and gamepad layouts

pub mod file;
pub mod presets;
pub mod propfile;

pub use file::{DeviceLayout, LayoutError, NamedField};
pub use presets::{
    gamepad_layout, mouse_layout, preset, GamepadState, MouseButton, MouseLayout, MouseState,
};
