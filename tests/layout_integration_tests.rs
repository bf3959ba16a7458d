//! Layout files and presets driving real batches

use std::io::Write;

use input_demux::config::{select_layout, CheckOptions};
use input_demux::demux::{run, run_parallel, DynamicDemuxer, OutputStore, RecordBuffer};
use input_demux::layout::{
    gamepad_layout, mouse_layout, preset, DeviceLayout, GamepadState, LayoutError,
};
use rstest::rstest;
use tempfile::TempDir;

#[rstest]
#[case("mouse")]
#[case("gamepad")]
fn test_preset_survives_save_and_load(#[case] name: &str) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(format!("{}.layout", name));

    let layout = preset(name).unwrap();
    layout.save(&path).unwrap();
    let loaded = DeviceLayout::load(&path).unwrap();
    assert_eq!(loaded, layout);

    let table = loaded.build_table().unwrap();
    assert_eq!(table.len(), layout.fields.len());
    assert_eq!(table.record_bits(), layout.record_bits);
}

#[test]
fn test_gamepad_batch_from_saved_layout() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pad.layout");
    gamepad_layout().save(&path).unwrap();

    let options = CheckOptions {
        layout_file: Some(path),
        ..Default::default()
    };
    let (layout, table) = select_layout(&options).unwrap();

    let count = 300;
    let mut records = RecordBuffer::zeroed(table.record_bytes(), count);
    for i in 0..count {
        let mut state = GamepadState {
            left_trigger: (i % 256) as u8,
            left_stick: [-(i as i16), i as i16],
            ..Default::default()
        };
        state.set_button("a", i % 3 == 0);
        state.set_button("dpad_left", i == 7);
        state.write_to(records.record_mut(i).unwrap()).unwrap();
    }

    let mut out = OutputStore::allocate(&table, count);
    run(&table, records.as_bytes(), count, &mut out).unwrap();

    let slot = |name: &str| layout.slot_of(name).unwrap() as usize;
    assert_eq!(out.bools(slot("a")).unwrap().count_ones(), 100);
    assert_eq!(out.bools(slot("dpad_left")).unwrap().get(7), Some(true));
    assert_eq!(out.bools(slot("dpad_left")).unwrap().count_ones(), 1);
    assert_eq!(out.floats(slot("left_trigger")).unwrap()[299], 43.0);
    assert_eq!(out.floats(slot("left_stick_x")).unwrap()[250], -250.0);
    assert_eq!(out.floats(slot("left_stick_y")).unwrap()[250], 250.0);
    assert_eq!(out.floats(slot("right_stick_x")).unwrap()[250], 0.0);

    let mut split = OutputStore::allocate(&table, count);
    run_parallel(&DynamicDemuxer::new(&table), records.as_bytes(), count, &mut split, 4).unwrap();
    assert!(out.bit_identical(&split));
}

#[test]
fn test_hand_written_layout_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "# twelve-bit dial with a push switch\n\
         name = dial\n\
         record_bits = 16\n\
         byte_order = little\n\
         \n\
         field.angle = twos_complement 0 12 int 0 hot\n\
         field.pressed = unsigned 12 1 bool 1\n"
    )
    .unwrap();

    let layout = DeviceLayout::load(file.path()).unwrap();
    assert_eq!(layout.name, "dial");
    assert_eq!(layout.name_of(1), Some("pressed"));
    assert!(layout.fields[0].descriptor.hot);

    let table = layout.build_table().unwrap();
    // angle = -1 (0xFFF), pressed = 1
    let records = RecordBuffer::from_bytes(vec![0xFF, 0x1F, 0x05, 0x00], 2).unwrap();
    let mut out = OutputStore::allocate(&table, 2);
    run(&table, records.as_bytes(), 2, &mut out).unwrap();
    assert_eq!(out.ints(0).unwrap(), &[-1, 5]);
    assert_eq!(out.bools(1).unwrap().get(0), Some(true));
    assert_eq!(out.bools(1).unwrap().get(1), Some(false));
}

#[test]
fn test_layout_errors() {
    let missing = DeviceLayout::load(std::path::Path::new("/nonexistent/dir/x.layout"));
    assert!(matches!(missing, Err(LayoutError::Io { .. })));

    let invalid = mouse_layout()
        .field("overflow", input_demux::demux::FieldDescriptor::flag(224, 11));
    assert!(invalid.build_table().is_err());
}
