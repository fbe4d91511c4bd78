mod common;

use std::path::Path;

use common::{add_header_nodes, pin_node, pinmux, FakeDeviceTree, Op, BOARD_DATA, PINS};
use jetson_io::{BoardData, Error, Header, PropType};

static DTBO: &str = "/boot/tegra194-p3668-all-p3509-0000-hdr40.dtbo";

fn header() -> Header {
    let dt = FakeDeviceTree::new();
    add_header_nodes(&dt, Path::new(DTBO));
    let data = BoardData::parse(Path::new("board.toml"), BOARD_DATA).unwrap();
    Header::new(&dt, Path::new(DTBO), &pinmux(), &data).unwrap()
}

fn name(index: usize) -> &'static str {
    PINS.iter().find(|p| p.0 == index).map(|p| p.1).unwrap()
}

fn function(header: &Header, index: usize) -> String {
    header.pin_get_function(name(index)).unwrap().to_string()
}

#[test]
fn test_header_is_built_from_overlay() {
    let header = header();
    assert_eq!(header.pin_count(), 40);
    assert_eq!(header.pins().names().len(), PINS.len());
    assert_eq!(header.pin_get_node(name(19)).unwrap(), pin_node(19));
    assert_eq!(
        header.pingroups_available(),
        vec!["aud_mclk", "i2s1", "pwm0", "spi1", "uart1", "uart2"]
    );
    assert_eq!(header.pingroup_get_pins("spi1").unwrap(), "19,21,23,24");
    assert_eq!(header.pingroup_get_pins("uart1").unwrap(), "11,36");
}

#[test]
fn test_fresh_header_is_default() {
    let mut header = header();
    assert!(header.pins_are_default());

    header.pingroup_enable("spi1").unwrap();
    header.pins_reset().unwrap();
    assert!(!header.pins_are_default());

    header.pins_set_default();
    assert!(header.pins_are_default());
    assert_eq!(function(&header, 7), "aud");
    assert_eq!(function(&header, 19), "rsvd1");
}

#[test]
fn test_enable_spi_disables_i2s_on_shared_pin() {
    let mut header = header();

    header.pingroup_enable("i2s1").unwrap();
    assert!(header.pingroup_is_enabled("i2s1").unwrap());
    assert_eq!(function(&header, 21), "i2s");

    header.pingroup_enable("spi1").unwrap();
    assert!(header.pingroup_is_enabled("spi1").unwrap());
    assert!(!header.pingroup_is_enabled("i2s1").unwrap());
    for index in [19, 21, 23, 24] {
        assert_eq!(function(&header, index), "spi");
        assert!(header.pin_is_enabled(name(index)).unwrap());
    }

    header.pingroup_enable("i2s1").unwrap();
    assert!(header.pingroup_is_enabled("i2s1").unwrap());
    assert!(!header.pingroup_is_enabled("spi1").unwrap());
    for index in [19, 23, 24] {
        assert_eq!(function(&header, index), "rsvd1");
        assert!(!header.pin_is_enabled(name(index)).unwrap());
    }
}

#[test]
fn test_enable_group_twice_is_stable() {
    let mut header = header();
    header.pingroup_enable("spi1").unwrap();
    header.pingroup_enable("spi1").unwrap();
    assert!(header.pingroup_is_enabled("spi1").unwrap());
}

#[test]
fn test_unknown_group() {
    let mut header = header();
    assert!(matches!(
        header.pingroup_enable("spi9"),
        Err(Error::UnsupportedGroup(_))
    ));
    assert!(header.pingroup_is_enabled("spi9").is_err());
}

#[test]
fn test_always_enabled_pins_survive_group_disable() {
    let mut header = header();

    header.pingroup_enable("uart2").unwrap();
    assert!(header.pingroup_is_enabled("uart2").unwrap());
    assert!(!header.pins_are_default());

    // pins 8 and 10 can't be disabled, only reverted
    header.pingroup_disable("uart2").unwrap();
    assert!(header.pingroup_is_enabled("uart2").unwrap());
    header.pins_reset().unwrap();
    assert_eq!(function(&header, 8), "uart");

    header.pins_set_default();
    assert!(!header.pingroup_is_enabled("uart2").unwrap());
    assert!(header.pins_are_default());
}

#[test]
fn test_group_disable_reverts_to_default() {
    let mut header = header();

    header.pingroup_enable("uart1").unwrap();
    assert!(header.pingroup_is_enabled("uart1").unwrap());
    assert!(header.pin_is_enabled(name(11)).unwrap());

    header.pingroup_disable("uart1").unwrap();
    assert!(!header.pingroup_is_enabled("uart1").unwrap());
    assert!(!header.pin_is_enabled(name(36)).unwrap());
    assert!(header.pins_are_default());
}

#[test]
fn test_set_function_on_every_pin() {
    let mut header = header();

    for (index, name, _, _, functions) in PINS.iter() {
        for f in functions.iter() {
            header.pin_set_function(*index, f).unwrap();
            assert_eq!(header.pin_get_function(name).unwrap(), *f);
        }
    }

    let before = function(&header, 12);
    assert!(matches!(
        header.pin_set_function(12, "spi"),
        Err(Error::InvalidFunction { .. })
    ));
    assert_eq!(function(&header, 12), before);

    assert!(header.pin_set_function(1, "gp").is_err());
    assert!(header.pin_set_function(41, "gp").is_err());
}

#[test]
fn test_pin_labels() {
    let mut header = header();

    assert_eq!(header.pin_get_label(1).unwrap(), "3.3V");
    assert_eq!(header.pin_get_label(6).unwrap(), "GND");
    assert_eq!(header.pin_get_label(3).unwrap(), "i2c8_dat");
    assert_eq!(header.pin_get_label(13).unwrap(), "unused");
    assert_eq!(header.pin_get_label(7).unwrap(), "aud");
    assert_eq!(header.pin_get_label(12).unwrap(), "gp");
    assert_eq!(header.pin_get_label(19).unwrap(), "unused");

    header.pingroup_enable("spi1").unwrap();
    assert_eq!(header.pin_get_label(19).unwrap(), "spi1");
    assert_eq!(header.pin_get_label(21).unwrap(), "spi1");

    header.pingroup_enable("i2s1").unwrap();
    assert_eq!(header.pin_get_label(21).unwrap(), "i2s");
    assert_eq!(header.pin_get_label(19).unwrap(), "unused");

    header.pingroup_enable("pwm0").unwrap();
    assert_eq!(header.pin_get_label(12).unwrap(), "pwm");

    assert!(matches!(header.pin_get_label(0), Err(Error::InvalidIndex(0))));
}

#[test]
fn test_overlay_for_default_header_removes_nodes() {
    let header = header();
    let dt = FakeDeviceTree::new();
    let out = Path::new("/tmp/out.dtbo");

    header.write_overlay(&dt, out).unwrap();

    let ops = dt.ops();
    assert_eq!(ops.len(), 2 + 8);
    assert!(ops.contains(&Op::Remove {
        blob: out.to_path_buf(),
        node: pin_node(19),
    }));
    assert!(ops.contains(&Op::Set {
        blob: out.to_path_buf(),
        node: pin_node(7),
        kind: PropType::String,
        prop: String::from("nvidia,function"),
        value: String::from("aud"),
    }));
}

#[test]
fn test_overlay_tristates_disabled_pins() {
    let mut header = header();
    header.pins_reset().unwrap();
    header.pingroup_enable("spi1").unwrap();

    let dt = FakeDeviceTree::new();
    let out = Path::new("/tmp/out.dtbo");
    header.write_overlay(&dt, out).unwrap();

    let set = |index: usize, kind: PropType, prop: &str, value: &str| Op::Set {
        blob: out.to_path_buf(),
        node: pin_node(index),
        kind,
        prop: prop.to_string(),
        value: value.to_string(),
    };
    let ops = dt.ops();

    // header order: 7, 8, 10, 11, 12, 19, ...
    assert_eq!(
        &ops[..3],
        &[
            set(7, PropType::String, "nvidia,function", "rsvd2"),
            set(7, PropType::U32, "nvidia,tristate", "1"),
            set(7, PropType::U32, "nvidia,enable-input", "0"),
        ]
    );
    assert!(ops.contains(&Op::Remove {
        blob: out.to_path_buf(),
        node: pin_node(8),
    }));
    assert!(ops.contains(&set(12, PropType::String, "nvidia,function", "gp")));
    assert!(ops.contains(&set(12, PropType::U32, "nvidia,tristate", "1")));
    for index in [19, 21, 23, 24] {
        assert!(ops.contains(&set(index, PropType::String, "nvidia,function", "spi")));
        assert!(!ops.contains(&set(index, PropType::U32, "nvidia,tristate", "1")));
    }
}

#[test]
fn test_overlay_is_idempotent() {
    let mut header = header();
    header.pingroup_enable("spi1").unwrap();

    let dt = FakeDeviceTree::new();
    let out = Path::new("/tmp/out.dtbo");
    header.write_overlay(&dt, out).unwrap();
    let first = dt.ops();
    dt.clear_ops();
    header.write_overlay(&dt, out).unwrap();

    assert_eq!(first, dt.ops());
}

#[test]
fn test_pin_listed_twice_is_rejected() {
    let dt = FakeDeviceTree::new();
    let dtbo = Path::new(DTBO);
    add_header_nodes(&dt, dtbo);
    dt.add_prop(dtbo, &pin_node(13), "nvidia,pins", &[name(19)]);

    let data = BoardData::parse(Path::new("board.toml"), BOARD_DATA).unwrap();
    assert!(matches!(
        Header::new(&dt, dtbo, &pinmux(), &data),
        Err(Error::DuplicateSlot(_))
    ));
}
