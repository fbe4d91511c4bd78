#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use jetson_io::{DeviceTree, Error, PinMux, PropType, Result};

type Props = BTreeMap<String, Vec<String>>;
type Blob = BTreeMap<String, Props>;

/// A device-tree edit recorded by [`FakeDeviceTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Set {
        blob: PathBuf,
        node: String,
        kind: PropType,
        prop: String,
        value: String,
    },
    Remove {
        blob: PathBuf,
        node: String,
    },
    Overlay {
        base: PathBuf,
        out: PathBuf,
        overlays: Vec<PathBuf>,
    },
}

#[derive(Default)]
struct Inner {
    blobs: HashMap<PathBuf, Blob>,
    ops: Vec<Op>,
    fail_overlay: bool,
}

/// In-memory device trees keyed by blob path. Clones share state.
#[derive(Clone, Default)]
pub struct FakeDeviceTree {
    inner: Rc<RefCell<Inner>>,
}

fn ancestors(node: &str) -> Vec<String> {
    let mut paths = vec![String::from("/")];
    let mut path = String::from("/");
    for segment in node.split('/').filter(|s| !s.is_empty()) {
        path.push_str(segment);
        path.push('/');
        paths.push(path.clone());
    }
    paths
}

fn normalize(node: &str) -> String {
    ancestors(node).pop().unwrap_or_else(|| String::from("/"))
}

impl FakeDeviceTree {
    pub fn new() -> Self {
        FakeDeviceTree::default()
    }

    pub fn add_prop(&self, blob: &Path, node: &str, prop: &str, values: &[&str]) {
        let mut inner = self.inner.borrow_mut();
        let tree = inner.blobs.entry(blob.to_path_buf()).or_default();
        for path in ancestors(node) {
            tree.entry(path).or_default();
        }
        tree.entry(normalize(node))
            .or_default()
            .insert(prop.to_string(), values.iter().map(|v| v.to_string()).collect());
    }

    pub fn add_node(&self, blob: &Path, node: &str) {
        let mut inner = self.inner.borrow_mut();
        let tree = inner.blobs.entry(blob.to_path_buf()).or_default();
        for path in ancestors(node) {
            tree.entry(path).or_default();
        }
    }

    pub fn ops(&self) -> Vec<Op> {
        self.inner.borrow().ops.clone()
    }

    /// Makes `apply_overlay` leave a partial output behind and fail.
    pub fn fail_overlay(&self) {
        self.inner.borrow_mut().fail_overlay = true;
    }

    pub fn clear_ops(&self) {
        self.inner.borrow_mut().ops.clear();
    }

    fn blob(&self, blob: &Path) -> Result<Blob> {
        self.inner
            .borrow()
            .blobs
            .get(blob)
            .cloned()
            .ok_or_else(|| Error::ToolInvocation {
                command: format!("fdtget {}", blob.display()),
                message: String::from("FDT_ERR_BADMAGIC"),
            })
    }
}

impl DeviceTree for FakeDeviceTree {
    fn get_child_nodes(&self, blob: &Path, node: &str) -> Result<Vec<String>> {
        let node = normalize(node);
        let tree = self.blob(blob)?;
        Ok(tree
            .keys()
            .filter_map(|key| key.strip_prefix(node.as_str()))
            .filter_map(|rest| rest.strip_suffix('/'))
            .filter(|name| !name.is_empty() && !name.contains('/'))
            .map(String::from)
            .collect())
    }

    fn get_child_props(&self, blob: &Path, node: &str) -> Result<Vec<String>> {
        let tree = self.blob(blob)?;
        Ok(tree
            .get(&normalize(node))
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn get_prop_value(&self, blob: &Path, node: &str, prop: &str, index: usize) -> Result<Option<String>> {
        let inner = self.inner.borrow();
        Ok(inner
            .blobs
            .get(blob)
            .and_then(|tree| tree.get(&normalize(node)))
            .and_then(|props| props.get(prop))
            .and_then(|values| values.get(index))
            .cloned())
    }

    fn set_prop_value(&self, blob: &Path, node: &str, kind: PropType, prop: &str, value: &str) -> Result<()> {
        self.add_prop(blob, node, prop, &[value]);
        self.inner.borrow_mut().ops.push(Op::Set {
            blob: blob.to_path_buf(),
            node: node.to_string(),
            kind,
            prop: prop.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn remove_node(&self, blob: &Path, node: &str) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let prefix = normalize(node);
        if let Some(tree) = inner.blobs.get_mut(blob) {
            tree.retain(|key, _| !key.starts_with(&prefix));
        }
        inner.ops.push(Op::Remove {
            blob: blob.to_path_buf(),
            node: node.to_string(),
        });
        Ok(())
    }

    fn apply_overlay(&self, base: &Path, out: &Path, overlays: &[&Path]) -> Result<()> {
        fs::write(out, b"")?;
        if self.inner.borrow().fail_overlay {
            return Err(Error::ToolInvocation {
                command: format!("fdtoverlay -i {} -o {}", base.display(), out.display()),
                message: String::from("FDT_ERR_NOTFOUND"),
            });
        }
        self.inner.borrow_mut().ops.push(Op::Overlay {
            base: base.to_path_buf(),
            out: out.to_path_buf(),
            overlays: overlays.iter().map(|p| p.to_path_buf()).collect(),
        });
        Ok(())
    }
}

struct PinState {
    function: String,
    enabled: bool,
    functions: Vec<String>,
}

/// Pin-mux state served from a table.
#[derive(Default)]
pub struct FakePinMux {
    pins: HashMap<String, PinState>,
}

impl FakePinMux {
    pub fn new() -> Self {
        FakePinMux::default()
    }

    pub fn pin(mut self, name: &str, function: &str, enabled: bool, functions: &[&str]) -> Self {
        self.pins.insert(
            name.to_string(),
            PinState {
                function: function.to_string(),
                enabled,
                functions: functions.iter().map(|f| f.to_string()).collect(),
            },
        );
        self
    }

    fn state(&self, pin: &str) -> Result<&PinState> {
        self.pins
            .get(pin)
            .ok_or_else(|| Error::PinMux(format!("Function for pin {} not found!", pin)))
    }
}

impl PinMux for FakePinMux {
    fn get_current_function(&self, pin: &str) -> Result<String> {
        Ok(self.state(pin)?.function.clone())
    }

    fn get_available_functions(&self, pin: &str) -> Result<Vec<String>> {
        let mut functions = self.state(pin)?.functions.clone();
        functions.sort();
        Ok(functions)
    }

    fn is_enabled(&self, pin: &str) -> Result<bool> {
        Ok(self.state(pin)?.enabled)
    }
}

/// Overlay node of header position `index`.
pub fn pin_node(index: usize) -> String {
    format!("/fragment@0/__overlay__/header-40pin-pinmux/pin{}/", index)
}

/// Header pins used across the tests: (index, name, current function,
/// enabled, available functions).
pub static PINS: [(usize, &str, &str, bool, &[&str]); 10] = [
    (7, "aud_mclk_ps4", "aud", true, &["aud", "gp", "rsvd2"]),
    (8, "uart2_tx_px4", "rsvd0", false, &["rsvd0", "uart"]),
    (10, "uart2_rx_px5", "rsvd0", false, &["rsvd0", "uart"]),
    (11, "uart1_rts_pr4", "rsvd0", false, &["rsvd0", "uart1"]),
    (12, "soc_gpio12_pt0", "gp", true, &["gp", "pwm"]),
    (19, "spi1_mosi_pz5", "rsvd1", false, &["rsvd1", "spi"]),
    (21, "spi1_miso_pz4", "rsvd1", false, &["i2s", "rsvd1", "spi"]),
    (23, "spi1_sck_pz3", "rsvd1", false, &["rsvd1", "spi"]),
    (24, "spi1_cs0_pz6", "rsvd1", false, &["rsvd1", "spi"]),
    (36, "uart1_cts_pr5", "rsvd0", false, &["rsvd0", "uart1"]),
];

pub static BOARD_DATA: &str = r#"
pins = [{ index = 3, name = "i2c8_dat" }]

[pingroups]
aud_mclk = "aud"
i2s1 = "i2s"
pwm0 = "pwm"
spi1 = "spi"
uart1 = "uart1"
uart2 = "uart"
"#;

pub fn pinmux() -> FakePinMux {
    PINS.iter().fold(FakePinMux::new(), |pinmux, (_, name, function, enabled, functions)| {
        pinmux.pin(name, function, *enabled, functions)
    })
}

/// Registers the header overlay nodes of [`PINS`] in `dtbo`.
pub fn add_header_nodes(dt: &FakeDeviceTree, dtbo: &Path) {
    for (index, name, ..) in PINS.iter() {
        dt.add_prop(dtbo, &pin_node(*index), "nvidia,pins", &[*name]);
    }
}
