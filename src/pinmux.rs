use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::error::{Error, Result};

/// Source of the pin-mux state of the running platform.
///
/// Pins are identified by their pin-mux group name (e.g. `dap5_sclk_pt5`).
pub trait PinMux {
    /// Returns the function currently configured for `pin`.
    fn get_current_function(&self, pin: &str) -> Result<String>;

    /// Returns all the functions `pin` can be assigned, sorted.
    fn get_available_functions(&self, pin: &str) -> Result<Vec<String>>;

    /// Returns `true` if `pin` is not tristated or has its input enabled.
    fn is_enabled(&self, pin: &str) -> Result<bool>;
}

/// Pin configuration as reported by the pin controller.
///
/// The fields are:
/// * `function`: Currently selected function
/// * `tristate`: Output driver is disabled
/// * `input_enabled`: Input receiver is enabled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinConfig {
    pub function: String,
    pub tristate: bool,
    pub input_enabled: bool,
}

/// Parses the `pinconf-groups` dump of the pin controller.
///
/// The dump holds one block per group:
///
/// ```text
/// 0 (dap1_sclk_ps0):
///     tristate=0
///     enable-input=1
///     func=i2s1
/// ```
///
/// Groups are numbered in order; a header that doesn't carry the expected
/// number is not the start of a new group. Some kernels print a trailing
/// space after the colon.
pub fn parse_pinconf_groups(dump: &str) -> HashMap<String, PinConfig> {
    let mut conf = HashMap::new();
    let mut index = 0;
    let mut name: Option<String> = None;
    let mut function: Option<String> = None;
    let mut tristate: Option<bool> = None;
    let mut input_enabled: Option<bool> = None;

    for line in dump.lines() {
        let prefix = format!("{} (", index);
        if let Some(rest) = line.strip_prefix(&prefix) {
            // anything after the colon (e.g. a trailing space) is ignored
            if let Some((group, _)) = rest.split_once("):") {
                name = Some(group.to_string());
                function = None;
                tristate = None;
                input_enabled = None;
                index += 1;
                continue;
            }
        }

        if name.is_none() {
            continue;
        }

        let line = line.trim();
        if let Some(value) = line.strip_prefix("tristate=") {
            tristate = Some(value == "1");
        } else if let Some(value) = line.strip_prefix("enable-input=") {
            input_enabled = Some(value == "1");
        } else if let Some(value) = line.strip_prefix("func=") {
            function = Some(value.to_string());
        }

        if let (Some(f), Some(t), Some(i)) = (&function, tristate, input_enabled) {
            if let Some(group) = name.take() {
                conf.insert(
                    group,
                    PinConfig {
                        function: f.clone(),
                        tristate: t,
                        input_enabled: i,
                    },
                );
            }
        }
    }

    conf
}

/// Parses the `pinmux-functions` listing of the pin controller into a map
/// from pin to the sorted list of functions that pin supports.
///
/// Each line looks like:
///
/// ```text
/// function: spi1, groups = [ spi1_sck_pz3 spi1_miso_pz4 ]
/// ```
///
/// Lines in any other format are skipped.
pub fn parse_pinmux_functions(listing: &str) -> HashMap<String, Vec<String>> {
    let mut functions: HashMap<String, Vec<String>> = HashMap::new();

    for line in listing.lines().filter(|l| !l.trim().is_empty()) {
        let entry = line
            .strip_prefix("function: ")
            .and_then(|rest| rest.split_once(", groups = "));
        let (function, groups) = match entry {
            Some(entry) => entry,
            None => {
                debug!("skipping pinmux-functions line: {}", line);
                continue;
            }
        };

        let groups = groups.trim().trim_start_matches('[').trim_end_matches(']');
        for group in groups.split_whitespace() {
            functions
                .entry(group.to_string())
                .or_default()
                .push(function.to_string());
        }
    }

    for list in functions.values_mut() {
        list.sort();
        list.dedup();
    }

    functions
}

/// Pin-mux state read from the pin controller's debugfs directory.
///
/// # Example
///
/// ```rust,no_run
/// use jetson_io::{PinCtrl, PinMux};
///
/// let pinmux = PinCtrl::open("/sys/kernel/debug/pinctrl", "2430000").unwrap();
/// println!("{}", pinmux.get_current_function("spi1_sck_pz3").unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct PinCtrl {
    config: HashMap<String, PinConfig>,
    functions: HashMap<String, Vec<String>>,
}

impl PinCtrl {
    /// Reads the pin controller state of device `dev` (the unit address of
    /// the pinmux node, e.g. `2430000`).
    pub fn open<P: AsRef<Path>>(pinctrl_dir: P, dev: &str) -> Result<PinCtrl> {
        let dir: PathBuf = pinctrl_dir.as_ref().join(format!("{}.pinmux", dev));
        debug!("reading pin controller state from {}", dir.display());

        let groups = read_debugfs(&dir.join("pinconf-groups"))?;
        let functions = read_debugfs(&dir.join("pinmux-functions"))?;

        PinCtrl::from_dumps(&groups, &functions)
    }

    /// Builds the pin-mux state from the raw `pinconf-groups` and
    /// `pinmux-functions` text.
    pub fn from_dumps(pinconf_groups: &str, pinmux_functions: &str) -> Result<PinCtrl> {
        Ok(PinCtrl {
            config: parse_pinconf_groups(pinconf_groups),
            functions: parse_pinmux_functions(pinmux_functions),
        })
    }

    fn config(&self, pin: &str) -> Result<&PinConfig> {
        self.config
            .get(pin)
            .ok_or_else(|| Error::PinMux(format!("Function for pin {} not found!", pin)))
    }
}

fn read_debugfs(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::FileAccess {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

impl PinMux for PinCtrl {
    fn get_current_function(&self, pin: &str) -> Result<String> {
        Ok(self.config(pin)?.function.clone())
    }

    fn get_available_functions(&self, pin: &str) -> Result<Vec<String>> {
        Ok(self.functions.get(pin).cloned().unwrap_or_default())
    }

    fn is_enabled(&self, pin: &str) -> Result<bool> {
        let config = self.config(pin)?;
        Ok(!config.tristate || config.input_enabled)
    }
}
