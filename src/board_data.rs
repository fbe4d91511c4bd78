use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

static BOARD_DATA_EXTENSION: &str = "toml";

/// Highest header position a board file may name.
const MAX_PIN_INDEX: usize = 40;

/// Name of a header position that can't be configured.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PinName {
    pub index: usize,
    pub name: String,
}

/// Static description of the 40-pin header of one carrier board.
///
/// Board files are TOML documents:
///
/// ```toml
/// pins = [{ index = 3, name = "i2c8" }]
///
/// [pingroups]
/// spi1 = "spi1"
/// pwm5 = "gp"
///
/// [pingroup_pins]
/// pwm5 = ["soc_gpio44_pq4"]
/// ```
///
/// The fields are:
/// * `pins`: Names of header positions that can't be configured
/// * `pingroups`: Pin-mux function required by each pin group
/// * `pingroup_pins`: Optional list of the only pins allowed in a group
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BoardData {
    #[serde(default)]
    pub pins: Vec<PinName>,
    #[serde(default)]
    pub pingroups: BTreeMap<String, String>,
    #[serde(default)]
    pub pingroup_pins: BTreeMap<String, Vec<String>>,
}

impl BoardData {
    /// Parses and validates a board file.
    ///
    /// # Arguments
    ///
    /// * `path` - Only used to label errors.
    /// * `contents` - The TOML text of the board file.
    pub fn parse(path: &Path, contents: &str) -> Result<BoardData> {
        let data: BoardData = toml::from_str(contents)?;
        data.validate().map_err(|message| Error::BoardData {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(data)
    }

    /// Reads a board file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<BoardData> {
        let path = path.as_ref();
        debug!("loading board data from {}", path.display());
        let contents = fs::read_to_string(path).map_err(|e| Error::FileAccess {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        BoardData::parse(path, &contents)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = BTreeSet::new();
        for pin in &self.pins {
            if pin.index == 0 || pin.index > MAX_PIN_INDEX {
                return Err(format!("pin index {} out of range", pin.index));
            }
            if !seen.insert(pin.index) {
                return Err(format!("pin {} named twice", pin.index));
            }
        }

        for group in self.pingroup_pins.keys() {
            if !self.pingroups.contains_key(group) {
                return Err(format!("pins listed for undeclared group {}", group));
            }
        }

        Ok(())
    }

    /// Returns the fixed pin names keyed by header position.
    pub fn pin_names(&self) -> BTreeMap<usize, String> {
        self.pins.iter().map(|p| (p.index, p.name.clone())).collect()
    }

    /// Returns `true` if `pin` may join `group`: either the group has no
    /// whitelist or the whitelist names the pin.
    pub fn group_allows(&self, group: &str, pin: &str) -> bool {
        match self.pingroup_pins.get(group) {
            Some(pins) => pins.iter().any(|p| p == pin),
            None => true,
        }
    }
}

/// Finds the board file matching the running hardware.
///
/// A board file named `<board>.toml` matches when `<board>` is part of the
/// device-tree compatible string. Files are tried in name order.
///
/// Returns the board name and the path of its file.
pub fn find_board<P: AsRef<Path>>(board_dir: P, compat: &str) -> Result<(String, PathBuf)> {
    let board_dir = board_dir.as_ref();
    let entries = fs::read_dir(board_dir).map_err(|e| Error::FileAccess {
        path: board_dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == BOARD_DATA_EXTENSION))
        .collect();
    files.sort();

    for path in files {
        let board = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };
        if compat.contains(&board) {
            return Ok((board, path));
        }
    }

    Err(Error::NoBoardData(compat.to_string()))
}
