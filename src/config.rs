//! # Tool Configuration
//!
//! Locations of the files the header configurator reads and writes. Every
//! field has a default matching a stock Jetson Linux install, so a
//! configuration file only needs the paths that differ.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! boot_dir = "/mnt/app/boot"
//! dtb_dir = "/mnt/app/boot/dtb"
//! extlinux = "/mnt/app/boot/extlinux/extlinux.conf"
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// Default location of the configuration file.
pub static DEFAULT_CONFIG_PATH: &str = "/etc/jetson-io.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Directory holding the overlays and receiving generated files.
    #[serde(default = "default_boot_dir")]
    pub boot_dir: PathBuf,
    /// Directory holding the base device-tree blobs.
    #[serde(default = "default_dtb_dir")]
    pub dtb_dir: PathBuf,
    /// Bootloader configuration.
    #[serde(default = "default_extlinux")]
    pub extlinux: PathBuf,
    /// Directory holding the `<board>.toml` files.
    #[serde(default = "default_board_dir")]
    pub board_dir: PathBuf,
    /// Live device tree of the running system.
    #[serde(default = "default_devicetree_dir")]
    pub devicetree_dir: PathBuf,
    /// Pin controller debugfs directory.
    #[serde(default = "default_pinctrl_dir")]
    pub pinctrl_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            boot_dir: default_boot_dir(),
            dtb_dir: default_dtb_dir(),
            extlinux: default_extlinux(),
            board_dir: default_board_dir(),
            devicetree_dir: default_devicetree_dir(),
            pinctrl_dir: default_pinctrl_dir(),
        }
    }
}

fn default_boot_dir() -> PathBuf {
    PathBuf::from("/boot")
}

fn default_dtb_dir() -> PathBuf {
    PathBuf::from("/boot/dtb")
}

fn default_extlinux() -> PathBuf {
    PathBuf::from("/boot/extlinux/extlinux.conf")
}

fn default_board_dir() -> PathBuf {
    PathBuf::from("/opt/nvidia/jetson-io/boards")
}

fn default_devicetree_dir() -> PathBuf {
    PathBuf::from("/proc/device-tree")
}

fn default_pinctrl_dir() -> PathBuf {
    PathBuf::from("/sys/kernel/debug/pinctrl")
}

/// Loads the configuration from `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: Config = toml::from_str(&contents)?;
    info!("loaded configuration from {}", path.as_ref().display());
    Ok(config)
}

/// Loads the configuration from `path` if given, otherwise from
/// [`DEFAULT_CONFIG_PATH`] when that file exists, otherwise uses defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_config(DEFAULT_CONFIG_PATH),
        None => Ok(Config::default()),
    }
}
