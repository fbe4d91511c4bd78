use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::Local;
use tracing::{debug, info};

use crate::{
    board_data::{find_board, BoardData},
    config::Config,
    dtc::{DeviceTree, FdtTools, PropType},
    error::{Error, Result},
    extlinux, fio,
    header::{pin_number, Header, PROP_FUNCTION},
    pinmux::{PinCtrl, PinMux},
};

/// `overlay-name` of the overlay describing the 40-pin header.
pub static HEADER_OVERLAY_NAME: &str = "Jetson 40pin Header";

static PROP_OVERLAY_NAME: &str = "overlay-name";
static HEADER_ENTRY_LABEL: &str = "JetsonIO";
static HEADER_ENTRY_MENU_LABEL: &str = "Custom 40-pin Header Config";
static USER_CUSTOM_SUFFIX: &str = "user-custom";
static TEMPORARY_DTBO: &str = "jetson-user-custom.dtbo";

/// Reads a property of the live device tree.
///
/// Multi-valued properties are returned space separated, the way `fdtget`
/// prints them.
pub fn read_prop<P: AsRef<Path>>(devicetree_dir: P, prop: &str) -> Result<String> {
    let path = devicetree_dir.as_ref().join(prop);
    fio::is_readable(&path)?;

    let raw = fs::read(&path)?;
    let value = String::from_utf8_lossy(&raw);
    Ok(value
        .split('\0')
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end()
        .to_string())
}

fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::FileAccess {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().map_or(false, |ext| ext == extension))
        .collect();
    files.sort();

    Ok(files)
}

/// Lists the `.dtb` files in `dir` built for the running hardware.
pub fn find_compatible_dtb_files(dt: &dyn DeviceTree, compat: &str, model: &str, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dtbs = Vec::new();
    for dtb in list_files(dir, "dtb")? {
        if dt.get_compatible(&dtb)?.as_deref() != Some(compat) {
            continue;
        }
        if dt.get_model(&dtb)?.as_deref() != Some(model) {
            continue;
        }
        dtbs.push(dtb);
    }
    Ok(dtbs)
}

/// Lists the `.dtbo` files in `dir` whose compatible string mentions `board`.
pub fn find_compatible_dtbo_files(dt: &dyn DeviceTree, board: &str, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dtbos = Vec::new();
    for dtbo in list_files(dir, "dtbo")? {
        match dt.get_compatible(&dtbo)? {
            Some(compat) if compat.contains(board) => dtbos.push(dtbo),
            _ => {}
        }
    }
    Ok(dtbos)
}

/// Returns the single base device tree built for the running hardware.
pub fn get_dtb(dt: &dyn DeviceTree, compat: &str, model: &str, dir: &Path) -> Result<PathBuf> {
    let mut dtbs = find_compatible_dtb_files(dt, compat, model, dir)?.into_iter();
    let first = dtbs.next().ok_or_else(|| Error::NoDtb(model.to_string()))?;
    if let Some(second) = dtbs.next() {
        return Err(Error::MultipleDtbs {
            model: model.to_string(),
            first,
            second,
        });
    }
    Ok(first)
}

/// Returns the overlay describing the 40-pin header.
pub fn find_header_overlay(dt: &dyn DeviceTree, dtbos: &[PathBuf]) -> Result<PathBuf> {
    let mut header: Option<PathBuf> = None;

    for dtbo in dtbos {
        if dt.get_prop_value(dtbo, "/", PROP_OVERLAY_NAME, 0)?.as_deref() != Some(HEADER_OVERLAY_NAME) {
            continue;
        }
        if let Some(first) = header {
            return Err(Error::DuplicateOverlay {
                name: HEADER_OVERLAY_NAME.to_string(),
                first,
                second: dtbo.clone(),
            });
        }
        header = Some(dtbo.clone());
    }

    header.ok_or(Error::HeaderOverlayNotFound)
}

/// Returns the overlays for hardware add-ons, keyed by overlay name.
///
/// Every named overlay other than the header overlay describes an add-on.
pub fn find_hw_addon_overlays(dt: &dyn DeviceTree, dtbos: &[PathBuf]) -> Result<BTreeMap<String, PathBuf>> {
    let mut hw_addons: BTreeMap<String, PathBuf> = BTreeMap::new();

    for dtbo in dtbos {
        let name = match dt.get_prop_value(dtbo, "/", PROP_OVERLAY_NAME, 0)? {
            Some(name) if name != HEADER_OVERLAY_NAME => name,
            _ => continue,
        };
        if let Some(first) = hw_addons.get(&name) {
            return Err(Error::DuplicateOverlay {
                name,
                first: first.clone(),
                second: dtbo.clone(),
            });
        }
        hw_addons.insert(name, dtbo.clone());
    }

    Ok(hw_addons)
}

/// Locates the device-tree files of the running Jetson and applies header
/// configurations to them.
///
/// # Example
///
/// ```rust,no_run
/// use jetson_io::{Board, Config};
///
/// let mut jetson = Board::new(Config::default()).unwrap();
/// jetson.header.pingroup_enable("spi1").unwrap();
/// let dtbo = jetson.create_dtbo_for_header().unwrap();
/// println!("Configuration saved to {}.", dtbo.display());
/// ```
pub struct Board<D: DeviceTree = FdtTools> {
    dt: D,
    config: Config,
    pub compat: String,
    pub model: String,
    pub name: String,
    pub data: BoardData,
    pub dtb: PathBuf,
    pub header_dtbo: PathBuf,
    hw_addons: BTreeMap<String, PathBuf>,
    pub header: Header,
}

impl Board<FdtTools> {
    /// Opens the running board using the `fdt*` tools and the pin
    /// controller's debugfs state.
    pub fn new(config: Config) -> Result<Self> {
        let symbol = read_prop(&config.devicetree_dir, "__symbols__/pinmux")?;
        let dev = symbol
            .split("pinmux@")
            .nth(1)
            .ok_or_else(|| Error::PinMux(format!("Unexpected pinmux node {}", symbol)))?;
        let pinmux = PinCtrl::open(&config.pinctrl_dir, dev)?;

        Board::open(FdtTools::new(), config, &pinmux)
    }
}

impl<D: DeviceTree> Board<D> {
    /// Opens the running board.
    ///
    /// # Arguments
    ///
    /// * `dt` - Device-tree access.
    /// * `config` - Locations of the board files.
    /// * `pinmux` - Source of the current pin-mux state.
    pub fn open(dt: D, config: Config, pinmux: &dyn PinMux) -> Result<Self> {
        fio::is_rw(&config.boot_dir)?;

        let compat = read_prop(&config.devicetree_dir, "compatible")?;
        let model = read_prop(&config.devicetree_dir, "model")?;
        info!("running on {} ({})", model, compat);

        let (name, board_file) = find_board(&config.board_dir, &compat)?;
        let data = BoardData::load(&board_file)?;
        info!("using board data {}", board_file.display());

        let dtb = get_dtb(&dt, &compat, &model, &config.dtb_dir)?;
        info!("base device tree {}", dtb.display());

        let dtbos = find_compatible_dtbo_files(&dt, &name, &config.boot_dir)?;
        let header_dtbo = find_header_overlay(&dt, &dtbos)?;
        let hw_addons = find_hw_addon_overlays(&dt, &dtbos)?;
        info!("header overlay {}", header_dtbo.display());
        debug!("hardware add-ons: {:?}", hw_addons.keys().collect::<Vec<_>>());

        let header = Header::new(&dt, &header_dtbo, pinmux, &data)?;

        Ok(Board {
            dt,
            config,
            compat,
            model,
            name,
            data,
            dtb,
            header_dtbo,
            hw_addons,
            header,
        })
    }

    /// Returns the base device tree's file name without extension.
    pub fn get_dtb_basename(&self) -> String {
        self.dtb
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Returns `<dir>/<dtb basename>-<suffix>.dtb`.
    pub fn gen_dtb_filename(&self, suffix: &str, dir: &Path) -> PathBuf {
        dir.join(format!("{}-{}.dtb", self.get_dtb_basename(), suffix))
    }

    /// Returns the names of the available hardware add-ons, sorted.
    pub fn hw_addon_get(&self) -> Vec<&str> {
        self.hw_addons.keys().map(String::as_str).collect()
    }

    fn hw_addon(&self, name: &str) -> Result<&PathBuf> {
        self.hw_addons
            .get(name)
            .ok_or_else(|| Error::UnknownHardwareAddon(name.to_string()))
    }

    /// Replaces the header configuration with the one of add-on `name`.
    pub fn hw_addon_load(&mut self, name: &str) -> Result<()> {
        let overlay = self.hw_addon(name)?.clone();
        self.header.pins_reset()?;

        for node in self.dt.find_nodes_with_prop(&overlay, "/", PROP_FUNCTION)? {
            let malformed = |message: String| Error::MalformedOverlay {
                path: overlay.clone(),
                message,
            };

            let pin = pin_number(&node)
                .ok_or_else(|| malformed(format!("Failed to get pin number for node {}!", node)))?;
            let function = self
                .dt
                .get_prop_value(&overlay, &node, PROP_FUNCTION, 0)?
                .ok_or_else(|| malformed(format!("No function for node {}!", node)))?;

            self.header.pin_set_function(pin, &function)?;
        }

        Ok(())
    }

    /// Copies the header overlay to `<boot dir>/<name>` and writes the
    /// current header configuration into the copy.
    fn create_header_dtbo(&self, name: &str) -> Result<PathBuf> {
        let dtbo = self.config.boot_dir.join(name);
        fs::copy(&self.header_dtbo, &dtbo)?;

        if let Err(e) = self.header.write_overlay(&self.dt, &dtbo) {
            let _ = fs::remove_file(&dtbo);
            return Err(e);
        }

        Ok(dtbo)
    }

    /// Saves the header configuration as a stand-alone overlay.
    ///
    /// Returns the path of the new overlay.
    pub fn create_dtbo_for_header(&self) -> Result<PathBuf> {
        let date = Local::now().format("%Y-%m-%d-%H%M%S");
        let name = format!("User Custom [{}]", date);
        let file = format!("{}-{}.dtbo", self.get_dtb_basename(), USER_CUSTOM_SUFFIX);

        let dtbo = self.create_header_dtbo(&file)?;
        if let Err(e) = self
            .dt
            .set_prop_value(&dtbo, "/", PropType::String, PROP_OVERLAY_NAME, &name)
        {
            let _ = fs::remove_file(&dtbo);
            return Err(e);
        }

        info!("wrote {}", dtbo.display());
        Ok(dtbo)
    }

    /// Saves the header configuration merged into a copy of the base device
    /// tree and makes it the default boot entry.
    ///
    /// Returns the path of the new device tree.
    pub fn create_dtb_for_header(&self) -> Result<PathBuf> {
        fio::is_rw(&self.config.extlinux)?;
        let dtb = self.gen_dtb_filename(USER_CUSTOM_SUFFIX, &self.config.boot_dir);

        let dtbo = self.create_header_dtbo(TEMPORARY_DTBO)?;
        let merged = self.dt.apply_overlay(&self.dtb, &dtb, &[dtbo.as_path()]);
        if let Err(e) = fs::remove_file(&dtbo) {
            let _ = fs::remove_file(&dtb);
            return Err(e.into());
        }

        self.register_dtb(merged, &dtb, HEADER_ENTRY_LABEL, HEADER_ENTRY_MENU_LABEL)?;
        Ok(dtb)
    }

    /// Merges the overlay of add-on `name` into a copy of the base device
    /// tree and makes it the default boot entry.
    ///
    /// Returns the path of the new device tree.
    pub fn create_dtb_for_hw_addon(&self, name: &str) -> Result<PathBuf> {
        let dtbo = self.hw_addon(name)?;
        fio::is_rw(&self.config.extlinux)?;
        let suffix = name.replace(' ', "-").to_lowercase();
        let dtb = self.gen_dtb_filename(&suffix, &self.config.boot_dir);

        let merged = self.dt.apply_overlay(&self.dtb, &dtb, &[dtbo.as_path()]);
        self.register_dtb(merged, &dtb, name, name)?;
        Ok(dtb)
    }

    /// Makes `dtb` the default boot entry once `merged` succeeded.
    ///
    /// `dtb` is removed on any failure.
    fn register_dtb(&self, merged: Result<()>, dtb: &Path, label: &str, menu_label: &str) -> Result<()> {
        let registered = merged.and_then(|()| {
            info!("wrote {}", dtb.display());
            extlinux::add_entry(&self.config.extlinux, label, menu_label, dtb, true)
        });
        if registered.is_err() {
            let _ = fs::remove_file(dtb);
        }
        registered
    }
}
