use std::path::Path;

use tracing::{debug, info, warn};

use crate::{
    board_data::BoardData,
    dtc::{DeviceTree, PropType},
    error::Result,
    header_pins::{HeaderPins, Slot},
    pingroup::PinGroups,
    pinmux::PinMux,
};

static UNUSED: &str = "unused";
static PROP_PINS: &str = "nvidia,pins";
pub(crate) static PROP_FUNCTION: &str = "nvidia,function";
static PROP_TRISTATE: &str = "nvidia,tristate";
static PROP_ENABLE_INPUT: &str = "nvidia,enable-input";

/// A pin node found in the header overlay.
///
/// The fields are:
/// * `index`: Header position (BOARD numbering)
/// * `name`: Pin-mux name of the pin
/// * `node`: Path of the node in the overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinMap {
    pub index: usize,
    pub name: String,
    pub node: String,
}

/// Extracts the header position from an overlay node path such as
/// `/fragment@0/__overlay__/header-40pin-pinmux/pin7/`.
pub fn pin_number(node: &str) -> Option<usize> {
    node.split('/')
        .rev()
        .filter_map(|segment| segment.strip_prefix("pin"))
        .find(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
}

/// Lists the pins configured by the header overlay `dtbo`.
pub fn get_pinmap(dt: &dyn DeviceTree, dtbo: &Path) -> Result<Vec<PinMap>> {
    let mut pinmap = Vec::new();

    for node in dt.find_nodes_with_prop(dtbo, "/", PROP_PINS)? {
        let index = match pin_number(&node) {
            Some(index) => index,
            None => {
                warn!("ignoring node {} with no pin number", node);
                continue;
            }
        };

        if let Some(name) = dt.get_prop_value(dtbo, &node, PROP_PINS, 0)? {
            pinmap.push(PinMap { index, name, node });
        }
    }

    Ok(pinmap)
}

/// The configuration model of the 40-pin expansion header.
///
/// Combines the per-pin state with the pin groups so that whole hardware
/// interfaces (e.g. `spi1`) can be enabled or disabled at once. Nothing is
/// written anywhere until [`Header::write_overlay`] is called.
#[derive(Debug, Clone)]
pub struct Header {
    pins: HeaderPins,
    pingroups: PinGroups,
}

impl Header {
    /// Builds the header model from the header overlay of the board.
    ///
    /// # Arguments
    ///
    /// * `dt` - Device-tree access used to read the overlay.
    /// * `dtbo` - Path of the header overlay.
    /// * `pinmux` - Source of the current pin-mux state.
    /// * `data` - Board description.
    pub fn new(dt: &dyn DeviceTree, dtbo: &Path, pinmux: &dyn PinMux, data: &BoardData) -> Result<Header> {
        let pinmap = get_pinmap(dt, dtbo)?;
        debug!("found {} header pins in {}", pinmap.len(), dtbo.display());
        Header::from_pinmap(&pinmap, pinmux, data)
    }

    /// Builds the header model from an already extracted pin map.
    pub fn from_pinmap(pinmap: &[PinMap], pinmux: &dyn PinMux, data: &BoardData) -> Result<Header> {
        let mut pins = HeaderPins::new(&data.pin_names());
        for pin in pinmap {
            pins.add(pinmux, &pin.name, pin.index, Some(&pin.node))?;
        }
        let pingroups = PinGroups::from_header(&pins, data)?;

        Ok(Header { pins, pingroups })
    }

    pub fn pins(&self) -> &HeaderPins {
        &self.pins
    }

    pub fn pin_count(&self) -> usize {
        self.pins.count()
    }

    pub fn pin_get_function(&self, name: &str) -> Result<&str> {
        self.pins.get_function(name)
    }

    /// Assigns `function` to the pin at header position `index`.
    pub fn pin_set_function(&mut self, index: usize, function: &str) -> Result<()> {
        let name = self.pins.get_name(index)?.to_string();
        self.pins.set_function(&name, function)
    }

    pub fn pin_get_node(&self, name: &str) -> Result<&str> {
        self.pins.get_node(name)
    }

    /// Returns the label shown for header position `index`.
    ///
    /// * Supply and fixed pins are labelled with their name; unclaimed
    ///   positions and disabled pins are `unused`.
    /// * An enabled pin shows its group name when it is part of a group of
    ///   several pins, its function otherwise.
    pub fn pin_get_label(&self, index: usize) -> Result<String> {
        let name = match self.pins.get_slot(index)? {
            Slot::Pin(name) => name,
            slot => return Ok(slot.name().to_string()),
        };

        if !self.pins.is_enabled(name)? {
            return Ok(UNUSED.to_string());
        }

        let function = self.pins.get_function(name)?;
        if self.pingroups.pin_is_group(name, function) {
            if let Some(group) = self.pingroups.get_group(name, function) {
                return Ok(group.to_string());
            }
        }
        Ok(function.to_string())
    }

    pub fn pin_is_default(&self, name: &str) -> Result<bool> {
        self.pins.is_default(name)
    }

    pub fn pin_is_enabled(&self, name: &str) -> Result<bool> {
        self.pins.is_enabled(name)
    }

    pub fn pins_are_default(&self) -> bool {
        self.pins.are_default()
    }

    pub fn pins_set_default(&mut self) {
        self.pins.set_default_all();
    }

    /// Disables every pin that can be disabled.
    pub fn pins_reset(&mut self) -> Result<()> {
        self.pins.disable_all()
    }

    /// Returns the names of all pin groups, sorted.
    pub fn pingroups_available(&self) -> Vec<&str> {
        self.pingroups.available()
    }

    /// Enables pin group `group`.
    ///
    /// Any member pin currently in use for another function first has the
    /// group owning that function disabled, so enabling one interface may
    /// switch off another interface sharing a pin with it.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # fn configure(header: &mut jetson_io::Header) -> jetson_io::Result<()> {
    /// header.pingroup_enable("spi1")?;
    /// assert!(header.pingroup_is_enabled("spi1")?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn pingroup_enable(&mut self, group: &str) -> Result<()> {
        let function = self.pingroups.get_function(group)?.to_string();
        let pins: Vec<String> = self.pingroups.get_pins(group)?.iter().cloned().collect();

        for pin in &pins {
            let current = self.pins.get_function(pin)?.to_string();
            if current == function || !self.pins.is_enabled(pin)? {
                continue;
            }

            match self.pingroups.get_group(pin, &current).map(String::from) {
                Some(owner) => {
                    debug!("{} conflicts with {} on {}", group, owner, pin);
                    self.pingroup_disable(&owner)?;
                }
                None => self.pins.disable(pin)?,
            }
        }

        for pin in &pins {
            self.pins.set_function(pin, &function)?;
        }
        info!("enabled {}", group);

        Ok(())
    }

    /// Disables every pin of group `group`.
    pub fn pingroup_disable(&mut self, group: &str) -> Result<()> {
        let pins: Vec<String> = self.pingroups.get_pins(group)?.iter().cloned().collect();
        for pin in &pins {
            self.pins.disable(pin)?;
        }
        Ok(())
    }

    /// Returns `true` if every pin of `group` is assigned the group's function.
    pub fn pingroup_is_enabled(&self, group: &str) -> Result<bool> {
        let function = self.pingroups.get_function(group)?;
        for pin in self.pingroups.get_pins(group)? {
            if self.pins.get_function(pin)? != function {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Returns the header positions of the pins of `group`, sorted and comma
    /// separated (e.g. `19,21,23,24,26`).
    pub fn pingroup_get_pins(&self, group: &str) -> Result<String> {
        let mut indices = Vec::new();
        for pin in self.pingroups.get_pins(group)? {
            indices.push(self.pins.get_pin_num(pin)?);
        }
        indices.sort_unstable();

        Ok(indices
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(","))
    }

    /// Writes the current pin configuration into the overlay `dtbo`.
    ///
    /// For every configurable pin, in header order:
    /// * enabled: the pin's function is written;
    /// * disabled and in its default state: the pin's node is removed so the
    ///   pin keeps its default configuration;
    /// * disabled otherwise: the function is written along with
    ///   `nvidia,tristate = 1` and `nvidia,enable-input = 0`.
    pub fn write_overlay(&self, dt: &dyn DeviceTree, dtbo: &Path) -> Result<()> {
        for name in self.pins.names() {
            let function = self.pins.get_function(name)?;
            let node = self.pins.get_node(name)?;

            if self.pins.is_enabled(name)? {
                dt.set_prop_value(dtbo, node, PropType::String, PROP_FUNCTION, function)?;
            } else if self.pins.is_default(name)? {
                dt.remove_node(dtbo, node)?;
            } else {
                dt.set_prop_value(dtbo, node, PropType::String, PROP_FUNCTION, function)?;
                dt.set_prop_value(dtbo, node, PropType::U32, PROP_TRISTATE, "1")?;
                dt.set_prop_value(dtbo, node, PropType::U32, PROP_ENABLE_INPUT, "0")?;
            }
        }
        Ok(())
    }
}
