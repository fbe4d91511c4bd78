use std::collections::{BTreeMap, HashMap};

use crate::{
    error::{Error, Result},
    pin::Pin,
    pinmux::PinMux,
};

static UNUSED: &str = "unused";

/// I2C and UART RX/TX pins are always enabled on Jetson platforms.
static ALWAYS_ENABLED: [usize; 6] = [3, 5, 8, 10, 27, 28];

/// Specifies the electrical type of a header position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinType {
    Power,
    Ground,
    IO,
}

/// Layout of the standard 40-pin expansion header, pin 1 first.
static HEADER_40PIN: [(&str, PinType); 40] = [
    ("3.3V", PinType::Power),
    ("5V", PinType::Power),
    ("BCM 2", PinType::IO),
    ("5V", PinType::Power),
    ("BCM 3", PinType::IO),
    ("GND", PinType::Ground),
    ("BCM 4", PinType::IO),
    ("BCM 14", PinType::IO),
    ("GND", PinType::Ground),
    ("BCM 15", PinType::IO),
    ("BCM 17", PinType::IO),
    ("BCM 18", PinType::IO),
    ("BCM 27", PinType::IO),
    ("GND", PinType::Ground),
    ("BCM 22", PinType::IO),
    ("BCM 23", PinType::IO),
    ("3.3V", PinType::Power),
    ("BCM 24", PinType::IO),
    ("BCM 10", PinType::IO),
    ("GND", PinType::Ground),
    ("BCM 9", PinType::IO),
    ("BCM 25", PinType::IO),
    ("BCM 11", PinType::IO),
    ("BCM 8", PinType::IO),
    ("GND", PinType::Ground),
    ("BCM 7", PinType::IO),
    ("BCM 0", PinType::IO),
    ("BCM 1", PinType::IO),
    ("BCM 5", PinType::IO),
    ("GND", PinType::Ground),
    ("BCM 6", PinType::IO),
    ("BCM 12", PinType::IO),
    ("BCM 13", PinType::IO),
    ("GND", PinType::Ground),
    ("BCM 19", PinType::IO),
    ("BCM 16", PinType::IO),
    ("BCM 26", PinType::IO),
    ("BCM 20", PinType::IO),
    ("GND", PinType::Ground),
    ("BCM 21", PinType::IO),
];

/// Contents of one header position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// Power or ground pin.
    Supply(String),
    /// Signal pin the board names but that can't be configured.
    Fixed(String),
    /// Signal pin nobody claimed.
    Unused,
    /// Configurable pin, by pin-mux name.
    Pin(String),
}

impl Slot {
    pub fn name(&self) -> &str {
        match self {
            Slot::Supply(name) | Slot::Fixed(name) | Slot::Pin(name) => name,
            Slot::Unused => UNUSED,
        }
    }
}

/// Per-pin state of the expansion header.
///
/// Header positions are numbered from 1, as printed on the board.
///
/// # Example
///
/// ```rust
/// use std::collections::BTreeMap;
/// use jetson_io::HeaderPins;
///
/// let pins = HeaderPins::new(&BTreeMap::new());
/// assert_eq!(pins.count(), 40);
/// assert_eq!(pins.get_name(1).unwrap(), "3.3V");
/// assert_eq!(pins.get_name(7).unwrap(), "unused");
/// ```
#[derive(Debug, Clone)]
pub struct HeaderPins {
    slots: Vec<Slot>,
    pins: HashMap<String, Pin>,
    nodes: HashMap<String, Option<String>>,
}

impl HeaderPins {
    /// Creates the header layout.
    ///
    /// # Arguments
    ///
    /// * `names` - Names of signal pins that can't be configured, by header position.
    pub fn new(names: &BTreeMap<usize, String>) -> Self {
        let slots = HEADER_40PIN
            .iter()
            .enumerate()
            .map(|(i, (label, kind))| match kind {
                PinType::Power | PinType::Ground => Slot::Supply(label.to_string()),
                PinType::IO => match names.get(&(i + 1)) {
                    Some(name) => Slot::Fixed(name.clone()),
                    None => Slot::Unused,
                },
            })
            .collect();

        HeaderPins {
            slots,
            pins: HashMap::new(),
            nodes: HashMap::new(),
        }
    }

    /// Registers a configurable pin.
    ///
    /// # Arguments
    ///
    /// * `pinmux` - Source of the current pin-mux state.
    /// * `name` - Pin-mux name of the pin.
    /// * `index` - Header position of the pin, starting at 1.
    /// * `node` - Path of the node configuring this pin in the header overlay.
    pub fn add(&mut self, pinmux: &dyn PinMux, name: &str, index: usize, node: Option<&str>) -> Result<()> {
        let slot = self.slot_mut(index)?;
        if *slot != Slot::Unused {
            return Err(Error::DuplicateSlot(index));
        }
        // one pin can't sit on two header positions
        if let Ok(existing) = self.get_pin_num(name) {
            return Err(Error::DuplicateSlot(existing));
        }

        let functions = pinmux.get_available_functions(name)?;
        let function = pinmux.get_current_function(name)?;
        let enabled = pinmux.is_enabled(name)?;
        let pin = Pin::new(name, enabled, &function, functions)?;

        *self.slot_mut(index)? = Slot::Pin(name.to_string());
        self.pins.insert(name.to_string(), pin);
        self.nodes.insert(name.to_string(), node.map(String::from));

        Ok(())
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut Slot> {
        if index == 0 {
            return Err(Error::InvalidIndex(index));
        }
        self.slots.get_mut(index - 1).ok_or(Error::InvalidIndex(index))
    }

    fn pin(&self, name: &str) -> Result<&Pin> {
        self.pins.get(name).ok_or_else(|| Error::UnknownPin(name.to_string()))
    }

    fn pin_mut(&mut self, name: &str) -> Result<&mut Pin> {
        self.pins.get_mut(name).ok_or_else(|| Error::UnknownPin(name.to_string()))
    }

    /// Returns the number of header positions.
    pub fn count(&self) -> usize {
        self.slots.len()
    }

    /// Returns the names of the configurable pins in header order.
    pub fn names(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Pin(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns the slot at header position `index`.
    pub fn get_slot(&self, index: usize) -> Result<&Slot> {
        if index == 0 {
            return Err(Error::InvalidIndex(index));
        }
        self.slots.get(index - 1).ok_or(Error::InvalidIndex(index))
    }

    /// Returns the name of header position `index`: the pin-mux name for
    /// configurable pins, the board or supply label otherwise, or `unused`.
    pub fn get_name(&self, index: usize) -> Result<&str> {
        Ok(self.get_slot(index)?.name())
    }

    /// Returns the header position of pin `name`.
    pub fn get_pin_num(&self, name: &str) -> Result<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Slot::Pin(n) if n == name))
            .map(|i| i + 1)
            .ok_or_else(|| Error::UnknownPin(name.to_string()))
    }

    pub fn get_node(&self, name: &str) -> Result<&str> {
        match self.nodes.get(name) {
            Some(Some(node)) => Ok(node),
            _ => Err(Error::UnknownPin(name.to_string())),
        }
    }

    pub fn get_function(&self, name: &str) -> Result<&str> {
        Ok(self.pin(name)?.function())
    }

    pub fn get_functions(&self, name: &str) -> Result<&[String]> {
        Ok(self.pin(name)?.functions())
    }

    pub fn is_configurable(&self, name: &str) -> bool {
        self.pins.contains_key(name)
    }

    /// Returns `true` if the pin sits on a header position that can never be
    /// disabled, whatever function it carries.
    pub fn is_always_enabled(&self, name: &str) -> Result<bool> {
        Ok(ALWAYS_ENABLED.contains(&self.get_pin_num(name)?))
    }

    pub fn is_enabled(&self, name: &str) -> Result<bool> {
        Ok(self.pin(name)?.is_enabled())
    }

    pub fn is_default(&self, name: &str) -> Result<bool> {
        Ok(self.pin(name)?.is_default())
    }

    /// Returns `true` if every configurable pin is in its default state.
    pub fn are_default(&self) -> bool {
        self.pins.values().all(Pin::is_default)
    }

    /// Disables pin `name`, unless it is always enabled.
    pub fn disable(&mut self, name: &str) -> Result<()> {
        if self.is_always_enabled(name)? {
            return Ok(());
        }
        self.pin_mut(name)?.disable();
        Ok(())
    }

    /// Disables every pin that can be disabled.
    pub fn disable_all(&mut self) -> Result<()> {
        for name in self.names().into_iter().map(String::from).collect::<Vec<_>>() {
            self.disable(&name)?;
        }
        Ok(())
    }

    pub fn set_default_all(&mut self) {
        for pin in self.pins.values_mut() {
            pin.set_default();
        }
    }

    /// Assigns `function` to pin `name`, enabling it unless `function` is
    /// the pin's reserved function.
    pub fn set_function(&mut self, name: &str, function: &str) -> Result<()> {
        self.pin_mut(name)?.set_function(function)
    }
}
