use tracing::debug;

use crate::error::{Error, Result};

/// Marker that identifies the pin-mux function meaning "not in use".
static RESERVED_MARKER: &str = "rsvd";

/// A single configurable pin of the expansion header.
///
/// A pin is built once from the pin-mux state found at start-up. The
/// function and enabled state it was built with are remembered as the
/// defaults so that the header can always be reverted.
///
/// The fields are:
/// * `name`: Pin-mux name of the pin (e.g. `spi1_sck_pz3`)
/// * `function`: Currently assigned function
/// * `default_function`: Function found at start-up
/// * `reserved_function`: Function used to disable the pin, if any
/// * `functions`: All functions the pin can be assigned (sorted)
/// * `enabled`: Current enabled state
/// * `default_enabled`: Enabled state found at start-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pin {
    name: String,
    function: String,
    default_function: String,
    reserved_function: Option<String>,
    functions: Vec<String>,
    enabled: bool,
    default_enabled: bool,
}

fn find_reserved(current: &str, functions: &[String]) -> Option<String> {
    if current.contains(RESERVED_MARKER) {
        return Some(current.to_string());
    }

    // pin-mux listings usually carry several rsvdN entries, the last one wins
    functions
        .iter()
        .filter(|f| f.contains(RESERVED_MARKER))
        .last()
        .cloned()
}

impl Pin {
    /// Creates a new `Pin`.
    ///
    /// # Arguments
    ///
    /// * `name` - The pin-mux name of the pin.
    /// * `enabled` - Whether the pin is currently driven or input-enabled.
    /// * `function` - The currently configured function.
    /// * `functions` - Every function the pin can be assigned.
    ///
    /// # Example
    ///
    /// ```rust
    /// use jetson_io::Pin;
    ///
    /// let functions = vec![String::from("rsvd1"), String::from("spi1")];
    /// let pin = Pin::new("spi1_sck_pz3", false, "rsvd1", functions).unwrap();
    /// assert_eq!(pin.reserved_function(), Some("rsvd1"));
    /// assert!(!pin.is_enabled());
    /// ```
    pub fn new(name: &str, enabled: bool, function: &str, mut functions: Vec<String>) -> Result<Pin> {
        functions.sort();
        functions.dedup();

        if !functions.iter().any(|f| f == function) {
            return Err(Error::InvalidFunction {
                pin: name.to_string(),
                function: function.to_string(),
            });
        }

        Ok(Pin {
            name: name.to_string(),
            function: function.to_string(),
            default_function: function.to_string(),
            reserved_function: find_reserved(function, &functions),
            functions,
            enabled,
            default_enabled: enabled,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the currently assigned function.
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Returns every function the pin can be assigned, sorted.
    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    pub fn default_function(&self) -> &str {
        &self.default_function
    }

    pub fn reserved_function(&self) -> Option<&str> {
        self.reserved_function.as_deref()
    }

    fn is_reserved(&self) -> bool {
        self.reserved_function.as_deref() == Some(self.function.as_str())
    }

    /// Returns `true` if the pin is in use.
    ///
    /// A pin assigned its reserved function is never in use.
    pub fn is_enabled(&self) -> bool {
        if self.is_reserved() {
            return false;
        }
        self.enabled
    }

    /// Returns `true` if both the function and the enabled state match the
    /// values found at start-up.
    pub fn is_default(&self) -> bool {
        self.function == self.default_function && self.enabled == self.default_enabled
    }

    /// Assigns the reserved function (if the pin has one) and marks the pin
    /// as not in use.
    pub fn disable(&mut self) {
        if let Some(reserved) = &self.reserved_function {
            self.function = reserved.clone();
        }
        self.enabled = false;
        debug!("pin {} disabled ({})", self.name, self.function);
    }

    /// Reverts the pin to the state found at start-up.
    pub fn set_default(&mut self) {
        self.function = self.default_function.clone();
        self.enabled = self.default_enabled;
    }

    /// Assigns a new function to the pin.
    ///
    /// The pin becomes enabled unless `function` is the reserved function.
    /// On error the pin is left untouched.
    ///
    /// # Arguments
    ///
    /// * `function` - One of the functions returned by [`Pin::functions`].
    pub fn set_function(&mut self, function: &str) -> Result<()> {
        if !self.functions.iter().any(|f| f == function) {
            return Err(Error::InvalidFunction {
                pin: self.name.clone(),
                function: function.to_string(),
            });
        }

        self.function = function.to_string();
        self.enabled = !self.is_reserved();
        debug!("pin {} set to {} (enabled: {})", self.name, self.function, self.enabled);

        Ok(())
    }
}
