use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::{
    board_data::BoardData,
    error::{Error, Result},
    header_pins::HeaderPins,
};

/// A set of pins that together implement one hardware interface.
///
/// Every member pin must be assigned `function` for the group to be active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinGroup {
    pub function: String,
    pub pins: BTreeSet<String>,
}

/// The pin groups available on the header.
#[derive(Debug, Clone, Default)]
pub struct PinGroups {
    groups: BTreeMap<String, PinGroup>,
}

impl PinGroups {
    pub fn new() -> Self {
        PinGroups::default()
    }

    /// Builds the groups declared by `data` from the configurable pins of
    /// the header.
    ///
    /// A pin joins a group when it can be assigned the group's function and
    /// the group's whitelist (if any) names it.
    pub fn from_header(pins: &HeaderPins, data: &BoardData) -> Result<PinGroups> {
        let mut groups = PinGroups::new();

        for name in pins.names() {
            for function in pins.get_functions(name)? {
                for (group, required) in &data.pingroups {
                    if function == required && data.group_allows(group, name) {
                        groups.add(group, function, name)?;
                    }
                }
            }
        }

        groups.check_unambiguous()?;
        debug!("pin groups: {:?}", groups.available());

        Ok(groups)
    }

    /// Adds `pin` to `group`, creating the group if needed.
    ///
    /// Fails if the group already exists with a different function.
    pub fn add(&mut self, group: &str, function: &str, pin: &str) -> Result<()> {
        let entry = self.groups.entry(group.to_string()).or_insert_with(|| PinGroup {
            function: function.to_string(),
            pins: BTreeSet::new(),
        });

        if entry.function != function {
            return Err(Error::FunctionMismatch {
                group: group.to_string(),
                expected: entry.function.clone(),
                found: function.to_string(),
            });
        }

        entry.pins.insert(pin.to_string());
        Ok(())
    }

    /// Ensures that no pin and function pair belongs to more than one group,
    /// so that [`PinGroups::get_group`] has a single answer.
    pub fn check_unambiguous(&self) -> Result<()> {
        let mut owners: BTreeMap<(&str, &str), &str> = BTreeMap::new();

        for (name, group) in &self.groups {
            for pin in &group.pins {
                let key = (pin.as_str(), group.function.as_str());
                if let Some(first) = owners.insert(key, name.as_str()) {
                    return Err(Error::AmbiguousGroup {
                        pin: pin.clone(),
                        function: group.function.clone(),
                        first: first.to_string(),
                        second: name.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    fn group(&self, group: &str) -> Result<&PinGroup> {
        self.groups
            .get(group)
            .ok_or_else(|| Error::UnsupportedGroup(group.to_string()))
    }

    /// Returns the names of all groups, sorted.
    pub fn available(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    pub fn get_function(&self, group: &str) -> Result<&str> {
        Ok(&self.group(group)?.function)
    }

    pub fn get_pins(&self, group: &str) -> Result<&BTreeSet<String>> {
        Ok(&self.group(group)?.pins)
    }

    /// Returns the group `pin` belongs to when assigned `function`.
    pub fn get_group(&self, pin: &str, function: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|(_, group)| group.function == function && group.pins.contains(pin))
            .map(|(name, _)| name.as_str())
    }

    /// Returns `true` if `pin` assigned `function` is part of a group with
    /// more than one member.
    pub fn pin_is_group(&self, pin: &str, function: &str) -> bool {
        match self.get_group(pin, function) {
            Some(group) => self.groups[group].pins.len() > 1,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rejects_function_mismatch() {
        let mut groups = PinGroups::new();
        groups.add("spi1", "spi1", "spi1_sck_pz3").unwrap();
        let err = groups.add("spi1", "gp", "spi1_miso_pz4").unwrap_err();
        assert!(matches!(err, Error::FunctionMismatch { .. }));
        assert_eq!(groups.get_pins("spi1").unwrap().len(), 1);
    }

    #[test]
    fn unknown_group_is_unsupported() {
        let groups = PinGroups::new();
        assert!(matches!(groups.get_pins("uart2"), Err(Error::UnsupportedGroup(_))));
        assert!(matches!(groups.get_function("uart2"), Err(Error::UnsupportedGroup(_))));
    }

    #[test]
    fn reverse_lookup() {
        let mut groups = PinGroups::new();
        groups.add("spi1", "spi", "p19").unwrap();
        groups.add("spi1", "spi", "p21").unwrap();
        groups.add("i2s1", "i2s", "p21").unwrap();

        assert_eq!(groups.get_group("p21", "spi"), Some("spi1"));
        assert_eq!(groups.get_group("p21", "i2s"), Some("i2s1"));
        assert_eq!(groups.get_group("p19", "i2s"), None);
        assert!(groups.pin_is_group("p21", "spi"));
        assert!(!groups.pin_is_group("p21", "i2s"));
        assert!(!groups.pin_is_group("p19", "gp"));
        assert_eq!(groups.available(), vec!["i2s1", "spi1"]);
    }

    #[test]
    fn detects_ambiguous_groups() {
        let mut groups = PinGroups::new();
        groups.add("pwm0", "gp", "soc_gpio54_pn1").unwrap();
        groups.add("pwm1", "gp", "soc_gpio54_pn1").unwrap();
        assert!(matches!(groups.check_unambiguous(), Err(Error::AmbiguousGroup { .. })));
    }
}
