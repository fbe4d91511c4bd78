use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while configuring the 40-pin header.
///
/// Every variant aborts the current operation. Nothing is retried: each one
/// points at a stale device tree, a malformed board file or bad user input.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown pin {0}!")]
    UnknownPin(String),

    #[error("Pin group {0} is not supported!")]
    UnsupportedGroup(String),

    #[error("Invalid function {function} for pin {pin}!")]
    InvalidFunction { pin: String, function: String },

    #[error("Invalid pin index {0}!")]
    InvalidIndex(usize),

    #[error("Duplicate definitions for pin {0}!")]
    DuplicateSlot(usize),

    #[error("Function mismatch for group {group}: {expected} != {found}!")]
    FunctionMismatch {
        group: String,
        expected: String,
        found: String,
    },

    #[error("Pin {pin} with function {function} belongs to both {first} and {second}!")]
    AmbiguousGroup {
        pin: String,
        function: String,
        first: String,
        second: String,
    },

    #[error("Failed to run `{command}`: {message}")]
    ToolInvocation { command: String, message: String },

    #[error("Device-tree tool {0} not found!")]
    MissingTool(String),

    #[error("No board data found for {0}!")]
    NoBoardData(String),

    #[error("Invalid board data in {path}: {message}")]
    BoardData { path: PathBuf, message: String },

    #[error("No DTB found for {0}!")]
    NoDtb(String),

    #[error("Multiple DTBs found for {model}: {first} and {second}!")]
    MultipleDtbs {
        model: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("DT Overlay for 40pin Header not found!")]
    HeaderOverlayNotFound,

    #[error("Multiple DT overlays for '{name}' found! Please remove duplicate(s)\n{}\n{}", first.display(), second.display())]
    DuplicateOverlay {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("No overlay found for {0}!")]
    UnknownHardwareAddon(String),

    #[error("Malformed overlay {}: {message}", path.display())]
    MalformedOverlay { path: PathBuf, message: String },

    #[error("{}: {message}", path.display())]
    FileAccess { path: PathBuf, message: String },

    #[error("Pin control: {0}")]
    PinMux(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
