pub mod board;
pub mod board_data;
pub mod config;
pub mod dtc;
pub mod error;
pub mod extlinux;
pub mod fio;
pub mod header;
pub mod header_pins;
pub mod pin;
pub mod pingroup;
pub mod pinmux;

pub use board::Board;
pub use board_data::BoardData;
pub use config::Config;
pub use dtc::{DeviceTree, FdtTools, PropType};
pub use error::{Error, Result};
pub use header::Header;
pub use header_pins::HeaderPins;
pub use pin::Pin;
pub use pingroup::{PinGroup, PinGroups};
pub use pinmux::{PinCtrl, PinMux};
