//! Virtual I2C ports in front of the OBO modules.
//!
//! The optics management stack speaks I2C to a module EEPROM at address
//! 0x50; the FPGA speaks SPI. [`shim`] translates between the two, one
//! virtual port per OBO channel, including the page-banking convention of
//! the module memory map.

pub mod shim;

pub use shim::{I2cMessage, VirtualPort, OPTIC_EEPROM_ADDR, PAGE_SELECT_OFFSET};
