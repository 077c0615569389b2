pub mod common;
pub mod device;
pub mod diag;
pub mod error;
pub mod i2c;
pub mod spi;

#[cfg(test)]
mod testutil;

pub use common::{BarBus, RegisterBus};
pub use device::{FpgaDevice, OboConfig, DEFAULT_PIM};
pub use diag::{MiscAttr, OboAttr};
pub use error::{OboflowError, Result};
pub use i2c::{I2cMessage, VirtualPort, OPTIC_EEPROM_ADDR};
pub use spi::{FlowStatus, PollSpec, SpiChannel};
