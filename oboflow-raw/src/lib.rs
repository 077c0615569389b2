//! # oboflow-raw
//!
//! Register definitions for the switch-board FPGA that fronts on-board
//! optics (OBO) modules.
//!
//! This crate provides type-safe abstractions over the FPGA's PCI BAR
//! register space: the legacy descriptor-based OBO SPI master, the newer
//! control/status-register SPI master, and the board-level transceiver
//! control words.
//!
//! ## Usage
//!
//! ```ignore
//! use oboflow_raw::legacy::{self, SpiDescriptorLow};
//! use oboflow_raw::{read32, write32, RegisterLayout};
//!
//! // Compute channel register addresses
//! let desc_low = legacy::regs::desc_low(1, 3);
//!
//! // Type-safe register programming
//! let desc = SpiDescriptorLow::for_payload(16, false);
//! desc.validate()?;
//!
//! write32("0000:04:00.0", desc_low, desc.to_reg_value())?;
//! ```

pub mod bar;
pub mod legacy;
pub mod misc;
pub mod mrvl;
pub mod register;

// Re-export for convenience
pub use bar::{read32, read8, write32, BarError, Result};
pub use register::{Register, RegisterLayout};
