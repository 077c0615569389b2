//! Board-level FPGA registers: identification, scratch and OBO misc control
//!
//! These sit in the low IOB block of the BAR, ahead of the SPI master
//! blocks. The OBO control words pack two 16-port bitmaps per register.

use crate::register::RegisterLayout;

/// BAR offsets for the IOB block
pub mod regs {
    /// FPGA revision register
    pub const IOB_REV: u32 = 0x00;

    /// Scratch register used for sanity writes
    pub const SCRATCH: u32 = 0x08;

    /// Board type register checked at attach time
    pub const FPGA_TYPE: u32 = 0x0C;

    /// Misc control register carrying the BMC-present flag
    pub const OTHER_CR: u32 = 0x14;

    /// OBO low-power / reset bitmaps
    pub const OBO_LPWR_RST_CTRL: u32 = 0x30;

    /// OBO TX-disable bitmap
    pub const OBO_TXDIS_CTRL: u32 = 0x34;

    /// OBO interrupt / connect-check bitmaps
    pub const OBO_INT_STAT: u32 = 0x38;
}

/// Board type value identifying the supported FPGA build
pub const FPGA_TYPE_EXPECTED: u32 = 0x10;

/// Bit in `OTHER_CR` that is clear when a BMC is present
pub const BMC_PRESENT_BIT: u32 = 8;

/// Per-port reset and low-power bitmaps
///
/// ## Register Format
///
/// | Bits   | Field | Description                       |
/// |--------|-------|-----------------------------------|
/// | 0-15   | lpmod | Low-power mode, one bit per port  |
/// | 16-31  | reset | Module reset, one bit per port    |
#[derive(Debug, Clone, Copy, Default)]
pub struct OboLpwrRstControl {
    /// Module reset bitmap (bits 16-31)
    pub reset: u16,
    /// Low-power mode bitmap (bits 0-15)
    pub lpmod: u16,
}

impl RegisterLayout for OboLpwrRstControl {
    fn to_reg_value(&self) -> u32 {
        ((self.reset as u32) << 16) | self.lpmod as u32
    }

    fn from_reg_value(value: u32) -> Self {
        Self {
            reset: (value >> 16) as u16,
            lpmod: (value & 0xFFFF) as u16,
        }
    }
}

/// Per-port interrupt and connect-check bitmaps
///
/// ## Register Format
///
/// | Bits   | Field         | Description                          |
/// |--------|---------------|--------------------------------------|
/// | 0-15   | connect_check | Module presence, one bit per port    |
/// | 16-31  | interrupt     | Latched interrupt, one bit per port  |
#[derive(Debug, Clone, Copy, Default)]
pub struct OboInterruptStatus {
    /// Latched interrupt bitmap (bits 16-31)
    pub interrupt: u16,
    /// Connect-check bitmap (bits 0-15)
    pub connect_check: u16,
}

impl RegisterLayout for OboInterruptStatus {
    fn to_reg_value(&self) -> u32 {
        ((self.interrupt as u32) << 16) | self.connect_check as u32
    }

    fn from_reg_value(value: u32) -> Self {
        Self {
            interrupt: (value >> 16) as u16,
            connect_check: (value & 0xFFFF) as u16,
        }
    }
}
