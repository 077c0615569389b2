//! Control/status-register based OBO SPI master register definitions
//!
//! The second-generation FPGA drops the descriptor pair in favour of a
//! single packed transfer-info word per channel plus separate control and
//! status registers. There is no wire header: the data window carries the
//! payload bytes directly, and flow control is reported through a status
//! bit instead of an in-band byte.

use crate::register::RegisterLayout;

/// Payload limit imposed by the transfer-info length field (7 bits, len-1)
pub const MRVL_MAX_PAYLOAD: usize = 128;

/// Direction values written to the control register
pub const MRVL_CTRL_READ: u32 = 0;
pub const MRVL_CTRL_WRITE: u32 = 1;

/// BAR offsets for the per-OBO SPI channels
pub mod regs {
    /// First OBO SPI channel block
    pub const MRVL_SPI_CSR_BASE: u32 = 0x1_0000;

    /// Stride between OBO SPI channel blocks
    pub const MRVL_SPI_CSR_SIZE: u32 = 0x100;

    /// Packed transfer-info register inside a channel block
    pub const MRVL_XFER_INFO_OFFSET: u32 = 0x00;

    /// Direction control register inside a channel block
    pub const MRVL_CTRL_OFFSET: u32 = 0x04;

    /// Status/trigger register inside a channel block
    pub const MRVL_STATUS_OFFSET: u32 = 0x08;

    /// Self-clearing bus reset register inside a channel block
    pub const MRVL_RST_OFFSET: u32 = 0x0C;

    /// 128-byte data window inside a channel block
    pub const MRVL_DATA_OFFSET: u32 = 0x80;

    /// Base of an OBO SPI channel block; `obo` is 0-based
    pub const fn channel_base(obo: u8) -> u32 {
        MRVL_SPI_CSR_BASE + MRVL_SPI_CSR_SIZE * obo as u32
    }

    /// Transfer-info register of an OBO channel
    pub const fn xfer_info(obo: u8) -> u32 {
        channel_base(obo) + MRVL_XFER_INFO_OFFSET
    }

    /// Control register of an OBO channel
    pub const fn ctrl(obo: u8) -> u32 {
        channel_base(obo) + MRVL_CTRL_OFFSET
    }

    /// Status register of an OBO channel
    pub const fn status(obo: u8) -> u32 {
        channel_base(obo) + MRVL_STATUS_OFFSET
    }

    /// Bus reset register of an OBO channel
    pub const fn bus_reset(obo: u8) -> u32 {
        channel_base(obo) + MRVL_RST_OFFSET
    }

    /// Data window of an OBO channel
    pub const fn data(obo: u8) -> u32 {
        channel_base(obo) + MRVL_DATA_OFFSET
    }
}

/// Packed transfer-info word
///
/// ## Register Format
///
/// | Bits   | Field    | Description                    |
/// |--------|----------|--------------------------------|
/// | 0-6    | byte_len | Payload length minus one       |
/// | 8-15   | bank     | Module bank selector           |
/// | 16-23  | page     | Module memory page             |
/// | 24-31  | offset   | Start offset within the page   |
#[derive(Debug, Clone, Copy)]
pub struct MrvlXferInfo {
    /// Payload length in bytes, 1..=128; encoded as `byte_len - 1`
    pub byte_len: u8,

    /// Module bank selector (bits 8-15)
    pub bank: u8,

    /// Module memory page (bits 16-23)
    pub page: u8,

    /// Start offset within the page (bits 24-31)
    pub offset: u8,
}

impl Default for MrvlXferInfo {
    fn default() -> Self {
        Self {
            byte_len: 1,
            bank: 0,
            page: 0,
            offset: 0,
        }
    }
}

impl RegisterLayout for MrvlXferInfo {
    fn to_reg_value(&self) -> u32 {
        ((self.byte_len as u32).wrapping_sub(1) & 0x7F)
            | ((self.bank as u32) << 8)
            | ((self.page as u32) << 16)
            | ((self.offset as u32) << 24)
    }

    fn from_reg_value(value: u32) -> Self {
        Self {
            byte_len: ((value & 0x7F) as u8) + 1,
            bank: ((value >> 8) & 0xFF) as u8,
            page: ((value >> 16) & 0xFF) as u8,
            offset: ((value >> 24) & 0xFF) as u8,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.byte_len == 0 {
            return Err("Payload length must be at least 1");
        }
        if self.byte_len as usize > MRVL_MAX_PAYLOAD {
            return Err("Payload length must be <= 128");
        }
        Ok(())
    }
}

/// Status register layout
///
/// Writing 1 to `start` triggers the transfer programmed in the
/// transfer-info and control registers; the engine sets `done` on
/// completion, which is cleared by writing 1 back.
///
/// ## Register Format
///
/// | Bits   | Field     | Description                                |
/// |--------|-----------|--------------------------------------------|
/// | 0      | start     | Write 1 to trigger; reads back as busy     |
/// | 1      | done      | Transfer complete; write 1 to clear        |
/// | 2      | error     | Transfer error                             |
/// | 8      | not_ready | Module mid-transaction, data may be stale  |
#[derive(Debug, Clone, Copy, Default)]
pub struct MrvlStatus {
    /// Trigger/busy (bit 0)
    pub start: bool,
    /// Transfer complete (bit 1)
    pub done: bool,
    /// Transfer error (bit 2)
    pub error: bool,
    /// Module flow-control: still settling, data may be stale (bit 8)
    pub not_ready: bool,
}

/// Status register bit positions
pub const MRVL_STATUS_START_BIT: u32 = 1 << 0;
pub const MRVL_STATUS_DONE_BIT: u32 = 1 << 1;
pub const MRVL_STATUS_ERROR_BIT: u32 = 1 << 2;
pub const MRVL_STATUS_NOT_READY_BIT: u32 = 1 << 8;

impl RegisterLayout for MrvlStatus {
    fn to_reg_value(&self) -> u32 {
        (if self.start { MRVL_STATUS_START_BIT } else { 0 })
            | (if self.done { MRVL_STATUS_DONE_BIT } else { 0 })
            | (if self.error { MRVL_STATUS_ERROR_BIT } else { 0 })
            | (if self.not_ready {
                MRVL_STATUS_NOT_READY_BIT
            } else {
                0
            })
    }

    fn from_reg_value(value: u32) -> Self {
        Self {
            start: (value & MRVL_STATUS_START_BIT) != 0,
            done: (value & MRVL_STATUS_DONE_BIT) != 0,
            error: (value & MRVL_STATUS_ERROR_BIT) != 0,
            not_ready: (value & MRVL_STATUS_NOT_READY_BIT) != 0,
        }
    }
}
