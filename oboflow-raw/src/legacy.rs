//! Legacy descriptor-based OBO SPI master register definitions
//!
//! The first-generation DOM FPGA exposes one SPI master per retimer channel
//! (rtc) inside each PIM register block. A transaction is configured by a
//! pair of descriptor words; writing the "low" word is what triggers the
//! hardware transfer. Data moves through fixed write/read windows that are
//! only 32-bit addressable.
//!
//! Every transfer on the wire carries a 6-byte protocol header in front of
//! the payload, so the descriptor length field always encodes
//! `payload + SPI_HEADER_BYTES`, never the raw payload length.

use crate::register::RegisterLayout;

/// Number of OBO ports on the largest board variant
pub const TOTAL_OBO: usize = 16;

/// Fixed protocol header length prepended to every transfer
pub const SPI_HEADER_BYTES: usize = 6;

/// Payload limit imposed by the descriptor length field and data windows
pub const SPI_MAX_PAYLOAD: usize = 128;

/// Byte offset of the write-ready (flow control) byte inside the read window
pub const WRITE_READY_BYTE_OFFSET: u32 = 5;

/// Mode/validity word written to the descriptor high register before a
/// transfer is triggered
pub const DESC_MODE_WORD: u32 = 0x03;

/// Done flag in the descriptor high register; write 1 to acknowledge/clear
pub const DESC_DONE_BIT: u32 = 0x0000_0001;

/// Settle time after pulsing the SPI bus reset bit, in microseconds
pub const SPI_RESET_SETTLE_US: u64 = 1;

/// BAR offsets for the per-PIM SPI master blocks
pub mod regs {
    /// First PIM register block
    pub const PIM_BASE_ADDR: u32 = 0x4_0000;

    /// Stride between PIM register blocks
    pub const PIM_REG_SIZE: u32 = 0x8000;

    /// Scratchpad register inside a PIM block
    pub const PIM_SCRTCHPD_OFFSET: u32 = 0x04;

    /// SPI master CSR block inside a PIM block
    pub const SPI_MASTER_CSR_BASE: u32 = 0x600;

    /// Stride between per-rtc CSR blocks
    pub const SPI_CFG_SIZE: u32 = 0x20;

    /// Clock/timing configuration register inside a CSR block
    pub const SPI_CLK_CFG_OFFSET: u32 = 0x00;

    /// Self-clearing bus reset register inside a CSR block
    pub const SPI_RST_OFFSET: u32 = 0x08;

    /// Descriptor low register inside a CSR block (writing it triggers)
    pub const SPI_DSC_L_OFFSET: u32 = 0x10;

    /// Descriptor high (mode/status) register inside a CSR block
    pub const SPI_DSC_H_OFFSET: u32 = 0x14;

    /// Data write window base inside a PIM block
    pub const SPI_W_DATA_BASE: u32 = 0x2000;

    /// Data read window base inside a PIM block
    pub const SPI_R_DATA_BASE: u32 = 0x3000;

    /// Stride between per-rtc data windows
    pub const SPI_DATA_SIZE: u32 = 0x100;

    /// Base of a PIM register block; `pim` is 1-based
    pub const fn pim_base(pim: u8) -> u32 {
        PIM_BASE_ADDR + (pim as u32 - 1) * PIM_REG_SIZE
    }

    /// Scratchpad register of a PIM block
    pub const fn scratchpad(pim: u8) -> u32 {
        pim_base(pim) + PIM_SCRTCHPD_OFFSET
    }

    /// Clock configuration register of an rtc channel
    pub const fn clk_cfg(pim: u8, rtc: u8) -> u32 {
        pim_base(pim) + SPI_MASTER_CSR_BASE + SPI_CFG_SIZE * rtc as u32 + SPI_CLK_CFG_OFFSET
    }

    /// Bus reset register of an rtc channel
    pub const fn bus_reset(pim: u8, rtc: u8) -> u32 {
        pim_base(pim) + SPI_MASTER_CSR_BASE + SPI_CFG_SIZE * rtc as u32 + SPI_RST_OFFSET
    }

    /// Descriptor low register of an rtc channel
    pub const fn desc_low(pim: u8, rtc: u8) -> u32 {
        pim_base(pim) + SPI_MASTER_CSR_BASE + SPI_CFG_SIZE * rtc as u32 + SPI_DSC_L_OFFSET
    }

    /// Descriptor high register of an rtc channel
    pub const fn desc_high(pim: u8, rtc: u8) -> u32 {
        pim_base(pim) + SPI_MASTER_CSR_BASE + SPI_CFG_SIZE * rtc as u32 + SPI_DSC_H_OFFSET
    }

    /// Data write window of an rtc channel
    pub const fn data_write(pim: u8, rtc: u8) -> u32 {
        pim_base(pim) + SPI_W_DATA_BASE + SPI_DATA_SIZE * rtc as u32
    }

    /// Data read window of an rtc channel
    pub const fn data_read(pim: u8, rtc: u8) -> u32 {
        pim_base(pim) + SPI_R_DATA_BASE + SPI_DATA_SIZE * rtc as u32
    }
}

/// Preamble word written to the data write window ahead of every transfer
///
/// ## Register Format
///
/// | Bits   | Field     | Description                              |
/// |--------|-----------|------------------------------------------|
/// | 7      | write     | Transfer direction, set for writes       |
/// | 8-15   | byte_len  | Payload length minus one                 |
/// | 16-23  | page      | Module memory page                       |
/// | 24-31  | offset    | Start offset within the page             |
#[derive(Debug, Clone, Copy)]
pub struct SpiPreamble {
    /// Transfer direction, set for writes (bit 7)
    pub write: bool,

    /// Payload length in bytes, 1..=128; encoded as `byte_len - 1`
    pub byte_len: u8,

    /// Module memory page (bits 16-23)
    pub page: u8,

    /// Start offset within the page (bits 24-31)
    pub offset: u8,
}

impl Default for SpiPreamble {
    fn default() -> Self {
        Self {
            write: false,
            byte_len: 1,
            page: 0,
            offset: 0,
        }
    }
}

impl RegisterLayout for SpiPreamble {
    fn to_reg_value(&self) -> u32 {
        (if self.write { 0x80 } else { 0 })
            | (((self.byte_len as u32).wrapping_sub(1) & 0xFF) << 8)
            | ((self.page as u32) << 16)
            | ((self.offset as u32) << 24)
    }

    fn from_reg_value(value: u32) -> Self {
        Self {
            write: (value & 0x80) != 0,
            byte_len: (((value >> 8) & 0xFF) as u8).wrapping_add(1),
            page: ((value >> 16) & 0xFF) as u8,
            offset: ((value >> 24) & 0xFF) as u8,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.byte_len == 0 {
            return Err("Payload length must be at least 1");
        }
        if self.byte_len as usize > SPI_MAX_PAYLOAD {
            return Err("Payload length must be <= 128");
        }
        Ok(())
    }
}

/// Descriptor low word; writing this register starts the transfer
///
/// ## Register Format
///
/// | Bits   | Field      | Description                                  |
/// |--------|------------|----------------------------------------------|
/// | 0      | done_int   | Raise interrupt on completion                |
/// | 1      | err_int    | Raise interrupt on error                     |
/// | 8-17   | data_bytes | Total wire length: payload + 6 header bytes  |
/// | 30     | write      | Transfer direction                           |
/// | 31     | valid      | Descriptor valid                             |
#[derive(Debug, Clone, Copy, Default)]
pub struct SpiDescriptorLow {
    /// Descriptor valid (bit 31)
    pub valid: bool,

    /// Transfer direction, set for writes (bit 30)
    pub write: bool,

    /// Total wire length: payload plus the 6-byte header (bits 8-17)
    pub data_bytes: u16,

    /// Raise interrupt on error (bit 1)
    pub err_int: bool,

    /// Raise interrupt on completion (bit 0)
    pub done_int: bool,
}

impl SpiDescriptorLow {
    /// Descriptor for a transfer of `payload_len` bytes, with both
    /// interrupt enables set the way the hardware expects
    pub fn for_payload(payload_len: u8, write: bool) -> Self {
        Self {
            valid: true,
            write,
            data_bytes: payload_len as u16 + SPI_HEADER_BYTES as u16,
            err_int: true,
            done_int: true,
        }
    }
}

impl RegisterLayout for SpiDescriptorLow {
    fn to_reg_value(&self) -> u32 {
        (if self.valid { 1 << 31 } else { 0 })
            | (if self.write { 1 << 30 } else { 0 })
            | (((self.data_bytes as u32) & 0x3FF) << 8)
            | (if self.err_int { 1 << 1 } else { 0 })
            | (if self.done_int { 1 << 0 } else { 0 })
    }

    fn from_reg_value(value: u32) -> Self {
        Self {
            valid: (value & (1 << 31)) != 0,
            write: (value & (1 << 30)) != 0,
            data_bytes: ((value >> 8) & 0x3FF) as u16,
            err_int: (value & (1 << 1)) != 0,
            done_int: (value & (1 << 0)) != 0,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.data_bytes as usize > SPI_MAX_PAYLOAD + SPI_HEADER_BYTES {
            return Err("Wire length must be <= 134 (128 payload + 6 header)");
        }
        if (self.data_bytes as usize) < SPI_HEADER_BYTES {
            return Err("Wire length must include the 6-byte header");
        }
        Ok(())
    }
}

/// Completion state read back from the descriptor high register
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorStatus {
    /// Transfer complete (bit 0); write 1 to acknowledge
    pub done: bool,
    /// Transfer error (bit 1)
    pub error: bool,
}

impl RegisterLayout for DescriptorStatus {
    fn to_reg_value(&self) -> u32 {
        (if self.done { 1 << 0 } else { 0 }) | (if self.error { 1 << 1 } else { 0 })
    }

    fn from_reg_value(value: u32) -> Self {
        Self {
            done: (value & (1 << 0)) != 0,
            error: (value & (1 << 1)) != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preamble_round_trip() {
        let pre = SpiPreamble {
            write: true,
            byte_len: 128,
            page: 0xA0,
            offset: 0x80,
        };
        assert!(pre.validate().is_ok());

        let decoded = SpiPreamble::from_reg_value(pre.to_reg_value());
        assert!(decoded.write);
        assert_eq!(decoded.byte_len, 128);
        assert_eq!(decoded.page, 0xA0);
        assert_eq!(decoded.offset, 0x80);
    }

    #[test]
    fn test_preamble_encodes_len_minus_one() {
        let pre = SpiPreamble {
            write: false,
            byte_len: 4,
            page: 0,
            offset: 0x10,
        };
        let value = pre.to_reg_value();
        assert_eq!((value >> 8) & 0xFF, 3);
        assert_eq!(value & 0x80, 0);
    }

    #[test]
    fn test_preamble_validation() {
        let mut pre = SpiPreamble::default();
        assert!(pre.validate().is_ok());

        pre.byte_len = 0;
        assert!(pre.validate().is_err());

        pre.byte_len = 129;
        assert!(pre.validate().is_err());
    }

    #[test]
    fn test_descriptor_low_encoding() {
        let desc = SpiDescriptorLow::for_payload(1, false);
        assert!(desc.validate().is_ok());
        // valid + len 7 + err_int + done_int, direction clear
        assert_eq!(desc.to_reg_value(), 0x8000_0000 | (7 << 8) | 0x2 | 0x1);

        let desc = SpiDescriptorLow::for_payload(16, true);
        assert_eq!(
            desc.to_reg_value(),
            0x8000_0000 | (1 << 30) | (22 << 8) | 0x2 | 0x1
        );
    }

    #[test]
    fn test_descriptor_status_decoding() {
        let status = DescriptorStatus::from_reg_value(DESC_MODE_WORD);
        assert!(status.done);
        assert!(status.error);

        let status = DescriptorStatus::from_reg_value(0);
        assert!(!status.done);
    }

    #[test]
    fn test_register_addresses() {
        assert_eq!(regs::pim_base(1), 0x4_0000);
        assert_eq!(regs::pim_base(2), 0x4_8000);
        assert_eq!(regs::desc_low(1, 0), 0x4_0610);
        assert_eq!(regs::desc_high(1, 0), 0x4_0614);
        assert_eq!(regs::desc_low(1, 1), 0x4_0630);
        assert_eq!(regs::data_write(1, 0), 0x4_2000);
        assert_eq!(regs::data_read(1, 2), 0x4_3200);
    }

    #[test]
    fn test_channel_windows_never_alias() {
        // CSR blocks and data windows of all 16 channels must be disjoint.
        let mut spans: Vec<(u32, u32)> = Vec::new();
        for rtc in 0..TOTAL_OBO as u8 {
            spans.push((regs::clk_cfg(1, rtc), regs::SPI_CFG_SIZE));
            spans.push((regs::data_write(1, rtc), regs::SPI_DATA_SIZE));
            spans.push((regs::data_read(1, rtc), regs::SPI_DATA_SIZE));
        }
        for (i, &(a_start, a_len)) in spans.iter().enumerate() {
            for &(b_start, b_len) in spans.iter().skip(i + 1) {
                let disjoint = a_start + a_len <= b_start || b_start + b_len <= a_start;
                assert!(disjoint, "spans 0x{a_start:x} and 0x{b_start:x} overlap");
            }
        }
    }
}
