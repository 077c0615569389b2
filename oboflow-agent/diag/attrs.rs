//! Diagnostic attribute surface.
//!
//! The raw SPI engines are exposed to operators as a staged-transfer
//! interface: store the target fields one by one, then kick a read or a
//! write. This mirrors how engineers poke modules during bring-up without
//! going through the I2C shim. Misc board controls (reset, low-power,
//! TX-disable bitmaps) live here too.

use oboflow_raw::legacy::{SPI_MAX_PAYLOAD, TOTAL_OBO};
use oboflow_raw::misc::{self, OboInterruptStatus, OboLpwrRstControl};
use oboflow_raw::RegisterLayout;

use crate::device::{FpgaDevice, DEFAULT_PIM};
use crate::diag::hexdump::hexdump;
use crate::error::{OboflowError, Result};
use crate::spi::{
    check_ready, mrvl_check_ready, mrvl_read, mrvl_write, spi_read, spi_write, wait_module_ready,
    SpiChannel,
};

/// Staged-transfer configuration fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OboAttr {
    OboId,
    Bank,
    Page,
    Offset,
    Len,
}

/// Board-level OBO control and status bitmaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiscAttr {
    Reset,
    Lpmod,
    TxDis,
    ConnectCheck,
    Interrupt,
}

/// Parse a number the way the attribute store handlers accept it: an
/// optional `0x` prefix selects hex, otherwise decimal.
pub fn parse_value(input: &str) -> Result<u64> {
    let s = input.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|_| OboflowError::InvalidInput(format!("not a number: {s:?}")))
}

/// Parse exactly `expected` space-separated hex byte tokens.
pub fn parse_hex_bytes(input: &str, expected: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(expected);
    for token in input.split_whitespace() {
        let token = token.strip_prefix("0x").unwrap_or(token);
        let b = u8::from_str_radix(token, 16)
            .map_err(|_| OboflowError::InvalidInput(format!("bad hex byte: {token:?}")))?;
        bytes.push(b);
    }
    if bytes.len() != expected {
        return Err(OboflowError::InvalidInput(format!(
            "got {} data bytes, configured length is {}",
            bytes.len(),
            expected
        )));
    }
    Ok(bytes)
}

impl FpgaDevice {
    pub fn attr_show(&self, attr: OboAttr) -> String {
        let state = self.state.lock();
        let value = match attr {
            OboAttr::OboId => state.cfg.obo_id,
            OboAttr::Bank => state.cfg.bank,
            OboAttr::Page => state.cfg.page,
            OboAttr::Offset => state.cfg.offset,
            OboAttr::Len => state.cfg.len,
        };
        format!("0x{value:x}\n")
    }

    pub fn attr_store(&self, attr: OboAttr, input: &str) -> Result<()> {
        let value = parse_value(input)?;
        let mut state = self.state.lock();
        match attr {
            OboAttr::OboId => {
                if value >= TOTAL_OBO as u64 {
                    return Err(OboflowError::InvalidInput(format!(
                        "obo id {value} out of range (0..{TOTAL_OBO})"
                    )));
                }
                state.cfg.obo_id = value as u8;
            }
            OboAttr::Len => {
                if value == 0 || value > SPI_MAX_PAYLOAD as u64 {
                    return Err(OboflowError::InvalidLength { len: value as usize });
                }
                state.cfg.len = value as u8;
            }
            OboAttr::Bank | OboAttr::Page | OboAttr::Offset => {
                if value > 0xFF {
                    return Err(OboflowError::InvalidInput(format!(
                        "value 0x{value:x} does not fit in a byte"
                    )));
                }
                match attr {
                    OboAttr::Bank => state.cfg.bank = value as u8,
                    OboAttr::Page => state.cfg.page = value as u8,
                    OboAttr::Offset => state.cfg.offset = value as u8,
                    _ => unreachable!(),
                }
            }
        }
        Ok(())
    }

    /// Full staged configuration plus the cached page selectors, the
    /// output operators read before kicking a transfer.
    pub fn cfg_summary(&self) -> String {
        let state = self.state.lock();
        let cfg = &state.cfg;
        let mut out = format!(
            "obo_id: {}\nbank: 0x{:02x}\npage: 0x{:02x}\noffset: 0x{:02x}\nlen: {}\n",
            cfg.obo_id, cfg.bank, cfg.page, cfg.offset, cfg.len
        );
        out.push_str("page_sel:");
        for sel in state.page_sel.iter() {
            out.push_str(&format!(" {sel:02x}"));
        }
        out.push('\n');
        out.push_str("write data:\n");
        out.push_str(&hexdump(
            &cfg.write_data[..cfg.len as usize],
            cfg.offset as usize,
        ));
        out
    }

    /// Kick a read with the staged configuration on the legacy engine.
    pub fn spi_read_data(&self) -> Result<String> {
        let state = self.state.lock();
        let cfg = state.cfg.clone();
        let ch = SpiChannel::new(DEFAULT_PIM, cfg.obo_id);
        let bus = self.bus.as_ref();

        wait_module_ready(|| check_ready(bus, ch, self.poll))?;
        let mut buf = vec![0u8; cfg.len as usize];
        spi_read(bus, ch, cfg.page, cfg.offset, &mut buf, self.poll)?;

        Ok(format!(
            "SPI Data:\n{}",
            hexdump(&buf, cfg.offset as usize)
        ))
    }

    /// Kick a write of `input` (hex byte tokens, exactly the staged
    /// length) on the legacy engine.
    pub fn spi_write_data(&self, input: &str) -> Result<()> {
        let mut state = self.state.lock();
        let cfg = state.cfg.clone();
        let data = parse_hex_bytes(input, cfg.len as usize)?;
        let ch = SpiChannel::new(DEFAULT_PIM, cfg.obo_id);
        let bus = self.bus.as_ref();

        wait_module_ready(|| check_ready(bus, ch, self.poll))?;
        spi_write(bus, ch, cfg.page, cfg.offset, &data, self.poll)?;

        state.cfg.write_data[..data.len()].copy_from_slice(&data);
        Ok(())
    }

    /// Staged read on the CSR-based engine.
    pub fn mrvl_spi_read_data(&self) -> Result<String> {
        let state = self.state.lock();
        let cfg = state.cfg.clone();
        let bus = self.bus.as_ref();

        wait_module_ready(|| mrvl_check_ready(bus, cfg.obo_id, cfg.bank, self.poll))?;
        let mut buf = vec![0u8; cfg.len as usize];
        mrvl_read(
            bus, cfg.obo_id, cfg.bank, cfg.page, cfg.offset, &mut buf, self.poll,
        )?;

        Ok(format!(
            "SPI Data:\n{}",
            hexdump(&buf, cfg.offset as usize)
        ))
    }

    /// Staged write on the CSR-based engine.
    pub fn mrvl_spi_write_data(&self, input: &str) -> Result<()> {
        let mut state = self.state.lock();
        let cfg = state.cfg.clone();
        let data = parse_hex_bytes(input, cfg.len as usize)?;
        let bus = self.bus.as_ref();

        wait_module_ready(|| mrvl_check_ready(bus, cfg.obo_id, cfg.bank, self.poll))?;
        mrvl_write(
            bus, cfg.obo_id, cfg.bank, cfg.page, cfg.offset, &data, self.poll,
        )?;

        state.cfg.write_data[..data.len()].copy_from_slice(&data);
        Ok(())
    }

    pub fn misc_show(&self, attr: MiscAttr) -> Result<String> {
        let value = match attr {
            MiscAttr::Reset => {
                OboLpwrRstControl::from_reg_value(self.bus.read32(misc::regs::OBO_LPWR_RST_CTRL)?)
                    .reset
            }
            MiscAttr::Lpmod => {
                OboLpwrRstControl::from_reg_value(self.bus.read32(misc::regs::OBO_LPWR_RST_CTRL)?)
                    .lpmod
            }
            MiscAttr::TxDis => {
                (self.bus.read32(misc::regs::OBO_TXDIS_CTRL)? & 0xFFFF) as u16
            }
            MiscAttr::ConnectCheck => {
                OboInterruptStatus::from_reg_value(self.bus.read32(misc::regs::OBO_INT_STAT)?)
                    .connect_check
            }
            MiscAttr::Interrupt => {
                OboInterruptStatus::from_reg_value(self.bus.read32(misc::regs::OBO_INT_STAT)?)
                    .interrupt
            }
        };
        Ok(format!("0x{value:04x}\n"))
    }

    /// Store a 16-bit bitmap into one of the control registers; the other
    /// half of the register is preserved.
    pub fn misc_store(&self, attr: MiscAttr, input: &str) -> Result<()> {
        let value = parse_value(input)?;
        if value > 0xFFFF {
            return Err(OboflowError::InvalidInput(format!(
                "bitmap 0x{value:x} does not fit in 16 bits"
            )));
        }
        let value = value as u16;

        match attr {
            MiscAttr::Reset => {
                let mut ctrl = OboLpwrRstControl::from_reg_value(
                    self.bus.read32(misc::regs::OBO_LPWR_RST_CTRL)?,
                );
                ctrl.reset = value;
                self.bus
                    .write32(misc::regs::OBO_LPWR_RST_CTRL, ctrl.to_reg_value())
            }
            MiscAttr::Lpmod => {
                let mut ctrl = OboLpwrRstControl::from_reg_value(
                    self.bus.read32(misc::regs::OBO_LPWR_RST_CTRL)?,
                );
                ctrl.lpmod = value;
                self.bus
                    .write32(misc::regs::OBO_LPWR_RST_CTRL, ctrl.to_reg_value())
            }
            MiscAttr::TxDis => {
                let current = self.bus.read32(misc::regs::OBO_TXDIS_CTRL)?;
                self.bus.write32(
                    misc::regs::OBO_TXDIS_CTRL,
                    (current & 0xFFFF_0000) | value as u32,
                )
            }
            MiscAttr::ConnectCheck | MiscAttr::Interrupt => Err(OboflowError::Unsupported(
                "status bitmaps are read-only".to_string(),
            )),
        }
    }
}
