//! I2C-to-SPI translation for one OBO port.
//!
//! Module memory follows the usual two-level layout: offsets 0x00..0x7F
//! address the fixed lower page, offsets 0x80..0xFF address whichever
//! upper page is selected through the page-select byte at 0x7F. The
//! selector cannot be read back cheaply, so each port caches the value
//! last seen on the wire and the cache is committed only after the
//! underlying SPI transaction succeeded.

use oboflow_raw::legacy::SPI_MAX_PAYLOAD;

use crate::device::{DeviceState, FpgaDevice, DEFAULT_PIM};
use crate::error::{OboflowError, Result};
use crate::spi::{check_ready, spi_read, spi_write, wait_module_ready, FlowStatus, SpiChannel};

/// The only I2C address emulated: the module EEPROM.
pub const OPTIC_EEPROM_ADDR: u16 = 0x50;

/// Offset of the upper-page selector within the lower page.
pub const PAGE_SELECT_OFFSET: u8 = 0x7F;

/// First offset addressed through the selected upper page.
const UPPER_PAGE_START: u8 = 0x80;

/// One message of a combined I2C transfer.
pub struct I2cMessage<'a> {
    pub addr: u16,
    pub read: bool,
    pub buf: &'a mut [u8],
}

/// Virtual I2C adapter in front of one OBO module.
pub struct VirtualPort<'a> {
    device: &'a FpgaDevice,
    port: u8,
}

impl<'a> VirtualPort<'a> {
    pub(crate) fn new(device: &'a FpgaDevice, port: u8) -> Self {
        Self { device, port }
    }

    /// Adapter name as exposed to userspace, 1-based like the faceplate.
    pub fn name(&self) -> String {
        format!("OBO_{}", self.port + 1)
    }

    pub fn port_index(&self) -> u8 {
        self.port
    }

    fn check_addr(&self, addr: u16) -> Result<()> {
        if addr != OPTIC_EEPROM_ADDR {
            return Err(OboflowError::AddressNotEmulated { addr });
        }
        Ok(())
    }

    /// SMBus quick probe. Acknowledged without touching the module so bus
    /// scans stay cheap and side-effect free.
    pub fn smbus_quick(&self, addr: u16) -> Result<()> {
        self.check_addr(addr)
    }

    /// SMBus receive-byte. Same probe treatment as quick.
    pub fn smbus_receive_byte(&self, addr: u16) -> Result<u8> {
        self.check_addr(addr)?;
        Ok(0)
    }

    pub fn smbus_read_byte_data(&self, addr: u16, command: u8) -> Result<u8> {
        self.check_addr(addr)?;
        let mut buf = [0u8; 1];
        let mut state = self.device.state.lock();
        self.eeprom_read(&mut state, command, &mut buf)?;
        Ok(buf[0])
    }

    pub fn smbus_write_byte_data(&self, addr: u16, command: u8, value: u8) -> Result<()> {
        self.check_addr(addr)?;
        let mut state = self.device.state.lock();
        self.eeprom_write(&mut state, command, &[value])
    }

    /// Combined transfer, the shape the I2C core hands to an adapter: a
    /// write of the command byte optionally followed by a read, or a
    /// single write carrying command plus payload.
    pub fn transfer(&self, msgs: &mut [I2cMessage<'_>]) -> Result<()> {
        for msg in msgs.iter() {
            self.check_addr(msg.addr)?;
        }

        match msgs {
            [cmd, data] if !cmd.read && cmd.buf.len() == 1 && data.read => {
                let command = cmd.buf[0];
                let mut state = self.device.state.lock();
                self.eeprom_read(&mut state, command, data.buf)
            }
            [cmd] if !cmd.read && cmd.buf.len() >= 2 => {
                let command = cmd.buf[0];
                let mut state = self.device.state.lock();
                let payload: Vec<u8> = cmd.buf[1..].to_vec();
                self.eeprom_write(&mut state, command, &payload)
            }
            _ => Err(OboflowError::Unsupported(format!(
                "transfer shape ({} messages) not emulated",
                msgs.len()
            ))),
        }
    }

    /// Resolve the module page for an access starting at `offset`: the
    /// lower half always maps to page 0, the upper half to the cached
    /// selector.
    fn resolve_page(&self, state: &DeviceState, offset: u8) -> u8 {
        if offset < UPPER_PAGE_START {
            0
        } else {
            state.page_sel[self.port as usize]
        }
    }

    fn check_span(&self, offset: u8, len: usize) -> Result<()> {
        if len == 0 || len > SPI_MAX_PAYLOAD {
            return Err(OboflowError::InvalidLength { len });
        }
        if offset as usize + len > 256 {
            return Err(OboflowError::InvalidInput(format!(
                "access at 0x{:02x} len {} runs past the page boundary",
                offset, len
            )));
        }
        Ok(())
    }

    fn channel(&self) -> SpiChannel {
        SpiChannel::new(DEFAULT_PIM, self.port)
    }

    fn eeprom_read(&self, state: &mut DeviceState, offset: u8, buf: &mut [u8]) -> Result<()> {
        self.check_span(offset, buf.len())?;
        let page = self.resolve_page(state, offset);
        let bus = self.device.bus.as_ref();
        let ch = self.channel();
        let poll = self.device.poll;

        wait_module_ready(|| check_ready(bus, ch, poll))?;
        if spi_read(bus, ch, page, offset, buf, poll)? == FlowStatus::Busy {
            tracing::warn!("port {} read raced a module commit, data may be stale", self.port);
        }

        // A read that covers the selector refreshes the cache; the wire
        // value is authoritative.
        if let Some(idx) = span_index_of(offset, buf.len(), PAGE_SELECT_OFFSET) {
            state.page_sel[self.port as usize] = buf[idx];
        }
        Ok(())
    }

    fn eeprom_write(&self, state: &mut DeviceState, offset: u8, data: &[u8]) -> Result<()> {
        self.check_span(offset, data.len())?;
        let page = self.resolve_page(state, offset);
        let bus = self.device.bus.as_ref();
        let ch = self.channel();
        let poll = self.device.poll;

        wait_module_ready(|| check_ready(bus, ch, poll))?;
        spi_write(bus, ch, page, offset, data, poll)?;

        // Commit the selector cache only now that the hardware accepted
        // the write; a failed transaction must not poison later routing.
        if let Some(idx) = span_index_of(offset, data.len(), PAGE_SELECT_OFFSET) {
            state.page_sel[self.port as usize] = data[idx];
            tracing::debug!("port {} page select -> 0x{:02x}", self.port, data[idx]);
        }
        Ok(())
    }
}

/// Index of `target` within the span `[offset, offset + len)`, if covered.
fn span_index_of(offset: u8, len: usize, target: u8) -> Option<usize> {
    let target = target as usize;
    let offset = offset as usize;
    (offset..offset + len).contains(&target).then(|| target - offset)
}
