//! CSR-based OBO SPI transaction engine for second-generation FPGAs.
//!
//! The descriptor pair is replaced by a packed transfer-info word, a
//! direction register and a status register per channel. There is no wire
//! header: the data window carries payload bytes directly, and module flow
//! control is a status bit instead of an in-band byte.

use std::time::Duration;

use oboflow_raw::legacy::SPI_RESET_SETTLE_US;
use oboflow_raw::mrvl::{
    regs, MrvlXferInfo, MRVL_CTRL_READ, MRVL_CTRL_WRITE, MRVL_MAX_PAYLOAD, MRVL_STATUS_DONE_BIT,
    MRVL_STATUS_ERROR_BIT, MRVL_STATUS_NOT_READY_BIT, MRVL_STATUS_START_BIT,
};
use oboflow_raw::RegisterLayout;

use crate::common::RegisterBus;
use crate::error::{OboflowError, Result};
use crate::spi::wait::{wait_for_set, PollSpec};
use crate::spi::FlowStatus;

fn check_len(len: usize) -> Result<()> {
    if len == 0 || len > MRVL_MAX_PAYLOAD {
        return Err(OboflowError::InvalidLength { len });
    }
    Ok(())
}

/// A completion bit left set by a previous transaction is stale state;
/// acknowledge it before arming a new transfer.
fn settle_previous(bus: &dyn RegisterBus, status: u32) -> Result<()> {
    let value = bus.read32(status)?;
    if value & MRVL_STATUS_DONE_BIT != 0 {
        tracing::debug!("clearing stale done bit on reg 0x{:x}", status);
        bus.write32(status, MRVL_STATUS_DONE_BIT)?;
    }
    Ok(())
}

/// Arm and trigger one transfer, then poll it to completion.
fn run_transfer(
    bus: &dyn RegisterBus,
    obo: u8,
    info: MrvlXferInfo,
    direction: u32,
    poll: PollSpec,
) -> Result<u32> {
    let status = regs::status(obo);

    settle_previous(bus, status)?;

    bus.write32(regs::xfer_info(obo), info.to_reg_value())?;
    bus.write32(regs::ctrl(obo), direction)?;
    bus.write32(status, MRVL_STATUS_START_BIT)?;

    let value = match wait_for_set(bus, status, MRVL_STATUS_DONE_BIT, poll) {
        Ok(value) => value,
        Err(e @ OboflowError::Timeout { .. }) => {
            let _ = bus.write32(status, MRVL_STATUS_DONE_BIT);
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    if value & MRVL_STATUS_ERROR_BIT != 0 {
        return Err(OboflowError::TransferError { reg: status });
    }
    Ok(value)
}

/// Read `buf.len()` bytes from module memory at `bank`/`page`/`offset`.
///
/// Returns `FlowStatus::Busy` when the status register reported the module
/// mid-transaction; the data is returned regardless and the caller decides
/// whether to retry.
pub fn mrvl_read(
    bus: &dyn RegisterBus,
    obo: u8,
    bank: u8,
    page: u8,
    offset: u8,
    buf: &mut [u8],
    poll: PollSpec,
) -> Result<FlowStatus> {
    check_len(buf.len())?;
    let len = buf.len();

    tracing::debug!(
        "mrvl spi read: obo {} bank {} page 0x{:02x} offset 0x{:02x} len {}",
        obo,
        bank,
        page,
        offset,
        len
    );

    let info = MrvlXferInfo {
        byte_len: len as u8,
        bank,
        page,
        offset,
    };
    let status = run_transfer(bus, obo, info, MRVL_CTRL_READ, poll)?;

    let data = regs::data(obo);
    let words = len.div_ceil(4);
    let mut raw = Vec::with_capacity(words * 4);
    for i in 0..words {
        let word = bus.read32(data + 4 * i as u32)?;
        raw.extend_from_slice(&word.to_le_bytes());
    }
    buf.copy_from_slice(&raw[..len]);

    if status & MRVL_STATUS_NOT_READY_BIT != 0 {
        tracing::debug!("obo {} module busy, status 0x{:08x}", obo, status);
        return Ok(FlowStatus::Busy);
    }
    Ok(FlowStatus::Ready)
}

/// Write `data` into module memory at `bank`/`page`/`offset`.
pub fn mrvl_write(
    bus: &dyn RegisterBus,
    obo: u8,
    bank: u8,
    page: u8,
    offset: u8,
    data: &[u8],
    poll: PollSpec,
) -> Result<()> {
    check_len(data.len())?;
    let len = data.len();

    tracing::debug!(
        "mrvl spi write: obo {} bank {} page 0x{:02x} offset 0x{:02x} len {}",
        obo,
        bank,
        page,
        offset,
        len
    );

    bus.write32(regs::bus_reset(obo), 0x1)?;
    std::thread::sleep(Duration::from_micros(SPI_RESET_SETTLE_US));

    // Straight word packing, no header and no lane quirk here.
    let window = regs::data(obo);
    for (i, chunk) in data.chunks(4).enumerate() {
        let mut word = 0u32;
        for (lane, &b) in chunk.iter().enumerate() {
            word |= (b as u32) << (8 * lane);
        }
        bus.write32(window + 4 * i as u32, word)?;
    }

    let info = MrvlXferInfo {
        byte_len: len as u8,
        bank,
        page,
        offset,
    };
    run_transfer(bus, obo, info, MRVL_CTRL_WRITE, poll)?;
    Ok(())
}
