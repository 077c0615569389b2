//! Simulated FPGA register model for tests.
//!
//! [`SimFpga`] implements [`RegisterBus`] over an in-memory register file
//! and executes SPI transactions the way the hardware does: a write to a
//! legacy descriptor-low register or a CSR-engine trigger bit decodes the
//! programmed transfer and moves bytes between the data windows and a
//! per-channel paged module memory. Knobs exist to make the model report
//! module-busy, raise the error bit or never complete, so timeout and
//! retry paths can be exercised deterministically.

use std::collections::HashMap;

use parking_lot::Mutex;

use oboflow_raw::legacy::{self, SpiDescriptorLow, SpiPreamble, SPI_HEADER_BYTES, TOTAL_OBO};
use oboflow_raw::misc::{self, FPGA_TYPE_EXPECTED};
use oboflow_raw::mrvl::{
    self, MrvlXferInfo, MRVL_CTRL_WRITE, MRVL_STATUS_DONE_BIT, MRVL_STATUS_ERROR_BIT,
    MRVL_STATUS_NOT_READY_BIT, MRVL_STATUS_START_BIT,
};
use oboflow_raw::RegisterLayout;

use crate::common::RegisterBus;
use crate::device::DEFAULT_PIM;
use crate::error::Result;

const PAGE_SIZE: usize = 256;

#[derive(Default)]
struct SimState {
    regs: HashMap<u32, u32>,
    /// Module memory of the legacy engine, keyed by (rtc, page).
    legacy_mem: HashMap<(u8, u8), [u8; PAGE_SIZE]>,
    /// Module memory of the CSR engine, keyed by (obo, bank, page).
    mrvl_mem: HashMap<(u8, u8, u8), [u8; PAGE_SIZE]>,

    legacy_done: [bool; TOTAL_OBO],
    legacy_mode: [u32; TOTAL_OBO],
    mrvl_done: [bool; TOTAL_OBO],
    mrvl_error: [bool; TOTAL_OBO],
    mrvl_not_ready: [bool; TOTAL_OBO],

    write_log: Vec<(u32, u32)>,
    accesses: u64,
    transactions: u64,

    never_done: bool,
    transfer_error: bool,
    module_busy: bool,
    busy_for: u32,
}

pub struct SimFpga {
    state: Mutex<SimState>,
}

impl SimFpga {
    pub fn new() -> Self {
        let mut state = SimState {
            // Idle engines park with the done bit set from the last
            // transaction.
            legacy_done: [true; TOTAL_OBO],
            ..Default::default()
        };
        state.regs.insert(misc::regs::FPGA_TYPE, FPGA_TYPE_EXPECTED);
        Self {
            state: Mutex::new(state),
        }
    }

    /// Preload legacy module memory.
    pub fn seed_legacy(&self, rtc: u8, page: u8, offset: u8, bytes: &[u8]) {
        let mut state = self.state.lock();
        let mem = state.legacy_mem.entry((rtc, page)).or_insert([0; PAGE_SIZE]);
        for (i, &b) in bytes.iter().enumerate() {
            mem[(offset as usize + i) % PAGE_SIZE] = b;
        }
    }

    /// Write a raw register without logging, for test setup.
    pub fn poke32(&self, reg: u32, value: u32) {
        self.state.lock().regs.insert(reg, value);
    }

    pub fn peek32(&self, reg: u32) -> u32 {
        self.state.lock().regs.get(&reg).copied().unwrap_or(0)
    }

    pub fn write_log(&self) -> Vec<(u32, u32)> {
        self.state.lock().write_log.clone()
    }

    /// Total read and write calls seen on the bus.
    pub fn register_accesses(&self) -> u64 {
        self.state.lock().accesses
    }

    /// SPI transactions actually executed by the model.
    pub fn transactions(&self) -> u64 {
        self.state.lock().transactions
    }

    /// Triggered transactions never raise the done bit.
    pub fn set_never_done(&self, v: bool) {
        self.state.lock().never_done = v;
    }

    /// Every read reports the module mid-commit.
    pub fn set_module_busy(&self, v: bool) {
        self.state.lock().module_busy = v;
    }

    /// The next `n` transactions report the module mid-commit.
    pub fn set_module_busy_for(&self, n: u32) {
        self.state.lock().busy_for = n;
    }

    /// CSR-engine transactions complete with the error bit raised.
    pub fn set_transfer_error(&self, v: bool) {
        self.state.lock().transfer_error = v;
    }
}

impl Default for SimFpga {
    fn default() -> Self {
        Self::new()
    }
}

fn consume_busy(state: &mut SimState) -> bool {
    if state.module_busy {
        true
    } else if state.busy_for > 0 {
        state.busy_for -= 1;
        true
    } else {
        false
    }
}

/// Map `reg` back to the channel whose register `base(channel)` it is.
fn channel_of(reg: u32, base: impl Fn(u8) -> u32) -> Option<u8> {
    (0..TOTAL_OBO as u8).find(|&ch| base(ch) == reg)
}

impl SimState {
    fn run_legacy(&mut self, rtc: u8, desc: SpiDescriptorLow) {
        let data_w = legacy::regs::data_write(DEFAULT_PIM, rtc);
        let data_r = legacy::regs::data_read(DEFAULT_PIM, rtc);

        let preamble =
            SpiPreamble::from_reg_value(self.regs.get(&data_w).copied().unwrap_or(0));
        let len = preamble.byte_len as usize;
        let busy = consume_busy(self);

        if desc.write {
            // Gather the payload from the word lanes; lanes 0 and 1 of
            // the first word belong to the wire header and carry no
            // payload bytes.
            let mut payload = Vec::with_capacity(len);
            'words: for i in 0..(len + 2).div_ceil(4) {
                let word = self
                    .regs
                    .get(&(data_w + 4 * (i as u32 + 1)))
                    .copied()
                    .unwrap_or(0);
                for lane in 0..4 {
                    if i == 0 && lane < 2 {
                        continue;
                    }
                    if payload.len() == len {
                        break 'words;
                    }
                    payload.push(((word >> (8 * lane)) & 0xFF) as u8);
                }
            }
            let mem = self
                .legacy_mem
                .entry((rtc, preamble.page))
                .or_insert([0; PAGE_SIZE]);
            for (i, &b) in payload.iter().enumerate() {
                mem[(preamble.offset as usize + i) % PAGE_SIZE] = b;
            }
        } else {
            let mut raw = vec![0u8; SPI_HEADER_BYTES];
            raw[legacy::WRITE_READY_BYTE_OFFSET as usize] = busy as u8;
            let mem = self
                .legacy_mem
                .get(&(rtc, preamble.page))
                .copied()
                .unwrap_or([0; PAGE_SIZE]);
            for i in 0..len {
                raw.push(mem[(preamble.offset as usize + i) % PAGE_SIZE]);
            }
            while raw.len() % 4 != 0 {
                raw.push(0);
            }
            for (i, chunk) in raw.chunks_exact(4).enumerate() {
                let word = u32::from_le_bytes(chunk.try_into().unwrap());
                self.regs.insert(data_r + 4 * i as u32, word);
            }
        }

        self.legacy_done[rtc as usize] = true;
        self.transactions += 1;
    }

    fn run_mrvl(&mut self, obo: u8) {
        let info = MrvlXferInfo::from_reg_value(
            self.regs
                .get(&mrvl::regs::xfer_info(obo))
                .copied()
                .unwrap_or(0),
        );
        let direction = self
            .regs
            .get(&mrvl::regs::ctrl(obo))
            .copied()
            .unwrap_or(0);
        let window = mrvl::regs::data(obo);
        let len = info.byte_len as usize;
        let busy = consume_busy(self);
        let key = (obo, info.bank, info.page);

        if direction == MRVL_CTRL_WRITE {
            let mut payload = Vec::with_capacity(len);
            for i in 0..len.div_ceil(4) {
                let word = self
                    .regs
                    .get(&(window + 4 * i as u32))
                    .copied()
                    .unwrap_or(0);
                for lane in 0..4 {
                    if payload.len() < len {
                        payload.push(((word >> (8 * lane)) & 0xFF) as u8);
                    }
                }
            }
            let mem = self.mrvl_mem.entry(key).or_insert([0; PAGE_SIZE]);
            for (i, &b) in payload.iter().enumerate() {
                mem[(info.offset as usize + i) % PAGE_SIZE] = b;
            }
        } else {
            let mem = self.mrvl_mem.get(&key).copied().unwrap_or([0; PAGE_SIZE]);
            let mut raw: Vec<u8> = (0..len)
                .map(|i| mem[(info.offset as usize + i) % PAGE_SIZE])
                .collect();
            while raw.len() % 4 != 0 {
                raw.push(0);
            }
            for (i, chunk) in raw.chunks_exact(4).enumerate() {
                let word = u32::from_le_bytes(chunk.try_into().unwrap());
                self.regs.insert(window + 4 * i as u32, word);
            }
        }

        self.mrvl_done[obo as usize] = true;
        self.mrvl_error[obo as usize] = self.transfer_error;
        self.mrvl_not_ready[obo as usize] = busy;
        self.transactions += 1;
    }
}

impl RegisterBus for SimFpga {
    fn read32(&self, offset: u32) -> Result<u32> {
        let mut state = self.state.lock();
        state.accesses += 1;

        if let Some(rtc) = channel_of(offset, |r| legacy::regs::desc_high(DEFAULT_PIM, r)) {
            let done = state.legacy_done[rtc as usize] as u32;
            return Ok(state.legacy_mode[rtc as usize] | done);
        }
        if let Some(obo) = channel_of(offset, mrvl::regs::status) {
            let i = obo as usize;
            let mut value = 0;
            if state.mrvl_done[i] {
                value |= MRVL_STATUS_DONE_BIT;
            }
            if state.mrvl_error[i] {
                value |= MRVL_STATUS_ERROR_BIT;
            }
            if state.mrvl_not_ready[i] {
                value |= MRVL_STATUS_NOT_READY_BIT;
            }
            return Ok(value);
        }
        Ok(state.regs.get(&offset).copied().unwrap_or(0))
    }

    fn write32(&self, offset: u32, value: u32) -> Result<()> {
        let mut state = self.state.lock();
        state.accesses += 1;
        state.write_log.push((offset, value));

        if let Some(rtc) = channel_of(offset, |r| legacy::regs::desc_high(DEFAULT_PIM, r)) {
            // Done is write-1-to-clear; the remaining bits are mode.
            if value & legacy::DESC_DONE_BIT != 0 {
                state.legacy_done[rtc as usize] = false;
            }
            state.legacy_mode[rtc as usize] = value & !legacy::DESC_DONE_BIT;
            return Ok(());
        }
        if let Some(rtc) = channel_of(offset, |r| legacy::regs::desc_low(DEFAULT_PIM, r)) {
            let desc = SpiDescriptorLow::from_reg_value(value);
            if desc.valid && !state.never_done {
                state.run_legacy(rtc, desc);
            }
            return Ok(());
        }
        if channel_of(offset, |r| legacy::regs::bus_reset(DEFAULT_PIM, r)).is_some() {
            // Self-clearing pulse.
            state.regs.insert(offset, 0);
            return Ok(());
        }

        if let Some(obo) = channel_of(offset, mrvl::regs::status) {
            if value & MRVL_STATUS_DONE_BIT != 0 {
                state.mrvl_done[obo as usize] = false;
            }
            if value & MRVL_STATUS_START_BIT != 0 && !state.never_done {
                state.run_mrvl(obo);
            }
            return Ok(());
        }
        if channel_of(offset, mrvl::regs::bus_reset).is_some() {
            state.regs.insert(offset, 0);
            return Ok(());
        }

        state.regs.insert(offset, value);
        Ok(())
    }

    fn read8(&self, offset: u32) -> Result<u8> {
        let aligned = offset & !0x3;
        let lane = offset % 4;
        let mut state = self.state.lock();
        state.accesses += 1;
        let word = state.regs.get(&aligned).copied().unwrap_or(0);
        Ok(((word >> (8 * lane)) & 0xFF) as u8)
    }
}
