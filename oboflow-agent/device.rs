//! Per-device context.
//!
//! One [`FpgaDevice`] owns the register bus of a switch FPGA plus all the
//! mutable state the old globals used to carry: the staged diagnostic
//! transfer configuration and the cached page-select byte of every OBO
//! port. A single device-wide mutex serializes everything that touches
//! module memory, so a transaction sequence is never interleaved with
//! another caller's.

use std::sync::Arc;

use parking_lot::Mutex;

use oboflow_raw::legacy::{SPI_MAX_PAYLOAD, TOTAL_OBO};
use oboflow_raw::misc::{self, FPGA_TYPE_EXPECTED};

use crate::common::RegisterBus;
use crate::error::{OboflowError, Result};
use crate::i2c::VirtualPort;
use crate::spi::PollSpec;

/// PIM slot carrying the OBO SPI masters on supported boards.
pub const DEFAULT_PIM: u8 = 1;

/// Staged configuration for the diagnostic SPI transfer attributes.
///
/// The read/write data attributes consume whatever was last stored here,
/// mirroring how the sysfs knobs stage a transfer field by field.
#[derive(Debug, Clone)]
pub struct OboConfig {
    /// Target OBO port, 0-based.
    pub obo_id: u8,
    /// Bank selector, CSR-based engine only.
    pub bank: u8,
    /// Module memory page.
    pub page: u8,
    /// Start offset within the page.
    pub offset: u8,
    /// Transfer length in bytes, 1..=128.
    pub len: u8,
    /// Last payload staged through the write-data attribute.
    pub write_data: [u8; SPI_MAX_PAYLOAD],
}

impl Default for OboConfig {
    fn default() -> Self {
        Self {
            obo_id: 0,
            bank: 0,
            page: 0,
            offset: 0,
            len: 1,
            write_data: [0; SPI_MAX_PAYLOAD],
        }
    }
}

pub(crate) struct DeviceState {
    pub(crate) cfg: OboConfig,
    /// Cached upper-page selector per port, updated only after a
    /// successful transaction touching the page-select byte.
    pub(crate) page_sel: [u8; TOTAL_OBO],
}

pub struct FpgaDevice {
    pub(crate) bus: Arc<dyn RegisterBus>,
    pub(crate) state: Mutex<DeviceState>,
    pub(crate) poll: PollSpec,
}

impl FpgaDevice {
    pub fn new(bus: Arc<dyn RegisterBus>) -> Self {
        Self::with_poll(bus, PollSpec::default())
    }

    pub fn with_poll(bus: Arc<dyn RegisterBus>, poll: PollSpec) -> Self {
        Self {
            bus,
            state: Mutex::new(DeviceState {
                cfg: OboConfig::default(),
                page_sel: [0; TOTAL_OBO],
            }),
            poll,
        }
    }

    pub fn bus(&self) -> &dyn RegisterBus {
        self.bus.as_ref()
    }

    /// The virtual I2C port in front of one OBO module, 0-based.
    pub fn port(&self, port: u8) -> Result<VirtualPort<'_>> {
        if port as usize >= TOTAL_OBO {
            return Err(OboflowError::InvalidInput(format!(
                "port {} out of range (0..{})",
                port, TOTAL_OBO
            )));
        }
        Ok(VirtualPort::new(self, port))
    }

    /// Verify the BAR talks to the FPGA build this tool understands.
    pub fn check_board_type(&self) -> Result<u32> {
        let value = self.bus.read32(misc::regs::FPGA_TYPE)?;
        if value != FPGA_TYPE_EXPECTED {
            return Err(OboflowError::Unsupported(format!(
                "unexpected board type 0x{:x} (want 0x{:x})",
                value, FPGA_TYPE_EXPECTED
            )));
        }
        Ok(value)
    }

    /// Snapshot the cached page selector of one port; test and diagnostic
    /// visibility only.
    pub fn cached_page(&self, port: u8) -> u8 {
        self.state.lock().page_sel[port as usize % TOTAL_OBO]
    }
}
