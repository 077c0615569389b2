use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use crate::error::{OboflowError, Result};

/// Register-level access to one FPGA BAR.
///
/// Everything above the raw word transfers (the SPI engines, the I2C shim,
/// the diagnostic attributes) is written against this trait, so the
/// hardware can be replaced by a simulated register model in tests.
pub trait RegisterBus: Send + Sync {
    fn read32(&self, offset: u32) -> Result<u32>;
    fn write32(&self, offset: u32, value: u32) -> Result<()>;

    /// Single-byte read, used only for the legacy flow-control byte.
    fn read8(&self, offset: u32) -> Result<u8>;
}

/// `RegisterBus` over the sysfs `resource0` file of the FPGA PCI device.
///
/// Unlike the one-shot helpers in oboflow-raw, the file is opened once and
/// kept for the lifetime of the bus; a mutex serializes seek+transfer
/// pairs so the file offset cannot be raced.
pub struct BarBus {
    file: parking_lot::Mutex<File>,
    device: String,
}

impl BarBus {
    pub fn new(device: &str) -> Result<Self> {
        let path = oboflow_raw::bar::resource_path(device);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(&path)
            .map_err(|e| {
                OboflowError::BarError(oboflow_raw::BarError::OpenFailed {
                    device: device.to_string(),
                    source: e,
                })
            })?;

        tracing::info!(
            "Opened BAR handle {} for device {}",
            file.as_raw_fd(),
            device
        );

        Ok(Self {
            file: parking_lot::Mutex::new(file),
            device: device.to_string(),
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    fn seek(&self, file: &mut File, offset: u32) -> Result<()> {
        file.seek(SeekFrom::Start(offset as u64)).map_err(|e| {
            OboflowError::BarError(oboflow_raw::BarError::SeekFailed {
                device: self.device.clone(),
                offset,
                source: e,
            })
        })?;
        Ok(())
    }
}

impl RegisterBus for BarBus {
    fn read32(&self, offset: u32) -> Result<u32> {
        let mut file = self.file.lock();
        self.seek(&mut file, offset)?;

        let mut buffer = [0u8; 4];
        file.read_exact(&mut buffer).map_err(|e| {
            OboflowError::BarError(oboflow_raw::BarError::ReadFailed {
                device: self.device.clone(),
                offset,
                source: e,
            })
        })?;

        let value = u32::from_le_bytes(buffer);
        tracing::debug!(
            "BAR read: {} reg 0x{:06x} = 0x{:08x}",
            self.device,
            offset,
            value
        );
        Ok(value)
    }

    fn write32(&self, offset: u32, value: u32) -> Result<()> {
        let mut file = self.file.lock();
        self.seek(&mut file, offset)?;

        file.write_all(&value.to_le_bytes()).map_err(|e| {
            OboflowError::BarError(oboflow_raw::BarError::WriteFailed {
                device: self.device.clone(),
                offset,
                source: e,
            })
        })?;

        tracing::debug!(
            "BAR write: {} reg 0x{:06x} = 0x{:08x}",
            self.device,
            offset,
            value
        );
        Ok(())
    }

    fn read8(&self, offset: u32) -> Result<u8> {
        let mut file = self.file.lock();
        self.seek(&mut file, offset)?;

        let mut buffer = [0u8; 1];
        file.read_exact(&mut buffer).map_err(|e| {
            OboflowError::BarError(oboflow_raw::BarError::ReadFailed {
                device: self.device.clone(),
                offset,
                source: e,
            })
        })?;

        Ok(buffer[0])
    }
}
