//! PCI BAR read/write primitives
//!
//! This module provides low-level access to the FPGA register BAR through
//! the sysfs `resource0` file of the PCI device. Every call opens the file,
//! seeks and transfers one register word. For cached/locked access, use the
//! higher-level abstractions in oboflow-agent.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, BarError>;

/// Errors that can occur during BAR register access
#[derive(Debug, thiserror::Error)]
pub enum BarError {
    #[error("Failed to open register BAR of device {device}: {source}")]
    OpenFailed {
        device: String,
        source: std::io::Error,
    },

    #[error("Failed to read register 0x{offset:X} of device {device}: {source}")]
    ReadFailed {
        device: String,
        offset: u32,
        source: std::io::Error,
    },

    #[error("Failed to write register 0x{offset:X} of device {device}: {source}")]
    WriteFailed {
        device: String,
        offset: u32,
        source: std::io::Error,
    },

    #[error("Failed to seek to register 0x{offset:X} of device {device}: {source}")]
    SeekFailed {
        device: String,
        offset: u32,
        source: std::io::Error,
    },
}

/// Sysfs path of BAR0 for a PCI device given as `dddd:bb:dd.f`
pub fn resource_path(device: &str) -> PathBuf {
    PathBuf::from(format!("/sys/bus/pci/devices/{device}/resource0"))
}

fn open_bar(device: &str, write: bool) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(write)
        .custom_flags(libc::O_SYNC) // Register access must not be buffered
        .open(resource_path(device))
        .map_err(|e| BarError::OpenFailed {
            device: device.to_string(),
            source: e,
        })
}

fn seek_to(file: &mut File, device: &str, offset: u32) -> Result<()> {
    file.seek(SeekFrom::Start(offset as u64))
        .map_err(|e| BarError::SeekFailed {
            device: device.to_string(),
            offset,
            source: e,
        })?;
    Ok(())
}

/// Read a 32-bit register word
///
/// # Arguments
///
/// * `device` - PCI device address, e.g. `0000:04:00.0`
/// * `offset` - byte offset within BAR0; must be 4-byte aligned
///
/// # Errors
///
/// Returns an error if the resource file cannot be opened (requires root)
/// or the transfer fails.
pub fn read32(device: &str, offset: u32) -> Result<u32> {
    let mut file = open_bar(device, false)?;
    seek_to(&mut file, device, offset)?;

    let mut buffer = [0u8; 4];
    file.read_exact(&mut buffer)
        .map_err(|e| BarError::ReadFailed {
            device: device.to_string(),
            offset,
            source: e,
        })?;

    Ok(u32::from_le_bytes(buffer))
}

/// Write a 32-bit register word
///
/// # Safety
///
/// Writing incorrect values to FPGA control registers can wedge the SPI
/// engines or disturb live transceiver state. Validate register words with
/// `RegisterLayout::validate()` before writing.
pub fn write32(device: &str, offset: u32, value: u32) -> Result<()> {
    let mut file = open_bar(device, true)?;
    seek_to(&mut file, device, offset)?;

    file.write_all(&value.to_le_bytes())
        .map_err(|e| BarError::WriteFailed {
            device: device.to_string(),
            offset,
            source: e,
        })?;

    Ok(())
}

/// Read a single byte from the BAR
///
/// Used for the flow-control byte in the legacy read window; the data
/// windows proper only support 32-bit-aligned access.
pub fn read8(device: &str, offset: u32) -> Result<u8> {
    let mut file = open_bar(device, false)?;
    seek_to(&mut file, device, offset)?;

    let mut buffer = [0u8; 1];
    file.read_exact(&mut buffer)
        .map_err(|e| BarError::ReadFailed {
            device: device.to_string(),
            offset,
            source: e,
        })?;

    Ok(buffer[0])
}
