use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OboflowError {
    #[error("Timed out polling register 0x{reg:X} for mask 0x{mask:X} after {timeout_us} us")]
    Timeout { reg: u32, mask: u32, timeout_us: u64 },

    #[error("Module not ready after {attempts} attempts")]
    NotReady { attempts: u32 },

    #[error("SPI engine reported a transfer error on register 0x{reg:X}")]
    TransferError { reg: u32 },

    #[error("Invalid payload length {len} (must be 1..=128)")]
    InvalidLength { len: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("No emulated device at I2C address 0x{addr:02X}")]
    AddressNotEmulated { addr: u16 },

    #[error("BAR access failed: {0}")]
    BarError(#[from] oboflow_raw::BarError),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl OboflowError {
    /// Errno-style classification, matching what the kernel drivers return
    /// to sysfs and I2C callers: transfer failures map to EIO, malformed
    /// input to EINVAL, unsupported operations to EOPNOTSUPP.
    pub fn errno(&self) -> i32 {
        match self {
            OboflowError::Timeout { .. }
            | OboflowError::NotReady { .. }
            | OboflowError::TransferError { .. }
            | OboflowError::BarError(_)
            | OboflowError::IoError(_) => 5, // EIO
            OboflowError::InvalidLength { .. } | OboflowError::InvalidInput(_) => 22, // EINVAL
            OboflowError::Unsupported(_) | OboflowError::AddressNotEmulated { .. } => 95, // EOPNOTSUPP
        }
    }
}

pub type Result<T> = std::result::Result<T, OboflowError>;
