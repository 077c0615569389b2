//! OBO SPI transaction engines.
//!
//! Two hardware generations are supported: the descriptor-based engine in
//! [`legacy`] and the CSR-based engine in [`mrvl`]. Both move at most 128
//! payload bytes per transaction and report completion through a polled
//! status bit; [`wait`] holds the shared poll loop and [`status`] the
//! module readiness probing built on top of the read primitives.

pub mod legacy;
pub mod mrvl;
pub mod status;
pub mod wait;

pub use legacy::{spi_read, spi_write, SpiChannel};
pub use mrvl::{mrvl_read, mrvl_write};
pub use status::{check_ready, mrvl_check_ready, wait_module_ready, SPI_MAX_RETRY_BUSY};
pub use wait::{wait_for_clear, wait_for_set, PollSpec};

/// Module flow-control state sampled alongside a read.
///
/// `Busy` means the module was still committing an earlier write when the
/// read completed, so the returned bytes may be stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStatus {
    Ready,
    Busy,
}
