//! Module readiness probing.
//!
//! After a write, OBO modules commit data internally and report busy
//! through the flow-control channel for a while. Before a transaction that
//! must observe fresh data, a 1-byte canary read of the module status page
//! is retried until the module stops reporting busy.

use std::time::Duration;

use crate::common::RegisterBus;
use crate::error::{OboflowError, Result};
use crate::spi::legacy::{spi_read, SpiChannel};
use crate::spi::mrvl::mrvl_read;
use crate::spi::wait::PollSpec;
use crate::spi::FlowStatus;

/// Canary location: one byte of the module status page.
const READY_CANARY_PAGE: u8 = 0xA0;
const READY_CANARY_OFFSET: u8 = 0x80;

/// Inner probe budget: attempts per readiness round and the pause between
/// them.
const READY_PROBE_ATTEMPTS: u32 = 5;
const READY_PROBE_PAUSE_US: u64 = 5;

/// Outer budget: readiness rounds before the caller-facing operation is
/// failed, and the pause between rounds.
pub const SPI_MAX_RETRY_BUSY: u32 = 10;
const RETRY_BUSY_PAUSE_MS: u64 = 3;

fn probe_rounds(probe: impl Fn() -> Result<FlowStatus>) -> Result<()> {
    for attempt in 1..=READY_PROBE_ATTEMPTS {
        match probe() {
            Ok(FlowStatus::Ready) => return Ok(()),
            // Busy and a timed-out engine both mean "try again"; the
            // module may still be mid-commit.
            Ok(FlowStatus::Busy) | Err(OboflowError::Timeout { .. }) => {
                tracing::debug!("module busy on readiness probe {}", attempt);
                std::thread::sleep(Duration::from_micros(READY_PROBE_PAUSE_US));
            }
            Err(e) => return Err(e),
        }
    }
    Err(OboflowError::NotReady {
        attempts: READY_PROBE_ATTEMPTS,
    })
}

/// One readiness round against a legacy channel.
pub fn check_ready(bus: &dyn RegisterBus, ch: SpiChannel, poll: PollSpec) -> Result<()> {
    probe_rounds(|| {
        let mut canary = [0u8; 1];
        spi_read(
            bus,
            ch,
            READY_CANARY_PAGE,
            READY_CANARY_OFFSET,
            &mut canary,
            poll,
        )
    })
}

/// One readiness round against a CSR-based channel.
pub fn mrvl_check_ready(bus: &dyn RegisterBus, obo: u8, bank: u8, poll: PollSpec) -> Result<()> {
    probe_rounds(|| {
        let mut canary = [0u8; 1];
        mrvl_read(
            bus,
            obo,
            bank,
            READY_CANARY_PAGE,
            READY_CANARY_OFFSET,
            &mut canary,
            poll,
        )
    })
}

/// Run readiness rounds until one succeeds or the retry budget runs out.
///
/// This is the wrapper every caller-facing operation goes through before
/// touching module memory.
pub fn wait_module_ready(
    poll_round: impl Fn() -> Result<()>,
) -> Result<()> {
    for round in 1..=SPI_MAX_RETRY_BUSY {
        match poll_round() {
            Ok(()) => return Ok(()),
            Err(OboflowError::NotReady { .. }) => {
                tracing::warn!("module still busy after readiness round {}", round);
                std::thread::sleep(Duration::from_millis(RETRY_BUSY_PAUSE_MS));
            }
            Err(e) => return Err(e),
        }
    }
    Err(OboflowError::NotReady {
        attempts: SPI_MAX_RETRY_BUSY,
    })
}
