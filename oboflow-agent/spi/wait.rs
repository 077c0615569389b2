//! Busy-wait polling over FPGA status registers.
//!
//! The SPI engines raise no interrupt towards this layer, so completion is
//! observed by polling a status bit with a sleep between reads. The poll
//! budget is explicit at every call site rather than baked into the loop.

use std::time::Duration;

use crate::common::RegisterBus;
use crate::error::{OboflowError, Result};

/// Timeout and poll interval of one wait loop.
#[derive(Debug, Clone, Copy)]
pub struct PollSpec {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollSpec {
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Number of poll iterations this spec allows, never less than one.
    pub fn iterations(&self) -> u64 {
        let interval = self.interval.as_micros().max(1) as u64;
        (self.timeout.as_micros() as u64 / interval).max(1)
    }
}

impl Default for PollSpec {
    /// The transaction budget observed on hardware: 300 ms at 5 ms steps.
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(300),
            interval: Duration::from_millis(5),
        }
    }
}

/// Poll `reg` until `value & mask != 0`.
///
/// Returns the register value that satisfied the predicate, or
/// `OboflowError::Timeout` once the iteration budget is exhausted. The
/// caller decides remediation; typically it acknowledges the status bit
/// and fails the surrounding transaction.
pub fn wait_for_set(bus: &dyn RegisterBus, reg: u32, mask: u32, spec: PollSpec) -> Result<u32> {
    wait_for(bus, reg, mask, spec, |value, mask| value & mask != 0)
}

/// Poll `reg` until `value & mask == 0` (busy-bit variant).
pub fn wait_for_clear(bus: &dyn RegisterBus, reg: u32, mask: u32, spec: PollSpec) -> Result<u32> {
    wait_for(bus, reg, mask, spec, |value, mask| value & mask == 0)
}

fn wait_for(
    bus: &dyn RegisterBus,
    reg: u32,
    mask: u32,
    spec: PollSpec,
    done: impl Fn(u32, u32) -> bool,
) -> Result<u32> {
    for _ in 0..spec.iterations() {
        let value = bus.read32(reg)?;
        if done(value, mask) {
            return Ok(value);
        }
        // Yield the CPU between polls; the budget can be hundreds of ms.
        std::thread::sleep(spec.interval);
    }

    tracing::debug!(
        "timed out on reading reg 0x{:x} after {} us",
        reg,
        spec.timeout.as_micros()
    );
    Err(OboflowError::Timeout {
        reg,
        mask,
        timeout_us: spec.timeout.as_micros() as u64,
    })
}
