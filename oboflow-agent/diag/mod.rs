//! Operator-facing diagnostics: staged SPI transfers, board-level OBO
//! control bitmaps and hexdump rendering.

pub mod attrs;
pub mod hexdump;

pub use attrs::{parse_hex_bytes, parse_value, MiscAttr, OboAttr};
pub use hexdump::hexdump;
