pub mod bus;

pub use bus::{BarBus, RegisterBus};
