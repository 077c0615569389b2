//! Generic register abstractions for type-safe FPGA register programming

/// Trait for register layouts that can be converted to/from raw 32-bit
/// register words
///
/// The switch FPGA exposes all of its control/status/data registers as
/// 32-bit memory-mapped words. This trait provides type-safe conversion
/// between structured layouts and those raw words.
///
/// # Example
///
/// ```ignore
/// use oboflow_raw::register::RegisterLayout;
///
/// #[derive(Debug, Default)]
/// struct MyControl {
///     enable: bool,
///     length: u8,
/// }
///
/// impl RegisterLayout for MyControl {
///     fn to_reg_value(&self) -> u32 {
///         (if self.enable { 1 } else { 0 })
///             | ((self.length as u32) << 8)
///     }
///
///     fn from_reg_value(value: u32) -> Self {
///         Self {
///             enable: (value & 1) != 0,
///             length: ((value >> 8) & 0xFF) as u8,
///         }
///     }
/// }
/// ```
pub trait RegisterLayout: Sized {
    /// Convert this register layout to a raw register word
    fn to_reg_value(&self) -> u32;

    /// Parse a raw register word into this register layout
    fn from_reg_value(value: u32) -> Self;

    /// Validate that the register values are within acceptable ranges
    ///
    /// Returns `Ok(())` if valid, or an error message if invalid.
    fn validate(&self) -> Result<(), &'static str> {
        Ok(())
    }
}

/// A hardware register with BAR offset and typed layout
///
/// Combines a register offset within the FPGA BAR with a typed layout,
/// for call sites that carry both around together.
#[derive(Debug, Clone, Copy)]
pub struct Register<T: RegisterLayout> {
    /// Byte offset within the mapped BAR
    pub offset: u32,
    /// Typed register layout
    pub layout: T,
}

impl<T: RegisterLayout> Register<T> {
    /// Create a new register with the given offset and layout
    pub fn new(offset: u32, layout: T) -> Self {
        Self { offset, layout }
    }

    /// Create a register with default layout
    pub fn with_offset(offset: u32) -> Self
    where
        T: Default,
    {
        Self {
            offset,
            layout: T::default(),
        }
    }

    /// Validate the register layout
    pub fn validate(&self) -> Result<(), &'static str> {
        self.layout.validate()
    }

    /// Get the register word for this register
    pub fn to_reg_value(&self) -> u32 {
        self.layout.to_reg_value()
    }

    /// Update the layout from a register word
    pub fn from_reg_value(&mut self, value: u32) {
        self.layout = T::from_reg_value(value);
    }
}
