// Licensed under the Apache-2.0 license

//! # I2C Hardware Abstraction Traits
//!
//! The transaction engine never touches registers. It drives the peripheral
//! through these small traits, which a chip support crate implements once per
//! serial peripheral.
//!
//! ## Trait Hierarchy
//!
//! ```text
//! I2cHardwareCore (setup, interrupt sources, error flags)
//!     └── I2cByteMaster (byte-at-a-time master protocol primitives)
//!
//! InterruptControl (global interrupt enable, used for critical sections)
//! ```
//!
//! Every `I2cByteMaster` operation is a register poke that completes
//! immediately; the peripheral signals progress through its byte-event and
//! error interrupts, which the application forwards to
//! [`I2cController::on_byte_event`](crate::i2c::I2cController::on_byte_event)
//! and
//! [`I2cController::on_status_interrupt`](crate::i2c::I2cController::on_status_interrupt).

use crate::i2c::common::{BusError, ConfigurationError, Direction, I2cConfig, I2cSpeed, TimingConfig};
use embedded_hal::i2c::SevenBitAddress;

/// Core I2C hardware interface providing setup and interrupt management
///
/// This is the foundation trait that all peripheral implementations must provide.
pub trait I2cHardwareCore {
    /// Put the peripheral into master mode with the given configuration
    ///
    /// Holds the peripheral in reset while the mode, clock source and pins are
    /// configured, then releases it. Interrupt sources stay disabled.
    /// Implementations may correct `config.source_clock` to the clock the
    /// peripheral actually runs from; the divider is derived afterwards.
    fn init(&mut self, config: &mut I2cConfig);

    /// Program the bit-rate prescaler
    ///
    /// # Arguments
    ///
    /// * `speed` - Target I2C bus speed
    /// * `divider` - Prescaler value computed from the source clock
    /// * `timing` - Optional manual SCL/SDA timing overrides
    ///
    /// # Returns
    ///
    /// The achieved bus frequency in Hz.
    ///
    /// # Errors
    ///
    /// Returns an error if the peripheral cannot run at the requested speed.
    fn configure_timing(
        &mut self,
        speed: I2cSpeed,
        divider: u16,
        timing: &TimingConfig,
    ) -> Result<u32, ConfigurationError>;

    /// Enable hardware interrupts with the specified mask
    ///
    /// * `mask` - Combination of the `INTR_*` bits from [`crate::i2c::common`].
    fn enable_interrupts(&mut self, mask: u32);

    /// Clear pending hardware interrupt flags with the specified mask
    fn clear_interrupts(&mut self, mask: u32);

    /// Read and acknowledge the NACK / bus-error flags
    ///
    /// Returns `None` when the status interrupt fired for a reason the engine
    /// does not care about.
    fn take_bus_error(&mut self) -> Option<BusError>;
}

/// Byte-level master protocol primitives
pub trait I2cByteMaster: I2cHardwareCore {
    /// Program the slave address for the next start condition
    fn set_target_address(&mut self, address: SevenBitAddress);

    /// Select transmitter (`Write`) or receiver (`Read`) mode
    fn set_direction(&mut self, direction: Direction);

    /// Generate a start condition followed by the address header
    fn start_condition(&mut self);

    /// Generate a repeated start without releasing the bus
    fn repeated_start(&mut self);

    /// Generate a stop condition and release the bus
    ///
    /// Implementations also acknowledge the pending transmit event so an idle
    /// bus does not keep raising byte interrupts.
    fn stop_condition(&mut self);

    /// Load one byte into the transmit buffer
    fn write_byte(&mut self, byte: u8);

    /// Fetch one byte from the receive buffer
    fn read_byte(&mut self) -> u8;
}

/// Global interrupt enable control
///
/// Backs the driver's critical section: disable, remember the prior state,
/// restore it afterwards.
pub trait InterruptControl {
    /// Whether interrupts are currently globally enabled
    fn are_enabled(&self) -> bool;

    /// Globally mask interrupts
    fn disable(&mut self);

    /// Globally unmask interrupts
    fn enable(&mut self);
}

/// PRIMASK based interrupt control for Cortex-M cores.
#[cfg(feature = "cortex-m")]
#[derive(Clone, Copy, Debug, Default)]
pub struct CortexMInterrupts;

#[cfg(feature = "cortex-m")]
impl InterruptControl for CortexMInterrupts {
    fn are_enabled(&self) -> bool {
        cortex_m::register::primask::read().is_active()
    }

    fn disable(&mut self) {
        cortex_m::interrupt::disable();
    }

    fn enable(&mut self) {
        // SAFETY: only called when restoring a state that had interrupts enabled.
        unsafe { cortex_m::interrupt::enable() }
    }
}
