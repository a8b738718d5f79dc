// Licensed under the Apache-2.0 license

//! Queued I2C master driver module.
//!
//! Provides a fixed-capacity transaction queue and an interrupt-driven
//! protocol engine for byte-oriented I2C master peripherals, designed for
//! bare-metal and `no_std` environments without heap allocation.

pub mod common;
pub mod engine;
pub mod i2c_controller;
pub mod interrupt;
pub mod queue;
pub mod traits;
pub mod transaction;

#[cfg(test)]
pub(crate) mod mock;

// Re-export common types for convenience
pub use common::{
    BusError, ConfigurationError, Direction, Error, I2cConfig, I2cConfigBuilder, I2cSpeed,
    TimingConfig, TransactionStatus,
};
pub use engine::Step;
pub use i2c_controller::I2cController;
pub use traits::{I2cByteMaster, I2cHardwareCore, InterruptControl};
pub use transaction::{TransactionId, TransferBuffer};

#[cfg(feature = "cortex-m")]
pub use traits::CortexMInterrupts;
