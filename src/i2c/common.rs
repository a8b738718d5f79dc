// Licensed under the Apache-2.0 license

//! Common types and constants for the queued I2C master.
//!
//! This module provides shared definitions for error handling, interrupt mask
//! bits, controller configuration and the transaction status model used across
//! the driver implementation.

use core::fmt;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use fugit::HertzU32;

/// Byte-level event: transmit buffer empty or receive buffer full.
pub const INTR_BYTE_EVENT: u32 = 1 << 0;
/// Slave did not acknowledge an address or data byte.
pub const INTR_NACK: u32 = 1 << 1;
/// Bus fault reported by the peripheral (illegal start/stop, overrun).
pub const INTR_BUS_ERROR: u32 = 1 << 2;
/// Everything the transaction engine needs to run.
pub const INTR_MASTER_DEFAULT: u32 = INTR_BYTE_EVENT | INTR_NACK | INTR_BUS_ERROR;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
    FastPlus = 1_000_000,
}

impl I2cSpeed {
    #[must_use]
    pub const fn hz(self) -> u32 {
        self as u32
    }
}

/// Data direction of a transaction, also the R/W bit of the address header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Write,
    Read,
}

/// Lifecycle of a transaction as seen by the caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TransactionStatus {
    Created = 0,
    Queued = 1,
    Processing = 2,
    Finished = 3,
    Failed = 4,
}

impl TransactionStatus {
    /// Queued and Processing transactions belong to the engine.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }

    /// Finished or Failed: the engine is done with the transaction.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    pub(crate) const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Queued,
            2 => Self::Processing,
            3 => Self::Finished,
            4 => Self::Failed,
            _ => Self::Created,
        }
    }
}

/// Reasons a transaction ends up `Failed`.
///
/// All but [`BusError::Aborted`] are delivered by the NACK / bus-error interrupt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusError {
    Nack(NoAcknowledgeSource),
    Bus,
    ArbitrationLoss,
    Overrun,
    /// Transfer abandoned by a controller shutdown.
    Aborted,
}

impl BusError {
    #[must_use]
    pub fn kind(self) -> ErrorKind {
        match self {
            Self::Nack(source) => ErrorKind::NoAcknowledge(source),
            Self::Bus => ErrorKind::Bus,
            Self::ArbitrationLoss => ErrorKind::ArbitrationLoss,
            Self::Overrun => ErrorKind::Overrun,
            Self::Aborted => ErrorKind::Other,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Source clock cannot be divided down to the requested bus speed.
    InvalidClockDivider,
    /// Requested bus speed is not supported by the peripheral.
    UnsupportedSpeed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Queue is saturated; retry later.
    QueueFull,
    /// Transaction is already Queued or Processing.
    InvalidReenqueue,
    /// Transaction id is stale or was never issued.
    InvalidHandle,
    /// Address does not fit in seven bits.
    InvalidAddress,
    /// Transactions need at least one data byte.
    EmptyBuffer,
    /// Transaction table is full.
    NoFreeSlot,
    /// Operation not allowed while the transaction is Queued or Processing.
    TransactionActive,
    /// Transaction was created but never enqueued.
    NotEnqueued,
    /// Transaction failed on the bus.
    Bus(BusError),
    Configuration(ConfigurationError),
}

impl From<BusError> for Error {
    fn from(err: BusError) -> Self {
        Self::Bus(err)
    }
}

impl From<ConfigurationError> for Error {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration(err)
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Bus(err) => err.kind(),
            _ => ErrorKind::Other,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => f.write_str("transaction queue full"),
            Self::InvalidReenqueue => f.write_str("transaction already queued or processing"),
            Self::InvalidHandle => f.write_str("invalid transaction handle"),
            Self::InvalidAddress => f.write_str("address is not a 7-bit address"),
            Self::EmptyBuffer => f.write_str("empty transaction buffer"),
            Self::NoFreeSlot => f.write_str("no free transaction slot"),
            Self::TransactionActive => f.write_str("transaction is queued or processing"),
            Self::NotEnqueued => f.write_str("transaction was never enqueued"),
            Self::Bus(err) => write!(f, "bus error: {err:?}"),
            Self::Configuration(err) => write!(f, "configuration error: {err:?}"),
        }
    }
}

/// Manual SCL/SDA timing overrides; zero leaves the peripheral default.
#[derive(Default)]
pub struct TimingConfig {
    pub manual_scl_high: u8,
    pub manual_scl_low: u8,
    pub manual_sda_hold: u8,
}

pub struct I2cConfig {
    pub speed: I2cSpeed,
    /// Clock feeding the peripheral's bit-rate prescaler.
    pub source_clock: HertzU32,
    pub timing_config: TimingConfig,
    /// Interrupt sources enabled by initialization.
    pub interrupts: u32,
}

impl I2cConfig {
    /// Prescaler that brings `source_clock` down to at most `speed`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidClockDivider`] when the source clock
    /// is zero or the divider does not fit the 16-bit prescaler.
    pub fn clock_divider(&self) -> Result<u16, ConfigurationError> {
        let source = self.source_clock.to_Hz();
        if source == 0 {
            return Err(ConfigurationError::InvalidClockDivider);
        }
        let divider = source.div_ceil(self.speed.hz());
        u16::try_from(divider).map_err(|_| ConfigurationError::InvalidClockDivider)
    }

    /// Bus frequency actually produced by [`Self::clock_divider`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::clock_divider`].
    pub fn effective_speed(&self) -> Result<HertzU32, ConfigurationError> {
        let divider = u32::from(self.clock_divider()?);
        Ok(HertzU32::from_raw(self.source_clock.to_Hz() / divider))
    }
}

pub struct I2cConfigBuilder {
    speed: I2cSpeed,
    source_clock: HertzU32,
    timing_config: Option<TimingConfig>,
    interrupts: u32,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    /// Standard mode on a 1 MHz source clock, all engine interrupts enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            speed: I2cSpeed::Standard,
            source_clock: HertzU32::MHz(1),
            timing_config: None,
            interrupts: INTR_MASTER_DEFAULT,
        }
    }
    #[must_use]
    pub fn speed(mut self, speed: I2cSpeed) -> Self {
        self.speed = speed;
        self
    }
    #[must_use]
    pub fn source_clock(mut self, clock: HertzU32) -> Self {
        self.source_clock = clock;
        self
    }
    #[must_use]
    pub fn timing_config(mut self, config: TimingConfig) -> Self {
        self.timing_config = Some(config);
        self
    }
    #[must_use]
    pub fn interrupts(mut self, mask: u32) -> Self {
        self.interrupts = mask;
        self
    }
    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            speed: self.speed,
            source_clock: self.source_clock,
            timing_config: self.timing_config.unwrap_or_default(),
            interrupts: self.interrupts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::Error as _;

    #[test]
    fn test_default_config_divides_by_ten() {
        let config = I2cConfigBuilder::new().build();

        assert_eq!(config.speed, I2cSpeed::Standard);
        assert_eq!(config.clock_divider(), Ok(10));
        assert_eq!(config.effective_speed().unwrap().to_Hz(), 100_000);
        assert_eq!(config.interrupts, INTR_MASTER_DEFAULT);
    }

    #[test]
    fn test_divider_rounds_up() {
        let config = I2cConfigBuilder::new()
            .speed(I2cSpeed::Fast)
            .source_clock(HertzU32::MHz(1))
            .build();

        // 1 MHz / 400 kHz = 2.5, never run faster than requested
        assert_eq!(config.clock_divider(), Ok(3));
        assert_eq!(config.effective_speed().unwrap().to_Hz(), 333_333);
    }

    #[test]
    fn test_zero_source_clock_rejected() {
        let zero = I2cConfigBuilder::new()
            .source_clock(HertzU32::from_raw(0))
            .build();
        assert_eq!(
            zero.clock_divider(),
            Err(ConfigurationError::InvalidClockDivider)
        );
        assert!(zero.effective_speed().is_err());
    }

    #[test]
    fn test_status_raw_conversion() {
        for status in [
            TransactionStatus::Created,
            TransactionStatus::Queued,
            TransactionStatus::Processing,
            TransactionStatus::Finished,
            TransactionStatus::Failed,
        ] {
            assert_eq!(TransactionStatus::from_raw(status as u8), status);
        }
        assert!(TransactionStatus::Queued.is_active());
        assert!(TransactionStatus::Processing.is_active());
        assert!(!TransactionStatus::Failed.is_active());
        assert!(TransactionStatus::Finished.is_complete());
    }

    #[test]
    fn test_error_kind_mapping() {
        let nack = Error::from(BusError::Nack(NoAcknowledgeSource::Address));
        assert_eq!(
            nack.kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        );
        assert_eq!(Error::Bus(BusError::Bus).kind(), ErrorKind::Bus);
        assert_eq!(
            Error::Bus(BusError::ArbitrationLoss).kind(),
            ErrorKind::ArbitrationLoss
        );
        assert_eq!(Error::QueueFull.kind(), ErrorKind::Other);
    }
}
