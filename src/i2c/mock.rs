// Licensed under the Apache-2.0 license

//! Test doubles for the hardware collaborator traits.

use crate::common::Logger;
use crate::i2c::common::{BusError, ConfigurationError, Direction, I2cConfig, I2cSpeed, TimingConfig};
use crate::i2c::traits::{I2cByteMaster, I2cHardwareCore, InterruptControl};
use fugit::HertzU32;
use std::collections::VecDeque;

/// Everything the driver asked the peripheral to do, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusOp {
    Init,
    Timing(u16),
    EnableInterrupts(u32),
    ClearInterrupts(u32),
    Address(u8),
    Mode(Direction),
    Start,
    RepeatedStart,
    Stop,
    Write(u8),
    Read(u8),
}

#[derive(Default)]
pub struct MockBus {
    pub ops: Vec<BusOp>,
    /// Bytes handed out by `read_byte`; 0xff once exhausted.
    pub rx_data: VecDeque<u8>,
    pub pending_error: Option<BusError>,
    pub unsupported_speed: Option<I2cSpeed>,
    /// Source clock `init` reports back, if any.
    pub source_clock: Option<HertzU32>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rx(data: &[u8]) -> Self {
        Self {
            rx_data: data.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn count(&self, op: &BusOp) -> usize {
        self.ops.iter().filter(|seen| *seen == op).count()
    }

    pub fn written(&self) -> Vec<u8> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                BusOp::Write(byte) => Some(*byte),
                _ => None,
            })
            .collect()
    }

    pub fn last(&self) -> Option<&BusOp> {
        self.ops.last()
    }
}

impl I2cHardwareCore for MockBus {
    fn init(&mut self, config: &mut I2cConfig) {
        if let Some(clock) = self.source_clock {
            config.source_clock = clock;
        }
        self.ops.push(BusOp::Init);
    }

    fn configure_timing(
        &mut self,
        speed: I2cSpeed,
        divider: u16,
        _timing: &TimingConfig,
    ) -> Result<u32, ConfigurationError> {
        if self.unsupported_speed == Some(speed) {
            return Err(ConfigurationError::UnsupportedSpeed);
        }
        self.ops.push(BusOp::Timing(divider));
        Ok(speed.hz())
    }

    fn enable_interrupts(&mut self, mask: u32) {
        self.ops.push(BusOp::EnableInterrupts(mask));
    }

    fn clear_interrupts(&mut self, mask: u32) {
        self.ops.push(BusOp::ClearInterrupts(mask));
    }

    fn take_bus_error(&mut self) -> Option<BusError> {
        self.pending_error.take()
    }
}

impl I2cByteMaster for MockBus {
    fn set_target_address(&mut self, address: u8) {
        self.ops.push(BusOp::Address(address));
    }

    fn set_direction(&mut self, direction: Direction) {
        self.ops.push(BusOp::Mode(direction));
    }

    fn start_condition(&mut self) {
        self.ops.push(BusOp::Start);
    }

    fn repeated_start(&mut self) {
        self.ops.push(BusOp::RepeatedStart);
    }

    fn stop_condition(&mut self) {
        self.ops.push(BusOp::Stop);
    }

    fn write_byte(&mut self, byte: u8) {
        self.ops.push(BusOp::Write(byte));
    }

    fn read_byte(&mut self) -> u8 {
        let byte = self.rx_data.pop_front().unwrap_or(0xff);
        self.ops.push(BusOp::Read(byte));
        byte
    }
}

pub struct MockIrq {
    enabled: bool,
    pub disable_calls: usize,
    pub enable_calls: usize,
}

impl MockIrq {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            disable_calls: 0,
            enable_calls: 0,
        }
    }
}

impl InterruptControl for MockIrq {
    fn are_enabled(&self) -> bool {
        self.enabled
    }

    fn disable(&mut self) {
        self.disable_calls += 1;
        self.enabled = false;
    }

    fn enable(&mut self) {
        self.enable_calls += 1;
        self.enabled = true;
    }
}

#[derive(Default)]
pub struct RecordingLogger {
    pub debug: Vec<String>,
    pub error: Vec<String>,
}

impl Logger for RecordingLogger {
    fn debug(&mut self, msg: &str) {
        self.debug.push(msg.into());
    }

    fn error(&mut self, msg: &str) {
        self.error.push(msg.into());
    }
}
