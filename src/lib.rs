// Licensed under the Apache-2.0 license

//! Interrupt-driven, queued I2C master driver.
//!
//! Foreground code creates register-level transactions, enqueues them and polls
//! their status; the byte-event and bus-error interrupts drive each queued
//! transaction through the wire protocol without blocking the caller.

// Enforce Copilot coding guidelines - prevent panic-prone patterns in production code only
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::indexing_slicing))]
#![cfg_attr(not(test), warn(clippy::expect_used))]
#![cfg_attr(not(any(test, feature = "std")), no_std)]
pub mod common;
pub mod i2c;
