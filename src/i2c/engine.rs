// Licensed under the Apache-2.0 license

//! Interrupt-driven transaction engine.
//!
//! The engine owns at most one transaction at a time and advances it by one
//! protocol step per hardware byte event:
//!
//! ```text
//!            Write: Address -> SubAddress -> TransmitData* -> Done
//!            Read:  Address -> SubAddress -> RepeatStart -> ReceiveData* -> Done
//! ```
//!
//! When the current transaction is Finished or Failed the next byte event (or
//! the error interrupt) claims the next queued transaction. An empty queue
//! stops the bus and idles the engine until the next enqueue kicks it again.
//!
//! Every entry point takes a [`CsToken`]; the engine never locks on its own.

use crate::common::Logger;
use crate::i2c::common::{BusError, Direction, TransactionStatus, INTR_BYTE_EVENT};
use crate::i2c::interrupt::CsToken;
use crate::i2c::queue::{QueueError, TransactionQueue};
use crate::i2c::traits::I2cByteMaster;
use crate::i2c::transaction::{TransactionId, TransactionTable};

/// Protocol step of the current transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Program the address and issue a start condition.
    Address,
    /// Send the register/offset byte.
    SubAddress,
    /// Switch to receive mode and issue a repeated start.
    RepeatStart,
    /// Send one data byte per event.
    TransmitData,
    /// Take one received byte per event.
    ReceiveData,
    /// Nothing left to do for this transaction.
    Done,
}

impl Step {
    /// Step following `self` when the transaction is not complete yet.
    #[must_use]
    pub const fn after(self, direction: Direction) -> Self {
        match (self, direction) {
            (Self::Address, _) => Self::SubAddress,
            (Self::SubAddress, Direction::Write) => Self::TransmitData,
            (Self::SubAddress, Direction::Read) => Self::RepeatStart,
            (Self::RepeatStart, _) => Self::ReceiveData,
            (Self::TransmitData, _) => Self::TransmitData,
            (Self::ReceiveData, _) => Self::ReceiveData,
            (Self::Done, _) => Self::Done,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Active {
    id: TransactionId,
    step: Step,
}

/// What the event loop does after a step.
enum Flow {
    /// Wait for the next hardware event.
    Wait,
    /// Current transaction completed on this event; claim the next one now.
    Continue,
}

pub struct TransferEngine<const Q: usize> {
    queue: TransactionQueue<TransactionId, Q>,
    current: Option<Active>,
    running: bool,
}

impl<const Q: usize> Default for TransferEngine<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const Q: usize> TransferEngine<Q> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            queue: TransactionQueue::new(),
            current: None,
            running: false,
        }
    }

    /// Whether the bus is currently owned by the engine.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of transactions waiting behind the current one.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn current(&self) -> Option<TransactionId> {
        self.current.map(|active| active.id)
    }

    /// Step of the current transaction; `None` when idle.
    #[must_use]
    pub fn current_step(&self) -> Option<Step> {
        self.current.map(|active| active.step)
    }

    /// Append a transaction to the queue.
    ///
    /// # Errors
    ///
    /// [`QueueError::Full`] when the queue is saturated.
    pub fn submit(&mut self, cs: CsToken<'_>, id: TransactionId) -> Result<usize, QueueError> {
        self.queue.push(cs, id)
    }

    /// Start draining the queue unless a run is already in progress.
    pub fn ensure_running<const N: usize>(
        &mut self,
        cs: CsToken<'_>,
        table: &mut TransactionTable<'_, N>,
        hw: &mut impl I2cByteMaster,
        logger: &mut impl Logger,
    ) {
        if self.running {
            return;
        }
        self.running = true;
        self.advance(cs, table, hw, logger);
    }

    /// Byte-ready / transfer-complete interrupt.
    pub fn on_byte_event<const N: usize>(
        &mut self,
        cs: CsToken<'_>,
        table: &mut TransactionTable<'_, N>,
        hw: &mut impl I2cByteMaster,
        logger: &mut impl Logger,
    ) {
        if !self.running {
            logger.debug("i2c: byte event while idle, ignored");
            hw.clear_interrupts(INTR_BYTE_EVENT);
            return;
        }
        self.advance(cs, table, hw, logger);
    }

    /// NACK / bus-error interrupt: fail the current transaction and move on.
    ///
    /// The failed transaction is not retried; the caller may enqueue it again.
    pub fn on_error<const N: usize>(
        &mut self,
        cs: CsToken<'_>,
        error: BusError,
        table: &mut TransactionTable<'_, N>,
        hw: &mut impl I2cByteMaster,
        logger: &mut impl Logger,
    ) {
        let Some(active) = self.current else {
            logger.debug("i2c: bus error with no transaction in flight");
            return;
        };
        if let Ok(tx) = table.get_mut(active.id) {
            // Queued means it was re-enqueued after finishing; that run is not on the bus yet
            if matches!(
                tx.status(),
                TransactionStatus::Processing | TransactionStatus::Finished
            ) {
                tx.mark_failed(cs, error);
                logger.error("i2c: transaction failed");
            }
        }
        self.advance(cs, table, hw, logger);
    }

    /// Abort the current transaction and every queued one, then stop the bus.
    ///
    /// Aborted transactions end up `Failed` with [`BusError::Aborted`].
    pub fn shutdown<const N: usize>(
        &mut self,
        cs: CsToken<'_>,
        table: &mut TransactionTable<'_, N>,
        hw: &mut impl I2cByteMaster,
        logger: &mut impl Logger,
    ) {
        if let Some(active) = self.current.take() {
            if let Ok(tx) = table.get_mut(active.id) {
                if !tx.status().is_complete() {
                    tx.mark_failed(cs, BusError::Aborted);
                }
            }
        }
        self.queue.drain_with(cs, |id| {
            if let Ok(tx) = table.get_mut(id) {
                tx.mark_failed(cs, BusError::Aborted);
            }
        });
        if self.running {
            self.go_idle(hw, logger);
        }
    }

    /// Run steps until one has to wait for hardware, or the queue runs dry.
    fn advance<const N: usize>(
        &mut self,
        cs: CsToken<'_>,
        table: &mut TransactionTable<'_, N>,
        hw: &mut impl I2cByteMaster,
        logger: &mut impl Logger,
    ) {
        loop {
            let Some(active) = self.current_or_next(cs, table, hw, logger) else {
                return;
            };
            match self.step(cs, active, table, hw, logger) {
                Flow::Wait => return,
                Flow::Continue => {}
            }
        }
    }

    /// Keep the in-flight transaction, or claim the next queued one.
    ///
    /// Returns `None` after idling the engine on an empty queue.
    fn current_or_next<const N: usize>(
        &mut self,
        cs: CsToken<'_>,
        table: &mut TransactionTable<'_, N>,
        hw: &mut impl I2cByteMaster,
        logger: &mut impl Logger,
    ) -> Option<Active> {
        if let Some(active) = self.current {
            match table.get(active.id) {
                // A completed transaction may already be queued again
                Ok(_) if active.step == Step::Done => {}
                Ok(tx) if !tx.status().is_complete() => return Some(active),
                Ok(_) => {}
                // Finished transactions may be destroyed before the trailing event
                Err(_) => logger.debug("i2c: completed transaction already destroyed"),
            }
        }
        loop {
            match self.queue.pop(cs) {
                Ok((id, _)) => {
                    let Ok(tx) = table.get_mut(id) else {
                        logger.error("i2c: queued transaction vanished");
                        continue;
                    };
                    tx.set_status(cs, TransactionStatus::Processing);
                    logger.debug("i2c: transaction claimed");
                    let active = Active {
                        id,
                        step: Step::Address,
                    };
                    self.current = Some(active);
                    return Some(active);
                }
                Err(_) => {
                    self.go_idle(hw, logger);
                    return None;
                }
            }
        }
    }

    fn go_idle(&mut self, hw: &mut impl I2cByteMaster, logger: &mut impl Logger) {
        self.current = None;
        self.running = false;
        hw.stop_condition();
        logger.debug("i2c: queue empty, bus stopped");
    }

    /// Perform the action of `active.step` and record the following step.
    fn step<const N: usize>(
        &mut self,
        cs: CsToken<'_>,
        active: Active,
        table: &mut TransactionTable<'_, N>,
        hw: &mut impl I2cByteMaster,
        logger: &mut impl Logger,
    ) -> Flow {
        let Ok(tx) = table.get_mut(active.id) else {
            logger.error("i2c: in-flight transaction vanished");
            self.current = None;
            return Flow::Continue;
        };
        let direction = tx.direction();

        let (next, flow) = match active.step {
            Step::Address => {
                hw.set_target_address(tx.address());
                // Sub-address is always written first, reads turn around later
                hw.set_direction(Direction::Write);
                hw.start_condition();
                (Step::Address.after(direction), Flow::Wait)
            }
            Step::SubAddress => {
                hw.write_byte(tx.sub_address());
                (Step::SubAddress.after(direction), Flow::Wait)
            }
            Step::RepeatStart => {
                // First data byte arrives with the next event
                hw.set_direction(Direction::Read);
                hw.repeated_start();
                (Step::RepeatStart.after(direction), Flow::Wait)
            }
            Step::TransmitData => match tx.next_tx_byte() {
                Some((byte, last)) => {
                    hw.write_byte(byte);
                    if last {
                        tx.set_status(cs, TransactionStatus::Finished);
                        logger.debug("i2c: transaction finished");
                        (Step::Done, Flow::Wait)
                    } else {
                        (Step::TransmitData, Flow::Wait)
                    }
                }
                None => {
                    logger.error("i2c: transmit step without data");
                    tx.mark_failed(cs, BusError::Bus);
                    (Step::Done, Flow::Continue)
                }
            },
            Step::ReceiveData => {
                let byte = hw.read_byte();
                match tx.store_rx_byte(byte) {
                    Some(true) => {
                        tx.set_status(cs, TransactionStatus::Finished);
                        logger.debug("i2c: transaction finished");
                        (Step::Done, Flow::Continue)
                    }
                    Some(false) => (Step::ReceiveData, Flow::Wait),
                    None => {
                        logger.error("i2c: receive step without room");
                        tx.mark_failed(cs, BusError::Overrun);
                        (Step::Done, Flow::Continue)
                    }
                }
            }
            Step::Done => {
                logger.debug("i2c: byte event after last step, ignored");
                (Step::Done, Flow::Wait)
            }
        };

        self.current = Some(Active {
            id: active.id,
            step: next,
        });
        flow
    }
}
