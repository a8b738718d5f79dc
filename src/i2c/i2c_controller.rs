// Licensed under the Apache-2.0 license

//! Queued, interrupt-driven I2C master controller.
//!
//! Foreground code creates transactions, enqueues them and polls their status.
//! The application forwards the peripheral's interrupts to
//! [`I2cController::on_byte_event`] and [`I2cController::on_status_interrupt`],
//! which run the protocol to completion one byte at a time. Transactions are
//! serviced strictly in enqueue order and at most one is `Processing` at any
//! instant.
//!
//! ```rust,ignore
//! let mut i2c = I2cController::<_, _>::new(usci_b0, irq, I2cConfigBuilder::new().build(), NoOpLogger)?;
//!
//! let mut reading = [0u8; 2];
//! let cmd = i2c.create_write(0x42, 0x12, b"hello")?;
//! let read = i2c.create_read(0x24, 0x1a, &mut reading)?;
//! i2c.enqueue(cmd)?;
//! i2c.enqueue(read)?;
//!
//! // interrupts do the work; poll without blocking
//! match i2c.poll(cmd) {
//!     Err(nb::Error::WouldBlock) => {}
//!     Err(nb::Error::Other(_)) => { i2c.enqueue(cmd)?; } // retry
//!     Ok(()) => { i2c.destroy_transaction(cmd)?; }
//! }
//! ```
//!
//! There is no timeout: a slave that holds the bus without ever raising a NACK
//! or bus error stalls the engine until [`I2cController::shutdown`] is called.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{BusError, Error, I2cConfig, TransactionStatus};
use crate::i2c::engine::{Step, TransferEngine};
use crate::i2c::interrupt;
use crate::i2c::queue::DEFAULT_QUEUE_CAPACITY;
use crate::i2c::traits::{I2cByteMaster, InterruptControl};
use crate::i2c::transaction::{
    Transaction, TransactionId, TransactionTable, TransferBuffer, DEFAULT_TRANSACTION_SLOTS,
};
use embedded_hal::i2c::SevenBitAddress;
use fugit::HertzU32;

/// `Q` bounds the pending queue, `N` the number of live transactions.
pub struct I2cController<
    'b,
    H: I2cByteMaster,
    I: InterruptControl,
    L: Logger = NoOpLogger,
    const Q: usize = DEFAULT_QUEUE_CAPACITY,
    const N: usize = DEFAULT_TRANSACTION_SLOTS,
> {
    hardware: H,
    irq: I,
    logger: L,
    config: I2cConfig,
    bus_frequency: HertzU32,
    transactions: TransactionTable<'b, N>,
    engine: TransferEngine<Q>,
}

impl<'b, H, I, L, const Q: usize, const N: usize> I2cController<'b, H, I, L, Q, N>
where
    H: I2cByteMaster,
    I: InterruptControl,
    L: Logger,
{
    /// Configure the peripheral as bus master and enable its interrupts.
    ///
    /// Call once from foreground code, after clocks and pins are set up.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the bus speed cannot be derived from the
    /// source clock or the peripheral rejects it.
    pub fn new(
        mut hardware: H,
        irq: I,
        mut config: I2cConfig,
        mut logger: L,
    ) -> Result<Self, Error> {
        hardware.init(&mut config);
        let divider = config.clock_divider()?;
        let achieved =
            hardware.configure_timing(config.speed, divider, &config.timing_config)?;
        hardware.clear_interrupts(config.interrupts);
        hardware.enable_interrupts(config.interrupts);
        logger.debug("i2c: master initialized");

        Ok(Self {
            hardware,
            irq,
            logger,
            config,
            bus_frequency: HertzU32::from_raw(achieved),
            transactions: TransactionTable::new(),
            engine: TransferEngine::new(),
        })
    }

    /// Register a transaction in the `Created` state.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAddress`], [`Error::EmptyBuffer`] or
    /// [`Error::NoFreeSlot`].
    pub fn create_transaction(
        &mut self,
        address: SevenBitAddress,
        sub_address: u8,
        buffer: TransferBuffer<'b>,
    ) -> Result<TransactionId, Error> {
        let transaction = Transaction::new(address, sub_address, buffer)?;
        let Self {
            irq, transactions, ..
        } = self;
        interrupt::with(irq, |_cs| transactions.insert(transaction))
    }

    /// Write `data` to register `sub_address` of the slave at `address`.
    ///
    /// # Errors
    ///
    /// See [`Self::create_transaction`].
    pub fn create_write(
        &mut self,
        address: SevenBitAddress,
        sub_address: u8,
        data: &'b [u8],
    ) -> Result<TransactionId, Error> {
        self.create_transaction(address, sub_address, TransferBuffer::Write(data))
    }

    /// Read `buffer.len()` bytes starting at register `sub_address`.
    ///
    /// # Errors
    ///
    /// See [`Self::create_transaction`].
    pub fn create_read(
        &mut self,
        address: SevenBitAddress,
        sub_address: u8,
        buffer: &'b mut [u8],
    ) -> Result<TransactionId, Error> {
        self.create_transaction(address, sub_address, TransferBuffer::Read(buffer))
    }

    /// Drop the transaction's bookkeeping and hand its buffer back.
    ///
    /// # Errors
    ///
    /// [`Error::TransactionActive`] while Queued or Processing,
    /// [`Error::InvalidHandle`] for stale ids.
    pub fn destroy_transaction(&mut self, id: TransactionId) -> Result<TransferBuffer<'b>, Error> {
        let Self {
            irq, transactions, ..
        } = self;
        interrupt::with(irq, |_cs| {
            if transactions.get(id)?.status().is_active() {
                return Err(Error::TransactionActive);
            }
            transactions.remove(id).map(Transaction::into_buffer)
        })
    }

    /// Queue a Created, Finished or Failed transaction and wake the engine.
    ///
    /// The transaction restarts from its first byte. Returns the number of
    /// free queue slots left.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidReenqueue`] if already Queued or Processing,
    /// [`Error::QueueFull`] if the queue is saturated (status unchanged),
    /// [`Error::InvalidHandle`] for stale ids.
    pub fn enqueue(&mut self, id: TransactionId) -> Result<usize, Error> {
        let Self {
            hardware,
            irq,
            logger,
            transactions,
            engine,
            ..
        } = self;
        interrupt::with(irq, |cs| {
            let tx = transactions.get_mut(id)?;
            if tx.status().is_active() {
                logger.debug("i2c: rejected re-enqueue of active transaction");
                return Err(Error::InvalidReenqueue);
            }
            let Ok(free) = engine.submit(cs, id) else {
                logger.debug("i2c: queue full");
                return Err(Error::QueueFull);
            };
            tx.mark_queued(cs);
            engine.ensure_running(cs, transactions, hardware, logger);
            Ok(free)
        })
    }

    /// Status snapshot.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] for stale ids.
    pub fn status(&self, id: TransactionId) -> Result<TransactionStatus, Error> {
        self.transactions.get(id).map(Transaction::status)
    }

    /// Non-blocking completion check, suitable for `nb::block!`.
    ///
    /// # Errors
    ///
    /// `WouldBlock` while Queued or Processing, `Other(Error::Bus(..))` once
    /// Failed, `Other(Error::NotEnqueued)` for a transaction never queued.
    pub fn poll(&self, id: TransactionId) -> nb::Result<(), Error> {
        let tx = self.transactions.get(id)?;
        match tx.status() {
            TransactionStatus::Created => Err(nb::Error::Other(Error::NotEnqueued)),
            TransactionStatus::Queued | TransactionStatus::Processing => {
                Err(nb::Error::WouldBlock)
            }
            TransactionStatus::Finished => Ok(()),
            TransactionStatus::Failed => Err(nb::Error::Other(Error::Bus(
                tx.last_error().unwrap_or(BusError::Bus),
            ))),
        }
    }

    /// Read-only view of a transaction.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] for stale ids.
    pub fn transaction(&self, id: TransactionId) -> Result<&Transaction<'b>, Error> {
        self.transactions.get(id)
    }

    /// Buffer contents; for reads, the bytes received so far.
    ///
    /// # Errors
    ///
    /// [`Error::TransactionActive`] while Queued or Processing.
    pub fn read_data(&self, id: TransactionId) -> Result<&[u8], Error> {
        let tx = self.transactions.get(id)?;
        if tx.status().is_active() {
            return Err(Error::TransactionActive);
        }
        Ok(tx.buffer().as_slice())
    }

    /// Why the transaction last failed, if it did.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] for stale ids.
    pub fn last_error(&self, id: TransactionId) -> Result<Option<BusError>, Error> {
        self.transactions.get(id).map(Transaction::last_error)
    }

    /// Byte-ready / transfer-complete interrupt handler.
    pub fn on_byte_event(&mut self) {
        let Self {
            hardware,
            irq,
            logger,
            transactions,
            engine,
            ..
        } = self;
        interrupt::with(irq, |cs| {
            engine.on_byte_event(cs, transactions, hardware, logger);
        });
    }

    /// NACK / bus-error interrupt handler.
    ///
    /// Reads and clears the peripheral's error flags, then fails the current
    /// transaction and starts the next queued one.
    pub fn on_status_interrupt(&mut self) {
        let Self {
            hardware,
            irq,
            logger,
            transactions,
            engine,
            ..
        } = self;
        interrupt::with(irq, |cs| {
            if let Some(error) = hardware.take_bus_error() {
                engine.on_error(cs, error, transactions, hardware, logger);
            }
        });
    }

    /// Report a bus error detected outside [`Self::on_status_interrupt`].
    pub fn on_error(&mut self, error: BusError) {
        let Self {
            hardware,
            irq,
            logger,
            transactions,
            engine,
            ..
        } = self;
        interrupt::with(irq, |cs| {
            engine.on_error(cs, error, transactions, hardware, logger);
        });
    }

    /// Fail the current and every queued transaction and stop the bus.
    ///
    /// Escape hatch for a wedged bus; affected transactions report
    /// [`BusError::Aborted`].
    pub fn shutdown(&mut self) {
        let Self {
            hardware,
            irq,
            logger,
            transactions,
            engine,
            ..
        } = self;
        interrupt::with(irq, |cs| {
            engine.shutdown(cs, transactions, hardware, logger);
        });
    }

    /// Shut down and give back the peripheral, interrupt control and logger.
    ///
    /// Transaction buffers are released with the controller's borrow.
    pub fn release(mut self) -> (H, I, L) {
        self.shutdown();
        (self.hardware, self.irq, self.logger)
    }

    /// Whether the engine currently owns the bus.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// Transactions waiting in the queue, excluding the in-flight one.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.engine.pending()
    }

    #[must_use]
    pub fn current_step(&self) -> Option<Step> {
        self.engine.current_step()
    }

    #[must_use]
    pub fn current_transaction(&self) -> Option<TransactionId> {
        self.engine.current()
    }

    /// Bus frequency reported by the peripheral at initialization.
    #[must_use]
    pub fn bus_frequency(&self) -> HertzU32 {
        self.bus_frequency
    }

    #[must_use]
    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    #[must_use]
    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    /// Chip-specific extras not covered by the traits.
    ///
    /// Must not touch bus state while [`Self::is_running`] is true.
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    #[must_use]
    pub fn logger(&self) -> &L {
        &self.logger
    }
}
