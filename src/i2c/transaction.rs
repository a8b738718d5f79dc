// Licensed under the Apache-2.0 license

//! Transactions and the table that tracks them.
//!
//! A transaction is one addressed register read or write. Its data buffer is
//! borrowed from the caller for as long as the transaction exists and is
//! handed back untouched by the driver's bookkeeping on destruction.
//!
//! Transactions are stored in a fixed table of `N` slots and referred to by
//! [`TransactionId`]. Ids carry a generation so an id kept after its
//! transaction was destroyed is rejected instead of aliasing a newer one.

use crate::i2c::common::{BusError, Direction, Error, TransactionStatus};
use crate::i2c::interrupt::CsToken;
use core::sync::atomic::{AtomicU8, Ordering};
use embedded_hal::i2c::SevenBitAddress;

/// Default number of transaction slots.
pub const DEFAULT_TRANSACTION_SLOTS: usize = 16;

/// Handle to a transaction owned by an [`I2cController`](crate::i2c::I2cController).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransactionId {
    index: u16,
    generation: u16,
}

/// Caller-owned data buffer; the variant selects the transfer direction.
#[derive(Debug)]
pub enum TransferBuffer<'b> {
    /// Bytes sent to the slave after the sub-address.
    Write(&'b [u8]),
    /// Storage filled with bytes read from the slave.
    Read(&'b mut [u8]),
}

impl TransferBuffer<'_> {
    #[must_use]
    pub fn direction(&self) -> Direction {
        match self {
            Self::Write(_) => Direction::Write,
            Self::Read(_) => Direction::Read,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Write(data) => data.len(),
            Self::Read(data) => data.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Write(data) => data,
            Self::Read(data) => data,
        }
    }
}

pub struct Transaction<'b> {
    address: SevenBitAddress,
    sub_address: u8,
    buffer: TransferBuffer<'b>,
    cursor: usize,
    status: AtomicU8,
    error: Option<BusError>,
}

impl<'b> Transaction<'b> {
    /// Build a transaction in the `Created` state.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAddress`] for addresses above `0x7f`,
    /// [`Error::EmptyBuffer`] for zero-length buffers.
    pub fn new(
        address: SevenBitAddress,
        sub_address: u8,
        buffer: TransferBuffer<'b>,
    ) -> Result<Self, Error> {
        if address > 0x7f {
            return Err(Error::InvalidAddress);
        }
        if buffer.is_empty() {
            return Err(Error::EmptyBuffer);
        }
        Ok(Self {
            address,
            sub_address,
            buffer,
            cursor: 0,
            status: AtomicU8::new(TransactionStatus::Created as u8),
            error: None,
        })
    }

    #[must_use]
    pub fn address(&self) -> SevenBitAddress {
        self.address
    }

    #[must_use]
    pub fn sub_address(&self) -> u8 {
        self.sub_address
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.buffer.direction()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Bytes transferred so far.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        TransactionStatus::from_raw(self.status.load(Ordering::Acquire))
    }

    /// Bus error that failed the most recent run, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<BusError> {
        self.error
    }

    #[must_use]
    pub fn buffer(&self) -> &TransferBuffer<'b> {
        &self.buffer
    }

    pub(crate) fn into_buffer(self) -> TransferBuffer<'b> {
        self.buffer
    }

    pub(crate) fn set_status(&self, _cs: CsToken<'_>, status: TransactionStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Reset progress and mark the transaction queued.
    pub(crate) fn mark_queued(&mut self, cs: CsToken<'_>) {
        self.cursor = 0;
        self.error = None;
        self.set_status(cs, TransactionStatus::Queued);
    }

    pub(crate) fn mark_failed(&mut self, cs: CsToken<'_>, error: BusError) {
        self.error = Some(error);
        self.set_status(cs, TransactionStatus::Failed);
    }

    /// Next byte to transmit, advancing the cursor.
    ///
    /// Returns the byte and whether it was the last one.
    pub(crate) fn next_tx_byte(&mut self) -> Option<(u8, bool)> {
        let TransferBuffer::Write(data) = &self.buffer else {
            return None;
        };
        let byte = *data.get(self.cursor)?;
        self.cursor += 1;
        Some((byte, self.cursor == data.len()))
    }

    /// Store a received byte at the cursor, advancing it.
    ///
    /// Returns whether the buffer is now full, or `None` if there was no room.
    pub(crate) fn store_rx_byte(&mut self, byte: u8) -> Option<bool> {
        let TransferBuffer::Read(data) = &mut self.buffer else {
            return None;
        };
        let len = data.len();
        *data.get_mut(self.cursor)? = byte;
        self.cursor += 1;
        Some(self.cursor == len)
    }
}

#[derive(Default)]
struct Slot<'b> {
    generation: u16,
    transaction: Option<Transaction<'b>>,
}

pub struct TransactionTable<'b, const N: usize> {
    slots: [Slot<'b>; N],
}

impl<const N: usize> Default for TransactionTable<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'b, const N: usize> TransactionTable<'b, N> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| Slot::default()),
        }
    }

    /// Store `transaction` in the first free slot.
    ///
    /// # Errors
    ///
    /// [`Error::NoFreeSlot`] when every slot is taken.
    pub fn insert(&mut self, transaction: Transaction<'b>) -> Result<TransactionId, Error> {
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.transaction.is_none())
            .ok_or(Error::NoFreeSlot)?;
        let index = u16::try_from(index).map_err(|_| Error::NoFreeSlot)?;
        slot.transaction = Some(transaction);
        Ok(TransactionId {
            index,
            generation: slot.generation,
        })
    }

    /// # Errors
    ///
    /// [`Error::InvalidHandle`] for stale or unknown ids.
    pub fn get(&self, id: TransactionId) -> Result<&Transaction<'b>, Error> {
        self.slots
            .get(usize::from(id.index))
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.transaction.as_ref())
            .ok_or(Error::InvalidHandle)
    }

    /// # Errors
    ///
    /// [`Error::InvalidHandle`] for stale or unknown ids.
    pub fn get_mut(&mut self, id: TransactionId) -> Result<&mut Transaction<'b>, Error> {
        self.slots
            .get_mut(usize::from(id.index))
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.transaction.as_mut())
            .ok_or(Error::InvalidHandle)
    }

    /// Take the transaction out of its slot and retire the id.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] for stale or unknown ids.
    pub fn remove(&mut self, id: TransactionId) -> Result<Transaction<'b>, Error> {
        let slot = self
            .slots
            .get_mut(usize::from(id.index))
            .filter(|slot| slot.generation == id.generation)
            .ok_or(Error::InvalidHandle)?;
        let transaction = slot.transaction.take().ok_or(Error::InvalidHandle)?;
        slot.generation = slot.generation.wrapping_add(1);
        Ok(transaction)
    }

    /// Number of live transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.transaction.is_some())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
