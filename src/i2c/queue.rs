// Licensed under the Apache-2.0 license

//! Bounded FIFO of pending transactions.
//!
//! A fixed-capacity ring of opaque handles. It stores handles by value and
//! never owns what they refer to. All operations require a [`CsToken`]: the
//! queue is pushed from foreground code and popped from interrupt context.

use crate::i2c::interrupt::CsToken;
use heapless::Deque;

/// Default number of pending transactions.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueueError {
    Full,
    Empty,
}

pub struct TransactionQueue<T: Copy, const C: usize> {
    slots: Deque<T, C>,
    /// Authoritative occupancy, checked before any ring access.
    count: usize,
}

impl<T: Copy, const C: usize> Default for TransactionQueue<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy, const C: usize> TransactionQueue<T, C> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Deque::new(),
            count: 0,
        }
    }

    /// Append `item` at the tail.
    ///
    /// Returns the number of free slots left after the insertion.
    ///
    /// # Errors
    ///
    /// [`QueueError::Full`] when `C` items are already queued; the queue is
    /// left untouched.
    pub fn push(&mut self, _cs: CsToken<'_>, item: T) -> Result<usize, QueueError> {
        if self.count == C {
            return Err(QueueError::Full);
        }
        self.slots.push_back(item).map_err(|_| QueueError::Full)?;
        self.count += 1;
        Ok(C - self.count)
    }

    /// Remove the head item.
    ///
    /// Returns the item and the occupancy after removal.
    ///
    /// # Errors
    ///
    /// [`QueueError::Empty`] when nothing is queued; the queue is left
    /// untouched.
    pub fn pop(&mut self, _cs: CsToken<'_>) -> Result<(T, usize), QueueError> {
        if self.count == 0 {
            return Err(QueueError::Empty);
        }
        let item = self.slots.pop_front().ok_or(QueueError::Empty)?;
        self.count -= 1;
        Ok((item, self.count))
    }

    /// Pop every queued item, oldest first, handing each to `f`.
    pub fn drain_with(&mut self, cs: CsToken<'_>, mut f: impl FnMut(T)) {
        while let Ok((item, _)) = self.pop(cs) {
            f(item);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count == C
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        C
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::interrupt;
    use crate::i2c::mock::MockIrq;

    #[test]
    fn test_push_reports_free_slots() {
        let mut irq = MockIrq::new(true);
        let mut queue = TransactionQueue::<u8, 4>::new();

        interrupt::with(&mut irq, |cs| {
            assert_eq!(queue.push(cs, 1), Ok(3));
            assert_eq!(queue.push(cs, 2), Ok(2));
            assert_eq!(queue.push(cs, 3), Ok(1));
            assert_eq!(queue.push(cs, 4), Ok(0));
        });
        assert!(queue.is_full());
        assert_eq!(queue.capacity(), 4);
    }

    #[test]
    fn test_pop_reports_occupancy_in_fifo_order() {
        let mut irq = MockIrq::new(true);
        let mut queue = TransactionQueue::<u8, 4>::new();

        interrupt::with(&mut irq, |cs| {
            queue.push(cs, 10).unwrap();
            queue.push(cs, 20).unwrap();
            assert_eq!(queue.pop(cs), Ok((10, 1)));
            assert_eq!(queue.pop(cs), Ok((20, 0)));
        });
        assert!(queue.is_empty());
    }

    #[test]
    fn test_full_queue_rejects_without_change() {
        let mut irq = MockIrq::new(true);
        let mut queue = TransactionQueue::<u8, 2>::new();

        interrupt::with(&mut irq, |cs| {
            queue.push(cs, 1).unwrap();
            queue.push(cs, 2).unwrap();
            assert_eq!(queue.push(cs, 3), Err(QueueError::Full));
            assert_eq!(queue.len(), 2);
            assert_eq!(queue.pop(cs), Ok((1, 1)));
            assert_eq!(queue.pop(cs), Ok((2, 0)));
        });
    }

    #[test]
    fn test_empty_queue_rejects_without_change() {
        let mut irq = MockIrq::new(true);
        let mut queue = TransactionQueue::<u8, 2>::new();

        interrupt::with(&mut irq, |cs| {
            assert_eq!(queue.pop(cs), Err(QueueError::Empty));
            assert_eq!(queue.len(), 0);
            assert_eq!(queue.push(cs, 7), Ok(1));
            assert_eq!(queue.pop(cs), Ok((7, 0)));
        });
    }

    #[test]
    fn test_interleaved_wraparound_keeps_count_in_bounds() {
        let mut irq = MockIrq::new(true);
        let mut queue = TransactionQueue::<u32, 3>::new();
        let mut model = std::collections::VecDeque::new();

        // Deterministic push/pop pattern that wraps the ring many times
        interrupt::with(&mut irq, |cs| {
            for step in 0u32..200 {
                if step % 3 == 2 || step % 7 == 0 {
                    let expected = model.pop_front();
                    match queue.pop(cs) {
                        Ok((item, left)) => {
                            assert_eq!(Some(item), expected);
                            assert_eq!(left, model.len());
                        }
                        Err(QueueError::Empty) => assert!(expected.is_none()),
                        Err(QueueError::Full) => unreachable!(),
                    }
                } else {
                    match queue.push(cs, step) {
                        Ok(free) => {
                            model.push_back(step);
                            assert_eq!(free, 3 - model.len());
                        }
                        Err(QueueError::Full) => assert_eq!(model.len(), 3),
                        Err(QueueError::Empty) => unreachable!(),
                    }
                }
                assert!(queue.len() <= 3);
                assert_eq!(queue.len(), model.len());
            }
        });
    }

    #[test]
    fn test_drain_with_empties_in_order() {
        let mut irq = MockIrq::new(true);
        let mut queue = TransactionQueue::<u8, 4>::new();
        let mut drained = Vec::new();

        interrupt::with(&mut irq, |cs| {
            queue.push(cs, 1).unwrap();
            queue.push(cs, 2).unwrap();
            queue.push(cs, 3).unwrap();
            queue.drain_with(cs, |item| drained.push(item));
        });

        assert_eq!(drained, vec![1, 2, 3]);
        assert!(queue.is_empty());
    }
}
