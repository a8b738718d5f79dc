// Licensed under the Apache-2.0 license

//! Interrupt-mask critical section.
//!
//! The queue, the running flag and the current transaction are shared between
//! foreground code and the I2C interrupt handlers. Every access happens while a
//! [`CriticalSection`] is alive. The guard holds `&mut` to the interrupt
//! controller, so the compiler rejects a second entry while the first one is
//! still open; code that already holds the lock receives a [`CsToken`] instead
//! of locking again.

use crate::i2c::traits::InterruptControl;
use core::marker::PhantomData;

/// Proof that interrupts are masked for the lifetime `'cs`.
#[derive(Clone, Copy)]
pub struct CsToken<'cs> {
    _guard: PhantomData<&'cs ()>,
}

/// RAII guard: interrupts masked on entry, prior enable state restored on drop.
pub struct CriticalSection<'a, I: InterruptControl> {
    irq: &'a mut I,
    restore: bool,
}

impl<'a, I: InterruptControl> CriticalSection<'a, I> {
    pub fn enter(irq: &'a mut I) -> Self {
        let restore = irq.are_enabled();
        irq.disable();
        Self { irq, restore }
    }

    #[must_use]
    pub fn token(&self) -> CsToken<'_> {
        CsToken {
            _guard: PhantomData,
        }
    }
}

impl<I: InterruptControl> Drop for CriticalSection<'_, I> {
    fn drop(&mut self) {
        if self.restore {
            self.irq.enable();
        }
    }
}

/// Run `f` with interrupts masked.
pub fn with<I: InterruptControl, R>(irq: &mut I, f: impl FnOnce(CsToken<'_>) -> R) -> R {
    let cs = CriticalSection::enter(irq);
    f(cs.token())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::mock::MockIrq;

    #[test]
    fn test_restores_enabled_state() {
        let mut irq = MockIrq::new(true);
        with(&mut irq, |_cs| {});
        assert!(irq.are_enabled());
        assert_eq!(irq.disable_calls, 1);
        assert_eq!(irq.enable_calls, 1);
    }

    #[test]
    fn test_keeps_disabled_state() {
        // Entered from an interrupt handler: interrupts already masked
        let mut irq = MockIrq::new(false);
        with(&mut irq, |_cs| {});
        assert!(!irq.are_enabled());
        assert_eq!(irq.enable_calls, 0);
    }

    #[test]
    fn test_masked_while_guard_alive() {
        let mut irq = MockIrq::new(true);
        {
            let cs = CriticalSection::enter(&mut irq);
            let _token = cs.token();
            assert!(!cs.irq.are_enabled());
        }
        assert!(irq.are_enabled());
    }

    #[test]
    fn test_returns_closure_value() {
        let mut irq = MockIrq::new(true);
        let value = with(&mut irq, |_cs| 42);
        assert_eq!(value, 42);
    }
}
