//! Interrupt-free section around programming
//!
//! The whole parse-and-program phase runs with interrupts disabled. The
//! prior interrupt state is saved on entry and restored when the
//! [`CriticalSection`] guard drops, so every exit path, errors included,
//! leaves the flag as it was found.

/// Control over the global interrupt-enable flag
pub trait InterruptControl {
    /// Saved interrupt state
    type State: Copy;

    /// Disable interrupts and return the state to restore later
    fn save_and_disable(&mut self) -> Self::State;

    /// Restore a state returned by [`save_and_disable`](Self::save_and_disable)
    fn restore(&mut self, state: Self::State);
}

impl<I: InterruptControl + ?Sized> InterruptControl for &mut I {
    type State = I::State;

    fn save_and_disable(&mut self) -> Self::State {
        (**self).save_and_disable()
    }

    fn restore(&mut self, state: Self::State) {
        (**self).restore(state)
    }
}

/// Scoped guard; interrupts stay disabled while it lives
pub struct CriticalSection<'a, I: InterruptControl + ?Sized> {
    irq: &'a mut I,
    saved: I::State,
}

impl<'a, I: InterruptControl + ?Sized> CriticalSection<'a, I> {
    /// Save the interrupt state and disable interrupts
    pub fn enter(irq: &'a mut I) -> Self {
        let saved = irq.save_and_disable();
        Self { irq, saved }
    }
}

impl<I: InterruptControl + ?Sized> Drop for CriticalSection<'_, I> {
    fn drop(&mut self) {
        self.irq.restore(self.saved);
    }
}

/// [`InterruptControl`] backed by the `critical-section` crate
///
/// Works on any target that links a `critical-section` implementation
/// (cortex-m, riscv, avr-device, or `std` on the host).
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalCriticalSection;

impl InterruptControl for GlobalCriticalSection {
    type State = critical_section::RestoreState;

    fn save_and_disable(&mut self) -> Self::State {
        // SAFETY: every acquire is paired with exactly one release by
        // `CriticalSection`, in LIFO order.
        unsafe { critical_section::acquire() }
    }

    fn restore(&mut self, state: Self::State) {
        // SAFETY: `state` came from the matching `acquire` above.
        unsafe { critical_section::release(state) }
    }
}
