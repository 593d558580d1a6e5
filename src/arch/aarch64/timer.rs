//! AArch64 generic timer
//!
//! Busy-wait delays on the architected physical counter. This is what backs
//! the fixed 1 ms polling intervals of the command engine.

use core::arch::asm;

use embedded_hal::delay::DelayNs;

/// Read the physical counter (CNTPCT_EL0)
#[inline]
pub fn counter() -> u64 {
    let value: u64;
    unsafe {
        asm!("isb", "mrs {}, cntpct_el0", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Counter frequency in Hz (CNTFRQ_EL0)
#[inline]
pub fn frequency() -> u64 {
    let value: u64;
    unsafe {
        asm!("mrs {}, cntfrq_el0", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Delay provider spinning on the generic timer
#[derive(Debug, Clone, Copy)]
pub struct GenericTimer {
    frequency: u64,
}

impl GenericTimer {
    pub fn new() -> Self {
        Self {
            frequency: frequency(),
        }
    }
}

impl Default for GenericTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayNs for GenericTimer {
    fn delay_ns(&mut self, ns: u32) {
        let ticks = (u64::from(ns) * self.frequency).div_ceil(1_000_000_000);
        let start = counter();
        while counter().wrapping_sub(start) < ticks {
            core::hint::spin_loop();
        }
    }
}
