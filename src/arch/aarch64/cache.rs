//! AArch64 data cache maintenance

use core::arch::asm;

use crate::arch::DmaOps;

/// Data cache maintenance to the point of coherency
#[derive(Debug, Clone, Copy)]
pub struct DataCache {
    line_size: usize,
}

impl DataCache {
    /// Read the smallest data cache line size from CTR_EL0
    pub fn new() -> Self {
        let ctr: u64;
        unsafe {
            asm!("mrs {}, ctr_el0", out(reg) ctr, options(nomem, nostack, preserves_flags));
        }
        // DminLine: log2 of the number of 4-byte words in the smallest line
        let line_size = 4usize << ((ctr >> 16) & 0xF);
        Self { line_size }
    }
}

impl Default for DataCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DmaOps for DataCache {
    fn clean_invalidate(&mut self, addr: usize, len: usize) {
        if len == 0 {
            return;
        }

        let start = addr & !(self.line_size - 1);
        let end = addr.saturating_add(len);

        unsafe {
            let mut line = start;
            while line < end {
                asm!("dc civac, {addr}", addr = in(reg) line, options(nostack, preserves_flags));
                line += self.line_size;
            }
            asm!("dsb sy", options(nostack, preserves_flags));
        }
    }
}
