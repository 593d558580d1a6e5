//! Architecture support
//!
//! Cache maintenance, DMA address translation and delay providers that the
//! SDMMC driver needs from the CPU it runs on.

#[cfg(target_arch = "aarch64")]
pub mod aarch64;

/// CPU-side view of memory that the controller's internal DMA reads or writes
pub trait DmaOps {
    /// Clean and invalidate the data cache lines covering `[addr, addr + len)`
    fn clean_invalidate(&mut self, addr: usize, len: usize);

    /// Bus address the IDMA must be programmed with for the CPU address `addr`
    ///
    /// The IDMA base register is 32 bits wide; `None` means the buffer is not
    /// reachable by the controller.
    fn dma_address(&self, addr: usize) -> Option<u32> {
        u32::try_from(addr).ok()
    }
}

/// DMA path that is coherent with the CPU caches (or runs with caches off)
#[derive(Debug, Default, Clone, Copy)]
pub struct CoherentDma;

impl DmaOps for CoherentDma {
    fn clean_invalidate(&mut self, _addr: usize, _len: usize) {}
}

/// Monotonic tick count used for log timestamps
#[inline]
pub fn ticks() -> u64 {
    #[cfg(target_arch = "aarch64")]
    {
        aarch64::timer::counter()
    }
    #[cfg(not(target_arch = "aarch64"))]
    {
        0
    }
}
