//! Board configuration for the SDMMC driver
//!
//! Everything that depends on the SoC or the board rather than on the
//! SD/MMC protocol lives here. Values are fixed at build time.

use r_efi::efi::Guid;

/// A bounded busy-wait: `iterations` polls spaced `interval_us` apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    pub iterations: u32,
    pub interval_us: u32,
}

impl PollBudget {
    pub const fn new(iterations: u32, interval_us: u32) -> Self {
        Self {
            iterations,
            interval_us,
        }
    }

    /// Total budget in microseconds
    pub const fn total_us(&self) -> u64 {
        self.iterations as u64 * self.interval_us as u64
    }
}

/// Static SDMMC controller configuration
#[derive(Debug, Clone, Copy)]
pub struct SdmmcConfig {
    /// Controller register block base address
    pub base: usize,
    /// RCC SDMMCx configuration register (reset and clock gating)
    pub rcc_register: usize,
    /// Clock divider used once the card is in transfer mode
    pub bus_clock_divider: u32,
    /// Clock divider used during bring-up and card identification
    pub init_clock_divider: u32,
    /// Command phase budget
    pub command_poll: PollBudget,
    /// Data phase budget
    pub data_poll: PollBudget,
    /// Vendor GUID published in the controller's device path
    pub vendor_guid: Guid,
}

/// Command phase: 10 polls, 1 ms apart
pub const COMMAND_POLL: PollBudget = PollBudget::new(10, 1000);

/// Data phase: 2000 polls, 1 ms apart
pub const DATA_POLL: PollBudget = PollBudget::new(2000, 1000);

/// Device path vendor GUID of the SDMMC host driver
pub const SDMMC_HOST_VENDOR_GUID: Guid = Guid::from_fields(
    0x3b1b_5f53,
    0x0c5a,
    0x4c6e,
    0x9a,
    0x1d,
    &[0x2f, 0x51, 0x6d, 0x4e, 0x80, 0x25],
);

impl SdmmcConfig {
    /// SDMMC1 on STM32MP25, SD card slot
    pub const STM32MP25_SDMMC1: Self = Self {
        base: 0x4822_0000,
        rcc_register: 0x5420_0000 + 0x830,
        // 50 MHz from the 100 MHz kernel clock
        bus_clock_divider: 2,
        init_clock_divider: 0xFA,
        command_poll: COMMAND_POLL,
        data_poll: DATA_POLL,
        vendor_guid: SDMMC_HOST_VENDOR_GUID,
    };
}

impl Default for SdmmcConfig {
    fn default() -> Self {
        Self::STM32MP25_SDMMC1
    }
}
