//! stm32-sdmmc - SD/MMC host controller driver for the STM32MP2 SDMMC block
//!
//! This library drives the SDMMC controller at the level of single SD/MMC
//! commands and block-sized DMA transfers, and publishes the result through
//! the MMC host capability surface used by UEFI block layers.
//!
//! The crate is `no_std`; host unit tests build it against `std`.

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod config;
pub mod drivers;
pub mod efi;
pub mod error;
pub mod logger;

pub use config::SdmmcConfig;
pub use drivers::sdmmc::SdmmcController;
pub use drivers::sdmmc::command::MmcCmd;
pub use drivers::sdmmc::response::ResponseType;
pub use efi::protocols::mmc_host::{MmcHost, MmcState};
pub use error::SdmmcError;

/// Initialize the SDMMC driver for the board
///
/// Brings up the controller described by `config` and registers it as the
/// global controller reachable through
/// [`drivers::sdmmc::with_controller`].
///
/// # Safety
///
/// See [`drivers::sdmmc::init`].
#[cfg(target_arch = "aarch64")]
pub unsafe fn init(config: SdmmcConfig) {
    log::info!(
        "stm32-sdmmc v{} starting on controller {:#x}",
        env!("CARGO_PKG_VERSION"),
        config.base
    );

    unsafe { drivers::sdmmc::init(config) };

    log::info!("SDMMC initialized successfully!");
}
