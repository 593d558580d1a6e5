//! EFI Protocol implementations
//!
//! This module contains the protocol surface the SDMMC driver publishes to the
//! MMC/SD block layer.

pub mod device_path;
pub mod mmc_host;
