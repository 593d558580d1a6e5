//! AArch64 architecture support
//!
//! Data cache maintenance by virtual address and the architected generic
//! timer, as used by the SDMMC driver on Cortex-A35 class cores.

pub mod cache;
pub mod timer;

pub use cache::DataCache;
pub use timer::GenericTimer;
