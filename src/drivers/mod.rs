//! Hardware drivers
//!
//! This module contains drivers for the storage controllers needed to boot.

pub mod sdmmc;
