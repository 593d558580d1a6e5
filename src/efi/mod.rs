//! EFI-facing side of the driver
//!
//! Protocol implementations and helpers shared between them.

pub mod protocols;
pub mod utils;
