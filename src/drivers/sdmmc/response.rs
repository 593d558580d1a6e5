//! Response register readout
//!
//! The controller exposes 48-bit and 136-bit responses through the same four
//! registers. For a short response RESP1 holds the card status; for a long
//! one RESP1 holds the most significant word, so the order flips.

use super::bus::RegisterBus;
use super::regs::Reg;
use crate::error::SdmmcError;

/// Response types of the MMC host protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    R1,
    R1b,
    R2,
    R3,
    R6,
    R7,
}

impl ResponseType {
    /// Whether the response is the 136-bit CID/CSD format
    #[inline]
    pub fn is_long(self) -> bool {
        self == ResponseType::R2
    }
}

/// Copy the last response into `response`
///
/// Status is not checked here; the command that produced the response must
/// already have completed. A missing output buffer fails before any register
/// is touched.
pub fn read_response<B: RegisterBus>(
    bus: &mut B,
    kind: ResponseType,
    response: Option<&mut [u32; 4]>,
) -> Result<(), SdmmcError> {
    let response = response.ok_or(SdmmcError::InvalidArgument)?;

    let order = if kind.is_long() {
        [Reg::Response4, Reg::Response3, Reg::Response2, Reg::Response1]
    } else {
        [Reg::Response1, Reg::Response2, Reg::Response3, Reg::Response4]
    };

    for (word, reg) in response.iter_mut().zip(order) {
        *word = bus.read(reg);
    }

    Ok(())
}
