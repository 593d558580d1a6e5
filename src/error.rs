//! SDMMC driver error type

use r_efi::efi;
use thiserror::Error;

/// Errors returned by the SDMMC command engine
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdmmcError {
    /// Command phase did not finish, or the card did not answer
    #[error("command timeout")]
    CommandTimeout,

    /// Command response CRC check failed
    #[error("command response CRC failure")]
    CrcFailure,

    /// Data phase did not finish in its budget, or the card reported a data timeout
    #[error("data timeout")]
    DataTimeout,

    /// Received data block failed its CRC check
    #[error("data CRC failure")]
    DataCrcFailure,

    /// Transmit FIFO ran empty during a write
    #[error("transmit FIFO underrun")]
    FifoUnderrun,

    /// Receive FIFO overflowed during a read
    #[error("receive FIFO overrun")]
    FifoOverrun,

    /// Internal DMA reported a bus error
    #[error("IDMA transfer error")]
    DmaTransferError,

    /// Caller passed an unusable buffer, length or command sequence
    #[error("invalid argument")]
    InvalidArgument,

    /// A data-bearing command is already waiting for its data path
    #[error("a deferred command is already pending")]
    CommandPending,

    /// Operation not implemented by this controller driver
    #[error("operation not supported")]
    Unsupported,
}

impl From<SdmmcError> for efi::Status {
    fn from(err: SdmmcError) -> Self {
        match err {
            SdmmcError::CommandTimeout | SdmmcError::DataTimeout => efi::Status::TIMEOUT,
            SdmmcError::CrcFailure => efi::Status::CRC_ERROR,
            SdmmcError::DataCrcFailure
            | SdmmcError::FifoUnderrun
            | SdmmcError::FifoOverrun
            | SdmmcError::DmaTransferError => efi::Status::DEVICE_ERROR,
            SdmmcError::InvalidArgument => efi::Status::INVALID_PARAMETER,
            SdmmcError::CommandPending => efi::Status::ALREADY_STARTED,
            SdmmcError::Unsupported => efi::Status::UNSUPPORTED,
        }
    }
}

/// Collapse a driver result into the status word of the UEFI protocol surface
pub fn to_status(result: Result<(), SdmmcError>) -> efi::Status {
    match result {
        Ok(()) => efi::Status::SUCCESS,
        Err(err) => err.into(),
    }
}
