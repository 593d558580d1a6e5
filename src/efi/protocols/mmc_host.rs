//! MMC Host Protocol
//!
//! The capability surface a generic MMC/SD block layer drives: card
//! detection, bus parameters, single commands with their responses, and
//! block-sized data transfers. [`SdmmcController`] implements it directly;
//! another controller can be swapped in per board.

use embedded_hal::delay::DelayNs;

use crate::arch::DmaOps;
use crate::drivers::sdmmc::SdmmcController;
use crate::drivers::sdmmc::bus::RegisterBus;
use crate::drivers::sdmmc::command::MmcCmd;
use crate::drivers::sdmmc::response::ResponseType;
use crate::efi::protocols::device_path::{SdmmcDevicePath, build_sdmmc_device_path};
use crate::error::SdmmcError;

/// Card state reported by the block layer through [`MmcHost::notify_state`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmcState {
    Invalid,
    HwInitialization,
    Idle,
    Ready,
    Identification,
    StandBy,
    Transfer,
    SendingData,
    ReceiveData,
    Programming,
    Disconnect,
}

/// MMC host controller operations
pub trait MmcHost {
    /// Whether a card sits in the slot
    fn is_card_present(&mut self) -> bool;

    /// Whether the card is write protected
    fn is_read_only(&mut self) -> bool;

    /// Device path identifying the controller
    fn build_device_path(&self) -> SdmmcDevicePath;

    /// Card state change notification
    fn notify_state(&mut self, state: MmcState) -> Result<(), SdmmcError>;

    fn send_command(&mut self, cmd: MmcCmd, argument: u32) -> Result<(), SdmmcError>;

    fn receive_response(
        &mut self,
        kind: ResponseType,
        response: Option<&mut [u32; 4]>,
    ) -> Result<(), SdmmcError>;

    /// Read one block; multi-block reads call this once per block
    fn read_block_data(
        &mut self,
        lba: u64,
        length: usize,
        buffer: &mut [u32],
    ) -> Result<(), SdmmcError>;

    fn write_block_data(
        &mut self,
        lba: u64,
        length: usize,
        buffer: &[u32],
    ) -> Result<(), SdmmcError>;

    /// Configure clock, bus width and timing mode
    fn set_ios(
        &mut self,
        bus_clock_hz: u32,
        bus_width: u32,
        timing_mode: u32,
    ) -> Result<(), SdmmcError>;
}

impl<B: RegisterBus, D: DelayNs, M: DmaOps> MmcHost for SdmmcController<B, D, M> {
    fn is_card_present(&mut self) -> bool {
        // No card-detect line is wired on the supported boards
        true
    }

    fn is_read_only(&mut self) -> bool {
        false
    }

    fn build_device_path(&self) -> SdmmcDevicePath {
        build_sdmmc_device_path(&self.config().vendor_guid)
    }

    fn notify_state(&mut self, state: MmcState) -> Result<(), SdmmcError> {
        log::trace!("SDMMC: card state {:?}", state);
        Ok(())
    }

    fn send_command(&mut self, cmd: MmcCmd, argument: u32) -> Result<(), SdmmcError> {
        SdmmcController::send_command(self, cmd, argument)
    }

    fn receive_response(
        &mut self,
        kind: ResponseType,
        response: Option<&mut [u32; 4]>,
    ) -> Result<(), SdmmcError> {
        SdmmcController::receive_response(self, kind, response)
    }

    fn read_block_data(
        &mut self,
        lba: u64,
        length: usize,
        buffer: &mut [u32],
    ) -> Result<(), SdmmcError> {
        self.read_block(lba, length, buffer)
    }

    fn write_block_data(
        &mut self,
        lba: u64,
        length: usize,
        buffer: &[u32],
    ) -> Result<(), SdmmcError> {
        self.write_block(lba, length, buffer)
    }

    fn set_ios(
        &mut self,
        bus_clock_hz: u32,
        bus_width: u32,
        timing_mode: u32,
    ) -> Result<(), SdmmcError> {
        SdmmcController::set_ios(self, bus_clock_hz, bus_width, timing_mode)
    }
}
