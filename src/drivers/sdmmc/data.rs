//! Data path programming
//!
//! Every transfer is a single block of at most 512 bytes moved by the
//! internal DMA straight into the caller's buffer. Multi-block reads are
//! driven by the caller one block at a time.

use embedded_hal::delay::DelayNs;
use tock_registers::LocalRegisterCopy;

use super::SdmmcController;
use super::bus::RegisterBus;
use super::command::MmcCmd;
use super::regs::{BLOCK_LEN, DCTRL, IDMACTRL, Reg};
use crate::arch::DmaOps;
use crate::error::SdmmcError;

/// One block-sized DMA transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataTransfer {
    /// CPU address of the destination buffer
    pub buffer: usize,
    /// Bytes programmed into the data length register
    pub length: u32,
    /// log2 of `length`
    pub block_size_exp: u8,
    /// Address programmed into the IDMA base register
    pub dma_base: u32,
}

impl DataTransfer {
    /// Describe a transfer of `length` bytes into `buffer`, clamped to one block
    pub fn new<M: DmaOps>(dma: &M, buffer: &[u32], length: usize) -> Result<Self, SdmmcError> {
        if length == 0 || length > buffer.len() * 4 {
            log::error!(
                "SDMMC: transfer length {} does not fit a {}-byte buffer",
                length,
                buffer.len() * 4
            );
            return Err(SdmmcError::InvalidArgument);
        }

        let clamped = length.min(BLOCK_LEN as usize) as u32;
        if !clamped.is_power_of_two() {
            log::error!("SDMMC: block length {} is not a power of two", clamped);
            return Err(SdmmcError::InvalidArgument);
        }

        let addr = buffer.as_ptr() as usize;
        let dma_base = dma.dma_address(addr).ok_or_else(|| {
            log::error!("SDMMC: buffer at {:#x} is out of IDMA reach", addr);
            SdmmcError::InvalidArgument
        })?;

        Ok(Self {
            buffer: addr,
            length: clamped,
            block_size_exp: clamped.trailing_zeros() as u8,
            dma_base,
        })
    }
}

impl<B: RegisterBus, D: DelayNs, M: DmaOps> SdmmcController<B, D, M> {
    /// Program the data path for the next block transfer into `buffer`
    ///
    /// SET_BLOCKLEN failing is reported but the data registers are still
    /// programmed; only an unusable buffer or length aborts.
    pub fn prepare_data_path(
        &mut self,
        lba: u64,
        length: usize,
        buffer: &mut [u32],
    ) -> Result<DataTransfer, SdmmcError> {
        let transfer = DataTransfer::new(&self.dma, buffer, length)?;

        log::trace!(
            "SDMMC: data path lba={} len={} (block 2^{}) dma={:#010x}",
            lba,
            transfer.length,
            transfer.block_size_exp,
            transfer.dma_base
        );

        self.dma.clean_invalidate(transfer.buffer, length);

        self.bus.write(Reg::DataTimer, 0);
        self.bus.write(Reg::DataLength, 0);
        self.bus.write(Reg::DataControl, 0);

        if let Err(err) = self.dispatch(MmcCmd::CMD16, transfer.length) {
            log::error!("SDMMC: SET_BLOCKLEN({}) failed: {}", transfer.length, err);
        }

        self.bus.write(Reg::DataTimer, u32::MAX);
        self.bus.write(Reg::DataLength, transfer.length);
        self.bus
            .write(Reg::IdmaControl, IDMACTRL::IDMAEN::SET.value);
        self.bus.write(Reg::IdmaBase0, transfer.dma_base);

        let mut dctrl: LocalRegisterCopy<u32, DCTRL::Register> =
            LocalRegisterCopy::new(self.bus.read(Reg::DataControl));
        dctrl.modify(
            DCTRL::DTEN::CLEAR
                + DCTRL::DTDIR::SET
                + DCTRL::DTMODE::Block
                + DCTRL::DBLOCKSIZE.val(u32::from(transfer.block_size_exp)),
        );
        self.bus.write(Reg::DataControl, dctrl.get());

        self.session.arm();
        Ok(transfer)
    }
}
