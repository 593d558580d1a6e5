//! STM32 SDMMC host controller driver
//!
//! This module drives the SDMMC block found on STM32MP2 SoCs at the level of
//! single SD/MMC commands. Card identification and block translation live
//! above it, behind the MMC host protocol.
//!
//! The controller only starts a data phase when the data path is programmed
//! before the command is written. Data-bearing commands are therefore parked
//! in the [`CommandSession`] by [`SdmmcController::send_command`] and replayed
//! by [`SdmmcController::read_block`] once the data path has been armed.

pub mod bus;
pub mod command;
pub mod data;
pub mod regs;
pub mod response;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

use embedded_hal::delay::DelayNs;
use tock_registers::LocalRegisterCopy;

use crate::arch::DmaOps;
use crate::config::{PollBudget, SdmmcConfig};
use crate::error::SdmmcError;

use bus::{RegisterBus, ResetControl};
use command::{CommandDescriptor, MmcCmd};
use regs::*;
use response::{ResponseType, read_response};
use session::CommandSession;

/// Relative card address sent with the APP_CMD that precedes SEND_SCR
const SCR_APP_CMD_ARGUMENT: u32 = 0xAAAA_0000;

/// A failed phase: the error and the status snapshot that produced it
type PhaseFailure = (SdmmcError, Status);

/// SDMMC controller instance
pub struct SdmmcController<B: RegisterBus, D: DelayNs, M: DmaOps> {
    pub(crate) bus: B,
    pub(crate) delay: D,
    pub(crate) dma: M,
    pub(crate) config: SdmmcConfig,
    pub(crate) session: CommandSession,
}

impl<B: RegisterBus, D: DelayNs, M: DmaOps> SdmmcController<B, D, M> {
    /// Wrap a controller; no register is touched until [`Self::init`]
    pub fn new(bus: B, delay: D, dma: M, config: SdmmcConfig) -> Self {
        Self {
            bus,
            delay,
            dma,
            config,
            session: CommandSession::new(),
        }
    }

    /// Reset, power-cycle and clock the controller for card identification
    pub fn init<R: ResetControl>(&mut self, rcc: &mut R) {
        log::info!("SDMMC: initializing controller at {:#x}", self.config.base);

        rcc.write(RCC_SDMMC_RST | RCC_SDMMC_EN | RCC_SDMMC_LPEN);
        self.delay.delay_us(1000);
        rcc.write(RCC_SDMMC_EN | RCC_SDMMC_LPEN);
        self.delay.delay_us(1000);

        self.bus.write(Reg::Power, POWER::PWRCTRL::Cycle.value);
        self.delay.delay_us(2000);
        self.bus.write(Reg::Power, POWER::PWRCTRL::Off.value);
        self.delay.delay_us(2000);

        let clkcr = CLKCR::HWFC_EN::SET + CLKCR::CLKDIV.val(self.config.init_clock_divider);
        self.bus.write(Reg::ClockControl, clkcr.value);
        self.bus.write(Reg::Power, POWER::PWRCTRL::On.value);
        self.delay.delay_us(1000);

        self.session.clear();
        self.session.set_next_is_app_command(false);

        log::debug!("SDMMC: controller powered on");
    }

    pub fn config(&self) -> &SdmmcConfig {
        &self.config
    }

    pub fn session(&self) -> &CommandSession {
        &self.session
    }

    // ========================================================================
    // Command Dispatch
    // ========================================================================

    /// Issue `cmd` with `argument`, or park it if it carries a data phase
    ///
    /// A parked command returns success without touching the controller. It
    /// goes out on the bus during the next [`Self::read_block`].
    pub fn send_command(&mut self, cmd: MmcCmd, argument: u32) -> Result<(), SdmmcError> {
        if cmd.defers_until_armed(argument) {
            return self.session.latch(cmd, argument);
        }

        self.dispatch(cmd, argument)
    }

    /// Put one command on the bus and wait for it to finish
    pub(crate) fn dispatch(&mut self, cmd: MmcCmd, argument: u32) -> Result<(), SdmmcError> {
        let current: LocalRegisterCopy<u32, CMD::Register> =
            LocalRegisterCopy::new(self.bus.read(Reg::Command));
        if current.is_set(CMD::CPSMEN) {
            self.bus.write(Reg::Command, 0);
        }

        let desc = CommandDescriptor::new(cmd, argument, self.session.next_is_app_command());
        let app_command = cmd == MmcCmd::CMD55;
        self.session.set_next_is_app_command(app_command);

        self.clear_static_flags();

        // An APP_CMD keeps DCTRL so the data path armed for the following
        // app command survives.
        if !desc.transfer && !app_command {
            self.bus.write(Reg::DataControl, 0);
        }

        let word = desc.control_word();
        log::trace!(
            "SDMMC: {} arg={:#010x} cmdr={:#010x}",
            cmd,
            desc.argument,
            word
        );

        self.bus.write(Reg::Argument, desc.argument);
        self.bus.write(Reg::Command, word);

        let outcome = match self.command_phase(&desc) {
            Ok(_) if !desc.has_data_phase() => {
                self.clear_static_flags();
                return Ok(());
            }
            Ok(_) => self.data_phase(&desc),
            Err(failure) => Err(failure),
        };

        self.clear_static_flags();
        let mut command: LocalRegisterCopy<u32, CMD::Register> =
            LocalRegisterCopy::new(self.bus.read(Reg::Command));
        command.modify(CMD::CMDTRANS::CLEAR);
        self.bus.write(Reg::Command, command.get());

        match outcome {
            Ok(_) => Ok(()),
            Err((err, status)) => {
                if status.contains(Status::DPSMACT) && !desc.stop {
                    log::debug!("SDMMC: data path still active after {}, stopping", cmd);
                    self.stop_transfer()?;
                }
                Err(err)
            }
        }
    }

    fn command_phase(&mut self, desc: &CommandDescriptor) -> Result<Status, PhaseFailure> {
        let budget = self.config.command_poll;
        let status = self.poll(desc.command_mask, budget).map_err(|status| {
            log::error!(
                "SDMMC: {} timed out after {} ms (status={:#010x})",
                desc.cmd,
                budget.total_us() / 1000,
                status.bits()
            );
            (SdmmcError::CommandTimeout, status)
        })?;

        if status.contains(Status::CTIMEOUT) {
            if !desc.cmd.is_polling_primitive() {
                log::error!(
                    "SDMMC: {} CTIMEOUT (status={:#010x})",
                    desc.cmd,
                    status.bits()
                );
            }
            return Err((SdmmcError::CommandTimeout, status));
        }

        if status.contains(Status::CCRCFAIL) {
            log::error!(
                "SDMMC: {} CCRCFAIL (status={:#010x})",
                desc.cmd,
                status.bits()
            );
            return Err((SdmmcError::CrcFailure, status));
        }

        Ok(status)
    }

    fn data_phase(&mut self, desc: &CommandDescriptor) -> Result<Status, PhaseFailure> {
        let budget = self.config.data_poll;
        let status = self.poll(desc.data_mask, budget).map_err(|status| {
            log::error!(
                "SDMMC: {} data phase timed out after {} ms (status={:#010x})",
                desc.cmd,
                budget.total_us() / 1000,
                status.bits()
            );
            (SdmmcError::DataTimeout, status)
        })?;

        match data_error(status) {
            Some(err) => {
                log::error!(
                    "SDMMC: {} data error: {} (status={:#010x})",
                    desc.cmd,
                    err,
                    status.bits()
                );
                Err((err, status))
            }
            None => Ok(status),
        }
    }

    /// Send STOP_TRANSMISSION and collect its R1b response
    pub fn stop_transfer(&mut self) -> Result<(), SdmmcError> {
        self.dispatch(MmcCmd::CMD12, 0)?;

        let mut response = [0u32; 4];
        read_response(&mut self.bus, ResponseType::R1b, Some(&mut response))?;
        log::debug!("SDMMC: transfer stopped, card status {:#010x}", response[0]);
        Ok(())
    }

    /// Copy the response of the last command into `response`
    pub fn receive_response(
        &mut self,
        kind: ResponseType,
        response: Option<&mut [u32; 4]>,
    ) -> Result<(), SdmmcError> {
        read_response(&mut self.bus, kind, response)
    }

    // ========================================================================
    // Block Transfers
    // ========================================================================

    /// Read one block into `buffer` by replaying the parked data command
    ///
    /// `length` bytes of `buffer` are zeroed before the transfer; the data
    /// path itself moves at most one 512-byte block.
    pub fn read_block(
        &mut self,
        lba: u64,
        length: usize,
        buffer: &mut [u32],
    ) -> Result<(), SdmmcError> {
        let Some(pending) = self.session.pending() else {
            log::error!("SDMMC: read of LBA {} without a pending data command", lba);
            return Err(SdmmcError::InvalidArgument);
        };

        if let Err(err) = self.prepare_data_path(lba, length, buffer) {
            log::error!("SDMMC: cannot prepare data path for {}: {}", pending.cmd, err);
            self.session.clear();
            return Err(err);
        }

        if pending.cmd == MmcCmd::ACMD51 {
            if let Err(err) = self.send_app_command(SCR_APP_CMD_ARGUMENT) {
                log::error!("SDMMC: APP_CMD before {} failed: {}", pending.cmd, err);
                self.session.clear();
                return Err(err);
            }
        }

        buffer[..length / 4].fill(0);
        let addr = buffer.as_ptr() as usize;
        self.dma.clean_invalidate(addr, length);

        let result = match self.session.begin_replay() {
            Some(replay) => self.dispatch(replay.cmd, replay.argument),
            None => Err(SdmmcError::InvalidArgument),
        };
        if let Err(err) = result {
            log::error!("SDMMC: {} failed during block read: {}", pending.cmd, err);
        }

        self.session.clear();
        self.dma.clean_invalidate(addr, length);
        result
    }

    /// Block writes are not implemented by this controller driver
    pub fn write_block(
        &mut self,
        lba: u64,
        length: usize,
        _buffer: &[u32],
    ) -> Result<(), SdmmcError> {
        log::warn!("SDMMC: write of {} bytes at LBA {} not supported", length, lba);
        Err(SdmmcError::Unsupported)
    }

    fn send_app_command(&mut self, argument: u32) -> Result<(), SdmmcError> {
        self.dispatch(MmcCmd::CMD55, argument)?;
        let mut response = [0u32; 4];
        read_response(&mut self.bus, ResponseType::R1, Some(&mut response))
    }

    // ========================================================================
    // Bus Parameters and Diagnostics
    // ========================================================================

    /// Set the bus width; the clock divider is fixed by the board config
    pub fn set_ios(&mut self, clock_hz: u32, width: u32, timing: u32) -> Result<(), SdmmcError> {
        log::debug!(
            "SDMMC: set_ios clock={} Hz width={} timing={}",
            clock_hz,
            width,
            timing
        );

        let widbus = match width {
            0 => CLKCR::WIDBUS::OneBit,
            4 => CLKCR::WIDBUS::FourBit,
            8 => CLKCR::WIDBUS::EightBit,
            _ => {
                log::error!("SDMMC: invalid bus width {}", width);
                return Ok(());
            }
        };

        let clkcr = CLKCR::CLKDIV.val(self.config.bus_clock_divider)
            + CLKCR::NEGEDGE::SET
            + CLKCR::HWFC_EN::SET
            + widbus;
        self.bus.write(Reg::ClockControl, clkcr.value);
        Ok(())
    }

    /// Log every controller register
    pub fn dump_registers(&mut self) {
        log::debug!("SDMMC: register dump ({:#x})", self.config.base);
        for reg in Reg::ALL {
            let value = self.bus.read(reg);
            log::debug!("  {:<18} [{:#04x}] = {:#010x}", reg.name(), reg.offset(), value);
        }
    }

    // ========================================================================
    // Status Helpers
    // ========================================================================

    #[inline]
    fn status(&mut self) -> Status {
        Status::from_bits_retain(self.bus.read(Reg::Status))
    }

    #[inline]
    fn clear_static_flags(&mut self) {
        self.bus.write(Reg::InterruptClear, Status::STATIC_FLAGS.bits());
    }

    /// Wait for any bit of `mask`; `Err` carries the last snapshot
    fn poll(&mut self, mask: Status, budget: PollBudget) -> Result<Status, Status> {
        let mut status = self.status();
        for _ in 0..budget.iterations {
            if status.intersects(mask) {
                return Ok(status);
            }
            self.delay.delay_us(budget.interval_us);
            status = self.status();
        }

        if status.intersects(mask) {
            Ok(status)
        } else {
            Err(status)
        }
    }
}

// ============================================================================
// Global Controller Management
// ============================================================================

/// Controller wired to the real register block, generic timer and data cache
#[cfg(target_arch = "aarch64")]
pub type BoardController = SdmmcController<
    bus::MmioBus,
    crate::arch::aarch64::GenericTimer,
    crate::arch::aarch64::DataCache,
>;

#[cfg(target_arch = "aarch64")]
static CONTROLLER: spin::Mutex<Option<BoardController>> = spin::Mutex::new(None);

/// Bring up the controller described by `config` and make it the global one
///
/// # Safety
///
/// `config.base` and `config.rcc_register` must be the mapped SDMMC register
/// block and its RCC configuration register, and nothing else may drive them.
#[cfg(target_arch = "aarch64")]
pub unsafe fn init(config: SdmmcConfig) {
    let bus = unsafe { bus::MmioBus::new(config.base) };
    let mut rcc = unsafe { bus::MmioResetControl::new(config.rcc_register) };

    let mut controller = SdmmcController::new(
        bus,
        crate::arch::aarch64::GenericTimer::new(),
        crate::arch::aarch64::DataCache::new(),
        config,
    );
    controller.init(&mut rcc);

    let mut global = CONTROLLER.lock();
    if global.is_some() {
        log::warn!("SDMMC: replacing previously initialized controller");
    }
    *global = Some(controller);
}

/// Run `f` on the global controller, if [`init`] has been called
#[cfg(target_arch = "aarch64")]
pub fn with_controller<R>(f: impl FnOnce(&mut BoardController) -> R) -> Option<R> {
    CONTROLLER.lock().as_mut().map(f)
}

/// Classify the error bits of a finished data phase
fn data_error(status: Status) -> Option<SdmmcError> {
    if !status.intersects(Status::DATA_ERRORS) {
        None
    } else if status.contains(Status::DTIMEOUT) {
        Some(SdmmcError::DataTimeout)
    } else if status.contains(Status::DCRCFAIL) {
        Some(SdmmcError::DataCrcFailure)
    } else if status.contains(Status::TXUNDERR) {
        Some(SdmmcError::FifoUnderrun)
    } else if status.contains(Status::RXOVERR) {
        Some(SdmmcError::FifoOverrun)
    } else if status.contains(Status::IDMATE) {
        Some(SdmmcError::DmaTransferError)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sdmmc::session::SessionState;
    use crate::drivers::sdmmc::testing::{MockReset, capture_logs, controller};
    use log::Level;

    const CPSMEN: u32 = 1 << 12;
    const CMDTRANS: u32 = 1 << 6;

    #[test]
    fn test_data_command_is_latched_not_sent() {
        let mut host = controller();

        host.send_command(MmcCmd::CMD17, 0x40).unwrap();

        assert!(host.bus.writes.is_empty());
        assert!(host.bus.reads.is_empty());
        assert_eq!(host.session.state(), SessionState::Deferred);
        assert_eq!(host.session.pending().unwrap().argument, 0x40);
    }

    #[test]
    fn test_second_data_command_is_rejected() {
        let mut host = controller();
        host.send_command(MmcCmd::CMD18, 1).unwrap();

        assert_eq!(
            host.send_command(MmcCmd::ACMD51, 0),
            Err(SdmmcError::CommandPending)
        );
        assert!(host.bus.writes.is_empty());
        assert_eq!(host.session.pending().unwrap().cmd, MmcCmd::CMD18);
    }

    #[test]
    fn test_bus_width_switch_is_not_latched() {
        let mut host = controller();
        host.bus.on_command(55, Status::CMDREND);
        host.bus.on_command(6, Status::CMDREND);

        host.send_command(MmcCmd::CMD55, 0x1234_0000).unwrap();
        host.send_command(MmcCmd::CMD6, 2).unwrap();

        assert_eq!(host.bus.issued(), [55, 6]);
        assert_eq!(host.bus.control_words(6)[0] & CMDTRANS, 0);
        assert_eq!(host.session.state(), SessionState::Idle);
        assert!(host.session.pending().is_none());
    }

    #[test]
    fn test_command_timeout_budget() {
        let mut host = controller();

        let result = host.send_command(MmcCmd::CMD13, 0x1234_0000);

        assert_eq!(result, Err(SdmmcError::CommandTimeout));
        assert_eq!(host.delay.us_calls, 10);
        assert_eq!(host.delay.total_ns, 10_000_000);
        let clears = host.bus.writes_to(Reg::InterruptClear);
        assert_eq!(clears.len(), 2);
        assert_eq!(*clears.last().unwrap(), Status::STATIC_FLAGS.bits());
    }

    #[test]
    fn test_timeout_bit_and_crc_bit() {
        let mut host = controller();
        host.bus.on_command(8, Status::CTIMEOUT);
        host.bus.on_command(3, Status::CCRCFAIL);

        assert_eq!(
            host.send_command(MmcCmd::CMD8, 0x1AA),
            Err(SdmmcError::CommandTimeout)
        );
        assert_eq!(
            host.send_command(MmcCmd::CMD3, 0),
            Err(SdmmcError::CrcFailure)
        );
        assert_eq!(host.delay.us_calls, 0);
    }

    #[test]
    fn test_timeout_bit_logging_skips_polling_commands() {
        let mut host = controller();
        host.bus.on_command(13, Status::CTIMEOUT);
        host.bus.on_command(3, Status::CTIMEOUT);

        let (status_result, status_logs) =
            capture_logs(|| host.send_command(MmcCmd::CMD13, 0x1234_0000));
        let (rca_result, rca_logs) = capture_logs(|| host.send_command(MmcCmd::CMD3, 0));

        assert_eq!(status_result, Err(SdmmcError::CommandTimeout));
        assert!(!status_logs.iter().any(|(_, line)| line.contains("CTIMEOUT")));
        assert!(status_logs.iter().all(|(level, _)| *level != Level::Error));

        assert_eq!(rca_result, Err(SdmmcError::CommandTimeout));
        let errors: Vec<_> = rca_logs
            .iter()
            .filter(|(level, _)| *level == Level::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("CMD3 CTIMEOUT"));
    }

    #[test]
    fn test_exhausted_budget_is_logged_for_polling_commands() {
        let mut host = controller();

        let (result, logs) = capture_logs(|| host.send_command(MmcCmd::CMD8, 0x1AA));

        assert_eq!(result, Err(SdmmcError::CommandTimeout));
        assert!(
            logs.iter()
                .any(|(level, line)| *level == Level::Error && line.contains("timed out"))
        );
    }

    #[test]
    fn test_go_idle_waits_for_cmdsent() {
        let mut host = controller();
        host.bus.on_command(0, Status::CMDSENT);

        host.send_command(MmcCmd::CMD0, 0).unwrap();

        assert_eq!(host.bus.control_words(0), [CPSMEN]);
        assert_eq!(host.bus.writes_to(Reg::DataControl), [0]);
    }

    #[test]
    fn test_running_command_engine_is_disabled_first() {
        let mut host = controller();
        host.bus.preset(Reg::Command, CPSMEN | 13);
        host.bus.on_command(0, Status::CMDSENT);

        host.send_command(MmcCmd::CMD0, 0).unwrap();

        assert_eq!(host.bus.writes_to(Reg::Command), [0, CPSMEN]);
    }

    #[test]
    fn test_argument_augmentation_reaches_register() {
        let mut host = controller();
        host.bus.on_command(1, Status::CMDREND);
        host.bus.on_command(41, Status::CMDREND);

        host.send_command(MmcCmd::CMD1, 0x00FF_8000).unwrap();
        host.send_command(MmcCmd::ACMD41, 0x4000_0000).unwrap();

        assert_eq!(
            host.bus.writes_to(Reg::Argument),
            [0x80FF_8000, 0x4030_0000]
        );
    }

    #[test]
    fn test_data_timeout_budget() {
        let mut host = controller();
        host.bus.on_command(17, Status::CMDREND);

        let result = host.dispatch(MmcCmd::CMD17, 0);

        assert_eq!(result, Err(SdmmcError::DataTimeout));
        assert_eq!(host.delay.us_calls, 2000);
        assert_eq!(host.bus.issued(), [17]);
        // CMDTRANS dropped on the way out
        assert_eq!(host.bus.value(Reg::Command) & CMDTRANS, 0);
    }

    #[test]
    fn test_data_error_issues_stop_once() {
        let mut host = controller();
        host.bus
            .on_command(17, Status::CMDREND | Status::DCRCFAIL | Status::DPSMACT);
        host.bus.on_command(12, Status::CMDREND);
        host.bus.preset(Reg::Response1, 0x900);

        let result = host.dispatch(MmcCmd::CMD17, 8);

        assert_eq!(result, Err(SdmmcError::DataCrcFailure));
        assert_eq!(host.bus.issued(), [17, 12]);
        assert!(host.bus.reads.contains(&Reg::Response1));
    }

    #[test]
    fn test_failed_stop_overrides_error() {
        let mut host = controller();
        host.bus
            .on_command(18, Status::CMDREND | Status::IDMATE | Status::DPSMACT);
        host.bus
            .on_command(12, Status::CTIMEOUT | Status::DPSMACT);

        let result = host.dispatch(MmcCmd::CMD18, 0);

        assert_eq!(result, Err(SdmmcError::CommandTimeout));
        assert_eq!(host.bus.issued(), [18, 12]);
    }

    #[test]
    fn test_no_stop_without_active_data_path() {
        let mut host = controller();
        host.bus.on_command(17, Status::CMDREND | Status::RXOVERR);

        let result = host.dispatch(MmcCmd::CMD17, 0);

        assert_eq!(result, Err(SdmmcError::FifoOverrun));
        assert_eq!(host.bus.issued(), [17]);
    }

    #[test]
    fn test_data_error_classification() {
        assert_eq!(data_error(Status::DATAEND), None);
        assert_eq!(
            data_error(Status::DTIMEOUT | Status::DCRCFAIL),
            Some(SdmmcError::DataTimeout)
        );
        assert_eq!(data_error(Status::DCRCFAIL), Some(SdmmcError::DataCrcFailure));
        assert_eq!(data_error(Status::TXUNDERR), Some(SdmmcError::FifoUnderrun));
        assert_eq!(data_error(Status::RXOVERR), Some(SdmmcError::FifoOverrun));
        assert_eq!(data_error(Status::IDMATE), Some(SdmmcError::DmaTransferError));
    }

    #[test]
    fn test_app_command_keeps_data_control() {
        let mut host = controller();
        host.bus.on_command(55, Status::CMDREND);
        host.bus.on_command(6, Status::CMDREND);

        host.send_command(MmcCmd::CMD55, 0x1234_0000).unwrap();
        assert!(host.session.next_is_app_command());
        assert!(host.bus.writes_to(Reg::DataControl).is_empty());

        host.send_command(MmcCmd::CMD6, 2).unwrap();
        assert!(!host.session.next_is_app_command());
        assert_eq!(host.bus.control_words(6)[0] & CMDTRANS, 0);
        assert_eq!(host.bus.writes_to(Reg::DataControl), [0]);
    }

    #[test]
    fn test_read_block_replays_single_block_read() {
        let mut host = controller();
        host.bus.on_command(16, Status::CMDREND);
        host.bus.on_command(17, Status::CMDREND | Status::DATAEND);
        let mut buffer = [0xDEAD_BEEFu32; 128];

        host.send_command(MmcCmd::CMD17, 42).unwrap();
        host.read_block(42, 512, &mut buffer).unwrap();

        assert_eq!(host.bus.issued(), [16, 17]);
        assert_eq!(host.bus.writes_to(Reg::Argument), [512, 42]);
        assert_ne!(host.bus.control_words(17)[0] & CMDTRANS, 0);
        assert!(buffer.iter().all(|w| *w == 0));
        assert_eq!(host.session.state(), SessionState::Idle);
        assert!(host.session.pending().is_none());
        let addr = buffer.as_ptr() as usize;
        assert_eq!(host.dma.flushes, [(addr, 512), (addr, 512), (addr, 512)]);
    }

    #[test]
    fn test_read_block_scr_sends_app_command_first() {
        let mut host = controller();
        host.bus.on_command(16, Status::CMDREND);
        host.bus.on_command(55, Status::CMDREND);
        host.bus
            .on_command(51, Status::CMDREND | Status::DATAEND | Status::DBCKEND);
        let mut buffer = [0xFFFF_FFFFu32; 2];

        host.send_command(MmcCmd::ACMD51, 0).unwrap();
        host.read_block(0, 8, &mut buffer).unwrap();

        assert_eq!(host.bus.issued(), [16, 55, 51]);
        assert_eq!(host.bus.writes_to(Reg::Argument), [8, 0xAAAA_0000, 0]);
        // Cleared before CMD16 and by CMD16, then programmed; CMD55 leaves it
        assert_eq!(host.bus.writes_to(Reg::DataControl), [0, 0, 0x32]);
        assert_ne!(host.bus.control_words(51)[0] & CMDTRANS, 0);
        assert_eq!(buffer, [0, 0]);
        assert!(host.session.pending().is_none());
    }

    #[test]
    fn test_read_block_failed_app_command_clears_latch() {
        let mut host = controller();
        host.bus.on_command(16, Status::CMDREND);
        host.bus.on_command(55, Status::CCRCFAIL);
        let mut buffer = [7u32; 2];

        host.send_command(MmcCmd::ACMD51, 0).unwrap();
        let result = host.read_block(0, 8, &mut buffer);

        assert_eq!(result, Err(SdmmcError::CrcFailure));
        assert_eq!(host.bus.issued(), [16, 55]);
        assert_eq!(buffer, [7, 7]);
        assert!(host.session.pending().is_none());
    }

    #[test]
    fn test_read_block_clears_latch_on_replay_failure() {
        let mut host = controller();
        host.bus.on_command(16, Status::CMDREND);
        host.bus.on_command(17, Status::CTIMEOUT);
        let mut buffer = [0u32; 128];

        host.send_command(MmcCmd::CMD17, 0).unwrap();
        let result = host.read_block(0, 512, &mut buffer);

        assert_eq!(result, Err(SdmmcError::CommandTimeout));
        assert_eq!(host.session.state(), SessionState::Idle);

        // A new read can be latched afterwards
        host.send_command(MmcCmd::CMD17, 1).unwrap();
    }

    #[test]
    fn test_read_block_without_latch() {
        let mut host = controller();
        let mut buffer = [0u32; 128];

        let result = host.read_block(0, 512, &mut buffer);

        assert_eq!(result, Err(SdmmcError::InvalidArgument));
        assert!(host.bus.writes.is_empty());
    }

    #[test]
    fn test_read_block_rejects_short_buffer() {
        let mut host = controller();
        let mut buffer = [0u32; 4];

        host.send_command(MmcCmd::CMD17, 0).unwrap();
        let result = host.read_block(0, 512, &mut buffer);

        assert_eq!(result, Err(SdmmcError::InvalidArgument));
        assert!(host.bus.issued().is_empty());
        assert!(host.session.pending().is_none());
    }

    #[test]
    fn test_write_block_unsupported() {
        let mut host = controller();
        let buffer = [0u32; 128];
        assert_eq!(
            host.write_block(0, 512, &buffer),
            Err(SdmmcError::Unsupported)
        );
        assert!(host.bus.writes.is_empty());
    }

    #[test]
    fn test_init_sequence() {
        let mut host = controller();
        let mut rcc = MockReset::default();

        host.init(&mut rcc);

        assert_eq!(rcc.writes, [0b111, 0b110]);
        assert_eq!(host.bus.writes_to(Reg::Power), [2, 0, 3]);
        assert_eq!(host.bus.writes_to(Reg::ClockControl), [(1 << 17) | 0xFA]);
        assert_eq!(host.delay.total_ns, 7_000_000);
    }

    #[test]
    fn test_set_ios_bus_widths() {
        let mut host = controller();

        host.set_ios(50_000_000, 0, 0).unwrap();
        host.set_ios(50_000_000, 4, 0).unwrap();
        host.set_ios(50_000_000, 8, 0).unwrap();

        assert_eq!(
            host.bus.writes_to(Reg::ClockControl),
            [0x3_0002, 0x3_4002, 0x3_8002]
        );
    }

    #[test]
    fn test_set_ios_invalid_width_leaves_clock_control() {
        let mut host = controller();
        host.bus.preset(Reg::ClockControl, 0x3_4002);

        assert_eq!(host.set_ios(25_000_000, 2, 0), Ok(()));

        assert!(host.bus.writes_to(Reg::ClockControl).is_empty());
        assert_eq!(host.bus.value(Reg::ClockControl), 0x3_4002);
    }

    #[test]
    fn test_set_ios_invalid_width_logs_error() {
        let mut host = controller();

        let (result, logs) = capture_logs(|| host.set_ios(25_000_000, 2, 0));

        assert_eq!(result, Ok(()));
        let errors: Vec<_> = logs
            .iter()
            .filter(|(level, _)| *level == Level::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("invalid bus width 2"));
    }

    #[test]
    fn test_receive_response_delegates() {
        let mut host = controller();
        host.bus.preset(Reg::Response1, 0x120);
        let mut response = [0u32; 4];

        host.receive_response(ResponseType::R1, Some(&mut response))
            .unwrap();
        assert_eq!(response[0], 0x120);
        assert_eq!(
            host.receive_response(ResponseType::R2, None),
            Err(SdmmcError::InvalidArgument)
        );
    }

    #[test]
    fn test_dump_registers_reads_everything() {
        let mut host = controller();
        host.dump_registers();
        assert_eq!(host.bus.reads, Reg::ALL.to_vec());
    }
}
