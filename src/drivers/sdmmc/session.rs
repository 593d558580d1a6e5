//! Command session state owned by one controller
//!
//! The SDMMC block only starts a data transfer when the data path is already
//! programmed at the moment the command is written, while the MMC host
//! protocol issues the command before asking for the data. Data-bearing
//! commands are therefore parked here and replayed by the read-block path.

use super::command::MmcCmd;
use crate::error::SdmmcError;

/// A data-bearing command waiting for its data path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCommand {
    pub cmd: MmcCmd,
    pub argument: u32,
}

/// Where the command pipeline currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing parked
    Idle,
    /// A command is parked, data path not yet programmed
    Deferred,
    /// Data path programmed for the parked command
    Armed,
    /// The parked command is on the bus
    Executing,
}

/// Pending command latch plus the app-command marker
#[derive(Debug)]
pub struct CommandSession {
    pending: Option<PendingCommand>,
    state: SessionState,
    next_is_app_command: bool,
}

impl CommandSession {
    pub const fn new() -> Self {
        Self {
            pending: None,
            state: SessionState::Idle,
            next_is_app_command: false,
        }
    }

    /// Park `cmd` until the data path is armed
    ///
    /// Only one command can be parked at a time; a second request leaves the
    /// first in place and fails.
    pub fn latch(&mut self, cmd: MmcCmd, argument: u32) -> Result<(), SdmmcError> {
        if let Some(pending) = self.pending {
            log::error!(
                "SDMMC: {} requested while {} (arg={:#010x}) is still pending",
                cmd,
                pending.cmd,
                pending.argument
            );
            return Err(SdmmcError::CommandPending);
        }

        log::trace!("SDMMC: deferring {} (arg={:#010x})", cmd, argument);
        self.pending = Some(PendingCommand { cmd, argument });
        self.state = SessionState::Deferred;
        Ok(())
    }

    /// The parked command, if any
    #[inline]
    pub fn pending(&self) -> Option<PendingCommand> {
        self.pending
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Record that the data path has been programmed
    pub fn arm(&mut self) {
        if self.state == SessionState::Deferred {
            self.state = SessionState::Armed;
        }
    }

    /// Move the parked command onto the bus
    pub fn begin_replay(&mut self) -> Option<PendingCommand> {
        let pending = self.pending?;
        self.state = SessionState::Executing;
        Some(pending)
    }

    /// Drop the parked command once its replay has finished
    pub fn clear(&mut self) {
        self.pending = None;
        self.state = SessionState::Idle;
    }

    /// Whether the last dispatched command was APP_CMD
    #[inline]
    pub fn next_is_app_command(&self) -> bool {
        self.next_is_app_command
    }

    pub(crate) fn set_next_is_app_command(&mut self, value: bool) {
        self.next_is_app_command = value;
    }
}

impl Default for CommandSession {
    fn default() -> Self {
        Self::new()
    }
}
