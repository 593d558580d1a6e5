//! SD/MMC command encoding
//!
//! Commands arrive from the MMC host protocol as a 32-bit word: the command
//! index in the low six bits and the expected response shape in bits 16-18.
//! [`CommandDescriptor`] derives everything the controller needs for one
//! bus transaction from that word, the argument and the app-command marker.

use bitflags::bitflags;

use super::regs::{CMD, OCR_3_2_3_3, OCR_3_3_3_4, OCR_POWERUP, Status};

bitflags! {
    /// Response flags carried in the upper half of an [`MmcCmd`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CmdFlags: u32 {
        /// Command expects a response
        const WAIT_RESPONSE = 1 << 16;
        /// 136-bit response
        const LONG_RESPONSE = 1 << 17;
        /// Response carries no valid CRC
        const NO_CRC_RESPONSE = 1 << 18;
    }
}

/// Encoded MMC host protocol command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmcCmd(u32);

impl MmcCmd {
    /// Command index mask
    const INDEX_MASK: u32 = 0x3F;

    /// GO_IDLE_STATE
    pub const CMD0: Self = Self::new(0, CmdFlags::empty());
    /// SEND_OP_COND (MMC)
    pub const CMD1: Self = Self::new(
        1,
        CmdFlags::WAIT_RESPONSE.union(CmdFlags::NO_CRC_RESPONSE),
    );
    /// ALL_SEND_CID
    pub const CMD2: Self = Self::new(
        2,
        CmdFlags::WAIT_RESPONSE.union(CmdFlags::LONG_RESPONSE),
    );
    /// SEND_RELATIVE_ADDR
    pub const CMD3: Self = Self::new(3, CmdFlags::WAIT_RESPONSE);
    /// SWITCH_FUNC (or SET_BUS_WIDTH when preceded by APP_CMD)
    pub const CMD6: Self = Self::new(6, CmdFlags::WAIT_RESPONSE);
    /// SELECT_CARD
    pub const CMD7: Self = Self::new(7, CmdFlags::WAIT_RESPONSE);
    /// SEND_IF_COND
    pub const CMD8: Self = Self::new(8, CmdFlags::WAIT_RESPONSE);
    /// SEND_CSD
    pub const CMD9: Self = Self::new(
        9,
        CmdFlags::WAIT_RESPONSE.union(CmdFlags::LONG_RESPONSE),
    );
    /// STOP_TRANSMISSION
    pub const CMD12: Self = Self::new(12, CmdFlags::WAIT_RESPONSE);
    /// SEND_STATUS
    pub const CMD13: Self = Self::new(13, CmdFlags::WAIT_RESPONSE);
    /// SET_BLOCKLEN
    pub const CMD16: Self = Self::new(16, CmdFlags::WAIT_RESPONSE);
    /// READ_SINGLE_BLOCK
    pub const CMD17: Self = Self::new(17, CmdFlags::WAIT_RESPONSE);
    /// READ_MULTIPLE_BLOCK
    pub const CMD18: Self = Self::new(18, CmdFlags::WAIT_RESPONSE);
    /// APP_CMD
    pub const CMD55: Self = Self::new(55, CmdFlags::WAIT_RESPONSE);
    /// SD_SEND_OP_COND
    pub const ACMD41: Self = Self::new(
        41,
        CmdFlags::WAIT_RESPONSE.union(CmdFlags::NO_CRC_RESPONSE),
    );
    /// SEND_SCR
    pub const ACMD51: Self = Self::new(51, CmdFlags::WAIT_RESPONSE);

    /// Build a command from its index and response flags
    pub const fn new(index: u8, flags: CmdFlags) -> Self {
        Self((index as u32 & Self::INDEX_MASK) | flags.bits())
    }

    /// Wrap a raw protocol word
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw protocol word
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Command index on the bus
    pub const fn index(self) -> u8 {
        (self.0 & Self::INDEX_MASK) as u8
    }

    /// Response flags
    pub const fn flags(self) -> CmdFlags {
        CmdFlags::from_bits_truncate(self.0)
    }

    /// Declared response kind
    pub fn response_kind(self) -> ResponseKind {
        let flags = self.flags();
        if !flags.contains(CmdFlags::WAIT_RESPONSE) {
            ResponseKind::None
        } else if flags.contains(CmdFlags::LONG_RESPONSE) {
            ResponseKind::Long
        } else if flags.contains(CmdFlags::NO_CRC_RESPONSE) {
            ResponseKind::ShortNoCrc
        } else if self == Self::CMD7 || self == Self::CMD12 {
            ResponseKind::Busy
        } else {
            ResponseKind::Short
        }
    }

    /// Whether this request is parked until its data path is armed
    ///
    /// SWITCH_FUNC with argument 2 is the 4-bit SET_BUS_WIDTH app command and
    /// carries no data, so it goes straight to the controller.
    pub fn defers_until_armed(self, argument: u32) -> bool {
        match self {
            Self::CMD6 => argument != 2,
            Self::ACMD51 | Self::CMD17 | Self::CMD18 => true,
            _ => false,
        }
    }

    /// Opcodes that hosts poll with; a command timeout is routine for them
    pub fn is_polling_primitive(self) -> bool {
        matches!(self, Self::CMD1 | Self::CMD8 | Self::CMD13)
    }
}

impl core::fmt::Display for MmcCmd {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "CMD{}", self.index())
    }
}

/// Response shape of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// No response
    None,
    /// 48-bit response with CRC
    Short,
    /// 48-bit response without a valid CRC (R3)
    ShortNoCrc,
    /// 136-bit response (R2)
    Long,
    /// 48-bit response followed by busy signalling on D0 (R1b)
    Busy,
}

/// Everything the controller needs to issue one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub cmd: MmcCmd,
    /// Argument after opcode-specific augmentation
    pub argument: u32,
    pub response: ResponseKind,
    /// Command opens a data phase
    pub transfer: bool,
    /// Command is STOP_TRANSMISSION
    pub stop: bool,
    /// Status bits that end the command phase
    pub command_mask: Status,
    /// Status bits that end the data phase (empty: no data phase)
    pub data_mask: Status,
}

impl CommandDescriptor {
    /// Derive the descriptor for `cmd`
    ///
    /// `after_app_command` is the marker left by the previous dispatch. A
    /// SWITCH_FUNC issued right after APP_CMD is SET_BUS_WIDTH and gets no
    /// data phase, whatever its argument.
    pub fn new(cmd: MmcCmd, argument: u32, after_app_command: bool) -> Self {
        let response = cmd.response_kind();

        let mut command_mask = Status::CTIMEOUT;
        if cmd.index() == 0 {
            command_mask |= Status::CMDSENT;
        }
        command_mask |= match response {
            ResponseKind::None => Status::empty(),
            ResponseKind::Long | ResponseKind::ShortNoCrc => Status::CMDREND,
            ResponseKind::Short | ResponseKind::Busy => Status::CMDREND | Status::CCRCFAIL,
        };

        let read_block = Status::DCRCFAIL
            | Status::DTIMEOUT
            | Status::RXOVERR
            | Status::DATAEND
            | Status::IDMATE;

        let (argument, transfer, data_mask) = match cmd {
            MmcCmd::CMD1 => (argument | OCR_POWERUP, false, Status::empty()),
            MmcCmd::CMD6 if !after_app_command => {
                (argument, true, read_block | Status::DBCKEND)
            }
            MmcCmd::CMD17 | MmcCmd::CMD18 => (argument, true, read_block),
            MmcCmd::ACMD41 => (argument | OCR_3_2_3_3 | OCR_3_3_3_4, false, Status::empty()),
            MmcCmd::ACMD51 => (argument, true, read_block | Status::DBCKEND),
            _ => (argument, false, Status::empty()),
        };

        Self {
            cmd,
            argument,
            response,
            transfer,
            stop: cmd == MmcCmd::CMD12,
            command_mask,
            data_mask,
        }
    }

    /// Command register value for this descriptor
    pub fn control_word(&self) -> u32 {
        let waitresp = match self.response {
            ResponseKind::None => CMD::WAITRESP::NoResponse,
            ResponseKind::Short | ResponseKind::Busy => CMD::WAITRESP::ShortCrc,
            ResponseKind::ShortNoCrc => CMD::WAITRESP::ShortNoCrc,
            ResponseKind::Long => CMD::WAITRESP::Long,
        };

        let mut word =
            CMD::CMDINDEX.val(u32::from(self.cmd.index())) + CMD::CPSMEN::SET + waitresp;
        if self.transfer {
            word = word + CMD::CMDTRANS::SET;
        }
        if self.stop {
            word = word + CMD::CMDSTOP::SET;
        }
        word.value
    }

    /// Whether a data phase follows the command phase
    #[inline]
    pub fn has_data_phase(&self) -> bool {
        !self.data_mask.is_empty()
    }
}
