//! STM32MP2 SDMMC Register Definitions using tock-registers
//!
//! This module defines the SDMMC host controller registers and bitfields as
//! laid out in the STM32MP25 reference manual. Command, clock, data and DMA
//! control words are composed through the tock-registers field types; the
//! status/interrupt-clear bitmask is modelled with `bitflags` because it is
//! interpreted against per-command subsets rather than single fields.

use bitflags::bitflags;
use tock_registers::register_bitfields;
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};

// ============================================================================
// Register Bitfield Definitions
// ============================================================================

register_bitfields! [
    u32,
    /// Power Control Register (0x00)
    pub POWER [
        /// Power supply control
        PWRCTRL OFFSET(0) NUMBITS(2) [
            Off = 0,
            Cycle = 2,
            On = 3
        ],
        /// Voltage switch sequence start
        VSWITCH OFFSET(2) NUMBITS(1) [],
        /// Voltage switch procedure enable
        VSWITCHEN OFFSET(3) NUMBITS(1) [],
        /// Data and command direction signals polarity
        DIRPOL OFFSET(4) NUMBITS(1) []
    ],

    /// Clock Control Register (0x04)
    pub CLKCR [
        /// Clock divide factor (SDMMC_CK = SDMMC_KER_CK / (2 * CLKDIV))
        CLKDIV OFFSET(0) NUMBITS(10) [],
        /// Power saving configuration
        PWRSAV OFFSET(12) NUMBITS(1) [],
        /// Wide bus mode
        WIDBUS OFFSET(14) NUMBITS(2) [
            OneBit = 0,
            FourBit = 1,
            EightBit = 2
        ],
        /// Data and command phase on falling edge
        NEGEDGE OFFSET(16) NUMBITS(1) [],
        /// Hardware flow control enable
        HWFC_EN OFFSET(17) NUMBITS(1) [],
        /// Data rate signaling selection
        DDR OFFSET(18) NUMBITS(1) [],
        /// Bus speed for selection of SDMMC operating modes
        BUSSPEED OFFSET(19) NUMBITS(1) [],
        /// Receive clock selection
        SELCLKRX OFFSET(20) NUMBITS(2) [
            Ck = 0,
            CkIn = 1,
            FbCk = 2
        ]
    ],

    /// Command Register (0x0C)
    pub CMD [
        /// Command index
        CMDINDEX OFFSET(0) NUMBITS(6) [],
        /// Command is associated with a data transfer
        CMDTRANS OFFSET(6) NUMBITS(1) [],
        /// Command is the stop-transmission command
        CMDSTOP OFFSET(7) NUMBITS(1) [],
        /// Wait for response
        WAITRESP OFFSET(8) NUMBITS(2) [
            NoResponse = 0,
            ShortCrc = 1,
            ShortNoCrc = 2,
            Long = 3
        ],
        /// Wait for interrupt request
        WAITINT OFFSET(10) NUMBITS(1) [],
        /// Wait for end of data transfer before sending
        WAITPEND OFFSET(11) NUMBITS(1) [],
        /// Command path state machine (CPSM) enable
        CPSMEN OFFSET(12) NUMBITS(1) [],
        /// Hold new data block transmission and reception
        DTHOLD OFFSET(13) NUMBITS(1) [],
        /// Boot mode select
        BOOTMODE OFFSET(14) NUMBITS(1) [],
        /// Enable boot mode procedure
        BOOTEN OFFSET(15) NUMBITS(1) [],
        /// Suspend command
        CMDSUSPEND OFFSET(16) NUMBITS(1) []
    ],

    /// Data Control Register (0x2C)
    pub DCTRL [
        /// Data transfer enable
        DTEN OFFSET(0) NUMBITS(1) [],
        /// Data transfer direction (set: card to host)
        DTDIR OFFSET(1) NUMBITS(1) [],
        /// Data transfer mode
        DTMODE OFFSET(2) NUMBITS(2) [
            Block = 0,
            Sdio = 1,
            EmmcStream = 2,
            BlockStop = 3
        ],
        /// Data block size, as a power of two
        DBLOCKSIZE OFFSET(4) NUMBITS(4) [],
        /// Read wait start
        RWSTART OFFSET(8) NUMBITS(1) [],
        /// Read wait stop
        RWSTOP OFFSET(9) NUMBITS(1) [],
        /// Read wait mode
        RWMOD OFFSET(10) NUMBITS(1) [],
        /// SD I/O interrupt enable
        SDIOEN OFFSET(11) NUMBITS(1) [],
        /// Enable the reception of the boot acknowledgment
        BOOTACKEN OFFSET(12) NUMBITS(1) [],
        /// FIFO reset
        FIFORST OFFSET(13) NUMBITS(1) []
    ],

    /// Internal DMA Control Register (0x50)
    pub IDMACTRL [
        /// IDMA enable
        IDMAEN OFFSET(0) NUMBITS(1) [],
        /// Buffer mode selection (double buffer)
        IDMABMODE OFFSET(1) NUMBITS(1) [],
        /// Double buffer mode active buffer indication
        IDMABACT OFFSET(2) NUMBITS(1) []
    ]
];

// ============================================================================
// Status / Interrupt Clear Bitmask
// ============================================================================

bitflags! {
    /// Status register (0x34) bits; the interrupt-clear register (0x38) uses
    /// the same positions for its clear bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u32 {
        /// Command response received, CRC check failed
        const CCRCFAIL = 1 << 0;
        /// Data block sent/received, CRC check failed
        const DCRCFAIL = 1 << 1;
        /// Command response timeout
        const CTIMEOUT = 1 << 2;
        /// Data timeout
        const DTIMEOUT = 1 << 3;
        /// Transmit FIFO underrun
        const TXUNDERR = 1 << 4;
        /// Received FIFO overrun
        const RXOVERR = 1 << 5;
        /// Command response received, CRC check passed
        const CMDREND = 1 << 6;
        /// Command sent (no response required)
        const CMDSENT = 1 << 7;
        /// Data transfer ended correctly
        const DATAEND = 1 << 8;
        /// Data transfer hold
        const DHOLD = 1 << 9;
        /// Data block sent/received
        const DBCKEND = 1 << 10;
        /// Data transfer aborted by CMD12
        const DABORT = 1 << 11;
        /// Data path state machine active
        const DPSMACT = 1 << 12;
        /// Command path state machine active
        const CPSMACT = 1 << 13;
        /// Transmit FIFO half empty
        const TXFIFOHE = 1 << 14;
        /// Receive FIFO half full
        const RXFIFOHF = 1 << 15;
        /// Transmit FIFO full
        const TXFIFOF = 1 << 16;
        /// Receive FIFO full
        const RXFIFOF = 1 << 17;
        /// Transmit FIFO empty
        const TXFIFOE = 1 << 18;
        /// Receive FIFO empty
        const RXFIFOE = 1 << 19;
        /// Inverted value of SDMMC_D0 line (busy)
        const BUSYD0 = 1 << 20;
        /// End of SDMMC_D0 busy following a CMD response
        const BUSYD0END = 1 << 21;
        /// SDIO interrupt received
        const SDIOIT = 1 << 22;
        /// Boot acknowledgment received with error
        const ACKFAIL = 1 << 23;
        /// Boot acknowledgment timeout
        const ACKTIMEOUT = 1 << 24;
        /// Voltage switch critical timing section completion
        const VSWEND = 1 << 25;
        /// SDMMC_CK stopped in voltage switch procedure
        const CKSTOP = 1 << 26;
        /// IDMA transfer error
        const IDMATE = 1 << 27;
        /// IDMA buffer transfer complete
        const IDMABTC = 1 << 28;

        /// Flags that do not self-clear and must be written to ICR
        const STATIC_FLAGS = Self::CCRCFAIL.bits()
            | Self::DCRCFAIL.bits()
            | Self::CTIMEOUT.bits()
            | Self::DTIMEOUT.bits()
            | Self::TXUNDERR.bits()
            | Self::RXOVERR.bits()
            | Self::CMDREND.bits()
            | Self::CMDSENT.bits()
            | Self::DATAEND.bits()
            | Self::DBCKEND.bits()
            | Self::IDMATE.bits()
            | Self::IDMABTC.bits();

        /// Data-phase error flags
        const DATA_ERRORS = Self::DTIMEOUT.bits()
            | Self::DCRCFAIL.bits()
            | Self::TXUNDERR.bits()
            | Self::RXOVERR.bits()
            | Self::IDMATE.bits();
    }
}

// ============================================================================
// Register Offsets
// ============================================================================

/// Controller registers reachable through a [`RegisterBus`](super::bus::RegisterBus)
///
/// Discriminants are byte offsets from the controller base address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Reg {
    Power = 0x00,
    ClockControl = 0x04,
    Argument = 0x08,
    Command = 0x0C,
    Response1 = 0x14,
    Response2 = 0x18,
    Response3 = 0x1C,
    Response4 = 0x20,
    DataTimer = 0x24,
    DataLength = 0x28,
    DataControl = 0x2C,
    DataCounter = 0x30,
    Status = 0x34,
    InterruptClear = 0x38,
    InterruptMask = 0x3C,
    IdmaControl = 0x50,
    IdmaBase0 = 0x58,
}

impl Reg {
    /// Every register, in address order
    pub const ALL: [Reg; 17] = [
        Reg::Power,
        Reg::ClockControl,
        Reg::Argument,
        Reg::Command,
        Reg::Response1,
        Reg::Response2,
        Reg::Response3,
        Reg::Response4,
        Reg::DataTimer,
        Reg::DataLength,
        Reg::DataControl,
        Reg::DataCounter,
        Reg::Status,
        Reg::InterruptClear,
        Reg::InterruptMask,
        Reg::IdmaControl,
        Reg::IdmaBase0,
    ];

    /// Byte offset from the controller base
    #[inline]
    pub const fn offset(self) -> u16 {
        self as u16
    }

    /// Reference-manual mnemonic, for diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            Reg::Power => "SDMMC_POWER",
            Reg::ClockControl => "SDMMC_CLKCR",
            Reg::Argument => "SDMMC_ARGR",
            Reg::Command => "SDMMC_CMDR",
            Reg::Response1 => "SDMMC_RESP1R",
            Reg::Response2 => "SDMMC_RESP2R",
            Reg::Response3 => "SDMMC_RESP3R",
            Reg::Response4 => "SDMMC_RESP4R",
            Reg::DataTimer => "SDMMC_DTIMER",
            Reg::DataLength => "SDMMC_DLENR",
            Reg::DataControl => "SDMMC_DCTRLR",
            Reg::DataCounter => "SDMMC_DCNTR",
            Reg::Status => "SDMMC_STAR",
            Reg::InterruptClear => "SDMMC_ICR",
            Reg::InterruptMask => "SDMMC_MASKR",
            Reg::IdmaControl => "SDMMC_IDMACTRLR",
            Reg::IdmaBase0 => "SDMMC_IDMABASE0R",
        }
    }
}

// ============================================================================
// Register Block Layout
// ============================================================================

/// SDMMC register block
#[repr(C)]
pub struct SdmmcRegisters {
    /// Power control (0x00)
    pub power: ReadWrite<u32, POWER::Register>,
    /// Clock control (0x04)
    pub clkcr: ReadWrite<u32, CLKCR::Register>,
    /// Argument (0x08)
    pub argr: ReadWrite<u32>,
    /// Command (0x0C)
    pub cmdr: ReadWrite<u32, CMD::Register>,
    /// Command response (0x10)
    pub respcmdr: ReadOnly<u32>,
    /// Response 1 (0x14)
    pub resp1r: ReadOnly<u32>,
    /// Response 2 (0x18)
    pub resp2r: ReadOnly<u32>,
    /// Response 3 (0x1C)
    pub resp3r: ReadOnly<u32>,
    /// Response 4 (0x20)
    pub resp4r: ReadOnly<u32>,
    /// Data timer (0x24)
    pub dtimer: ReadWrite<u32>,
    /// Data length (0x28)
    pub dlenr: ReadWrite<u32>,
    /// Data control (0x2C)
    pub dctrl: ReadWrite<u32, DCTRL::Register>,
    /// Data counter (0x30)
    pub dcntr: ReadOnly<u32>,
    /// Status (0x34)
    pub star: ReadOnly<u32>,
    /// Interrupt clear (0x38)
    pub icr: WriteOnly<u32>,
    /// Interrupt mask (0x3C)
    pub maskr: ReadWrite<u32>,
    /// Boot acknowledgment timer (0x40)
    pub acktimer: ReadWrite<u32>,
    _reserved0: [u32; 3],
    /// Internal DMA control (0x50)
    pub idmactrlr: ReadWrite<u32, IDMACTRL::Register>,
    /// Internal DMA buffer size (0x54)
    pub idmabsizer: ReadWrite<u32>,
    /// Internal DMA buffer 0 base address (0x58)
    pub idmabase0r: ReadWrite<u32>,
}

const _: () = {
    assert!(core::mem::offset_of!(SdmmcRegisters, cmdr) == Reg::Command as usize);
    assert!(core::mem::offset_of!(SdmmcRegisters, resp1r) == Reg::Response1 as usize);
    assert!(core::mem::offset_of!(SdmmcRegisters, star) == Reg::Status as usize);
    assert!(core::mem::offset_of!(SdmmcRegisters, maskr) == Reg::InterruptMask as usize);
    assert!(core::mem::offset_of!(SdmmcRegisters, idmactrlr) == Reg::IdmaControl as usize);
    assert!(core::mem::offset_of!(SdmmcRegisters, idmabase0r) == Reg::IdmaBase0 as usize);
};

// ============================================================================
// Peripheral Reset (RCC) Bits
// ============================================================================

/// RCC SDMMCx configuration register: peripheral reset
pub const RCC_SDMMC_RST: u32 = 1 << 0;

/// RCC SDMMCx configuration register: peripheral clock enable
pub const RCC_SDMMC_EN: u32 = 1 << 1;

/// RCC SDMMCx configuration register: clock enable in low-power mode
pub const RCC_SDMMC_LPEN: u32 = 1 << 2;

// ============================================================================
// Card Register Values
// ============================================================================

/// OCR: card power-up status (MMC CMD1 argument)
pub const OCR_POWERUP: u32 = 1 << 31;

/// OCR: 3.2-3.3V window
pub const OCR_3_2_3_3: u32 = 1 << 20;

/// OCR: 3.3-3.4V window
pub const OCR_3_3_3_4: u32 = 1 << 21;

/// Single block length used for every data transfer
pub const BLOCK_LEN: u32 = 512;
