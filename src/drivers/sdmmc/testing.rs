//! Host-side doubles for the controller's hardware seams

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::string::String;
use std::sync::Once;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use log::{Level, LevelFilter, Log, Metadata, Record};

use super::bus::{RegisterBus, ResetControl};
use super::regs::{Reg, Status};
use super::SdmmcController;
use crate::arch::DmaOps;
use crate::config::SdmmcConfig;

const CPSMEN: u32 = 1 << 12;
const CMDINDEX_MASK: u32 = 0x3F;

/// Register file that models just enough of the status register
///
/// Setting CPSMEN in a command register that had it clear starts a command
/// and loads the status scripted for that index (or `idle_status`).
/// Rewriting the register with CPSMEN still set does not start another one.
/// Writes to ICR clear status bits.
pub struct MockBus {
    regs: HashMap<Reg, u32>,
    status: u32,
    by_index: HashMap<u8, VecDeque<u32>>,
    started: Vec<u32>,
    pub idle_status: u32,
    pub reads: Vec<Reg>,
    pub writes: Vec<(Reg, u32)>,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            regs: HashMap::new(),
            status: 0,
            by_index: HashMap::new(),
            started: Vec::new(),
            idle_status: 0,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Set a register value without recording a write
    pub fn preset(&mut self, reg: Reg, value: u32) {
        self.regs.insert(reg, value);
    }

    /// Status the controller reports after command `index` is issued
    ///
    /// Repeated calls queue statuses for successive issues of the same index;
    /// the last one sticks.
    pub fn on_command(&mut self, index: u8, status: Status) -> &mut Self {
        self.by_index
            .entry(index)
            .or_default()
            .push_back(status.bits());
        self
    }

    /// Every value written to `reg`, in order
    pub fn writes_to(&self, reg: Reg) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|(r, _)| *r == reg)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Indices of the commands started on the bus, in order
    pub fn issued(&self) -> Vec<u8> {
        self.started
            .iter()
            .map(|v| (v & CMDINDEX_MASK) as u8)
            .collect()
    }

    /// Command register values that started a command with index `index`
    pub fn control_words(&self, index: u8) -> Vec<u32> {
        self.started
            .iter()
            .copied()
            .filter(|v| (v & CMDINDEX_MASK) as u8 == index)
            .collect()
    }

    pub fn value(&self, reg: Reg) -> u32 {
        self.regs.get(&reg).copied().unwrap_or(0)
    }
}

impl RegisterBus for MockBus {
    fn read(&mut self, reg: Reg) -> u32 {
        self.reads.push(reg);
        match reg {
            Reg::Status => self.status,
            _ => self.value(reg),
        }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        self.writes.push((reg, value));
        match reg {
            Reg::InterruptClear => self.status &= !value,
            Reg::Command if value & CPSMEN != 0 && self.value(reg) & CPSMEN == 0 => {
                let index = (value & CMDINDEX_MASK) as u8;
                self.started.push(value);
                self.status = match self.by_index.get_mut(&index) {
                    Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                    Some(queue) => *queue.front().unwrap(),
                    None => self.idle_status,
                };
                self.regs.insert(reg, value);
            }
            _ => {
                self.regs.insert(reg, value);
            }
        }
    }
}

/// Delay that only counts
#[derive(Debug, Default)]
pub struct MockDelay {
    /// Number of `delay_us` calls
    pub us_calls: u32,
    /// Total requested delay
    pub total_ns: u64,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.us_calls += 1;
        self.total_ns += u64::from(us) * 1000;
    }
}

/// Cache maintenance recorder with an identity DMA mapping
#[derive(Debug, Default)]
pub struct MockDma {
    pub flushes: Vec<(usize, usize)>,
}

impl DmaOps for MockDma {
    fn clean_invalidate(&mut self, addr: usize, len: usize) {
        self.flushes.push((addr, len));
    }

    fn dma_address(&self, addr: usize) -> Option<u32> {
        Some(addr as u32)
    }
}

/// RCC register recorder
#[derive(Debug, Default)]
pub struct MockReset {
    pub writes: Vec<u32>,
}

impl ResetControl for MockReset {
    fn write(&mut self, value: u32) {
        self.writes.push(value);
    }
}

pub type MockController = SdmmcController<MockBus, MockDelay, MockDma>;

pub fn controller() -> MockController {
    SdmmcController::new(
        MockBus::new(),
        MockDelay::default(),
        MockDma::default(),
        SdmmcConfig::default(),
    )
}

// ============================================================================
// Log Capture
// ============================================================================

std::thread_local! {
    static CAPTURED: RefCell<Option<Vec<(Level, String)>>> = const { RefCell::new(None) };
}

/// Logger that keeps records emitted on threads inside [`capture_logs`]
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let line = std::format!("{}", record.args());
        CAPTURED.with(|captured| {
            if let Some(records) = captured.borrow_mut().as_mut() {
                records.push((record.level(), line));
            }
        });
    }

    fn flush(&self) {}
}

static CAPTURE_LOGGER: CaptureLogger = CaptureLogger;
static INSTALL: Once = Once::new();

/// Run `f` and return the log records it emitted on this thread
///
/// Records are kept per thread so tests running in parallel do not see each
/// other's output.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, Vec<(Level, String)>) {
    INSTALL.call_once(|| {
        log::set_logger(&CAPTURE_LOGGER).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });

    CAPTURED.with(|captured| *captured.borrow_mut() = Some(Vec::new()));
    let result = f();
    let records = CAPTURED
        .with(|captured| captured.borrow_mut().take())
        .unwrap_or_default();
    (result, records)
}
