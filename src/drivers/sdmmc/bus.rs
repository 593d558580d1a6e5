//! Register access seam for the SDMMC controller
//!
//! The command engine never touches MMIO directly; it goes through a
//! [`RegisterBus`] so a board can supply the real register block while host
//! tests substitute a scripted register file.

use core::ptr;

use tock_registers::interfaces::{Readable, Writeable};

use super::regs::{Reg, SdmmcRegisters};

/// 32-bit register read/write contract of the controller
pub trait RegisterBus {
    /// Read a controller register
    fn read(&mut self, reg: Reg) -> u32;

    /// Write a controller register
    fn write(&mut self, reg: Reg, value: u32);
}

/// Write access to the RCC register that gates and resets the controller
pub trait ResetControl {
    fn write(&mut self, value: u32);
}

/// Memory-mapped SDMMC register block
pub struct MmioBus {
    regs: *const SdmmcRegisters,
}

// Safety: the register block is a fixed peripheral address and the driver is
// used from a single boot-time thread.
unsafe impl Send for MmioBus {}

impl MmioBus {
    /// Wrap the register block at `base`
    ///
    /// # Safety
    ///
    /// `base` must be the address of an SDMMC register block that stays mapped
    /// for the lifetime of the returned value, and no other owner may drive
    /// the same controller.
    pub unsafe fn new(base: usize) -> Self {
        Self {
            regs: base as *const SdmmcRegisters,
        }
    }

    #[inline]
    fn regs(&self) -> &SdmmcRegisters {
        unsafe { &*self.regs }
    }
}

impl RegisterBus for MmioBus {
    fn read(&mut self, reg: Reg) -> u32 {
        let regs = self.regs();
        match reg {
            Reg::Power => regs.power.get(),
            Reg::ClockControl => regs.clkcr.get(),
            Reg::Argument => regs.argr.get(),
            Reg::Command => regs.cmdr.get(),
            Reg::Response1 => regs.resp1r.get(),
            Reg::Response2 => regs.resp2r.get(),
            Reg::Response3 => regs.resp3r.get(),
            Reg::Response4 => regs.resp4r.get(),
            Reg::DataTimer => regs.dtimer.get(),
            Reg::DataLength => regs.dlenr.get(),
            Reg::DataControl => regs.dctrl.get(),
            Reg::DataCounter => regs.dcntr.get(),
            Reg::Status => regs.star.get(),
            // Write-only; reads back as zero on silicon
            Reg::InterruptClear => 0,
            Reg::InterruptMask => regs.maskr.get(),
            Reg::IdmaControl => regs.idmactrlr.get(),
            Reg::IdmaBase0 => regs.idmabase0r.get(),
        }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        let regs = self.regs();
        match reg {
            Reg::Power => regs.power.set(value),
            Reg::ClockControl => regs.clkcr.set(value),
            Reg::Argument => regs.argr.set(value),
            Reg::Command => regs.cmdr.set(value),
            Reg::DataTimer => regs.dtimer.set(value),
            Reg::DataLength => regs.dlenr.set(value),
            Reg::DataControl => regs.dctrl.set(value),
            Reg::InterruptClear => regs.icr.set(value),
            Reg::InterruptMask => regs.maskr.set(value),
            Reg::IdmaControl => regs.idmactrlr.set(value),
            Reg::IdmaBase0 => regs.idmabase0r.set(value),
            Reg::Response1
            | Reg::Response2
            | Reg::Response3
            | Reg::Response4
            | Reg::DataCounter
            | Reg::Status => {
                log::warn!("SDMMC: ignoring write to read-only {}", reg.name());
            }
        }
    }
}

/// RCC SDMMCx configuration register at a fixed address
pub struct MmioResetControl {
    addr: usize,
}

impl MmioResetControl {
    /// # Safety
    ///
    /// `addr` must be the RCC configuration register of the controller being
    /// brought up.
    pub unsafe fn new(addr: usize) -> Self {
        Self { addr }
    }
}

impl ResetControl for MmioResetControl {
    fn write(&mut self, value: u32) {
        unsafe { ptr::write_volatile(self.addr as *mut u32, value) }
    }
}
