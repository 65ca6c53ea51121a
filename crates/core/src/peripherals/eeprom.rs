//! Data EEPROM controller.
//!
//! The 256 bytes live in `RegisterFile::eeprom` and are reached through
//! EEADR, EEDATA and EECON1/EECON2:
//!
//! - Read: setting RD copies `eeprom[EEADR]` into EEDATA at once.
//! - Write: with WREN set, the three writes `EECON2 = 0x55`,
//!   `EECON2 = 0xAA`, `EECON1.WR = 1` must follow each other with no other
//!   register write and no interrupt in between. The cell is then
//!   programmed after the self-timed write period; WR clears and EEIF sets.
//!
//! EEPGD = 1 (program memory) is not supported; such accesses are logged
//! and ignored.

use crate::events::Event;
use crate::memory::RegisterFile;
use crate::regs::{self, EEADR, EECON1, EEDATA, PIR2};
use serde::{Deserialize, Serialize};

/// Progress through the unlock sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Unlock {
    #[default]
    Idle,
    Got55,
    GotAA,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct PendingWrite {
    addr: u8,
    data: u8,
    remaining: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EepromCtrl {
    pub unlock: Unlock,
    pending: Option<PendingWrite>,
    pub writes: u64,
}

impl EepromCtrl {
    pub fn new() -> Self {
        EepromCtrl::default()
    }

    /// A reset aborts a write in progress; returns true if one was lost
    /// (the caller sets WRERR).
    pub fn reset(&mut self) -> bool {
        self.unlock = Unlock::Idle;
        self.pending.take().is_some()
    }

    pub fn write_in_progress(&self) -> bool {
        self.pending.is_some()
    }

    /// Break a partially entered unlock sequence.
    pub fn interrupt_sequence(&mut self, events: &mut Vec<Event>) {
        if self.unlock != Unlock::Idle {
            self.unlock = Unlock::Idle;
            events.push(Event::EepromUnlockBroken);
        }
    }

    /// EECON2 write.
    pub fn on_eecon2_write(&mut self, value: u8, events: &mut Vec<Event>) {
        self.unlock = match (self.unlock, value) {
            (Unlock::Idle, 0x55) => Unlock::Got55,
            (Unlock::Got55, 0xAA) => Unlock::GotAA,
            (Unlock::Idle, _) => Unlock::Idle,
            _ => {
                events.push(Event::EepromUnlockBroken);
                Unlock::Idle
            }
        };
    }

    /// EECON1 write. RD and WR can only be set by software.
    pub fn on_eecon1_write(
        &mut self,
        mem: &mut RegisterFile,
        old: u8,
        value: u8,
        write_cycles: u64,
        events: &mut Vec<Event>,
    ) {
        let sticky = regs::bit(regs::RD) | regs::bit(regs::WR);
        let new = value | (old & sticky);
        mem.set(EECON1, new);
        let rising = new & !old;
        let unlock = std::mem::take(&mut self.unlock);

        if new & regs::bit(regs::EEPGD) != 0 && rising & sticky != 0 {
            events.push(Event::ProgramMemoryAccess);
            mem.set(EECON1, new & !(rising & sticky));
            return;
        }

        if rising & regs::bit(regs::RD) != 0 {
            let addr = mem.get(EEADR);
            if self.pending.is_some() {
                events.push(Event::EepromReadDuringWrite { addr });
            }
            // A cell being programmed still reads its old content
            mem.set(EEDATA, mem.eeprom[addr as usize]);
            mem.set_bit(EECON1, regs::RD, false);
        }

        if rising & regs::bit(regs::WR) != 0 {
            let reason = if new & regs::bit(regs::WREN) == 0 {
                Some("WREN clear")
            } else if unlock != Unlock::GotAA {
                Some("55h/AAh sequence missing")
            } else {
                None
            };
            if let Some(reason) = reason {
                events.push(Event::EepromWriteRejected { reason });
                mem.set_bit(EECON1, regs::WR, false);
                return;
            }
            let (addr, data) = (mem.get(EEADR), mem.get(EEDATA));
            self.pending = Some(PendingWrite { addr, data, remaining: write_cycles.max(1) });
            events.push(Event::EepromWriteStarted { addr, data });
        }
    }

    pub fn tick(&mut self, mem: &mut RegisterFile, events: &mut Vec<Event>) {
        let Some(p) = self.pending.as_mut() else { return };
        p.remaining -= 1;
        if p.remaining > 0 {
            return;
        }
        let PendingWrite { addr, data, .. } = *p;
        self.pending = None;
        mem.eeprom[addr as usize] = data;
        mem.set_bit(EECON1, regs::WR, false);
        mem.set_bit(PIR2, regs::EEIF, true);
        self.writes += 1;
        events.push(Event::EepromWriteDone { addr, data });
    }
}
