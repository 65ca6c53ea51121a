//! Timer0: 8-bit timer/counter.
//!
//! Clocked by Tcy (T0CS = 0) or by T0CKI/RA4 edges (T0CS = 1, edge chosen
//! by T0SE). The prescaler is shared with the watchdog: with PSA = 1 the
//! timer counts every clock. A write to TMR0 clears the prescaler and
//! holds the count for two cycles.

use crate::memory::RegisterFile;
use crate::regs::{self, INTCON, OPTION_REG, TMR0};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timer0 {
    prescaler: u16,
    inhibit: u8,
    pub overflows: u64,
}

impl Timer0 {
    pub fn new() -> Self {
        Timer0::default()
    }

    pub fn reset(&mut self) {
        *self = Timer0::new();
    }

    pub fn on_tmr0_write(&mut self) {
        self.prescaler = 0;
        self.inhibit = 2;
    }

    /// Prescaler ratio, or 1 when the prescaler belongs to the WDT.
    pub fn ratio(option: u8) -> u16 {
        if option & regs::bit(regs::PSA) != 0 {
            1
        } else {
            2 << (option & 0x07)
        }
    }

    pub fn tick(&mut self, mem: &mut RegisterFile, t0cki_rise: bool, t0cki_fall: bool) {
        if self.inhibit > 0 {
            self.inhibit -= 1;
            return;
        }
        let opt = mem.get(OPTION_REG);
        let clock = if opt & regs::bit(regs::T0CS) == 0 {
            true
        } else if opt & regs::bit(regs::T0SE) == 0 {
            t0cki_rise
        } else {
            t0cki_fall
        };
        if !clock {
            return;
        }
        let ratio = Self::ratio(opt);
        if ratio > 1 {
            self.prescaler += 1;
            if self.prescaler < ratio {
                return;
            }
            self.prescaler = 0;
        }
        let v = mem.get(TMR0).wrapping_add(1);
        mem.set(TMR0, v);
        if v == 0 {
            self.overflows += 1;
            mem.set_bit(INTCON, regs::T0IF, true);
        }
    }
}
