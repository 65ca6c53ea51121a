//! Timer1: 16-bit timer/counter.
//!
//! Clock sources: Tcy (TMR1CS = 0), rising edges on T1CKI/RC0, or the
//! Timer1 oscillator when T1OSCEN is set and a crystal is fitted on the
//! board. Prescale 1:1, 1:2, 1:4 or 1:8. Rolling over from 0xFFFF sets
//! TMR1IF. CCP compare and capture both work against this count.

use crate::memory::RegisterFile;
use crate::regs::{self, PIR1, T1CON, TMR1L};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timer1 {
    prescaler: u8,
    /// Fractional T1 oscillator periods, in units of crystal_hz / tcy_hz
    crystal_acc: u64,
}

impl Timer1 {
    pub fn new() -> Self {
        Timer1::default()
    }

    pub fn reset(&mut self) {
        *self = Timer1::new();
    }

    /// T1CON writes clear the prescaler.
    pub fn on_t1con_write(&mut self) {
        self.prescaler = 0;
    }

    /// Advance one instruction cycle. Returns true when TMR1 changed.
    pub fn tick(
        &mut self,
        mem: &mut RegisterFile,
        t1cki_rise: bool,
        crystal_hz: Option<u32>,
        tcy_hz: u64,
    ) -> bool {
        let con = mem.get(T1CON);
        if con & regs::bit(regs::TMR1ON) == 0 {
            return false;
        }
        let clock = if con & regs::bit(regs::TMR1CS) == 0 {
            true
        } else if let (true, Some(hz)) = (con & regs::bit(regs::T1OSCEN) != 0, crystal_hz) {
            self.crystal_acc += hz as u64;
            if self.crystal_acc >= tcy_hz {
                self.crystal_acc -= tcy_hz;
                true
            } else {
                false
            }
        } else {
            t1cki_rise
        };
        if !clock {
            return false;
        }
        let ratio = 1u8 << ((con >> 4) & 0x03);
        self.prescaler += 1;
        if self.prescaler < ratio {
            return false;
        }
        self.prescaler = 0;
        let v = mem.word(TMR1L).wrapping_add(1);
        mem.set_word(TMR1L, v);
        if v == 0 {
            mem.set_bit(PIR1, regs::TMR1IF, true);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_does_not_count() {
        let mut mem = RegisterFile::new();
        let mut t = Timer1::new();
        assert!(!t.tick(&mut mem, false, None, 1_000_000));
        assert_eq!(mem.word(TMR1L), 0);
    }

    #[test]
    fn test_prescale_and_overflow() {
        let mut mem = RegisterFile::new();
        mem.set(T1CON, 0b0011_0001); // 1:8, internal, on
        mem.set_word(TMR1L, 0xFFFF);
        let mut t = Timer1::new();
        for _ in 0..7 {
            assert!(!t.tick(&mut mem, false, None, 1_000_000));
        }
        assert!(t.tick(&mut mem, false, None, 1_000_000));
        assert_eq!(mem.word(TMR1L), 0);
        assert!(mem.bit(PIR1, regs::TMR1IF));
    }

    #[test]
    fn test_external_edges() {
        let mut mem = RegisterFile::new();
        mem.set(T1CON, 0b0000_0011);
        let mut t = Timer1::new();
        for i in 0..10 {
            t.tick(&mut mem, i % 2 == 0, None, 1_000_000);
        }
        assert_eq!(mem.word(TMR1L), 5);
    }

    #[test]
    fn test_crystal_rate() {
        let mut mem = RegisterFile::new();
        mem.set(T1CON, 0b0000_1011); // T1OSCEN, external, on
        let mut t = Timer1::new();
        // 32768 Hz against a 1 MHz instruction clock
        for _ in 0..1_000_000 {
            t.tick(&mut mem, false, Some(32_768), 1_000_000);
        }
        assert_eq!(mem.word(TMR1L), 32_768);
    }
}
