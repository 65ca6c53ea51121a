//! Timer2: 8-bit period timer.
//!
//! TMR2 counts Tcy through a 1:1/1:4/1:16 prescaler. When it equals PR2
//! the next increment resets it to 0; that reset is the PWM period
//! boundary and feeds the 1:1..1:16 postscaler that sets TMR2IF.

use crate::memory::RegisterFile;
use crate::regs::{self, PIR1, PR2, T2CON, TMR2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timer2 {
    prescaler: u8,
    postscaler: u8,
}

impl Timer2 {
    pub fn new() -> Self {
        Timer2::default()
    }

    pub fn reset(&mut self) {
        *self = Timer2::new();
    }

    /// Writes to TMR2 or T2CON clear both scalers.
    pub fn on_write(&mut self) {
        self.prescaler = 0;
        self.postscaler = 0;
    }

    pub fn prescale(t2con: u8) -> u8 {
        match t2con & 0x03 {
            0 => 1,
            1 => 4,
            _ => 16,
        }
    }

    /// Cycles per Timer2 period for the current PR2/T2CON.
    pub fn period_cycles(mem: &RegisterFile) -> u64 {
        (mem.get(PR2) as u64 + 1) * Self::prescale(mem.get(T2CON)) as u64
    }

    /// Advance one cycle. True when TMR2 matched PR2 and reset.
    pub fn tick(&mut self, mem: &mut RegisterFile) -> bool {
        let con = mem.get(T2CON);
        if con & regs::bit(regs::TMR2ON) == 0 {
            return false;
        }
        self.prescaler += 1;
        if self.prescaler < Self::prescale(con) {
            return false;
        }
        self.prescaler = 0;
        let t = mem.get(TMR2);
        if t != mem.get(PR2) {
            mem.set(TMR2, t.wrapping_add(1));
            return false;
        }
        mem.set(TMR2, 0);
        self.postscaler += 1;
        if self.postscaler > (con >> 3) & 0x0F {
            self.postscaler = 0;
            mem.set_bit(PIR1, regs::TMR2IF, true);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_ms_period_at_8mhz() {
        // PR2 = 124, prescale 16: 2000 Tcy
        let mut mem = RegisterFile::new();
        mem.set(PR2, 124);
        mem.set(T2CON, 0b0000_0110);
        let mut t = Timer2::new();
        let mut first = None;
        for c in 1..=2000u64 {
            if t.tick(&mut mem) && first.is_none() {
                first = Some(c);
            }
        }
        assert_eq!(first, Some(2000));
        assert!(mem.bit(PIR1, regs::TMR2IF));
        assert_eq!(Timer2::period_cycles(&mem), 2000);
    }

    #[test]
    fn test_postscaler() {
        let mut mem = RegisterFile::new();
        mem.set(PR2, 9);
        mem.set(T2CON, (2 << 3) | 0b100); // 1:3 postscale, 1:1 prescale
        let mut t = Timer2::new();
        let mut flags = 0;
        for _ in 0..90 {
            t.tick(&mut mem);
            if mem.bit(PIR1, regs::TMR2IF) {
                flags += 1;
                mem.set_bit(PIR1, regs::TMR2IF, false);
            }
        }
        assert_eq!(flags, 3);
    }
}
