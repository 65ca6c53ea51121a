//! Capture/Compare/PWM modules (CCP1 on RC2, CCP2 on RC1).
//!
//! | CCPxM3:0 | Mode                                            |
//! |----------|-------------------------------------------------|
//! | 0000     | off                                             |
//! | 0100     | capture every falling edge                      |
//! | 0101     | capture every rising edge                       |
//! | 0110     | capture every 4th rising edge                   |
//! | 0111     | capture every 16th rising edge                  |
//! | 1000     | compare, drive pin high on match                |
//! | 1001     | compare, drive pin low on match                 |
//! | 1010     | compare, interrupt only                         |
//! | 1011     | compare, special event trigger                  |
//! | 11xx     | PWM                                             |
//!
//! Capture copies TMR1 into CCPRx. Compare fires when TMR1 steps onto
//! CCPRx. The special event resets TMR1 (and on CCP2 starts an A/D
//! conversion, handled by the caller). PWM runs off Timer2: the 10-bit duty
//! CCPRxL:CCPxCON<5:4> is latched at every period boundary.

use super::Port;
use crate::config::CcpChannel;
use crate::memory::RegisterFile;
use crate::regs::{self, PIR1, PIR2, PR2, TMR1L, TMR2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ccp {
    pub channel: CcpChannel,
    edge_count: u8,
    /// Pin state the compare/PWM logic is driving
    output: bool,
    /// 10-bit duty latched at the last period boundary
    duty_latch: u16,
    /// Cycles spent high / total while in PWM mode
    pub pwm_high: u64,
    pub pwm_total: u64,
    pub captures: u64,
    pub matches: u64,
}

impl Ccp {
    pub fn new(channel: CcpChannel) -> Self {
        Ccp {
            channel,
            edge_count: 0,
            output: false,
            duty_latch: 0,
            pwm_high: 0,
            pwm_total: 0,
            captures: 0,
            matches: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Ccp::new(self.channel);
    }

    pub fn con_addr(&self) -> u16 {
        match self.channel {
            CcpChannel::Ccp1 => regs::CCP1CON,
            CcpChannel::Ccp2 => regs::CCP2CON,
        }
    }

    pub fn ccpr_addr(&self) -> u16 {
        match self.channel {
            CcpChannel::Ccp1 => regs::CCPR1L,
            CcpChannel::Ccp2 => regs::CCPR2L,
        }
    }

    /// Pin the module uses (RC2 / RC1).
    pub fn pin(&self) -> (Port, u8) {
        match self.channel {
            CcpChannel::Ccp1 => (Port::C, 2),
            CcpChannel::Ccp2 => (Port::C, 1),
        }
    }

    fn flag(&self) -> (u16, u8) {
        match self.channel {
            CcpChannel::Ccp1 => (PIR1, regs::CCP1IF),
            CcpChannel::Ccp2 => (PIR2, regs::CCP2IF),
        }
    }

    pub fn mode(&self, mem: &RegisterFile) -> u8 {
        mem.get(self.con_addr()) & 0x0F
    }

    pub fn on_con_write(&mut self, old: u8, new: u8) {
        let (was, now) = (old & 0x0F, new & 0x0F);
        if was == now {
            return;
        }
        self.edge_count = 0;
        match now {
            0b1000 => self.output = false,
            0b1001 => self.output = true,
            m if m & 0b1100 == 0b1100 => {
                self.output = false;
                self.duty_latch = 0;
                self.pwm_high = 0;
                self.pwm_total = 0;
            }
            _ => {}
        }
    }

    /// Capture modes: count edges on the CCP pin.
    pub fn capture(&mut self, mem: &mut RegisterFile, rising: bool, falling: bool) {
        let mode = self.mode(mem);
        let (edge, needed) = match mode {
            0b0100 => (falling, 1),
            0b0101 => (rising, 1),
            0b0110 => (rising, 4),
            0b0111 => (rising, 16),
            _ => return,
        };
        if !edge {
            return;
        }
        self.edge_count += 1;
        if self.edge_count < needed {
            return;
        }
        self.edge_count = 0;
        let t = mem.word(TMR1L);
        mem.set_word(self.ccpr_addr(), t);
        let (reg, bit) = self.flag();
        mem.set_bit(reg, bit, true);
        self.captures += 1;
    }

    /// Compare modes, evaluated each time TMR1 changes. Returns true on a
    /// special event trigger.
    pub fn compare(&mut self, mem: &mut RegisterFile) -> bool {
        let mode = self.mode(mem);
        if !(0b1000..=0b1011).contains(&mode) {
            return false;
        }
        if mem.word(TMR1L) != mem.word(self.ccpr_addr()) {
            return false;
        }
        let (reg, bit) = self.flag();
        mem.set_bit(reg, bit, true);
        self.matches += 1;
        match mode {
            0b1000 => self.output = true,
            0b1001 => self.output = false,
            0b1011 => return true,
            _ => {}
        }
        false
    }

    /// PWM mode, once per cycle. `period_reset` is Timer2's PR2 match.
    pub fn pwm(&mut self, mem: &mut RegisterFile, period_reset: bool) {
        if self.mode(mem) & 0b1100 != 0b1100 {
            return;
        }
        if period_reset {
            let l = mem.get(self.ccpr_addr());
            let dc = (mem.get(self.con_addr()) >> 4) & 0x03;
            self.duty_latch = ((l as u16) << 2) | dc as u16;
            // CCPRxH is the read-only duty slave register
            mem.set(self.ccpr_addr() + 1, l);
        }
        // Timer2 has no visible Q-clock bits, so the 10-bit time base is
        // approximated as TMR2 * 4.
        self.output = (mem.get(TMR2) as u16) * 4 < self.duty_latch;
        self.pwm_total += 1;
        if self.output {
            self.pwm_high += 1;
        }
    }

    /// True when the module owns the pin (compare set/clear or PWM, with
    /// the TRIS bit cleared).
    pub fn drives_pin(&self, mem: &RegisterFile) -> bool {
        let mode = self.mode(mem);
        let owns = mode == 0b1000 || mode == 0b1001 || mode & 0b1100 == 0b1100;
        let (_, bit) = self.pin();
        owns && !mem.bit(regs::TRISC, bit)
    }

    pub fn output(&self) -> bool {
        self.output
    }

    /// Latched duty as a fraction of the PWM period.
    pub fn duty_ratio(&self, mem: &RegisterFile) -> f32 {
        let full = 4.0 * (mem.get(PR2) as f32 + 1.0);
        (self.duty_latch as f32 / full).min(1.0)
    }

    /// Measured high time since the last call, as a fraction.
    pub fn take_measured_duty(&mut self) -> Option<f32> {
        if self.pwm_total == 0 {
            return None;
        }
        let d = self.pwm_high as f32 / self.pwm_total as f32;
        self.pwm_high = 0;
        self.pwm_total = 0;
        Some(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_every_rising_edge() {
        let mut mem = RegisterFile::new();
        let mut ccp = Ccp::new(CcpChannel::Ccp1);
        mem.set(regs::CCP1CON, 0b0101);
        mem.set_word(TMR1L, 9);
        ccp.capture(&mut mem, false, true);
        assert!(!mem.bit(PIR1, regs::CCP1IF));
        ccp.capture(&mut mem, true, false);
        assert_eq!(mem.word(regs::CCPR1L), 9);
        assert!(mem.bit(PIR1, regs::CCP1IF));
    }

    #[test]
    fn test_capture_prescaled() {
        let mut mem = RegisterFile::new();
        let mut ccp = Ccp::new(CcpChannel::Ccp2);
        mem.set(regs::CCP2CON, 0b0110);
        for i in 0..4u16 {
            mem.set_word(TMR1L, i);
            ccp.capture(&mut mem, true, false);
        }
        assert_eq!(ccp.captures, 1);
        assert_eq!(mem.word(regs::CCPR2L), 3);
        assert!(mem.bit(PIR2, regs::CCP2IF));
    }

    #[test]
    fn test_compare_special_event() {
        let mut mem = RegisterFile::new();
        let mut ccp = Ccp::new(CcpChannel::Ccp1);
        ccp.on_con_write(0, 0b1011);
        mem.set(regs::CCP1CON, 0b1011);
        mem.set_word(regs::CCPR1L, 100);
        mem.set_word(TMR1L, 99);
        assert!(!ccp.compare(&mut mem));
        mem.set_word(TMR1L, 100);
        assert!(ccp.compare(&mut mem));
        assert!(mem.bit(PIR1, regs::CCP1IF));
    }

    #[test]
    fn test_compare_drives_pin() {
        let mut mem = RegisterFile::new();
        let mut ccp = Ccp::new(CcpChannel::Ccp1);
        mem.set(regs::TRISC, 0x00);
        ccp.on_con_write(0, 0b1000);
        mem.set(regs::CCP1CON, 0b1000);
        assert!(ccp.drives_pin(&mem));
        assert!(!ccp.output());
        mem.set_word(regs::CCPR1L, 5);
        mem.set_word(TMR1L, 5);
        ccp.compare(&mut mem);
        assert!(ccp.output());
    }

    #[test]
    fn test_pwm_duty_latched_at_period() {
        let mut mem = RegisterFile::new();
        let mut ccp = Ccp::new(CcpChannel::Ccp1);
        mem.set(PR2, 255);
        ccp.on_con_write(0, 0x0C);
        mem.set(regs::CCP1CON, 0x0C);
        mem.set(regs::CCPR1L, 64);
        ccp.pwm(&mut mem, false);
        assert_eq!(ccp.duty_ratio(&mem), 0.0);
        ccp.pwm(&mut mem, true);
        assert_eq!(ccp.duty_ratio(&mem), 0.25);
        assert_eq!(mem.get(regs::CCPR1H), 64);
        let _ = ccp.take_measured_duty();
        for t in 0..=255u8 {
            mem.set(TMR2, t);
            ccp.pwm(&mut mem, false);
        }
        let d = ccp.take_measured_duty().unwrap();
        assert!((d - 0.25).abs() < 0.01);
    }
}
