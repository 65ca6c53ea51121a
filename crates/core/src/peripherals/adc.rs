//! 10-bit analog-to-digital converter.
//!
//! Setting GO/DONE with ADON on starts a conversion of the channel selected
//! by CHS2:CHS0. It takes 12 TAD; TAD comes from ADCS2:ADCS0 (Fosc/2..64,
//! or the internal RC clock, about 4 us). On completion ADRESH:ADRESL
//! receive the result, left or right justified by ADFM, GO/DONE clears and
//! ADIF sets.
//!
//! Analog inputs are set by the board as 10-bit codes (0 = Vss, 1023 =
//! Vdd). Values above 1023 are clamped.

use crate::config::Fuses;
use crate::memory::RegisterFile;
use crate::regs::{self, ADCON0, ADCON1, ADRESH, ADRESL, PIR1};
use serde::{Deserialize, Serialize};

pub const ADC_MAX: u16 = 1023;

/// TAD cycles per conversion.
const TAD_PER_CONVERSION: u64 = 12;

/// Analog channels enabled by PCFG3:PCFG0, bit n = ANn.
pub fn analog_channels(pcfg: u8) -> u8 {
    match pcfg & 0x0F {
        0b0000 | 0b0001 | 0b1000 => 0xFF,
        0b0010 | 0b0011 | 0b1100 => 0x1F,
        0b0100 | 0b0101 => 0x0B,
        0b0110 | 0b0111 => 0x00,
        0b1001 | 0b1010 | 0b1011 => 0x3F,
        0b1101 => 0x0F,
        0b1110 => 0x01,
        _ => 0x0D, // 1111: AN0, AN2, AN3 (AN3/AN2 as Vref)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Adc {
    /// Input voltage per channel as a 10-bit code
    pub inputs: [u16; 8],
    remaining: u64,
    channel: u8,
    pub conversions: u64,
}

impl Adc {
    pub fn new() -> Self {
        Adc::default()
    }

    /// Inputs are board state and survive a device reset.
    pub fn reset(&mut self) {
        self.remaining = 0;
        self.channel = 0;
    }

    /// Set an input; returns the stored value and whether it was clamped.
    pub fn set_input(&mut self, channel: u8, value: u16) -> (u16, bool) {
        let v = value.min(ADC_MAX);
        self.inputs[(channel & 7) as usize] = v;
        (v, value > ADC_MAX)
    }

    pub fn busy(&self) -> bool {
        self.remaining > 0
    }

    /// Cycles per TAD for the current ADCS bits.
    pub fn tad_cycles(mem: &RegisterFile, fuses: &Fuses) -> u64 {
        let adcs = (((mem.get(ADCON1) >> regs::ADCS2) & 1) << 2) | ((mem.get(ADCON0) >> 6) & 0x03);
        let tosc = match adcs {
            0b000 => 2,
            0b001 => 8,
            0b010 => 32,
            0b100 => 4,
            0b101 => 16,
            0b110 => 64,
            _ => return fuses.cycles_for_us(4).max(1),
        };
        (tosc / 4).max(1)
    }

    pub fn on_adcon0_write(&mut self, mem: &mut RegisterFile, fuses: &Fuses) {
        let con = mem.get(ADCON0);
        if con & regs::bit(regs::ADON) == 0 {
            // Turning the module off aborts a conversion
            self.remaining = 0;
            mem.set_bit(ADCON0, regs::GO_DONE, false);
            return;
        }
        if con & regs::bit(regs::GO_DONE) != 0 && self.remaining == 0 {
            self.start(mem, fuses);
        }
    }

    /// Begin a conversion (GO/DONE write or CCP2 special event).
    pub fn start(&mut self, mem: &mut RegisterFile, fuses: &Fuses) {
        mem.set_bit(ADCON0, regs::GO_DONE, true);
        self.channel = (mem.get(ADCON0) >> 3) & 0x07;
        self.remaining = TAD_PER_CONVERSION * Self::tad_cycles(mem, fuses);
    }

    pub fn tick(&mut self, mem: &mut RegisterFile) {
        if self.remaining == 0 {
            return;
        }
        self.remaining -= 1;
        if self.remaining > 0 {
            return;
        }
        let v = self.inputs[self.channel as usize];
        if mem.bit(ADCON1, regs::ADFM) {
            mem.set(ADRESH, (v >> 8) as u8);
            mem.set(ADRESL, v as u8);
        } else {
            mem.set(ADRESH, (v >> 2) as u8);
            mem.set(ADRESL, ((v & 0x03) << 6) as u8);
        }
        mem.set_bit(ADCON0, regs::GO_DONE, false);
        mem.set_bit(PIR1, regs::ADIF, true);
        self.conversions += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(adc: &mut Adc, mem: &mut RegisterFile) -> u64 {
        let mut n = 0;
        while mem.bit(ADCON0, regs::GO_DONE) {
            adc.tick(mem);
            n += 1;
        }
        n
    }

    #[test]
    fn test_right_justified_result() {
        let mut mem = RegisterFile::new();
        let fuses = Fuses::crystal(20_000_000);
        let mut adc = Adc::new();
        adc.set_input(0, 0x2AB);
        mem.set(ADCON1, 0x8E);
        mem.set(ADCON0, 0x81 | regs::bit(regs::GO_DONE)); // Fosc/32, AN0
        adc.on_adcon0_write(&mut mem, &fuses);
        // Fosc/32 = 8 Tcy per TAD
        assert_eq!(run(&mut adc, &mut mem), 96);
        assert_eq!(mem.get(ADRESH), 0x02);
        assert_eq!(mem.get(ADRESL), 0xAB);
        assert!(mem.bit(PIR1, regs::ADIF));
    }

    #[test]
    fn test_left_justified_result() {
        let mut mem = RegisterFile::new();
        let mut adc = Adc::new();
        adc.set_input(2, 0x3FF);
        mem.set(ADCON0, (2 << 3) | 0x01 | regs::bit(regs::GO_DONE));
        adc.on_adcon0_write(&mut mem, &Fuses::default());
        run(&mut adc, &mut mem);
        assert_eq!(mem.get(ADRESH), 0xFF);
        assert_eq!(mem.get(ADRESL), 0xC0);
    }

    #[test]
    fn test_clamp_and_abort() {
        let mut mem = RegisterFile::new();
        let mut adc = Adc::new();
        assert_eq!(adc.set_input(1, 5000), (ADC_MAX, true));
        mem.set(ADCON0, 0x01 | regs::bit(regs::GO_DONE));
        adc.on_adcon0_write(&mut mem, &Fuses::default());
        assert!(adc.busy());
        mem.set(ADCON0, 0x00);
        adc.on_adcon0_write(&mut mem, &Fuses::default());
        assert!(!adc.busy());
        assert!(!mem.bit(PIR1, regs::ADIF));
    }

    #[test]
    fn test_pcfg_table() {
        assert_eq!(analog_channels(0x0E), 0x01);
        assert_eq!(analog_channels(0x06), 0x00);
        assert_eq!(analog_channels(0x04), 0x0B);
        assert_eq!(analog_channels(0x0F), 0x0D);
    }
}
