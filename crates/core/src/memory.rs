//! PIC16F877A data memory.
//!
//! | Address Range | Content                                  |
//! |---------------|------------------------------------------|
//! | 0x000–0x01F   | Bank 0 SFRs                              |
//! | 0x020–0x07F   | Bank 0 GPR (0x70–0x7F common to all banks) |
//! | 0x080–0x09F   | Bank 1 SFRs                              |
//! | 0x100–0x10F   | Bank 2 SFRs (EEDATA, EEADR, ...)         |
//! | 0x180–0x18F   | Bank 3 SFRs (EECON1, EECON2)             |
//!
//! The 256-byte data EEPROM is a separate address space reached only
//! through EEADR/EEDATA/EECON1.

use crate::{regs, DATA_SIZE, EEPROM_SIZE};
use serde::{Deserialize, Serialize};

/// Register file plus data EEPROM.
#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterFile {
    /// Full 512-byte banked file, indexed by canonical address
    pub data: Vec<u8>,
    /// Data EEPROM (erased state is 0xFF)
    pub eeprom: Vec<u8>,
}

impl RegisterFile {
    pub fn new() -> Self {
        let mut mem = RegisterFile {
            data: vec![0u8; DATA_SIZE],
            eeprom: vec![0xFFu8; EEPROM_SIZE],
        };
        mem.power_on();
        mem
    }

    /// Load datasheet power-on values into the SFRs. EEPROM is untouched.
    pub fn power_on(&mut self) {
        self.data.iter_mut().for_each(|b| *b = 0);
        self.data[regs::STATUS as usize] = 0x18; // nTO, nPD
        self.data[regs::OPTION_REG as usize] = 0xFF;
        self.data[regs::TRISA as usize] = 0x3F;
        self.data[regs::TRISB as usize] = 0xFF;
        self.data[regs::TRISC as usize] = 0xFF;
        self.data[regs::TRISD as usize] = 0xFF;
        self.data[regs::TRISE as usize] = 0x07;
        self.data[regs::PR2 as usize] = 0xFF;
        self.data[regs::TXSTA as usize] = 0x02; // TRMT
        self.data[regs::CMCON as usize] = 0x07;
    }

    #[inline(always)]
    pub fn get(&self, addr: u16) -> u8 {
        let a = addr as usize;
        if a < self.data.len() { self.data[a] } else { 0 }
    }

    #[inline(always)]
    pub fn set(&mut self, addr: u16, v: u8) {
        let a = addr as usize;
        if a < self.data.len() { self.data[a] = v; }
    }

    #[inline(always)]
    pub fn bit(&self, addr: u16, bit: u8) -> bool {
        self.get(addr) & (1 << bit) != 0
    }

    #[inline(always)]
    pub fn set_bit(&mut self, addr: u16, bit: u8, on: bool) {
        let v = self.get(addr);
        self.set(addr, if on { v | (1 << bit) } else { v & !(1 << bit) });
    }

    /// Read a 16-bit little-endian register pair (TMR1, CCPR1, CCPR2).
    #[inline(always)]
    pub fn word(&self, lo: u16) -> u16 {
        self.get(lo) as u16 | ((self.get(lo + 1) as u16) << 8)
    }

    #[inline(always)]
    pub fn set_word(&mut self, lo: u16, v: u16) {
        self.set(lo, v as u8);
        self.set(lo + 1, (v >> 8) as u8);
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}
