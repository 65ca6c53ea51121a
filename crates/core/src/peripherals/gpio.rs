//! Digital I/O pins.
//!
//! A pin's level comes from one of three places: the output latch (TRIS
//! bit clear), a peripheral that has taken the pin over (CCP compare/PWM),
//! or the outside world (TRIS bit set). Undriven PORTB inputs read high
//! when the weak pull-ups are on (OPTION_REG.nRBPU = 0), any other
//! undriven input reads low.
//!
//! Sampling the levels once per cycle yields the edges the timers and CCP
//! modules count, plus the two pin-change interrupt sources:
//! RB0/INT (edge selected by INTEDG) and the RB7:RB4 mismatch latch.

use super::Port;
use crate::memory::RegisterFile;
use crate::regs::{self, INTCON, OPTION_REG};
use serde::{Deserialize, Serialize};

/// Pins a peripheral is currently driving, per port.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinOverrides {
    pub mask: [u8; 5],
    pub level: [u8; 5],
}

impl PinOverrides {
    pub fn drive(&mut self, port: Port, bit: u8, high: bool) {
        let i = port.index();
        self.mask[i] |= 1 << bit;
        if high {
            self.level[i] |= 1 << bit;
        } else {
            self.level[i] &= !(1 << bit);
        }
    }
}

/// Level changes seen by one sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct Edges {
    pub rising: [u8; 5],
    pub falling: [u8; 5],
}

impl Edges {
    #[inline(always)]
    pub fn rose(&self, port: Port, bit: u8) -> bool {
        self.rising[port.index()] & (1 << bit) != 0
    }

    #[inline(always)]
    pub fn fell(&self, port: Port, bit: u8) -> bool {
        self.falling[port.index()] & (1 << bit) != 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Gpio {
    /// Pins driven from outside the chip
    drive_mask: [u8; 5],
    drive_level: [u8; 5],
    /// Levels at the previous sample
    prev: [u8; 5],
    /// RB7:RB4 as of the last PORTB read
    rb_latch: u8,
    primed: bool,
}

impl Gpio {
    pub fn new() -> Self {
        Gpio::default()
    }

    /// Forget the previous sample; external drive survives a reset.
    pub fn reset(&mut self) {
        self.primed = false;
    }

    pub fn drive(&mut self, port: Port, bit: u8, high: bool) {
        let i = port.index();
        self.drive_mask[i] |= 1 << bit;
        if high {
            self.drive_level[i] |= 1 << bit;
        } else {
            self.drive_level[i] &= !(1 << bit);
        }
    }

    pub fn release(&mut self, port: Port, bit: u8) {
        let i = port.index();
        self.drive_mask[i] &= !(1 << bit);
        self.drive_level[i] &= !(1 << bit);
    }

    /// External (mask, level) for a port.
    pub fn external(&self, port: Port) -> (u8, u8) {
        (self.drive_mask[port.index()], self.drive_level[port.index()])
    }

    /// Physical pin levels of every port.
    pub fn levels(&self, mem: &RegisterFile, ov: &PinOverrides) -> [u8; 5] {
        let pullups = !mem.bit(OPTION_REG, regs::NRBPU);
        let mut out = [0u8; 5];
        for port in Port::ALL {
            let i = port.index();
            let tris = mem.get(port.tris_addr());
            let latch = mem.get(port.data_addr());
            let mut input = self.drive_level[i] & self.drive_mask[i];
            if port == Port::B && pullups {
                input |= !self.drive_mask[i];
            }
            let mut level = (tris & input) | (!tris & latch);
            level = (level & !ov.mask[i]) | (ov.level[i] & ov.mask[i]);
            out[i] = level & port.width_mask();
        }
        out
    }

    /// Record a new sample, raise INTF / RBIF and report the edges.
    pub fn sample(&mut self, mem: &mut RegisterFile, levels: &[u8; 5]) -> Edges {
        if !self.primed {
            self.prev = *levels;
            self.rb_latch = levels[Port::B.index()] & 0xF0;
            self.primed = true;
            return Edges::default();
        }
        let mut edges = Edges::default();
        for i in 0..5 {
            let changed = self.prev[i] ^ levels[i];
            edges.rising[i] = changed & levels[i];
            edges.falling[i] = changed & !levels[i];
        }
        self.prev = *levels;

        let rising_edge = mem.bit(OPTION_REG, regs::INTEDG);
        let int_edge = if rising_edge { edges.rose(Port::B, 0) } else { edges.fell(Port::B, 0) };
        if int_edge {
            mem.set_bit(INTCON, regs::INTF, true);
        }

        // Only RB7:RB4 pins configured as inputs take part in the compare
        let inputs = mem.get(regs::TRISB) & 0xF0;
        if (levels[Port::B.index()] ^ self.rb_latch) & inputs != 0 {
            mem.set_bit(INTCON, regs::RBIF, true);
        }
        edges
    }

    /// A PORTB read ends the mismatch condition.
    pub fn latch_portb(&mut self, level: u8) {
        self.rb_latch = level & 0xF0;
    }
}

/// Pins of PORTA/PORTE configured as analog inputs for a PCFG3:PCFG0 value,
/// as (PORTA mask, PORTE mask).
pub fn analog_pins(pcfg: u8) -> (u8, u8) {
    let an = super::analog_channels(pcfg);
    let mut porta = an & 0x0F;
    if an & 0x10 != 0 {
        porta |= 0x20; // AN4 = RA5
    }
    (porta, (an >> 5) & 0x07)
}
