//! PIC16F877A peripheral models.
//!
//! Each module keeps only the state that is not visible in the register
//! file (prescaler counters, shift registers, FIFOs). Everything the
//! firmware can see lives in [`crate::memory::RegisterFile`] and is
//! updated in place once per instruction cycle.
//!
//! - [`Gpio`]: pin levels, external drive, RB0/INT and RB4–RB7 change
//! - [`Timer0`]: 8-bit timer/counter with shared prescaler
//! - [`Timer1`]: 16-bit timer/counter, T1CKI or T1 oscillator
//! - [`Timer2`]: 8-bit period timer with pre/postscaler
//! - [`Ccp`]: capture / compare / PWM (CCP1, CCP2)
//! - [`Adc`]: 10-bit, 8-channel converter
//! - [`Mssp`]: SPI master/slave and I2C master/slave
//! - [`Usart`]: asynchronous serial port
//! - [`EepromCtrl`]: data EEPROM unlock sequence and self-timed write
//! - [`Watchdog`]: WDT with postscaler

mod gpio;
mod timer0;
mod timer1;
mod timer2;
mod ccp;
mod adc;
mod mssp;
mod usart;
mod eeprom;
mod watchdog;

pub use gpio::{analog_pins, Edges, Gpio, PinOverrides};
pub use timer0::Timer0;
pub use timer1::Timer1;
pub use timer2::Timer2;
pub use ccp::Ccp;
pub use adc::{analog_channels, Adc, ADC_MAX};
pub use mssp::{EchoDevice, I2cDevice, I2cTransaction, Mssp, MsspBus, RegisterDevice, SpiDevice};
pub use usart::Usart;
pub use eeprom::{EepromCtrl, Unlock};
pub use watchdog::Watchdog;

use crate::regs::{self, INTCON, PIE1, PIE2, PIR1, PIR2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Interrupt sources, in the order a typical ISR polls them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Irq {
    Timer0,
    External,
    PortBChange,
    Adc,
    UartRx,
    UartTx,
    Ssp,
    Ccp1,
    Timer2,
    Timer1,
    Eeprom,
    BusCollision,
    Ccp2,
}

impl Irq {
    pub const ALL: [Irq; 13] = [
        Irq::Timer0, Irq::External, Irq::PortBChange, Irq::Adc, Irq::UartRx,
        Irq::UartTx, Irq::Ssp, Irq::Ccp1, Irq::Timer2, Irq::Timer1,
        Irq::Eeprom, Irq::BusCollision, Irq::Ccp2,
    ];

    /// Flag register and bit.
    pub fn flag(self) -> (u16, u8) {
        match self {
            Irq::Timer0 => (INTCON, regs::T0IF),
            Irq::External => (INTCON, regs::INTF),
            Irq::PortBChange => (INTCON, regs::RBIF),
            Irq::Adc => (PIR1, regs::ADIF),
            Irq::UartRx => (PIR1, regs::RCIF),
            Irq::UartTx => (PIR1, regs::TXIF),
            Irq::Ssp => (PIR1, regs::SSPIF),
            Irq::Ccp1 => (PIR1, regs::CCP1IF),
            Irq::Timer2 => (PIR1, regs::TMR2IF),
            Irq::Timer1 => (PIR1, regs::TMR1IF),
            Irq::Eeprom => (PIR2, regs::EEIF),
            Irq::BusCollision => (PIR2, regs::BCLIF),
            Irq::Ccp2 => (PIR2, regs::CCP2IF),
        }
    }

    /// Enable register and bit.
    pub fn enable(self) -> (u16, u8) {
        match self {
            Irq::Timer0 => (INTCON, regs::T0IE),
            Irq::External => (INTCON, regs::INTE),
            Irq::PortBChange => (INTCON, regs::RBIE),
            _ => {
                let (reg, bit) = self.flag();
                (if reg == PIR1 { PIE1 } else { PIE2 }, bit)
            }
        }
    }

    /// Peripheral sources additionally need INTCON.PEIE.
    pub fn is_peripheral(self) -> bool {
        !matches!(self, Irq::Timer0 | Irq::External | Irq::PortBChange)
    }

    #[inline(always)]
    pub fn mask(self) -> u16 {
        1 << self as u16
    }

    /// First source in `mask`, in polling order.
    pub fn first(mask: u16) -> Option<Irq> {
        Irq::ALL.iter().copied().find(|i| mask & i.mask() != 0)
    }

    /// Sources whose flag bits in `reg` are set in `bits`.
    pub fn from_flag_bits(reg: u16, bits: u8) -> u16 {
        Irq::ALL.iter()
            .filter(|i| {
                let (r, b) = i.flag();
                r == reg && bits & (1 << b) != 0
            })
            .fold(0, |m, i| m | i.mask())
    }

    pub fn flag_name(self) -> &'static str {
        match self {
            Irq::Timer0 => "T0IF",
            Irq::External => "INTF",
            Irq::PortBChange => "RBIF",
            Irq::Adc => "ADIF",
            Irq::UartRx => "RCIF",
            Irq::UartTx => "TXIF",
            Irq::Ssp => "SSPIF",
            Irq::Ccp1 => "CCP1IF",
            Irq::Timer2 => "TMR2IF",
            Irq::Timer1 => "TMR1IF",
            Irq::Eeprom => "EEIF",
            Irq::BusCollision => "BCLIF",
            Irq::Ccp2 => "CCP2IF",
        }
    }
}

impl fmt::Display for Irq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag_name())
    }
}

/// GPIO port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
}

impl Port {
    pub const ALL: [Port; 5] = [Port::A, Port::B, Port::C, Port::D, Port::E];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn data_addr(self) -> u16 {
        regs::PORTA + self as u16
    }

    pub fn tris_addr(self) -> u16 {
        regs::TRISA + self as u16
    }

    /// Implemented pins.
    pub fn width_mask(self) -> u8 {
        match self {
            Port::A => 0x3F,
            Port::E => 0x07,
            _ => 0xFF,
        }
    }

    pub fn from_data_addr(addr: u16) -> Option<Port> {
        Port::ALL.iter().copied().find(|p| p.data_addr() == addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irq_register_map() {
        assert_eq!(Irq::Timer2.flag(), (PIR1, regs::TMR2IF));
        assert_eq!(Irq::Timer2.enable(), (PIE1, regs::TMR2IF));
        assert_eq!(Irq::Eeprom.enable(), (PIE2, regs::EEIF));
        assert_eq!(Irq::External.enable(), (INTCON, regs::INTE));
        assert!(!Irq::External.is_peripheral());
        assert!(Irq::Ssp.is_peripheral());
    }

    #[test]
    fn test_flag_bits_to_sources() {
        let m = Irq::from_flag_bits(PIR1, regs::bit(regs::SSPIF) | regs::bit(regs::TMR2IF));
        assert_eq!(m, Irq::Ssp.mask() | Irq::Timer2.mask());
        assert_eq!(Irq::first(m), Some(Irq::Ssp));
        assert_eq!(Irq::first(0), None);
    }

    #[test]
    fn test_port_addresses() {
        assert_eq!(Port::D.data_addr(), regs::PORTD);
        assert_eq!(Port::E.tris_addr(), regs::TRISE);
        assert_eq!(Port::from_data_addr(regs::PORTC), Some(Port::C));
    }
}
