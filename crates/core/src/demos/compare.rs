//! Square wave on RC4 from CCP1 compare matches against Timer1.
//!
//! The compare value is the 1 s count for a 4 MHz crystal, 999 999,
//! which does not fit CCPR1 and is truncated to its low 16 bits. The
//! special event trigger restarts Timer1 on every match, so RC4 toggles
//! every 16 960 instruction cycles.

use crate::config::{CcpChannel, CompareAction, CompareMode, PeripheralMode, Timer1Mode, Timer1Source};
use crate::drivers::{self, gpio};
use crate::regs::{CCP1IF, PIR1, TMR1L};
use crate::{Firmware, InitCtx, IrqCtx, MainCtx, Mcu, Port, Result};

const ONE_SECOND_COUNT: u32 = 4_000_000 / 4 - 1;
pub const COMPARE_VALUE: u16 = ONE_SECOND_COUNT as u16;

fn on_match(mcu: &mut Mcu, _irq: &IrqCtx) -> Result<()> {
    if mcu.test_bit(PIR1, CCP1IF) {
        gpio::toggle_pin(mcu, Port::C, 4);
        mcu.clear_bit(PIR1, CCP1IF);
        mcu.write_word(TMR1L, 0);
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct CompareDemo;

impl Firmware for CompareDemo {
    fn name(&self) -> &'static str {
        "compare"
    }

    fn configure(&mut self, mcu: &mut Mcu, _init: &InitCtx) -> Result<()> {
        gpio::set_pin_output(mcu, Port::C, 4);
        gpio::write_pin(mcu, Port::C, 4, false);
        drivers::configure(mcu, &PeripheralMode::Timer1(Timer1Mode {
            source: Timer1Source::Internal,
            prescale: 1,
            interrupt: false,
        }));
        mcu.attach_isr(on_match);
        drivers::configure(mcu, &PeripheralMode::Compare(CompareMode {
            channel: CcpChannel::Ccp1,
            value: COMPARE_VALUE,
            action: CompareAction::SpecialEvent,
            interrupt: true,
        }));
        drivers::enable_global_interrupts(mcu);
        Ok(())
    }

    fn poll(&mut self, _mcu: &mut Mcu, _main: &MainCtx) -> Result<()> {
        Ok(())
    }
}
