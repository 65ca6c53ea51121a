//! Timer0 as an event counter on RA4/T0CKI. Two LEDs and a relay on
//! RB0..RB2 switch on as the count passes 5, 10 and 15.

use crate::config::{PeripheralMode, Timer0Mode, Timer0Source};
use crate::drivers::{self, gpio};
use crate::regs::TMR0;
use crate::{Firmware, InitCtx, MainCtx, Mcu, Port, Result};

pub const THRESHOLDS: [u8; 3] = [5, 10, 15];

#[derive(Debug, Default)]
pub struct CounterDemo {
    prev: u8,
}

impl Firmware for CounterDemo {
    fn name(&self) -> &'static str {
        "counter"
    }

    fn attach_devices(&self, mcu: &mut Mcu) {
        mcu.set_pin(Port::A, 4, false);
    }

    fn configure(&mut self, mcu: &mut Mcu, _init: &InitCtx) -> Result<()> {
        gpio::set_tris(mcu, Port::A, 0xFF);
        gpio::set_tris(mcu, Port::B, 0x00);
        gpio::write_port(mcu, Port::B, 0x00);
        drivers::configure(mcu, &PeripheralMode::Timer0(Timer0Mode {
            source: Timer0Source::External { falling: false },
            prescale: None,
            interrupt: false,
        }));
        self.prev = 0;
        Ok(())
    }

    fn poll(&mut self, mcu: &mut Mcu, _main: &MainCtx) -> Result<()> {
        let count = mcu.read(TMR0);
        if count != self.prev {
            self.prev = count;
            for (n, &t) in THRESHOLDS.iter().enumerate() {
                gpio::write_pin(mcu, Port::B, n as u8, count >= t);
            }
        }
        mcu.delay_ms(10)
    }
}
