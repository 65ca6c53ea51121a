//! Two push buttons and two LEDs.
//!
//! RB1 has a pull-up (pressed = low) and lights the sourcing LED on RB0.
//! RB2 has a pull-down (pressed = high) and lights the sinking LED on RB3,
//! which is on while RB3 is low.

use crate::drivers::gpio;
use crate::{Firmware, Fuses, InitCtx, MainCtx, Mcu, Port, Result};

#[derive(Debug, Default)]
pub struct GpioDemo;

impl Firmware for GpioDemo {
    fn name(&self) -> &'static str {
        "gpio"
    }

    fn fuses(&self) -> Fuses {
        Fuses::crystal(8_000_000)
    }

    fn attach_devices(&self, mcu: &mut Mcu) {
        // Idle levels set by the pull resistors
        mcu.set_pin(Port::B, 1, true);
        mcu.set_pin(Port::B, 2, false);
    }

    fn configure(&mut self, mcu: &mut Mcu, _init: &InitCtx) -> Result<()> {
        gpio::set_pin_output(mcu, Port::B, 0);
        gpio::set_pin_output(mcu, Port::B, 3);
        gpio::set_pin_input(mcu, Port::B, 1);
        gpio::set_pin_input(mcu, Port::B, 2);
        gpio::write_pin(mcu, Port::B, 0, false);
        gpio::write_pin(mcu, Port::B, 3, true);
        Ok(())
    }

    fn poll(&mut self, mcu: &mut Mcu, _main: &MainCtx) -> Result<()> {
        let pressed1 = !gpio::read_pin(mcu, Port::B, 1);
        gpio::write_pin(mcu, Port::B, 0, pressed1);
        let pressed2 = gpio::read_pin(mcu, Port::B, 2);
        gpio::write_pin(mcu, Port::B, 3, !pressed2);
        Ok(())
    }
}
