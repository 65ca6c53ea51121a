//! I2C slave at 7-bit address 0x20 answering every read with the DIP
//! switches on PORTB. All the work happens in the interrupt handler.

use crate::config::{I2cSlaveMode, PeripheralMode};
use crate::drivers::{self, gpio, i2c};
use crate::regs::{PIR1, SSPIF};
use crate::{Firmware, InitCtx, IrqCtx, MainCtx, Mcu, Port, Result};

/// SSPADD value: 0x20 shifted into bits 7:1.
pub const SSPADD_VALUE: u8 = 0x40;

#[derive(Debug, Default)]
pub struct I2cSlaveDemo;

fn service(mcu: &mut Mcu, _irq: &IrqCtx) -> Result<()> {
    if mcu.test_bit(PIR1, SSPIF) {
        i2c::slave_service(mcu, |m| gpio::read_port(m, Port::B))?;
    }
    Ok(())
}

impl Firmware for I2cSlaveDemo {
    fn name(&self) -> &'static str {
        "i2c-slave"
    }

    fn configure(&mut self, mcu: &mut Mcu, _init: &InitCtx) -> Result<()> {
        gpio::set_tris(mcu, Port::B, 0xFF);
        gpio::enable_pullups(mcu);
        mcu.attach_isr(service);
        drivers::configure(mcu, &PeripheralMode::I2cSlave(I2cSlaveMode {
            address: SSPADD_VALUE,
            stretch_on_receive: true,
            interrupt: true,
        }));
        drivers::enable_global_interrupts(mcu);
        Ok(())
    }

    fn poll(&mut self, _mcu: &mut Mcu, _main: &MainCtx) -> Result<()> {
        Ok(())
    }
}
