//! Driver layer: peripheral configurators and blocking primitives.
//!
//! Everything here is firmware-side code. It reaches the chip only through
//! [`Mcu`] register accesses, so every call costs simulated cycles and may
//! be preempted by the interrupt handler. Configurators write registers
//! and cannot fail; anything that waits on hardware is bounded and
//! returns [`crate::Error::Timeout`] instead of hanging.

pub mod adc;
pub mod ccp;
pub mod eeprom;
pub mod gpio;
pub mod i2c;
pub mod spi;
pub mod timers;
pub mod uart;
pub mod watchdog;

use crate::config::PeripheralMode;
use crate::regs::{self, INTCON};
use crate::{Irq, Mcu};

/// Write the register sequence for one peripheral mode.
pub fn configure(mcu: &mut Mcu, mode: &PeripheralMode) {
    match mode {
        PeripheralMode::Adc(m) => adc::init(mcu, m),
        PeripheralMode::Uart(m) => uart::init(mcu, m),
        PeripheralMode::SpiMaster { clock, mode } => spi::init_master(mcu, *clock, mode),
        PeripheralMode::SpiSlave { slave_select, mode } => spi::init_slave(mcu, *slave_select, mode),
        PeripheralMode::I2cMaster { bus_hz } => i2c::init_master(mcu, *bus_hz),
        PeripheralMode::I2cSlave(m) => i2c::init_slave(mcu, m),
        PeripheralMode::Timer0(m) => timers::init_timer0(mcu, m),
        PeripheralMode::Timer1(m) => timers::init_timer1(mcu, m),
        PeripheralMode::Timer2(m) => timers::init_timer2(mcu, m),
        PeripheralMode::Capture(m) => ccp::init_capture(mcu, m),
        PeripheralMode::Compare(m) => ccp::init_compare(mcu, m),
        PeripheralMode::Pwm(m) => ccp::init_pwm(mcu, m),
        PeripheralMode::ExternalInterrupt { falling } => gpio::init_external_interrupt(mcu, *falling),
        PeripheralMode::WatchdogPostscale(p) => watchdog::set_postscale(mcu, *p),
    }
}

/// Clear a source's flag and enable it (with PEIE for peripheral sources).
pub fn enable_irq(mcu: &mut Mcu, irq: Irq) {
    let (flag_reg, flag_bit) = irq.flag();
    mcu.clear_bit(flag_reg, flag_bit);
    let (en_reg, en_bit) = irq.enable();
    mcu.set_bit(en_reg, en_bit);
    if irq.is_peripheral() {
        mcu.set_bit(INTCON, regs::PEIE);
    }
}

pub fn disable_irq(mcu: &mut Mcu, irq: Irq) {
    let (en_reg, en_bit) = irq.enable();
    mcu.clear_bit(en_reg, en_bit);
}

/// The optional last step of a configurator.
pub fn enable_global_interrupts(mcu: &mut Mcu) {
    mcu.set_bit(INTCON, regs::GIE);
}
