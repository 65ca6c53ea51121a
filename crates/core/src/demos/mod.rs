//! Example firmwares, one per on-chip peripheral.
//!
//! Each demo is a [`Firmware`]: `configure` is the peripheral
//! configurator, `poll` one pass of the main loop, and demos that use
//! interrupts attach their handler from `configure`. Fuses and the
//! board wiring each demo expects (pull resistors, bus devices) come with
//! it.

pub mod adc;
pub mod capture;
pub mod compare;
pub mod counter;
pub mod dac;
pub mod eeprom;
pub mod gpio;
pub mod i2c_master;
pub mod i2c_slave;
pub mod interrupt;
pub mod pwm;
pub mod spi_master;
pub mod spi_slave;
pub mod timer;
pub mod uart;
pub mod watchdog;

use crate::{Error, Firmware, Result};

/// A catalog entry.
pub struct DemoInfo {
    pub name: &'static str,
    pub summary: &'static str,
    build: fn() -> Box<dyn Firmware>,
}

impl DemoInfo {
    pub fn build(&self) -> Box<dyn Firmware> {
        (self.build)()
    }
}

macro_rules! demo {
    ($name:literal, $summary:literal, $ty:ty) => {
        DemoInfo { name: $name, summary: $summary, build: || Box::new(<$ty>::default()) }
    };
}

static CATALOG: &[DemoInfo] = &[
    demo!("gpio", "two push buttons, sourcing and sinking LED", gpio::GpioDemo),
    demo!("adc", "AN0 bar graph on RB0..RB3", adc::AdcDemo),
    demo!("dac", "sine / triangle on an R-2R ladder at PORTB", dac::DacDemo),
    demo!("uart", "prompt, read a line, echo it back", uart::UartDemo),
    demo!("spi-master", "up/down/send buttons, value on PORTD", spi_master::SpiMasterDemo),
    demo!("spi-slave", "received byte mirrored on PORTB", spi_slave::SpiSlaveDemo),
    demo!("i2c-master", "read a DIP switch at 0x20, show on PORTD", i2c_master::I2cMasterDemo),
    demo!("i2c-slave", "answer reads at 0x20 with PORTB", i2c_slave::I2cSlaveDemo),
    demo!("interrupt", "blinking LEDs, voltage report, RB0 interrupt", interrupt::InterruptDemo),
    demo!("timer", "Timer2 1 ms tick toggling four LEDs", timer::TimerDemo),
    demo!("pwm", "red then green PWM ramp", pwm::PwmDemo),
    demo!("capture", "CCP1 capture of Timer1 counts", capture::CaptureDemo),
    demo!("compare", "CCP1 special event square wave on RC4", compare::CompareDemo),
    demo!("counter", "Timer0 counting RA4 presses", counter::CounterDemo),
    demo!("watchdog", "LED pattern with a watchdog-clearing delay", watchdog::WatchdogDemo),
    demo!("eeprom", "store PORTB in EEPROM[5] on RA2", eeprom::EepromDemo),
];

pub fn catalog() -> &'static [DemoInfo] {
    CATALOG
}

pub fn by_name(name: &str) -> Result<Box<dyn Firmware>> {
    CATALOG
        .iter()
        .find(|d| d.name == name)
        .map(DemoInfo::build)
        .ok_or_else(|| Error::UnknownDemo(name.to_string()))
}
