//! I2C master reading a DIP switch behind a port expander at 0x20 and
//! showing it on PORTD, ten times a second.

use std::sync::atomic::AtomicU8;
use std::sync::Arc;

use crate::config::PeripheralMode;
use crate::drivers::{self, gpio, i2c};
use crate::peripherals::RegisterDevice;
use crate::{Firmware, Fuses, InitCtx, MainCtx, Mcu, Port, Result};

pub const SWITCH_ADDRESS: u8 = 0x20;
pub const BUS_HZ: u32 = 100_000;

#[derive(Default)]
pub struct I2cMasterDemo {
    /// DIP switch state on the far side of the bus
    switches: Arc<AtomicU8>,
}

impl I2cMasterDemo {
    pub fn switches(&self) -> Arc<AtomicU8> {
        Arc::clone(&self.switches)
    }
}

impl Firmware for I2cMasterDemo {
    fn name(&self) -> &'static str {
        "i2c-master"
    }

    fn fuses(&self) -> Fuses {
        Fuses::crystal(16_000_000)
    }

    fn attach_devices(&self, mcu: &mut Mcu) {
        mcu.attach_i2c_device(RegisterDevice::new(SWITCH_ADDRESS, self.switches()));
    }

    fn configure(&mut self, mcu: &mut Mcu, _init: &InitCtx) -> Result<()> {
        gpio::set_tris(mcu, Port::D, 0x00);
        gpio::write_port(mcu, Port::D, 0x00);
        drivers::configure(mcu, &PeripheralMode::I2cMaster { bus_hz: BUS_HZ });
        Ok(())
    }

    fn poll(&mut self, mcu: &mut Mcu, _main: &MainCtx) -> Result<()> {
        i2c::start(mcu)?;
        // ACKSTAT is not checked; a missing device reads as 0xFF
        i2c::write(mcu, (SWITCH_ADDRESS << 1) | 1)?;
        let value = i2c::read(mcu)?;
        i2c::nack(mcu)?;
        gpio::write_port(mcu, Port::D, value);
        i2c::stop(mcu)?;
        mcu.delay_ms(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::SSPADD;
    use crate::SimConfig;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_switches_shown_on_portd() {
        let mut fw = I2cMasterDemo::default();
        let mut mcu = Mcu::for_firmware(&fw, SimConfig::default());
        fw.switches().store(0xA5, Ordering::Relaxed);
        mcu.run(&mut fw, 50).unwrap();
        assert_eq!(mcu.mem.get(SSPADD), 39);
        assert_eq!(mcu.port_levels()[Port::D.index()], 0xA5);

        fw.switches().store(0x0F, Ordering::Relaxed);
        mcu.run(&mut fw, 150).unwrap();
        assert_eq!(mcu.port_levels()[Port::D.index()], 0x0F);
    }
}
