//! SPI master with three buttons on RB0..RB2 (up, down, send). The
//! current value is shown on PORTD and sent on request.

use crate::config::{PeripheralMode, SpiClock, SpiMode};
use crate::drivers::{self, gpio, spi};
use crate::peripherals::EchoDevice;
use crate::{Firmware, InitCtx, MainCtx, Mcu, Port, Result};

pub const DEBOUNCE_MS: u32 = 250;

#[derive(Debug, Default)]
pub struct SpiMasterDemo {
    data: u8,
}

impl SpiMasterDemo {
    pub fn value(&self) -> u8 {
        self.data
    }
}

impl Firmware for SpiMasterDemo {
    fn name(&self) -> &'static str {
        "spi-master"
    }

    fn attach_devices(&self, mcu: &mut Mcu) {
        mcu.attach_spi_device(EchoDevice::default());
        for n in 0..3 {
            mcu.set_pin(Port::B, n, false);
        }
    }

    fn configure(&mut self, mcu: &mut Mcu, _init: &InitCtx) -> Result<()> {
        let mode = SpiMode {
            clock_idle_high: false,
            transmit_on_active_edge: false,
            sample_at_end: false,
            interrupt: false,
        };
        drivers::configure(mcu, &PeripheralMode::SpiMaster { clock: SpiClock::Fosc64, mode });
        self.data = 0;
        gpio::set_tris(mcu, Port::B, 0x07);
        gpio::set_tris(mcu, Port::D, 0x00);
        gpio::write_port(mcu, Port::D, 0x00);
        Ok(())
    }

    fn poll(&mut self, mcu: &mut Mcu, _main: &MainCtx) -> Result<()> {
        if gpio::read_pin(mcu, Port::B, 0) {
            self.data = self.data.wrapping_add(1);
            mcu.delay_ms(DEBOUNCE_MS)?;
        }
        if gpio::read_pin(mcu, Port::B, 1) {
            self.data = self.data.wrapping_sub(1);
            mcu.delay_ms(DEBOUNCE_MS)?;
        }
        if gpio::read_pin(mcu, Port::B, 2) {
            spi::write(mcu, self.data);
            mcu.delay_ms(DEBOUNCE_MS)?;
        }
        gpio::write_port(mcu, Port::D, self.data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimConfig;

    #[test]
    fn test_up_down_send() {
        let mut fw = SpiMasterDemo::default();
        let mut mcu = Mcu::for_firmware(&fw, SimConfig::default());
        mcu.run(&mut fw, 5).unwrap();

        // Held for three debounce periods
        mcu.set_pin(Port::B, 0, true);
        mcu.run(&mut fw, 740).unwrap();
        mcu.set_pin(Port::B, 0, false);
        mcu.run(&mut fw, 300).unwrap();
        assert_eq!(fw.value(), 3);
        assert_eq!(mcu.port_levels()[Port::D.index()], 3);

        mcu.set_pin(Port::B, 1, true);
        mcu.run(&mut fw, 240).unwrap();
        mcu.set_pin(Port::B, 1, false);
        mcu.run(&mut fw, 300).unwrap();
        assert_eq!(fw.value(), 2);

        mcu.set_pin(Port::B, 2, true);
        mcu.run(&mut fw, 240).unwrap();
        mcu.set_pin(Port::B, 2, false);
        mcu.run(&mut fw, 300).unwrap();
        assert_eq!(mcu.mssp.spi_log, vec![2]);
    }

    #[test]
    fn test_down_wraps() {
        let mut fw = SpiMasterDemo::default();
        let mut mcu = Mcu::for_firmware(&fw, SimConfig::default());
        mcu.set_pin(Port::B, 1, true);
        mcu.run(&mut fw, 100).unwrap();
        assert_eq!(fw.value(), 0xFF);
    }
}
