//! Counter on PORTB that can be stored in data EEPROM.
//!
//! PORTB counts up every 100 ms. Pressing the MEMO button on RA2 writes
//! the count to EEPROM address 5 and shows the stored byte on PORTD,
//! where it also appears after every reset.

use crate::drivers::{eeprom, gpio};
use crate::regs::ADCON1;
use crate::{Firmware, InitCtx, MainCtx, Mcu, Port, Result};

pub const SLOT: u8 = 5;

#[derive(Debug, Default)]
pub struct EepromDemo {
    awaiting_release: bool,
}

impl Firmware for EepromDemo {
    fn name(&self) -> &'static str {
        "eeprom"
    }

    fn attach_devices(&self, mcu: &mut Mcu) {
        mcu.set_pin(Port::A, 2, false);
    }

    fn configure(&mut self, mcu: &mut Mcu, _init: &InitCtx) -> Result<()> {
        mcu.write(ADCON1, 0x06);
        gpio::set_tris(mcu, Port::B, 0x00);
        gpio::set_tris(mcu, Port::D, 0x00);
        gpio::set_tris(mcu, Port::A, 0xFF);
        gpio::write_port(mcu, Port::B, 0);
        gpio::write_port(mcu, Port::D, 0);
        let stored = eeprom::read(mcu, SLOT)?;
        gpio::write_port(mcu, Port::D, stored);
        self.awaiting_release = false;
        Ok(())
    }

    fn poll(&mut self, mcu: &mut Mcu, _main: &MainCtx) -> Result<()> {
        if self.awaiting_release {
            if gpio::wait_for_level_ms(mcu, Port::A, 2, false, 100)? {
                mcu.delay_ms(20)?;
                self.awaiting_release = false;
            }
            return Ok(());
        }
        let count = gpio::read_port(mcu, Port::B);
        gpio::write_port(mcu, Port::B, count.wrapping_add(1));
        mcu.delay_ms(100)?;
        if gpio::read_pin(mcu, Port::A, 2) {
            let value = gpio::read_port(mcu, Port::B);
            eeprom::write(mcu, SLOT, value)?;
            let stored = eeprom::read(mcu, SLOT)?;
            gpio::write_port(mcu, Port::D, stored);
            self.awaiting_release = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ResetCause, SimConfig};

    #[test]
    fn test_memo_stores_count() {
        let mut fw = EepromDemo::default();
        let mut mcu = Mcu::for_firmware(&fw, SimConfig::default());
        mcu.load_eeprom(&[0, 0, 0, 0, 0, 0x42]);
        mcu.run(&mut fw, 350).unwrap();
        assert_eq!(mcu.port_levels()[Port::D.index()], 0x42);
        let count = mcu.port_levels()[Port::B.index()];
        assert_eq!(count, 4);

        // Held across several passes, stored once
        mcu.set_pin(Port::A, 2, true);
        mcu.run(&mut fw, 300).unwrap();
        mcu.set_pin(Port::A, 2, false);
        mcu.run(&mut fw, 50).unwrap();
        assert_eq!(mcu.eeprom_image()[SLOT as usize], 5);
        assert_eq!(mcu.port_levels()[Port::D.index()], 5);
        assert_eq!(mcu.events.count(|e| matches!(e, crate::Event::EepromWriteDone { .. })), 1);

        mcu.reset(ResetCause::PowerOn);
        mcu.run(&mut fw, 1).unwrap();
        assert_eq!(mcu.port_levels()[Port::D.index()], 5);
    }
}
