//! Data EEPROM access.
//!
//! Both calls first wait for a write in progress to finish, so a read
//! never returns the old content of a cell being programmed and a second
//! write never collides with the first.

use crate::regs::{self, EEADR, EECON1, EECON2, EEDATA, INTCON};
use crate::{Mcu, Result, WaitFor};

/// Busy-wait for WR to clear.
pub fn wait_write(mcu: &mut Mcu) -> Result<()> {
    mcu.wait_until(WaitFor::EepromWrite, |m| !m.test_bit(EECON1, regs::WR))
}

pub fn read(mcu: &mut Mcu, addr: u8) -> Result<u8> {
    wait_write(mcu)?;
    mcu.write(EEADR, addr);
    mcu.clear_bit(EECON1, regs::EEPGD);
    mcu.set_bit(EECON1, regs::RD);
    Ok(mcu.read(EEDATA))
}

/// Start a write of `data` to `addr`. Returns once the write is under way;
/// the cell is programmed in the background.
///
/// Interrupts are held off only across the 55h/AAh/WR sequence, and GIE
/// goes back to what it was before, not unconditionally on.
pub fn write(mcu: &mut Mcu, addr: u8, data: u8) -> Result<()> {
    wait_write(mcu)?;
    mcu.write(EEADR, addr);
    mcu.write(EEDATA, data);
    mcu.clear_bit(EECON1, regs::EEPGD);
    mcu.set_bit(EECON1, regs::WREN);
    let gie = mcu.test_bit(INTCON, regs::GIE);
    mcu.clear_bit(INTCON, regs::GIE);
    mcu.write(EECON2, 0x55);
    mcu.write(EECON2, 0xAA);
    mcu.set_bit(EECON1, regs::WR);
    if gie {
        mcu.set_bit(INTCON, regs::GIE);
    }
    mcu.clear_bit(EECON1, regs::WREN);
    Ok(())
}

/// Write and wait for completion.
pub fn write_blocking(mcu: &mut Mcu, addr: u8, data: u8) -> Result<()> {
    write(mcu, addr, data)?;
    wait_write(mcu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::bit;
    use crate::{Error, Event, IrqCtx};

    #[test]
    fn test_write_then_read_every_value() {
        let mut mcu = Mcu::default();
        mcu.sim.eeprom_write_us = 10;
        for x in 0..=255u8 {
            write(&mut mcu, 5, x).unwrap();
            assert_eq!(read(&mut mcu, 5), Ok(x));
        }
        assert_eq!(mcu.eeprom.writes, 256);
    }

    #[test]
    fn test_second_write_waits_for_first() {
        let mut mcu = Mcu::default();
        write(&mut mcu, 1, 0xAB).unwrap();
        let started = mcu.cycle;
        write(&mut mcu, 2, 0xCD).unwrap();
        // 4 ms at 1 MIPS
        assert!(mcu.cycle - started >= 3900);
        wait_write(&mut mcu).unwrap();
        assert_eq!(mcu.eeprom_image()[1], 0xAB);
        assert_eq!(mcu.eeprom_image()[2], 0xCD);
        assert_eq!(mcu.events.count(|e| matches!(e, Event::EepromUnlockBroken)), 0);
    }

    #[test]
    fn test_gie_restored_to_previous_state() {
        let mut mcu = Mcu::default();
        mcu.sim.eeprom_write_us = 10;
        write_blocking(&mut mcu, 0, 1).unwrap();
        assert!(!mcu.mem.bit(INTCON, regs::GIE));

        mcu.attach_isr(|m: &mut Mcu, _: &IrqCtx| -> crate::Result<()> {
            m.clear_bit(regs::PIR2, regs::EEIF);
            Ok(())
        });
        mcu.write(regs::PIR2, 0);
        mcu.write(regs::PIE2, bit(regs::EEIF));
        mcu.write(INTCON, bit(regs::GIE) | bit(regs::PEIE));
        write_blocking(&mut mcu, 0, 2).unwrap();
        assert!(mcu.mem.bit(INTCON, regs::GIE));
        assert_eq!(mcu.interrupts, 1);
    }

    #[test]
    fn test_stuck_write_times_out() {
        let mut mcu = Mcu::default();
        mcu.sim.wait_budget_cycles = 1000;
        write(&mut mcu, 0, 1).unwrap();
        assert!(matches!(read(&mut mcu, 0), Err(Error::Timeout { what: WaitFor::EepromWrite, .. })));
    }
}
