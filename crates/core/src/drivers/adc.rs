//! A/D converter driver.

use crate::config::AdcMode;
use crate::regs::{self, bit, ADCON0, ADCON1, ADRESH, ADRESL};
use crate::{Irq, Mcu, Result, WaitFor};

/// ADCON1 then ADCON0 (module on, channel selected).
pub fn init(mcu: &mut Mcu, mode: &AdcMode) {
    let (adcs2, adcs10) = mode.clock.bits();
    let mut con1 = mode.port_config & 0x0F;
    if mode.right_justified {
        con1 |= bit(regs::ADFM);
    }
    if adcs2 {
        con1 |= bit(regs::ADCS2);
    }
    mcu.write(ADCON1, con1);
    mcu.write(ADCON0, (adcs10 << 6) | ((mode.channel & 0x07) << 3) | bit(regs::ADON));
    if mode.interrupt {
        super::enable_irq(mcu, Irq::Adc);
    }
}

pub fn select_channel(mcu: &mut Mcu, channel: u8) {
    let con = mcu.read(ADCON0);
    mcu.write(ADCON0, (con & !0x38) | ((channel & 0x07) << 3));
}

/// Set GO/DONE.
pub fn start(mcu: &mut Mcu) {
    mcu.set_bit(ADCON0, regs::GO_DONE);
}

/// Busy-wait for GO/DONE to clear.
pub fn wait(mcu: &mut Mcu) -> Result<()> {
    mcu.wait_until(WaitFor::AdcConversion, |m| !m.test_bit(ADCON0, regs::GO_DONE))
}

/// 10-bit result of the last conversion, honouring ADFM.
pub fn result(mcu: &mut Mcu) -> u16 {
    let right = mcu.test_bit(ADCON1, regs::ADFM);
    let h = mcu.read(ADRESH) as u16;
    let l = mcu.read(ADRESL) as u16;
    if right {
        ((h << 8) | l) & 0x3FF
    } else {
        (h << 2) | (l >> 6)
    }
}

/// Convert the currently selected channel.
pub fn convert(mcu: &mut Mcu) -> Result<u16> {
    start(mcu);
    wait(mcu)?;
    Ok(result(mcu))
}

/// Select `channel` and convert it.
pub fn read(mcu: &mut Mcu, channel: u8) -> Result<u16> {
    select_channel(mcu, channel);
    convert(mcu)
}

/// Millivolts for a 10-bit result against a 5 V reference.
pub fn to_millivolts(code: u16) -> u32 {
    code as u32 * 5000 / 1023
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdcClock;
    use crate::{Error, Fuses};

    fn mode(right_justified: bool) -> AdcMode {
        AdcMode {
            channel: 0,
            clock: AdcClock::Fosc8,
            right_justified,
            port_config: 0,
            interrupt: false,
        }
    }

    #[test]
    fn test_init_registers() {
        let mut mcu = Mcu::new(Fuses::crystal(4_000_000));
        init(&mut mcu, &mode(true));
        assert_eq!(mcu.mem.get(ADCON0), 0x41);
        assert_eq!(mcu.mem.get(ADCON1), 0x80);
    }

    #[test]
    fn test_conversion_both_justifications() {
        for right in [true, false] {
            let mut mcu = Mcu::default();
            init(&mut mcu, &mode(right));
            mcu.set_analog(3, 777);
            assert_eq!(read(&mut mcu, 3), Ok(777));
            assert_eq!(mcu.adc.conversions, 1);
        }
    }

    #[test]
    fn test_conversion_takes_12_tad() {
        let mut mcu = Mcu::new(Fuses::crystal(4_000_000));
        init(&mut mcu, &mode(true));
        let start_cycle = mcu.cycle;
        convert(&mut mcu).unwrap();
        // Fosc/8 at 4 MHz: TAD = 2 Tcy
        assert!(mcu.cycle - start_cycle >= 24);
        assert!(mcu.cycle - start_cycle < 40);
    }

    #[test]
    fn test_module_off_times_out() {
        let mut mcu = Mcu::default();
        mcu.sim.wait_budget_cycles = 500;
        // GO set with ADON clear: nothing ever converts
        mcu.mem.set_bit(ADCON0, regs::GO_DONE, true);
        assert!(matches!(wait(&mut mcu), Err(Error::Timeout { what: WaitFor::AdcConversion, .. })));
    }

    #[test]
    fn test_millivolts() {
        assert_eq!(to_millivolts(0), 0);
        assert_eq!(to_millivolts(1023), 5000);
        assert_eq!(to_millivolts(512), 2502);
    }
}
