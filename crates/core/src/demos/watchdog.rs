//! Alternating LED pattern on PORTB with the watchdog enabled. The long
//! delays clear the watchdog every millisecond, well inside its 18 ms
//! period.

use crate::drivers::{gpio, watchdog};
use crate::regs::{self, OPTION_REG};
use crate::{Firmware, Fuses, InitCtx, MainCtx, Mcu, Port, Result};

pub const HOLD_MS: u32 = 1000;

#[derive(Debug, Default)]
pub struct WatchdogDemo;

impl Firmware for WatchdogDemo {
    fn name(&self) -> &'static str {
        "watchdog"
    }

    fn fuses(&self) -> Fuses {
        Fuses::crystal(4_000_000).with_watchdog()
    }

    fn configure(&mut self, mcu: &mut Mcu, _init: &InitCtx) -> Result<()> {
        // Prescaler to Timer0: the watchdog runs at its base period
        mcu.clear_bit(OPTION_REG, regs::PSA);
        let opt = mcu.read(OPTION_REG);
        mcu.write(OPTION_REG, (opt & !0x07) | 0b100);
        gpio::set_tris(mcu, Port::B, 0x00);
        Ok(())
    }

    fn poll(&mut self, mcu: &mut Mcu, _main: &MainCtx) -> Result<()> {
        gpio::write_port(mcu, Port::B, 0x0F);
        watchdog::delay_with_wdt(mcu, HOLD_MS)?;
        gpio::write_port(mcu, Port::B, 0xF0);
        watchdog::delay_with_wdt(mcu, HOLD_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimConfig;

    #[test]
    fn test_runs_without_reset() {
        let mut fw = WatchdogDemo;
        let mut mcu = Mcu::for_firmware(&fw, SimConfig::default());
        let report = mcu.run(&mut fw, 4500).unwrap();
        assert_eq!(report.watchdog_resets, 0);
        assert_eq!(mcu.watchdog.timeouts, 0);
        assert!(mcu.watchdog.max_gap <= 1010);
        assert_eq!(mcu.port_levels()[Port::B.index()], 0xF0);
    }
}
