//! Watchdog timer helpers.
//!
//! The WDT itself is switched on by the WDTE fuse; firmware can only pick
//! the postscaler and clear it.

use crate::delay::WatchdogDelay;
use crate::regs::{self, OPTION_REG};
use crate::{Mcu, Result};
use embedded_hal::delay::DelayNs;

/// Assign the shared prescaler to the WDT with a 1:`ratio` postscale
/// (1..=128, rounded down to a power of two).
pub fn set_postscale(mcu: &mut Mcu, ratio: u8) {
    let ps = 7 - ratio.max(1).leading_zeros() as u8;
    let opt = mcu.read(OPTION_REG);
    mcu.write(OPTION_REG, (opt & !0x07) | (ps & 0x07) | regs::bit(regs::PSA));
}

/// CLRWDT
pub fn clear(mcu: &mut Mcu) {
    mcu.clrwdt();
}

/// Delay `ms` milliseconds through [`WatchdogDelay`], then report any
/// fault raised along the way.
pub fn delay_with_wdt(mcu: &mut Mcu, ms: u32) -> Result<()> {
    WatchdogDelay::new(mcu).delay_ms(ms);
    mcu.take_fault()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Fuses};

    #[test]
    fn test_postscale_bits() {
        let mut mcu = Mcu::default();
        set_postscale(&mut mcu, 1);
        assert_eq!(mcu.mem.get(OPTION_REG) & 0x0F, 0x08);
        set_postscale(&mut mcu, 16);
        assert_eq!(mcu.mem.get(OPTION_REG) & 0x0F, 0x0C);
        set_postscale(&mut mcu, 128);
        assert_eq!(mcu.mem.get(OPTION_REG) & 0x0F, 0x0F);
    }

    #[test]
    fn test_clearing_delay_survives() {
        let mut mcu = Mcu::new(Fuses::crystal(4_000_000).with_watchdog());
        set_postscale(&mut mcu, 1);
        delay_with_wdt(&mut mcu, 200).unwrap();
        assert_eq!(mcu.watchdog.timeouts, 0);
        assert!(mcu.watchdog.max_gap <= 1010);
    }

    #[test]
    fn test_clearing_delay_reports_earlier_timeout() {
        let mut mcu = Mcu::new(Fuses::crystal(4_000_000).with_watchdog());
        set_postscale(&mut mcu, 1);
        mcu.advance(40_000);
        let cycle = mcu.cycle;
        assert!(matches!(delay_with_wdt(&mut mcu, 50), Err(Error::WatchdogReset { .. })));
        assert_eq!(mcu.cycle, cycle);
    }

    #[test]
    fn test_plain_delay_is_reset() {
        let mut mcu = Mcu::new(Fuses::crystal(4_000_000).with_watchdog());
        set_postscale(&mut mcu, 1);
        assert!(matches!(mcu.delay_ms(200), Err(Error::WatchdogReset { .. })));
    }
}
