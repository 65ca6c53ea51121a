//! `embedded_hal::delay::DelayNs` on top of the simulated clock.
//!
//! Delays through this trait cannot fail; a fault raised while they run
//! stays latched in the [`Mcu`] and surfaces at the next fallible call.

use crate::Mcu;
use embedded_hal::delay::DelayNs;

const NS_PER_MS: u32 = 1_000_000;

impl Mcu {
    fn cycles_for_ns(&self, ns: u32) -> u64 {
        (ns as u64 * self.fuses.tcy_hz()).div_ceil(1_000_000_000)
    }
}

impl DelayNs for Mcu {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = self.cycles_for_ns(ns);
        self.advance(cycles);
    }

    fn delay_ms(&mut self, ms: u32) {
        let cycles = ms as u64 * self.fuses.cycles_per_ms();
        self.advance(cycles);
    }
}

/// Delay that clears the watchdog after every millisecond, so the gap
/// between clears stays bounded however long the requested delay is.
pub struct WatchdogDelay<'a> {
    pub mcu: &'a mut Mcu,
}

impl<'a> WatchdogDelay<'a> {
    pub fn new(mcu: &'a mut Mcu) -> Self {
        WatchdogDelay { mcu }
    }
}

impl WatchdogDelay<'_> {
    fn slice(&mut self, ns: u32) -> bool {
        if self.mcu.fault.is_some() {
            return false;
        }
        self.mcu.delay_ns(ns);
        self.mcu.clrwdt();
        true
    }
}

impl DelayNs for WatchdogDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        for _ in 0..ns / NS_PER_MS {
            if !self.slice(NS_PER_MS) {
                return;
            }
        }
        let rest = ns % NS_PER_MS;
        if rest > 0 {
            self.slice(rest);
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            if !self.slice(NS_PER_MS) {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{regs, Fuses};

    #[test]
    fn test_delay_ns_rounds_up() {
        let mut mcu = Mcu::new(Fuses::crystal(4_000_000));
        mcu.delay_ns(1500);
        assert_eq!(mcu.cycle, 2);
        DelayNs::delay_ms(&mut mcu, 3);
        assert_eq!(mcu.cycle, 3002);
    }

    #[test]
    fn test_watchdog_delay_clears_every_ms() {
        let mut mcu = Mcu::new(Fuses::crystal(4_000_000).with_watchdog());
        mcu.write(regs::OPTION_REG, 0x00); // 18 ms period
        let mut d = WatchdogDelay::new(&mut mcu);
        d.delay_ms(1000);
        assert_eq!(mcu.watchdog.timeouts, 0);
        assert!(mcu.watchdog.max_gap <= 1001);
        assert!(mcu.take_fault().is_ok());
    }

    #[test]
    fn test_watchdog_delay_stops_on_latched_fault() {
        let mut mcu = Mcu::new(Fuses::crystal(4_000_000).with_watchdog());
        mcu.write(regs::OPTION_REG, 0x00);
        DelayNs::delay_ms(&mut mcu, 30);
        let stopped_at = mcu.cycle;
        WatchdogDelay::new(&mut mcu).delay_ms(100);
        assert_eq!(mcu.cycle, stopped_at);
        assert!(matches!(mcu.take_fault(), Err(crate::Error::WatchdogReset { .. })));
    }
}
