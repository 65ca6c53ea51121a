//! Watchdog timer.
//!
//! Runs from its own RC oscillator whenever the WDTE fuse is set. The
//! nominal period is 18 ms; with PSA = 1 the shared prescaler stretches it
//! by 1:1..1:128. CLRWDT restarts the count.

use crate::regs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Watchdog {
    count: u64,
    last_clear: u64,
    /// Longest stretch between two clears (or a clear and a timeout)
    pub max_gap: u64,
    pub clears: u64,
    pub timeouts: u32,
}

impl Watchdog {
    pub fn new() -> Self {
        Watchdog::default()
    }

    /// Restart after a device reset at `cycle`. Statistics survive.
    pub fn reset(&mut self, cycle: u64) {
        self.count = 0;
        self.last_clear = cycle;
    }

    /// Timeout in cycles for a base period and OPTION_REG value.
    pub fn period_cycles(base_cycles: u64, option: u8) -> u64 {
        let post = if option & regs::bit(regs::PSA) != 0 { 1u64 << (option & 0x07) } else { 1 };
        base_cycles.max(1) * post
    }

    pub fn clear(&mut self, cycle: u64) {
        self.max_gap = self.max_gap.max(cycle - self.last_clear);
        self.last_clear = cycle;
        self.count = 0;
        self.clears += 1;
    }

    /// Advance one cycle; true on timeout.
    pub fn tick(&mut self, enabled: bool, period: u64, cycle: u64) -> bool {
        if !enabled {
            return false;
        }
        self.count += 1;
        if self.count < period {
            return false;
        }
        self.max_gap = self.max_gap.max(cycle - self.last_clear);
        self.count = 0;
        self.last_clear = cycle;
        self.timeouts += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_with_postscaler() {
        assert_eq!(Watchdog::period_cycles(18_000, 0x00), 18_000);
        assert_eq!(Watchdog::period_cycles(18_000, 0b0000_1100), 18_000 * 16);
    }

    #[test]
    fn test_clear_prevents_timeout() {
        let mut w = Watchdog::new();
        for c in 1..=100u64 {
            assert!(!w.tick(true, 10, c));
            if c % 5 == 0 {
                w.clear(c);
            }
        }
        assert_eq!(w.max_gap, 5);
        assert_eq!(w.timeouts, 0);
    }

    #[test]
    fn test_times_out() {
        let mut w = Watchdog::new();
        let fired = (1..=25u64).filter(|&c| w.tick(true, 10, c)).count();
        assert_eq!(fired, 2);
        assert!(!w.tick(false, 1, 26));
    }
}
