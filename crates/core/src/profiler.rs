//! Interrupt profiler.
//!
//! Tracks per-source dispatch statistics:
//! - dispatch counts
//! - cycles spent inside handlers (entry latency through RETFIE)
//! - longest single handler run
//! - total latency from flag to handler entry
//!
//! The profiler costs nothing when disabled; the MCU only calls
//! [`IsrProfiler::record`] while it is enabled.

use crate::peripherals::Irq;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IsrStats {
    pub count: u64,
    pub cycles: u64,
    pub longest: u64,
    pub latency: u64,
}

#[derive(Debug, Default)]
pub struct IsrProfiler {
    pub enabled: bool,
    /// Indexed by `Irq` discriminant
    stats: [IsrStats; Irq::ALL.len()],
    /// Cycle counter at profiler start
    start_cycle: u64,
    /// Cycles elapsed while profiling, set by `stop`
    pub total_cycles: u64,
}

impl IsrProfiler {
    pub fn new() -> Self {
        IsrProfiler::default()
    }

    /// Start or restart profiling, clearing accumulated data.
    pub fn start(&mut self, cycle: u64) {
        self.stats = Default::default();
        self.start_cycle = cycle;
        self.total_cycles = 0;
        self.enabled = true;
    }

    pub fn stop(&mut self, cycle: u64) {
        self.total_cycles = cycle.saturating_sub(self.start_cycle);
        self.enabled = false;
    }

    /// Record one dispatch. `sources` is the pending mask on entry; the run
    /// is charged to the first source.
    #[inline]
    pub fn record(&mut self, sources: u16, cycles: u64, latency: u64) {
        for irq in Irq::ALL {
            if sources & irq.mask() == 0 { continue; }
            let s = &mut self.stats[irq as usize];
            s.count += 1;
            s.latency += latency;
            if Irq::first(sources) == Some(irq) {
                s.cycles += cycles;
                s.longest = s.longest.max(cycles);
            }
        }
    }

    pub fn stats(&self, irq: Irq) -> IsrStats {
        self.stats[irq as usize]
    }

    pub fn total_dispatches(&self) -> u64 {
        self.stats.iter().map(|s| s.count).sum()
    }

    pub fn report(&self, now: u64) -> String {
        let elapsed = if self.enabled { now.saturating_sub(self.start_cycle) } else { self.total_cycles };
        let mut s = String::new();
        s.push_str("=== Interrupt Profile ===\n");
        s.push_str(&format!("Cycles: {}\n", elapsed));
        s.push_str(&format!("Dispatches: {}\n", self.total_dispatches()));
        s.push_str(&format!("{:>8}  {:>8}  {:>10}  {:>7}  {:>8}  {:>7}\n",
            "Source", "Count", "Cycles", "%", "Longest", "AvgLat"));
        for irq in Irq::ALL {
            let st = self.stats(irq);
            if st.count == 0 { continue; }
            let pct = if elapsed > 0 { st.cycles as f64 / elapsed as f64 * 100.0 } else { 0.0 };
            s.push_str(&format!("{:>8}  {:>8}  {:>10}  {:>6.2}%  {:>8}  {:>7.1}\n",
                irq.flag_name(), st.count, st.cycles, pct, st.longest,
                st.latency as f64 / st.count as f64));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiler_basic() {
        let mut p = IsrProfiler::new();
        p.start(0);
        p.record(Irq::Timer2.mask(), 30, 3);
        p.record(Irq::Timer2.mask(), 50, 4);
        p.record(Irq::External.mask() | Irq::Timer0.mask(), 10, 3);
        let t2 = p.stats(Irq::Timer2);
        assert_eq!(t2.count, 2);
        assert_eq!(t2.cycles, 80);
        assert_eq!(t2.longest, 50);
        assert_eq!(t2.latency, 7);
        assert_eq!(p.total_dispatches(), 4);
        // Shared dispatch is charged to the first source only
        assert_eq!(p.stats(Irq::Timer0).cycles, 10);
        assert_eq!(p.stats(Irq::External).cycles, 0);
    }

    #[test]
    fn test_report() {
        let mut p = IsrProfiler::new();
        p.start(100);
        p.record(Irq::Adc.mask(), 25, 3);
        p.stop(1100);
        let r = p.report(2000);
        assert!(r.contains("Cycles: 1000"));
        assert!(r.contains("ADIF"));
        assert!(!r.contains("TMR2IF"));
    }
}
