//! Register-level debugging aids.
//!
//! Watches sit on file-register accesses made through `Mcu::read` and
//! `Mcu::write`; each hit becomes an `Event::Watchpoint`. The dump helpers
//! render the register file by bank and the named SFRs.

use crate::regs::{self, canonical};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Any,
}

impl Access {
    fn covers(self, other: Access) -> bool {
        self == Access::Any || self == other
    }

    fn tag(self) -> &'static str {
        match self {
            Access::Read => "r",
            Access::Write => "w",
            Access::Any => "rw",
        }
    }
}

/// A watched file register.
#[derive(Debug, Clone)]
pub struct Watch {
    /// Canonical file address
    pub addr: u16,
    pub access: Access,
    /// Writes only hit when one of these bits changes
    pub bits: Option<u8>,
    /// Writes only hit when this value is stored
    pub equals: Option<u8>,
    pub hits: u64,
    pub enabled: bool,
}

impl Watch {
    fn write_matches(&self, before: u8, after: u8) -> bool {
        if let Some(m) = self.bits {
            if (before ^ after) & m == 0 {
                return false;
            }
        }
        self.equals.map_or(true, |v| v == after)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchHit {
    pub watch: usize,
    pub addr: u16,
    pub before: u8,
    pub after: u8,
    pub access: Access,
}

#[derive(Debug, Default)]
pub struct Debugger {
    pub watches: Vec<Watch>,
    pending: Vec<WatchHit>,
}

impl Debugger {
    pub fn new() -> Self {
        Debugger::default()
    }

    pub fn is_idle(&self) -> bool {
        self.watches.is_empty()
    }

    /// Watch any bank mirror of `addr`. Returns the watch index.
    pub fn watch(&mut self, addr: u16, access: Access) -> usize {
        self.watches.push(Watch {
            addr: canonical(addr),
            access,
            bits: None,
            equals: None,
            hits: 0,
            enabled: true,
        });
        self.watches.len() - 1
    }

    /// Watch only the bits in `mask` of `addr` for changes.
    pub fn watch_bits(&mut self, addr: u16, mask: u8) -> usize {
        let i = self.watch(addr, Access::Write);
        self.watches[i].bits = Some(mask);
        i
    }

    pub fn unwatch(&mut self, idx: usize) -> Option<Watch> {
        (idx < self.watches.len()).then(|| self.watches.remove(idx))
    }

    /// Called before a write lands in the register file.
    #[inline]
    pub fn on_write(&mut self, addr: u16, before: u8, after: u8) {
        for (i, w) in self.watches.iter_mut().enumerate() {
            if w.enabled && w.addr == addr && w.access.covers(Access::Write)
                && w.write_matches(before, after)
            {
                w.hits += 1;
                self.pending.push(WatchHit { watch: i, addr, before, after, access: Access::Write });
            }
        }
    }

    #[inline]
    pub fn on_read(&mut self, addr: u16, value: u8) {
        for (i, w) in self.watches.iter_mut().enumerate() {
            if w.enabled && w.addr == addr && w.access.covers(Access::Read) {
                w.hits += 1;
                self.pending.push(WatchHit {
                    watch: i, addr, before: value, after: value, access: Access::Read,
                });
            }
        }
    }

    pub fn drain(&mut self) -> Vec<WatchHit> {
        std::mem::take(&mut self.pending)
    }

    pub fn summary(&self) -> String {
        let mut s = String::new();
        for (i, w) in self.watches.iter().enumerate() {
            let name = sfr_name(w.addr).map(str::to_string)
                .unwrap_or_else(|| format!("0x{:03X}", w.addr));
            let mut filter = String::new();
            if let Some(m) = w.bits { filter.push_str(&format!(" bits={:08b}", m)); }
            if let Some(v) = w.equals { filter.push_str(&format!(" ==0x{:02X}", v)); }
            s.push_str(&format!("  #{} {:<10} {:<2}{}{} hits={}\n",
                i, name, w.access.tag(), filter,
                if w.enabled { "" } else { " (off)" }, w.hits));
        }
        if s.is_empty() { s.push_str("  (no watches)\n"); }
        s
    }
}

// ─── Register file dump ─────────────────────────────────────────────────────

/// Hex dump of `data[start..start+length]`, 16 registers per row, each row
/// tagged with its bank.
pub fn hexdump(data: &[u8], start: u16, length: u16) -> String {
    let end = (start as usize + length as usize).min(data.len());
    let mut s = String::new();
    let mut row = start as usize & !0xF;
    while row < end {
        s.push_str(&format!("b{} {:03X}:", row >> 7, row));
        for a in row..row + 16 {
            if a == row + 8 { s.push(' '); }
            if a >= start as usize && a < end {
                s.push_str(&format!(" {:02X}", data[a]));
            } else {
                s.push_str(" ..");
            }
        }
        s.push('\n');
        row += 16;
    }
    s
}

// ─── SFRs ───────────────────────────────────────────────────────────────────

/// Named SFRs of the PIC16F877A, in address order.
pub const SFR_NAMES: &[(u16, &str)] = &[
    (regs::TMR0, "TMR0"), (regs::STATUS, "STATUS"), (regs::FSR, "FSR"),
    (regs::PORTA, "PORTA"), (regs::PORTB, "PORTB"), (regs::PORTC, "PORTC"),
    (regs::PORTD, "PORTD"), (regs::PORTE, "PORTE"), (regs::PCLATH, "PCLATH"),
    (regs::INTCON, "INTCON"), (regs::PIR1, "PIR1"), (regs::PIR2, "PIR2"),
    (regs::TMR1L, "TMR1L"), (regs::TMR1H, "TMR1H"), (regs::T1CON, "T1CON"),
    (regs::TMR2, "TMR2"), (regs::T2CON, "T2CON"),
    (regs::SSPBUF, "SSPBUF"), (regs::SSPCON, "SSPCON"),
    (regs::CCPR1L, "CCPR1L"), (regs::CCPR1H, "CCPR1H"), (regs::CCP1CON, "CCP1CON"),
    (regs::RCSTA, "RCSTA"), (regs::TXREG, "TXREG"), (regs::RCREG, "RCREG"),
    (regs::CCPR2L, "CCPR2L"), (regs::CCPR2H, "CCPR2H"), (regs::CCP2CON, "CCP2CON"),
    (regs::ADRESH, "ADRESH"), (regs::ADCON0, "ADCON0"),
    (regs::OPTION_REG, "OPTION_REG"),
    (regs::TRISA, "TRISA"), (regs::TRISB, "TRISB"), (regs::TRISC, "TRISC"),
    (regs::TRISD, "TRISD"), (regs::TRISE, "TRISE"),
    (regs::PIE1, "PIE1"), (regs::PIE2, "PIE2"), (regs::PCON, "PCON"),
    (regs::SSPCON2, "SSPCON2"), (regs::PR2, "PR2"), (regs::SSPADD, "SSPADD"),
    (regs::SSPSTAT, "SSPSTAT"), (regs::TXSTA, "TXSTA"), (regs::SPBRG, "SPBRG"),
    (regs::CMCON, "CMCON"), (regs::CVRCON, "CVRCON"),
    (regs::ADRESL, "ADRESL"), (regs::ADCON1, "ADCON1"),
    (regs::EEDATA, "EEDATA"), (regs::EEADR, "EEADR"),
    (regs::EEDATH, "EEDATH"), (regs::EEADRH, "EEADRH"),
    (regs::EECON1, "EECON1"), (regs::EECON2, "EECON2"),
];

/// SFR name for any bank mirror of a file address.
pub fn sfr_name(addr: u16) -> Option<&'static str> {
    let a = canonical(addr);
    SFR_NAMES.iter().find(|(r, _)| *r == a).map(|(_, n)| *n)
}

fn sfr_value(data: &[u8], addr: u16) -> u8 {
    data.get(addr as usize).copied().unwrap_or(0)
}

/// Non-zero SFRs, one per line with their bits.
pub fn sfr_report(data: &[u8]) -> String {
    let lines: Vec<String> = SFR_NAMES
        .iter()
        .filter(|&&(a, _)| sfr_value(data, a) != 0)
        .map(|&(a, name)| {
            let v = sfr_value(data, a);
            format!("  {:<10} @{:03X}  {:02X}  {:04b}_{:04b}", name, a, v, v >> 4, v & 0xF)
        })
        .collect();
    if lines.is_empty() {
        return "  every SFR reads 00\n".into();
    }
    lines.join("\n") + "\n"
}

/// Every named SFR, packed four to a line.
pub fn sfr_table(data: &[u8]) -> String {
    SFR_NAMES
        .chunks(4)
        .map(|row| {
            row.iter()
                .map(|&(a, name)| format!("{:>10}={:02X}", name, sfr_value(data, a)))
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}
