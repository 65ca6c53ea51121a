//! Structured trace of notable simulator conditions.
//!
//! Everything the firmware would otherwise get away with silently (lost
//! handoffs, overruns, collisions, broken unlock sequences) lands here as
//! an [`Event`] stamped with the instruction cycle. The log is a bounded
//! ring; when `Mcu::debug` is set each entry is also echoed to stderr.

use crate::error::WaitFor;
use crate::peripherals::{Irq, Port};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Event {
    Reset { cause: ResetCause },
    IsrEntered { source: Irq },
    LongIsr { cycles: u64 },
    UnacknowledgedInterrupt { source: Irq },
    LostUpdate { what: &'static str },
    WaitTimeout { what: WaitFor },
    WatchdogTimeout,
    SspOverflow,
    WriteCollision,
    SpiSlaveNotSelected { byte: u8 },
    I2cNack { byte: u8 },
    I2cStretchTimeout,
    I2cBusReadByMaster { byte: u8 },
    UartOverrun,
    UartRxDropped { byte: u8 },
    UartTxOverwritten { byte: u8 },
    AdcClamped { channel: u8, value: u16 },
    EepromWriteStarted { addr: u8, data: u8 },
    EepromWriteDone { addr: u8, data: u8 },
    EepromUnlockBroken,
    EepromWriteRejected { reason: &'static str },
    EepromReadDuringWrite { addr: u8 },
    ProgramMemoryAccess,
    Watchpoint { addr: u16, old: u8, new: u8, write: bool },
    PinDriven { port: Port, bit: u8, level: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResetCause {
    PowerOn,
    Watchdog,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Reset { cause } => write!(f, "reset ({:?})", cause),
            Event::IsrEntered { source } => write!(f, "ISR entered for {}", source),
            Event::LongIsr { cycles } => write!(f, "ISR ran {} cycles", cycles),
            Event::UnacknowledgedInterrupt { source } => write!(f, "{} not cleared by ISR", source),
            Event::LostUpdate { what } => write!(f, "{} overwritten before main loop read it", what),
            Event::WaitTimeout { what } => write!(f, "busy-wait timeout: {}", what),
            Event::WatchdogTimeout => write!(f, "watchdog timeout"),
            Event::SspOverflow => write!(f, "SSPOV: byte received while SSPBUF full"),
            Event::WriteCollision => write!(f, "WCOL: SSPBUF written during transfer"),
            Event::SpiSlaveNotSelected { byte } => write!(f, "SPI byte 0x{:02X} ignored, SS high", byte),
            Event::I2cNack { byte } => write!(f, "I2C NACK after 0x{:02X}", byte),
            Event::I2cStretchTimeout => write!(f, "I2C clock stretched too long, master gave up"),
            Event::I2cBusReadByMaster { byte } => write!(f, "I2C master read 0x{:02X}", byte),
            Event::UartOverrun => write!(f, "OERR: receive FIFO overrun"),
            Event::UartRxDropped { byte } => write!(f, "UART byte 0x{:02X} dropped, receiver off", byte),
            Event::UartTxOverwritten { byte } => write!(f, "TXREG 0x{:02X} overwritten", byte),
            Event::AdcClamped { channel, value } => write!(f, "AN{} input {} clamped to 1023", channel, value),
            Event::EepromWriteStarted { addr, data } => write!(f, "EEPROM[{}] <- 0x{:02X} started", addr, data),
            Event::EepromWriteDone { addr, data } => write!(f, "EEPROM[{}] = 0x{:02X}", addr, data),
            Event::EepromUnlockBroken => write!(f, "EEPROM 55h/AAh unlock sequence interrupted"),
            Event::EepromWriteRejected { reason } => write!(f, "EEPROM write ignored: {}", reason),
            Event::EepromReadDuringWrite { addr } => write!(f, "EEPROM[{}] read while write in progress", addr),
            Event::ProgramMemoryAccess => write!(f, "EEPGD=1 program memory access ignored"),
            Event::Watchpoint { addr, old, new, write } => {
                let name = crate::debugger::sfr_name(*addr).unwrap_or("?");
                if *write {
                    write!(f, "watch {} (0x{:03X}) {:02X} -> {:02X}", name, addr, old, new)
                } else {
                    write!(f, "watch {} (0x{:03X}) read {:02X}", name, addr, new)
                }
            }
            Event::PinDriven { port, bit, level } => {
                write!(f, "R{:?}{} driven {}", port, bit, if *level { "high" } else { "low" })
            }
        }
    }
}

/// An event with the instruction cycle it happened on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedEvent {
    pub cycle: u64,
    pub event: Event,
}

/// Bounded event ring.
pub struct EventLog {
    entries: VecDeque<LoggedEvent>,
    capacity: usize,
    /// Entries pushed out of the ring since the last clear
    pub dropped: u64,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        EventLog { entries: VecDeque::new(), capacity: capacity.max(1), dropped: 0 }
    }

    pub fn push(&mut self, cycle: u64, event: Event) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(LoggedEvent { cycle, event });
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoggedEvent> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count entries matching a predicate.
    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.event)).count()
    }

    /// Remove and return every entry.
    pub fn drain(&mut self) -> Vec<LoggedEvent> {
        self.entries.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_drops_oldest() {
        let mut log = EventLog::new(2);
        log.push(1, Event::SspOverflow);
        log.push(2, Event::WriteCollision);
        log.push(3, Event::UartOverrun);
        assert_eq!(log.len(), 2);
        assert_eq!(log.dropped, 1);
        let cycles: Vec<u64> = log.iter().map(|e| e.cycle).collect();
        assert_eq!(cycles, vec![2, 3]);
        assert_eq!(log.count(|e| matches!(e, Event::UartOverrun)), 1);
    }

    #[test]
    fn test_display() {
        let e = Event::EepromWriteDone { addr: 5, data: 0x2A };
        assert_eq!(e.to_string(), "EEPROM[5] = 0x2A");
        let e = Event::Watchpoint { addr: crate::regs::PORTB, old: 0, new: 3, write: true };
        assert_eq!(e.to_string(), "watch PORTB (0x006) 00 -> 03");
    }
}
