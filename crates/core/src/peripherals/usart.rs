//! USART in asynchronous mode (8N1).
//!
//! Bit time is 4 * (SPBRG + 1) Tcy with BRGH = 1 and 16 * (SPBRG + 1) Tcy
//! with BRGH = 0; a frame is 10 bits.
//!
//! Transmit: TXREG feeds the shift register TSR. TXIF means TXREG is
//! empty, TRMT means TSR is empty. Receive: bytes arriving on RX fill a
//! two-deep FIFO read through RCREG. A third byte sets OERR, and the
//! receiver then stays stopped until CREN is cleared.

use crate::events::Event;
use crate::memory::RegisterFile;
use crate::regs::{self, PIR1, RCREG, RCSTA, SPBRG, TXSTA};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const FIFO_DEPTH: usize = 2;
const FRAME_BITS: u64 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usart {
    txreg: Option<u8>,
    tsr: Option<(u8, u64)>,
    /// Bytes on the RX line not yet clocked in
    line: VecDeque<u8>,
    shifting_in: Option<(u8, u64)>,
    fifo: VecDeque<u8>,
    /// Everything that left the TX pin
    pub tx_out: Vec<u8>,
}

impl Usart {
    pub fn new() -> Self {
        Usart::default()
    }

    /// Device reset; bytes already on the wire are kept.
    pub fn reset(&mut self) {
        self.txreg = None;
        self.tsr = None;
        self.shifting_in = None;
        self.fifo.clear();
    }

    pub fn bit_cycles(mem: &RegisterFile) -> u64 {
        let n = mem.get(SPBRG) as u64 + 1;
        if mem.bit(TXSTA, regs::BRGH) { 4 * n } else { 16 * n }
    }

    /// Actual baud rate for a given Fosc.
    pub fn baud(mem: &RegisterFile, fosc_hz: u32) -> f64 {
        fosc_hz as f64 / 4.0 / Self::bit_cycles(mem) as f64
    }

    /// SPBRG for a requested rate, rounded to nearest and clamped.
    pub fn spbrg_for(fosc_hz: u32, baud: u32, high_speed: bool) -> u8 {
        let div = (if high_speed { 16 } else { 64 }) * baud.max(1) as u64;
        let n = (fosc_hz as u64 + div / 2) / div;
        n.saturating_sub(1).min(255) as u8
    }

    pub fn inject(&mut self, bytes: &[u8]) {
        self.line.extend(bytes.iter().copied());
    }

    fn transmitter_on(mem: &RegisterFile) -> bool {
        mem.bit(TXSTA, regs::TXEN) && mem.bit(RCSTA, regs::SPEN)
    }

    pub fn write_txreg(&mut self, mem: &mut RegisterFile, value: u8, events: &mut Vec<Event>) {
        if let Some(byte) = self.txreg.replace(value) {
            events.push(Event::UartTxOverwritten { byte });
        }
        self.load_tsr(mem);
        self.update_flags(mem);
    }

    fn load_tsr(&mut self, mem: &RegisterFile) {
        if self.tsr.is_none() && Self::transmitter_on(mem) {
            if let Some(b) = self.txreg.take() {
                self.tsr = Some((b, FRAME_BITS * Self::bit_cycles(mem)));
            }
        }
    }

    pub fn read_rcreg(&mut self, mem: &mut RegisterFile) -> u8 {
        if let Some(b) = self.fifo.pop_front() {
            mem.set(RCREG, b);
        }
        self.update_flags(mem);
        mem.get(RCREG)
    }

    /// RCSTA writes: OERR/FERR are read-only, clearing CREN clears OERR,
    /// clearing SPEN resets the port.
    pub fn on_rcsta_write(&mut self, mem: &mut RegisterFile, old: u8, value: u8) {
        let hw = regs::bit(regs::OERR) | regs::bit(regs::FERR);
        let mut new = (value & !hw) | (old & hw);
        if value & regs::bit(regs::CREN) == 0 {
            new &= !regs::bit(regs::OERR);
        }
        mem.set(RCSTA, new);
        if value & regs::bit(regs::SPEN) == 0 {
            self.tsr = None;
            self.fifo.clear();
        }
        self.update_flags(mem);
    }

    fn update_flags(&self, mem: &mut RegisterFile) {
        let txif = mem.bit(TXSTA, regs::TXEN) && self.txreg.is_none();
        mem.set_bit(PIR1, regs::TXIF, txif);
        mem.set_bit(TXSTA, regs::TRMT, self.tsr.is_none());
        mem.set_bit(PIR1, regs::RCIF, !self.fifo.is_empty());
    }

    pub fn tick(&mut self, mem: &mut RegisterFile, events: &mut Vec<Event>) {
        if Self::transmitter_on(mem) {
            if let Some((byte, remaining)) = self.tsr.as_mut() {
                *remaining -= 1;
                if *remaining == 0 {
                    self.tx_out.push(*byte);
                    self.tsr = None;
                }
            }
            self.load_tsr(mem);
        } else {
            self.tsr = None;
        }

        if self.shifting_in.is_none() {
            if let Some(b) = self.line.pop_front() {
                self.shifting_in = Some((b, FRAME_BITS * Self::bit_cycles(mem)));
            }
        }
        if let Some((byte, remaining)) = self.shifting_in.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                let byte = *byte;
                self.shifting_in = None;
                self.receive(mem, byte, events);
            }
        }
        self.update_flags(mem);
    }

    fn receive(&mut self, mem: &mut RegisterFile, byte: u8, events: &mut Vec<Event>) {
        let rcsta = mem.get(RCSTA);
        let on = rcsta & regs::bit(regs::SPEN) != 0 && rcsta & regs::bit(regs::CREN) != 0;
        if !on || rcsta & regs::bit(regs::OERR) != 0 {
            events.push(Event::UartRxDropped { byte });
            return;
        }
        if self.fifo.len() >= FIFO_DEPTH {
            mem.set_bit(RCSTA, regs::OERR, true);
            events.push(Event::UartOverrun);
            return;
        }
        self.fifo.push_back(byte);
    }

    /// Bytes waiting in the receive FIFO.
    pub fn rx_pending(&self) -> usize {
        self.fifo.len()
    }

    /// Bytes not yet clocked in from the line.
    pub fn line_pending(&self) -> usize {
        self.line.len() + self.shifting_in.is_some() as usize
    }
}
