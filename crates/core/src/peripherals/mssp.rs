//! Master Synchronous Serial Port: SPI and I2C.
//!
//! The mode comes from SSPCON.SSPM3:0 while SSPEN is set:
//!
//! | SSPM | Mode                                        |
//! |------|---------------------------------------------|
//! | 0000 | SPI master, Fosc/4                          |
//! | 0001 | SPI master, Fosc/16                         |
//! | 0010 | SPI master, Fosc/64                         |
//! | 0011 | SPI master, TMR2 output / 2                 |
//! | 0100 | SPI slave, SS pin (RA5) enabled             |
//! | 0101 | SPI slave, SS disabled                      |
//! | 0110 | I2C slave, 7-bit address                    |
//! | 1000 | I2C master, Fosc / (4 * (SSPADD + 1))       |
//!
//! The far end of every bus lives outside the chip. In master modes the
//! board attaches devices ([`SpiDevice`], [`I2cDevice`]). In slave modes
//! the board queues traffic from an external master, clocked at the
//! board's bus clock.
//!
//! Transfers take real time: a byte is 8 bit times (9 for I2C with the
//! acknowledge), and SSPIF/BF only change when the last bit is done.

use crate::events::Event;
use crate::memory::RegisterFile;
use crate::regs::{self, PIR1, SSPADD, SSPBUF, SSPCON, SSPCON2, SSPSTAT};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use super::Timer2;

/// SPI slave on the far end of a master-mode transfer.
pub trait SpiDevice: Send {
    /// Called once per byte with what the PIC shifted out; returns what
    /// the device shifted back.
    fn exchange(&mut self, mosi: u8) -> u8;
}

/// I2C target answering a master-mode PIC.
pub trait I2cDevice: Send {
    /// 7-bit address.
    fn address(&self) -> u8;
    /// A data byte from the master; return false to NACK.
    fn write(&mut self, _byte: u8) -> bool {
        true
    }
    /// Next byte for the master.
    fn read(&mut self) -> u8;
    fn stop(&mut self) {}
}

/// SPI device that answers each byte with the previous one.
#[derive(Debug, Default)]
pub struct EchoDevice {
    last: u8,
    pub received: Vec<u8>,
}

impl SpiDevice for EchoDevice {
    fn exchange(&mut self, mosi: u8) -> u8 {
        self.received.push(mosi);
        std::mem::replace(&mut self.last, mosi)
    }
}

/// One-byte I2C register, e.g. a DIP switch behind a port expander. The
/// value is shared so the board can change it while the firmware runs.
pub struct RegisterDevice {
    address: u8,
    value: Arc<AtomicU8>,
}

impl RegisterDevice {
    pub fn new(address: u8, value: Arc<AtomicU8>) -> Self {
        RegisterDevice { address, value }
    }
}

impl I2cDevice for RegisterDevice {
    fn address(&self) -> u8 {
        self.address
    }

    fn write(&mut self, byte: u8) -> bool {
        self.value.store(byte, Ordering::Relaxed);
        true
    }

    fn read(&mut self) -> u8 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Traffic from an external I2C master to a slave-mode PIC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum I2cTransaction {
    /// Address the PIC for reading and clock out `count` bytes.
    Read { address: u8, count: u8 },
    /// Address the PIC for writing and send `data`.
    Write { address: u8, data: Vec<u8> },
}

/// Everything off-chip the MSSP talks to during one tick.
pub struct MsspBus<'a> {
    pub spi: &'a mut Option<Box<dyn SpiDevice>>,
    pub i2c: &'a mut Vec<Box<dyn I2cDevice>>,
    /// Bit time of the external master, in instruction cycles
    pub ext_bit_cycles: u64,
    /// Longest clock stretch the external I2C master tolerates
    pub stretch_timeout: u64,
    /// SS (RA5) level
    pub ss_high: bool,
    pub events: &'a mut Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum MasterOp {
    Idle,
    Start(u64),
    Restart(u64),
    Stop(u64),
    Ack(u64),
    Receive(u64),
    Write { remaining: u64, byte: u8 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum SlavePhase {
    Idle,
    /// Master clocking in an address or data byte
    Receiving { remaining: u64, byte: u8, address: bool },
    /// SCL held low while CKP = 0
    Stretched { waited: u64, reading: bool },
    /// SSPBUF shifting out to the master
    Transmitting { remaining: u64, byte: u8 },
    /// Master's ACK/NACK clock
    MasterAck { remaining: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mssp {
    spi_out: Option<(u64, u8)>,
    spi_slave_rx: VecDeque<u8>,
    spi_slave_xfer: Option<(u64, u8)>,
    master: MasterOp,
    addressing: bool,
    target: Option<(usize, bool)>,
    slave_queue: VecDeque<I2cTransaction>,
    slave: SlavePhase,
    write_data: VecDeque<u8>,
    reads_left: u8,
    tx_loaded: bool,
    /// Bytes the PIC shifted out on SPI (either role)
    pub spi_log: Vec<u8>,
    /// Bytes an external I2C master read from the slave-mode PIC
    pub bus_reads: Vec<u8>,
}

impl Default for Mssp {
    fn default() -> Self {
        Self::new()
    }
}

impl Mssp {
    pub fn new() -> Self {
        Mssp {
            spi_out: None,
            spi_slave_rx: VecDeque::new(),
            spi_slave_xfer: None,
            master: MasterOp::Idle,
            addressing: false,
            target: None,
            slave_queue: VecDeque::new(),
            slave: SlavePhase::Idle,
            write_data: VecDeque::new(),
            reads_left: 0,
            tx_loaded: false,
            spi_log: Vec::new(),
            bus_reads: Vec::new(),
        }
    }

    /// Device reset: drop in-flight transfers, keep logs and queued
    /// external traffic.
    pub fn reset(&mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        self.spi_out = None;
        self.spi_slave_xfer = None;
        self.master = MasterOp::Idle;
        self.addressing = false;
        self.target = None;
        self.slave = SlavePhase::Idle;
        self.write_data.clear();
        self.reads_left = 0;
        self.tx_loaded = false;
    }

    fn enabled(mem: &RegisterFile) -> bool {
        mem.bit(SSPCON, regs::SSPEN)
    }

    fn sspm(mem: &RegisterFile) -> u8 {
        mem.get(SSPCON) & 0x0F
    }

    fn is_i2c_slave(sspm: u8) -> bool {
        matches!(sspm, 0b0110 | 0b0111 | 0b1110 | 0b1111)
    }

    /// SPI master bit time in instruction cycles.
    pub fn spi_bit_cycles(mem: &RegisterFile) -> u64 {
        match Self::sspm(mem) {
            0b0000 => 1,
            0b0001 => 4,
            0b0010 => 16,
            _ => 2 * Timer2::period_cycles(mem),
        }
    }

    /// I2C master bit time (one SCL period) in instruction cycles.
    pub fn i2c_bit_cycles(mem: &RegisterFile) -> u64 {
        mem.get(SSPADD) as u64 + 1
    }

    pub fn busy(&self) -> bool {
        self.spi_out.is_some() || self.master != MasterOp::Idle || self.slave != SlavePhase::Idle
    }

    pub fn queue_spi_byte(&mut self, byte: u8) {
        self.spi_slave_rx.push_back(byte);
    }

    pub fn queue_i2c(&mut self, t: I2cTransaction) {
        self.slave_queue.push_back(t);
    }

    fn collide(mem: &mut RegisterFile, events: &mut Vec<Event>) {
        mem.set_bit(SSPCON, regs::WCOL, true);
        events.push(Event::WriteCollision);
    }

    pub fn write_buf(&mut self, mem: &mut RegisterFile, value: u8, events: &mut Vec<Event>) {
        if !Self::enabled(mem) {
            mem.set(SSPBUF, value);
            return;
        }
        let sspm = Self::sspm(mem);
        match sspm {
            0b0000..=0b0011 => {
                if self.spi_out.is_some() {
                    return Self::collide(mem, events);
                }
                mem.set(SSPBUF, value);
                self.spi_out = Some((8 * Self::spi_bit_cycles(mem), value));
            }
            0b0100 | 0b0101 => {
                if self.spi_slave_xfer.is_some() {
                    return Self::collide(mem, events);
                }
                mem.set(SSPBUF, value);
            }
            0b1000 => {
                if self.master != MasterOp::Idle {
                    return Self::collide(mem, events);
                }
                mem.set(SSPBUF, value);
                mem.set_bit(SSPSTAT, regs::BF, true);
                mem.set_bit(SSPSTAT, regs::R_NW, true);
                let remaining = 9 * Self::i2c_bit_cycles(mem);
                self.master = MasterOp::Write { remaining, byte: value };
            }
            m if Self::is_i2c_slave(m) => {
                if matches!(self.slave, SlavePhase::Transmitting { .. }) {
                    return Self::collide(mem, events);
                }
                mem.set(SSPBUF, value);
                mem.set_bit(SSPSTAT, regs::BF, true);
                self.tx_loaded = true;
            }
            _ => mem.set(SSPBUF, value),
        }
    }

    /// Reading SSPBUF empties it (unless it holds a byte queued for the
    /// master to read).
    pub fn read_buf(&mut self, mem: &mut RegisterFile) -> u8 {
        if !self.tx_loaded {
            mem.set_bit(SSPSTAT, regs::BF, false);
        }
        mem.get(SSPBUF)
    }

    pub fn on_sspcon_write(&mut self, old: u8, new: u8) {
        let en = regs::bit(regs::SSPEN);
        if new & en == 0 || (old ^ new) & 0x0F != 0 {
            self.abort();
        }
    }

    pub fn on_sspcon2_write(&mut self, mem: &mut RegisterFile, old: u8) {
        if !Self::enabled(mem) || Self::sspm(mem) != 0b1000 {
            return;
        }
        let new = mem.get(SSPCON2);
        if self.master != MasterOp::Idle {
            // Sequence bits are locked while a bus operation runs
            mem.set(SSPCON2, (new & !0x1F) | (old & 0x1F));
            return;
        }
        let rising = new & !old;
        let bit = Self::i2c_bit_cycles(mem);
        self.master = if rising & regs::bit(regs::SEN) != 0 {
            MasterOp::Start(bit)
        } else if rising & regs::bit(regs::RSEN) != 0 {
            MasterOp::Restart(bit)
        } else if rising & regs::bit(regs::PEN) != 0 {
            MasterOp::Stop(bit)
        } else if rising & regs::bit(regs::RCEN) != 0 {
            MasterOp::Receive(8 * bit)
        } else if rising & regs::bit(regs::ACKEN) != 0 {
            MasterOp::Ack(bit)
        } else {
            MasterOp::Idle
        };
    }

    pub fn tick(&mut self, mem: &mut RegisterFile, bus: &mut MsspBus) {
        let sspm = Self::sspm(mem);
        let enabled = Self::enabled(mem);
        if !enabled || !matches!(sspm, 0b0100 | 0b0101) {
            // Nobody is listening on the slave SPI lines
            while let Some(byte) = self.spi_slave_rx.pop_front() {
                bus.events.push(Event::SpiSlaveNotSelected { byte });
            }
        }
        if !enabled {
            return;
        }
        match sspm {
            0b0000..=0b0011 => self.tick_spi_master(mem, bus),
            0b0100 | 0b0101 => self.tick_spi_slave(mem, bus, sspm == 0b0100),
            0b1000 => self.tick_i2c_master(mem, bus),
            m if Self::is_i2c_slave(m) => self.tick_i2c_slave(mem, bus),
            _ => {}
        }
    }

    fn tick_spi_master(&mut self, mem: &mut RegisterFile, bus: &mut MsspBus) {
        let Some((remaining, out)) = self.spi_out.as_mut() else { return };
        *remaining -= 1;
        if *remaining > 0 {
            return;
        }
        let out = *out;
        self.spi_out = None;
        let miso = bus.spi.as_mut().map_or(0xFF, |d| d.exchange(out));
        self.spi_log.push(out);
        // A master starts every reception itself, so it never overflows
        mem.set(SSPBUF, miso);
        mem.set_bit(SSPSTAT, regs::BF, true);
        mem.set_bit(PIR1, regs::SSPIF, true);
    }

    fn tick_spi_slave(&mut self, mem: &mut RegisterFile, bus: &mut MsspBus, use_ss: bool) {
        if self.spi_slave_xfer.is_none() {
            if let Some(byte) = self.spi_slave_rx.pop_front() {
                if use_ss && bus.ss_high {
                    bus.events.push(Event::SpiSlaveNotSelected { byte });
                } else {
                    self.spi_slave_xfer = Some((8 * bus.ext_bit_cycles.max(1), byte));
                }
            }
        }
        let Some((remaining, byte)) = self.spi_slave_xfer.as_mut() else { return };
        *remaining -= 1;
        if *remaining > 0 {
            return;
        }
        let byte = *byte;
        self.spi_slave_xfer = None;
        self.spi_log.push(mem.get(SSPBUF));
        if mem.bit(SSPSTAT, regs::BF) {
            mem.set_bit(SSPCON, regs::SSPOV, true);
            bus.events.push(Event::SspOverflow);
        } else {
            mem.set(SSPBUF, byte);
            mem.set_bit(SSPSTAT, regs::BF, true);
        }
        mem.set_bit(PIR1, regs::SSPIF, true);
    }

    fn tick_i2c_master(&mut self, mem: &mut RegisterFile, bus: &mut MsspBus) {
        let done = match &mut self.master {
            MasterOp::Idle => return,
            MasterOp::Start(r)
            | MasterOp::Restart(r)
            | MasterOp::Stop(r)
            | MasterOp::Ack(r)
            | MasterOp::Receive(r)
            | MasterOp::Write { remaining: r, .. } => {
                *r = r.saturating_sub(1);
                *r == 0
            }
        };
        if !done {
            return;
        }
        match std::mem::replace(&mut self.master, MasterOp::Idle) {
            MasterOp::Idle => return,
            MasterOp::Start(_) | MasterOp::Restart(_) => {
                let con2 = mem.get(SSPCON2) & !(regs::bit(regs::SEN) | regs::bit(regs::RSEN));
                mem.set(SSPCON2, con2);
                mem.set_bit(SSPSTAT, regs::S_BIT, true);
                mem.set_bit(SSPSTAT, regs::P_BIT, false);
                self.addressing = true;
            }
            MasterOp::Stop(_) => {
                mem.set_bit(SSPCON2, regs::PEN, false);
                mem.set_bit(SSPSTAT, regs::S_BIT, false);
                mem.set_bit(SSPSTAT, regs::P_BIT, true);
                if let Some((i, _)) = self.target.take() {
                    if let Some(dev) = bus.i2c.get_mut(i) {
                        dev.stop();
                    }
                }
            }
            MasterOp::Ack(_) => mem.set_bit(SSPCON2, regs::ACKEN, false),
            MasterOp::Receive(_) => {
                mem.set_bit(SSPCON2, regs::RCEN, false);
                let byte = match self.target {
                    Some((i, true)) => bus.i2c.get_mut(i).map_or(0xFF, |d| d.read()),
                    _ => 0xFF,
                };
                if mem.bit(SSPSTAT, regs::BF) {
                    mem.set_bit(SSPCON, regs::SSPOV, true);
                    bus.events.push(Event::SspOverflow);
                } else {
                    mem.set(SSPBUF, byte);
                    mem.set_bit(SSPSTAT, regs::BF, true);
                }
            }
            MasterOp::Write { byte, .. } => {
                mem.set_bit(SSPSTAT, regs::BF, false);
                mem.set_bit(SSPSTAT, regs::R_NW, false);
                let ack = if self.addressing {
                    self.addressing = false;
                    let (addr, read) = (byte >> 1, byte & 1 != 0);
                    self.target = bus.i2c.iter().position(|d| d.address() == addr).map(|i| (i, read));
                    self.target.is_some()
                } else {
                    match self.target {
                        Some((i, false)) => bus.i2c.get_mut(i).is_some_and(|d| d.write(byte)),
                        _ => false,
                    }
                };
                mem.set_bit(SSPCON2, regs::ACKSTAT, !ack);
                if !ack {
                    bus.events.push(Event::I2cNack { byte });
                }
            }
        }
        mem.set_bit(PIR1, regs::SSPIF, true);
    }

    fn finish_slave(&mut self, mem: &mut RegisterFile) {
        mem.set_bit(SSPSTAT, regs::S_BIT, false);
        mem.set_bit(SSPSTAT, regs::P_BIT, true);
        self.slave = SlavePhase::Idle;
        self.write_data.clear();
        self.reads_left = 0;
    }

    fn next_write_byte(&mut self, mem: &mut RegisterFile, bit: u64) {
        match self.write_data.pop_front() {
            Some(byte) => {
                self.slave = SlavePhase::Receiving { remaining: 9 * bit, byte, address: false };
            }
            None => self.finish_slave(mem),
        }
    }

    fn tick_i2c_slave(&mut self, mem: &mut RegisterFile, bus: &mut MsspBus) {
        let bit = bus.ext_bit_cycles.max(1);
        let stretch_on_receive = mem.bit(SSPCON2, regs::SEN);
        match &mut self.slave {
            SlavePhase::Idle => {
                let Some(t) = self.slave_queue.pop_front() else { return };
                mem.set_bit(SSPSTAT, regs::S_BIT, true);
                mem.set_bit(SSPSTAT, regs::P_BIT, false);
                let byte = match t {
                    I2cTransaction::Read { address, count } => {
                        self.reads_left = count.max(1);
                        (address << 1) | 1
                    }
                    I2cTransaction::Write { address, data } => {
                        self.write_data = data.into();
                        address << 1
                    }
                };
                self.slave = SlavePhase::Receiving { remaining: 9 * bit, byte, address: true };
            }
            SlavePhase::Receiving { remaining, byte, address } => {
                *remaining -= 1;
                if *remaining > 0 {
                    return;
                }
                let (byte, address) = (*byte, *address);
                if address {
                    let own = mem.get(SSPADD) & 0xFE;
                    let general_call = byte == 0 && mem.bit(SSPCON2, regs::GCEN);
                    if byte & 0xFE != own && !general_call {
                        bus.events.push(Event::I2cNack { byte });
                        return self.finish_slave(mem);
                    }
                }
                if mem.bit(SSPSTAT, regs::BF) {
                    // Not acknowledged: the master gives up
                    mem.set_bit(SSPCON, regs::SSPOV, true);
                    bus.events.push(Event::SspOverflow);
                    return self.finish_slave(mem);
                }
                let reading = address && byte & 1 != 0;
                mem.set(SSPBUF, byte);
                mem.set_bit(SSPSTAT, regs::BF, true);
                mem.set_bit(SSPSTAT, regs::D_NA, !address);
                mem.set_bit(SSPSTAT, regs::R_NW, reading);
                mem.set_bit(PIR1, regs::SSPIF, true);
                if reading || stretch_on_receive {
                    mem.set_bit(SSPCON, regs::CKP, false);
                    self.slave = SlavePhase::Stretched { waited: 0, reading };
                } else {
                    self.next_write_byte(mem, bit);
                }
            }
            SlavePhase::Stretched { waited, reading } => {
                if !mem.bit(SSPCON, regs::CKP) {
                    *waited += 1;
                    if *waited >= bus.stretch_timeout {
                        bus.events.push(Event::I2cStretchTimeout);
                        self.tx_loaded = false;
                        self.finish_slave(mem);
                    }
                    return;
                }
                if *reading {
                    let byte = mem.get(SSPBUF);
                    self.slave = SlavePhase::Transmitting { remaining: 8 * bit, byte };
                } else {
                    self.next_write_byte(mem, bit);
                }
            }
            SlavePhase::Transmitting { remaining, byte } => {
                *remaining -= 1;
                if *remaining > 0 {
                    return;
                }
                let byte = *byte;
                mem.set_bit(SSPSTAT, regs::BF, false);
                self.tx_loaded = false;
                self.bus_reads.push(byte);
                bus.events.push(Event::I2cBusReadByMaster { byte });
                self.slave = SlavePhase::MasterAck { remaining: bit };
            }
            SlavePhase::MasterAck { remaining } => {
                *remaining -= 1;
                if *remaining > 0 {
                    return;
                }
                self.reads_left = self.reads_left.saturating_sub(1);
                mem.set_bit(SSPSTAT, regs::D_NA, true);
                mem.set_bit(PIR1, regs::SSPIF, true);
                if self.reads_left > 0 {
                    // ACK: the master wants another byte
                    mem.set_bit(SSPSTAT, regs::R_NW, true);
                    mem.set_bit(SSPCON, regs::CKP, false);
                    self.slave = SlavePhase::Stretched { waited: 0, reading: true };
                } else {
                    // NACK on the last byte resets the slave logic
                    mem.set_bit(SSPSTAT, regs::R_NW, false);
                    self.finish_slave(mem);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Harness {
        mem: RegisterFile,
        mssp: Mssp,
        spi: Option<Box<dyn SpiDevice>>,
        i2c: Vec<Box<dyn I2cDevice>>,
        events: Vec<Event>,
        ss_high: bool,
    }

    impl Harness {
        fn new() -> Self {
            Harness {
                mem: RegisterFile::new(),
                mssp: Mssp::new(),
                spi: None,
                i2c: Vec::new(),
                events: Vec::new(),
                ss_high: false,
            }
        }

        fn run(&mut self, cycles: u64) {
            for _ in 0..cycles {
                let mut bus = MsspBus {
                    spi: &mut self.spi,
                    i2c: &mut self.i2c,
                    ext_bit_cycles: 10,
                    stretch_timeout: 1000,
                    ss_high: self.ss_high,
                    events: &mut self.events,
                };
                self.mssp.tick(&mut self.mem, &mut bus);
            }
        }

        fn write_con2(&mut self, value: u8) {
            let old = self.mem.get(SSPCON2);
            self.mem.set(SSPCON2, value);
            self.mssp.on_sspcon2_write(&mut self.mem, old);
        }

        fn write_buf(&mut self, value: u8) {
            self.mssp.write_buf(&mut self.mem, value, &mut self.events);
        }
    }

    #[test]
    fn test_spi_master_timing_and_collision() {
        let mut h = Harness::new();
        h.spi = Some(Box::new(EchoDevice::default()));
        h.mem.set(SSPCON, 0x20 | 0b0001); // Fosc/16: 4 Tcy per bit
        h.write_buf(0xA5);
        h.write_buf(0x11);
        assert!(h.mem.bit(SSPCON, regs::WCOL));
        h.run(31);
        assert!(!h.mem.bit(SSPSTAT, regs::BF));
        h.run(1);
        assert!(h.mem.bit(SSPSTAT, regs::BF));
        assert!(h.mem.bit(PIR1, regs::SSPIF));
        assert_eq!(h.mssp.spi_log, vec![0xA5]);
        assert_eq!(h.mssp.read_buf(&mut h.mem), 0x00); // echo's first answer
        assert!(!h.mem.bit(SSPSTAT, regs::BF));
    }

    #[test]
    fn test_spi_slave_overflow() {
        let mut h = Harness::new();
        h.mem.set(SSPCON, 0x20 | 0b0101);
        h.mssp.queue_spi_byte(1);
        h.mssp.queue_spi_byte(2);
        h.run(80);
        assert_eq!(h.mssp.read_buf(&mut h.mem), 1);
        h.mem.set_bit(SSPSTAT, regs::BF, true);
        h.run(80);
        assert!(h.mem.bit(SSPCON, regs::SSPOV));
        assert!(h.events.contains(&Event::SspOverflow));
    }

    #[test]
    fn test_spi_slave_select() {
        let mut h = Harness::new();
        h.mem.set(SSPCON, 0x20 | 0b0100);
        h.ss_high = true;
        h.mssp.queue_spi_byte(7);
        h.run(100);
        assert!(!h.mem.bit(SSPSTAT, regs::BF));
        assert_eq!(h.events, vec![Event::SpiSlaveNotSelected { byte: 7 }]);
    }

    #[test]
    fn test_i2c_master_read_sequence() {
        let mut h = Harness::new();
        let value = Arc::new(AtomicU8::new(0x5C));
        h.i2c.push(Box::new(RegisterDevice::new(0x20, value)));
        h.mem.set(SSPCON, 0x28);
        h.mem.set(SSPADD, 39);

        h.write_con2(regs::bit(regs::SEN));
        h.run(40);
        assert_eq!(h.mem.get(SSPCON2) & 0x1F, 0);
        assert!(h.mem.bit(SSPSTAT, regs::S_BIT));

        h.write_buf(0x41);
        assert!(h.mem.bit(SSPSTAT, regs::R_NW));
        h.run(9 * 40);
        assert!(!h.mem.bit(SSPSTAT, regs::R_NW));
        assert!(!h.mem.bit(SSPCON2, regs::ACKSTAT));

        h.write_con2(regs::bit(regs::RCEN));
        h.run(8 * 40);
        assert!(h.mem.bit(SSPSTAT, regs::BF));
        assert_eq!(h.mssp.read_buf(&mut h.mem), 0x5C);

        h.write_con2(regs::bit(regs::ACKDT) | regs::bit(regs::ACKEN));
        h.run(40);
        h.write_con2(regs::bit(regs::ACKDT) | regs::bit(regs::PEN));
        h.run(40);
        assert!(h.mem.bit(SSPSTAT, regs::P_BIT));
        assert!(!h.mssp.busy());
    }

    #[test]
    fn test_i2c_master_nack_unknown_address() {
        let mut h = Harness::new();
        h.mem.set(SSPCON, 0x28);
        h.mem.set(SSPADD, 9);
        h.write_con2(regs::bit(regs::SEN));
        h.run(10);
        h.write_buf(0x90);
        h.run(90);
        assert!(h.mem.bit(SSPCON2, regs::ACKSTAT));
        assert_eq!(h.events, vec![Event::I2cNack { byte: 0x90 }]);
    }

    #[test]
    fn test_i2c_slave_read_with_stretch() {
        let mut h = Harness::new();
        h.mem.set(SSPADD, 0x40);
        h.mem.set(SSPCON, 0x36);
        h.mssp.queue_i2c(I2cTransaction::Read { address: 0x20, count: 1 });
        h.run(1 + 90);
        assert!(h.mem.bit(PIR1, regs::SSPIF));
        assert!(h.mem.bit(SSPSTAT, regs::R_NW));
        assert!(!h.mem.bit(SSPSTAT, regs::D_NA));
        assert!(!h.mem.bit(SSPCON, regs::CKP));

        // What an ISR does: empty the buffer, load the answer, release SCL
        h.mem.set_bit(PIR1, regs::SSPIF, false);
        assert_eq!(h.mssp.read_buf(&mut h.mem), 0x41);
        h.write_buf(0xC3);
        h.mem.set_bit(SSPCON, regs::CKP, true);
        h.run(200);
        assert_eq!(h.mssp.bus_reads, vec![0xC3]);
        assert!(!h.mem.bit(SSPSTAT, regs::BF));
        assert!(h.mem.bit(SSPSTAT, regs::P_BIT));
        assert!(h.mem.bit(PIR1, regs::SSPIF));
        assert!(h.mem.bit(SSPSTAT, regs::D_NA));
    }

    #[test]
    fn test_i2c_slave_stretch_timeout() {
        let mut h = Harness::new();
        h.mem.set(SSPADD, 0x40);
        h.mem.set(SSPCON, 0x36);
        h.mssp.queue_i2c(I2cTransaction::Read { address: 0x20, count: 1 });
        h.run(2000);
        assert!(h.events.contains(&Event::I2cStretchTimeout));
        assert!(h.mssp.bus_reads.is_empty());
    }

    #[test]
    fn test_i2c_slave_write_transaction() {
        let mut h = Harness::new();
        h.mem.set(SSPADD, 0x40);
        h.mem.set(SSPCON, 0x36);
        h.mssp.queue_i2c(I2cTransaction::Write { address: 0x20, data: vec![0x12] });
        h.run(1 + 90);
        assert_eq!(h.mssp.read_buf(&mut h.mem), 0x40);
        h.run(90);
        assert!(h.mem.bit(SSPSTAT, regs::D_NA));
        assert_eq!(h.mssp.read_buf(&mut h.mem), 0x12);
        assert!(h.mem.bit(SSPSTAT, regs::P_BIT));
    }

    #[test]
    fn test_i2c_slave_ignores_other_address() {
        let mut h = Harness::new();
        h.mem.set(SSPADD, 0x40);
        h.mem.set(SSPCON, 0x36);
        h.mssp.queue_i2c(I2cTransaction::Read { address: 0x21, count: 1 });
        h.run(200);
        assert!(!h.mem.bit(PIR1, regs::SSPIF));
        assert_eq!(h.events, vec![Event::I2cNack { byte: 0x43 }]);
    }
}
