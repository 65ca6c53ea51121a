//! I2C on the MSSP: master primitives and the slave-side service routine.
//!
//! Master: every primitive first waits for the bus to go idle, which on
//! this part means R_nW clear (no byte shifting out) and SEN, RSEN, PEN,
//! RCEN and ACKEN all clear.

use crate::config::I2cSlaveMode;
use crate::regs::{self, bit, PIR1, SSPADD, SSPBUF, SSPCON, SSPCON2, SSPSTAT, TRISC};
use crate::{Irq, Mcu, Result, WaitFor};

/// SSPCON2 bits that start a bus sequence.
const SEQUENCE_BITS: u8 = 0x1F;

/// SSPADD reload for `bus_hz` at the current crystal.
pub fn master_divisor(fosc_hz: u32, bus_hz: u32) -> u8 {
    let div = fosc_hz as u64 / (4 * bus_hz.max(1) as u64);
    div.saturating_sub(1).min(255) as u8
}

/// Master mode, SCL = Fosc / (4 * (SSPADD + 1)).
pub fn init_master(mcu: &mut Mcu, bus_hz: u32) {
    mcu.set_bit(TRISC, 3);
    mcu.set_bit(TRISC, 4);
    mcu.write(SSPCON, 0x28);
    mcu.write(SSPCON2, 0x00);
    mcu.write(SSPSTAT, 0x00);
    let sspadd = master_divisor(mcu.fuses.fosc_hz, bus_hz);
    mcu.write(SSPADD, sspadd);
}

pub fn wait_idle(mcu: &mut Mcu) -> Result<()> {
    mcu.wait_until(WaitFor::I2cIdle, |m| {
        !m.test_bit(SSPSTAT, regs::R_NW) && m.read(SSPCON2) & SEQUENCE_BITS == 0
    })
}

pub fn start(mcu: &mut Mcu) -> Result<()> {
    wait_idle(mcu)?;
    mcu.set_bit(SSPCON2, regs::SEN);
    Ok(())
}

pub fn restart(mcu: &mut Mcu) -> Result<()> {
    wait_idle(mcu)?;
    mcu.set_bit(SSPCON2, regs::RSEN);
    Ok(())
}

pub fn stop(mcu: &mut Mcu) -> Result<()> {
    wait_idle(mcu)?;
    mcu.set_bit(SSPCON2, regs::PEN);
    Ok(())
}

/// Shift out one byte; true when the receiver acknowledged it.
pub fn write(mcu: &mut Mcu, byte: u8) -> Result<bool> {
    wait_idle(mcu)?;
    mcu.write(SSPBUF, byte);
    wait_idle(mcu)?;
    Ok(!mcu.test_bit(SSPCON2, regs::ACKSTAT))
}

/// Clock in one byte. The caller follows with [`ack`] or [`nack`].
pub fn read(mcu: &mut Mcu) -> Result<u8> {
    wait_idle(mcu)?;
    mcu.set_bit(SSPCON2, regs::RCEN);
    wait_idle(mcu)?;
    Ok(mcu.read(SSPBUF))
}

fn acknowledge(mcu: &mut Mcu, nack: bool) -> Result<()> {
    wait_idle(mcu)?;
    mcu.write_bit(SSPCON2, regs::ACKDT, nack);
    mcu.set_bit(SSPCON2, regs::ACKEN);
    Ok(())
}

pub fn ack(mcu: &mut Mcu) -> Result<()> {
    acknowledge(mcu, false)
}

/// Not-acknowledge: ends a master read.
pub fn nack(mcu: &mut Mcu) -> Result<()> {
    acknowledge(mcu, true)
}

/// START, address with R/W = 1, one byte, NACK, STOP. Returns `None`
/// when nobody acknowledged the address.
pub fn read_register(mcu: &mut Mcu, address: u8) -> Result<Option<u8>> {
    start(mcu)?;
    if !write(mcu, (address << 1) | 1)? {
        stop(mcu)?;
        return Ok(None);
    }
    let v = read(mcu)?;
    nack(mcu)?;
    stop(mcu)?;
    Ok(Some(v))
}

/// Slave mode with a 7-bit address (SSPADD holds it in bits 7:1).
pub fn init_slave(mcu: &mut Mcu, mode: &I2cSlaveMode) {
    mcu.set_bit(TRISC, 3);
    mcu.set_bit(TRISC, 4);
    mcu.write(SSPADD, mode.address);
    mcu.write(SSPSTAT, bit(regs::SMP));
    mcu.write(SSPCON, 0x36);
    mcu.write(SSPCON2, if mode.stretch_on_receive { bit(regs::SEN) } else { 0 });
    if mode.interrupt {
        super::enable_irq(mcu, Irq::Ssp);
    }
}

/// Service one SSPIF in slave mode.
///
/// SSPBUF is always read so a received byte can never leave BF set. On a
/// read request (R_nW set) `reply` supplies the byte to shift out; the
/// clock is then released and the routine waits until the master has
/// clocked it out. Returns the data byte when the master wrote one.
pub fn slave_service(mcu: &mut Mcu, reply: impl FnOnce(&mut Mcu) -> u8) -> Result<Option<u8>> {
    let stat = mcu.read(SSPSTAT);
    let data = stat & bit(regs::D_NA) != 0;
    let reading = stat & bit(regs::R_NW) != 0;
    let full = stat & bit(regs::BF) != 0;
    let byte = mcu.read(SSPBUF);
    let mut received = None;
    if reading {
        let v = reply(mcu);
        mcu.write(SSPBUF, v);
        mcu.set_bit(SSPCON, regs::CKP);
        mcu.wait_until(WaitFor::I2cSlaveTransmit, |m| !m.test_bit(SSPSTAT, regs::BF))?;
    } else if data && full {
        received = Some(byte);
    }
    mcu.set_bit(SSPCON, regs::CKP);
    mcu.clear_bit(PIR1, regs::SSPIF);
    Ok(received)
}
