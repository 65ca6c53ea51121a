//! Asynchronous USART driver (8N1).
//!
//! Transmit waits on TXIF (TXREG empty) per byte; [`flush`] additionally
//! waits for TRMT so the last stop bit is on the wire. Receive recovers
//! from an overrun by toggling CREN, which is the only way to restart the
//! receiver once OERR is set.

use crate::config::UartMode;
use crate::peripherals::Usart;
use crate::regs::{self, bit, PIR1, RCREG, RCSTA, SPBRG, TRISC, TXREG, TXSTA};
use crate::{Event, Irq, Mcu, Result, WaitFor};

pub fn init(mcu: &mut Mcu, mode: &UartMode) {
    let spbrg = Usart::spbrg_for(mcu.fuses.fosc_hz, mode.baud, mode.high_speed);
    mcu.write(SPBRG, spbrg);
    mcu.clear_bit(TRISC, 6);
    mcu.set_bit(TRISC, 7);
    let mut txsta = 0;
    if mode.high_speed {
        txsta |= bit(regs::BRGH);
    }
    if mode.transmit {
        txsta |= bit(regs::TXEN);
    }
    mcu.write(TXSTA, txsta);
    let mut rcsta = bit(regs::SPEN);
    if mode.receive {
        rcsta |= bit(regs::CREN);
    }
    mcu.write(RCSTA, rcsta);
    if mode.rx_interrupt {
        super::enable_irq(mcu, Irq::UartRx);
    }
    if mode.tx_interrupt {
        super::enable_irq(mcu, Irq::UartTx);
    }
}

/// Wait for TXREG to empty, then load it.
pub fn write_byte(mcu: &mut Mcu, byte: u8) -> Result<()> {
    mcu.wait_until(WaitFor::UartTransmitEmpty, |m| m.test_bit(PIR1, regs::TXIF))?;
    mcu.write(TXREG, byte);
    Ok(())
}

pub fn write_bytes(mcu: &mut Mcu, bytes: &[u8]) -> Result<()> {
    for &b in bytes {
        write_byte(mcu, b)?;
    }
    Ok(())
}

pub fn write_str(mcu: &mut Mcu, s: &str) -> Result<()> {
    write_bytes(mcu, s.as_bytes())
}

/// Wait until the shift register is empty.
pub fn flush(mcu: &mut Mcu) -> Result<()> {
    mcu.wait_until(WaitFor::UartTransmitShiftEmpty, |m| m.test_bit(TXSTA, regs::TRMT))
}

/// Send one byte and wait for it to leave the shift register.
pub fn write_byte_blocking(mcu: &mut Mcu, byte: u8) -> Result<()> {
    write_byte(mcu, byte)?;
    flush(mcu)
}

/// Restart the receiver after an overrun.
fn recover_overrun(mcu: &mut Mcu) {
    if mcu.test_bit(RCSTA, regs::OERR) {
        mcu.clear_bit(RCSTA, regs::CREN);
        mcu.set_bit(RCSTA, regs::CREN);
        mcu.log(Event::LostUpdate { what: "UART receive FIFO" });
    }
}

/// Blocking receive.
pub fn read_byte(mcu: &mut Mcu) -> Result<u8> {
    recover_overrun(mcu);
    mcu.wait_until(WaitFor::UartReceive, |m| m.test_bit(PIR1, regs::RCIF))?;
    Ok(mcu.read(RCREG))
}

/// Non-blocking receive.
pub fn try_read(mcu: &mut Mcu) -> Option<u8> {
    recover_overrun(mcu);
    if mcu.test_bit(PIR1, regs::RCIF) {
        Some(mcu.read(RCREG))
    } else {
        None
    }
}
