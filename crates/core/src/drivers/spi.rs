//! SPI on the MSSP.

use crate::config::{SpiClock, SpiMode};
use crate::regs::{self, bit, ADCON1, SSPBUF, SSPCON, SSPSTAT, TRISA, TRISC};
use crate::{Irq, Mcu, Result, WaitFor};

fn sspcon(mode: &SpiMode, sspm: u8) -> u8 {
    let mut v = bit(regs::SSPEN) | sspm;
    if mode.clock_idle_high {
        v |= bit(regs::CKP);
    }
    v
}

/// SDO (RC5) and SCK (RC3) out, SDI (RC4) in.
pub fn init_master(mcu: &mut Mcu, clock: SpiClock, mode: &SpiMode) {
    mcu.clear_bit(TRISC, 5);
    mcu.set_bit(TRISC, 4);
    mcu.clear_bit(TRISC, 3);
    let mut stat = 0;
    if mode.sample_at_end {
        stat |= bit(regs::SMP);
    }
    if mode.transmit_on_active_edge {
        stat |= bit(regs::CKE);
    }
    mcu.write(SSPSTAT, stat);
    let sspm = match clock {
        SpiClock::Fosc4 => 0b0000,
        SpiClock::Fosc16 => 0b0001,
        SpiClock::Fosc64 => 0b0010,
        SpiClock::Timer2 => 0b0011,
    };
    mcu.write(SSPCON, sspcon(mode, sspm));
    if mode.interrupt {
        super::enable_irq(mcu, Irq::Ssp);
    }
}

/// SCK (RC3) becomes an input. With `slave_select`, RA5 is made a digital
/// input (PCFG = 0100 keeps AN0, AN1 and AN3 analog).
pub fn init_slave(mcu: &mut Mcu, slave_select: bool, mode: &SpiMode) {
    mcu.clear_bit(TRISC, 5);
    mcu.set_bit(TRISC, 4);
    mcu.set_bit(TRISC, 3);
    if slave_select {
        let con1 = mcu.read(ADCON1);
        mcu.write(ADCON1, (con1 & 0xF0) | 0b0100);
        mcu.set_bit(TRISA, 5);
    }
    // SMP must stay clear in slave mode
    mcu.write(SSPSTAT, if mode.transmit_on_active_edge { bit(regs::CKE) } else { 0 });
    mcu.write(SSPCON, sspcon(mode, if slave_select { 0b0100 } else { 0b0101 }));
    if mode.interrupt {
        super::enable_irq(mcu, Irq::Ssp);
    }
}

/// Load SSPBUF. In master mode this starts the transfer.
pub fn write(mcu: &mut Mcu, byte: u8) {
    mcu.write(SSPBUF, byte);
}

pub fn wait_full(mcu: &mut Mcu) -> Result<()> {
    mcu.wait_until(WaitFor::SpiBufferFull, |m| m.test_bit(SSPSTAT, regs::BF))
}

/// Read SSPBUF, clearing BF.
pub fn read(mcu: &mut Mcu) -> u8 {
    mcu.read(SSPBUF)
}

/// Full-duplex exchange of one byte (master).
pub fn transfer(mcu: &mut Mcu, byte: u8) -> Result<u8> {
    write(mcu, byte);
    wait_full(mcu)?;
    Ok(read(mcu))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripherals::EchoDevice;
    use crate::{Event, Port, Stimulus};

    fn mode() -> SpiMode {
        SpiMode {
            clock_idle_high: false,
            transmit_on_active_edge: false,
            sample_at_end: false,
            interrupt: false,
        }
    }

    #[test]
    fn test_master_transfer_through_echo() {
        let mut mcu = Mcu::default();
        mcu.attach_spi_device(EchoDevice::default());
        init_master(&mut mcu, SpiClock::Fosc64, &mode());
        assert_eq!(mcu.mem.get(SSPCON), 0x22);
        assert_eq!(transfer(&mut mcu, 0x12), Ok(0x00));
        assert_eq!(transfer(&mut mcu, 0x34), Ok(0x12));
        assert_eq!(mcu.mssp.spi_log, vec![0x12, 0x34]);
    }

    #[test]
    fn test_write_collision_logged() {
        let mut mcu = Mcu::default();
        init_master(&mut mcu, SpiClock::Fosc64, &mode());
        write(&mut mcu, 1);
        write(&mut mcu, 2);
        assert!(mcu.mem.bit(SSPCON, regs::WCOL));
        assert_eq!(mcu.events.count(|e| matches!(e, Event::WriteCollision)), 1);
    }

    #[test]
    fn test_slave_with_select() {
        let mut mcu = Mcu::default();
        init_slave(&mut mcu, true, &mode());
        assert_eq!(mcu.mem.get(SSPCON) & 0x0F, 0b0100);
        assert_eq!(mcu.mem.get(ADCON1) & 0x0F, 0b0100);
        mcu.set_pin(Port::A, 5, true);
        mcu.apply(Stimulus::SpiFromMaster(0x99));
        mcu.delay_ms(1).unwrap();
        assert_eq!(mcu.events.count(|e| matches!(e, Event::SpiSlaveNotSelected { byte: 0x99 })), 1);
        mcu.set_pin(Port::A, 5, false);
        mcu.apply(Stimulus::SpiFromMaster(0x5A));
        wait_full(&mut mcu).unwrap();
        assert_eq!(read(&mut mcu), 0x5A);
    }
}
