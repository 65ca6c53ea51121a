//! Digital I/O helpers.

use crate::regs::{self, bit, INTCON, OPTION_REG};
use crate::{Error, Irq, Mcu, Port, Result, WaitFor};

/// Write a port's TRIS register (1 = input).
pub fn set_tris(mcu: &mut Mcu, port: Port, tris: u8) {
    mcu.write(port.tris_addr(), tris);
}

pub fn set_pin_output(mcu: &mut Mcu, port: Port, n: u8) {
    mcu.clear_bit(port.tris_addr(), n);
}

pub fn set_pin_input(mcu: &mut Mcu, port: Port, n: u8) {
    mcu.set_bit(port.tris_addr(), n);
}

pub fn write_pin(mcu: &mut Mcu, port: Port, n: u8, high: bool) {
    mcu.write_bit(port.data_addr(), n, high);
}

pub fn read_pin(mcu: &mut Mcu, port: Port, n: u8) -> bool {
    mcu.test_bit(port.data_addr(), n)
}

pub fn toggle_pin(mcu: &mut Mcu, port: Port, n: u8) {
    let v = mcu.read(port.data_addr());
    mcu.write(port.data_addr(), v ^ bit(n));
}

pub fn write_port(mcu: &mut Mcu, port: Port, value: u8) {
    mcu.write(port.data_addr(), value);
}

pub fn read_port(mcu: &mut Mcu, port: Port) -> u8 {
    mcu.read(port.data_addr())
}

/// PORTB weak pull-ups (nRBPU = 0).
pub fn enable_pullups(mcu: &mut Mcu) {
    mcu.clear_bit(OPTION_REG, regs::NRBPU);
}

/// RB0/INT as an input, edge selected by INTEDG, INTE set.
pub fn init_external_interrupt(mcu: &mut Mcu, falling: bool) {
    mcu.set_bit(regs::TRISB, 0);
    mcu.write_bit(OPTION_REG, regs::INTEDG, !falling);
    super::enable_irq(mcu, Irq::External);
}

/// RB4..RB7 change interrupt. Reads PORTB first to end any stale mismatch.
pub fn init_change_interrupt(mcu: &mut Mcu) {
    let _ = mcu.read(regs::PORTB);
    mcu.clear_bit(INTCON, regs::RBIF);
    mcu.set_bit(INTCON, regs::RBIE);
}

/// Busy-wait until a pin reads `level`.
pub fn wait_for_level(mcu: &mut Mcu, port: Port, n: u8, level: bool) -> Result<()> {
    mcu.wait_until(WaitFor::PinLevel, |m| read_pin(m, port, n) == level)
}

/// Like [`wait_for_level`], but gives up quietly after `ms` and reports
/// whether the level was reached.
pub fn wait_for_level_ms(mcu: &mut Mcu, port: Port, n: u8, level: bool, ms: u32) -> Result<bool> {
    let saved = mcu.sim.wait_budget_cycles;
    mcu.sim.wait_budget_cycles = ms as u64 * mcu.fuses.cycles_per_ms();
    let r = wait_for_level(mcu, port, n, level);
    mcu.sim.wait_budget_cycles = saved;
    match r {
        Ok(()) => Ok(true),
        Err(Error::Timeout { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_helpers() {
        let mut mcu = Mcu::default();
        set_tris(&mut mcu, Port::D, 0x00);
        write_port(&mut mcu, Port::D, 0x0F);
        toggle_pin(&mut mcu, Port::D, 0);
        write_pin(&mut mcu, Port::D, 7, true);
        assert_eq!(mcu.port_levels()[Port::D.index()], 0x8E);
        assert!(read_pin(&mut mcu, Port::D, 7));
        assert!(!read_pin(&mut mcu, Port::D, 0));
    }

    #[test]
    fn test_pullups() {
        let mut mcu = Mcu::default();
        assert_eq!(read_port(&mut mcu, Port::B), 0x00);
        enable_pullups(&mut mcu);
        assert_eq!(read_port(&mut mcu, Port::B), 0xFF);
        mcu.set_pin(Port::B, 3, false);
        assert_eq!(read_port(&mut mcu, Port::B), 0xF7);
    }

    #[test]
    fn test_external_interrupt_edge() {
        let mut mcu = Mcu::default();
        init_external_interrupt(&mut mcu, false);
        assert!(mcu.mem.bit(INTCON, regs::INTE));
        mcu.set_pin(Port::B, 0, true);
        mcu.advance(2);
        assert!(mcu.mem.bit(INTCON, regs::INTF));
    }

    #[test]
    fn test_wait_for_level_ms() {
        let mut mcu = Mcu::default();
        mcu.write(regs::ADCON1, 0x06); // PORTA digital
        mcu.schedule_in_ms(5, crate::Stimulus::Pin { port: Port::A, bit: 2, level: true });
        assert_eq!(wait_for_level_ms(&mut mcu, Port::A, 2, true, 3), Ok(false));
        assert_eq!(wait_for_level_ms(&mut mcu, Port::A, 2, true, 3), Ok(true));
        assert_eq!(mcu.sim.wait_budget_cycles, crate::SimConfig::default().wait_budget_cycles);
    }
}
