//! CCP1 capture of Timer1 on every rising edge of RC2.
//!
//! Timer1 runs from its own 32.768 kHz oscillator. The handler shows the
//! low byte of each capture on PORTB and toggles RC3 whenever the capture
//! reads exactly 9; the main loop mirrors TMR1L on PORTD.

use crate::config::{CaptureEdge, CaptureMode, CcpChannel, PeripheralMode, Timer1Mode, Timer1Source};
use crate::drivers::{self, ccp, gpio};
use crate::regs::{CCP1IF, PIR1, TMR1L};
use crate::{Firmware, InitCtx, IrqCtx, MainCtx, Mcu, Port, Result};

pub const T1_CRYSTAL_HZ: u32 = 32_768;
pub const MARKER_CAPTURE: u16 = 9;

fn on_capture(mcu: &mut Mcu, _irq: &IrqCtx) -> Result<()> {
    if mcu.test_bit(PIR1, CCP1IF) {
        let captured = ccp::read_value(mcu, CcpChannel::Ccp1);
        if captured == MARKER_CAPTURE {
            gpio::toggle_pin(mcu, Port::C, 3);
        }
        gpio::write_port(mcu, Port::B, captured as u8);
        mcu.clear_bit(PIR1, CCP1IF);
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct CaptureDemo;

impl Firmware for CaptureDemo {
    fn name(&self) -> &'static str {
        "capture"
    }

    fn attach_devices(&self, mcu: &mut Mcu) {
        mcu.sim.timer1_crystal_hz = Some(T1_CRYSTAL_HZ);
        mcu.set_pin(Port::C, 2, false);
    }

    fn configure(&mut self, mcu: &mut Mcu, _init: &InitCtx) -> Result<()> {
        gpio::set_pin_output(mcu, Port::C, 3);
        gpio::write_pin(mcu, Port::C, 3, false);
        gpio::set_tris(mcu, Port::B, 0x00);
        gpio::write_port(mcu, Port::B, 0x00);
        gpio::set_tris(mcu, Port::D, 0x00);
        gpio::write_port(mcu, Port::D, 0x00);
        drivers::configure(mcu, &PeripheralMode::Timer1(Timer1Mode {
            source: Timer1Source::External { oscillator: true, synchronize: false },
            prescale: 1,
            interrupt: false,
        }));
        mcu.attach_isr(on_capture);
        drivers::configure(mcu, &PeripheralMode::Capture(CaptureMode {
            channel: CcpChannel::Ccp1,
            edge: CaptureEdge::Rising,
            interrupt: true,
        }));
        drivers::enable_global_interrupts(mcu);
        Ok(())
    }

    fn poll(&mut self, mcu: &mut Mcu, _main: &MainCtx) -> Result<()> {
        let t = mcu.read(TMR1L);
        gpio::write_port(mcu, Port::D, t);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SimConfig, Stimulus};

    fn pulse_at(mcu: &mut Mcu, cycle: u64) {
        mcu.schedule_at(cycle, Stimulus::Pin { port: Port::C, bit: 2, level: true });
        mcu.schedule_at(cycle + 50, Stimulus::Pin { port: Port::C, bit: 2, level: false });
    }

    #[test]
    fn test_capture_shown_on_portb() {
        let mut fw = CaptureDemo;
        let mut mcu = Mcu::for_firmware(&fw, SimConfig::default());
        mcu.run(&mut fw, 1).unwrap();
        // 32.768 kHz against a 1 MHz instruction clock: ~30.5 cycles per count
        let base = mcu.cycle;
        let t0 = mcu.mem.word(TMR1L);
        pulse_at(&mut mcu, base + 2000);
        mcu.run(&mut fw, 3).unwrap();
        let cap = mcu.mem.word(crate::regs::CCPR1L);
        assert!((t0 + 63..=t0 + 68).contains(&cap), "capture {cap}, start {t0}");
        assert_eq!(mcu.port_levels()[Port::B.index()], cap as u8);
        assert!(!mcu.pin(Port::C, 3));
    }

    #[test]
    fn test_marker_capture_toggles_rc3() {
        let mut fw = CaptureDemo;
        let mut mcu = Mcu::for_firmware(&fw, SimConfig::default());
        fw.configure(&mut mcu, &InitCtx::new()).unwrap();
        // Capture right as TMR1 reaches 9
        while mcu.mem.word(TMR1L) < MARKER_CAPTURE {
            mcu.advance(1);
        }
        mcu.set_pin(Port::C, 2, true);
        mcu.advance(10);
        assert!(mcu.pin(Port::C, 3));
        assert_eq!(mcu.port_levels()[Port::B.index()], 9);
    }
}
