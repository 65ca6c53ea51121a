//! Main loop blinking RD0..RD3 and reporting the AN0 voltage over the
//! USART, preempted by a button on RB0/INT.
//!
//! The handler blanks the LEDs, shows RD4 for half a second and sends a
//! notice. It deliberately does its work inline, delay included, so a
//! press stretches whatever the main loop was doing.

use crate::config::{AdcClock, AdcMode, PeripheralMode, UartMode};
use crate::drivers::{self, adc, gpio, uart};
use crate::regs::{INTCON, INTF};
use crate::{Firmware, Fuses, InitCtx, IrqCtx, MainCtx, Mcu, Port, Result};

pub const BLINK_MS: u32 = 2000;
pub const NOTICE: &str = "Interrupt executed\r\n";

/// Transmit one byte at a time, each drained from the shift register.
fn send(mcu: &mut Mcu, text: &str) -> Result<()> {
    for b in text.bytes() {
        uart::write_byte_blocking(mcu, b)?;
    }
    Ok(())
}

/// "Voltage: x.xx V" against a 5 V reference.
pub fn voltage_line(code: u16) -> String {
    let volts = code as f64 * 5.0 / 1023.0;
    format!("Voltage: {:.2} V\r\n", volts)
}

fn on_button(mcu: &mut Mcu, _irq: &IrqCtx) -> Result<()> {
    if !mcu.test_bit(INTCON, INTF) {
        return Ok(());
    }
    gpio::write_port(mcu, Port::D, 0x00);
    gpio::write_pin(mcu, Port::D, 4, true);
    mcu.delay_ms(500)?;
    gpio::write_pin(mcu, Port::D, 4, false);
    send(mcu, NOTICE)?;
    mcu.clear_bit(INTCON, INTF);
    Ok(())
}

#[derive(Debug, Default)]
pub struct InterruptDemo;

impl Firmware for InterruptDemo {
    fn name(&self) -> &'static str {
        "interrupt"
    }

    fn fuses(&self) -> Fuses {
        Fuses::crystal(20_000_000)
    }

    fn attach_devices(&self, mcu: &mut Mcu) {
        // Button pulls RB0 high when pressed
        mcu.set_pin(Port::B, 0, false);
    }

    fn configure(&mut self, mcu: &mut Mcu, _init: &InitCtx) -> Result<()> {
        gpio::set_tris(mcu, Port::D, 0x00);
        gpio::set_tris(mcu, Port::A, 0x01);
        gpio::set_tris(mcu, Port::B, 0x01);
        drivers::configure(mcu, &PeripheralMode::Adc(AdcMode {
            channel: 0,
            clock: AdcClock::Fosc8,
            right_justified: true,
            port_config: 0x0E,
            interrupt: false,
        }));
        drivers::configure(mcu, &PeripheralMode::Uart(UartMode {
            baud: 9600,
            high_speed: true,
            transmit: true,
            receive: false,
            rx_interrupt: false,
            tx_interrupt: false,
        }));
        mcu.attach_isr(on_button);
        drivers::configure(mcu, &PeripheralMode::ExternalInterrupt { falling: false });
        mcu.set_bit(INTCON, crate::regs::PEIE);
        drivers::enable_global_interrupts(mcu);
        gpio::write_port(mcu, Port::D, 0x00);
        Ok(())
    }

    fn poll(&mut self, mcu: &mut Mcu, _main: &MainCtx) -> Result<()> {
        gpio::write_port(mcu, Port::D, 0x0F);
        mcu.delay_ms(BLINK_MS)?;
        gpio::write_port(mcu, Port::D, 0x00);
        mcu.delay_ms(BLINK_MS)?;
        let code = adc::convert(mcu)?;
        send(mcu, &voltage_line(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::Access;
    use crate::regs::{ADCON0, ADCON1, PORTD, SPBRG};
    use crate::{Event, SimConfig, Stimulus};

    #[test]
    fn test_voltage_line() {
        assert_eq!(voltage_line(0), "Voltage: 0.00 V\r\n");
        assert_eq!(voltage_line(512), "Voltage: 2.50 V\r\n");
        assert_eq!(voltage_line(1023), "Voltage: 5.00 V\r\n");
    }

    #[test]
    fn test_blink_and_report() {
        let mut fw = InterruptDemo;
        let mut mcu = Mcu::for_firmware(&fw, SimConfig::default());
        mcu.debugger.watch(PORTD, Access::Write);
        mcu.set_analog_mv(0, 3300);
        // One pass of the main loop
        let report = mcu.run(&mut fw, 1).unwrap();
        assert_eq!(report.polls, 1);
        assert!(report.cycles >= 4000 * mcu.fuses.cycles_per_ms());
        assert_eq!(mcu.mem.get(ADCON0), 0x41);
        assert_eq!(mcu.mem.get(ADCON1), 0x8E);
        assert_eq!(mcu.mem.get(SPBRG), 129);
        let writes: Vec<u8> = mcu
            .events
            .iter()
            .filter_map(|e| match e.event {
                Event::Watchpoint { new, write: true, .. } => Some(new),
                _ => None,
            })
            .collect();
        assert_eq!(writes, vec![0x00, 0x0F, 0x00]);
        let out = String::from_utf8(mcu.take_uart_output()).unwrap();
        assert_eq!(out, "Voltage: 3.30 V\r\n");
    }

    #[test]
    fn test_button_preempts_main_loop() {
        let mut fw = InterruptDemo;
        let mut mcu = Mcu::for_firmware(&fw, SimConfig::default());
        mcu.schedule_in_ms(500, Stimulus::Pin { port: Port::B, bit: 0, level: true });
        let i = mcu.debugger.watch(PORTD, Access::Write);
        mcu.debugger.watches[i].equals = Some(0x10);
        let report = mcu.run(&mut fw, 1).unwrap();
        assert_eq!(report.interrupts, 1);
        // The handler's half second delays the main loop
        assert!(report.cycles >= 4500 * mcu.fuses.cycles_per_ms());
        assert_eq!(mcu.debugger.watches[i].hits, 1);
        assert!(!mcu.pin(Port::D, 4));
        let out = String::from_utf8(mcu.take_uart_output()).unwrap();
        assert!(out.starts_with(NOTICE), "{out:?}");
        assert!(out.ends_with(" V\r\n"));
        assert!(mcu.events.count(|e| matches!(e, Event::LongIsr { .. })) > 0);
    }
}
