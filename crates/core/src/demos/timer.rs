//! Timer2 1 ms tick driving four LEDs at different rates while the main
//! loop reports over the USART once a second.

use crate::config::{PeripheralMode, Timer2Mode, UartMode};
use crate::drivers::{self, gpio, uart};
use crate::regs::{PIR1, TMR2IF};
use crate::{Firmware, Fuses, InitCtx, InterruptHandler, IrqCtx, MainCtx, Mcu, Port, Result};

/// Ticks between toggles of RB0..RB3.
pub const TOGGLE_TICKS: [u16; 4] = [100, 200, 300, 400];

/// Per-LED tick counters, owned by the handler.
#[derive(Debug, Default)]
struct TickHandler {
    counts: [u16; 4],
}

impl InterruptHandler for TickHandler {
    fn service(&mut self, mcu: &mut Mcu, _irq: &IrqCtx) -> Result<()> {
        if !mcu.test_bit(PIR1, TMR2IF) {
            return Ok(());
        }
        mcu.clear_bit(PIR1, TMR2IF);
        for (n, (count, limit)) in self.counts.iter_mut().zip(TOGGLE_TICKS).enumerate() {
            *count += 1;
            if *count >= limit {
                gpio::toggle_pin(mcu, Port::B, n as u8);
                *count = 0;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct TimerDemo {
    loops: u32,
}

impl Firmware for TimerDemo {
    fn name(&self) -> &'static str {
        "timer"
    }

    fn fuses(&self) -> Fuses {
        Fuses::crystal(8_000_000)
    }

    fn configure(&mut self, mcu: &mut Mcu, _init: &InitCtx) -> Result<()> {
        for n in 0..4 {
            gpio::set_pin_output(mcu, Port::B, n);
            gpio::write_pin(mcu, Port::B, n, false);
        }
        mcu.attach_isr(TickHandler::default());
        drivers::configure(mcu, &PeripheralMode::Timer2(Timer2Mode {
            prescale: 16,
            postscale: 1,
            period: 124,
            interrupt: true,
        }));
        drivers::enable_global_interrupts(mcu);
        drivers::configure(mcu, &PeripheralMode::Uart(UartMode {
            baud: 9600,
            high_speed: true,
            transmit: true,
            receive: false,
            rx_interrupt: false,
            tx_interrupt: false,
        }));
        self.loops = 0;
        Ok(())
    }

    fn poll(&mut self, mcu: &mut Mcu, _main: &MainCtx) -> Result<()> {
        self.loops += 1;
        uart::write_str(mcu, &format!("LOOP EXECUTE {}\r\n", self.loops))?;
        mcu.delay_ms(1000)
    }
}
