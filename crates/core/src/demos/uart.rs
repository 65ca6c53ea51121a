//! Line echo over the USART at 9600 baud.
//!
//! The main loop prompts, blinks RA0, collects one line, blinks RA1 and
//! sends the line back inside a banner. Collection is non-blocking: each
//! `poll` drains whatever has arrived, so an idle terminal never trips
//! the busy-wait bound.

use crate::config::{PeripheralMode, UartMode};
use crate::drivers::{self, gpio, uart};
use crate::{Firmware, Fuses, InitCtx, MainCtx, Mcu, Port, Result};

pub const PROMPT: &str = "Please write your message and press enter \n";
/// Receive buffer size, terminator included.
pub const BUFFER_LEN: usize = 50;

#[derive(Debug)]
enum Phase {
    Prompt,
    Receiving(Vec<u8>),
}

#[derive(Debug)]
pub struct UartDemo {
    phase: Phase,
}

impl Default for UartDemo {
    fn default() -> Self {
        UartDemo { phase: Phase::Prompt }
    }
}

/// Transmit waiting on TRMT before every byte.
fn send(mcu: &mut Mcu, bytes: &[u8]) -> Result<()> {
    for &b in bytes {
        uart::write_byte_blocking(mcu, b)?;
    }
    Ok(())
}

fn blink(mcu: &mut Mcu, n: u8) -> Result<()> {
    gpio::write_pin(mcu, Port::A, n, true);
    mcu.delay_ms(500)?;
    gpio::write_pin(mcu, Port::A, n, false);
    Ok(())
}

fn echo(mcu: &mut Mcu, message: &[u8]) -> Result<()> {
    send(mcu, b"\r\n")?;
    send(mcu, b"*********************************** \r\n")?;
    send(mcu, b"Your message is: \n")?;
    send(mcu, message)?;
    send(mcu, b"\r\n")?;
    send(mcu, b"********************************** \r\n")
}

impl Firmware for UartDemo {
    fn name(&self) -> &'static str {
        "uart"
    }

    fn fuses(&self) -> Fuses {
        Fuses::crystal(16_000_000)
    }

    fn configure(&mut self, mcu: &mut Mcu, _init: &InitCtx) -> Result<()> {
        drivers::configure(mcu, &PeripheralMode::Uart(UartMode {
            baud: 9600,
            high_speed: true,
            transmit: true,
            receive: true,
            rx_interrupt: false,
            tx_interrupt: false,
        }));
        for n in 0..2 {
            gpio::set_pin_output(mcu, Port::A, n);
            gpio::write_pin(mcu, Port::A, n, false);
        }
        self.phase = Phase::Prompt;
        Ok(())
    }

    fn poll(&mut self, mcu: &mut Mcu, _main: &MainCtx) -> Result<()> {
        match &mut self.phase {
            Phase::Prompt => {
                send(mcu, PROMPT.as_bytes())?;
                blink(mcu, 0)?;
                self.phase = Phase::Receiving(Vec::with_capacity(BUFFER_LEN));
            }
            Phase::Receiving(buf) => {
                let mut done = false;
                while let Some(c) = uart::try_read(mcu) {
                    if c == b'\r' || c == b'\n' {
                        done = true;
                        break;
                    }
                    buf.push(c);
                    if buf.len() >= BUFFER_LEN - 1 {
                        done = true;
                        break;
                    }
                }
                if done {
                    let message = std::mem::take(buf);
                    blink(mcu, 1)?;
                    echo(mcu, &message)?;
                    self.phase = Phase::Prompt;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::SPBRG;
    use crate::SimConfig;

    fn output(mcu: &mut Mcu) -> String {
        String::from_utf8_lossy(&mcu.take_uart_output()).into_owned()
    }

    #[test]
    fn test_prompt_and_echo() {
        let mut fw = UartDemo::default();
        let mut mcu = Mcu::for_firmware(&fw, SimConfig::default());
        mcu.run(&mut fw, 600).unwrap();
        assert_eq!(mcu.mem.get(SPBRG), 103);
        assert_eq!(output(&mut mcu), PROMPT);

        mcu.send_uart(b"hi\r");
        mcu.run(&mut fw, 700).unwrap();
        let out = output(&mut mcu);
        assert!(out.contains("Your message is: \nhi\r\n"), "{out:?}");
        assert!(out.ends_with(PROMPT));
    }

    #[test]
    fn test_long_line_is_split() {
        let mut fw = UartDemo::default();
        let mut mcu = Mcu::for_firmware(&fw, SimConfig::default());
        mcu.run(&mut fw, 600).unwrap();
        mcu.take_uart_output();
        let line = [b'x'; 60];
        mcu.send_uart(&line);
        mcu.run(&mut fw, 700).unwrap();
        let out = output(&mut mcu);
        let expected = format!("Your message is: \n{}\r\n", "x".repeat(BUFFER_LEN - 1));
        assert!(out.contains(&expected), "{out:?}");
    }
}
