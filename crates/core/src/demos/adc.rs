//! Four-LED bar graph of the voltage on AN0.

use crate::config::{AdcClock, AdcMode, PeripheralMode};
use crate::drivers::{self, adc, gpio};
use crate::{Firmware, InitCtx, MainCtx, Mcu, Port, Result};

/// An LED lights when the 10-bit reading is strictly above its threshold.
pub const THRESHOLDS: [u16; 4] = [250, 500, 750, 1000];

/// RB0..RB3 pattern for a conversion result.
pub fn led_pattern(code: u16) -> u8 {
    THRESHOLDS
        .iter()
        .enumerate()
        .filter(|(_, &t)| code > t)
        .fold(0, |acc, (i, _)| acc | 1 << i)
}

#[derive(Debug, Default)]
pub struct AdcDemo;

impl Firmware for AdcDemo {
    fn name(&self) -> &'static str {
        "adc"
    }

    fn configure(&mut self, mcu: &mut Mcu, _init: &InitCtx) -> Result<()> {
        for n in 0..4 {
            gpio::set_pin_output(mcu, Port::B, n);
            gpio::write_pin(mcu, Port::B, n, false);
        }
        drivers::configure(mcu, &PeripheralMode::Adc(AdcMode {
            channel: 0,
            clock: AdcClock::Fosc8,
            right_justified: true,
            port_config: 0,
            interrupt: false,
        }));
        Ok(())
    }

    fn poll(&mut self, mcu: &mut Mcu, _main: &MainCtx) -> Result<()> {
        let code = adc::convert(mcu)?;
        let leds = led_pattern(code);
        let portb = gpio::read_port(mcu, Port::B);
        gpio::write_port(mcu, Port::B, (portb & 0xF0) | leds);
        mcu.delay_ms(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimConfig;

    #[test]
    fn test_led_pattern_thresholds() {
        assert_eq!(led_pattern(0), 0b0000);
        assert_eq!(led_pattern(250), 0b0000);
        assert_eq!(led_pattern(251), 0b0001);
        assert_eq!(led_pattern(600), 0b0011);
        assert_eq!(led_pattern(751), 0b0111);
        assert_eq!(led_pattern(1000), 0b0111);
        assert_eq!(led_pattern(1023), 0b1111);
    }

    #[test]
    fn test_bar_graph_follows_input() {
        let mut fw = AdcDemo;
        let mut mcu = Mcu::for_firmware(&fw, SimConfig::default());
        mcu.set_analog(0, 600);
        mcu.run(&mut fw, 10).unwrap();
        assert_eq!(mcu.port_levels()[Port::B.index()] & 0x0F, 0b0011);

        mcu.set_analog(0, 1023);
        mcu.run(&mut fw, 1100).unwrap();
        assert_eq!(mcu.port_levels()[Port::B.index()] & 0x0F, 0b1111);
    }
}
