//! Waveform generator on an R-2R ladder at PORTB. RC0 low selects the
//! sine table, high the triangle.

use crate::drivers::gpio;
use crate::waveform::{WaveIndex, SINE_TABLE, TRIANGLE_TABLE};
use crate::{Firmware, InitCtx, MainCtx, Mcu, Port, Result};

/// Delay between samples; one period is 64 samples.
pub const SAMPLE_US: u32 = 390;

#[derive(Debug, Default)]
pub struct DacDemo {
    index: WaveIndex,
}

impl Firmware for DacDemo {
    fn name(&self) -> &'static str {
        "dac"
    }

    fn configure(&mut self, mcu: &mut Mcu, _init: &InitCtx) -> Result<()> {
        gpio::set_tris(mcu, Port::B, 0x00);
        gpio::set_pin_input(mcu, Port::C, 0);
        self.index = WaveIndex::default();
        Ok(())
    }

    fn poll(&mut self, mcu: &mut Mcu, _main: &MainCtx) -> Result<()> {
        let table = if gpio::read_pin(mcu, Port::C, 0) { &TRIANGLE_TABLE } else { &SINE_TABLE };
        let sample = self.index.advance(table);
        gpio::write_port(mcu, Port::B, sample);
        mcu.delay_us(SAMPLE_US)
    }
}
