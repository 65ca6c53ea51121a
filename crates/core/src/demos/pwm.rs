//! RGB LED fade: CCP1 ramps from off to full, then CCP2 does the same,
//! one duty step every 10 ms. Timer2 runs 1:1 with PR2 = 255.

use crate::config::{CcpChannel, PeripheralMode, PwmMode, Timer2Mode};
use crate::drivers::{self, ccp, gpio};
use crate::{Firmware, InitCtx, MainCtx, Mcu, Port, Result};

pub const STEP_MS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampPosition {
    pub channel: CcpChannel,
    pub duty: u8,
}

impl Default for RampPosition {
    fn default() -> Self {
        RampPosition { channel: CcpChannel::Ccp1, duty: 0 }
    }
}

impl RampPosition {
    fn next(self) -> Self {
        match (self.duty, self.channel) {
            (255, CcpChannel::Ccp1) => RampPosition { channel: CcpChannel::Ccp2, duty: 0 },
            (255, CcpChannel::Ccp2) => RampPosition::default(),
            (d, channel) => RampPosition { channel, duty: d + 1 },
        }
    }
}

#[derive(Debug, Default)]
pub struct PwmDemo {
    pos: RampPosition,
}

impl PwmDemo {
    pub fn position(&self) -> RampPosition {
        self.pos
    }
}

impl Firmware for PwmDemo {
    fn name(&self) -> &'static str {
        "pwm"
    }

    fn configure(&mut self, mcu: &mut Mcu, _init: &InitCtx) -> Result<()> {
        for n in 0..3 {
            gpio::set_pin_output(mcu, Port::C, n);
        }
        drivers::configure(mcu, &PeripheralMode::Timer2(Timer2Mode {
            prescale: 1,
            postscale: 1,
            period: 255,
            interrupt: false,
        }));
        drivers::configure(mcu, &PeripheralMode::Pwm(PwmMode { channel: CcpChannel::Ccp1, duty: 0 }));
        drivers::configure(mcu, &PeripheralMode::Pwm(PwmMode { channel: CcpChannel::Ccp2, duty: 0 }));
        self.pos = RampPosition::default();
        Ok(())
    }

    fn poll(&mut self, mcu: &mut Mcu, _main: &MainCtx) -> Result<()> {
        let (red, green) = match self.pos.channel {
            CcpChannel::Ccp1 => (self.pos.duty, 0),
            CcpChannel::Ccp2 => (0, self.pos.duty),
        };
        ccp::set_duty(mcu, CcpChannel::Ccp1, red);
        ccp::set_duty(mcu, CcpChannel::Ccp2, green);
        mcu.delay_ms(STEP_MS)?;
        self.pos = self.pos.next();
        Ok(())
    }
}
