//! Error type shared by the simulator, drivers and demos.

use crate::peripherals::Irq;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Hardware condition a bounded busy-wait is polling for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitFor {
    AdcConversion,
    UartTransmitEmpty,
    UartTransmitShiftEmpty,
    UartReceive,
    SpiBufferFull,
    I2cIdle,
    I2cSlaveTransmit,
    EepromWrite,
    PinLevel,
}

impl fmt::Display for WaitFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WaitFor::AdcConversion => "ADC conversion (GO/DONE)",
            WaitFor::UartTransmitEmpty => "UART TXREG empty (TXIF)",
            WaitFor::UartTransmitShiftEmpty => "UART shift register empty (TRMT)",
            WaitFor::UartReceive => "UART receive (RCIF)",
            WaitFor::SpiBufferFull => "SPI buffer full (BF)",
            WaitFor::I2cIdle => "I2C bus idle",
            WaitFor::I2cSlaveTransmit => "I2C slave shift-out (BF)",
            WaitFor::EepromWrite => "EEPROM write (WR)",
            WaitFor::PinLevel => "pin level",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("timed out after {cycles} cycles waiting for {what}")]
    Timeout { what: WaitFor, cycles: u64 },

    #[error("interrupt flag {0} still set when the handler returned")]
    UnacknowledgedInterrupt(Irq),

    #[error("watchdog timer expired at cycle {cycle}")]
    WatchdogReset { cycle: u64 },

    #[error("unknown demo {0:?}")]
    UnknownDemo(String),

    #[error("save state: {0}")]
    SaveState(String),

    #[error("intel hex: {0}")]
    Hex(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = Error::Timeout { what: WaitFor::EepromWrite, cycles: 42 };
        assert_eq!(e.to_string(), "timed out after 42 cycles waiting for EEPROM write (WR)");
        let e = Error::UnacknowledgedInterrupt(Irq::Timer2);
        assert!(e.to_string().contains("TMR2IF"));
    }
}
