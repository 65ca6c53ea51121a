//! Configuration records.
//!
//! - [`Fuses`]: what the `#pragma config` words and `_XTAL_FREQ` fix for
//!   a firmware image
//! - [`SimConfig`]: knobs of the simulated board (timeouts, write times,
//!   external bus clocks)
//! - [`PeripheralMode`]: one parameterised record per peripheral mode,
//!   applied by [`crate::drivers::configure`]

use serde::{Deserialize, Serialize};

/// Oscillator selection (FOSC1:FOSC0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Oscillator {
    Lp,
    Xt,
    Hs,
    Rc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fuses {
    pub oscillator: Oscillator,
    /// Crystal frequency in Hz
    pub fosc_hz: u32,
    /// WDTE
    pub wdt_enabled: bool,
    /// PWRTE (timing not modelled, recorded for dumps)
    pub power_up_timer: bool,
    /// BOREN (timing not modelled)
    pub brown_out_reset: bool,
    /// LVP
    pub low_voltage_programming: bool,
}

impl Fuses {
    /// The configuration word every example uses: XT or HS, WDT off,
    /// PWRT off, BOR on, LVP off.
    pub fn crystal(fosc_hz: u32) -> Self {
        Fuses {
            oscillator: if fosc_hz > 4_000_000 { Oscillator::Hs } else { Oscillator::Xt },
            fosc_hz,
            wdt_enabled: false,
            power_up_timer: false,
            brown_out_reset: true,
            low_voltage_programming: false,
        }
    }

    pub fn with_watchdog(mut self) -> Self {
        self.wdt_enabled = true;
        self
    }

    /// Instruction cycles per second (Fosc / 4).
    pub fn tcy_hz(&self) -> u64 {
        (self.fosc_hz / 4).max(1) as u64
    }

    pub fn cycles_per_ms(&self) -> u64 {
        (self.tcy_hz() / 1000).max(1)
    }

    /// Cycles for `us` microseconds, rounded up.
    pub fn cycles_for_us(&self, us: u64) -> u64 {
        (us * self.tcy_hz()).div_ceil(1_000_000)
    }
}

impl Default for Fuses {
    fn default() -> Self {
        Fuses::crystal(4_000_000)
    }
}

/// What happens when the watchdog expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchdogPolicy {
    /// Stop the run with `Error::WatchdogReset`.
    Halt,
    /// Reset the MCU, run `configure` again and keep going.
    Restart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Upper bound for any busy-wait, in instruction cycles
    pub wait_budget_cycles: u64,
    /// Event ring capacity
    pub event_capacity: usize,
    /// Handlers running longer than this are logged
    pub isr_budget_cycles: Option<u64>,
    pub watchdog_policy: WatchdogPolicy,
    /// Nominal WDT period without postscaler
    pub wdt_period_us: u32,
    /// Self-timed EEPROM write duration
    pub eeprom_write_us: u32,
    /// Clock of the external SPI/I2C master driving slave-mode stimuli
    pub bus_clock_hz: u32,
    /// Timer1 oscillator crystal on T1OSO/T1OSI, if fitted
    pub timer1_crystal_hz: Option<u32>,
    /// How long an external I2C master tolerates clock stretching
    pub i2c_stretch_timeout_us: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            wait_budget_cycles: 5_000_000,
            event_capacity: 4096,
            isr_budget_cycles: Some(20_000),
            watchdog_policy: WatchdogPolicy::Halt,
            wdt_period_us: 18_000,
            eeprom_write_us: 4_000,
            bus_clock_hz: 100_000,
            timer1_crystal_hz: None,
            i2c_stretch_timeout_us: 25_000,
        }
    }
}

// ─── Peripheral modes ───────────────────────────────────────────────────────

/// ADC conversion clock (ADCS2:ADCS0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdcClock {
    Fosc2,
    Fosc4,
    Fosc8,
    Fosc16,
    Fosc32,
    Fosc64,
    Rc,
}

impl AdcClock {
    /// (ADCS2, ADCS1:ADCS0)
    pub fn bits(self) -> (bool, u8) {
        match self {
            AdcClock::Fosc2 => (false, 0b00),
            AdcClock::Fosc8 => (false, 0b01),
            AdcClock::Fosc32 => (false, 0b10),
            AdcClock::Rc => (false, 0b11),
            AdcClock::Fosc4 => (true, 0b00),
            AdcClock::Fosc16 => (true, 0b01),
            AdcClock::Fosc64 => (true, 0b10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdcMode {
    pub channel: u8,
    pub clock: AdcClock,
    /// ADFM
    pub right_justified: bool,
    /// PCFG3:PCFG0
    pub port_config: u8,
    pub interrupt: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UartMode {
    pub baud: u32,
    /// BRGH
    pub high_speed: bool,
    pub transmit: bool,
    pub receive: bool,
    pub rx_interrupt: bool,
    pub tx_interrupt: bool,
}

/// SPI master clock (SSPM3:SSPM0 = 0000..0011).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpiClock {
    Fosc4,
    Fosc16,
    Fosc64,
    Timer2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiMode {
    /// CKP: idle clock high
    pub clock_idle_high: bool,
    /// CKE
    pub transmit_on_active_edge: bool,
    /// SMP (master only)
    pub sample_at_end: bool,
    pub interrupt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timer0Source {
    Internal,
    /// T0CKI (RA4), rising edge unless `falling`
    External { falling: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timer0Mode {
    pub source: Timer0Source,
    /// Prescaler ratio 2..=256; `None` assigns the prescaler to the WDT
    pub prescale: Option<u16>,
    pub interrupt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timer1Source {
    Internal,
    /// T1CKI edges or the Timer1 oscillator
    External { oscillator: bool, synchronize: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timer1Mode {
    pub source: Timer1Source,
    /// 1, 2, 4 or 8
    pub prescale: u8,
    pub interrupt: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timer2Mode {
    /// 1, 4 or 16
    pub prescale: u8,
    /// 1..=16
    pub postscale: u8,
    pub period: u8,
    pub interrupt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcpChannel {
    Ccp1,
    Ccp2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureEdge {
    Falling,
    Rising,
    Every4thRising,
    Every16thRising,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAction {
    SetOutput,
    ClearOutput,
    SoftwareInterrupt,
    SpecialEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureMode {
    pub channel: CcpChannel,
    pub edge: CaptureEdge,
    pub interrupt: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareMode {
    pub channel: CcpChannel,
    pub value: u16,
    pub action: CompareAction,
    pub interrupt: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PwmMode {
    pub channel: CcpChannel,
    /// Initial 8-bit duty (CCPRxL)
    pub duty: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct I2cSlaveMode {
    /// SSPADD as written (7-bit address in bits 7:1)
    pub address: u8,
    /// SSPCON2.SEN: stretch on receive too
    pub stretch_on_receive: bool,
    pub interrupt: bool,
}

/// One peripheral configuration step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PeripheralMode {
    Adc(AdcMode),
    Uart(UartMode),
    SpiMaster { clock: SpiClock, mode: SpiMode },
    SpiSlave { slave_select: bool, mode: SpiMode },
    I2cMaster { bus_hz: u32 },
    I2cSlave(I2cSlaveMode),
    Timer0(Timer0Mode),
    Timer1(Timer1Mode),
    Timer2(Timer2Mode),
    Capture(CaptureMode),
    Compare(CompareMode),
    Pwm(PwmMode),
    /// RB0/INT, rising edge unless `falling`
    ExternalInterrupt { falling: bool },
    /// Assign the shared prescaler to the WDT with this postscale (1..=128)
    WatchdogPostscale(u8),
}
