//! # pic16-core
//!
//! Register-level simulator for the PIC16F877A plus a small driver layer
//! and one demo firmware per on-chip peripheral.
//!
//! Firmware here is ordinary Rust that talks to the chip only through
//! named register reads and writes, bit operations, delays and bounded
//! busy-waits. Every register access costs one instruction cycle
//! (Tcy = 4 / Fosc); all peripherals advance once per cycle, and an
//! interrupt handler may preempt the firmware at any access.
//!
//! ## Architecture
//!
//! - [`Mcu`]: the chip, with its register file, peripherals, interrupt dispatch,
//!   external stimuli and the event log
//! - [`Firmware`]: configurator (`configure`) plus main-loop body (`poll`)
//! - [`InterruptHandler`]: the single interrupt vector
//! - [`shared::SharedCell`]: the interrupt-to-main-loop handoff
//! - [`context`]: `InitCtx` / `MainCtx` / `IrqCtx` execution markers
//! - [`peripherals`]: GPIO, Timer0/1/2, CCP1/2, ADC, MSSP, USART, EEPROM, WDT
//! - [`drivers`]: configurators and blocking primitives built on registers
//! - [`demos`]: the example firmwares
//! - [`debugger`], [`profiler`], [`savestate`], [`hex`]: diagnostics and
//!   persistence
//!
//! ## Faults
//!
//! Register accesses never fail. Conditions raised inside one (watchdog
//! expiry, an interrupt handler that left its flag set) are latched and
//! returned by the next delay or busy-wait, or by [`Mcu::run`] at the end of
//! the current `poll`.

pub mod regs;
pub mod memory;
pub mod context;
pub mod shared;
pub mod error;
pub mod events;
pub mod config;
pub mod peripherals;
pub mod waveform;
pub mod delay;
pub mod drivers;
pub mod demos;
pub mod debugger;
pub mod profiler;
pub mod savestate;
pub mod hex;

pub use config::{Fuses, PeripheralMode, SimConfig, WatchdogPolicy};
pub use context::{InitCtx, IrqCtx, MainCtx};
pub use error::{Error, Result, WaitFor};
pub use events::{Event, EventLog, LoggedEvent, ResetCause};
pub use memory::RegisterFile;
pub use peripherals::{I2cDevice, I2cTransaction, Irq, Port, SpiDevice};
pub use shared::{Publish, SharedCell};

use peripherals::{
    analog_pins, Adc, Ccp, EepromCtrl, Gpio, Mssp, MsspBus, PinOverrides, Timer0, Timer1,
    Timer2, Usart, Watchdog,
};
use regs::{bit, canonical, INTCON, STATUS};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Register file size: four banks of 128 bytes
pub const DATA_SIZE: usize = 512;
/// Data EEPROM size
pub const EEPROM_SIZE: usize = 256;
/// DEVID of the PIC16F877A (revision bits cleared)
pub const DEVICE_ID: u16 = 0x0E20;

/// Cycles from the interrupt flag to the first handler instruction.
const IRQ_LATENCY: u64 = 3;
/// RETFIE
const RETFIE_CYCLES: u64 = 2;
/// GOTO back to the top of the main loop plus the call into `poll`.
const LOOP_OVERHEAD: u64 = 2;

/// A firmware image: configurator plus main-loop body.
pub trait Firmware {
    fn name(&self) -> &'static str;

    /// Configuration word and crystal.
    fn fuses(&self) -> Fuses {
        Fuses::default()
    }

    /// Off-chip devices the board wires up for this firmware.
    fn attach_devices(&self, _mcu: &mut Mcu) {}

    /// Runs once after every reset, global interrupts off.
    fn configure(&mut self, mcu: &mut Mcu, init: &InitCtx) -> Result<()>;

    /// One pass of the main loop.
    fn poll(&mut self, mcu: &mut Mcu, main: &MainCtx) -> Result<()>;
}

/// The interrupt vector. GIE is clear while `service` runs and every flag
/// pending on entry must be acknowledged before it returns.
pub trait InterruptHandler: Send {
    fn service(&mut self, mcu: &mut Mcu, irq: &IrqCtx) -> Result<()>;
}

impl<F> InterruptHandler for F
where
    F: FnMut(&mut Mcu, &IrqCtx) -> Result<()> + Send,
{
    fn service(&mut self, mcu: &mut Mcu, irq: &IrqCtx) -> Result<()> {
        self(mcu, irq)
    }
}

/// Something the outside world does to the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stimulus {
    /// Drive a pin to a level
    Pin { port: Port, bit: u8, level: bool },
    /// Stop driving a pin
    Release { port: Port, bit: u8 },
    /// Analog input as a 10-bit code
    Analog { channel: u8, value: u16 },
    /// Bytes arriving on RX, one frame apart
    UartRx(Vec<u8>),
    /// One byte clocked in by an external SPI master
    SpiFromMaster(u8),
    /// A transaction from an external I2C master
    I2c(I2cTransaction),
}

/// Summary of a [`Mcu::run`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub cycles: u64,
    pub polls: u64,
    pub interrupts: u64,
    pub watchdog_resets: u32,
}

/// The simulated PIC16F877A and its board.
pub struct Mcu {
    pub fuses: Fuses,
    pub sim: SimConfig,
    pub mem: RegisterFile,
    /// Instruction cycles since power-on
    pub cycle: u64,
    pub gpio: Gpio,
    pub timer0: Timer0,
    pub timer1: Timer1,
    pub timer2: Timer2,
    pub ccp1: Ccp,
    pub ccp2: Ccp,
    pub adc: Adc,
    pub mssp: Mssp,
    pub usart: Usart,
    pub eeprom: EepromCtrl,
    pub watchdog: Watchdog,
    pub events: EventLog,
    /// Interrupt profiler (zero-cost when disabled)
    pub profiler: profiler::IsrProfiler,
    /// Watchpoints
    pub debugger: debugger::Debugger,
    /// Echo events to stderr
    pub debug: bool,
    /// Log every handler entry as `Event::IsrEntered`
    pub trace_isr: bool,
    /// Interrupt dispatches since power-on
    pub interrupts: u64,
    /// Watchdog resets since power-on
    pub resets: u32,
    /// Events raised by peripherals during the current cycle
    pending_events: Vec<Event>,
    isr: Option<Box<dyn InterruptHandler>>,
    in_isr: bool,
    /// Sources acknowledged by the running handler
    isr_acks: u16,
    /// Scheduled stimuli, sorted by cycle
    stimuli: VecDeque<(u64, Stimulus)>,
    spi_device: Option<Box<dyn SpiDevice>>,
    i2c_devices: Vec<Box<dyn I2cDevice>>,
    /// First fault since the last time one was reported
    fault: Option<Error>,
    configured: bool,
}

impl Mcu {
    pub fn new(fuses: Fuses) -> Self {
        Self::with_config(fuses, SimConfig::default())
    }

    pub fn with_config(fuses: Fuses, sim: SimConfig) -> Self {
        let events = EventLog::new(sim.event_capacity);
        let mut mcu = Mcu {
            fuses,
            sim,
            mem: RegisterFile::new(),
            cycle: 0,
            gpio: Gpio::new(),
            timer0: Timer0::new(),
            timer1: Timer1::new(),
            timer2: Timer2::new(),
            ccp1: Ccp::new(config::CcpChannel::Ccp1),
            ccp2: Ccp::new(config::CcpChannel::Ccp2),
            adc: Adc::new(),
            mssp: Mssp::new(),
            usart: Usart::new(),
            eeprom: EepromCtrl::new(),
            watchdog: Watchdog::new(),
            events,
            profiler: profiler::IsrProfiler::new(),
            debugger: debugger::Debugger::new(),
            debug: false,
            trace_isr: false,
            interrupts: 0,
            resets: 0,
            pending_events: Vec::new(),
            isr: None,
            in_isr: false,
            isr_acks: 0,
            stimuli: VecDeque::new(),
            spi_device: None,
            i2c_devices: Vec::new(),
            fault: None,
            configured: false,
        };
        mcu.log(Event::Reset { cause: ResetCause::PowerOn });
        mcu
    }

    /// A board for `fw`: its fuses, plus the devices it expects.
    pub fn for_firmware(fw: &dyn Firmware, sim: SimConfig) -> Self {
        let mut mcu = Self::with_config(fw.fuses(), sim);
        fw.attach_devices(&mut mcu);
        mcu
    }

    /// Reset the chip. EEPROM, external pin drive, attached devices and
    /// queued stimuli survive; the interrupt handler is dropped and
    /// `configure` runs again on the next `run`.
    pub fn reset(&mut self, cause: ResetCause) {
        self.mem.power_on();
        if cause == ResetCause::Watchdog {
            self.mem.set_bit(STATUS, regs::STATUS_NTO, false);
            self.resets += 1;
        }
        if self.eeprom.reset() {
            self.mem.set_bit(regs::EECON1, regs::WRERR, true);
        }
        self.gpio.reset();
        self.timer0.reset();
        self.timer1.reset();
        self.timer2.reset();
        self.ccp1.reset();
        self.ccp2.reset();
        self.adc.reset();
        self.mssp.reset();
        self.usart.reset();
        self.watchdog.reset(self.cycle);
        self.isr = None;
        self.in_isr = false;
        self.isr_acks = 0;
        self.fault = None;
        self.configured = false;
        self.log(Event::Reset { cause });
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn in_isr(&self) -> bool {
        self.in_isr
    }

    // ─── Register access ────────────────────────────────────────────────

    /// Read a register (one cycle).
    pub fn read(&mut self, addr: u16) -> u8 {
        let addr = canonical(addr);
        let value = match addr {
            regs::PORTA | regs::PORTB | regs::PORTC | regs::PORTD | regs::PORTE => {
                let v = self.port_value(addr);
                if addr == regs::PORTB {
                    self.gpio.latch_portb(v);
                }
                v
            }
            regs::RCREG => {
                let v = self.usart.read_rcreg(&mut self.mem);
                self.isr_acks |= Irq::UartRx.mask();
                v
            }
            regs::SSPBUF => self.mssp.read_buf(&mut self.mem),
            regs::EECON2 => 0,
            _ => self.mem.get(addr),
        };
        if !self.debugger.is_idle() {
            self.debugger.on_read(addr, value);
            self.collect_watch_hits();
        }
        self.tick();
        value
    }

    /// Write a register (one cycle).
    pub fn write(&mut self, addr: u16, value: u8) {
        self.store(canonical(addr), value);
        self.tick();
    }

    /// BSF: read-modify-write of the whole register.
    pub fn set_bit(&mut self, addr: u16, n: u8) {
        let v = self.rmw_value(addr);
        self.write(addr, v | bit(n));
    }

    /// BCF
    pub fn clear_bit(&mut self, addr: u16, n: u8) {
        let v = self.rmw_value(addr);
        self.write(addr, v & !bit(n));
    }

    pub fn write_bit(&mut self, addr: u16, n: u8, on: bool) {
        if on { self.set_bit(addr, n) } else { self.clear_bit(addr, n) }
    }

    /// BTFSS / BTFSC
    pub fn test_bit(&mut self, addr: u16, n: u8) -> bool {
        self.read(addr) & bit(n) != 0
    }

    /// Read a low/high register pair, low byte first.
    pub fn read_word(&mut self, lo: u16) -> u16 {
        let l = self.read(lo) as u16;
        let h = self.read(lo + 1) as u16;
        l | (h << 8)
    }

    /// Write a low/high register pair, low byte first.
    pub fn write_word(&mut self, lo: u16, value: u16) {
        self.write(lo, value as u8);
        self.write(lo + 1, (value >> 8) as u8);
    }

    /// Value a bit instruction reads: pin levels for ports, the stored
    /// value otherwise, and no read side effects.
    fn rmw_value(&self, addr: u16) -> u8 {
        let addr = canonical(addr);
        match addr {
            regs::PORTA | regs::PORTB | regs::PORTC | regs::PORTD | regs::PORTE => {
                self.port_value(addr)
            }
            regs::EECON2 => 0,
            _ => self.mem.get(addr),
        }
    }

    fn store(&mut self, addr: u16, value: u8) {
        let old = self.mem.get(addr);
        if !self.debugger.is_idle() {
            self.debugger.on_write(addr, old, value);
            self.collect_watch_hits();
        }
        if addr != regs::EECON1 && addr != regs::EECON2 {
            self.eeprom.interrupt_sequence(&mut self.pending_events);
        }
        let mem = &mut self.mem;
        match addr {
            STATUS => {
                let ro = bit(regs::STATUS_NTO) | bit(regs::STATUS_NPD);
                mem.set(addr, (value & !ro) | (old & ro));
            }
            INTCON | regs::PIR2 => {
                mem.set(addr, value);
                self.isr_acks |= Irq::from_flag_bits(addr, old & !value);
            }
            regs::PIR1 => {
                let ro = bit(regs::TXIF) | bit(regs::RCIF);
                let new = (value & !ro) | (old & ro);
                mem.set(addr, new);
                self.isr_acks |= Irq::from_flag_bits(addr, old & !new);
            }
            regs::TMR0 => {
                mem.set(addr, value);
                self.timer0.on_tmr0_write();
            }
            regs::T1CON => {
                mem.set(addr, value);
                self.timer1.on_t1con_write();
            }
            regs::TMR2 | regs::T2CON => {
                mem.set(addr, value);
                self.timer2.on_write();
            }
            regs::SSPBUF => self.mssp.write_buf(mem, value, &mut self.pending_events),
            regs::SSPCON => {
                mem.set(addr, value);
                self.mssp.on_sspcon_write(old, value);
            }
            regs::SSPCON2 => {
                mem.set(addr, value);
                self.mssp.on_sspcon2_write(mem, old);
            }
            regs::SSPSTAT => mem.set(addr, (value & 0xC0) | (old & 0x3F)),
            regs::CCP1CON => {
                mem.set(addr, value);
                self.ccp1.on_con_write(old, value);
            }
            regs::CCP2CON => {
                mem.set(addr, value);
                self.ccp2.on_con_write(old, value);
            }
            regs::TXREG => {
                self.usart.write_txreg(mem, value, &mut self.pending_events);
                self.isr_acks |= Irq::UartTx.mask();
            }
            regs::TXSTA => {
                let ro = bit(regs::TRMT);
                mem.set(addr, (value & !ro) | (old & ro));
            }
            regs::RCSTA => self.usart.on_rcsta_write(mem, old, value),
            regs::ADCON0 => {
                mem.set(addr, value);
                self.adc.on_adcon0_write(mem, &self.fuses);
            }
            regs::EECON1 => {
                let write_cycles = self.fuses.cycles_for_us(self.sim.eeprom_write_us as u64);
                self.eeprom.on_eecon1_write(mem, old, value, write_cycles, &mut self.pending_events);
            }
            regs::EECON2 => self.eeprom.on_eecon2_write(value, &mut self.pending_events),
            _ => mem.set(addr, value),
        }
    }

    fn collect_watch_hits(&mut self) {
        for h in self.debugger.drain() {
            self.pending_events.push(Event::Watchpoint {
                addr: h.addr,
                old: h.before,
                new: h.after,
                write: h.access == debugger::Access::Write,
            });
        }
    }

    // ─── Pins ───────────────────────────────────────────────────────────

    fn overrides(&self) -> PinOverrides {
        let mut ov = PinOverrides::default();
        for ccp in [&self.ccp1, &self.ccp2] {
            if ccp.drives_pin(&self.mem) {
                let (port, b) = ccp.pin();
                ov.drive(port, b, ccp.output());
            }
        }
        ov
    }

    /// Physical level of every port.
    pub fn port_levels(&self) -> [u8; 5] {
        self.gpio.levels(&self.mem, &self.overrides())
    }

    /// What a PORTx read returns: pin levels, analog pins as 0.
    fn port_value(&self, data_addr: u16) -> u8 {
        let Some(port) = Port::from_data_addr(data_addr) else { return 0 };
        let level = self.port_levels()[port.index()];
        let (an_a, an_e) = analog_pins(self.mem.get(regs::ADCON1) & 0x0F);
        match port {
            Port::A => level & !an_a,
            Port::E => level & !an_e,
            _ => level,
        }
    }

    pub fn pin(&self, port: Port, n: u8) -> bool {
        self.port_levels()[port.index()] & bit(n) != 0
    }

    // ─── Stimuli ────────────────────────────────────────────────────────

    pub fn apply(&mut self, stimulus: Stimulus) {
        match stimulus {
            Stimulus::Pin { port, bit, level } => {
                self.gpio.drive(port, bit, level);
                self.log(Event::PinDriven { port, bit, level });
            }
            Stimulus::Release { port, bit } => self.gpio.release(port, bit),
            Stimulus::Analog { channel, value } => self.set_analog(channel, value),
            Stimulus::UartRx(bytes) => self.usart.inject(&bytes),
            Stimulus::SpiFromMaster(byte) => self.mssp.queue_spi_byte(byte),
            Stimulus::I2c(t) => self.mssp.queue_i2c(t),
        }
    }

    /// Apply `stimulus` when the cycle counter reaches `cycle`.
    pub fn schedule_at(&mut self, cycle: u64, stimulus: Stimulus) {
        let idx = self.stimuli.partition_point(|(c, _)| *c <= cycle);
        self.stimuli.insert(idx, (cycle, stimulus));
    }

    pub fn schedule_in_ms(&mut self, ms: u64, stimulus: Stimulus) {
        let at = self.cycle + ms * self.fuses.cycles_per_ms();
        self.schedule_at(at, stimulus);
    }

    pub fn pending_stimuli(&self) -> usize {
        self.stimuli.len()
    }

    pub fn set_pin(&mut self, port: Port, n: u8, level: bool) {
        self.apply(Stimulus::Pin { port, bit: n, level });
    }

    pub fn release_pin(&mut self, port: Port, n: u8) {
        self.apply(Stimulus::Release { port, bit: n });
    }

    /// Set an analog input as a 10-bit code; values above 1023 are clamped.
    pub fn set_analog(&mut self, channel: u8, value: u16) {
        let (_, clamped) = self.adc.set_input(channel, value);
        if clamped {
            self.log(Event::AdcClamped { channel, value });
        }
    }

    /// Set an analog input in millivolts against a 5 V reference.
    pub fn set_analog_mv(&mut self, channel: u8, mv: u32) {
        let code = (mv as u64 * peripherals::ADC_MAX as u64 + 2500) / 5000;
        self.set_analog(channel, code.min(u16::MAX as u64) as u16);
    }

    pub fn send_uart(&mut self, bytes: &[u8]) {
        self.usart.inject(bytes);
    }

    /// Take and clear everything transmitted on TX so far.
    pub fn take_uart_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.usart.tx_out)
    }

    pub fn attach_isr(&mut self, handler: impl InterruptHandler + 'static) {
        self.isr = Some(Box::new(handler));
    }

    pub fn attach_spi_device(&mut self, device: impl SpiDevice + 'static) {
        self.spi_device = Some(Box::new(device));
    }

    pub fn attach_i2c_device(&mut self, device: impl I2cDevice + 'static) {
        self.i2c_devices.push(Box::new(device));
    }

    pub fn eeprom_image(&self) -> &[u8] {
        &self.mem.eeprom
    }

    pub fn load_eeprom(&mut self, data: &[u8]) {
        let len = data.len().min(EEPROM_SIZE);
        self.mem.eeprom[..len].copy_from_slice(&data[..len]);
    }

    // ─── Time ───────────────────────────────────────────────────────────

    /// Let `cycles` pass. Faults stay latched.
    pub fn advance(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.tick();
        }
    }

    /// Burn `cycles`, stopping early on a fault.
    pub fn delay_cycles(&mut self, cycles: u64) -> Result<()> {
        for _ in 0..cycles {
            if self.fault.is_some() {
                break;
            }
            self.tick();
        }
        self.take_fault()
    }

    pub fn delay_ms(&mut self, ms: u32) -> Result<()> {
        self.delay_cycles(ms as u64 * self.fuses.cycles_per_ms())
    }

    pub fn delay_us(&mut self, us: u32) -> Result<()> {
        self.delay_cycles(self.fuses.cycles_for_us(us as u64))
    }

    /// Poll `cond` until it holds. Each check costs the condition's own
    /// register reads plus a two-cycle branch; gives up after
    /// `SimConfig::wait_budget_cycles`.
    pub fn wait_until(&mut self, what: WaitFor, mut cond: impl FnMut(&mut Mcu) -> bool) -> Result<()> {
        let start = self.cycle;
        loop {
            self.take_fault()?;
            if cond(self) {
                return Ok(());
            }
            let waited = self.cycle - start;
            if waited >= self.sim.wait_budget_cycles {
                self.log(Event::WaitTimeout { what });
                return Err(Error::Timeout { what, cycles: waited });
            }
            self.advance(2);
        }
    }

    /// CLRWDT
    pub fn clrwdt(&mut self) {
        self.watchdog.clear(self.cycle);
        let s = self.mem.get(STATUS);
        self.mem.set(STATUS, s | bit(regs::STATUS_NTO) | bit(regs::STATUS_NPD));
        self.tick();
    }

    /// Surface a fault latched by an infallible path such as `DelayNs`.
    pub fn take_fault(&mut self) -> Result<()> {
        match self.fault.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn raise(&mut self, e: Error) {
        if self.fault.is_none() {
            self.fault = Some(e);
        }
    }

    pub fn log(&mut self, event: Event) {
        if self.debug {
            eprintln!("[{:>10}] {}", self.cycle, event);
        }
        self.events.push(self.cycle, event);
    }

    // ─── Cycle ──────────────────────────────────────────────────────────

    /// One instruction cycle of every peripheral, then interrupt dispatch.
    fn tick(&mut self) {
        self.cycle += 1;
        while self.stimuli.front().is_some_and(|(c, _)| *c <= self.cycle) {
            if let Some((_, s)) = self.stimuli.pop_front() {
                self.apply(s);
            }
        }

        let levels = self.port_levels();
        let edges = self.gpio.sample(&mut self.mem, &levels);
        let mem = &mut self.mem;

        self.timer0.tick(mem, edges.rose(Port::A, 4), edges.fell(Port::A, 4));
        let tmr1_changed = self.timer1.tick(
            mem,
            edges.rose(Port::C, 0),
            self.sim.timer1_crystal_hz,
            self.fuses.tcy_hz(),
        );
        self.ccp1.capture(mem, edges.rose(Port::C, 2), edges.fell(Port::C, 2));
        self.ccp2.capture(mem, edges.rose(Port::C, 1), edges.fell(Port::C, 1));
        if tmr1_changed {
            if self.ccp1.compare(mem) {
                mem.set_word(regs::TMR1L, 0);
            }
            if self.ccp2.compare(mem) {
                mem.set_word(regs::TMR1L, 0);
                if mem.bit(regs::ADCON0, regs::ADON) {
                    self.adc.start(mem, &self.fuses);
                }
            }
        }
        let period = self.timer2.tick(mem);
        self.ccp1.pwm(mem, period);
        self.ccp2.pwm(mem, period);
        self.adc.tick(mem);

        let tcy = self.fuses.tcy_hz();
        let mut bus = MsspBus {
            spi: &mut self.spi_device,
            i2c: &mut self.i2c_devices,
            ext_bit_cycles: (tcy / self.sim.bus_clock_hz.max(1) as u64).max(1),
            stretch_timeout: self.fuses.cycles_for_us(self.sim.i2c_stretch_timeout_us as u64),
            ss_high: levels[Port::A.index()] & 0x20 != 0,
            events: &mut self.pending_events,
        };
        self.mssp.tick(mem, &mut bus);
        self.usart.tick(mem, &mut self.pending_events);
        self.eeprom.tick(mem, &mut self.pending_events);

        let base = self.fuses.cycles_for_us(self.sim.wdt_period_us as u64);
        let period = Watchdog::period_cycles(base, mem.get(regs::OPTION_REG));
        if self.watchdog.tick(self.fuses.wdt_enabled, period, self.cycle) {
            mem.set_bit(STATUS, regs::STATUS_NTO, false);
            self.pending_events.push(Event::WatchdogTimeout);
            self.raise(Error::WatchdogReset { cycle: self.cycle });
        }

        if !self.pending_events.is_empty() {
            for e in std::mem::take(&mut self.pending_events) {
                self.log(e);
            }
        }

        if !self.in_isr && self.mem.bit(INTCON, regs::GIE) {
            let pending = self.pending_irqs();
            if pending != 0 {
                self.dispatch(pending);
            }
        }
    }

    /// Sources whose flag and enable bits are both set (PEIE included).
    pub fn pending_irqs(&self) -> u16 {
        let peie = self.mem.bit(INTCON, regs::PEIE);
        Irq::ALL
            .iter()
            .filter(|irq| {
                let (fr, fb) = irq.flag();
                let (er, eb) = irq.enable();
                self.mem.bit(fr, fb) && self.mem.bit(er, eb) && (peie || !irq.is_peripheral())
            })
            .fold(0, |m, irq| m | irq.mask())
    }

    fn dispatch(&mut self, pending: u16) {
        self.eeprom.interrupt_sequence(&mut self.pending_events);
        self.mem.set_bit(INTCON, regs::GIE, false);
        let Some(mut handler) = self.isr.take() else {
            if let Some(source) = Irq::first(pending) {
                self.log(Event::UnacknowledgedInterrupt { source });
                self.raise(Error::UnacknowledgedInterrupt(source));
            }
            return;
        };
        if self.trace_isr {
            for source in Irq::ALL.into_iter().filter(|i| pending & i.mask() != 0) {
                self.log(Event::IsrEntered { source });
            }
        }

        let entered = self.cycle;
        self.in_isr = true;
        self.isr_acks = 0;
        self.advance(IRQ_LATENCY);
        let result = {
            let ctx = IrqCtx::new();
            handler.service(self, &ctx)
        };
        // The handler may have installed a replacement for itself
        if self.isr.is_none() {
            self.isr = Some(handler);
        }
        self.advance(RETFIE_CYCLES);
        self.in_isr = false;
        self.interrupts += 1;

        let ran = self.cycle - entered;
        if let Err(e) = result {
            self.raise(e);
        }
        let still = pending & self.pending_irqs() & !self.isr_acks;
        match Irq::first(still) {
            Some(source) => {
                // GIE stays clear, otherwise this would re-enter forever
                self.log(Event::UnacknowledgedInterrupt { source });
                self.raise(Error::UnacknowledgedInterrupt(source));
            }
            None => self.mem.set_bit(INTCON, regs::GIE, true),
        }
        if self.sim.isr_budget_cycles.is_some_and(|b| ran > b) {
            self.log(Event::LongIsr { cycles: ran });
        }
        if self.profiler.enabled {
            self.profiler.record(pending, ran, IRQ_LATENCY);
        }
    }

    // ─── Running firmware ───────────────────────────────────────────────

    /// Run `fw` for `ms` milliseconds of simulated time.
    pub fn run(&mut self, fw: &mut dyn Firmware, ms: u64) -> Result<RunReport> {
        let end = self.cycle + ms * self.fuses.cycles_per_ms();
        self.run_until(fw, end)
    }

    /// Run `fw` until the cycle counter reaches `end_cycle`. The last
    /// `poll` may run past it.
    pub fn run_until(&mut self, fw: &mut dyn Firmware, end_cycle: u64) -> Result<RunReport> {
        let start = self.cycle;
        let start_irqs = self.interrupts;
        let mut report = RunReport::default();
        while self.cycle < end_cycle {
            let step = if self.configured {
                report.polls += 1;
                self.poll_once(fw)
            } else {
                self.boot(fw)
            };
            match step {
                Ok(()) => {}
                Err(Error::WatchdogReset { .. })
                    if self.sim.watchdog_policy == WatchdogPolicy::Restart =>
                {
                    self.reset(ResetCause::Watchdog);
                    report.watchdog_resets += 1;
                }
                Err(e) => return Err(e),
            }
        }
        report.cycles = self.cycle - start;
        report.interrupts = self.interrupts - start_irqs;
        Ok(report)
    }

    fn boot(&mut self, fw: &mut dyn Firmware) -> Result<()> {
        let init = InitCtx::new();
        fw.configure(self, &init)?;
        self.take_fault()?;
        self.configured = true;
        Ok(())
    }

    fn poll_once(&mut self, fw: &mut dyn Firmware) -> Result<()> {
        let main = MainCtx::new();
        fw.poll(self, &main)?;
        self.advance(LOOP_OVERHEAD);
        self.take_fault()
    }

    // ─── Diagnostics ────────────────────────────────────────────────────

    pub fn dump_ram(&self, start: u16, length: u16) -> String {
        debugger::hexdump(&self.mem.data, start, length)
    }

    pub fn dump_sfrs(&self) -> String {
        debugger::sfr_report(&self.mem.data)
    }

    pub fn dump_sfrs_all(&self) -> String {
        debugger::sfr_table(&self.mem.data)
    }

    pub fn profiler_report(&self) -> String {
        self.profiler.report(self.cycle)
    }
}

impl Default for Mcu {
    fn default() -> Self {
        Self::new(Fuses::default())
    }
}
