//! Save state serialization.
//!
//! File format:
//! ```text
//! [4 bytes] Magic "P16S"
//! [4 bytes] Format version (u32 LE)
//! [2 bytes] Device id (u16 LE)
//! [rest]    Deflate-compressed bincode payload
//! ```
//!
//! Only chip and board state is captured. The interrupt handler, attached
//! bus devices and the firmware's own Rust values live outside the chip;
//! after a load `configure` runs again on the next `Mcu::run`, which
//! re-attaches the handler.

use crate::config::{Fuses, SimConfig};
use crate::memory::RegisterFile;
use crate::peripherals::{
    Adc, Ccp, EepromCtrl, Gpio, Mssp, Timer0, Timer1, Timer2, Usart, Watchdog,
};
use crate::{regs, Error, Mcu, Result, Stimulus, DEVICE_ID};
use serde::{Deserialize, Serialize};
use std::path::Path;

const MAGIC: &[u8; 4] = b"P16S";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 10;

#[derive(Serialize, Deserialize)]
pub struct SaveState {
    pub fuses: Fuses,
    pub sim: SimConfig,
    pub cycle: u64,
    pub mem: RegisterFile,

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

    pub interrupts: u64,
    pub resets: u32,
    pub stimuli: Vec<(u64, Stimulus)>,
}

impl Mcu {
    pub fn save_state(&self) -> SaveState {
        SaveState {
            fuses: self.fuses.clone(),
            sim: self.sim.clone(),
            cycle: self.cycle,
            mem: self.mem.clone(),
            gpio: self.gpio.clone(),
            timer0: self.timer0.clone(),
            timer1: self.timer1.clone(),
            timer2: self.timer2.clone(),
            ccp1: self.ccp1.clone(),
            ccp2: self.ccp2.clone(),
            adc: self.adc.clone(),
            mssp: self.mssp.clone(),
            usart: self.usart.clone(),
            eeprom: self.eeprom.clone(),
            watchdog: self.watchdog.clone(),
            interrupts: self.interrupts,
            resets: self.resets,
            stimuli: self.stimuli.iter().cloned().collect(),
        }
    }

    /// Restore chip state. Attached devices are kept; the interrupt handler
    /// is dropped and GIE cleared until `configure` runs again.
    pub fn load_state(&mut self, s: SaveState) {
        self.fuses = s.fuses;
        self.sim = s.sim;
        self.cycle = s.cycle;
        self.mem = s.mem;
        self.gpio = s.gpio;
        self.timer0 = s.timer0;
        self.timer1 = s.timer1;
        self.timer2 = s.timer2;
        self.ccp1 = s.ccp1;
        self.ccp2 = s.ccp2;
        self.adc = s.adc;
        self.mssp = s.mssp;
        self.usart = s.usart;
        self.eeprom = s.eeprom;
        self.watchdog = s.watchdog;
        self.interrupts = s.interrupts;
        self.resets = s.resets;
        self.stimuli = s.stimuli.into();
        self.mem.set_bit(regs::INTCON, regs::GIE, false);
        self.pending_events.clear();
        self.isr = None;
        self.in_isr = false;
        self.isr_acks = 0;
        self.fault = None;
        self.configured = false;
    }
}

// ─── Encoding ───────────────────────────────────────────────────────────────

pub fn encode(state: &SaveState) -> Result<Vec<u8>> {
    let payload = bincode::serialize(state)
        .map_err(|e| Error::SaveState(format!("serialize: {}", e)))?;
    let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

    let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&DEVICE_ID.to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

pub fn decode(data: &[u8]) -> Result<SaveState> {
    if data.len() < HEADER_LEN {
        return Err(Error::SaveState("file too small".into()));
    }
    if &data[0..4] != MAGIC {
        return Err(Error::SaveState("bad magic".into()));
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != FORMAT_VERSION {
        return Err(Error::SaveState(format!(
            "unsupported version {} (expected {})", version, FORMAT_VERSION)));
    }
    let device = u16::from_le_bytes([data[8], data[9]]);
    if device != DEVICE_ID {
        return Err(Error::SaveState(format!(
            "device id mismatch: 0x{:04X} (expected 0x{:04X})", device, DEVICE_ID)));
    }

    let payload = miniz_oxide::inflate::decompress_to_vec(&data[HEADER_LEN..])
        .map_err(|e| Error::SaveState(format!("decompress: {:?}", e)))?;
    bincode::deserialize(&payload)
        .map_err(|e| Error::SaveState(format!("deserialize: {}", e)))
}

// ─── File I/O ───────────────────────────────────────────────────────────────

pub fn save_to_file(mcu: &Mcu, path: &Path) -> Result<()> {
    let bytes = encode(&mcu.save_state())?;
    std::fs::write(path, bytes)
        .map_err(|e| Error::SaveState(format!("write {}: {}", path.display(), e)))
}

pub fn load_from_file(mcu: &mut Mcu, path: &Path) -> Result<()> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::SaveState(format!("read {}: {}", path.display(), e)))?;
    mcu.load_state(decode(&bytes)?);
    Ok(())
}

/// `build/gpio.hex` → `build/gpio.state`
pub fn state_path(image_path: &str) -> String {
    let p = Path::new(image_path);
    let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or("board");
    let dir = p.parent().unwrap_or(Path::new("."));
    dir.join(format!("{}.state", stem)).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fuses, Port};

    fn busy_mcu() -> Mcu {
        let mut mcu = Mcu::new(Fuses::crystal(8_000_000));
        mcu.write(regs::TRISB, 0x00);
        mcu.write(regs::PORTB, 0xA5);
        mcu.write(regs::T2CON, 0x04);
        mcu.set_pin(Port::A, 2, true);
        mcu.mem.eeprom[5] = 0x42;
        mcu.schedule_in_ms(3, Stimulus::Analog { channel: 0, value: 700 });
        mcu.advance(1234);
        mcu
    }

    #[test]
    fn test_state_survives_encode_decode() {
        let src = busy_mcu();
        let bytes = encode(&src.save_state()).unwrap();
        assert_eq!(&bytes[0..4], MAGIC);

        let mut dst = Mcu::default();
        dst.load_state(decode(&bytes).unwrap());
        assert_eq!(dst.cycle, src.cycle);
        assert_eq!(dst.fuses, src.fuses);
        assert_eq!(dst.mem.data, src.mem.data);
        assert_eq!(dst.mem.eeprom[5], 0x42);
        assert!(dst.pin(Port::A, 2));
        assert_eq!(dst.pending_stimuli(), 1);
        assert!(!dst.is_configured());
        // Timer2 keeps counting from where it was
        let tmr2 = dst.mem.get(regs::TMR2);
        dst.advance(1);
        assert_eq!(dst.mem.get(regs::TMR2), tmr2.wrapping_add(1));
    }

    #[test]
    fn test_rejects_bad_header() {
        let bytes = encode(&Mcu::default().save_state()).unwrap();

        let mut bad = bytes.clone();
        bad[0] = b'X';
        assert!(matches!(decode(&bad), Err(Error::SaveState(m)) if m.contains("magic")));

        let mut bad = bytes.clone();
        bad[4] = 99;
        assert!(matches!(decode(&bad), Err(Error::SaveState(m)) if m.contains("version")));

        let mut bad = bytes;
        bad[8] ^= 0xFF;
        assert!(matches!(decode(&bad), Err(Error::SaveState(m)) if m.contains("device")));

        assert!(decode(b"P16S").is_err());
    }

    #[test]
    fn test_state_path() {
        assert_eq!(state_path("build/gpio.hex"), "build/gpio.state");
    }
}
