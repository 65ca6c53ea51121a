//! Intel HEX import and export for the data EEPROM.
//!
//! Parses Intel HEX strings (`:LLAAAATT[DD...]CC`) with record types 00
//! (data), 01 (EOF), 02 (extended segment address) and 04 (extended
//! linear address). PIC toolchains place the data EEPROM at byte address
//! 0x4200 with one EEPROM byte per 14-bit program word, i.e. only the low
//! byte of each word pair is used. Bytes outside that window (program
//! memory, configuration word) are ignored.

use crate::{Error, Result, EEPROM_SIZE};

/// Byte address of EEPROM location 0 in a PIC16 hex image.
pub const EEPROM_BASE: u32 = 0x4200;

/// Load EEPROM bytes from an Intel HEX image. Returns the number of
/// EEPROM locations written.
pub fn parse_hex(hex: &str, eeprom: &mut [u8]) -> Result<usize> {
    let mut loaded = 0usize;
    let mut base_addr: u32 = 0;

    for (lineno, line) in hex.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() { continue; }
        let Some(body) = line.strip_prefix(':') else {
            return Err(Error::Hex(format!("line {}: missing ':'", lineno + 1)));
        };

        let bytes = hex_line_to_bytes(body)
            .map_err(|e| Error::Hex(format!("line {}: {}", lineno + 1, e)))?;
        if bytes.len() < 5 {
            return Err(Error::Hex(format!("line {}: record too short", lineno + 1)));
        }

        let byte_count = bytes[0] as usize;
        if bytes.len() != byte_count + 5 {
            return Err(Error::Hex(format!("line {}: length mismatch", lineno + 1)));
        }
        let addr = ((bytes[1] as u32) << 8) | bytes[2] as u32;
        let record_type = bytes[3];

        let sum: u8 = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        if sum != 0 {
            return Err(Error::Hex(format!("line {}: checksum error", lineno + 1)));
        }

        let data = &bytes[4..4 + byte_count];
        match record_type {
            0x00 => {
                let start = base_addr + addr;
                for (i, &b) in data.iter().enumerate() {
                    if let Some(slot) = eeprom_slot(start + i as u32) {
                        if slot < eeprom.len() {
                            eeprom[slot] = b;
                            loaded += 1;
                        }
                    }
                }
            }
            0x01 => break,
            0x02 if byte_count == 2 => {
                base_addr = (((data[0] as u32) << 8) | data[1] as u32) << 4;
            }
            0x04 if byte_count == 2 => {
                base_addr = (((data[0] as u32) << 8) | data[1] as u32) << 16;
            }
            0x02 | 0x04 => {
                return Err(Error::Hex(format!("line {}: bad address record", lineno + 1)));
            }
            // Start address records carry nothing loadable
            _ => {}
        }
    }

    Ok(loaded)
}

/// EEPROM index for a byte address, if it is the low byte of an EEPROM word.
fn eeprom_slot(byte_addr: u32) -> Option<usize> {
    let off = byte_addr.checked_sub(EEPROM_BASE)?;
    if off % 2 != 0 { return None; }
    let slot = (off / 2) as usize;
    (slot < EEPROM_SIZE).then_some(slot)
}

/// Export an EEPROM image as Intel HEX at [`EEPROM_BASE`], 8 locations
/// (16 bytes) per record.
pub fn eeprom_to_hex(eeprom: &[u8]) -> String {
    let mut s = String::new();
    for (n, chunk) in eeprom.chunks(8).enumerate() {
        let addr = EEPROM_BASE as usize + n * 16;
        let mut rec = vec![(chunk.len() * 2) as u8, (addr >> 8) as u8, addr as u8, 0x00];
        for &b in chunk {
            rec.push(b);
            rec.push(0x00);
        }
        push_record(&mut s, &rec);
    }
    push_record(&mut s, &[0x00, 0x00, 0x00, 0x01]);
    s
}

fn push_record(s: &mut String, rec: &[u8]) {
    let sum = rec.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    s.push(':');
    for b in rec {
        s.push_str(&format!("{:02X}", b));
    }
    s.push_str(&format!("{:02X}\n", sum.wrapping_neg()));
}

/// Convert hex character pairs to bytes
fn hex_line_to_bytes(hex_str: &str) -> std::result::Result<Vec<u8>, String> {
    let chars = hex_str.as_bytes();
    if chars.len() % 2 != 0 {
        return Err("odd number of hex characters".into());
    }
    chars
        .chunks(2)
        .map(|pair| Ok((hex_char(pair[0])? << 4) | hex_char(pair[1])?))
        .collect()
}

fn hex_char(c: u8) -> std::result::Result<u8, String> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(format!("invalid hex character {:?}", c as char)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eeprom_record() {
        // ORG 0x2100 (word) -> byte 0x4200, DE 0x12, 0x34
        let hex = ":020000040000FA\n:044200001200340074\n:00000001FF\n";
        let mut ee = vec![0xFFu8; EEPROM_SIZE];
        assert_eq!(parse_hex(hex, &mut ee).unwrap(), 2);
        assert_eq!(ee[0], 0x12);
        assert_eq!(ee[1], 0x34);
        assert_eq!(ee[2], 0xFF);
    }

    #[test]
    fn test_program_words_ignored() {
        let hex = ":100000000C9434000C944E000C944E000C944E0052\n:00000001FF\n";
        let mut ee = vec![0xFFu8; EEPROM_SIZE];
        assert_eq!(parse_hex(hex, &mut ee).unwrap(), 0);
        assert!(ee.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_checksum_error() {
        let hex = ":100000000C9434000C944E000C944E000C944E00FF\n:00000001FF\n";
        let mut ee = vec![0u8; EEPROM_SIZE];
        assert!(matches!(parse_hex(hex, &mut ee), Err(Error::Hex(m)) if m.contains("checksum")));
    }

    #[test]
    fn test_export_reimports() {
        let mut ee = vec![0xFFu8; EEPROM_SIZE];
        ee[5] = 0x5A;
        ee[255] = 0x01;
        let text = eeprom_to_hex(&ee);
        assert!(text.starts_with(":10420000"));
        assert!(text.ends_with(":00000001FF\n"));

        let mut back = vec![0u8; EEPROM_SIZE];
        assert_eq!(parse_hex(&text, &mut back).unwrap(), EEPROM_SIZE);
        assert_eq!(back, ee);
    }

    #[test]
    fn test_slot_window() {
        assert_eq!(eeprom_slot(0x4200), Some(0));
        assert_eq!(eeprom_slot(0x4201), None);
        assert_eq!(eeprom_slot(0x43FE), Some(255));
        assert_eq!(eeprom_slot(0x4400), None);
        assert_eq!(eeprom_slot(0x400E), None);
    }
}
