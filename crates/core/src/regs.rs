//! PIC16F877A special function register map.
//!
//! Addresses are full 9-bit file addresses (bank already resolved), the
//! way the XC8 headers expose them. Registers mirrored in every bank
//! (STATUS, INTCON, ...) are folded onto their bank-0 address by
//! [`canonical`].

// ─── Bank 0 ─────────────────────────────────────────────────────────────────

pub const TMR0: u16 = 0x01;
pub const PCL: u16 = 0x02;
pub const STATUS: u16 = 0x03;
pub const FSR: u16 = 0x04;
pub const PORTA: u16 = 0x05;
pub const PORTB: u16 = 0x06;
pub const PORTC: u16 = 0x07;
pub const PORTD: u16 = 0x08;
pub const PORTE: u16 = 0x09;
pub const PCLATH: u16 = 0x0A;
pub const INTCON: u16 = 0x0B;
pub const PIR1: u16 = 0x0C;
pub const PIR2: u16 = 0x0D;
pub const TMR1L: u16 = 0x0E;
pub const TMR1H: u16 = 0x0F;
pub const T1CON: u16 = 0x10;
pub const TMR2: u16 = 0x11;
pub const T2CON: u16 = 0x12;
pub const SSPBUF: u16 = 0x13;
pub const SSPCON: u16 = 0x14;
pub const CCPR1L: u16 = 0x15;
pub const CCPR1H: u16 = 0x16;
pub const CCP1CON: u16 = 0x17;
pub const RCSTA: u16 = 0x18;
pub const TXREG: u16 = 0x19;
pub const RCREG: u16 = 0x1A;
pub const CCPR2L: u16 = 0x1B;
pub const CCPR2H: u16 = 0x1C;
pub const CCP2CON: u16 = 0x1D;
pub const ADRESH: u16 = 0x1E;
pub const ADCON0: u16 = 0x1F;

// ─── Bank 1 ─────────────────────────────────────────────────────────────────

pub const OPTION_REG: u16 = 0x81;
pub const TRISA: u16 = 0x85;
pub const TRISB: u16 = 0x86;
pub const TRISC: u16 = 0x87;
pub const TRISD: u16 = 0x88;
pub const TRISE: u16 = 0x89;
pub const PIE1: u16 = 0x8C;
pub const PIE2: u16 = 0x8D;
pub const PCON: u16 = 0x8E;
pub const SSPCON2: u16 = 0x91;
pub const PR2: u16 = 0x92;
pub const SSPADD: u16 = 0x93;
pub const SSPSTAT: u16 = 0x94;
pub const TXSTA: u16 = 0x98;
pub const SPBRG: u16 = 0x99;
pub const CMCON: u16 = 0x9C;
pub const CVRCON: u16 = 0x9D;
pub const ADRESL: u16 = 0x9E;
pub const ADCON1: u16 = 0x9F;

// ─── Bank 2 / 3 ─────────────────────────────────────────────────────────────

pub const EEDATA: u16 = 0x10C;
pub const EEADR: u16 = 0x10D;
pub const EEDATH: u16 = 0x10E;
pub const EEADRH: u16 = 0x10F;
pub const EECON1: u16 = 0x18C;
pub const EECON2: u16 = 0x18D;

// ─── Bit positions ──────────────────────────────────────────────────────────

// STATUS
pub const STATUS_NPD: u8 = 3;
pub const STATUS_NTO: u8 = 4;

// INTCON
pub const RBIF: u8 = 0;
pub const INTF: u8 = 1;
pub const T0IF: u8 = 2;
pub const RBIE: u8 = 3;
pub const INTE: u8 = 4;
pub const T0IE: u8 = 5;
pub const PEIE: u8 = 6;
pub const GIE: u8 = 7;

// PIR1 / PIE1 (flag and enable share positions)
pub const TMR1IF: u8 = 0;
pub const TMR2IF: u8 = 1;
pub const CCP1IF: u8 = 2;
pub const SSPIF: u8 = 3;
pub const TXIF: u8 = 4;
pub const RCIF: u8 = 5;
pub const ADIF: u8 = 6;
pub const PSPIF: u8 = 7;

// PIR2 / PIE2
pub const CCP2IF: u8 = 0;
pub const BCLIF: u8 = 3;
pub const EEIF: u8 = 4;

// OPTION_REG
pub const PSA: u8 = 3;
pub const T0SE: u8 = 4;
pub const T0CS: u8 = 5;
pub const INTEDG: u8 = 6;
pub const NRBPU: u8 = 7;

// T1CON
pub const TMR1ON: u8 = 0;
pub const TMR1CS: u8 = 1;
pub const T1SYNC: u8 = 2;
pub const T1OSCEN: u8 = 3;

// T2CON
pub const TMR2ON: u8 = 2;

// SSPCON
pub const CKP: u8 = 4;
pub const SSPEN: u8 = 5;
pub const SSPOV: u8 = 6;
pub const WCOL: u8 = 7;

// SSPCON2
pub const SEN: u8 = 0;
pub const RSEN: u8 = 1;
pub const PEN: u8 = 2;
pub const RCEN: u8 = 3;
pub const ACKEN: u8 = 4;
pub const ACKDT: u8 = 5;
pub const ACKSTAT: u8 = 6;
pub const GCEN: u8 = 7;

// SSPSTAT
pub const BF: u8 = 0;
pub const UA: u8 = 1;
pub const R_NW: u8 = 2;
pub const S_BIT: u8 = 3;
pub const P_BIT: u8 = 4;
pub const D_NA: u8 = 5;
pub const CKE: u8 = 6;
pub const SMP: u8 = 7;

// TXSTA
pub const TRMT: u8 = 1;
pub const BRGH: u8 = 2;
pub const SYNC: u8 = 4;
pub const TXEN: u8 = 5;
pub const TX9: u8 = 6;
pub const CSRC: u8 = 7;

// RCSTA
pub const OERR: u8 = 1;
pub const FERR: u8 = 2;
pub const CREN: u8 = 4;
pub const RX9: u8 = 6;
pub const SPEN: u8 = 7;

// ADCON0
pub const ADON: u8 = 0;
pub const GO_DONE: u8 = 2;

// ADCON1
pub const ADCS2: u8 = 6;
pub const ADFM: u8 = 7;

// EECON1
pub const RD: u8 = 0;
pub const WR: u8 = 1;
pub const WREN: u8 = 2;
pub const WRERR: u8 = 3;
pub const EEPGD: u8 = 7;

/// Fold bank mirrors onto a single address.
pub fn canonical(addr: u16) -> u16 {
    let addr = addr & 0x1FF;
    match addr {
        0x80 | 0x100 | 0x180 => 0x00,
        0x82 | 0x102 | 0x182 => PCL,
        0x83 | 0x103 | 0x183 => STATUS,
        0x84 | 0x104 | 0x184 => FSR,
        0x8A | 0x10A | 0x18A => PCLATH,
        0x8B | 0x10B | 0x18B => INTCON,
        0x101 => TMR0,
        0x106 => PORTB,
        0x181 => OPTION_REG,
        0x186 => TRISB,
        // 16 bytes of common RAM at the top of every bank
        0xF0..=0xFF | 0x170..=0x17F | 0x1F0..=0x1FF => 0x70 + (addr & 0x0F),
        _ => addr,
    }
}

/// Bit mask helper.
#[inline(always)]
pub const fn bit(n: u8) -> u8 {
    1 << n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_mirrors() {
        assert_eq!(canonical(0x8B), INTCON);
        assert_eq!(canonical(0x18B), INTCON);
        assert_eq!(canonical(0x186), TRISB);
        assert_eq!(canonical(0x1F3), 0x73);
        assert_eq!(canonical(TRISD), TRISD);
        assert_eq!(canonical(EECON1), EECON1);
    }
}
