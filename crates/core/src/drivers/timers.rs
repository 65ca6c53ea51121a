//! Timer0, Timer1 and Timer2 configurators.

use crate::config::{Timer0Mode, Timer0Source, Timer1Mode, Timer1Source, Timer2Mode};
use crate::regs::{self, bit, OPTION_REG, PR2, T1CON, T2CON, TMR0, TMR1H, TMR1L, TMR2, TRISA, TRISC};
use crate::{Irq, Mcu};

/// PS2:PS0 for a Timer0 prescale ratio (2..=256), rounded down to a power
/// of two.
fn timer0_ps(ratio: u16) -> u8 {
    let r = ratio.clamp(2, 256);
    (15 - r.leading_zeros() as u8 - 1).min(7)
}

/// OPTION_REG timer bits, then TMR0 = 0. INTEDG and nRBPU are preserved.
pub fn init_timer0(mcu: &mut Mcu, mode: &Timer0Mode) {
    let keep = bit(regs::NRBPU) | bit(regs::INTEDG);
    let mut opt = mcu.read(OPTION_REG) & (keep | 0x07);
    if let Timer0Source::External { falling } = mode.source {
        mcu.set_bit(TRISA, 4);
        opt |= bit(regs::T0CS);
        if falling {
            opt |= bit(regs::T0SE);
        }
    }
    match mode.prescale {
        Some(r) => opt = (opt & !0x07) | timer0_ps(r),
        None => opt |= bit(regs::PSA),
    }
    mcu.write(OPTION_REG, opt);
    mcu.write(TMR0, 0);
    if mode.interrupt {
        super::enable_irq(mcu, Irq::Timer0);
    }
}

/// T1CON with TMR1ON, TMR1 cleared first.
pub fn init_timer1(mcu: &mut Mcu, mode: &Timer1Mode) {
    let ps = match mode.prescale {
        0 | 1 => 0,
        2 => 1,
        4 => 2,
        _ => 3,
    };
    let mut con = (ps << 4) | bit(regs::TMR1ON);
    if let Timer1Source::External { oscillator, synchronize } = mode.source {
        con |= bit(regs::TMR1CS);
        if oscillator {
            con |= bit(regs::T1OSCEN);
        } else {
            mcu.set_bit(TRISC, 0);
        }
        if !synchronize {
            con |= bit(regs::T1SYNC);
        }
    }
    mcu.write(TMR1H, 0);
    mcu.write(TMR1L, 0);
    mcu.write(T1CON, con);
    if mode.interrupt {
        super::enable_irq(mcu, Irq::Timer1);
    }
}

/// T2CKPS bits for a Timer2 prescale (1, 4 or 16).
pub fn timer2_ckps(prescale: u8) -> u8 {
    match prescale {
        0 | 1 => 0b00,
        2..=4 => 0b01,
        _ => 0b10,
    }
}

/// PR2, TMR2 = 0, then T2CON with TMR2ON.
pub fn init_timer2(mcu: &mut Mcu, mode: &Timer2Mode) {
    let post = mode.postscale.clamp(1, 16) - 1;
    mcu.write(PR2, mode.period);
    mcu.write(TMR2, 0);
    mcu.write(T2CON, (post << 3) | bit(regs::TMR2ON) | timer2_ckps(mode.prescale));
    if mode.interrupt {
        super::enable_irq(mcu, Irq::Timer2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fuses, Port};

    #[test]
    fn test_timer0_prescale_bits() {
        assert_eq!(timer0_ps(2), 0);
        assert_eq!(timer0_ps(4), 1);
        assert_eq!(timer0_ps(256), 7);
        assert_eq!(timer0_ps(100), 5);
    }

    #[test]
    fn test_timer0_counts_ra4_edges() {
        let mut mcu = Mcu::default();
        init_timer0(&mut mcu, &Timer0Mode {
            source: Timer0Source::External { falling: false },
            prescale: None,
            interrupt: false,
        });
        let opt = mcu.mem.get(OPTION_REG);
        assert!(opt & bit(regs::T0CS) != 0);
        assert!(opt & bit(regs::PSA) != 0);
        assert!(opt & bit(regs::T0SE) == 0);
        mcu.advance(4); // TMR0 write holds the count for two cycles
        for _ in 0..7 {
            mcu.set_pin(Port::A, 4, true);
            mcu.advance(3);
            mcu.set_pin(Port::A, 4, false);
            mcu.advance(3);
        }
        assert_eq!(mcu.mem.get(TMR0), 7);
    }

    #[test]
    fn test_timer1_internal() {
        let mut mcu = Mcu::default();
        init_timer1(&mut mcu, &Timer1Mode { source: Timer1Source::Internal, prescale: 8, interrupt: true });
        assert_eq!(mcu.mem.get(T1CON), 0x31);
        assert!(mcu.mem.bit(regs::PIE1, regs::TMR1IF));
        mcu.advance(800);
        let t = mcu.mem.word(TMR1L);
        assert!((99..=101).contains(&t), "{}", t);
    }

    #[test]
    fn test_timer2_one_ms_tick() {
        let mut mcu = Mcu::new(Fuses::crystal(8_000_000));
        init_timer2(&mut mcu, &Timer2Mode { prescale: 16, postscale: 1, period: 124, interrupt: false });
        assert_eq!(mcu.mem.get(T2CON), 0x06);
        mcu.mem.set_bit(regs::PIR1, regs::TMR2IF, false);
        mcu.advance(1900);
        assert!(!mcu.mem.bit(regs::PIR1, regs::TMR2IF));
        mcu.advance(200);
        assert!(mcu.mem.bit(regs::PIR1, regs::TMR2IF));
    }
}
