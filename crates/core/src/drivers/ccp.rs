//! CCP1 / CCP2: capture, compare and PWM.
//!
//! Capture and compare run against Timer1 and PWM against Timer2; the
//! timers are configured separately (see [`super::timers`]).

use crate::config::{CaptureEdge, CaptureMode, CcpChannel, CompareAction, CompareMode, PwmMode};
use crate::regs::{self, TRISC};
use crate::{Irq, Mcu};

fn con(channel: CcpChannel) -> u16 {
    match channel {
        CcpChannel::Ccp1 => regs::CCP1CON,
        CcpChannel::Ccp2 => regs::CCP2CON,
    }
}

fn ccpr(channel: CcpChannel) -> u16 {
    match channel {
        CcpChannel::Ccp1 => regs::CCPR1L,
        CcpChannel::Ccp2 => regs::CCPR2L,
    }
}

/// PORTC bit of the module's pin (RC2 / RC1).
pub fn pin_bit(channel: CcpChannel) -> u8 {
    match channel {
        CcpChannel::Ccp1 => 2,
        CcpChannel::Ccp2 => 1,
    }
}

pub fn irq(channel: CcpChannel) -> Irq {
    match channel {
        CcpChannel::Ccp1 => Irq::Ccp1,
        CcpChannel::Ccp2 => Irq::Ccp2,
    }
}

pub fn init_capture(mcu: &mut Mcu, mode: &CaptureMode) {
    mcu.set_bit(TRISC, pin_bit(mode.channel));
    let m = match mode.edge {
        CaptureEdge::Falling => 0b0100,
        CaptureEdge::Rising => 0b0101,
        CaptureEdge::Every4thRising => 0b0110,
        CaptureEdge::Every16thRising => 0b0111,
    };
    mcu.write(con(mode.channel), m);
    if mode.interrupt {
        super::enable_irq(mcu, irq(mode.channel));
    }
}

/// CCPRx first, then the mode. Set/clear actions take over the pin.
pub fn init_compare(mcu: &mut Mcu, mode: &CompareMode) {
    mcu.write_word(ccpr(mode.channel), mode.value);
    let m = match mode.action {
        CompareAction::SetOutput => 0b1000,
        CompareAction::ClearOutput => 0b1001,
        CompareAction::SoftwareInterrupt => 0b1010,
        CompareAction::SpecialEvent => 0b1011,
    };
    if matches!(mode.action, CompareAction::SetOutput | CompareAction::ClearOutput) {
        mcu.clear_bit(TRISC, pin_bit(mode.channel));
    }
    mcu.write(con(mode.channel), m);
    if mode.interrupt {
        super::enable_irq(mcu, irq(mode.channel));
    }
}

/// Captured (or compare) value.
pub fn read_value(mcu: &mut Mcu, channel: CcpChannel) -> u16 {
    mcu.read_word(ccpr(channel))
}

/// PWM output on the module pin. Timer2 sets the period.
pub fn init_pwm(mcu: &mut Mcu, mode: &PwmMode) {
    mcu.clear_bit(TRISC, pin_bit(mode.channel));
    mcu.write(ccpr(mode.channel), mode.duty);
    mcu.write(con(mode.channel), 0x0C);
}

/// 8-bit duty: CCPRxL only, DCxB1:0 untouched.
pub fn set_duty(mcu: &mut Mcu, channel: CcpChannel, duty: u8) {
    mcu.write(ccpr(channel), duty);
}

/// Full 10-bit duty.
pub fn set_duty10(mcu: &mut Mcu, channel: CcpChannel, duty: u16) {
    let c = mcu.read(con(channel));
    mcu.write(con(channel), (c & !0x30) | (((duty & 0x03) as u8) << 4));
    mcu.write(ccpr(channel), (duty >> 2) as u8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Timer1Mode, Timer1Source, Timer2Mode};
    use crate::drivers::timers;
    use crate::Port;

    #[test]
    fn test_capture_latches_timer1() {
        let mut mcu = Mcu::default();
        timers::init_timer1(&mut mcu, &Timer1Mode { source: Timer1Source::Internal, prescale: 1, interrupt: false });
        init_capture(&mut mcu, &CaptureMode { channel: CcpChannel::Ccp1, edge: CaptureEdge::Rising, interrupt: true });
        mcu.advance(100);
        mcu.set_pin(Port::C, 2, true);
        mcu.advance(1);
        assert!(mcu.mem.bit(regs::PIR1, regs::CCP1IF));
        let v = read_value(&mut mcu, CcpChannel::Ccp1);
        assert!((100..=110).contains(&v), "{}", v);
    }

    #[test]
    fn test_compare_special_event_resets_timer1() {
        let mut mcu = Mcu::default();
        init_compare(&mut mcu, &CompareMode {
            channel: CcpChannel::Ccp1,
            value: 500,
            action: CompareAction::SpecialEvent,
            interrupt: false,
        });
        timers::init_timer1(&mut mcu, &Timer1Mode { source: Timer1Source::Internal, prescale: 1, interrupt: false });
        mcu.advance(520);
        assert!(mcu.mem.bit(regs::PIR1, regs::CCP1IF));
        assert!(mcu.mem.word(regs::TMR1L) < 30);
    }

    #[test]
    fn test_pwm_duty() {
        let mut mcu = Mcu::default();
        timers::init_timer2(&mut mcu, &Timer2Mode { prescale: 1, postscale: 1, period: 255, interrupt: false });
        init_pwm(&mut mcu, &PwmMode { channel: CcpChannel::Ccp2, duty: 64 });
        mcu.advance(2048);
        mcu.ccp2.take_measured_duty();
        mcu.advance(1024);
        let d = mcu.ccp2.take_measured_duty().unwrap();
        assert!((d - 0.25).abs() < 0.02, "{}", d);
        set_duty10(&mut mcu, CcpChannel::Ccp2, 0x201);
        assert_eq!(mcu.mem.get(regs::CCPR2L), 0x80);
        assert_eq!(mcu.mem.get(regs::CCP2CON), 0x1C);
    }
}
