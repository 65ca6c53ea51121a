//! SPI slave with slave select. The interrupt handler hands each received
//! byte to the main loop, which mirrors it on PORTB.

use std::sync::Arc;

use crate::config::{PeripheralMode, SpiMode};
use crate::drivers::{self, gpio};
use crate::regs::{PIR1, SSPBUF, SSPIF};
use crate::{Event, Firmware, InitCtx, IrqCtx, MainCtx, Mcu, Port, Publish, Result, SharedCell};

#[derive(Default)]
pub struct SpiSlaveDemo {
    received: Arc<SharedCell<u8>>,
}

impl SpiSlaveDemo {
    pub fn received(&self) -> Arc<SharedCell<u8>> {
        Arc::clone(&self.received)
    }
}

impl Firmware for SpiSlaveDemo {
    fn name(&self) -> &'static str {
        "spi-slave"
    }

    fn attach_devices(&self, mcu: &mut Mcu) {
        // The external master keeps this slave selected
        mcu.set_pin(Port::A, 5, false);
    }

    fn configure(&mut self, mcu: &mut Mcu, _init: &InitCtx) -> Result<()> {
        let cell = Arc::clone(&self.received);
        mcu.attach_isr(move |m: &mut Mcu, irq: &IrqCtx| -> Result<()> {
            if m.test_bit(PIR1, SSPIF) {
                let byte = m.read(SSPBUF);
                if cell.publish(irq, byte) == Publish::Overwrote {
                    m.log(Event::LostUpdate { what: "SPI slave byte" });
                }
                m.clear_bit(PIR1, SSPIF);
            }
            Ok(())
        });
        let mode = SpiMode {
            clock_idle_high: false,
            transmit_on_active_edge: false,
            sample_at_end: false,
            interrupt: true,
        };
        drivers::configure(mcu, &PeripheralMode::SpiSlave { slave_select: true, mode });
        gpio::set_tris(mcu, Port::B, 0x00);
        drivers::enable_global_interrupts(mcu);
        Ok(())
    }

    fn poll(&mut self, mcu: &mut Mcu, main: &MainCtx) -> Result<()> {
        let data = self.received.latest(main);
        gpio::write_port(mcu, Port::B, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SimConfig, Stimulus};

    #[test]
    fn test_received_byte_on_portb() {
        let mut fw = SpiSlaveDemo::default();
        let mut mcu = Mcu::for_firmware(&fw, SimConfig::default());
        mcu.run(&mut fw, 1).unwrap();
        assert_eq!(mcu.port_levels()[Port::B.index()], 0);

        mcu.apply(Stimulus::SpiFromMaster(0x5A));
        mcu.run(&mut fw, 2).unwrap();
        assert_eq!(mcu.port_levels()[Port::B.index()], 0x5A);
        assert_eq!(fw.received().published(), 1);
    }

    #[test]
    fn test_deselected_slave_ignores_bytes() {
        let mut fw = SpiSlaveDemo::default();
        let mut mcu = Mcu::for_firmware(&fw, SimConfig::default());
        mcu.run(&mut fw, 1).unwrap();
        mcu.set_pin(Port::A, 5, true);
        mcu.apply(Stimulus::SpiFromMaster(0x33));
        mcu.run(&mut fw, 2).unwrap();
        assert_eq!(mcu.port_levels()[Port::B.index()], 0);
        assert!(mcu.events.count(|e| matches!(e, Event::SpiSlaveNotSelected { byte: 0x33 })) > 0);
    }
}
