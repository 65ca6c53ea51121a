//! End-to-end runs of the catalog demos on a freshly built board.

use pic16_core::demos::{self, catalog};
use pic16_core::{hex, savestate, Error, Mcu, Port, SimConfig, Stimulus};

fn board(name: &str) -> (Box<dyn pic16_core::Firmware>, Mcu) {
    let fw = demos::by_name(name).unwrap();
    let mcu = Mcu::for_firmware(fw.as_ref(), SimConfig::default());
    (fw, mcu)
}

#[test]
fn test_every_demo_boots_and_polls() {
    for info in catalog() {
        let mut fw = info.build();
        let mut mcu = Mcu::for_firmware(fw.as_ref(), SimConfig::default());
        let report = mcu
            .run(fw.as_mut(), 50)
            .unwrap_or_else(|e| panic!("{}: {}", info.name, e));
        assert!(mcu.is_configured(), "{}", info.name);
        assert!(report.polls >= 1, "{}", info.name);
        assert_eq!(report.watchdog_resets, 0, "{}", info.name);
    }
}

#[test]
fn test_unknown_demo_name() {
    assert!(matches!(demos::by_name("lcd"), Err(Error::UnknownDemo(n)) if n == "lcd"));
}

#[test]
fn test_gpio_scheduled_press() {
    let (mut fw, mut mcu) = board("gpio");
    mcu.schedule_in_ms(2, Stimulus::Pin { port: Port::B, bit: 1, level: false });
    mcu.run(fw.as_mut(), 1).unwrap();
    assert!(!mcu.pin(Port::B, 0));
    mcu.run(fw.as_mut(), 3).unwrap();
    assert!(mcu.pin(Port::B, 0));
}

#[test]
fn test_adc_scheduled_input() {
    let (mut fw, mut mcu) = board("adc");
    mcu.apply(Stimulus::Analog { channel: 0, value: 800 });
    mcu.run(fw.as_mut(), 10).unwrap();
    assert_eq!(mcu.port_levels()[Port::B.index()] & 0x0F, 0b0111);
}

#[test]
fn test_uart_echo_via_stimulus() {
    let (mut fw, mut mcu) = board("uart");
    mcu.run(fw.as_mut(), 600).unwrap();
    mcu.take_uart_output();
    mcu.apply(Stimulus::UartRx(b"PIC\n".to_vec()));
    mcu.run(fw.as_mut(), 700).unwrap();
    let out = String::from_utf8_lossy(&mcu.take_uart_output()).into_owned();
    assert!(out.contains("PIC"), "{out:?}");
}

#[test]
fn test_eeprom_preloaded_from_hex() {
    let (mut fw, mut mcu) = board("eeprom");
    let mut image = vec![0xFFu8; pic16_core::EEPROM_SIZE];
    image[demos::eeprom::SLOT as usize] = 0x3C;
    let text = hex::eeprom_to_hex(&image);

    let mut ee = vec![0xFFu8; pic16_core::EEPROM_SIZE];
    hex::parse_hex(&text, &mut ee).unwrap();
    mcu.load_eeprom(&ee);
    mcu.run(fw.as_mut(), 1).unwrap();
    assert_eq!(mcu.port_levels()[Port::D.index()], 0x3C);
}

#[test]
fn test_timer_resumes_from_save_state() {
    let (mut fw, mut mcu) = board("timer");
    mcu.run(fw.as_mut(), 1500).unwrap();
    mcu.take_uart_output();
    let bytes = savestate::encode(&mcu.save_state()).unwrap();
    let saved_cycle = mcu.cycle;
    let saved_irqs = mcu.interrupts;

    let (mut fw2, mut restored) = board("timer");
    restored.load_state(savestate::decode(&bytes).unwrap());
    assert_eq!(restored.cycle, saved_cycle);
    let report = restored.run(fw2.as_mut(), 500).unwrap();
    assert!(report.interrupts >= 400);
    assert!(restored.interrupts > saved_irqs);
    let out = String::from_utf8(restored.take_uart_output()).unwrap();
    assert!(out.starts_with("LOOP EXECUTE 1\r\n"), "{out:?}");
}
