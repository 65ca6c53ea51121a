//! Virtual PIC16F877A demo board.
//!
//! Provides two execution modes:
//!
//! - **GUI mode** (default): LED panel for PORTA..PORTE, PWM and R-2R DAC
//!   bars, keyboard pin input and an AN0 potentiometer. UART output goes
//!   to stdout.
//! - **Headless mode** (`--headless`): scripted run with stimuli from the
//!   command line; prints UART output, final pin levels and optional dumps.
//!
//! Stimulus syntax (all repeatable, `@MS` schedules relative to start):
//! - `--pin B1=0[@MS]` drive RB1 low; `=1` high, `=z` release
//! - `--analog 0=600[@MS]` AN0 as a 10-bit code, or `0=2500mV`
//! - `--uart 'text\r'[@MS]` bytes on RX (`\r`, `\n` escapes)

use minifb::{Key, Scale, ScaleMode, Window, WindowOptions};
use pic16_core::peripherals::ADC_MAX;
use pic16_core::{
    demos, hex, savestate, Firmware, Mcu, Port, ResetCause, SimConfig, Stimulus, WatchdogPolicy,
};
use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

/// LED cell size in base pixels
const CELL: usize = 16;
const MARGIN: usize = 8;
const PANEL_W: usize = MARGIN * 2 + CELL * 8;
/// Five port rows, then CCP1, CCP2, DAC and AN0 bars
const PANEL_H: usize = MARGIN * 2 + CELL * 9;
/// Simulated time per GUI frame
const FRAME_MS: u64 = 16;

const COL_BG: u32 = 0x202020;
const COL_OUT_HI: u32 = 0x30E040;
const COL_OUT_LO: u32 = 0x103818;
const COL_IN_HI: u32 = 0x4080FF;
const COL_IN_LO: u32 = 0x182848;
const COL_SELECT: u32 = 0xE0C030;
const COL_CCP1: u32 = 0xE04040;
const COL_CCP2: u32 = 0x40E040;
const COL_DAC: u32 = 0xC0C0C0;
const COL_ANALOG: u32 = 0xE08030;
const COL_TRACK: u32 = 0x383838;

struct Options {
    demo: String,
    headless: bool,
    ms: u64,
    debug: bool,
    dump: bool,
    scale: usize,
    eeprom: Option<String>,
    eeprom_hex: Option<String>,
    save_state: Option<String>,
    load_state: Option<String>,
    stimuli: Vec<(Option<u64>, Stimulus)>,
}

fn usage(prog: &str) {
    eprintln!("PIC16F877A virtual board v0.3.0");
    eprintln!("Usage: {} <demo> [options]", prog);
    eprintln!("       {} --list", prog);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --headless           Run without GUI");
    eprintln!("  --ms N               Simulated milliseconds (headless, default 1000)");
    eprintln!("  --debug              Echo events, profile interrupts");
    eprintln!("  --pin P=L[@MS]       Drive or release a pin (repeatable)");
    eprintln!("  --analog CH=V[@MS]   Analog input, code or mV (repeatable)");
    eprintln!("  --uart TEXT[@MS]     Bytes on UART RX (repeatable)");
    eprintln!("  --eeprom FILE        Raw 256-byte EEPROM image, written back on exit");
    eprintln!("  --eeprom-hex FILE    Preload EEPROM from Intel HEX");
    eprintln!("  --save-state FILE    Save state on exit");
    eprintln!("  --load-state FILE    Load state before running");
    eprintln!("  --dump               Print SFRs and general purpose RAM on exit");
    eprintln!("  --scale N            Initial scale 1-6 (default 3)");
    eprintln!();
    eprintln!("GUI keys: Left/Right=Port 0-7=Toggle pin Up/Down=AN0");
    eprintln!("          D=SFR dump P=Profile R=Power cycle Esc=Quit");
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("pic16-board");
    if args.iter().any(|a| a == "--list") {
        for d in demos::catalog() {
            println!("  {:<12} {}", d.name, d.summary);
        }
        return;
    }
    if args.len() < 2 || args[1].starts_with("--") {
        usage(prog);
        std::process::exit(1);
    }

    let opts = match parse_args(&args) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = run(&opts) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(opts: &Options) -> Result<(), String> {
    let mut fw = demos::by_name(&opts.demo).map_err(|e| e.to_string())?;
    // A real board restarts on watchdog expiry
    let sim = SimConfig { watchdog_policy: WatchdogPolicy::Restart, ..SimConfig::default() };
    let mut mcu = Mcu::for_firmware(fw.as_ref(), sim);
    mcu.debug = opts.debug;

    if let Some(path) = &opts.load_state {
        savestate::load_from_file(&mut mcu, Path::new(path)).map_err(|e| e.to_string())?;
        mcu.sim.watchdog_policy = WatchdogPolicy::Restart;
        if opts.debug { println!("Loaded state {} at cycle {}", path, mcu.cycle); }
    }
    if let Some(path) = &opts.eeprom {
        if Path::new(path).exists() {
            let image = fs::read(path).map_err(|e| format!("{}: {}", path, e))?;
            mcu.load_eeprom(&image);
            if opts.debug { println!("EEPROM: {} ({} bytes)", path, image.len()); }
        }
    }
    if let Some(path) = &opts.eeprom_hex {
        let text = fs::read_to_string(path).map_err(|e| format!("{}: {}", path, e))?;
        let mut image = mcu.eeprom_image().to_vec();
        let n = hex::parse_hex(&text, &mut image).map_err(|e| e.to_string())?;
        mcu.load_eeprom(&image);
        if opts.debug { println!("EEPROM: {} locations from {}", n, path); }
    }
    if opts.debug {
        mcu.profiler.start(mcu.cycle);
    }
    for (at, s) in &opts.stimuli {
        match at {
            Some(ms) => mcu.schedule_in_ms(*ms, s.clone()),
            None => mcu.apply(s.clone()),
        }
    }

    let result = if opts.headless {
        run_headless(opts, &mut mcu, fw.as_mut())
    } else {
        run_gui(opts, &mut mcu, fw.as_mut())
    };

    if let Some(path) = &opts.eeprom {
        fs::write(path, mcu.eeprom_image()).map_err(|e| format!("{}: {}", path, e))?;
    }
    if let Some(path) = &opts.save_state {
        savestate::save_to_file(&mcu, Path::new(path)).map_err(|e| e.to_string())?;
        if opts.debug { println!("Saved state {}", path); }
    }
    if opts.dump {
        println!("--- SFRs (cycle {}) ---\n{}", mcu.cycle, mcu.dump_sfrs_all());
        println!("--- GPR bank 0 ---\n{}", mcu.dump_ram(0x20, 0x60));
    }
    if opts.debug {
        mcu.profiler.stop(mcu.cycle);
        print!("{}", mcu.profiler_report());
    }
    result
}

// ─── Argument parsing ───────────────────────────────────────────────────────

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn flag_values<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            if let Some(v) = args.get(i + 1) { out.push(v.as_str()); }
            i += 2;
        } else { i += 1; }
    }
    out
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let ms = match flag_value(args, "--ms") {
        Some(s) => s.parse().map_err(|_| format!("bad --ms value {:?}", s))?,
        None => 1000,
    };
    let scale = flag_value(args, "--scale")
        .and_then(|s| s.parse().ok())
        .unwrap_or(3usize)
        .clamp(1, 6);

    let mut stimuli = Vec::new();
    for v in flag_values(args, "--pin") {
        let (body, at) = split_time(v)?;
        stimuli.push((at, parse_pin(body)?));
    }
    for v in flag_values(args, "--analog") {
        let (body, at) = split_time(v)?;
        stimuli.push((at, parse_analog(body)?));
    }
    for v in flag_values(args, "--uart") {
        let (body, at) = split_time(v)?;
        stimuli.push((at, Stimulus::UartRx(unescape(body))));
    }

    Ok(Options {
        demo: args[1].clone(),
        headless: args.iter().any(|a| a == "--headless"),
        ms,
        debug: args.iter().any(|a| a == "--debug"),
        dump: args.iter().any(|a| a == "--dump"),
        scale,
        eeprom: flag_value(args, "--eeprom").map(String::from),
        eeprom_hex: flag_value(args, "--eeprom-hex").map(String::from),
        save_state: flag_value(args, "--save-state").map(String::from),
        load_state: flag_value(args, "--load-state").map(String::from),
        stimuli,
    })
}

/// `body@ms` → (`body`, Some(ms))
fn split_time(s: &str) -> Result<(&str, Option<u64>), String> {
    match s.rsplit_once('@') {
        Some((body, t)) => {
            let ms = t.parse().map_err(|_| format!("bad time in {:?}", s))?;
            Ok((body, Some(ms)))
        }
        None => Ok((s, None)),
    }
}

/// `B1=0`, `a4=1`, `C0=z`
fn parse_pin(s: &str) -> Result<Stimulus, String> {
    let err = || format!("bad pin {:?} (expected e.g. B1=0)", s);
    let (pin, level) = s.split_once('=').ok_or_else(err)?;
    let mut chars = pin.chars();
    let port = match chars.next().map(|c| c.to_ascii_uppercase()) {
        Some('A') => Port::A,
        Some('B') => Port::B,
        Some('C') => Port::C,
        Some('D') => Port::D,
        Some('E') => Port::E,
        _ => return Err(err()),
    };
    let bit: u8 = chars.as_str().parse().map_err(|_| err())?;
    if bit > 7 || port.width_mask() & (1 << bit) == 0 {
        return Err(format!("R{:?}{} is not implemented", port, bit));
    }
    match level {
        "0" => Ok(Stimulus::Pin { port, bit, level: false }),
        "1" => Ok(Stimulus::Pin { port, bit, level: true }),
        "z" | "Z" => Ok(Stimulus::Release { port, bit }),
        _ => Err(err()),
    }
}

/// `0=600` or `0=2500mV`
fn parse_analog(s: &str) -> Result<Stimulus, String> {
    let err = || format!("bad analog input {:?} (expected e.g. 0=600)", s);
    let (ch, v) = s.split_once('=').ok_or_else(err)?;
    let channel: u8 = ch.parse().map_err(|_| err())?;
    let value = match v.strip_suffix("mV").or_else(|| v.strip_suffix("mv")) {
        Some(mv) => {
            let mv: u64 = mv.parse().map_err(|_| err())?;
            ((mv * ADC_MAX as u64 + 2500) / 5000).min(u16::MAX as u64) as u16
        }
        None => v.parse().map_err(|_| err())?,
    };
    Ok(Stimulus::Analog { channel, value })
}

fn unescape(s: &str) -> Vec<u8> {
    s.replace("\\r", "\r").replace("\\n", "\n").into_bytes()
}

// ─── Headless Mode ──────────────────────────────────────────────────────────

fn run_headless(opts: &Options, mcu: &mut Mcu, fw: &mut dyn Firmware) -> Result<(), String> {
    if opts.debug {
        println!("Running {} for {} ms at {} Hz...", fw.name(), opts.ms, mcu.fuses.fosc_hz);
    }
    let report = mcu.run(fw, opts.ms).map_err(|e| e.to_string())?;

    let out = mcu.take_uart_output();
    if !out.is_empty() {
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(&out);
        let _ = stdout.flush();
        println!();
    }
    print_ports(mcu);
    println!("{} cycles, {} polls, {} interrupts, {} watchdog resets",
        report.cycles, report.polls, report.interrupts, report.watchdog_resets);
    if opts.debug && mcu.events.dropped > 0 {
        println!("({} events dropped from the log)", mcu.events.dropped);
    }
    Ok(())
}

fn print_ports(mcu: &Mcu) {
    let levels = mcu.port_levels();
    for port in Port::ALL {
        let tris = mcu.mem.get(port.tris_addr());
        let mut l = format!("  PORT{:?} ", port);
        for n in (0..8).rev() {
            let c = if port.width_mask() & (1 << n) == 0 {
                '-'
            } else {
                let high = levels[port.index()] & (1 << n) != 0;
                match (tris & (1 << n) == 0, high) {
                    (true, true) => '#',
                    (true, false) => '.',
                    (false, true) => '1',
                    (false, false) => '0',
                }
            };
            l.push(c);
        }
        println!("{}  0x{:02X}", l, levels[port.index()]);
    }
}

// ─── GUI Mode ───────────────────────────────────────────────────────────────

fn open_window(title: &str, scale: usize) -> Result<Window, String> {
    let mut window = Window::new(
        title, PANEL_W * scale, PANEL_H * scale,
        WindowOptions {
            scale: Scale::X1,
            scale_mode: ScaleMode::AspectRatioStretch,
            resize: true,
            ..Default::default()
        },
    ).map_err(|e| format!("window: {}", e))?;
    window.set_target_fps(60);
    Ok(window)
}

fn run_gui(opts: &Options, mcu: &mut Mcu, fw: &mut dyn Firmware) -> Result<(), String> {
    let title = format!("PIC16F877A - {}", fw.name());
    let scale = opts.scale;
    let mut window = open_window(&title, scale)?;

    let mut panel = vec![COL_BG; PANEL_W * PANEL_H];
    let mut scaled_buf = vec![0u32; PANEL_W * scale * PANEL_H * scale];
    let mut selected = Port::B;
    // Start the pot where the command line left AN0
    let mut an0 = opts.stimuli.iter().rev()
        .find_map(|(at, s)| match s {
            Stimulus::Analog { channel: 0, value } if at.is_none() => Some((*value).min(ADC_MAX)),
            _ => None,
        })
        .unwrap_or(512);
    mcu.set_analog(0, an0);
    let mut duty = [0.0f32; 2];
    let mut prev_keys = [false; 13];
    let start_time = Instant::now();
    let mut last_title = Instant::now();

    while window.is_open() && !window.is_key_down(Key::Escape) {
        let keys = [
            window.is_key_down(Key::Key0), window.is_key_down(Key::Key1),
            window.is_key_down(Key::Key2), window.is_key_down(Key::Key3),
            window.is_key_down(Key::Key4), window.is_key_down(Key::Key5),
            window.is_key_down(Key::Key6), window.is_key_down(Key::Key7),
            window.is_key_down(Key::Left), window.is_key_down(Key::Right),
            window.is_key_down(Key::D), window.is_key_down(Key::P),
            window.is_key_down(Key::R),
        ];
        let pressed = |i: usize| keys[i] && !prev_keys[i];

        // Pin toggle (0-7) on the selected port
        for n in 0..8u8 {
            if pressed(n as usize) && selected.width_mask() & (1 << n) != 0 {
                let level = !mcu.pin(selected, n);
                mcu.set_pin(selected, n, level);
            }
        }
        if pressed(8) {
            selected = Port::ALL[(selected.index() + 4) % 5];
        }
        if pressed(9) {
            selected = Port::ALL[(selected.index() + 1) % 5];
        }
        if pressed(10) {
            eprintln!("--- SFRs (cycle {}) ---\n{}", mcu.cycle, mcu.dump_sfrs_all());
        }
        if pressed(11) {
            eprint!("{}", mcu.profiler_report());
        }
        if pressed(12) {
            mcu.reset(ResetCause::PowerOn);
        }
        prev_keys = keys;

        // AN0 potentiometer
        let step = 8;
        if window.is_key_down(Key::Up) && an0 < ADC_MAX {
            an0 = (an0 + step).min(ADC_MAX);
            mcu.set_analog(0, an0);
        }
        if window.is_key_down(Key::Down) && an0 > 0 {
            an0 = an0.saturating_sub(step);
            mcu.set_analog(0, an0);
        }

        mcu.run(fw, FRAME_MS).map_err(|e| e.to_string())?;

        let out = mcu.take_uart_output();
        if !out.is_empty() {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(&out);
            let _ = stdout.flush();
        }
        if let Some(d) = mcu.ccp1.take_measured_duty() { duty[0] = d; }
        if let Some(d) = mcu.ccp2.take_measured_duty() { duty[1] = d; }

        draw_panel(&mut panel, mcu, selected, duty, an0);
        scale_into(&panel, &mut scaled_buf, scale);
        window
            .update_with_buffer(&scaled_buf, PANEL_W * scale, PANEL_H * scale)
            .map_err(|e| format!("window: {}", e))?;

        if last_title.elapsed() >= Duration::from_secs(1) {
            let sim_ms = mcu.cycle / mcu.fuses.cycles_per_ms();
            window.set_title(&format!("{} - {} ms - AN0={} - PORT{:?}",
                title, sim_ms, an0, selected));
            last_title = Instant::now();
        }
    }
    if opts.debug {
        let e = start_time.elapsed().as_secs_f64();
        println!("{} cycles in {:.1}s", mcu.cycle, e);
    }
    Ok(())
}

fn fill(panel: &mut [u32], x: usize, y: usize, w: usize, h: usize, c: u32) {
    for yy in y..(y + h).min(PANEL_H) {
        for xx in x..(x + w).min(PANEL_W) {
            panel[yy * PANEL_W + xx] = c;
        }
    }
}

fn bar(panel: &mut [u32], row: usize, frac: f32, c: u32) {
    let y = MARGIN + row * CELL + 3;
    let w = CELL * 8 - 2;
    fill(panel, MARGIN + 1, y, w, CELL - 6, COL_TRACK);
    let lit = (w as f32 * frac.clamp(0.0, 1.0)) as usize;
    fill(panel, MARGIN + 1, y, lit, CELL - 6, c);
}

fn draw_panel(panel: &mut [u32], mcu: &Mcu, selected: Port, duty: [f32; 2], an0: u16) {
    panel.fill(COL_BG);
    let levels = mcu.port_levels();
    for port in Port::ALL {
        let row = port.index();
        let y = MARGIN + row * CELL;
        if port == selected {
            fill(panel, MARGIN - 4, y + CELL / 2 - 2, 3, 4, COL_SELECT);
        }
        let tris = mcu.mem.get(port.tris_addr());
        for n in 0..8u8 {
            if port.width_mask() & (1 << n) == 0 { continue; }
            // RX0 on the right, as on the schematic
            let x = MARGIN + (7 - n as usize) * CELL;
            let high = levels[row] & (1 << n) != 0;
            let c = match (tris & (1 << n) == 0, high) {
                (true, true) => COL_OUT_HI,
                (true, false) => COL_OUT_LO,
                (false, true) => COL_IN_HI,
                (false, false) => COL_IN_LO,
            };
            fill(panel, x + 2, y + 2, CELL - 4, CELL - 4, c);
        }
    }
    bar(panel, 5, duty[0], COL_CCP1);
    bar(panel, 6, duty[1], COL_CCP2);
    bar(panel, 7, levels[Port::B.index()] as f32 / 255.0, COL_DAC);
    bar(panel, 8, an0 as f32 / ADC_MAX as f32, COL_ANALOG);
}

fn scale_into(panel: &[u32], scaled: &mut [u32], scale: usize) {
    let sw = PANEL_W * scale;
    for y in 0..PANEL_H {
        for x in 0..PANEL_W {
            let c = panel[y * PANEL_W + x];
            for sy in 0..scale {
                let base = (y * scale + sy) * sw + x * scale;
                scaled[base..base + scale].fill(c);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_stimuli() {
        let a = args("board gpio --headless --pin B1=0@250 --pin c0=z --analog 0=2500mV --uart hi\\r@10");
        let o = parse_args(&a).unwrap();
        assert!(o.headless);
        assert_eq!(o.ms, 1000);
        assert_eq!(o.stimuli[0], (Some(250), Stimulus::Pin { port: Port::B, bit: 1, level: false }));
        assert_eq!(o.stimuli[1], (None, Stimulus::Release { port: Port::C, bit: 0 }));
        assert_eq!(o.stimuli[2], (None, Stimulus::Analog { channel: 0, value: 512 }));
        assert_eq!(o.stimuli[3], (Some(10), Stimulus::UartRx(b"hi\r".to_vec())));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_pin("E5=1").is_err());
        assert!(parse_pin("B9=1").is_err());
        assert!(parse_pin("B1").is_err());
        assert!(parse_analog("0=lots").is_err());
        assert!(split_time("B1=0@soon").is_err());
        assert!(parse_args(&args("board adc --ms x")).is_err());
    }
}
