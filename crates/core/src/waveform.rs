//! 64-sample waveform tables for R-2R DAC output on PORTB.

pub const TABLE_LEN: usize = 64;

/// One sine period centred on 128, amplitude about 109.
pub const SINE_TABLE: [u8; TABLE_LEN] = [
    128, 139, 150, 161, 171, 181, 191, 199,
    207, 214, 220, 225, 229, 232, 235, 236,
    237, 236, 235, 232, 229, 225, 220, 214,
    207, 199, 191, 181, 171, 161, 150, 139,
    128, 117, 106, 95, 85, 75, 65, 57,
    49, 42, 36, 31, 27, 24, 21, 20,
    19, 20, 21, 24, 27, 31, 36, 42,
    49, 57, 65, 75, 85, 95, 106, 117,
];

/// Rising ramp 0..=252 in steps of 4.
pub const TRIANGLE_TABLE: [u8; TABLE_LEN] = {
    let mut t = [0u8; TABLE_LEN];
    let mut i = 0;
    while i < TABLE_LEN {
        t[i] = (i * 4) as u8;
        i += 1;
    }
    t
};

/// Position in a waveform table; always below [`TABLE_LEN`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaveIndex(u8);

impl WaveIndex {
    pub const fn new(start: u8) -> Self {
        WaveIndex(start % TABLE_LEN as u8)
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// Sample at the current position, then step (wrapping at 64).
    pub fn advance(&mut self, table: &[u8; TABLE_LEN]) -> u8 {
        let v = table[self.get()];
        self.0 = (self.0 + 1) % TABLE_LEN as u8;
        v
    }
}
