//! Background tile pipeline: fetch latches and 16-bit shifters.

use serde::{Deserialize, Serialize};

/// Pattern/attribute shifters plus the per-8-dot fetch latches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BgPipeline {
    /// Nametable byte fetched for the upcoming tile.
    pub tile_latch: u8,
    /// Two attribute bits for the upcoming tile.
    pub attr_latch: u8,
    pub pattern_low_latch: u8,
    pub pattern_high_latch: u8,

    shift_pattern_low: u16,
    shift_pattern_high: u16,
    shift_attr_low: u16,
    shift_attr_high: u16,
}

impl BgPipeline {
    /// Reloads the low byte of each shifter from the fetch latches.
    pub fn load_shifters(&mut self) {
        self.shift_pattern_low = (self.shift_pattern_low & 0xFF00) | self.pattern_low_latch as u16;
        self.shift_pattern_high =
            (self.shift_pattern_high & 0xFF00) | self.pattern_high_latch as u16;
        let attr_low = if self.attr_latch & 0b01 != 0 { 0xFF } else { 0x00 };
        let attr_high = if self.attr_latch & 0b10 != 0 { 0xFF } else { 0x00 };
        self.shift_attr_low = (self.shift_attr_low & 0xFF00) | attr_low;
        self.shift_attr_high = (self.shift_attr_high & 0xFF00) | attr_high;
    }

    #[inline]
    pub fn shift(&mut self) {
        self.shift_pattern_low <<= 1;
        self.shift_pattern_high <<= 1;
        self.shift_attr_low <<= 1;
        self.shift_attr_high <<= 1;
    }

    /// Samples the pixel under `fine_x`: returns `(palette_line, color)`.
    #[inline]
    pub fn pixel(&self, fine_x: u8) -> (u8, u8) {
        let bit = 0x8000 >> fine_x;
        let low = (self.shift_pattern_low & bit != 0) as u8;
        let high = (self.shift_pattern_high & bit != 0) as u8;
        let attr_low = (self.shift_attr_low & bit != 0) as u8;
        let attr_high = (self.shift_attr_high & bit != 0) as u8;
        ((attr_high << 1) | attr_low, (high << 1) | low)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifters_deliver_loaded_tile_after_eight_shifts() {
        let mut bg = BgPipeline {
            pattern_low_latch: 0b1010_0000,
            pattern_high_latch: 0b0110_0000,
            attr_latch: 0b11,
            ..BgPipeline::default()
        };
        bg.load_shifters();
        for _ in 0..8 {
            bg.shift();
        }
        // First pixel of the loaded tile, fine_x = 0.
        let (line, color) = bg.pixel(0);
        assert_eq!(line, 0b11);
        assert_eq!(color, 0b01);
        bg.shift();
        let (_, color) = bg.pixel(0);
        assert_eq!(color, 0b10);
    }
}
