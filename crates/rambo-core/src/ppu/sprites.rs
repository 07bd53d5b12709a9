//! Sprite evaluation and the per-scanline sprite output units.

use serde::{Deserialize, Serialize};

/// Attribute byte bits (OAM byte 2).
pub const ATTR_PALETTE: u8 = 0b0000_0011;
pub const ATTR_BEHIND_BG: u8 = 0b0010_0000;
pub const ATTR_FLIP_H: u8 = 0b0100_0000;
pub const ATTR_FLIP_V: u8 = 0b1000_0000;

/// One of the eight sprite output units feeding pixels for a scanline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpriteUnit {
    pub x: u8,
    pub attr: u8,
    pub pattern_low: u8,
    pub pattern_high: u8,
    pub is_sprite0: bool,
}

impl SpriteUnit {
    /// Color (0..=3) this unit contributes at screen column `column`, or 0
    /// when the column is outside the sprite's 8-pixel window.
    #[inline]
    pub fn color_at(&self, column: u16) -> u8 {
        let x = self.x as u16;
        if column < x || column >= x + 8 {
            return 0;
        }
        let offset = (column - x) as u8;
        let bit = if self.attr & ATTR_FLIP_H != 0 {
            offset
        } else {
            7 - offset
        };
        let low = (self.pattern_low >> bit) & 1;
        let high = (self.pattern_high >> bit) & 1;
        (high << 1) | low
    }

    pub fn palette_line(&self) -> u8 {
        // Sprite palettes occupy lines 4-7.
        4 + (self.attr & ATTR_PALETTE)
    }

    pub fn behind_background(&self) -> bool {
        self.attr & ATTR_BEHIND_BG != 0
    }
}

/// Sprite units loaded for the scanline currently being drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpritePipeline {
    pub units: [SpriteUnit; 8],
    pub count: u8,
}

impl SpritePipeline {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// First opaque sprite pixel at `column`, if any:
    /// `(color, palette_line, behind_bg, is_sprite0)`.
    pub fn pixel_at(&self, column: u16) -> Option<(u8, u8, bool, bool)> {
        self.units
            .iter()
            .take(self.count as usize)
            .find_map(|unit| {
                let color = unit.color_at(column);
                (color != 0).then(|| {
                    (
                        color,
                        unit.palette_line(),
                        unit.behind_background(),
                        unit.is_sprite0,
                    )
                })
            })
    }
}

/// Cycle-spread evaluation of the 64-entry OAM into secondary OAM.
///
/// One [`step`](SpriteEval::step) handles one OAM byte, mirroring the
/// hardware's read/write dot pairs on dots 65-256. After eight sprites are
/// found the scan degrades into the famous diagonal byte walk, which is what
/// makes the overflow flag buggy on real silicon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpriteEval {
    n: u8,
    m: u8,
    copy_index: u8,
    copying: bool,
    pub count: u8,
    pub done: bool,
    pub sprite0_found: bool,
    pub overflow: bool,
}

impl SpriteEval {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn step(
        &mut self,
        oam: &[u8],
        secondary: &mut [u8],
        scanline: i16,
        sprite_height: u8,
    ) -> bool {
        if self.done {
            return false;
        }
        let in_range = |y: u8| {
            let row = scanline - y as i16;
            (0..sprite_height as i16).contains(&row)
        };

        if self.copying {
            secondary[(self.count * 4 + self.copy_index) as usize] =
                oam[(self.n as usize * 4) + self.copy_index as usize];
            self.copy_index += 1;
            if self.copy_index == 4 {
                self.copying = false;
                self.copy_index = 0;
                self.count += 1;
                self.n += 1;
                if self.n >= 64 {
                    self.done = true;
                }
            }
            return false;
        }

        if self.count < 8 {
            let y = oam[self.n as usize * 4];
            secondary[(self.count * 4) as usize] = y;
            if in_range(y) {
                if self.n == 0 {
                    self.sprite0_found = true;
                }
                self.copying = true;
                self.copy_index = 1;
            } else {
                self.n += 1;
                if self.n >= 64 {
                    self.done = true;
                }
            }
            false
        } else {
            // Overflow scan: the byte compared as Y drifts through the
            // sprite record because m increments alongside n (hardware bug).
            let y = oam[(self.n as usize * 4 + self.m as usize) & 0xFF];
            if in_range(y) {
                self.overflow = true;
                self.done = true;
                true
            } else {
                self.n += 1;
                self.m = (self.m + 1) & 3;
                if self.n >= 64 {
                    self.done = true;
                }
                false
            }
        }
    }
}
