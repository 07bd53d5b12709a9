//! Length counter shared by the pulse, triangle, and noise channels.

use serde::{Deserialize, Serialize};

use super::tables::LENGTH_TABLE;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthCounter {
    value: u8,
    halt: bool,
}

impl LengthCounter {
    /// Disabling a channel through `$4015` zeroes its counter immediately.
    pub fn clear(&mut self) {
        self.value = 0;
    }

    pub fn active(&self) -> bool {
        self.value > 0
    }

    /// Loads from the 32-entry table; ignored while the channel is disabled.
    pub fn load(&mut self, index: u8, enabled: bool) {
        if enabled {
            self.value = LENGTH_TABLE[(index & 0x1F) as usize];
        }
    }

    pub fn set_halt(&mut self, halt: bool) {
        self.halt = halt;
    }

    /// Half-frame clock.
    pub fn clock(&mut self) {
        if self.value > 0 && !self.halt {
            self.value -= 1;
        }
    }

    #[cfg(test)]
    pub(crate) fn value(&self) -> u8 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_the_published_table() {
        let mut length = LengthCounter::default();
        for index in 0..32u8 {
            length.load(index, true);
            assert_eq!(length.value(), LENGTH_TABLE[index as usize]);
        }
    }

    #[test]
    fn load_requires_enable() {
        let mut length = LengthCounter::default();
        length.load(1, false);
        assert!(!length.active());
    }

    #[test]
    fn halt_freezes_the_count() {
        let mut length = LengthCounter::default();
        length.load(0, true); // 10
        length.set_halt(true);
        length.clock();
        assert_eq!(length.value(), 10);
        length.set_halt(false);
        length.clock();
        assert_eq!(length.value(), 9);
    }
}
