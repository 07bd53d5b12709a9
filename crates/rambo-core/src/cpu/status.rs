use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// 6502 processor status register (`P`).
    ///
    /// Bit layout: `N V U B D I Z C`. `U` reads back as 1; `B` only exists on
    /// the stack copy pushed by PHP/BRK (1) versus interrupts (0). Decimal
    /// mode is latched but ignored by ADC/SBC on the 2A03.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Status: u8 {
        const CARRY       = 0b0000_0001;
        const ZERO        = 0b0000_0010;
        const IRQ_DISABLE = 0b0000_0100;
        const DECIMAL     = 0b0000_1000;
        const BREAK       = 0b0001_0000;
        const UNUSED      = 0b0010_0000;
        const OVERFLOW    = 0b0100_0000;
        const NEGATIVE    = 0b1000_0000;
    }
}

impl Default for Status {
    fn default() -> Self {
        // Power-on state: IRQs masked, unused bit held high.
        Status::UNUSED | Status::IRQ_DISABLE
    }
}

impl Status {
    /// Updates the zero and negative flags from `value`, returning the new
    /// status. The remaining bits are untouched.
    #[must_use]
    pub fn with_zn(mut self, value: u8) -> Self {
        self.set(Status::ZERO, value == 0);
        self.set(Status::NEGATIVE, value & 0x80 != 0);
        self
    }

    /// Returns the status byte as pushed by PHP/BRK (`B` and `U` forced high).
    pub fn to_pushed_brk(self) -> u8 {
        (self | Status::BREAK | Status::UNUSED).bits()
    }

    /// Returns the status byte as pushed by IRQ/NMI (`B` clear, `U` high).
    pub fn to_pushed_interrupt(self) -> u8 {
        ((self - Status::BREAK) | Status::UNUSED).bits()
    }

    /// Rebuilds the register from a byte pulled off the stack. The stored `B`
    /// bit is discarded and `U` is forced high.
    pub fn from_pulled(value: u8) -> Self {
        (Status::from_bits_retain(value) - Status::BREAK) | Status::UNUSED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zn_updates() {
        let p = Status::default().with_zn(0);
        assert!(p.contains(Status::ZERO));
        assert!(!p.contains(Status::NEGATIVE));

        let p = p.with_zn(0x80);
        assert!(!p.contains(Status::ZERO));
        assert!(p.contains(Status::NEGATIVE));
    }

    #[test]
    fn stack_copies_differ_only_in_break() {
        let p = Status::default();
        assert_eq!(p.to_pushed_brk() & 0x30, 0x30);
        assert_eq!(p.to_pushed_interrupt() & 0x30, 0x20);
    }

    #[test]
    fn pull_discards_break_and_forces_unused() {
        let p = Status::from_pulled(0b1101_0011);
        assert!(p.contains(Status::UNUSED));
        assert!(!p.contains(Status::BREAK));
        assert!(p.contains(Status::NEGATIVE));
        assert!(p.contains(Status::CARRY));
    }
}
