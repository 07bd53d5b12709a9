//! Pattern-table capability handed to the PPU.
//!
//! The PPU never sees the cartridge type; every `$0000-$1FFF` access goes
//! through this bus, which routes to the active board.

use crate::cartridge::Cartridge;

/// Mutable CHR window over the inserted cartridge.
pub struct ChrBus<'a> {
    cartridge: &'a mut Cartridge,
}

impl<'a> ChrBus<'a> {
    pub fn new(cartridge: &'a mut Cartridge) -> Self {
        Self { cartridge }
    }

    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        self.cartridge.ppu_read(addr & 0x1FFF)
    }

    #[inline]
    pub fn write(&mut self, addr: u16, value: u8) {
        self.cartridge.ppu_write(addr & 0x1FFF, value);
    }
}
