//! Cartridge loading and access.
//!
//! A [`Cartridge`] owns the parsed header and the concrete board ([`Mapper`]
//! variant). The CPU bus reaches it for `$4020-$FFFF`; the PPU reaches it
//! through the pattern-bus capability for `$0000-$1FFF`.

pub mod header;
pub mod mapper;

use serde::{Deserialize, Serialize};

use crate::error::LoaderError;

use header::{CHR_BANK_LEN, HEADER_LEN, Header, Mirroring, PRG_BANK_LEN, TRAINER_LEN};
pub use mapper::Mapper;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cartridge {
    pub header: Header,
    mapper: Mapper,
}

impl Cartridge {
    /// Parses a complete iNES image.
    pub fn from_ines(image: &[u8]) -> Result<Self, LoaderError> {
        let header = Header::parse(image)?;

        let mut offset = HEADER_LEN;
        if header.trainer_present {
            // The 512-byte trainer is legacy copier baggage; skip it.
            if image.len() < offset + TRAINER_LEN {
                return Err(LoaderError::TruncatedRom {
                    section: "trainer",
                    expected: TRAINER_LEN,
                    actual: image.len().saturating_sub(offset),
                });
            }
            offset += TRAINER_LEN;
        }

        if image.len() < offset + header.prg_rom_size {
            return Err(LoaderError::TruncatedRom {
                section: "PRG ROM",
                expected: header.prg_rom_size,
                actual: image.len().saturating_sub(offset),
            });
        }
        let prg_rom: Box<[u8]> = image[offset..offset + header.prg_rom_size].into();
        offset += header.prg_rom_size;

        if image.len() < offset + header.chr_rom_size {
            return Err(LoaderError::TruncatedRom {
                section: "CHR ROM",
                expected: header.chr_rom_size,
                actual: image.len().saturating_sub(offset),
            });
        }
        let chr_rom: Box<[u8]> = image[offset..offset + header.chr_rom_size].into();

        let mapper = Mapper::from_header(&header, prg_rom, chr_rom)?;
        tracing::debug!(
            mapper = header.mapper,
            prg = header.prg_rom_size,
            chr = header.chr_rom_size,
            mirroring = ?header.mirroring,
            "cartridge loaded"
        );
        Ok(Self { header, mapper })
    }

    pub fn cpu_read(&self, addr: u16) -> Option<u8> {
        self.mapper.cpu_read(addr)
    }

    pub fn cpu_write(&mut self, addr: u16, value: u8) {
        self.mapper.cpu_write(addr, value);
    }

    pub fn ppu_read(&self, addr: u16) -> u8 {
        self.mapper.ppu_read(addr)
    }

    pub fn ppu_write(&mut self, addr: u16, value: u8) {
        self.mapper.ppu_write(addr, value);
    }

    pub fn irq_pending(&self) -> bool {
        self.mapper.irq_pending()
    }

    pub fn acknowledge_irq(&mut self) {
        self.mapper.acknowledge_irq();
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring()
    }

    pub fn mapper_id(&self) -> u16 {
        self.mapper.id()
    }

    pub fn prg_ram(&self) -> &[u8] {
        self.mapper.prg_ram()
    }

    pub fn prg_ram_mut(&mut self) -> &mut [u8] {
        self.mapper.prg_ram_mut()
    }

    pub fn chr_ram(&self) -> Option<&[u8]> {
        self.mapper.chr_ram()
    }

    /// Snapshot restore path: replaces the whole board state.
    pub fn replace_mapper(&mut self, mapper: Mapper) {
        self.mapper = mapper;
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_image() {
        let cart = test_support::nrom_cartridge(&[0xA9, 0x01]);
        assert_eq!(cart.mapper_id(), 0);
        assert_eq!(cart.cpu_read(0x8000), Some(0xA9));
        // 16 KiB bank mirrors into the upper half.
        assert_eq!(cart.cpu_read(0xC000), Some(0xA9));
        assert_eq!(cart.cpu_read(0xFFFD), Some(0x80));
    }

    #[test]
    fn truncated_prg_is_detected() {
        let mut image = test_support::nrom_image(&[], 0);
        image.truncate(HEADER_LEN + 100);
        assert!(matches!(
            Cartridge::from_ines(&image),
            Err(LoaderError::TruncatedRom {
                section: "PRG ROM",
                ..
            })
        ));
    }
}
