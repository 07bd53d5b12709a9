//! iNES header parsing.

use serde::{Deserialize, Serialize};

use crate::error::LoaderError;

/// Length of the iNES header in bytes.
pub const HEADER_LEN: usize = 16;
/// Length of the optional trainer blob.
pub const TRAINER_LEN: usize = 512;
/// PRG ROM unit size advertised by the header.
pub const PRG_BANK_LEN: usize = 16 * 1024;
/// CHR ROM unit size advertised by the header.
pub const CHR_BANK_LEN: usize = 8 * 1024;

const MAGIC: [u8; 4] = [0x4E, 0x45, 0x53, 0x1A];

/// Nametable mirroring arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    FourScreen,
}

/// Parsed iNES header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// PRG ROM size in bytes.
    pub prg_rom_size: usize,
    /// CHR ROM size in bytes; zero means the board carries CHR RAM.
    pub chr_rom_size: usize,
    pub mapper: u16,
    pub mirroring: Mirroring,
    pub battery_backed: bool,
    pub trainer_present: bool,
}

impl Header {
    /// Parses the 16-byte iNES header.
    pub fn parse(bytes: &[u8]) -> Result<Self, LoaderError> {
        if bytes.len() < HEADER_LEN {
            return Err(LoaderError::TruncatedRom {
                section: "header",
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        if bytes[0..4] != MAGIC {
            return Err(LoaderError::InvalidMagic);
        }
        let flags6 = bytes[6];
        let flags7 = bytes[7];
        // NES 2.0 marks itself with bits 2-3 of flags7 == 0b10.
        if flags7 & 0x0C == 0x08 {
            return Err(LoaderError::UnsupportedVersion);
        }

        let mirroring = if flags6 & 0x08 != 0 {
            Mirroring::FourScreen
        } else if flags6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        Ok(Self {
            prg_rom_size: bytes[4] as usize * PRG_BANK_LEN,
            chr_rom_size: bytes[5] as usize * CHR_BANK_LEN,
            mapper: ((flags7 & 0xF0) | (flags6 >> 4)) as u16,
            mirroring,
            battery_backed: flags6 & 0x02 != 0,
            trainer_present: flags6 & 0x04 != 0,
        })
    }

    /// True when the board provides writable CHR RAM instead of CHR ROM.
    pub fn has_chr_ram(&self) -> bool {
        self.chr_rom_size == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(prg_banks: u8, chr_banks: u8, flags6: u8, flags7: u8) -> [u8; 16] {
        let mut h = [0u8; 16];
        h[0..4].copy_from_slice(&MAGIC);
        h[4] = prg_banks;
        h[5] = chr_banks;
        h[6] = flags6;
        h[7] = flags7;
        h
    }

    #[test]
    fn parses_mapper_and_mirroring() {
        let header = Header::parse(&raw(2, 1, 0x11, 0x20)).unwrap();
        assert_eq!(header.mapper, 0x21);
        assert_eq!(header.mirroring, Mirroring::Vertical);
        assert_eq!(header.prg_rom_size, 32 * 1024);
        assert_eq!(header.chr_rom_size, 8 * 1024);
    }

    #[test]
    fn four_screen_wins_over_mirroring_bit() {
        let header = Header::parse(&raw(1, 1, 0x09, 0x00)).unwrap();
        assert_eq!(header.mirroring, Mirroring::FourScreen);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = raw(1, 1, 0, 0);
        bytes[0] = b'X';
        assert!(matches!(
            Header::parse(&bytes),
            Err(LoaderError::InvalidMagic)
        ));
    }

    #[test]
    fn rejects_nes2_revision() {
        assert!(matches!(
            Header::parse(&raw(1, 1, 0, 0x08)),
            Err(LoaderError::UnsupportedVersion)
        ));
    }
}
