//! Cartridge boards as a tagged sum.
//!
//! Mappers are dispatched by exhaustive `match` rather than trait objects so
//! every access monomorphizes and inlines; adding a board means adding a
//! variant. All buffers are allocated once at load time and the dispatch
//! methods never allocate.

use serde::{Deserialize, Serialize};

use crate::memory::cpu as cpu_mem;

use super::header::{Header, Mirroring};

/// Size of the NROM work-RAM window at `$6000-$7FFF`.
pub const NROM_PRG_RAM_LEN: usize = 8 * 1024;
/// CHR RAM size allocated when the header advertises no CHR ROM.
pub const CHR_RAM_LEN: usize = 8 * 1024;

/// Pattern-table backing storage: ROM by header CHR size, RAM otherwise.
///
/// The distinction is carried explicitly so write behavior follows the
/// header field and not buffer mutability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChrStorage {
    Rom(Box<[u8]>),
    Ram(Box<[u8]>),
}

impl ChrStorage {
    pub fn from_header(header: &Header, chr_rom: Box<[u8]>) -> Self {
        if header.has_chr_ram() {
            ChrStorage::Ram(vec![0; CHR_RAM_LEN].into_boxed_slice())
        } else {
            ChrStorage::Rom(chr_rom)
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        let bytes = match self {
            ChrStorage::Rom(bytes) | ChrStorage::Ram(bytes) => bytes,
        };
        if bytes.is_empty() {
            return 0;
        }
        bytes[addr as usize % bytes.len()]
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        if let ChrStorage::Ram(bytes) = self {
            if !bytes.is_empty() {
                let len = bytes.len();
                bytes[addr as usize % len] = value;
            }
        }
    }

    pub fn as_ram(&self) -> Option<&[u8]> {
        match self {
            ChrStorage::Ram(bytes) => Some(bytes),
            ChrStorage::Rom(_) => None,
        }
    }
}

/// Mapper 0 (NROM): no banking, 16 KiB PRG mirrored or 32 KiB linear,
/// always-present 8 KiB PRG RAM, CHR ROM or 8 KiB CHR RAM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nrom {
    prg_rom: Box<[u8]>,
    prg_ram: Box<[u8]>,
    chr: ChrStorage,
    mirroring: Mirroring,
}

impl Nrom {
    pub fn new(header: &Header, prg_rom: Box<[u8]>, chr_rom: Box<[u8]>) -> Self {
        Self {
            prg_rom,
            prg_ram: vec![0; NROM_PRG_RAM_LEN].into_boxed_slice(),
            chr: ChrStorage::from_header(header, chr_rom),
            mirroring: header.mirroring,
        }
    }

    fn read_prg_rom(&self, addr: u16) -> u8 {
        if self.prg_rom.is_empty() {
            return 0;
        }
        // Modulo handles NROM-128 mirroring: a 16 KiB image repeats at $C000.
        let idx = (addr - cpu_mem::PRG_ROM_START) as usize % self.prg_rom.len();
        self.prg_rom[idx]
    }

    fn prg_ram_index(&self, addr: u16) -> usize {
        (addr - cpu_mem::PRG_RAM_START) as usize % self.prg_ram.len()
    }
}

/// The board variants this core knows how to drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mapper {
    Nrom(Nrom),
}

impl Mapper {
    /// Selects a board by iNES mapper number.
    pub fn from_header(
        header: &Header,
        prg_rom: Box<[u8]>,
        chr_rom: Box<[u8]>,
    ) -> Result<Self, crate::error::LoaderError> {
        match header.mapper {
            0 => Ok(Mapper::Nrom(Nrom::new(header, prg_rom, chr_rom))),
            other => Err(crate::error::LoaderError::UnsupportedMapper(other)),
        }
    }

    /// CPU-space read; `None` when the board does not drive the bus.
    pub fn cpu_read(&self, addr: u16) -> Option<u8> {
        match self {
            Mapper::Nrom(board) => match addr {
                cpu_mem::PRG_RAM_START..=cpu_mem::PRG_RAM_END => {
                    Some(board.prg_ram[board.prg_ram_index(addr)])
                }
                cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => Some(board.read_prg_rom(addr)),
                _ => None,
            },
        }
    }

    /// CPU-space write.
    pub fn cpu_write(&mut self, addr: u16, value: u8) {
        match self {
            Mapper::Nrom(board) => {
                if (cpu_mem::PRG_RAM_START..=cpu_mem::PRG_RAM_END).contains(&addr) {
                    let idx = board.prg_ram_index(addr);
                    board.prg_ram[idx] = value;
                }
            }
        }
    }

    /// PPU pattern-space read (`$0000-$1FFF`).
    pub fn ppu_read(&self, addr: u16) -> u8 {
        match self {
            Mapper::Nrom(board) => board.chr.read(addr),
        }
    }

    /// PPU pattern-space write.
    pub fn ppu_write(&mut self, addr: u16, value: u8) {
        match self {
            Mapper::Nrom(board) => board.chr.write(addr, value),
        }
    }

    /// Level of the board's IRQ output.
    pub fn irq_pending(&self) -> bool {
        match self {
            Mapper::Nrom(_) => false,
        }
    }

    /// Clears any latched board IRQ.
    pub fn acknowledge_irq(&mut self) {
        match self {
            Mapper::Nrom(_) => {}
        }
    }

    /// Scanline/A12 hook for boards with IRQ counters.
    pub fn tick_irq_counter(&mut self) {
        match self {
            Mapper::Nrom(_) => {}
        }
    }

    pub fn mirroring(&self) -> Mirroring {
        match self {
            Mapper::Nrom(board) => board.mirroring,
        }
    }

    /// Mapper identifier as used in the iNES header.
    pub fn id(&self) -> u16 {
        match self {
            Mapper::Nrom(_) => 0,
        }
    }

    pub fn prg_ram(&self) -> &[u8] {
        match self {
            Mapper::Nrom(board) => &board.prg_ram,
        }
    }

    pub fn prg_ram_mut(&mut self) -> &mut [u8] {
        match self {
            Mapper::Nrom(board) => &mut board.prg_ram,
        }
    }

    pub fn chr_ram(&self) -> Option<&[u8]> {
        match self {
            Mapper::Nrom(board) => board.chr.as_ram(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(prg_rom_size: usize, chr_rom_size: usize) -> Header {
        Header {
            prg_rom_size,
            chr_rom_size,
            mapper: 0,
            mirroring: Mirroring::Horizontal,
            battery_backed: false,
            trainer_present: false,
        }
    }

    fn nrom(prg_rom_size: usize, chr_rom_size: usize) -> Mapper {
        let header = header(prg_rom_size, chr_rom_size);
        let prg: Vec<u8> = (0..prg_rom_size).map(|i| (i & 0xFF) as u8).collect();
        let chr = vec![0xCD; chr_rom_size];
        Mapper::from_header(&header, prg.into(), chr.into()).unwrap()
    }

    #[test]
    fn mirrors_16k_prg_rom() {
        let mapper = nrom(0x4000, 0x2000);
        assert_eq!(
            mapper.cpu_read(cpu_mem::PRG_ROM_START),
            mapper.cpu_read(cpu_mem::PRG_ROM_START + 0x4000)
        );
    }

    #[test]
    fn prg_ram_present_without_header_hint() {
        let mut mapper = nrom(0x4000, 0x2000);
        mapper.cpu_write(0x6000, 0x55);
        mapper.cpu_write(0x7FFF, 0xAA);
        assert_eq!(mapper.cpu_read(0x6000), Some(0x55));
        assert_eq!(mapper.cpu_read(0x7FFF), Some(0xAA));
    }

    #[test]
    fn chr_rom_ignores_writes() {
        let mut mapper = nrom(0x4000, 0x2000);
        mapper.ppu_write(0x0010, 0x77);
        assert_eq!(mapper.ppu_read(0x0010), 0xCD);
    }

    #[test]
    fn chr_ram_allocated_when_header_has_no_chr() {
        let mut mapper = nrom(0x4000, 0);
        mapper.ppu_write(0x0010, 0x77);
        assert_eq!(mapper.ppu_read(0x0010), 0x77);
    }

    #[test]
    fn unknown_mapper_is_rejected() {
        let header = Header {
            mapper: 4,
            ..header(0x4000, 0x2000)
        };
        let result = Mapper::from_header(&header, vec![0; 0x4000].into(), vec![0; 0x2000].into());
        assert!(matches!(
            result,
            Err(crate::error::LoaderError::UnsupportedMapper(4))
        ));
    }
}
