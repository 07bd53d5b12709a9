//! Address-map constants shared across the core.
//!
//! Keeping the hardware layout in one module keeps magic numbers out of the
//! bus and register code and gives every address a name that matches the
//! console documentation.

/// CPU memory map.
pub mod cpu {
    /// First byte of CPU internal RAM.
    pub const INTERNAL_RAM_START: u16 = 0x0000;
    /// Last mirrored internal RAM address visible to the CPU (`$1FFF`).
    pub const INTERNAL_RAM_MIRROR_END: u16 = 0x1FFF;
    /// Size of the internal RAM block (2 KiB, mirrored through `$1FFF`).
    pub const INTERNAL_RAM_SIZE: usize = 0x0800;
    /// Mask applied to mirror RAM accesses within `$0000-$1FFF`.
    pub const INTERNAL_RAM_MASK: u16 = (INTERNAL_RAM_SIZE as u16) - 1;

    /// First CPU address mapped to the PPU register mirror.
    pub const PPU_REGISTER_BASE: u16 = 0x2000;
    /// Last CPU address mirrored to the PPU register set.
    pub const PPU_REGISTER_END: u16 = 0x3FFF;

    /// First CPU-visible APU channel register (`$4000`).
    pub const APU_CHANNEL_BASE: u16 = 0x4000;
    /// Last APU channel register before the DMA/status region (`$4013`).
    pub const APU_CHANNEL_END: u16 = 0x4013;
    /// OAM DMA trigger register (`$4014`).
    pub const OAM_DMA: u16 = 0x4014;
    /// APU status register (`$4015`).
    pub const APU_STATUS: u16 = 0x4015;
    /// Controller port 1 strobe/read address (`$4016`).
    pub const CONTROLLER_PORT_1: u16 = 0x4016;
    /// Controller port 2 read / APU frame counter write address (`$4017`).
    pub const CONTROLLER_PORT_2: u16 = 0x4017;

    /// Start of the CPU test-mode window, open bus on retail units.
    pub const TEST_MODE_BASE: u16 = 0x4018;
    /// End of the CPU test-mode window.
    pub const TEST_MODE_END: u16 = 0x401F;

    /// First address routed to the cartridge.
    pub const CARTRIDGE_SPACE_BASE: u16 = 0x4020;
    /// PRG RAM window start address (`$6000`).
    pub const PRG_RAM_START: u16 = 0x6000;
    /// PRG RAM window end address (inclusive).
    pub const PRG_RAM_END: u16 = 0x7FFF;
    /// PRG ROM window start address (`$8000`).
    pub const PRG_ROM_START: u16 = 0x8000;
    /// Final CPU-visible address (`$FFFF`).
    pub const CPU_ADDR_END: u16 = 0xFFFF;

    /// First address of the hardware stack page.
    pub const STACK_PAGE_START: u16 = 0x0100;

    /// NMI vector (`$FFFA/$FFFB`).
    pub const NMI_VECTOR: u16 = 0xFFFA;
    /// Reset vector (`$FFFC/$FFFD`).
    pub const RESET_VECTOR: u16 = 0xFFFC;
    /// IRQ/BRK vector (`$FFFE/$FFFF`).
    pub const IRQ_VECTOR: u16 = 0xFFFE;
}

/// PPU register layout and VRAM mirror rules.
pub mod ppu {
    /// Mask for decoding register mirrors (`addr & 0x0007`).
    pub const REGISTER_SELECT_MASK: u16 = 0x0007;

    /// Address mask applied after each VRAM access (16 KiB space).
    pub const VRAM_MIRROR_MASK: u16 = 0x3FFF;

    /// Palette RAM base address (`$3F00`).
    pub const PALETTE_BASE: u16 = 0x3F00;
    /// Palette RAM byte count (32 bytes, mirrored every 32 bytes).
    pub const PALETTE_RAM_SIZE: usize = 0x20;

    /// Base address of nametable 0.
    pub const NAMETABLE_BASE: u16 = 0x2000;
    /// Size of a single nametable in bytes.
    pub const NAMETABLE_SIZE: u16 = 0x0400;
    /// Internal nametable RAM size (2 KiB, doubled for four-screen boards).
    pub const CIRAM_SIZE: usize = 0x0800;

    /// Pattern table 0 base address.
    pub const PATTERN_TABLE_0: u16 = 0x0000;
    /// Pattern table 1 base address.
    pub const PATTERN_TABLE_1: u16 = 0x1000;
    /// Last pattern-table address (inclusive).
    pub const PATTERN_TABLE_END: u16 = 0x1FFF;

    /// Primary Object Attribute Memory byte count (64 sprites x 4 bytes).
    pub const OAM_SIZE: usize = 0x100;
    /// Secondary OAM byte count used during sprite evaluation (8 sprites).
    pub const SECONDARY_OAM_SIZE: usize = 0x20;

    /// CPU-visible PPU register identifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Register {
        /// `$2000` - PPUCTRL
        Control,
        /// `$2001` - PPUMASK
        Mask,
        /// `$2002` - PPUSTATUS
        Status,
        /// `$2003` - OAMADDR
        OamAddr,
        /// `$2004` - OAMDATA
        OamData,
        /// `$2005` - PPUSCROLL
        Scroll,
        /// `$2006` - PPUADDR
        Addr,
        /// `$2007` - PPUDATA
        Data,
    }

    impl Register {
        /// Resolves the canonical register for a CPU address in `$2000-$3FFF`.
        pub const fn from_cpu_addr(addr: u16) -> Self {
            match addr & REGISTER_SELECT_MASK {
                0 => Self::Control,
                1 => Self::Mask,
                2 => Self::Status,
                3 => Self::OamAddr,
                4 => Self::OamData,
                5 => Self::Scroll,
                6 => Self::Addr,
                _ => Self::Data,
            }
        }
    }
}

/// APU register addresses.
pub mod apu {
    /// Pulse 1 control (`$4000`).
    pub const PULSE1_CTRL: u16 = 0x4000;
    /// Pulse 1 sweep (`$4001`).
    pub const PULSE1_SWEEP: u16 = 0x4001;
    /// Pulse 1 timer low (`$4002`).
    pub const PULSE1_TIMER_LO: u16 = 0x4002;
    /// Pulse 1 timer high / length load (`$4003`).
    pub const PULSE1_TIMER_HI: u16 = 0x4003;
    /// Pulse 2 control (`$4004`).
    pub const PULSE2_CTRL: u16 = 0x4004;
    /// Pulse 2 sweep (`$4005`).
    pub const PULSE2_SWEEP: u16 = 0x4005;
    /// Pulse 2 timer low (`$4006`).
    pub const PULSE2_TIMER_LO: u16 = 0x4006;
    /// Pulse 2 timer high / length load (`$4007`).
    pub const PULSE2_TIMER_HI: u16 = 0x4007;
    /// Triangle linear counter (`$4008`).
    pub const TRIANGLE_LINEAR: u16 = 0x4008;
    /// Triangle timer low (`$400A`).
    pub const TRIANGLE_TIMER_LO: u16 = 0x400A;
    /// Triangle timer high / length load (`$400B`).
    pub const TRIANGLE_TIMER_HI: u16 = 0x400B;
    /// Noise control (`$400C`).
    pub const NOISE_CTRL: u16 = 0x400C;
    /// Noise mode/period (`$400E`).
    pub const NOISE_MODE: u16 = 0x400E;
    /// Noise length load (`$400F`).
    pub const NOISE_LENGTH: u16 = 0x400F;
    /// DMC control (`$4010`).
    pub const DMC_CTRL: u16 = 0x4010;
    /// DMC direct DAC load (`$4011`).
    pub const DMC_DAC: u16 = 0x4011;
    /// DMC sample address (`$4012`).
    pub const DMC_ADDR: u16 = 0x4012;
    /// DMC sample length (`$4013`).
    pub const DMC_LEN: u16 = 0x4013;
    /// Status register (`$4015`).
    pub const STATUS: u16 = 0x4015;
    /// Frame counter configuration (`$4017`, write side).
    pub const FRAME_COUNTER: u16 = 0x4017;
}
