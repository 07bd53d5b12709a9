//! Picture processing unit with dot-level timing.
//!
//! The PPU advances one dot per [`clock`](Ppu::clock) call. Frames are 262
//! scanlines on NTSC (312 on PAL), 341 dots each: scanline -1 is the
//! pre-render line, 0-239 are visible, 240 idles, and VBlank runs from
//! 241 dot 1 until the pre-render line clears it. All pattern-table traffic
//! goes through the [`ChrBus`] capability; the PPU never touches the
//! cartridge type directly.

pub mod background;
pub mod buffer;
pub mod chr;
pub mod palette;
pub mod registers;
pub mod sprites;
pub mod vblank;

use serde::{Deserialize, Serialize};

use crate::cartridge::header::Mirroring;
use crate::clock::Region;
use crate::memory::ppu::{self as ppu_mem, Register};

use background::BgPipeline;
use buffer::FrameBuffer;
use chr::ChrBus;
use palette::{PaletteRam, SYSTEM_PALETTE};
use registers::{Control, Mask, Status, VramRegisters};
use sprites::{SpriteEval, SpritePipeline, SpriteUnit};
use vblank::VblankLedger;

const DOTS_PER_SCANLINE: u16 = 341;
const PRERENDER_LINE: i16 = -1;
const VBLANK_LINE: i16 = 241;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ppu {
    pub control: Control,
    pub mask: Mask,
    pub status: Status,
    pub vram: VramRegisters,

    oam_addr: u8,
    oam: Box<[u8]>,
    secondary_oam: [u8; ppu_mem::SECONDARY_OAM_SIZE],
    ciram: Box<[u8]>,
    palette_ram: PaletteRam,
    /// Buffered `$2007` read value for the delayed-read behavior.
    read_buffer: u8,

    pub scanline: i16,
    pub dot: u16,
    /// Frame counter; parity drives the NTSC odd-frame dot skip.
    pub frame: u64,
    /// Total dots since power-on; timestamps for the VBlank ledger.
    master_dot: u64,

    bg: BgPipeline,
    sprites: SpritePipeline,
    sprite_eval: SpriteEval,
    ledger: VblankLedger,

    region: Region,
    mirroring: Mirroring,
    /// Raised at scanline 241 dot 1; the frame boundary for the scheduler.
    frame_complete: bool,

    #[serde(skip, default)]
    framebuffer: FrameBuffer,
}

impl Ppu {
    pub fn new(region: Region, mirroring: Mirroring) -> Self {
        let ciram_len = match mirroring {
            Mirroring::FourScreen => 2 * ppu_mem::CIRAM_SIZE,
            _ => ppu_mem::CIRAM_SIZE,
        };
        Self {
            control: Control::default(),
            mask: Mask::default(),
            status: Status::default(),
            vram: VramRegisters::default(),
            oam_addr: 0,
            oam: vec![0; ppu_mem::OAM_SIZE].into_boxed_slice(),
            secondary_oam: [0xFF; ppu_mem::SECONDARY_OAM_SIZE],
            ciram: vec![0; ciram_len].into_boxed_slice(),
            palette_ram: PaletteRam::power_on(),
            read_buffer: 0,
            scanline: PRERENDER_LINE,
            dot: 0,
            frame: 0,
            master_dot: 0,
            bg: BgPipeline::default(),
            sprites: SpritePipeline::default(),
            sprite_eval: SpriteEval::default(),
            ledger: VblankLedger::default(),
            region,
            mirroring,
            frame_complete: false,
            framebuffer: FrameBuffer::new(),
        }
    }

    /// Power-on reset: clears memories and timing. Warm reset preserves RAM
    /// contents and the status register, matching hardware /RESET.
    pub fn reset(&mut self, power_on: bool) {
        if power_on {
            self.ciram.fill(0);
            self.oam.fill(0);
            self.secondary_oam.fill(0xFF);
            self.palette_ram = PaletteRam::power_on();
            self.status = Status::default();
            self.framebuffer.clear();
        }
        self.control = Control::default();
        self.mask = Mask::default();
        self.vram = VramRegisters::default();
        self.oam_addr = 0;
        self.read_buffer = 0;
        self.scanline = PRERENDER_LINE;
        self.dot = 0;
        self.frame = 0;
        self.master_dot = 0;
        self.bg.clear();
        self.sprites.clear();
        self.sprite_eval.reset();
        self.ledger = VblankLedger::default();
        self.frame_complete = false;
    }

    /// Level of the NMI output: VBlank flag AND the PPUCTRL enable bit.
    pub fn nmi_output(&self) -> bool {
        self.status.contains(Status::VERTICAL_BLANK) && self.control.nmi_enabled()
    }

    /// True once per frame after the VBlank edge; reading clears it.
    pub fn take_frame_complete(&mut self) -> bool {
        std::mem::take(&mut self.frame_complete)
    }

    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    pub fn ledger(&self) -> &VblankLedger {
        &self.ledger
    }

    pub fn oam(&self) -> &[u8] {
        &self.oam
    }

    pub fn oam_addr(&self) -> u8 {
        self.oam_addr
    }

    /// OAM write used by the DMA engine; increments OAMADDR like `$2004`.
    pub fn oam_dma_write(&mut self, value: u8) {
        self.oam[self.oam_addr as usize] = value;
        self.oam_addr = self.oam_addr.wrapping_add(1);
    }

    /// Duplication write after a DMC steal: same slot, no OAMADDR advance
    /// (the normal cycle pair re-writes it immediately after).
    pub fn oam_duplicate_write(&mut self, value: u8) {
        self.oam[self.oam_addr as usize] = value;
    }

    #[cfg(test)]
    pub(crate) fn cpu_write_oam_addr_for_test(&mut self, value: u8) {
        self.oam_addr = value;
    }

    // ------------------------------------------------------------------
    // CPU register interface
    // ------------------------------------------------------------------

    /// CPU read of `$2000-$3FFF`. `open_bus` supplies the floating bits for
    /// write-only registers and the low five status bits.
    pub fn cpu_read(&mut self, addr: u16, chr: &mut ChrBus<'_>, open_bus: u8) -> u8 {
        match Register::from_cpu_addr(addr) {
            Register::Status => self.read_status(open_bus),
            Register::OamData => self.read_oam_data(),
            Register::Data => self.read_data(chr),
            _ => open_bus,
        }
    }

    pub fn cpu_write(&mut self, addr: u16, value: u8, chr: &mut ChrBus<'_>) {
        match Register::from_cpu_addr(addr) {
            Register::Control => {
                self.control = Control::from_bits_retain(value);
                self.vram.t.set_nametable(self.control.nametable_index());
            }
            Register::Mask => self.mask = Mask::from_bits_retain(value),
            Register::Status => {}
            Register::OamAddr => self.oam_addr = value,
            Register::OamData => {
                self.oam[self.oam_addr as usize] = value;
                self.oam_addr = self.oam_addr.wrapping_add(1);
            }
            Register::Scroll => self.vram.write_scroll(value),
            Register::Addr => self.vram.write_addr(value),
            Register::Data => self.write_data(value, chr),
        }
    }

    fn read_status(&mut self, open_bus: u8) -> u8 {
        // Race window around the VBlank set edge: a read one dot before the
        // edge suppresses the flag (and NMI) for the whole frame; a read on
        // the edge dots still sees the flag but kills the NMI by clearing it
        // before the CPU samples its interrupt line.
        if self.scanline == VBLANK_LINE && self.dot == 0 {
            self.ledger.suppress_this_frame = true;
        }

        let value = self.status.bits() | (open_bus & 0x1F);
        self.status.remove(Status::VERTICAL_BLANK);
        self.ledger.record_clear(self.master_dot);
        self.vram.write_latch = false;
        value
    }

    fn read_oam_data(&self) -> u8 {
        let value = self.oam[self.oam_addr as usize];
        // The unimplemented attribute bits read back as zero.
        if self.oam_addr & 3 == 2 { value & 0xE3 } else { value }
    }

    fn read_data(&mut self, chr: &mut ChrBus<'_>) -> u8 {
        let addr = self.vram.v.raw() & ppu_mem::VRAM_MIRROR_MASK;
        let value = if addr >= ppu_mem::PALETTE_BASE {
            // Palette reads bypass the buffer, which instead captures the
            // nametable byte underneath the palette window.
            self.read_buffer = self.vram_read(addr & 0x2FFF, chr);
            self.palette_ram.read(addr)
        } else {
            let buffered = self.read_buffer;
            self.read_buffer = self.vram_read(addr, chr);
            buffered
        };
        self.vram.v.increment(self.control.vram_increment());
        value
    }

    fn write_data(&mut self, value: u8, chr: &mut ChrBus<'_>) {
        let addr = self.vram.v.raw() & ppu_mem::VRAM_MIRROR_MASK;
        if addr >= ppu_mem::PALETTE_BASE {
            self.palette_ram.write(addr, value);
        } else if addr >= ppu_mem::NAMETABLE_BASE {
            let idx = self.ciram_index(addr);
            self.ciram[idx] = value;
        } else {
            chr.write(addr, value);
        }
        self.vram.v.increment(self.control.vram_increment());
    }

    // ------------------------------------------------------------------
    // VRAM access
    // ------------------------------------------------------------------

    fn ciram_index(&self, addr: u16) -> usize {
        let nt = (addr.wrapping_sub(ppu_mem::NAMETABLE_BASE)) & 0x0FFF;
        let table = (nt / ppu_mem::NAMETABLE_SIZE) as usize;
        let offset = (nt & (ppu_mem::NAMETABLE_SIZE - 1)) as usize;
        let physical = match self.mirroring {
            Mirroring::Vertical => table & 1,
            Mirroring::Horizontal => (table >> 1) & 1,
            Mirroring::FourScreen => table,
        };
        physical * ppu_mem::NAMETABLE_SIZE as usize + offset
    }

    fn vram_read(&self, addr: u16, chr: &mut ChrBus<'_>) -> u8 {
        if addr <= ppu_mem::PATTERN_TABLE_END {
            chr.read(addr)
        } else {
            self.ciram[self.ciram_index(addr)]
        }
    }

    // ------------------------------------------------------------------
    // Per-dot pipeline
    // ------------------------------------------------------------------

    /// Advances the PPU by one dot.
    pub fn clock(&mut self, chr: &mut ChrBus<'_>) {
        let rendering = self.mask.rendering_enabled();
        let visible = (0..=239).contains(&self.scanline);
        let prerender = self.scanline == PRERENDER_LINE;

        if prerender && self.dot == 1 {
            self.status
                .remove(Status::VERTICAL_BLANK | Status::SPRITE_0_HIT | Status::SPRITE_OVERFLOW);
            self.ledger.record_clear(self.master_dot);
            self.ledger.start_frame();
        }

        if self.scanline == VBLANK_LINE && self.dot == 1 {
            if !self.ledger.suppress_this_frame {
                self.status.insert(Status::VERTICAL_BLANK);
                self.ledger.record_set(self.master_dot);
            }
            self.frame_complete = true;
        }

        if rendering && (visible || prerender) {
            self.run_fetch_pipeline(chr, prerender);
            if visible {
                self.run_sprite_evaluation();
            }
            self.run_sprite_fetches(chr, visible);
        }

        if visible && (1..=256).contains(&self.dot) {
            self.compose_pixel(rendering);
        }

        self.advance_position(rendering);
    }

    fn run_fetch_pipeline(&mut self, chr: &mut ChrBus<'_>, prerender: bool) {
        let dot = self.dot;
        if (2..=257).contains(&dot) || (321..=337).contains(&dot) {
            self.bg.shift();
            match (dot - 1) % 8 {
                0 => {
                    self.bg.load_shifters();
                    let addr = self.vram.v.tile_addr();
                    self.bg.tile_latch = self.vram_read(addr, chr);
                }
                2 => {
                    let addr = self.vram.v.attribute_addr();
                    let byte = self.vram_read(addr, chr);
                    // Select the 2-bit quadrant for this tile.
                    let shift = ((self.vram.v.coarse_y() & 2) << 1) | (self.vram.v.coarse_x() & 2);
                    self.bg.attr_latch = (byte >> shift) & 0b11;
                }
                4 => {
                    let addr = self.bg_pattern_addr(0);
                    self.bg.pattern_low_latch = chr.read(addr);
                }
                6 => {
                    let addr = self.bg_pattern_addr(8);
                    self.bg.pattern_high_latch = chr.read(addr);
                }
                7 => self.vram.v.increment_coarse_x(),
                _ => {}
            }
        }

        if dot == 256 {
            self.vram.v.increment_y();
        }
        if dot == 257 {
            self.bg.load_shifters();
            let t = self.vram.t;
            self.vram.v.copy_x_from(t);
        }
        if prerender && (280..=304).contains(&dot) {
            let t = self.vram.t;
            self.vram.v.copy_y_from(t);
        }
        // Idle nametable fetches at the end of the line (mapper A12 food).
        if dot == 338 || dot == 340 {
            let addr = self.vram.v.tile_addr();
            self.bg.tile_latch = self.vram_read(addr, chr);
        }
    }

    fn bg_pattern_addr(&self, plane: u16) -> u16 {
        self.control.background_pattern_table()
            + (self.bg.tile_latch as u16) * 16
            + self.vram.v.fine_y() as u16
            + plane
    }

    fn run_sprite_evaluation(&mut self) {
        match self.dot {
            1 => {
                self.secondary_oam.fill(0xFF);
                self.sprite_eval.reset();
            }
            // One evaluation step per read/write dot pair.
            66..=256 if self.dot % 2 == 0 => {
                let overflowed = self.sprite_eval.step(
                    &self.oam,
                    &mut self.secondary_oam,
                    self.scanline,
                    self.control.sprite_height(),
                );
                if overflowed {
                    self.status.insert(Status::SPRITE_OVERFLOW);
                }
            }
            _ => {}
        }
    }

    fn run_sprite_fetches(&mut self, chr: &mut ChrBus<'_>, visible: bool) {
        if !(257..=320).contains(&self.dot) {
            return;
        }
        // OAMADDR is forced to zero throughout the sprite fetch window.
        self.oam_addr = 0;
        if (self.dot - 257) % 8 == 4 {
            let index = ((self.dot - 257) / 8) as usize;
            if index == 0 {
                self.sprites.clear();
            }
            // The pre-render line fetches garbage; only visible lines load
            // sprites for the next scanline.
            if visible && index < self.sprite_eval.count as usize {
                self.fetch_sprite_unit(index, chr);
            }
        }
    }

    fn fetch_sprite_unit(&mut self, index: usize, chr: &mut ChrBus<'_>) {
        let base = index * 4;
        let y = self.secondary_oam[base];
        let tile = self.secondary_oam[base + 1];
        let attr = self.secondary_oam[base + 2];
        let x = self.secondary_oam[base + 3];

        let height = self.control.sprite_height();
        let mut row = (self.scanline - y as i16).clamp(0, height as i16 - 1) as u8;
        if attr & sprites::ATTR_FLIP_V != 0 {
            row = height - 1 - row;
        }

        let addr = if height == 16 {
            let table = (tile as u16 & 1) * 0x1000;
            let mut tile16 = tile & 0xFE;
            if row >= 8 {
                tile16 += 1;
                row -= 8;
            }
            table + tile16 as u16 * 16 + row as u16
        } else {
            self.control.sprite_pattern_table() + tile as u16 * 16 + row as u16
        };

        self.sprites.units[index] = SpriteUnit {
            x,
            attr,
            pattern_low: chr.read(addr),
            pattern_high: chr.read(addr + 8),
            is_sprite0: index == 0 && self.sprite_eval.sprite0_found,
        };
        self.sprites.count = self.sprites.count.max(index as u8 + 1);
    }

    fn compose_pixel(&mut self, rendering: bool) {
        let x = (self.dot - 1) as usize;
        let y = self.scanline as usize;

        let mut bg_color = 0;
        let mut bg_line = 0;
        if self.mask.contains(Mask::SHOW_BACKGROUND)
            && (x >= 8 || self.mask.contains(Mask::SHOW_BG_LEFT))
        {
            let (line, color) = self.bg.pixel(self.vram.fine_x);
            bg_line = line;
            bg_color = color;
        }

        let mut sprite = None;
        if self.mask.contains(Mask::SHOW_SPRITES)
            && (x >= 8 || self.mask.contains(Mask::SHOW_SPRITE_LEFT))
        {
            sprite = self.sprites.pixel_at(x as u16);
        }

        let (line, color) = match (bg_color, sprite) {
            (0, None) => (0, 0),
            (0, Some((color, line, _, _))) => (line, color),
            (_, None) => (bg_line, bg_color),
            (_, Some((color, line, behind, is_sprite0))) => {
                if is_sprite0 && rendering && x != 255 {
                    self.status.insert(Status::SPRITE_0_HIT);
                }
                if behind {
                    (bg_line, bg_color)
                } else {
                    (line, color)
                }
            }
        };

        let palette_index = self.palette_ram.color_index(line, color);
        self.framebuffer
            .set_pixel(x, y, SYSTEM_PALETTE[palette_index as usize & 0x3F]);
    }

    fn advance_position(&mut self, rendering: bool) {
        self.master_dot = self.master_dot.wrapping_add(1);

        // NTSC odd frames drop the last pre-render dot when rendering.
        if self.region == Region::Ntsc
            && rendering
            && self.scanline == PRERENDER_LINE
            && self.dot == 339
            && self.frame & 1 == 1
        {
            self.dot = 0;
            self.scanline = 0;
            return;
        }

        self.dot += 1;
        if self.dot >= DOTS_PER_SCANLINE {
            self.dot = 0;
            self.scanline += 1;
            let last_line = self.region.scanlines_per_frame() - 2;
            if self.scanline > last_line {
                self.scanline = PRERENDER_LINE;
                self.frame = self.frame.wrapping_add(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Cartridge;

    fn cartridge() -> Cartridge {
        crate::cartridge::test_support::nrom_cartridge(&[])
    }

    fn ppu() -> Ppu {
        Ppu::new(Region::Ntsc, Mirroring::Horizontal)
    }

    fn run_to(ppu: &mut Ppu, cart: &mut Cartridge, scanline: i16, dot: u16) {
        let mut chr = ChrBus::new(cart);
        let mut guard = 0u32;
        while !(ppu.scanline == scanline && ppu.dot == dot) {
            ppu.clock(&mut chr);
            guard += 1;
            assert!(guard < 341 * 313 * 2, "PPU never reached {scanline}/{dot}");
        }
    }

    #[test]
    fn vblank_sets_at_241_dot_1() {
        let mut ppu = ppu();
        let mut cart = cartridge();
        run_to(&mut ppu, &mut cart, 241, 1);
        assert!(!ppu.status.contains(Status::VERTICAL_BLANK));
        let mut chr = ChrBus::new(&mut cart);
        ppu.clock(&mut chr);
        assert!(ppu.status.contains(Status::VERTICAL_BLANK));
        assert!(ppu.take_frame_complete());
    }

    #[test]
    fn vblank_clears_at_prerender_dot_1() {
        let mut ppu = ppu();
        let mut cart = cartridge();
        run_to(&mut ppu, &mut cart, 241, 2);
        assert!(ppu.status.contains(Status::VERTICAL_BLANK));
        run_to(&mut ppu, &mut cart, -1, 2);
        assert!(!ppu.status.contains(Status::VERTICAL_BLANK));
    }

    #[test]
    fn status_read_clears_vblank_and_latch() {
        let mut ppu = ppu();
        let mut cart = cartridge();
        run_to(&mut ppu, &mut cart, 241, 2);
        ppu.vram.write_latch = true;
        let mut chr = ChrBus::new(&mut cart);
        let value = ppu.cpu_read(0x2002, &mut chr, 0x1F);
        assert_eq!(value & 0x80, 0x80);
        assert_eq!(value & 0x1F, 0x1F);
        assert!(!ppu.status.contains(Status::VERTICAL_BLANK));
        assert!(!ppu.vram.write_latch);
        // Subsequent reads in the same VBlank observe the flag cleared.
        let value = ppu.cpu_read(0x2002, &mut chr, 0);
        assert_eq!(value & 0x80, 0);
    }

    #[test]
    fn status_read_one_dot_early_suppresses_the_flag() {
        let mut ppu = ppu();
        let mut cart = cartridge();
        run_to(&mut ppu, &mut cart, 241, 0);
        let mut chr = ChrBus::new(&mut cart);
        let value = ppu.cpu_read(0x2002, &mut chr, 0);
        assert_eq!(value & 0x80, 0);
        ppu.clock(&mut chr);
        ppu.clock(&mut chr);
        // The set edge was skipped entirely this frame.
        assert!(!ppu.status.contains(Status::VERTICAL_BLANK));
        assert!(!ppu.nmi_output());
    }

    #[test]
    fn data_reads_are_buffered_below_palette() {
        let mut ppu = ppu();
        let mut cart = cartridge();
        let mut chr = ChrBus::new(&mut cart);
        // Write $AB to $2005 in VRAM, then read it back through the buffer.
        ppu.cpu_write(0x2006, 0x20, &mut chr);
        ppu.cpu_write(0x2006, 0x05, &mut chr);
        ppu.cpu_write(0x2007, 0xAB, &mut chr);
        ppu.cpu_write(0x2006, 0x20, &mut chr);
        ppu.cpu_write(0x2006, 0x05, &mut chr);
        let first = ppu.cpu_read(0x2007, &mut chr, 0);
        let second = ppu.cpu_read(0x2007, &mut chr, 0);
        assert_eq!(first, 0); // stale buffer
        assert_eq!(second, 0xAB);
    }

    #[test]
    fn palette_reads_bypass_the_buffer() {
        let mut ppu = ppu();
        let mut cart = cartridge();
        let mut chr = ChrBus::new(&mut cart);
        ppu.cpu_write(0x2006, 0x3F, &mut chr);
        ppu.cpu_write(0x2006, 0x01, &mut chr);
        ppu.cpu_write(0x2007, 0x2C, &mut chr);
        ppu.cpu_write(0x2006, 0x3F, &mut chr);
        ppu.cpu_write(0x2006, 0x01, &mut chr);
        assert_eq!(ppu.cpu_read(0x2007, &mut chr, 0), 0x2C);
    }

    #[test]
    fn oam_data_increments_on_write_only() {
        let mut ppu = ppu();
        let mut cart = cartridge();
        let mut chr = ChrBus::new(&mut cart);
        ppu.cpu_write(0x2003, 0x10, &mut chr);
        ppu.cpu_write(0x2004, 0x42, &mut chr);
        assert_eq!(ppu.oam_addr(), 0x11);
        ppu.cpu_write(0x2003, 0x10, &mut chr);
        assert_eq!(ppu.cpu_read(0x2004, &mut chr, 0), 0x42);
        assert_eq!(ppu.oam_addr(), 0x10);
    }

    #[test]
    fn nametable_mirroring_horizontal() {
        let mut ppu = ppu();
        // $2000 and $2400 share physical table 0 under horizontal mirroring.
        assert_eq!(ppu.ciram_index(0x2000), ppu.ciram_index(0x2400));
        assert_ne!(ppu.ciram_index(0x2000), ppu.ciram_index(0x2800));
        ppu.mirroring = Mirroring::Vertical;
        assert_eq!(ppu.ciram_index(0x2000), ppu.ciram_index(0x2800));
        assert_ne!(ppu.ciram_index(0x2000), ppu.ciram_index(0x2400));
    }

    #[test]
    fn odd_frame_skips_a_prerender_dot() {
        let mut ppu = ppu();
        let mut cart = cartridge();
        ppu.mask = Mask::SHOW_BACKGROUND;
        // Frame 1 (odd): pre-render dot 339 jumps straight to (0,0).
        ppu.frame = 1;
        ppu.scanline = PRERENDER_LINE;
        ppu.dot = 339;
        let mut chr = ChrBus::new(&mut cart);
        ppu.clock(&mut chr);
        assert_eq!((ppu.scanline, ppu.dot), (0, 0));
    }
}
