//! The machine's CPU-visible bus.
//!
//! Borrows the hardware from the owning [`Nes`](crate::nes::Nes) for the
//! duration of one CPU cycle and routes the 16-bit address space. The
//! open-bus latch is refreshed by every access except `$4015` reads, which
//! only touch the CPU's internal bus on hardware.

use crate::apu::Apu;
use crate::cartridge::Cartridge;
use crate::controller::Controller;
use crate::dma::DmaBus;
use crate::memory::cpu as cpu_mem;
use crate::ppu::Ppu;
use crate::ppu::chr::ChrBus;

use super::{Bus, OpenBus, WatchHit, Watchpoint, check_watchpoints};

pub struct CpuBus<'a> {
    ram: &'a mut [u8],
    ppu: &'a mut Ppu,
    apu: &'a mut Apu,
    cartridge: &'a mut Cartridge,
    controllers: &'a mut [Controller; 2],
    open_bus: &'a mut OpenBus,
    /// `$4014` writes park the page here; the machine tick starts the DMA.
    oam_dma_request: &'a mut Option<u8>,
    watchpoints: &'a [Watchpoint],
    watch_hit: &'a mut Option<WatchHit>,
}

impl<'a> CpuBus<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ram: &'a mut [u8],
        ppu: &'a mut Ppu,
        apu: &'a mut Apu,
        cartridge: &'a mut Cartridge,
        controllers: &'a mut [Controller; 2],
        open_bus: &'a mut OpenBus,
        oam_dma_request: &'a mut Option<u8>,
        watchpoints: &'a [Watchpoint],
        watch_hit: &'a mut Option<WatchHit>,
    ) -> Self {
        Self {
            ram,
            ppu,
            apu,
            cartridge,
            controllers,
            open_bus,
            oam_dma_request,
            watchpoints,
            watch_hit,
        }
    }

    fn ram_index(addr: u16) -> usize {
        (addr & cpu_mem::INTERNAL_RAM_MASK) as usize
    }

    /// Side-effect-free read for debugger inspection. Registers with read
    /// side effects report the open-bus value instead of mutating state.
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            cpu_mem::INTERNAL_RAM_START..=cpu_mem::INTERNAL_RAM_MIRROR_END => {
                self.ram[Self::ram_index(addr)]
            }
            cpu_mem::CARTRIDGE_SPACE_BASE..=cpu_mem::CPU_ADDR_END => self
                .cartridge
                .cpu_read(addr)
                .unwrap_or_else(|| self.open_bus.sample()),
            _ => self.open_bus.sample(),
        }
    }
}

impl Bus for CpuBus<'_> {
    fn read(&mut self, addr: u16) -> u8 {
        let mut driven = true;
        let value = match addr {
            cpu_mem::INTERNAL_RAM_START..=cpu_mem::INTERNAL_RAM_MIRROR_END => {
                self.ram[Self::ram_index(addr)]
            }
            cpu_mem::PPU_REGISTER_BASE..=cpu_mem::PPU_REGISTER_END => {
                let open = self.open_bus.sample();
                let mut chr = ChrBus::new(self.cartridge);
                self.ppu.cpu_read(addr, &mut chr, open)
            }
            // Channel registers are write-only; so is the DMA trigger.
            cpu_mem::APU_CHANNEL_BASE..=cpu_mem::APU_CHANNEL_END | cpu_mem::OAM_DMA => {
                driven = false;
                self.open_bus.sample()
            }
            // $4015 does not refresh the external bus latch; bit 5 floats.
            cpu_mem::APU_STATUS => {
                driven = false;
                self.apu.read_status() | (self.open_bus.sample() & 0x20)
            }
            cpu_mem::CONTROLLER_PORT_1 => {
                self.controllers[0].read() | (self.open_bus.sample() & 0xE0)
            }
            cpu_mem::CONTROLLER_PORT_2 => {
                self.controllers[1].read() | (self.open_bus.sample() & 0xE0)
            }
            cpu_mem::TEST_MODE_BASE..=cpu_mem::TEST_MODE_END => {
                driven = false;
                self.open_bus.sample()
            }
            cpu_mem::CARTRIDGE_SPACE_BASE..=cpu_mem::CPU_ADDR_END => {
                match self.cartridge.cpu_read(addr) {
                    Some(value) => value,
                    None => {
                        driven = false;
                        self.open_bus.sample()
                    }
                }
            }
        };

        if driven {
            self.open_bus.latch(value);
        }
        check_watchpoints(self.watchpoints, self.watch_hit, addr, value, false);
        value
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.open_bus.latch(value);
        check_watchpoints(self.watchpoints, self.watch_hit, addr, value, true);

        match addr {
            cpu_mem::INTERNAL_RAM_START..=cpu_mem::INTERNAL_RAM_MIRROR_END => {
                self.ram[Self::ram_index(addr)] = value;
            }
            cpu_mem::PPU_REGISTER_BASE..=cpu_mem::PPU_REGISTER_END => {
                let mut chr = ChrBus::new(self.cartridge);
                self.ppu.cpu_write(addr, value, &mut chr);
            }
            cpu_mem::APU_CHANNEL_BASE..=cpu_mem::APU_CHANNEL_END => {
                self.apu.cpu_write(addr, value);
            }
            cpu_mem::OAM_DMA => *self.oam_dma_request = Some(value),
            cpu_mem::APU_STATUS => self.apu.cpu_write(addr, value),
            cpu_mem::CONTROLLER_PORT_1 => {
                for pad in self.controllers.iter_mut() {
                    pad.write_strobe(value);
                }
            }
            cpu_mem::CONTROLLER_PORT_2 => self.apu.cpu_write(addr, value),
            cpu_mem::TEST_MODE_BASE..=cpu_mem::TEST_MODE_END => {}
            cpu_mem::CARTRIDGE_SPACE_BASE..=cpu_mem::CPU_ADDR_END => {
                self.cartridge.cpu_write(addr, value);
            }
        }
    }
}

impl DmaBus for CpuBus<'_> {
    fn read(&mut self, addr: u16) -> u8 {
        Bus::read(self, addr)
    }

    fn oam_write(&mut self, value: u8) {
        self.ppu.oam_dma_write(value);
    }

    fn oam_duplicate_write(&mut self, value: u8) {
        self.ppu.oam_duplicate_write(value);
    }

    fn oam_addr(&self) -> u8 {
        self.ppu.oam_addr()
    }
}
