//! The machine aggregate and its single tick entry point.
//!
//! [`Nes::tick`] advances the whole system by one PPU dot. Every third dot
//! carries a CPU cycle, which is arbitrated DMC-DMA over OAM-DMA over the
//! CPU microstep engine, followed by one APU cycle and interrupt-line
//! sampling. `emulate_frame` runs ticks to the scanline-241-dot-1 boundary.

use serde::{Deserialize, Serialize};

use crate::apu::Apu;
use crate::bus::{CpuBus, OpenBus, WatchHit, Watchpoint};
use crate::cartridge::Cartridge;
use crate::clock::{Clock, Region};
use crate::controller::Controller;
use crate::cpu::Cpu;
use crate::dma::{DmcDma, OamDma};
use crate::error::SnapshotError;
use crate::memory::cpu as cpu_mem;
use crate::ppu::Ppu;
use crate::ppu::buffer::FrameBuffer;
use crate::ppu::chr::ChrBus;
use crate::snapshot::{self, MachineState};

/// 2A03/2A07 die revision. Only RP2A03G behavior is modeled today; the
/// variant is carried through config and snapshots so the unstable-opcode
/// constants can become selectable later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CpuVariant {
    Rp2a03e,
    #[default]
    Rp2a03g,
    Rp2a03h,
    Rp2a07,
}

/// Machine-level configuration fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MachineConfig {
    pub region: Region,
    pub cpu_variant: CpuVariant,
}

/// Power-cycle vs the front-panel reset button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    Power,
    Warm,
}

pub struct Nes {
    cpu: Cpu,
    ppu: Ppu,
    apu: Apu,
    cartridge: Cartridge,
    ram: Box<[u8]>,
    controllers: [Controller; 2],
    open_bus: OpenBus,
    clock: Clock,
    oam_dma: OamDma,
    dmc_dma: DmcDma,
    oam_dma_request: Option<u8>,
    watchpoints: Vec<Watchpoint>,
    watch_hit: Option<WatchHit>,
    config: MachineConfig,
}

impl Nes {
    pub fn new(cartridge: Cartridge, config: MachineConfig) -> Self {
        let mirroring = cartridge.mirroring();
        let mut nes = Self {
            cpu: Cpu::new(),
            ppu: Ppu::new(config.region, mirroring),
            apu: Apu::new(config.region),
            cartridge,
            ram: vec![0; cpu_mem::INTERNAL_RAM_SIZE].into_boxed_slice(),
            controllers: [Controller::new(), Controller::new()],
            open_bus: OpenBus::new(),
            clock: Clock::new(config.region),
            oam_dma: OamDma::default(),
            dmc_dma: DmcDma::default(),
            oam_dma_request: None,
            watchpoints: Vec::new(),
            watch_hit: None,
            config,
        };
        nes.reset(ResetKind::Power);
        nes
    }

    pub fn config(&self) -> MachineConfig {
        self.config
    }

    pub fn region(&self) -> Region {
        self.config.region
    }

    /// Advances the machine by one PPU dot.
    pub fn tick(&mut self) {
        {
            let mut chr = ChrBus::new(&mut self.cartridge);
            self.ppu.clock(&mut chr);
        }
        if self.clock.tick_dot() {
            self.cpu_cycle();
        }
    }

    fn cpu_cycle(&mut self) {
        // A DMC fetch request raised by the APU preempts everything; an
        // in-flight OAM transfer pauses (never cancels).
        if self.apu.dmc_needs_fetch() && !self.dmc_dma.active() {
            self.dmc_dma.start(self.apu.dmc_fetch_address());
            if self.oam_dma.active() {
                let oam_addr = self.ppu.oam_addr();
                self.oam_dma.pause(oam_addr);
            }
        }

        if self.dmc_dma.active() {
            let mut dmc = self.dmc_dma;
            let fetched = {
                let mut bus = self.cpu_bus();
                dmc.advance(&mut bus)
            };
            self.dmc_dma = dmc;
            if let Some(byte) = fetched {
                self.apu.dmc_complete_fetch(byte);
                let mut oam = self.oam_dma;
                {
                    let mut bus = self.cpu_bus();
                    oam.resume(&mut bus);
                }
                self.oam_dma = oam;
            }
        } else if self.oam_dma.active() {
            let mut oam = self.oam_dma;
            {
                let mut bus = self.cpu_bus();
                oam.advance(&mut bus);
            }
            self.oam_dma = oam;
        } else {
            let mut cpu = self.cpu;
            {
                let mut bus = self.cpu_bus();
                cpu.clock(&mut bus);
            }
            self.cpu = cpu;
        }

        self.apu.clock();

        // A `$4014` write performed this cycle arms the transfer for the
        // next one; parity at that point decides the alignment cycle.
        if let Some(page) = self.oam_dma_request.take() {
            self.oam_dma.start(page, self.clock.cpu_cycle_is_odd());
        }

        // Interrupt lines are sampled after the cycle's bus traffic so a
        // `$2002` read racing the VBlank edge is honored.
        let irq = self.apu.irq_pending() || self.cartridge.irq_pending();
        self.cpu.set_irq_line(irq);
        self.cpu.set_nmi_line(self.ppu.nmi_output());
    }

    fn cpu_bus(&mut self) -> CpuBus<'_> {
        CpuBus::new(
            &mut self.ram,
            &mut self.ppu,
            &mut self.apu,
            &mut self.cartridge,
            &mut self.controllers,
            &mut self.open_bus,
            &mut self.oam_dma_request,
            &self.watchpoints,
            &mut self.watch_hit,
        )
    }

    /// Runs to the next VBlank edge (scanline 241, dot 1).
    pub fn emulate_frame(&mut self) {
        // Two full frames of dots is beyond any legal boundary distance.
        let limit = 341 * self.config.region.scanlines_per_frame() as u32 * 2;
        for _ in 0..limit {
            self.tick();
            if self.ppu.take_frame_complete() {
                return;
            }
        }
        panic!("PPU never reached the frame boundary");
    }

    /// Runs whole ticks until exactly one CPU instruction has retired.
    /// Returns early if the CPU is jammed.
    pub fn step_instruction(&mut self) {
        let limit = 341 * self.config.region.scanlines_per_frame() as u32 * 2;
        let mut started = false;
        for _ in 0..limit {
            self.tick();
            if self.cpu.halted() {
                return;
            }
            if !self.cpu.at_instruction_boundary() {
                started = true;
            } else if started {
                return;
            }
        }
    }

    /// Consumes the VBlank-edge flag raised at scanline 241 dot 1. Used by
    /// schedulers that drive ticks themselves instead of `emulate_frame`.
    pub fn take_frame_complete(&mut self) -> bool {
        self.ppu.take_frame_complete()
    }

    pub fn reset(&mut self, kind: ResetKind) {
        tracing::debug!(?kind, "machine reset");
        match kind {
            ResetKind::Power => {
                self.ram.fill(0);
                self.open_bus.reset();
                self.ppu.reset(true);
                self.apu.reset();
                self.clock.reset();
                self.cpu = Cpu::new();
                self.controllers = [Controller::new(), Controller::new()];
                self.oam_dma = OamDma::default();
                self.dmc_dma = DmcDma::default();
                self.oam_dma_request = None;
            }
            ResetKind::Warm => {
                self.ppu.reset(false);
                // /RESET silences the channels and rewrites $4017.
                self.apu.cpu_write(cpu_mem::APU_STATUS, 0);
                self.apu.cpu_write(cpu_mem::CONTROLLER_PORT_2, 0);
            }
        }
        self.cpu.begin_reset();
    }

    // ------------------------------------------------------------------
    // External surfaces
    // ------------------------------------------------------------------

    pub fn framebuffer(&self) -> &FrameBuffer {
        self.ppu.framebuffer()
    }

    pub fn set_controller_buttons(&mut self, port: usize, mask: u8) {
        if let Some(pad) = self.controllers.get_mut(port) {
            pad.set_buttons(mask);
        }
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    pub fn cpu_cycles(&self) -> u64 {
        self.clock.cpu_cycles
    }

    pub fn oam_dma_active(&self) -> bool {
        self.oam_dma.active()
    }

    pub fn dmc_dma_active(&self) -> bool {
        self.dmc_dma.active()
    }

    pub fn ppu_dots(&self) -> u64 {
        self.clock.ppu_dots
    }

    /// Debugger read with no side effects.
    pub fn peek(&mut self, addr: u16) -> u8 {
        self.cpu_bus().peek(addr)
    }

    /// Bus access used by tests and tools; has full side effects.
    pub fn bus_read(&mut self, addr: u16) -> u8 {
        use crate::bus::Bus;
        self.cpu_bus().read(addr)
    }

    /// Bus access used by tests and tools; has full side effects.
    pub fn bus_write(&mut self, addr: u16, value: u8) {
        use crate::bus::Bus;
        self.cpu_bus().write(addr, value);
    }

    // Debugger hooks ----------------------------------------------------

    pub fn add_watchpoint(&mut self, watchpoint: Watchpoint) {
        if !self.watchpoints.contains(&watchpoint) {
            self.watchpoints.push(watchpoint);
        }
    }

    pub fn remove_watchpoint(&mut self, addr: u16) {
        self.watchpoints.retain(|w| w.addr != addr);
    }

    pub fn clear_watchpoints(&mut self) {
        self.watchpoints.clear();
    }

    pub fn take_watch_hit(&mut self) -> Option<WatchHit> {
        self.watch_hit.take()
    }

    pub fn at_instruction_boundary(&self) -> bool {
        self.cpu.at_instruction_boundary()
    }

    // Snapshots ---------------------------------------------------------

    pub fn save_state(&self) -> Result<Vec<u8>, SnapshotError> {
        let state = MachineState {
            cpu: self.cpu,
            ppu: self.ppu.clone(),
            apu: self.apu,
            clock: self.clock,
            ram: self.ram.to_vec(),
            controllers: self.controllers,
            open_bus: self.open_bus,
            oam_dma: self.oam_dma,
            dmc_dma: self.dmc_dma,
            oam_dma_request: self.oam_dma_request,
            mapper: self.cartridge.mapper().clone(),
        };
        snapshot::encode(self.cartridge.mapper_id(), self.config, state)
    }

    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let state = snapshot::decode(bytes, self.cartridge.mapper_id(), self.config)?;
        if state.ram.len() != self.ram.len() {
            return Err(SnapshotError::Truncated);
        }
        self.cpu = state.cpu;
        self.ppu = state.ppu;
        self.apu = state.apu;
        self.clock = state.clock;
        self.ram.copy_from_slice(&state.ram);
        self.controllers = state.controllers;
        self.open_bus = state.open_bus;
        self.oam_dma = state.oam_dma;
        self.dmc_dma = state.dmc_dma;
        self.oam_dma_request = state.oam_dma_request;
        self.cartridge.replace_mapper(state.mapper);
        tracing::debug!("snapshot restored");
        Ok(())
    }
}
