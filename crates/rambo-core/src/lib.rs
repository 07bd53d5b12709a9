//! RAMBO emulation core: CPU, PPU, APU, DMA engines, bus, cartridge, and
//! the machine aggregate. Scheduling and thread plumbing live in
//! `rambo-runtime`.

pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod clock;
pub mod controller;
pub mod cpu;
pub mod dma;
pub mod error;
pub mod memory;
pub mod nes;
pub mod ppu;
mod snapshot;

pub use cartridge::Cartridge;
pub use clock::Region;
pub use error::{LoaderError, SnapshotError};
pub use nes::{CpuVariant, MachineConfig, Nes, ResetKind};
pub use ppu::buffer::{FrameBuffer, SCREEN_HEIGHT, SCREEN_PIXELS, SCREEN_WIDTH};
