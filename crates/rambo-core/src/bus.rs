//! CPU-visible bus plumbing.
//!
//! [`Bus`] is the narrow interface the CPU core executes against; the real
//! machine wires it to [`CpuBus`], while unit tests use the flat
//! [`TestBus`] with a recorded access trace.

pub mod cpu;
mod open_bus;
mod test_bus;

pub use cpu::CpuBus;
pub use open_bus::OpenBus;
pub use test_bus::{BusAccess, TestBus};

use serde::{Deserialize, Serialize};

/// Memory interface the CPU microsteps execute against.
pub trait Bus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);
}

/// Access class a watchpoint triggers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchKind {
    Read,
    Write,
    ReadWrite,
}

/// A debugger watchpoint on a CPU address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watchpoint {
    pub addr: u16,
    pub kind: WatchKind,
}

impl Watchpoint {
    fn matches(&self, addr: u16, is_write: bool) -> bool {
        self.addr == addr
            && match self.kind {
                WatchKind::Read => !is_write,
                WatchKind::Write => is_write,
                WatchKind::ReadWrite => true,
            }
    }
}

/// Records the access that tripped a watchpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchHit {
    pub addr: u16,
    pub value: u8,
    pub is_write: bool,
}

pub(crate) fn check_watchpoints(
    watchpoints: &[Watchpoint],
    hit: &mut Option<WatchHit>,
    addr: u16,
    value: u8,
    is_write: bool,
) {
    if hit.is_none() && watchpoints.iter().any(|w| w.matches(addr, is_write)) {
        *hit = Some(WatchHit {
            addr,
            value,
            is_write,
        });
    }
}
