//! Breakpoint/watchpoint bookkeeping for the emulation thread.

use rambo_core::Nes;

use crate::command::{DebugCommand, DebugEvent, InspectView};
use crate::mailbox::Ring;

#[derive(Debug, Default)]
pub struct Debugger {
    breakpoints: Vec<u16>,
    paused: bool,
    pending_steps: u32,
}

impl Debugger {
    /// True while execution is halted at the debugger's request.
    pub fn paused(&self) -> bool {
        self.paused
    }

    /// True when the runner must drive the frame instruction-by-instruction.
    pub fn intrusive(&self) -> bool {
        !self.breakpoints.is_empty()
    }

    pub fn take_step(&mut self) -> bool {
        if self.pending_steps > 0 {
            self.pending_steps -= 1;
            true
        } else {
            false
        }
    }

    pub fn should_break(&self, pc: u16) -> bool {
        self.breakpoints.contains(&pc)
    }

    pub fn pause(&mut self, events: &Ring<DebugEvent>) {
        if !self.paused {
            self.paused = true;
            let _ = events.push(DebugEvent::Paused);
        }
    }

    pub fn handle_command(
        &mut self,
        command: DebugCommand,
        nes: &mut Nes,
        events: &Ring<DebugEvent>,
    ) {
        match command {
            DebugCommand::AddBreakpoint(addr) => {
                if !self.breakpoints.contains(&addr) {
                    self.breakpoints.push(addr);
                }
            }
            DebugCommand::RemoveBreakpoint(addr) => self.breakpoints.retain(|&bp| bp != addr),
            DebugCommand::AddWatchpoint(watchpoint) => nes.add_watchpoint(watchpoint),
            DebugCommand::RemoveWatchpoint(addr) => nes.remove_watchpoint(addr),
            DebugCommand::Pause => self.pause(events),
            DebugCommand::Resume => {
                if self.paused {
                    self.paused = false;
                    let _ = events.push(DebugEvent::Resumed);
                }
            }
            DebugCommand::Step => {
                if self.paused {
                    self.pending_steps += 1;
                }
            }
            DebugCommand::Inspect => {
                let cpu = nes.cpu();
                let view = InspectView {
                    a: cpu.a,
                    x: cpu.x,
                    y: cpu.y,
                    sp: cpu.sp,
                    pc: cpu.pc,
                    p: cpu.p.bits(),
                    cpu_cycles: nes.cpu_cycles(),
                    scanline: nes.ppu().scanline,
                    dot: nes.ppu().dot,
                };
                let _ = events.push(DebugEvent::InspectResponse(view));
            }
            DebugCommand::Clear => {
                self.breakpoints.clear();
                nes.clear_watchpoints();
            }
        }
    }
}
