//! 6502 core, modeled as a microstep state machine.
//!
//! The CPU does not execute instructions atomically: every cycle runs exactly
//! one microstep, and every bus access happens inside a microstep. Data
//! operations live in the pure [`opcode`] layer and are applied as deltas;
//! addressing, stack traffic, and interrupt sequences are microstep
//! sequences. See [`instruction::Instruction::steps`] for the cycle tables.

use serde::{Deserialize, Serialize};

use crate::bus::Bus;

pub mod addressing;
pub mod instruction;
mod lookup;
mod microstep;
pub mod opcode;
pub mod status;

use instruction::Instruction;
use lookup::LOOKUP_TABLE;
use microstep::{INTERRUPT_INSTRUCTION, INTERRUPT_SEQUENCE, RESET_SEQUENCE, StepOutcome};
use opcode::OpcodeResult;
use status::Status;

/// Hardware interrupt classes, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interrupt {
    Reset,
    Nmi,
    Irq,
}

/// Complete CPU state, including the in-flight microstep position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpu {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub p: Status,

    /// Opcode currently executing, `None` between instructions.
    opcode: Option<u8>,
    /// Index into the current microstep sequence.
    step_index: usize,
    /// Interrupt sequence currently being serviced.
    servicing: Option<Interrupt>,
    /// Interrupt latched at the last instruction boundary.
    pending_interrupt: Option<Interrupt>,

    // Addressing scratch registers.
    operand_low: u8,
    operand_high: u8,
    effective_address: u16,
    temp_value: u8,
    page_crossed: bool,

    /// Level of the NMI input as seen on the previous tick (for edge detect).
    nmi_line: bool,
    /// Latched NMI edge, consumed at the next instruction boundary.
    nmi_pending: bool,
    /// Level-sampled IRQ input (frame IRQ | DMC IRQ | mapper IRQ).
    irq_line: bool,
    /// Set by a JAM opcode; only reset recovers the CPU.
    halted: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0,
            pc: 0,
            p: Status::default(),
            opcode: None,
            step_index: 0,
            servicing: None,
            pending_interrupt: None,
            operand_low: 0,
            operand_high: 0,
            effective_address: 0,
            temp_value: 0,
            page_crossed: false,
            nmi_line: false,
            nmi_pending: false,
            irq_line: false,
            halted: false,
        }
    }

    /// Advances the CPU by one cycle.
    pub fn clock<B: Bus>(&mut self, bus: &mut B) {
        if self.halted {
            return;
        }
        if self.servicing.is_some() {
            self.run_service_step(bus);
            return;
        }
        match self.opcode {
            None => {
                if let Some(kind) = self.pending_interrupt.take() {
                    self.servicing = Some(kind);
                    self.step_index = 0;
                    self.run_service_step(bus);
                } else {
                    let op = bus.read(self.pc);
                    self.pc = self.pc.wrapping_add(1);
                    self.opcode = Some(op);
                    self.step_index = 0;
                }
            }
            Some(op) => {
                let instr = &LOOKUP_TABLE[op as usize];
                let steps = instr.steps();
                let mut outcome = steps[self.step_index].exec(self, bus, instr);
                // A fallthrough step consumed no cycle; run its successor now.
                while outcome == StepOutcome::Fallthrough {
                    self.step_index += 1;
                    outcome = steps[self.step_index].exec(self, bus, instr);
                }
                match outcome {
                    StepOutcome::Done => self.finish_instruction(),
                    StepOutcome::Next => {
                        self.step_index += 1;
                        if self.step_index >= steps.len() {
                            self.finish_instruction();
                        }
                    }
                    StepOutcome::Fallthrough => unreachable!(),
                }
            }
        }
    }

    fn run_service_step<B: Bus>(&mut self, bus: &mut B) {
        let sequence = match self.servicing {
            Some(Interrupt::Reset) => RESET_SEQUENCE,
            _ => INTERRUPT_SEQUENCE,
        };
        let outcome = sequence[self.step_index].exec(self, bus, &INTERRUPT_INSTRUCTION);
        match outcome {
            StepOutcome::Next => self.step_index += 1,
            StepOutcome::Done => {
                self.servicing = None;
                self.finish_instruction();
            }
            StepOutcome::Fallthrough => unreachable!(),
        }
    }

    /// Clears per-instruction scratch state and latches any pending
    /// interrupt for the next boundary. NMI outranks IRQ.
    fn finish_instruction(&mut self) {
        self.opcode = None;
        self.step_index = 0;
        self.page_crossed = false;
        if self.nmi_pending {
            self.nmi_pending = false;
            self.pending_interrupt = Some(Interrupt::Nmi);
        } else if self.irq_line && !self.p.contains(Status::IRQ_DISABLE) {
            self.pending_interrupt = Some(Interrupt::Irq);
        }
    }

    /// Applies a pure-opcode delta to the register file.
    pub fn apply(&mut self, result: OpcodeResult) {
        if let Some(a) = result.a {
            self.a = a;
        }
        if let Some(x) = result.x {
            self.x = x;
        }
        if let Some(y) = result.y {
            self.y = y;
        }
        if let Some(sp) = result.sp {
            self.sp = sp;
        }
        if let Some(p) = result.p {
            self.p = p;
        }
        if let Some(pc) = result.pc {
            self.pc = pc;
        }
    }

    /// Drives the NMI input. The interrupt latches on the asserting edge.
    pub fn set_nmi_line(&mut self, asserted: bool) {
        if asserted && !self.nmi_line {
            self.nmi_pending = true;
        }
        self.nmi_line = asserted;
    }

    /// Drives the level-sampled IRQ input.
    pub fn set_irq_line(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    /// Aborts whatever is in flight and schedules the 7-cycle reset
    /// sequence. Registers keep their values; SP decays by 3 during the
    /// sequence and PC is loaded from `$FFFC/$FFFD`.
    pub fn begin_reset(&mut self) {
        self.opcode = None;
        self.step_index = 0;
        self.servicing = None;
        self.pending_interrupt = Some(Interrupt::Reset);
        self.nmi_pending = false;
        self.halted = false;
        self.p |= Status::IRQ_DISABLE;
    }

    /// True between instructions (and outside interrupt sequences); the spot
    /// where debuggers may safely inspect or swap state.
    pub fn at_instruction_boundary(&self) -> bool {
        self.opcode.is_none() && self.servicing.is_none()
    }

    /// True after a JAM opcode wedged the core.
    pub fn halted(&self) -> bool {
        self.halted
    }

    /// Decodes an opcode byte to its dispatch-table entry.
    pub fn decode(opcode: u8) -> &'static Instruction {
        &LOOKUP_TABLE[opcode as usize]
    }

    #[cfg(test)]
    pub(crate) fn run_instruction<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let mut cycles = 0;
        // Burn the fetch cycle, then step until the boundary returns.
        loop {
            self.clock(bus);
            cycles += 1;
            if self.at_instruction_boundary() || self.halted {
                return cycles;
            }
        }
    }
}
