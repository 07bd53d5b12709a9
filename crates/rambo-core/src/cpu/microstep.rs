//! Microstep engine: one enum variant per CPU-cycle-granular action.
//!
//! Every instruction is a static sequence of microsteps; each step performs
//! at most one bus access. Dummy reads, the RMW original-value write, and
//! the indexed-read page-cross fallthrough are all explicit steps so the bus
//! observes exactly the accesses the hardware makes.

use crate::bus::Bus;
use crate::memory::cpu as cpu_mem;

use super::instruction::Instruction;
use super::opcode::{self, Mnemonic};
use super::status::Status;
use super::{Cpu, Interrupt};

/// Result of running one microstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    /// Continue with the next step on the next cycle.
    Next,
    /// The instruction is complete at the end of this cycle.
    Done,
    /// Run the next step within the *same* cycle. Only legal for steps that
    /// perform no bus access (the no-page-cross fallthrough).
    Fallthrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum MicroStep {
    /// Read the address/operand low byte (or zero-page pointer) at PC.
    FetchAddrLow,
    /// Read the address high byte at PC.
    FetchAddrHigh,
    /// Dummy read at the zero-page base, then add X within the page.
    ZpAddX,
    /// Dummy read at the zero-page base, then add Y within the page.
    ZpAddY,
    /// Read the high byte at PC and add X to the full address, flagging a
    /// page cross.
    FetchHighAddX,
    /// Read the high byte at PC and add Y to the full address, flagging a
    /// page cross.
    FetchHighAddY,
    /// Read the pointer low byte from the zero page.
    ReadPointerLow,
    /// Read the pointer high byte from the zero page (page-wrapped).
    ReadPointerHigh,
    /// Read the pointer high byte, then add Y, flagging a page cross.
    ReadPointerHighAddY,
    /// Indexed-read page-cross handling: a real read at the unfixed address
    /// when a cross occurred, otherwise fall through to the execute step in
    /// this same cycle.
    FixPageCross,
    /// Unconditional read at the unfixed address (writes and RMW always pay
    /// this cycle).
    FixPageCrossAlways,
    /// RMW: read the original value.
    RmwRead,
    /// RMW: write the original value back (observable dummy write).
    RmwDummyWrite,
    /// Final cycle of a read instruction: data read + pure-op delta.
    ExecuteRead,
    /// Final cycle of an immediate instruction: operand fetched from PC here.
    ExecuteImmediate,
    /// Final cycle of an implied instruction: dummy read at PC + delta.
    ExecuteImplied,
    /// Final cycle of an accumulator instruction.
    ExecuteAccumulator,
    /// Final cycle of a store: delta computed, value written.
    ExecuteWrite,
    /// Final cycle of an RMW instruction: modified value written.
    ExecuteRmwWrite,
    /// Branch cycle 2: fetch the offset and decide.
    BranchFetchOffset,
    /// Branch cycle 3: apply the offset to PCL.
    BranchFixLow,
    /// Branch cycle 4: fix PCH after a page cross.
    BranchFixHigh,
    /// `JMP $nnnn` final cycle.
    JmpAbsolute,
    /// `JMP ($nnnn)` pointer low read.
    JmpIndirectLow,
    /// `JMP ($nnnn)` pointer high read (page-wrap bug) + jump.
    JmpIndirectHigh,
    /// Dummy read at PC without advancing it.
    DummyReadPc,
    /// Dummy read at the current stack slot.
    StackDummyRead,
    PushPch,
    PushPcl,
    /// Push P with the B bit set (PHP/BRK).
    PushStatusBrk,
    /// Push P with the B bit clear (IRQ/NMI).
    PushStatusInterrupt,
    PushA,
    PullA,
    PullStatus,
    PullPcl,
    PullPch,
    /// RTS final cycle: increment the pulled PC.
    RtsIncrementPc,
    /// JSR final cycle: fetch the high byte and jump.
    JsrJump,
    /// BRK cycle 2: fetch (and discard) the padding byte.
    BrkFetchPad,
    /// Interrupt vector low fetch; masks IRQs.
    VectorLowSetI,
    /// Interrupt vector high fetch + jump.
    VectorHigh,
    /// Reset stack cycle: dummy read, SP decremented, nothing written.
    ResetSpDec,
    /// Unofficial JAM/KIL: wedge the CPU.
    Jam,
}

impl MicroStep {
    pub(crate) fn exec<B: Bus>(
        self,
        cpu: &mut Cpu,
        bus: &mut B,
        instr: &Instruction,
    ) -> StepOutcome {
        use MicroStep::*;
        match self {
            FetchAddrLow => {
                cpu.operand_low = bus.read(cpu.pc);
                cpu.pc = cpu.pc.wrapping_add(1);
                cpu.effective_address = cpu.operand_low as u16;
                StepOutcome::Next
            }
            FetchAddrHigh => {
                cpu.operand_high = bus.read(cpu.pc);
                cpu.pc = cpu.pc.wrapping_add(1);
                cpu.effective_address = u16::from_le_bytes([cpu.operand_low, cpu.operand_high]);
                StepOutcome::Next
            }
            ZpAddX => {
                bus.read(cpu.operand_low as u16);
                cpu.effective_address = cpu.operand_low.wrapping_add(cpu.x) as u16;
                StepOutcome::Next
            }
            ZpAddY => {
                bus.read(cpu.operand_low as u16);
                cpu.effective_address = cpu.operand_low.wrapping_add(cpu.y) as u16;
                StepOutcome::Next
            }
            FetchHighAddX => {
                cpu.operand_high = bus.read(cpu.pc);
                cpu.pc = cpu.pc.wrapping_add(1);
                let base = u16::from_le_bytes([cpu.operand_low, cpu.operand_high]);
                cpu.page_crossed = cpu.operand_low.checked_add(cpu.x).is_none();
                cpu.effective_address = base.wrapping_add(cpu.x as u16);
                StepOutcome::Next
            }
            FetchHighAddY => {
                cpu.operand_high = bus.read(cpu.pc);
                cpu.pc = cpu.pc.wrapping_add(1);
                let base = u16::from_le_bytes([cpu.operand_low, cpu.operand_high]);
                cpu.page_crossed = cpu.operand_low.checked_add(cpu.y).is_none();
                cpu.effective_address = base.wrapping_add(cpu.y as u16);
                StepOutcome::Next
            }
            ReadPointerLow => {
                cpu.temp_value = bus.read(cpu.effective_address);
                StepOutcome::Next
            }
            ReadPointerHigh => {
                let ptr = cpu.effective_address as u8;
                cpu.operand_high = bus.read(ptr.wrapping_add(1) as u16);
                cpu.effective_address = u16::from_le_bytes([cpu.temp_value, cpu.operand_high]);
                StepOutcome::Next
            }
            ReadPointerHighAddY => {
                let ptr = cpu.effective_address as u8;
                cpu.operand_high = bus.read(ptr.wrapping_add(1) as u16);
                let base = u16::from_le_bytes([cpu.temp_value, cpu.operand_high]);
                cpu.page_crossed = cpu.temp_value.checked_add(cpu.y).is_none();
                cpu.effective_address = base.wrapping_add(cpu.y as u16);
                StepOutcome::Next
            }
            FixPageCross => {
                if cpu.page_crossed {
                    bus.read(cpu.unfixed_address());
                    StepOutcome::Next
                } else {
                    StepOutcome::Fallthrough
                }
            }
            FixPageCrossAlways => {
                bus.read(cpu.unfixed_address());
                StepOutcome::Next
            }
            RmwRead => {
                cpu.temp_value = bus.read(cpu.effective_address);
                StepOutcome::Next
            }
            RmwDummyWrite => {
                bus.write(cpu.effective_address, cpu.temp_value);
                StepOutcome::Next
            }
            ExecuteRead => {
                let operand = bus.read(cpu.effective_address);
                let result = opcode::execute(instr.mnemonic, cpu, operand);
                cpu.apply(result);
                StepOutcome::Done
            }
            ExecuteImmediate => {
                let operand = bus.read(cpu.pc);
                cpu.pc = cpu.pc.wrapping_add(1);
                let result = opcode::execute(instr.mnemonic, cpu, operand);
                cpu.apply(result);
                StepOutcome::Done
            }
            ExecuteImplied => {
                bus.read(cpu.pc);
                let result = opcode::execute(instr.mnemonic, cpu, 0);
                cpu.apply(result);
                StepOutcome::Done
            }
            ExecuteAccumulator => {
                bus.read(cpu.pc);
                let mut result = opcode::execute(instr.mnemonic, cpu, cpu.a);
                // Accumulator mode retargets the memory result at A.
                result.a = result.memory_write.take();
                cpu.apply(result);
                StepOutcome::Done
            }
            ExecuteWrite => {
                // Stores receive the pre-index address high byte; the
                // SHA/SHX/SHY/SHS family folds it into the stored value.
                let result = opcode::execute(instr.mnemonic, cpu, cpu.operand_high);
                let value = result.memory_write.unwrap_or(0);
                bus.write(cpu.effective_address, value);
                let mut rest = result;
                rest.memory_write = None;
                cpu.apply(rest);
                StepOutcome::Done
            }
            ExecuteRmwWrite => {
                let result = opcode::execute(instr.mnemonic, cpu, cpu.temp_value);
                let value = result.memory_write.unwrap_or(cpu.temp_value);
                bus.write(cpu.effective_address, value);
                let mut rest = result;
                rest.memory_write = None;
                cpu.apply(rest);
                StepOutcome::Done
            }
            BranchFetchOffset => {
                let offset = bus.read(cpu.pc) as i8;
                cpu.pc = cpu.pc.wrapping_add(1);
                if !branch_taken(instr.mnemonic, cpu.p) {
                    return StepOutcome::Done;
                }
                cpu.effective_address = cpu.pc.wrapping_add(offset as u16);
                StepOutcome::Next
            }
            BranchFixLow => {
                bus.read(cpu.pc);
                let target = cpu.effective_address;
                cpu.pc = (cpu.pc & 0xFF00) | (target & 0x00FF);
                if cpu.pc == target {
                    StepOutcome::Done
                } else {
                    StepOutcome::Next
                }
            }
            BranchFixHigh => {
                bus.read(cpu.pc);
                cpu.pc = cpu.effective_address;
                StepOutcome::Done
            }
            JmpAbsolute => {
                let high = bus.read(cpu.pc);
                cpu.pc = u16::from_le_bytes([cpu.operand_low, high]);
                StepOutcome::Done
            }
            JmpIndirectLow => {
                cpu.temp_value = bus.read(cpu.effective_address);
                StepOutcome::Next
            }
            JmpIndirectHigh => {
                // 6502 bug: the pointer high byte never crosses the page.
                let ptr = (cpu.effective_address & 0xFF00)
                    | (cpu.effective_address.wrapping_add(1) & 0x00FF);
                let high = bus.read(ptr);
                cpu.pc = u16::from_le_bytes([cpu.temp_value, high]);
                StepOutcome::Done
            }
            DummyReadPc => {
                bus.read(cpu.pc);
                StepOutcome::Next
            }
            StackDummyRead => {
                bus.read(cpu.stack_addr());
                StepOutcome::Next
            }
            PushPch => {
                bus.write(cpu.stack_addr(), (cpu.pc >> 8) as u8);
                cpu.sp = cpu.sp.wrapping_sub(1);
                StepOutcome::Next
            }
            PushPcl => {
                bus.write(cpu.stack_addr(), cpu.pc as u8);
                cpu.sp = cpu.sp.wrapping_sub(1);
                StepOutcome::Next
            }
            PushStatusBrk => {
                bus.write(cpu.stack_addr(), cpu.p.to_pushed_brk());
                cpu.sp = cpu.sp.wrapping_sub(1);
                if instr.mnemonic == Mnemonic::PHP {
                    StepOutcome::Done
                } else {
                    StepOutcome::Next
                }
            }
            PushStatusInterrupt => {
                bus.write(cpu.stack_addr(), cpu.p.to_pushed_interrupt());
                cpu.sp = cpu.sp.wrapping_sub(1);
                StepOutcome::Next
            }
            PushA => {
                bus.write(cpu.stack_addr(), cpu.a);
                cpu.sp = cpu.sp.wrapping_sub(1);
                StepOutcome::Done
            }
            PullA => {
                cpu.sp = cpu.sp.wrapping_add(1);
                cpu.a = bus.read(cpu.stack_addr());
                cpu.p = cpu.p.with_zn(cpu.a);
                StepOutcome::Done
            }
            PullStatus => {
                cpu.sp = cpu.sp.wrapping_add(1);
                cpu.p = Status::from_pulled(bus.read(cpu.stack_addr()));
                if instr.mnemonic == Mnemonic::PLP {
                    StepOutcome::Done
                } else {
                    StepOutcome::Next
                }
            }
            PullPcl => {
                cpu.sp = cpu.sp.wrapping_add(1);
                let low = bus.read(cpu.stack_addr());
                cpu.pc = (cpu.pc & 0xFF00) | low as u16;
                StepOutcome::Next
            }
            PullPch => {
                cpu.sp = cpu.sp.wrapping_add(1);
                let high = bus.read(cpu.stack_addr());
                cpu.pc = ((high as u16) << 8) | (cpu.pc & 0x00FF);
                if instr.mnemonic == Mnemonic::RTI {
                    StepOutcome::Done
                } else {
                    StepOutcome::Next
                }
            }
            RtsIncrementPc => {
                bus.read(cpu.pc);
                cpu.pc = cpu.pc.wrapping_add(1);
                StepOutcome::Done
            }
            JsrJump => {
                let high = bus.read(cpu.pc);
                cpu.pc = u16::from_le_bytes([cpu.operand_low, high]);
                StepOutcome::Done
            }
            BrkFetchPad => {
                bus.read(cpu.pc);
                cpu.pc = cpu.pc.wrapping_add(1);
                StepOutcome::Next
            }
            VectorLowSetI => {
                let vector = cpu.active_vector();
                cpu.operand_low = bus.read(vector);
                cpu.p |= Status::IRQ_DISABLE;
                StepOutcome::Next
            }
            VectorHigh => {
                let vector = cpu.active_vector().wrapping_add(1);
                let high = bus.read(vector);
                cpu.pc = u16::from_le_bytes([cpu.operand_low, high]);
                StepOutcome::Done
            }
            ResetSpDec => {
                bus.read(cpu.stack_addr());
                cpu.sp = cpu.sp.wrapping_sub(1);
                StepOutcome::Next
            }
            Jam => {
                bus.read(cpu.pc);
                cpu.halted = true;
                StepOutcome::Done
            }
        }
    }
}

/// Seven-cycle hardware interrupt sequence (cycle 1 is the aborted fetch).
pub(crate) const INTERRUPT_SEQUENCE: &[MicroStep] = &[
    MicroStep::DummyReadPc,
    MicroStep::DummyReadPc,
    MicroStep::PushPch,
    MicroStep::PushPcl,
    MicroStep::PushStatusInterrupt,
    MicroStep::VectorLowSetI,
    MicroStep::VectorHigh,
];

/// Seven-cycle reset sequence: the three stack cycles decrement SP without
/// writing.
pub(crate) const RESET_SEQUENCE: &[MicroStep] = &[
    MicroStep::DummyReadPc,
    MicroStep::DummyReadPc,
    MicroStep::ResetSpDec,
    MicroStep::ResetSpDec,
    MicroStep::ResetSpDec,
    MicroStep::VectorLowSetI,
    MicroStep::VectorHigh,
];

/// Placeholder instruction handed to interrupt-sequence steps.
pub(crate) const INTERRUPT_INSTRUCTION: Instruction = Instruction::interrupt_placeholder();

fn branch_taken(mnemonic: Mnemonic, p: Status) -> bool {
    match mnemonic {
        Mnemonic::BCC => !p.contains(Status::CARRY),
        Mnemonic::BCS => p.contains(Status::CARRY),
        Mnemonic::BNE => !p.contains(Status::ZERO),
        Mnemonic::BEQ => p.contains(Status::ZERO),
        Mnemonic::BPL => !p.contains(Status::NEGATIVE),
        Mnemonic::BMI => p.contains(Status::NEGATIVE),
        Mnemonic::BVC => !p.contains(Status::OVERFLOW),
        Mnemonic::BVS => p.contains(Status::OVERFLOW),
        _ => false,
    }
}

impl Cpu {
    fn stack_addr(&self) -> u16 {
        cpu_mem::STACK_PAGE_START + self.sp as u16
    }

    /// Address before the high-byte fix of an indexed access.
    fn unfixed_address(&self) -> u16 {
        u16::from_le_bytes([self.effective_address as u8, self.operand_high])
    }

    fn active_vector(&self) -> u16 {
        match self.servicing {
            Some(Interrupt::Nmi) => cpu_mem::NMI_VECTOR,
            Some(Interrupt::Reset) => cpu_mem::RESET_VECTOR,
            // BRK shares the IRQ vector.
            Some(Interrupt::Irq) | None => cpu_mem::IRQ_VECTOR,
        }
    }
}
