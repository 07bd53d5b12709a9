//! Instruction descriptors and their microstep sequences.

use super::addressing::Addressing;
use super::microstep::MicroStep;
use super::opcode::Mnemonic;

/// Access class of a mnemonic, selecting the tail of the addressing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Access {
    Read,
    Write,
    Rmw,
}

/// One dispatch-table entry: mnemonic + addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    pub addressing: Addressing,
}

use super::addressing::Addressing as A;
use super::microstep::MicroStep as S;

macro_rules! seq {
    ($($step:ident),+ $(,)?) => {
        &[$(S::$step),+]
    };
}

impl Instruction {
    pub(crate) const fn new(mnemonic: Mnemonic, addressing: Addressing) -> Self {
        Self {
            mnemonic,
            addressing,
        }
    }

    pub(crate) const fn interrupt_placeholder() -> Self {
        Self::new(Mnemonic::NOP, Addressing::Implied)
    }

    const fn access(&self) -> Access {
        use Mnemonic::*;
        match self.mnemonic {
            STA | STX | STY | SAX | SHA | SHX | SHY | SHS => Access::Write,
            ASL | LSR | ROL | ROR | INC | DEC | SLO | RLA | SRE | RRA | DCP | ISC => Access::Rmw,
            _ => Access::Read,
        }
    }

    /// Returns the microstep sequence for this instruction, excluding the
    /// opcode-fetch cycle. One step is one CPU cycle, except the
    /// `FixPageCross` fallthrough which merges with the following execute
    /// step when no page was crossed.
    pub(crate) fn steps(&self) -> &'static [MicroStep] {
        use Mnemonic::*;
        // Control-flow and stack mnemonics carry bespoke sequences.
        match self.mnemonic {
            BRK => {
                return seq![
                    BrkFetchPad,
                    PushPch,
                    PushPcl,
                    PushStatusBrk,
                    VectorLowSetI,
                    VectorHigh
                ];
            }
            JSR => return seq![FetchAddrLow, StackDummyRead, PushPch, PushPcl, JsrJump],
            RTS => return seq![DummyReadPc, StackDummyRead, PullPcl, PullPch, RtsIncrementPc],
            RTI => return seq![DummyReadPc, StackDummyRead, PullStatus, PullPcl, PullPch],
            PHA => return seq![DummyReadPc, PushA],
            PHP => return seq![DummyReadPc, PushStatusBrk],
            PLA => return seq![DummyReadPc, StackDummyRead, PullA],
            PLP => return seq![DummyReadPc, StackDummyRead, PullStatus],
            JMP => {
                return match self.addressing {
                    A::Indirect => {
                        seq![FetchAddrLow, FetchAddrHigh, JmpIndirectLow, JmpIndirectHigh]
                    }
                    _ => seq![FetchAddrLow, JmpAbsolute],
                };
            }
            BCC | BCS | BEQ | BNE | BMI | BPL | BVC | BVS => {
                return seq![BranchFetchOffset, BranchFixLow, BranchFixHigh];
            }
            JAM => return seq![Jam],
            _ => {}
        }

        match (self.addressing, self.access()) {
            (A::Immediate, _) => seq![ExecuteImmediate],
            (A::Implied, _) => seq![ExecuteImplied],
            (A::Accumulator, _) => seq![ExecuteAccumulator],

            (A::ZeroPage, Access::Read) => seq![FetchAddrLow, ExecuteRead],
            (A::ZeroPage, Access::Write) => seq![FetchAddrLow, ExecuteWrite],
            (A::ZeroPage, Access::Rmw) => {
                seq![FetchAddrLow, RmwRead, RmwDummyWrite, ExecuteRmwWrite]
            }

            (A::ZeroPageX, Access::Read) => seq![FetchAddrLow, ZpAddX, ExecuteRead],
            (A::ZeroPageX, Access::Write) => seq![FetchAddrLow, ZpAddX, ExecuteWrite],
            (A::ZeroPageX, Access::Rmw) => {
                seq![FetchAddrLow, ZpAddX, RmwRead, RmwDummyWrite, ExecuteRmwWrite]
            }

            (A::ZeroPageY, Access::Read) => seq![FetchAddrLow, ZpAddY, ExecuteRead],
            (A::ZeroPageY, Access::Write) => seq![FetchAddrLow, ZpAddY, ExecuteWrite],
            (A::ZeroPageY, Access::Rmw) => {
                seq![FetchAddrLow, ZpAddY, RmwRead, RmwDummyWrite, ExecuteRmwWrite]
            }

            (A::Absolute, Access::Read) => seq![FetchAddrLow, FetchAddrHigh, ExecuteRead],
            (A::Absolute, Access::Write) => seq![FetchAddrLow, FetchAddrHigh, ExecuteWrite],
            (A::Absolute, Access::Rmw) => {
                seq![FetchAddrLow, FetchAddrHigh, RmwRead, RmwDummyWrite, ExecuteRmwWrite]
            }

            (A::AbsoluteX, Access::Read) => {
                seq![FetchAddrLow, FetchHighAddX, FixPageCross, ExecuteRead]
            }
            (A::AbsoluteX, Access::Write) => {
                seq![FetchAddrLow, FetchHighAddX, FixPageCrossAlways, ExecuteWrite]
            }
            (A::AbsoluteX, Access::Rmw) => seq![
                FetchAddrLow,
                FetchHighAddX,
                FixPageCrossAlways,
                RmwRead,
                RmwDummyWrite,
                ExecuteRmwWrite
            ],

            (A::AbsoluteY, Access::Read) => {
                seq![FetchAddrLow, FetchHighAddY, FixPageCross, ExecuteRead]
            }
            (A::AbsoluteY, Access::Write) => {
                seq![FetchAddrLow, FetchHighAddY, FixPageCrossAlways, ExecuteWrite]
            }
            (A::AbsoluteY, Access::Rmw) => seq![
                FetchAddrLow,
                FetchHighAddY,
                FixPageCrossAlways,
                RmwRead,
                RmwDummyWrite,
                ExecuteRmwWrite
            ],

            (A::IndirectX, Access::Read) => seq![
                FetchAddrLow,
                ZpAddX,
                ReadPointerLow,
                ReadPointerHigh,
                ExecuteRead
            ],
            (A::IndirectX, Access::Write) => seq![
                FetchAddrLow,
                ZpAddX,
                ReadPointerLow,
                ReadPointerHigh,
                ExecuteWrite
            ],
            (A::IndirectX, Access::Rmw) => seq![
                FetchAddrLow,
                ZpAddX,
                ReadPointerLow,
                ReadPointerHigh,
                RmwRead,
                RmwDummyWrite,
                ExecuteRmwWrite
            ],

            (A::IndirectY, Access::Read) => seq![
                FetchAddrLow,
                ReadPointerLow,
                ReadPointerHighAddY,
                FixPageCross,
                ExecuteRead
            ],
            (A::IndirectY, Access::Write) => seq![
                FetchAddrLow,
                ReadPointerLow,
                ReadPointerHighAddY,
                FixPageCrossAlways,
                ExecuteWrite
            ],
            (A::IndirectY, Access::Rmw) => seq![
                FetchAddrLow,
                ReadPointerLow,
                ReadPointerHighAddY,
                FixPageCrossAlways,
                RmwRead,
                RmwDummyWrite,
                ExecuteRmwWrite
            ],

            // Relative/Indirect are fully covered by the mnemonic match above.
            (A::Relative | A::Indirect, _) => seq![ExecuteImplied],
        }
    }
}
