use serde::{Deserialize, Serialize};

/// 6502 addressing modes.
///
/// The mode selects which microstep sequence computes the effective address;
/// the access class of the mnemonic (read / write / read-modify-write)
/// selects the tail of that sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Addressing {
    Implied,
    Accumulator,
    Immediate,
    Relative,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
}
