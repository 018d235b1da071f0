//! The register and flag bank.
//!
//! Every register is a width-N shift register except the opcode
//! nibble, which is always four bits.  Power-on contents are zero,
//! deterministically: the hardware leaves registers undefined until
//! RESET has swept them, but the model zero-fills at construction so
//! no run ever observes an unspecified value.
//!
//! Flag register bit assignments, LSB first:
//!
//! |bit|name|meaning                                                  |
//! |---|----|---------------------------------------------------------|
//! | 0 |Z   |accumulator was zero at the latest fetch                 |
//! | 1 |NG  |accumulator top bit at the latest fetch                  |
//! | 2 |PAR |odd parity of the accumulator at the latest fetch        |
//! | 3 |CF  |carry out of the latest ADD                              |
//! | 4 |ROT |SL/SR recirculate instead of shifting in zero            |
//! | 5 |HLT |halt at the next fetch commit                            |
//! | 6 |RST |reset at the next fetch commit                           |
//! | 7 |IND |(base) indirection armed / UF: (extended) SUB borrowed   |
//! | 8 |IE  |(extended) interrupts enabled                            |
//! | 9 |IR  |(extended) interrupt latched                             |
//!
//! Z/NG/PAR are recomputed from the accumulator during every fetch;
//! the rest only change when an operation writes them.  The extended
//! variant needs bits 0..=9 and therefore a word width of at least
//! ten.

use std::fmt::{self, Display, Formatter};

use base::prelude::{Word, WordWidth};
use serde::Serialize;

/// Flag register bit positions.
pub mod flag {
    pub const Z: u8 = 0;
    pub const NG: u8 = 1;
    pub const PAR: u8 = 2;
    pub const CF: u8 = 3;
    pub const ROT: u8 = 4;
    pub const HLT: u8 = 5;
    pub const RST: u8 = 6;
    /// Base variant meaning of bit 7.
    pub const IND: u8 = 7;
    /// Extended variant meaning of bit 7.
    pub const UF: u8 = 7;
    pub const IE: u8 = 8;
    pub const IR: u8 = 9;
}

#[derive(Clone, Debug)]
pub struct Registers {
    pub acc: Word,
    pub pc: Word,
    pub operand: Word,
    pub flags: Word,
    /// The 4-bit opcode nibble.
    pub opcode: u8,
    pub shadow: Word,
    pub counter: Word,
    pub compare: Word,
}

impl Registers {
    pub fn new(width: WordWidth) -> Registers {
        let zero = Word::zero(width);
        Registers {
            acc: zero,
            pc: zero,
            operand: zero,
            flags: zero,
            opcode: 0,
            shadow: zero,
            counter: zero,
            compare: zero,
        }
    }

    pub fn flag(&self, bit: u8) -> bool {
        self.flags.value() >> bit & 1 != 0
    }

    pub fn set_flag(&mut self, bit: u8, on: bool) {
        let mask = 1_u32 << bit;
        let old = self.flags.value();
        let new = if on { old | mask } else { old & !mask };
        self.flags = Word::from_bits(self.flags.width(), new);
    }

    /// Serial shift into the opcode nibble, LSB first like every
    /// other register.
    pub fn shift_opcode_in(&mut self, bit: bool) {
        self.opcode = (self.opcode >> 1) | ((bit as u8) << 3);
    }

    pub fn snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            acc: self.acc,
            pc: self.pc,
            operand: self.operand,
            flags: self.flags,
            opcode: self.opcode,
            shadow: self.shadow,
            counter: self.counter,
            compare: self.compare,
        }
    }
}

/// A copy of the whole register bank, taken for fault reports and
/// debugging.  The extended-variant registers are present (and zero)
/// on a base-variant machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RegisterSnapshot {
    pub acc: Word,
    pub pc: Word,
    pub operand: Word,
    pub flags: Word,
    pub opcode: u8,
    pub shadow: Word,
    pub counter: Word,
    pub compare: Word,
}

impl Display for RegisterSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "acc={} pc={} operand={} flags={} opcode={:x} shadow={} counter={} compare={}",
            self.acc,
            self.pc,
            self.operand,
            self.flags,
            self.opcode,
            self.shadow,
            self.counter,
            self.compare
        )
    }
}
