//! Binary and symbolic representations of instructions.
//!
//! An instruction occupies one machine word.  The bits look like this
//! (least significant bit on the right, N = word width):
//!
//! |Opcode       |Operand        |
//! |-------------|---------------|
//! |4 bits       |N-4 bits       |
//! |(N-4 .. N-1) |(0 .. N-5)     |
//!
//! On the reference 16-bit machine the operand field is 12 bits.  The
//! top operand bit (bit N-5) doubles as the I/O select for the memory
//! and register access operations: with it set, LOAD/STORE/GET/SET
//! address the peripheral window instead of RAM.  For GET and SET
//! with I/O select clear, operand bit 0 chooses the internal exchange
//! target (0 = flags, 1 = program counter).
//!
//! Two instruction-set variants share the word layout but give three
//! opcode slots different meanings:
//!
//! * the *base* variant supports one level of indirection.  Opcodes
//!   0x0..=0x7 (top opcode bit clear) indirect when the
//!   indirect-enable flag is armed; the IND opcode (0xF) writes that
//!   flag from operand bit 0.  Slots 0x6/0x7 are LOADC/STOREC, which
//!   move one's-complemented data.
//! * the *extended* variant drops indirection and spends the slots on
//!   INVERT (0x6, bitwise XNOR), SUB (0x7) and SHADOW (0xF, exchange
//!   with the shadow/counter/compare registers; operand bits 1..0
//!   select which).
//!
//! The variants are not bit-compatible: an image assembled for one
//! will decode differently on the other.

use std::fmt::{self, Debug, Display, Formatter};

use serde::Serialize;

#[cfg(test)]
use test_strategy::{proptest, Arbitrary};

use super::word::{Word, WordError, WordWidth};

/// Number of bits in the opcode field, at every word width.
pub const OPCODE_BITS: u8 = 4;

/// Which instruction set the machine implements.  The two variants
/// are mutually exclusive; a machine is built as one or the other.
#[cfg_attr(test, derive(Arbitrary))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum IsaVariant {
    /// Indirection, LOADC/STOREC, the IND opcode.
    Base,
    /// Interrupts, shadow/counter/compare, INVERT/SUB/SHADOW.
    Extended,
}

impl Display for IsaVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IsaVariant::Base => "base",
            IsaVariant::Extended => "extended",
        })
    }
}

/// Bit position of the I/O select bit (the top operand bit).
pub const fn io_select_bit(width: WordWidth) -> u8 {
    width.get() - OPCODE_BITS - 1
}

/// Number of bits in the operand field.
pub const fn operand_bits(width: WordWidth) -> u8 {
    width.get() - OPCODE_BITS
}

/// Target of a GET/SET exchange when I/O select is clear.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ExchangeTarget {
    Flags,
    ProgramCounter,
}

impl ExchangeTarget {
    /// The target encoded in operand bit 0.
    pub const fn from_operand(operand: u32) -> ExchangeTarget {
        if operand & 1 != 0 {
            ExchangeTarget::ProgramCounter
        } else {
            ExchangeTarget::Flags
        }
    }
}

/// Register selected by the SHADOW operation (extended variant),
/// taken from operand bits 1..0.  Value 3 falls back to the shadow
/// register so that every encoding means something.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ShadowTarget {
    Shadow,
    Counter,
    Compare,
}

impl ShadowTarget {
    /// The target encoded in operand bits 1..0.
    pub const fn from_operand(operand: u32) -> ShadowTarget {
        match operand & 0b11 {
            0b01 => ShadowTarget::Counter,
            0b10 => ShadowTarget::Compare,
            _ => ShadowTarget::Shadow,
        }
    }
}

/// All the operations of both variants.  `Opcode::decode` is total:
/// every 4-bit code decodes to something in each variant, the way the
/// hardware's 16-way dispatch does.
#[repr(u8)]
#[cfg_attr(test, derive(Arbitrary))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Opcode {
    Or = 0x0,
    And = 0x1,
    Xor = 0x2,
    Add = 0x3,
    Load = 0x4,
    Store = 0x5,
    /// Base variant slot 0x6: load one's-complemented.
    Loadc = 0x6,
    /// Base variant slot 0x7: store one's-complemented.
    Storec = 0x7,
    Lit = 0x8,
    Sl = 0x9,
    Sr = 0xA,
    Get = 0xB,
    Set = 0xC,
    Jump = 0xD,
    Jumpz = 0xE,
    /// Base variant slot 0xF: write the indirect-enable flag.
    Ind = 0xF,
    /// Extended variant slot 0x6: bitwise XNOR with the operand.
    Invert = 0x10,
    /// Extended variant slot 0x7.
    Sub = 0x11,
    /// Extended variant slot 0xF: exchange with shadow/counter/compare.
    Shadow = 0x12,
}

impl Opcode {
    /// The 4-bit slot this operation occupies.
    pub fn number(&self) -> u8 {
        match self {
            Opcode::Invert => 0x6,
            Opcode::Sub => 0x7,
            Opcode::Shadow => 0xF,
            other => *other as u8,
        }
    }

    /// Decode a 4-bit slot for the given variant.  Total: the
    /// hardware decodes all sixteen codes.
    pub fn decode(variant: IsaVariant, code: u8) -> Opcode {
        use Opcode::*;
        match (code & 0xF, variant) {
            (0x0, _) => Or,
            (0x1, _) => And,
            (0x2, _) => Xor,
            (0x3, _) => Add,
            (0x4, _) => Load,
            (0x5, _) => Store,
            (0x6, IsaVariant::Base) => Loadc,
            (0x6, IsaVariant::Extended) => Invert,
            (0x7, IsaVariant::Base) => Storec,
            (0x7, IsaVariant::Extended) => Sub,
            (0x8, _) => Lit,
            (0x9, _) => Sl,
            (0xA, _) => Sr,
            (0xB, _) => Get,
            (0xC, _) => Set,
            (0xD, _) => Jump,
            (0xE, _) => Jumpz,
            (0xF, IsaVariant::Base) => Ind,
            (0xF, IsaVariant::Extended) => Shadow,
            _ => unreachable!("code was masked to four bits"),
        }
    }

    pub fn available_in(&self, variant: IsaVariant) -> bool {
        match self {
            Opcode::Loadc | Opcode::Storec | Opcode::Ind => variant == IsaVariant::Base,
            Opcode::Invert | Opcode::Sub | Opcode::Shadow => variant == IsaVariant::Extended,
            _ => true,
        }
    }

    /// Memory-reference encodings (top opcode bit clear) are the only
    /// ones the base variant will indirect.
    pub fn indirectable(&self) -> bool {
        self.number() & 0x8 == 0
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Or => "OR",
            Opcode::And => "AND",
            Opcode::Xor => "XOR",
            Opcode::Add => "ADD",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::Loadc => "LOADC",
            Opcode::Storec => "STOREC",
            Opcode::Lit => "LIT",
            Opcode::Sl => "SL",
            Opcode::Sr => "SR",
            Opcode::Get => "GET",
            Opcode::Set => "SET",
            Opcode::Jump => "JUMP",
            Opcode::Jumpz => "JUMPZ",
            Opcode::Ind => "IND",
            Opcode::Invert => "INVERT",
            Opcode::Sub => "SUB",
            Opcode::Shadow => "SHADOW",
        }
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A machine instruction: one word, interpreted for a particular
/// variant only when the fields are asked for.
#[derive(Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Instruction(Word);

impl Instruction {
    pub fn bits(&self) -> Word {
        self.0
    }

    pub fn width(&self) -> WordWidth {
        self.0.width()
    }
}

impl From<Word> for Instruction {
    fn from(w: Word) -> Instruction {
        Instruction(w)
    }
}

impl From<Instruction> for Word {
    fn from(inst: Instruction) -> Word {
        inst.0
    }
}

impl Debug for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // Without knowing the variant only the raw split is safe to
        // show; the base-variant mnemonic is a reasonable default.
        write!(
            f,
            "{} {:#x} ({})",
            Opcode::decode(IsaVariant::Base, self.opcode_number()),
            self.operand_value(),
            self.0
        )
    }
}

/// Extraction of the fields within an instruction.
pub trait Inst {
    /// The 4-bit opcode field.
    fn opcode_number(&self) -> u8;

    /// The zero-extended operand field.
    fn operand_value(&self) -> u32;

    /// The I/O select bit (top operand bit).
    fn io_select(&self) -> bool;

    /// The GET/SET exchange target encoded in operand bit 0 (only
    /// meaningful when [`Inst::io_select`] is clear).
    fn exchange_target(&self) -> ExchangeTarget {
        ExchangeTarget::from_operand(self.operand_value())
    }

    /// The SHADOW target encoded in operand bits 1..0 (extended
    /// variant).
    fn shadow_target(&self) -> ShadowTarget {
        ShadowTarget::from_operand(self.operand_value())
    }
}

impl Inst for Instruction {
    fn opcode_number(&self) -> u8 {
        (self.0.value() >> operand_bits(self.width())) as u8 & 0xF
    }

    fn operand_value(&self) -> u32 {
        let keep = operand_bits(self.width());
        self.0.value() & ((1_u32 << keep) - 1)
    }

    fn io_select(&self) -> bool {
        self.0.value() >> io_select_bit(self.width()) & 1 != 0
    }
}

/// An instruction broken down into its component fields, as an
/// assembler would form it.
#[cfg_attr(test, derive(Arbitrary))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymbolicInstruction {
    pub opcode: Opcode,
    #[cfg_attr(test, strategy(0_u32..0x1000))]
    pub operand: u32,
}

impl SymbolicInstruction {
    pub fn new(opcode: Opcode, operand: u32) -> SymbolicInstruction {
        SymbolicInstruction { opcode, operand }
    }

    /// Assemble into a word of the given width.  Fails when the
    /// operand does not fit the operand field.
    pub fn encode(&self, width: WordWidth) -> Result<Instruction, WordError> {
        let keep = operand_bits(width);
        if self.operand >> keep != 0 {
            return Err(WordError::TooWide {
                value: self.operand,
                width: keep,
            });
        }
        let raw = (u32::from(self.opcode.number()) << keep) | self.operand;
        Ok(Instruction(Word::from_bits(width, raw)))
    }
}

impl Display for SymbolicInstruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:#x}", self.opcode, self.operand)
    }
}

#[cfg(test)]
#[proptest]
fn decoded_fields_match_the_encoding(input: SymbolicInstruction, variant: IsaVariant) {
    // Every opcode occupies the same slot in the variant it belongs
    // to, so encode-then-decode through the variant that has the
    // opcode must give the fields back.
    let variant = if input.opcode.available_in(variant) {
        variant
    } else if input.opcode.available_in(IsaVariant::Base) {
        IsaVariant::Base
    } else {
        IsaVariant::Extended
    };
    let inst = input.encode(WordWidth::W16).unwrap();
    assert_eq!(inst.opcode_number(), input.opcode.number());
    assert_eq!(inst.operand_value(), input.operand);
    assert_eq!(Opcode::decode(variant, inst.opcode_number()), input.opcode);
}
