//! Machine words for the bit-serial processor.
//!
//! The machine moves one bit per clock cycle, least-significant bit
//! first.  A [`Word`] therefore exposes serial operations (watch the
//! bit emerging at the bottom, push a bit in at the top, recirculate)
//! rather than whole-word arithmetic.  Whole-word arithmetic happens
//! one bit at a time in the processor's adder, not here.
//!
//! The hardware design is parametrized over the word width N.  The
//! reference machine is 16 bits wide, and that is the width the
//! memory-image formats and the `w16!` macro assume, but any width
//! from 8 to 32 can be simulated.  A [`Word`] knows its own width, so
//! mixing words of different widths is detectable rather than silent.

use std::fmt::{self, Binary, Debug, Display, Formatter, LowerHex};

use serde::Serialize;

/// Errors arising when constructing [`WordWidth`] or [`Word`] values.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum WordError {
    /// The requested width is outside the supported 8..=32 range.
    UnsupportedWidth(u8),
    /// The value has bits set above the requested width.
    TooWide { value: u32, width: u8 },
}

impl Display for WordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            WordError::UnsupportedWidth(bits) => {
                write!(f, "word width {bits} is not supported (want 8..=32)")
            }
            WordError::TooWide { value, width } => {
                write!(f, "value {value:#x} does not fit in a {width}-bit word")
            }
        }
    }
}

impl std::error::Error for WordError {}

/// The machine's word width in bits.
///
/// The top four bits of every word hold the opcode, so narrower
/// machines simply have smaller operand fields; the width never
/// changes while the machine runs.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WordWidth(u8);

impl WordWidth {
    /// The narrowest supported machine.
    pub const NARROWEST: u8 = 8;
    /// The widest machine a u32-backed word can carry.
    pub const WIDEST: u8 = 32;
    /// An 8-bit machine, the narrowest buildable.
    pub const W8: WordWidth = WordWidth(8);
    /// The reference machine's width.
    pub const W16: WordWidth = WordWidth(16);

    pub const fn new(bits: u8) -> Result<WordWidth, WordError> {
        if bits < WordWidth::NARROWEST || bits > WordWidth::WIDEST {
            Err(WordError::UnsupportedWidth(bits))
        } else {
            Ok(WordWidth(bits))
        }
    }

    pub const fn get(&self) -> u8 {
        self.0
    }

    /// A mask covering exactly the bits of one word.
    pub const fn mask(&self) -> u32 {
        if self.0 == 32 {
            u32::MAX
        } else {
            (1_u32 << self.0) - 1
        }
    }

    /// The bit position of the word's most significant bit.
    pub const fn top_bit(&self) -> u8 {
        self.0 - 1
    }
}

impl Display for WordWidth {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for WordWidth {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "WordWidth({})", self.0)
    }
}

/// A value of exactly [`WordWidth`] bits.
///
/// Stored in a `u32` which is always masked to the width, so the bits
/// above the width are guaranteed zero.  The serial operations below
/// are the ones the shift-register hardware provides; they all return
/// a fresh `Word` because the simulated registers commit their new
/// contents once per cycle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Word {
    bits: u32,
    width: WordWidth,
}

impl Word {
    pub const fn zero(width: WordWidth) -> Word {
        Word { bits: 0, width }
    }

    /// Builds a word from `raw`, discarding bits above the width.
    pub const fn from_bits(width: WordWidth, raw: u32) -> Word {
        Word {
            bits: raw & width.mask(),
            width,
        }
    }

    /// Builds a word from `raw`, failing if any bit above the width
    /// is set.
    pub const fn try_from_bits(width: WordWidth, raw: u32) -> Result<Word, WordError> {
        if raw & !width.mask() != 0 {
            Err(WordError::TooWide {
                value: raw,
                width: width.get(),
            })
        } else {
            Ok(Word { bits: raw, width })
        }
    }

    /// Builds a 16-bit word whose value is checked at compile time.
    /// Usually written via the [`w16!`](crate::w16) macro.
    pub const fn lit16<const V: u32>() -> Word {
        struct Helper<const M: u32>;
        impl<const M: u32> Helper<M> {
            const W: Word = {
                if M > 0xFFFF {
                    panic!("input value is out of range for a 16-bit word")
                } else {
                    Word {
                        bits: M,
                        width: WordWidth(16),
                    }
                }
            };
        }
        Helper::<V>::W
    }

    pub const fn width(&self) -> WordWidth {
        self.width
    }

    pub const fn value(&self) -> u32 {
        self.bits
    }

    /// The serial-out bit: the one currently at the bottom of the
    /// shift register.
    pub const fn bit0(&self) -> bool {
        self.bits & 1 != 0
    }

    /// The bit currently at the top of the shift register.
    pub const fn top_bit(&self) -> bool {
        self.bits >> self.width.top_bit() != 0
    }

    pub const fn is_zero(&self) -> bool {
        self.bits == 0
    }

    /// Odd parity over all bits.
    pub const fn parity(&self) -> bool {
        self.bits.count_ones() % 2 == 1
    }

    pub const fn count_ones(&self) -> u32 {
        self.bits.count_ones()
    }

    /// The canonical serial-in step: shift right one place, the old
    /// serial-out bit falls off the bottom, `bit` enters at the top.
    #[must_use]
    pub const fn shifted_in_high(self, bit: bool) -> Word {
        let top = (bit as u32) << self.width.top_bit();
        Word {
            bits: (self.bits >> 1) | top,
            width: self.width,
        }
    }

    /// Shift left one place; `bit` enters at the bottom.  Used by the
    /// left-shift path, which runs the register the other way.
    #[must_use]
    pub const fn shifted_in_low(self, bit: bool) -> Word {
        Word {
            bits: ((self.bits << 1) & self.width.mask()) | bit as u32,
            width: self.width,
        }
    }

    /// Recirculate: the serial-out bit re-enters at the top, so after
    /// N steps the word is back where it started.
    #[must_use]
    pub const fn rotated_right(self) -> Word {
        self.shifted_in_high(self.bit0())
    }
}

impl Display for Word {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let digits = (self.width.get() as usize).div_ceil(4);
        write!(f, "{:0digits$x}", self.bits)
    }
}

impl Debug for Word {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Word({self}, width {})", self.width)
    }
}

impl LowerHex for Word {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        LowerHex::fmt(&self.bits, f)
    }
}

/// Bits appear most significant first, the usual written order.  The
/// order on the wire is the reverse: the hardware streams the
/// rightmost digit shown here first.
impl Binary for Word {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let digits = self.width.get() as usize;
        write!(f, "{:0digits$b}", self.bits)
    }
}
