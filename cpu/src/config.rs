//! Build-time machine configuration.
//!
//! Width, instruction-set variant and the JUMPZ polarity are all fixed
//! when the machine is wired, not while it runs.  `MachineConfig::new`
//! checks that the combination is buildable; every other part of the
//! emulator can then rely on the configuration being valid.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use base::prelude::*;

use crate::regs::flag;

/// Narrowest word that still has room for the IE and IR flag bits.
const MIN_EXTENDED_WIDTH: u8 = flag::IR + 1;

/// Which way the conditional jump tests the Z flag.
///
/// Both wirings exist in real machines of this kind, so the choice is
/// part of the configuration rather than of the instruction set.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum JumpzPolarity {
    /// JUMPZ jumps when the Z flag is set (the accumulator was zero).
    TakenWhenZero,
    /// JUMPZ jumps when the Z flag is clear.
    TakenWhenNonzero,
}

impl Display for JumpzPolarity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JumpzPolarity::TakenWhenZero => "taken-when-zero",
            JumpzPolarity::TakenWhenNonzero => "taken-when-nonzero",
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// The extended instruction set needs flag bits 8 and 9, so the
    /// word has to be at least ten bits wide.
    WidthTooNarrowForExtended { width: u8 },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::WidthTooNarrowForExtended { width } => {
                write!(
                    f,
                    "the extended instruction set needs a word of at least {} bits to hold the interrupt flags, but the configured width is {}",
                    MIN_EXTENDED_WIDTH, width
                )
            }
        }
    }
}

impl Error for ConfigError {}

/// A validated machine configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct MachineConfig {
    width: WordWidth,
    variant: IsaVariant,
    jumpz: JumpzPolarity,
}

impl MachineConfig {
    pub fn new(
        width: WordWidth,
        variant: IsaVariant,
        jumpz: JumpzPolarity,
    ) -> Result<MachineConfig, ConfigError> {
        if variant == IsaVariant::Extended && width.get() < MIN_EXTENDED_WIDTH {
            return Err(ConfigError::WidthTooNarrowForExtended {
                width: width.get(),
            });
        }
        Ok(MachineConfig {
            width,
            variant,
            jumpz,
        })
    }

    /// The canonical 16-bit base machine.
    pub fn base16() -> MachineConfig {
        MachineConfig {
            width: WordWidth::W16,
            variant: IsaVariant::Base,
            jumpz: JumpzPolarity::TakenWhenZero,
        }
    }

    /// The canonical 16-bit extended machine.
    pub fn extended16() -> MachineConfig {
        MachineConfig {
            width: WordWidth::W16,
            variant: IsaVariant::Extended,
            jumpz: JumpzPolarity::TakenWhenZero,
        }
    }

    pub fn width(&self) -> WordWidth {
        self.width
    }

    pub fn variant(&self) -> IsaVariant {
        self.variant
    }

    pub fn jumpz(&self) -> JumpzPolarity {
        self.jumpz
    }
}
