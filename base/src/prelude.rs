//! The prelude exports the structs which are useful in representing
//! things to do with the bit-serial machine.  Providing this prelude
//! is the main purpose of the base crate.
pub use super::instruction::*;
pub use super::w16;
pub use super::word::*;
