//! The `base` crate defines the things about the bit-serial machine
//! which are useful in both a simulator and other associated tools.
//! The idea is that if you want to write an assembler, it would
//! depend on the base crate but would not need to depend on the
//! simulator library itself.

pub mod image;
pub mod instruction;
pub mod prelude;
pub mod word;

#[macro_export]
macro_rules! w16 {
    ($n:expr) => {
        $crate::prelude::Word::lit16::<{ $n }>()
    };
}

#[test]
fn test_w16() {
    use prelude::{Word, WordWidth};
    let m: Word = w16!(40_u32);
    let n: Word = Word::from_bits(WordWidth::W16, 40);
    assert_eq!(m, n);

    let p: Word = w16!(0xffff_u32);
    let q: Word =
        Word::try_from_bits(WordWidth::W16, 0xffff).expect("test data should be in range");
    assert_eq!(p, q);
}
