//! Memory images.
//!
//! A program for the machine is a flat, word-addressed block loaded
//! at address 0.  Two interchangeable formats exist:
//!
//! * binary: each word stored little-endian in the smallest whole
//!   number of bytes that holds the width (exactly two bytes per word
//!   on the 16-bit machine);
//! * text: one word per line as hex digits, `#` starting a comment,
//!   blank lines ignored.  Meant for images edited by hand.
//!
//! Loading checks that every stored value fits the target width, so
//! feeding a 16-bit image to a narrower machine fails up front
//! instead of silently truncating.

use std::fmt::{self, Display, Formatter};
use std::io::{self, BufRead, Read, Write};

use crate::word::{Word, WordWidth};

/// Problems reading or writing a memory image.
#[derive(Debug)]
pub enum ImageError {
    Io(io::Error),
    /// The binary input ended in the middle of a word.
    TruncatedWord {
        offset: usize,
        got: usize,
        expected: usize,
    },
    /// A stored value has bits above the machine width.
    TooWide {
        index: usize,
        value: u32,
        width: u8,
    },
    /// A text line is not a hex word, a comment or blank.
    BadLine { line: usize, text: String },
    /// A word handed to a writer was built for a different width.
    WrongWidth { index: usize, got: u8, want: u8 },
}

impl Display for ImageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::Io(e) => write!(f, "I/O error: {e}"),
            ImageError::TruncatedWord {
                offset,
                got,
                expected,
            } => write!(
                f,
                "image ends with {got} trailing bytes at offset {offset} (a word takes {expected})"
            ),
            ImageError::TooWide {
                index,
                value,
                width,
            } => write!(
                f,
                "word {index} has value {value:#x}, too wide for a {width}-bit machine"
            ),
            ImageError::BadLine { line, text } => {
                write!(f, "line {line} is not a hex word: {text:?}")
            }
            ImageError::WrongWidth { index, got, want } => write!(
                f,
                "word {index} is {got} bits wide but this image is {want}-bit"
            ),
        }
    }
}

impl std::error::Error for ImageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ImageError {
    fn from(e: io::Error) -> ImageError {
        ImageError::Io(e)
    }
}

/// Bytes used to store one word in the binary format.
pub const fn bytes_per_word(width: WordWidth) -> usize {
    (width.get() as usize + 7) / 8
}

pub fn read_binary<R: Read>(mut reader: R, width: WordWidth) -> Result<Vec<Word>, ImageError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let stride = bytes_per_word(width);
    let trailing = bytes.len() % stride;
    if trailing != 0 {
        return Err(ImageError::TruncatedWord {
            offset: bytes.len() - trailing,
            got: trailing,
            expected: stride,
        });
    }
    let mut words = Vec::with_capacity(bytes.len() / stride);
    for (index, chunk) in bytes.chunks(stride).enumerate() {
        let mut raw = 0_u32;
        for (k, byte) in chunk.iter().enumerate() {
            raw |= u32::from(*byte) << (8 * k);
        }
        match Word::try_from_bits(width, raw) {
            Ok(word) => words.push(word),
            Err(_) => {
                return Err(ImageError::TooWide {
                    index,
                    value: raw,
                    width: width.get(),
                })
            }
        }
    }
    Ok(words)
}

pub fn write_binary<W: Write>(
    mut writer: W,
    width: WordWidth,
    words: &[Word],
) -> Result<(), ImageError> {
    let stride = bytes_per_word(width);
    for (index, word) in words.iter().enumerate() {
        if word.width() != width {
            return Err(ImageError::WrongWidth {
                index,
                got: word.width().get(),
                want: width.get(),
            });
        }
        let raw = word.value().to_le_bytes();
        writer.write_all(&raw[..stride])?;
    }
    Ok(())
}

pub fn read_text<R: BufRead>(reader: R, width: WordWidth) -> Result<Vec<Word>, ImageError> {
    let mut words = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let body = match line.split_once('#') {
            Some((before, _comment)) => before,
            None => line.as_str(),
        };
        let body = body.trim();
        if body.is_empty() {
            continue;
        }
        let raw = u32::from_str_radix(body, 16).map_err(|_| ImageError::BadLine {
            line: n + 1,
            text: line.clone(),
        })?;
        match Word::try_from_bits(width, raw) {
            Ok(word) => words.push(word),
            Err(_) => {
                return Err(ImageError::TooWide {
                    index: words.len(),
                    value: raw,
                    width: width.get(),
                })
            }
        }
    }
    Ok(words)
}

pub fn write_text<W: Write>(
    mut writer: W,
    width: WordWidth,
    words: &[Word],
) -> Result<(), ImageError> {
    writeln!(writer, "# memory image, {width}-bit words, one per line")?;
    for (index, word) in words.iter().enumerate() {
        if word.width() != width {
            return Err(ImageError::WrongWidth {
                index,
                got: word.width().get(),
                want: width.get(),
            });
        }
        writeln!(writer, "{word}")?;
    }
    Ok(())
}
