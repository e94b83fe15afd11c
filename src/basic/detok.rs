//! Turning framed, tokenized program bytes back into listing text.

use std::io::{Read, Write};

use log::warn;
use thiserror::Error;

use super::tokens::{Expansion, ExpansionMap};
use super::Dialect;

#[derive(Error, Debug)]
pub enum DetokenizeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("premature end-of-file at position {0}; are you sure you specified the right format?")]
    PrematureEof(usize),

    #[error(
        "saw unexpected token 0x{byte:02X} at file position {pos} (0x{pos:X}); \
         are you sure you specified the right dialect?"
    )]
    UnexpectedToken { byte: u8, pos: usize },

    #[error(
        "line at position {pos} has length {len} which is impossibly short; \
         are you sure you specified the right dialect?"
    )]
    ImpossiblyShortLine { pos: usize, len: u8 },

    #[error(
        "expected to see a byte with value 0x{expected:02X} (instead of 0x{got:02X}) \
         at position {pos}; are you sure you specified the right format?"
    )]
    UnexpectedByte { expected: u8, got: u8, pos: usize },

    #[error(
        "line at position {pos} did not start with 0x0D (instead 0x{got:02X}); \
         are you sure you specified the right format?"
    )]
    BadLineStart { pos: usize, got: u8 },

    #[error("end-of-line in the middle of a line number")]
    EolInLineNumber,

    #[error("unexpected end-of-line immediately after token 0x{0:02X}")]
    EolAfterToken(u8),
}

/// Tokens counted for the LISTO indentation rules.
const TOKEN_FOR: u8 = 0xE3;
const TOKEN_NEXT: u8 = 0xED;
const TOKEN_REPEAT: u8 = 0xF5;
const TOKEN_UNTIL: u8 = 0xFD;

pub struct Decoder {
    dialect: Dialect,
    listo: u8,
    map: ExpansionMap,
}

impl Decoder {
    pub fn new(dialect: Dialect, listo: u8) -> Decoder {
        Decoder {
            dialect,
            listo,
            map: ExpansionMap::new(dialect),
        }
    }

    /// Detokenize a whole program from `input` onto `output`.
    pub fn decode_file(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<(), DetokenizeError> {
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;
        if self.dialect.uses_cr_framing() {
            self.decode_cr_leading(&data, output)
        } else {
            self.decode_len_leading(&data, output)
        }
    }

    /// Lines are `0x0D <hi> <lo> <len> tokens...` where `len` counts from
    /// the initial 0x0D; the file ends with `0x0D 0xFF`.
    fn decode_cr_leading(&self, data: &[u8], out: &mut dyn Write) -> Result<(), DetokenizeError> {
        let mut pos = 0usize;
        let mut indent = 0i32;
        let mut warned = false;
        loop {
            let start = match data.get(pos) {
                None if pos == 0 => return Ok(()), // entirely empty file
                None => return Err(DetokenizeError::PrematureEof(pos)),
                Some(&b) => b,
            };
            if start != 0x0D {
                return Err(DetokenizeError::BadLineStart { pos, got: start });
            }
            pos += 1;
            let hi = *data
                .get(pos)
                .ok_or(DetokenizeError::PrematureEof(pos))?;
            pos += 1;
            let hi = if hi == 0xFF {
                match data.get(pos) {
                    None => return Ok(()), // 0x0D 0xFF is the end marker
                    Some(_) => {
                        // Possibly a very large line number.
                        if !warned {
                            warn!(
                                "saw 0xFF at position {pos} as the high byte of a line \
                                 number; this is unusual, are you sure you specified \
                                 the right format?"
                            );
                            warned = true;
                        }
                        hi
                    }
                }
            } else {
                hi
            };
            let lo = *data
                .get(pos)
                .ok_or(DetokenizeError::PrematureEof(pos))?;
            pos += 1;
            let len = *data
                .get(pos)
                .ok_or(DetokenizeError::PrematureEof(pos))?;
            pos += 1;
            // len counts from the initial 0x0D and we already consumed 4
            // bytes.
            if len < 4 {
                return Err(DetokenizeError::ImpossiblyShortLine { pos, len });
            }
            let body_len = usize::from(len) - 4;
            let body = data
                .get(pos..pos + body_len)
                .ok_or(DetokenizeError::PrematureEof(data.len()))?;
            self.decode_line(hi, lo, body, pos, &mut indent, out)?;
            pos += body_len;
        }
    }

    /// Lines are `<len> <lo> <hi> tokens... 0x0D` where `len` is the total
    /// line length; logical EOF is `0x00 0xFF 0xFF`.
    fn decode_len_leading(&self, data: &[u8], out: &mut dyn Write) -> Result<(), DetokenizeError> {
        let mut pos = 0usize;
        let mut indent = 0i32;
        loop {
            let len = match data.get(pos) {
                None if pos == 0 => return Ok(()),
                None => return Err(DetokenizeError::PrematureEof(pos)),
                Some(&b) => b,
            };
            pos += 1;
            if len == 0 {
                // Logical EOF; still expect the 0xFF 0xFF trailer.
                for _ in 0..2 {
                    let got = *data
                        .get(pos)
                        .ok_or(DetokenizeError::PrematureEof(pos))?;
                    if got != 0xFF {
                        return Err(DetokenizeError::UnexpectedByte {
                            expected: 0xFF,
                            got,
                            pos,
                        });
                    }
                    pos += 1;
                }
                if pos < data.len() {
                    // Some Torch Z80 programs have trailing bytes here;
                    // assume this is (perhaps unusual but) OK.
                    warn!(
                        "expected end-of-file at position {pos} but instead found a \
                         byte with value 0x{:02X}; are you sure you specified the \
                         right dialect?",
                        data[pos]
                    );
                }
                return Ok(());
            }
            if len < 3 {
                return Err(DetokenizeError::ImpossiblyShortLine { pos, len });
            }
            let lo = *data
                .get(pos)
                .ok_or(DetokenizeError::PrematureEof(pos))?;
            pos += 1;
            let hi = *data
                .get(pos)
                .ok_or(DetokenizeError::PrematureEof(pos))?;
            pos += 1;
            let body_len = usize::from(len) - 3;
            let body = data
                .get(pos..pos + body_len)
                .ok_or(DetokenizeError::PrematureEof(data.len()))?;
            if body_len > 0 && body[body_len - 1] != 0x0D {
                return Err(DetokenizeError::UnexpectedByte {
                    expected: 0x0D,
                    got: body[body_len - 1],
                    pos: pos + body_len - 1,
                });
            }
            // decode_line prints the newline itself, so drop the final 0x0D
            // to avoid doubling it.
            let line_body = if body_len > 0 {
                &body[..body_len - 1]
            } else {
                body
            };
            self.decode_line(hi, lo, line_body, pos, &mut indent, out)?;
            pos += body_len;
        }
    }

    fn decode_line(
        &self,
        hi: u8,
        lo: u8,
        body: &[u8],
        file_pos: usize,
        indent: &mut i32,
        out: &mut dyn Write,
    ) -> Result<(), DetokenizeError> {
        let line_number = u32::from(hi) * 256 + u32::from(lo);
        write!(out, "{line_number:5}")?;
        if self.listo & 1 != 0 {
            out.write_all(b" ")?;
        }
        let count = |needle: u8| body.iter().filter(|&&b| b == needle).count() as i32;
        if self.listo & 2 != 0 {
            *indent -= 2 * count(TOKEN_NEXT);
        }
        if self.listo & 4 != 0 {
            *indent -= 2 * count(TOKEN_UNTIL);
        }
        if *indent > 0 {
            write!(out, "{:width$}", "", width = *indent as usize)?;
        }

        let mut in_string = false;
        let mut i = 0usize;
        while i < body.len() {
            let byte = body[i];
            if in_string {
                // Tokens are never expanded inside string literals; Mode 7
                // control bytes such as 0x86 must pass through untouched.
                out.write_all(&[byte])?;
            } else {
                match self.map.base(byte) {
                    Expansion::Invalid => {
                        return Err(DetokenizeError::UnexpectedToken {
                            byte,
                            pos: file_pos + i,
                        });
                    }
                    Expansion::SelfByte | Expansion::Fastvar => out.write_all(&[byte])?,
                    Expansion::Text(text) => out.write_all(text.as_bytes())?,
                    Expansion::LineNum => {
                        let packed = body
                            .get(i + 1..i + 4)
                            .ok_or(DetokenizeError::EolInLineNumber)?;
                        write!(out, "{}", unpack_line_number(packed[0], packed[1], packed[2]))?;
                        i += 3;
                    }
                    ext @ (Expansion::ExtC6 | Expansion::ExtC7 | Expansion::ExtC8) => {
                        let index = *body
                            .get(i + 1)
                            .ok_or(DetokenizeError::EolAfterToken(byte))?;
                        let text = match ext {
                            Expansion::ExtC6 => self.map.c6(index),
                            Expansion::ExtC7 => self.map.c7(index),
                            _ => self.map.c8(index),
                        };
                        match text {
                            Some(text) => out.write_all(text.as_bytes())?,
                            None => {
                                return Err(DetokenizeError::UnexpectedToken {
                                    byte: index,
                                    pos: file_pos + i + 1,
                                });
                            }
                        }
                        i += 1;
                    }
                }
            }
            if byte == b'"' {
                in_string = !in_string;
            }
            i += 1;
        }
        out.write_all(b"\n")?;
        if self.listo & 2 != 0 {
            *indent += 2 * count(TOKEN_FOR);
        }
        if self.listo & 4 != 0 {
            *indent += 2 * count(TOKEN_REPEAT);
        }
        Ok(())
    }
}

/// Decode the three packed bytes which follow an 0x8D line-number token
/// (as used by GOTO and GOSUB references).
fn unpack_line_number(b1: u8, b2: u8, b3: u8) -> u32 {
    let lo = b2 ^ (b1.wrapping_mul(4) & 0xC0);
    let hi = b3 ^ b1.wrapping_mul(16);
    u32::from(hi) * 256 + u32::from(lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_number_unpacking() {
        // The packed forms BASIC emits for GOTO 100 and GOTO 10.
        assert_eq!(unpack_line_number(0x44, 0x64, 0x40), 100);
        assert_eq!(unpack_line_number(0x54, 0x4A, 0x40), 10);
    }
}
