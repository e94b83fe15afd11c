//! Hex-and-ASCII dump formatting for the dump command.

use std::io::{self, Write};

const STRIDE: usize = 8;

/// Write `data` as offset-prefixed rows of hex bytes and their printable
/// ASCII forms.
pub fn hexdump(out: &mut dyn Write, data: &[u8]) -> io::Result<()> {
    for (row, chunk) in data.chunks(STRIDE).enumerate() {
        write!(out, "{:06X}", row * STRIDE)?;
        for i in 0..STRIDE {
            match chunk.get(i) {
                Some(b) => write!(out, " {b:02X}")?,
                None => write!(out, "   ")?,
            }
        }
        write!(out, " |")?;
        for &b in chunk {
            let ch = if (0x20..0x7F).contains(&b) {
                char::from(b)
            } else {
                '.'
            };
            write!(out, "{ch}")?;
        }
        writeln!(out, "|")?;
    }
    Ok(())
}
