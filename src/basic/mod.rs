//! BBC BASIC detokenization.
//!
//! Tokenized BASIC files are a stream of framed lines whose bytes are
//! single-byte keyword tokens, two-byte extension tokens, packed line-number
//! references and literal ASCII. The framing and the token tables both vary
//! by dialect.

mod detok;
mod tokens;

pub use detok::{Decoder, DetokenizeError};
pub use tokens::{Expansion, ExpansionMap};

/// The BBC BASIC implementations we can decode. These are a closed set;
/// several historical names are synonyms (32000 BASIC used the 6502 token
/// set, 80x86 BASIC the Z80 one, and the SDL and MacOSX ports are token
/// compatible with BBC BASIC for Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Mos6502,
    Z80,
    Arm,
    Windows,
    Mac,
    Pdp11,
}

struct DialectName {
    name: &'static str,
    synonym_for: Option<&'static str>,
    value: Dialect,
}

const DIALECT_NAMES: &[DialectName] = &[
    DialectName { name: "6502", synonym_for: None, value: Dialect::Mos6502 },
    DialectName { name: "PDP11", synonym_for: None, value: Dialect::Pdp11 },
    DialectName { name: "32000", synonym_for: Some("6502"), value: Dialect::Mos6502 },
    DialectName { name: "Z80", synonym_for: None, value: Dialect::Z80 },
    DialectName { name: "8086", synonym_for: Some("Z80"), value: Dialect::Z80 },
    DialectName { name: "ARM", synonym_for: None, value: Dialect::Arm },
    DialectName { name: "Windows", synonym_for: None, value: Dialect::Windows },
    DialectName { name: "SDL", synonym_for: Some("Windows"), value: Dialect::Windows },
    DialectName { name: "MacOSX", synonym_for: Some("Windows"), value: Dialect::Windows },
    DialectName { name: "Mac", synonym_for: None, value: Dialect::Mac },
];

pub const DEFAULT_DIALECT_NAME: &str = "6502";

impl Dialect {
    pub fn from_name(name: &str) -> Option<Dialect> {
        DIALECT_NAMES
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value)
    }

    /// Which line framing the dialect's SAVE format uses: lines introduced
    /// by a CR with big-endian line numbers, or length-first lines with
    /// little-endian line numbers.
    pub fn uses_cr_framing(&self) -> bool {
        matches!(
            self,
            Dialect::Mos6502 | Dialect::Arm | Dialect::Mac | Dialect::Pdp11
        )
    }
}

/// A human-readable list of the accepted dialect names, for --dialect=help.
pub fn describe_dialects(default_name: &str) -> String {
    let mut out = String::from("Known dialects are: ");
    for (i, d) in DIALECT_NAMES.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('"');
        out.push_str(d.name);
        out.push('"');
        if d.name == default_name {
            out.push_str(" (this is the default)");
        }
        if let Some(target) = d.synonym_for {
            out.push_str(&format!(" (this is a synonym for \"{target}\")"));
        }
    }
    out.push('\n');
    out
}
