//! Per-dialect token expansion tables.
//!
//! The base table maps every input byte either to replacement text, to
//! itself, or to a sentinel requiring more bytes (a packed line number
//! after 0x8D, or an extension index after 0xC6/0xC7/0xC8). The extension
//! tables map that second byte. Mac BASIC shares ARM's base table and
//! PDP-11 BASIC shares the 6502 one, so only four dialects have base table
//! columns.

use super::Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    /// The dialect has no mapping for this byte.
    Invalid,
    /// The byte is emitted as-is (printable ASCII and the line terminator).
    SelfByte,
    Text(&'static str),
    /// 0x8D: the next three bytes encode a line number reference.
    LineNum,
    /// Two-byte tokens: the next byte indexes the matching extension table.
    ExtC6,
    ExtC7,
    ExtC8,
    /// BBC BASIC for Windows "fast variable" bytes, passed through opaquely.
    Fastvar,
}

use self::Expansion::{
    ExtC6 as C6, ExtC7 as C7, ExtC8 as C8, Fastvar as FV, Invalid as BAD, LineNum as LNUM,
    SelfByte as ID, Text as T,
};

const fn all(e: Expansion) -> [Expansion; 4] {
    [e, e, e, e]
}

/// Columns: 6502, Z80, ARM, Windows. Bytes not listed here are invalid
/// below 0x11 and identity up to 0x7E; 0x0D and 0x7F get fixed up in
/// `ExpansionMap::new`.
#[rustfmt::skip]
const BASE_MAP: &[(u8, [Expansion; 4])] = &[
    (0x01, [BAD, BAD, BAD, T("CIRCLE")]),
    (0x02, [BAD, BAD, BAD, T("ELLIPSE")]),
    (0x03, [BAD, BAD, BAD, T("FILL")]),
    (0x04, [BAD, BAD, BAD, T("MOUSE")]),
    (0x05, [BAD, BAD, BAD, T("ORIGIN")]),
    (0x06, [BAD, BAD, BAD, T("QUIT")]),
    (0x07, [BAD, BAD, BAD, T("RECTANGLE")]),
    (0x08, [BAD, BAD, BAD, T("SWAP")]),
    (0x09, [BAD, BAD, BAD, T("SYS")]),
    (0x0A, [BAD, BAD, BAD, T("TINT")]),
    (0x0B, [BAD, BAD, BAD, T("WAIT")]),
    (0x0C, [BAD, BAD, BAD, T("INSTALL")]),
    // 0x0D is the end-of-line byte on every platform.
    (0x0E, [BAD, BAD, BAD, T("PRIVATE")]),
    (0x0F, [BAD, BAD, BAD, T("BY")]),
    (0x10, [BAD, BAD, BAD, T("EXIT")]),
    (0x18, [ID, ID, ID, FV]),
    (0x19, [ID, ID, ID, FV]),
    (0x1A, [ID, ID, ID, FV]),
    (0x1B, [ID, ID, ID, FV]),
    (0x1C, [ID, ID, ID, FV]),
    (0x1D, [ID, ID, ID, FV]),
    (0x1E, [ID, ID, ID, FV]),
    (0x1F, [ID, ID, ID, FV]),
    (0x80, all(T("AND"))),
    (0x81, all(T("DIV"))),
    (0x82, all(T("EOR"))),
    (0x83, all(T("MOD"))),
    (0x84, all(T("OR"))),
    (0x85, all(T("ERROR"))),
    (0x86, all(T("LINE"))),
    (0x87, all(T("OFF"))),
    (0x88, all(T("STEP"))),
    (0x89, all(T("SPC"))),
    (0x8A, all(T("TAB("))),
    (0x8B, all(T("ELSE"))),
    (0x8C, all(T("THEN"))),
    (0x8D, all(LNUM)),
    (0x8E, all(T("OPENIN"))),
    (0x8F, all(T("PTR"))),
    (0x90, all(T("PAGE"))),
    (0x91, all(T("TIME"))),
    (0x92, all(T("LOMEM"))),
    (0x93, all(T("HIMEM"))),
    (0x94, all(T("ABS"))),
    (0x95, all(T("ACS"))),
    (0x96, all(T("ADVAL"))),
    (0x97, all(T("ASC"))),
    (0x98, all(T("ASN"))),
    (0x99, all(T("ATN"))),
    (0x9A, all(T("BGET"))),
    (0x9B, all(T("COS"))),
    (0x9C, all(T("COUNT"))),
    (0x9D, all(T("DEG"))),
    (0x9E, all(T("ERL"))),
    (0x9F, all(T("ERR"))),
    (0xA0, all(T("EVAL"))),
    (0xA1, all(T("EXP"))),
    (0xA2, all(T("EXT"))),
    (0xA3, all(T("FALSE"))),
    (0xA4, all(T("FN"))),
    (0xA5, all(T("GET"))),
    (0xA6, all(T("INKEY"))),
    (0xA7, all(T("INSTR("))),
    (0xA8, all(T("INT"))),
    (0xA9, all(T("LEN"))),
    (0xAA, all(T("LN"))),
    (0xAB, all(T("LOG"))),
    (0xAC, all(T("NOT"))),
    (0xAD, all(T("OPENUP"))),
    (0xAE, all(T("OPENOUT"))),
    (0xAF, all(T("PI"))),
    (0xB0, all(T("POINT("))),
    (0xB1, all(T("POS"))),
    (0xB2, all(T("RAD"))),
    (0xB3, all(T("RND"))),
    (0xB4, all(T("SGN"))),
    (0xB5, all(T("SIN"))),
    (0xB6, all(T("SQR"))),
    (0xB7, all(T("TAN"))),
    (0xB8, all(T("TO"))),
    (0xB9, all(T("TRUE"))),
    (0xBA, all(T("USR"))),
    (0xBB, all(T("VAL"))),
    (0xBC, all(T("VPOS"))),
    (0xBD, all(T("CHR$"))),
    (0xBE, all(T("GET$"))),
    (0xBF, all(T("INKEY$"))),
    (0xC0, all(T("LEFT$("))),
    (0xC1, all(T("MID$("))),
    (0xC2, all(T("RIGHT$("))),
    (0xC3, all(T("STR$"))),
    (0xC4, all(T("STRING$("))),
    (0xC5, all(T("EOF"))),
    (0xC6, [T("AUTO"), T("AUTO"), C6, T("SUM")]),
    (0xC7, [T("DELETE"), T("DELETE"), C7, T("WHILE")]),
    (0xC8, [T("LOAD"), T("LOAD"), C8, T("CASE")]),
    (0xC9, [T("LIST"), T("LIST"), T("WHEN"), T("WHEN")]),
    (0xCA, [T("NEW"), T("NEW"), T("OF"), T("OF")]),
    (0xCB, [T("OLD"), T("OLD"), T("ENDCASE"), T("ENDCASE")]),
    (0xCC, [T("RENUMBER"), T("RENUMBER"), T("ELSE"), T("OTHERWISE")]),
    (0xCD, [T("SAVE"), T("SAVE"), T("ENDIF"), T("ENDIF")]),
    (0xCE, [T("EDIT"), T("PUT"), T("ENDWHILE"), T("ENDWHILE")]),
    (0xCF, all(T("PTR"))),
    (0xD0, all(T("PAGE"))),
    (0xD1, all(T("TIME"))),
    (0xD2, all(T("LOMEM"))),
    (0xD3, all(T("HIMEM"))),
    (0xD4, all(T("SOUND"))),
    (0xD5, all(T("BPUT"))),
    (0xD6, all(T("CALL"))),
    (0xD7, all(T("CHAIN"))),
    (0xD8, all(T("CLEAR"))),
    (0xD9, all(T("CLOSE"))),
    (0xDA, all(T("CLG"))),
    (0xDB, all(T("CLS"))),
    (0xDC, all(T("DATA"))),
    (0xDD, all(T("DEF"))),
    (0xDE, all(T("DIM"))),
    (0xDF, all(T("DRAW"))),
    (0xE0, all(T("END"))),
    (0xE1, all(T("ENDPROC"))),
    (0xE2, all(T("ENVELOPE"))),
    (0xE3, all(T("FOR"))),
    (0xE4, all(T("GOSUB"))),
    (0xE5, all(T("GOTO"))),
    (0xE6, all(T("GCOL"))),
    (0xE7, all(T("IF"))),
    (0xE8, all(T("INPUT"))),
    (0xE9, all(T("LET"))),
    (0xEA, all(T("LOCAL"))),
    (0xEB, all(T("MODE"))),
    (0xEC, all(T("MOVE"))),
    (0xED, all(T("NEXT"))),
    (0xEE, all(T("ON"))),
    (0xEF, all(T("VDU"))),
    (0xF0, all(T("PLOT"))),
    (0xF1, all(T("PRINT"))),
    (0xF2, all(T("PROC"))),
    (0xF3, all(T("READ"))),
    (0xF4, all(T("REM"))),
    (0xF5, all(T("REPEAT"))),
    (0xF6, all(T("REPORT"))),
    (0xF7, all(T("RESTORE"))),
    (0xF8, all(T("RETURN"))),
    (0xF9, all(T("RUN"))),
    (0xFA, all(T("STOP"))),
    // US BASIC spells this token COLOR; we use the UK spelling throughout.
    (0xFB, all(T("COLOUR"))),
    (0xFC, all(T("TRACE"))),
    (0xFD, all(T("UNTIL"))),
    (0xFE, all(T("WIDTH"))),
    (0xFF, all(T("OSCLI"))),
];

fn base_column(dialect: Dialect) -> usize {
    match dialect {
        Dialect::Mos6502 | Dialect::Pdp11 => 0,
        Dialect::Z80 => 1,
        Dialect::Arm | Dialect::Mac => 2,
        Dialect::Windows => 3,
    }
}

pub struct ExpansionMap {
    base: [Expansion; 256],
    c6: [Option<&'static str>; 256],
    c7: [Option<&'static str>; 256],
    c8: [Option<&'static str>; 256],
}

impl ExpansionMap {
    pub fn new(dialect: Dialect) -> ExpansionMap {
        let mut base = [BAD; 256];
        for b in 0x11..=0x7E {
            base[b] = ID;
        }
        let column = base_column(dialect);
        for (byte, row) in BASE_MAP {
            base[usize::from(*byte)] = row[column];
        }
        // Per-dialect fixups that are not columns of the base table.
        base[0x0D] = ID;
        base[0x7F] = match dialect {
            Dialect::Arm | Dialect::Mac => T("OTHERWISE"),
            _ => ID,
        };
        match dialect {
            // Mac BASIC keeps ARM's 0xC6 extension but spends 0xC7 and
            // 0xC8 on single-byte tokens.
            Dialect::Mac => {
                base[0xC7] = T("DELETE");
                base[0xC8] = T("LOAD");
            }
            // PDP-11 BASIC reuses 0xC8 as an extension lead-in, though no
            // extension assignments for it are known.
            Dialect::Pdp11 => {
                base[0xC8] = C8;
            }
            _ => {}
        }
        ExpansionMap {
            base,
            c6: build_map_c6(dialect),
            c7: build_map_c7(dialect),
            c8: build_map_c8(dialect),
        }
    }

    pub fn base(&self, byte: u8) -> Expansion {
        self.base[usize::from(byte)]
    }

    pub fn c6(&self, index: u8) -> Option<&'static str> {
        self.c6[usize::from(index)]
    }

    pub fn c7(&self, index: u8) -> Option<&'static str> {
        self.c7[usize::from(index)]
    }

    pub fn c8(&self, index: u8) -> Option<&'static str> {
        self.c8[usize::from(index)]
    }
}

fn build_map_c6(dialect: Dialect) -> [Option<&'static str>; 256] {
    let mut map = [None; 256];
    if matches!(dialect, Dialect::Arm | Dialect::Mac) {
        // On ARM, SUM LEN arrives as 0xC6 0x8E followed by the ordinary
        // single-byte token 0xA9.
        map[0x8E] = Some("SUM");
        map[0x8F] = Some("BEAT");
    }
    if dialect == Dialect::Mac {
        map[0x90] = Some("ASK");
        map[0x91] = Some("ANSWER");
        map[0x92] = Some("SFOPENIN");
        map[0x93] = Some("SFOPENOUT");
        map[0x94] = Some("SFOPENUP");
        map[0x95] = Some("SFNAME$");
        map[0x96] = Some("MENU");
    }
    map
}

fn build_map_c7(dialect: Dialect) -> [Option<&'static str>; 256] {
    let mut map = [None; 256];
    if matches!(dialect, Dialect::Arm | Dialect::Mac) {
        let arm = dialect == Dialect::Arm;
        map[0x8E] = Some("APPEND");
        map[0x8F] = Some("AUTO");
        map[0x90] = Some(if arm { "CRUNCH" } else { "DELETE" });
        map[0x91] = Some(if arm { "DELETE" } else { "EDIT" });
        map[0x92] = Some(if arm { "EDIT" } else { "HELP" });
        map[0x93] = Some(if arm { "HELP" } else { "LIST" });
        map[0x94] = Some(if arm { "LIST" } else { "LOAD" });
        map[0x95] = Some(if arm { "LOAD" } else { "LVAR" });
        map[0x96] = Some(if arm { "LVAR" } else { "NEW" });
        map[0x97] = Some(if arm { "NEW" } else { "OLD" });
        map[0x98] = Some(if arm { "OLD" } else { "RENUMBER" });
        map[0x99] = Some(if arm { "RENUMBER" } else { "SAVE" });
        map[0x9A] = Some(if arm { "SAVE" } else { "TWIN" });
        map[0x9B] = Some(if arm { "TEXTLOAD" } else { "TWINO" });
        if arm {
            map[0x9C] = Some("TEXTSAVE");
            map[0x9D] = Some("TWIN");
            map[0x9E] = Some("TWINO");
            map[0x9F] = Some("INSTALL");
        }
    }
    map
}

fn build_map_c8(dialect: Dialect) -> [Option<&'static str>; 256] {
    let mut map = [None; 256];
    if matches!(dialect, Dialect::Arm | Dialect::Mac) {
        map[0x8E] = Some("CASE");
        map[0x8F] = Some("CIRCLE");
        map[0x90] = Some("FILL");
        map[0x91] = Some("ORIGIN");
        map[0x92] = Some("POINT");
        map[0x93] = Some("RECTANGLE");
        map[0x94] = Some("SWAP");
        map[0x95] = Some("WHILE");
        map[0x96] = Some("WAIT");
        map[0x97] = Some("MOUSE");
        map[0x98] = Some("QUIT");
    }
    if dialect == Dialect::Arm {
        map[0x99] = Some("SYS");
        map[0x9A] = Some("INSTALL");
        map[0x9B] = Some("LIBRARY");
        map[0x9C] = Some("TINT");
        map[0x9D] = Some("ELLIPSE");
        map[0x9E] = Some("BEATS");
        map[0x9F] = Some("TEMPO");
        map[0xA0] = Some("VOICES");
        map[0xA1] = Some("VOICE");
        map[0xA2] = Some("STEREO");
        map[0xA3] = Some("OVERLAY");
        map[0xA4] = Some("MANDEL");
        map[0xA5] = Some("PRIVATE");
        map[0xA6] = Some("EXIT");
    }
    map
}
