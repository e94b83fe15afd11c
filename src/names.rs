//! Drive and volume selectors, file name parsing, and the ambiguous file
//! specification (wildcard) matcher.
//!
//! A fully-qualified name looks like `:0.$.NAME` or, for an Opus DDOS
//! sub-volume, `:0B.$.NAME`. Wildcards use `#` (any one character except
//! `.`) and `*` (any run of characters other than `.`); the drive field can
//! never be a wildcard. Matching works by qualifying both the pattern and
//! each candidate name into canonical form and comparing them structurally,
//! case-insensitively.

use std::fmt;

/// Identifies one disc surface (drive number as the BBC Micro sees it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceSelector(pub u32);

impl SurfaceSelector {
    /// Acorn DFS presents drives 0-3 even when nothing is connected.
    pub fn acorn_default_last_surface() -> SurfaceSelector {
        SurfaceSelector(3)
    }

    /// The other side of the same physical unit. Side 0 of unit 0 is drive
    /// 0 and side 1 is drive 2, so opposite surfaces differ by bit 1.
    pub fn opposite_surface(&self) -> SurfaceSelector {
        SurfaceSelector(self.0 ^ 2)
    }

    /// Parse a decimal drive number from the front of `s`, returning the
    /// selector and the number of characters consumed.
    pub fn parse(s: &str) -> Result<(SurfaceSelector, usize), String> {
        let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return Err(format!("drive number expected at the start of '{s}'"));
        }
        match s[..digits].parse::<u32>() {
            Ok(n) => Ok((SurfaceSelector(n), digits)),
            Err(_) => Err(format!("drive number '{}' is out of range", &s[..digits])),
        }
    }
}

impl fmt::Display for SurfaceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a specific volume: a surface plus, for Opus DDOS, an optional
/// sub-volume letter A-H.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VolumeSelector {
    pub surface: SurfaceSelector,
    pub subvolume: Option<char>,
}

impl VolumeSelector {
    pub fn new(surface: u32) -> VolumeSelector {
        VolumeSelector {
            surface: SurfaceSelector(surface),
            subvolume: None,
        }
    }

    pub fn with_subvolume(surface: u32, subvolume: char) -> VolumeSelector {
        VolumeSelector {
            surface: SurfaceSelector(surface),
            subvolume: Some(subvolume),
        }
    }

    /// The volume that is meant when none is named.
    pub fn effective_subvolume(&self) -> char {
        self.subvolume.unwrap_or('A')
    }

    /// Parse `NN` or `NNL` (L being a volume letter) from the front of `s`,
    /// returning the selector and the number of characters consumed.
    pub fn parse(s: &str) -> Result<(VolumeSelector, usize), String> {
        let (surface, mut used) = SurfaceSelector::parse(s)?;
        let subvolume = match s[used..].chars().next() {
            Some(c @ 'A'..='H') => {
                used += 1;
                Some(c)
            }
            _ => None,
        };
        Ok((
            VolumeSelector {
                surface,
                subvolume,
            },
            used,
        ))
    }
}

impl fmt::Display for VolumeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.surface)?;
        if let Some(v) = self.subvolume {
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// The ambient state a command runs against: which volume and directory are
/// current (as for *DRIVE and *DIR).
#[derive(Debug, Clone)]
pub struct DfsContext {
    pub current_volume: VolumeSelector,
    pub current_directory: char,
}

impl Default for DfsContext {
    fn default() -> DfsContext {
        DfsContext {
            current_volume: VolumeSelector::new(0),
            current_directory: '$',
        }
    }
}

/// A file specification resolved against the current context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFileName {
    pub vol: VolumeSelector,
    pub dir: char,
    pub name: String,
}

/// Parse `[:DRIVE.][DIR.]NAME`, filling unspecified fields from the context.
pub fn parse_filename(ctx: &DfsContext, fsp: &str) -> Result<ParsedFileName, String> {
    let mut vol = ctx.current_volume;
    let mut dir = ctx.current_directory;
    let mut rest = fsp;
    if let Some(after_colon) = rest.strip_prefix(':') {
        let (got, used) = VolumeSelector::parse(after_colon)?;
        vol = got;
        rest = &after_colon[used..];
        rest = rest
            .strip_prefix('.')
            .ok_or_else(|| format!("file name {fsp} has a bad drive specification"))?;
    }
    let bytes = rest.as_bytes();
    let name = if bytes.len() > 2 && bytes[1] == b'.' {
        dir = bytes[0] as char;
        &rest[2..]
    } else {
        rest
    };
    Ok(ParsedFileName {
        vol,
        dir,
        name: name.trim_end().to_string(),
    })
}

fn valid_name_part(name: &str, allow_wildcards: bool) -> Result<(), String> {
    if name.is_empty() {
        return Err("not a valid file name".to_string());
    }
    for ch in name.chars() {
        let meta = matches!(ch, '.' | ':') || (!allow_wildcards && matches!(ch, '#' | '*'));
        if meta {
            return Err("not a valid file name".to_string());
        }
    }
    Ok(())
}

/// Rewrite `input` into the canonical fully-qualified form
/// `:DRIVE.DIR.NAME`, using the context for any absent fields.
/// Qualification is idempotent.
pub fn qualify(ctx: &DfsContext, input: &str) -> Result<String, String> {
    let parsed = parse_filename(ctx, input)?;
    valid_name_part(&parsed.name, false)?;
    if parsed.dir == '.' || parsed.dir == ':' {
        return Err("not a valid file name".to_string());
    }
    Ok(format!("{}", QualifiedName(&parsed)))
}

struct QualifiedName<'a>(&'a ParsedFileName);

impl fmt::Display for QualifiedName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            ":{}.{}.{}",
            self.0.vol,
            self.0.dir,
            self.0.name.trim_end()
        )
    }
}

/// Structural wildcard comparison. `#` matches a single character other
/// than `.`, `*` a run of such characters, everything else itself,
/// case-insensitively.
fn wildcard_eq(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some(b'*') => {
            if wildcard_eq(&pattern[1..], text) {
                return true;
            }
            match text.first() {
                Some(&c) if c != b'.' => wildcard_eq(pattern, &text[1..]),
                _ => false,
            }
        }
        Some(b'#') => match text.first() {
            Some(&c) if c != b'.' => wildcard_eq(&pattern[1..], &text[1..]),
            _ => false,
        },
        Some(&p) => match text.first() {
            Some(&c) if c.eq_ignore_ascii_case(&p) => wildcard_eq(&pattern[1..], &text[1..]),
            _ => false,
        },
    }
}

/// A compiled ambiguous file specification.
pub struct WildcardMatcher {
    vol: VolumeSelector,
    qualified_pattern: String,
}

impl WildcardMatcher {
    pub fn compile(ctx: &DfsContext, pattern: &str) -> Result<WildcardMatcher, String> {
        let parsed = parse_filename(ctx, pattern)?;
        valid_name_part(&parsed.name, true)?;
        if parsed.dir == '.' || parsed.dir == ':' {
            return Err("bad name".to_string());
        }
        Ok(WildcardMatcher {
            vol: parsed.vol,
            qualified_pattern: format!("{}", QualifiedName(&parsed)),
        })
    }

    /// The drive the pattern names (wildcards cannot span drives).
    pub fn volume(&self) -> VolumeSelector {
        self.vol
    }

    pub fn matches(&self, vol: VolumeSelector, directory: char, name: &str) -> bool {
        let candidate = ParsedFileName {
            vol,
            dir: directory,
            name: name.trim_end().to_string(),
        };
        if valid_name_part(&candidate.name, false).is_err() {
            return false;
        }
        let qualified = format!("{}", QualifiedName(&candidate));
        wildcard_eq(self.qualified_pattern.as_bytes(), qualified.as_bytes())
    }
}
