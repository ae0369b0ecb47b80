//! Compile-flag sets and their single-letter specification syntax.

use crate::error::{LadonError, Result};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// Flag specification used when none is configured.
pub const DEFAULT_FLAG_SPEC: &str = "iu";

/// A set of compile flags applied to a pattern.
///
/// Parsed from a string with one letter per flag:
///
/// | Letter | Flag |
/// |--------|------|
/// | `i` | case-insensitive |
/// | `s` | `.` also matches `\n` |
/// | `m` | `^`/`$` match at line boundaries |
/// | `H` | report at most one match per rule per scan |
/// | `V` | allow patterns that match the empty string |
/// | `8`, `u` | UTF-8 mode |
/// | `W` | Unicode character properties |
/// | `L` | leftmost start-of-match reporting |
///
/// # Examples
///
/// ```rust
/// use ladon::CompileFlags;
///
/// let flags: CompileFlags = "iu".parse()?;
/// assert!(flags.contains(CompileFlags::CASELESS));
/// assert!(flags.contains(CompileFlags::UTF8));
/// assert_eq!(flags.to_string(), "i8");
/// # Ok::<(), ladon::LadonError>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CompileFlags(u32);

impl CompileFlags {
    pub const CASELESS: CompileFlags = CompileFlags(1 << 0);
    pub const DOTALL: CompileFlags = CompileFlags(1 << 1);
    pub const MULTILINE: CompileFlags = CompileFlags(1 << 2);
    pub const SINGLEMATCH: CompileFlags = CompileFlags(1 << 3);
    pub const ALLOWEMPTY: CompileFlags = CompileFlags(1 << 4);
    pub const UTF8: CompileFlags = CompileFlags(1 << 5);
    pub const UCP: CompileFlags = CompileFlags(1 << 6);
    pub const SOM_LEFTMOST: CompileFlags = CompileFlags(1 << 7);

    // Canonical rendering order.
    const LETTERS: [(char, CompileFlags); 8] = [
        ('i', Self::CASELESS),
        ('s', Self::DOTALL),
        ('m', Self::MULTILINE),
        ('H', Self::SINGLEMATCH),
        ('V', Self::ALLOWEMPTY),
        ('8', Self::UTF8),
        ('W', Self::UCP),
        ('L', Self::SOM_LEFTMOST),
    ];

    pub const fn empty() -> Self {
        CompileFlags(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: CompileFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parse a flag specification such as `"iu"` or `"ism8"`.
    ///
    /// An unknown letter is an error; the empty string yields no flags.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut flags = CompileFlags::empty();
        for c in spec.chars() {
            flags |= match c {
                'u' => Self::UTF8,
                _ => Self::LETTERS
                    .iter()
                    .find(|(letter, _)| *letter == c)
                    .map(|(_, flag)| *flag)
                    .ok_or(LadonError::InvalidFlag(c))?,
            };
        }
        Ok(flags)
    }

    /// Whether the pattern is compiled with Unicode semantics.
    pub fn unicode(self) -> bool {
        self.contains(Self::UTF8) || self.contains(Self::UCP)
    }

    /// Inline-flag group equivalent to these flags for the regex syntax,
    /// e.g. `(?is)` or `(?-u)`.
    pub fn inline_group(self) -> String {
        let mut on = String::new();
        if self.contains(Self::CASELESS) {
            on.push('i');
        }
        if self.contains(Self::DOTALL) {
            on.push('s');
        }
        if self.contains(Self::MULTILINE) {
            on.push('m');
        }
        let off = if self.unicode() { "" } else { "-u" };
        if on.is_empty() && off.is_empty() {
            String::new()
        } else {
            format!("(?{on}{off})")
        }
    }
}

impl BitOr for CompileFlags {
    type Output = CompileFlags;

    fn bitor(self, rhs: CompileFlags) -> CompileFlags {
        CompileFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for CompileFlags {
    fn bitor_assign(&mut self, rhs: CompileFlags) {
        self.0 |= rhs.0;
    }
}

impl FromStr for CompileFlags {
    type Err = LadonError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CompileFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (letter, flag) in Self::LETTERS {
            if self.contains(flag) {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_spec() {
        let flags = CompileFlags::parse(DEFAULT_FLAG_SPEC).unwrap();
        assert_eq!(flags, CompileFlags::CASELESS | CompileFlags::UTF8);
    }

    #[test]
    fn test_parse_empty_spec() {
        let flags = CompileFlags::parse("").unwrap();
        assert!(flags.is_empty());
        assert!(!flags.unicode());
    }

    #[test]
    fn test_parse_unknown_letter() {
        match CompileFlags::parse("ix") {
            Err(LadonError::InvalidFlag(c)) => assert_eq!(c, 'x'),
            other => panic!("Expected InvalidFlag, got {other:?}"),
        }
    }

    #[test]
    fn test_u_and_8_are_aliases() {
        assert_eq!(
            CompileFlags::parse("u").unwrap(),
            CompileFlags::parse("8").unwrap()
        );
    }

    #[test]
    fn test_display_is_canonical() {
        let flags: CompileFlags = "L8msiHV".parse().unwrap();
        assert_eq!(flags.to_string(), "ismHV8L");
    }

    #[test]
    fn test_inline_group() {
        assert_eq!(CompileFlags::parse("iu").unwrap().inline_group(), "(?i)");
        assert_eq!(CompileFlags::parse("sm8").unwrap().inline_group(), "(?sm)");
        assert_eq!(CompileFlags::parse("i").unwrap().inline_group(), "(?i-u)");
        assert_eq!(CompileFlags::parse("").unwrap().inline_group(), "(?-u)");
        assert_eq!(CompileFlags::parse("W").unwrap().inline_group(), "");
    }
}
