// SPDX-License-Identifier: MIT
//
// Cell colors.
//
// The compositor never does color math: colors arrive already encoded as
// SGR parameters inside the text it paints, and leave the same way. So the
// only color type is the compact `CellColor`, which records which of the
// three SGR encodings a color used (16/256-color palette index, 24-bit RGB,
// or the terminal default) so it can be re-emitted faithfully.
//
// Palette indices 0-7 and 8-15 come from the short forms (30-37 / 90-97 for
// foreground, 40-47 / 100-107 for background) and are written back in the
// same short form.

use std::fmt;

// ─── CellColor ───────────────────────────────────────────────────────────────

/// Compact color for one styled cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellColor {
    /// 24-bit `TrueColor`.
    Rgb(u8, u8, u8),

    /// ANSI 256-color palette index (0-15 are the named colors).
    Ansi256(u8),

    /// Terminal default color (SGR 39 / 49).
    #[default]
    Default,
}

impl CellColor {
    /// Whether this is the terminal default color.
    #[inline]
    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Default)
    }

    /// Parse the tail of an extended color parameter list.
    ///
    /// `params` starts right after the `38` / `48` selector: `[5, n]` for a
    /// palette index, `[2, r, g, b]` for RGB. Returns the color and how many
    /// parameters it consumed, or `None` for a malformed list (out-of-range
    /// components included).
    #[must_use]
    pub fn from_extended(params: &[u16]) -> Option<(Self, usize)> {
        match params {
            [5, n, ..] => Some((Self::Ansi256(u8::try_from(*n).ok()?), 2)),
            [2, r, g, b, ..] => Some((
                Self::Rgb(
                    u8::try_from(*r).ok()?,
                    u8::try_from(*g).ok()?,
                    u8::try_from(*b).ok()?,
                ),
                4,
            )),
            _ => None,
        }
    }
}

impl fmt::Debug for CellColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgb(r, g, b) => write!(f, "#{r:02x}{g:02x}{b:02x}"),
            Self::Ansi256(idx) => write!(f, "ansi({idx})"),
            Self::Default => write!(f, "default"),
        }
    }
}

impl fmt::Display for CellColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
