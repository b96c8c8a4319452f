// SPDX-License-Identifier: MIT
//
// Styled cells, the unit the compositor paints.
//
// A `StyledChar` is one grid cell: a grapheme cluster plus the SGR state
// that was active when it was read. Double-width graphemes (CJK, most
// emoji) occupy two columns; the second column holds a continuation cell
// whose value is the empty string. The serializer skips continuation cells
// when emitting characters.
//
// Cells are compared and hashed by value. The compositor memoizes row
// serialization on the exact cell contents of a row.

use crate::color::CellColor;

// ─── Text Attributes ─────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Text attributes stored as a compact bitfield.
    ///
    /// These map directly to SGR (Select Graphic Rendition) parameters:
    ///
    /// ```
    /// use glint_term::cell::Attr;
    ///
    /// let style = Attr::BOLD | Attr::ITALIC;
    /// assert!(style.contains(Attr::BOLD));
    /// assert!(!style.contains(Attr::DIM));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Attr: u8 {
        /// SGR 1 — increased intensity.
        const BOLD          = 1 << 0;
        /// SGR 2 — decreased intensity (faint).
        const DIM           = 1 << 1;
        /// SGR 3 — italic.
        const ITALIC        = 1 << 2;
        /// SGR 5 — slow blink.
        const SLOW_BLINK    = 1 << 3;
        /// SGR 6 — rapid blink.
        const RAPID_BLINK   = 1 << 4;
        /// SGR 7 — swap foreground and background.
        const INVERSE       = 1 << 5;
        /// SGR 8 — invisible text.
        const HIDDEN        = 1 << 6;
        /// SGR 9 — crossed-out text.
        const STRIKETHROUGH = 1 << 7;
    }
}

// ─── Underline Style ─────────────────────────────────────────────────────────

/// Underline style.
///
/// Kept apart from [`Attr`] so "is underlined" and "which style" can't
/// disagree. Anything other than `None` means the cell is underlined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(u8)]
pub enum UnderlineStyle {
    #[default]
    None = 0,
    /// SGR 4 / 4:1.
    Straight = 1,
    /// SGR 21 / 4:2.
    Double = 2,
    /// SGR 4:3.
    Curly = 3,
    /// SGR 4:4.
    Dotted = 4,
    /// SGR 4:5.
    Dashed = 5,
}

impl UnderlineStyle {
    #[inline]
    #[must_use]
    pub const fn is_underlined(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Map the `4:N` sub-parameter. Unknown values fall back to straight.
    #[must_use]
    pub const fn from_subparam(n: u16) -> Self {
        match n {
            0 => Self::None,
            2 => Self::Double,
            3 => Self::Curly,
            4 => Self::Dotted,
            5 => Self::Dashed,
            _ => Self::Straight,
        }
    }
}

// ─── Style ───────────────────────────────────────────────────────────────────

/// The SGR state attached to a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Style {
    pub fg: CellColor,
    pub bg: CellColor,
    pub attrs: Attr,
    pub underline: UnderlineStyle,
}

impl Style {
    /// No attributes, default colors.
    pub const PLAIN: Self = Self {
        fg: CellColor::Default,
        bg: CellColor::Default,
        attrs: Attr::empty(),
        underline: UnderlineStyle::None,
    };

    #[inline]
    #[must_use]
    pub fn is_plain(self) -> bool {
        self == Self::PLAIN
    }

    #[inline]
    #[must_use]
    pub const fn with_fg(self, fg: CellColor) -> Self {
        Self { fg, ..self }
    }

    #[inline]
    #[must_use]
    pub const fn with_bg(self, bg: CellColor) -> Self {
        Self { bg, ..self }
    }

    #[inline]
    #[must_use]
    pub const fn with_attrs(self, attrs: Attr) -> Self {
        Self { attrs, ..self }
    }

    #[inline]
    #[must_use]
    pub const fn with_underline(self, underline: UnderlineStyle) -> Self {
        Self { underline, ..self }
    }
}

// ─── StyledChar ──────────────────────────────────────────────────────────────

/// One grid cell: a grapheme cluster and its style.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StyledChar {
    /// The grapheme cluster. `" "` for blanks, `""` for the second column
    /// of a double-width character.
    pub value: String,
    /// Occupies two columns.
    pub full_width: bool,
    pub style: Style,
}

impl StyledChar {
    /// A plain space: what every grid cell starts as.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            value: " ".to_owned(),
            full_width: false,
            style: Style::PLAIN,
        }
    }

    /// The second column of a double-width character with `style`.
    #[must_use]
    pub const fn continuation(style: Style) -> Self {
        Self {
            value: String::new(),
            full_width: false,
            style,
        }
    }

    #[must_use]
    pub fn new(value: impl Into<String>, full_width: bool, style: Style) -> Self {
        Self {
            value: value.into(),
            full_width,
            style,
        }
    }

    /// Whether the cell shows a space, whatever its style.
    #[inline]
    #[must_use]
    pub fn is_space(&self) -> bool {
        self.value == " "
    }

    /// A space with no styling: safe to trim from the end of a row.
    #[inline]
    #[must_use]
    pub fn is_plain_blank(&self) -> bool {
        self.is_space() && self.style.is_plain()
    }

    #[inline]
    #[must_use]
    pub fn is_continuation(&self) -> bool {
        self.value.is_empty()
    }

    /// Columns this cell's character covers.
    #[inline]
    #[must_use]
    pub const fn columns(&self) -> usize {
        if self.full_width { 2 } else { 1 }
    }
}

impl Default for StyledChar {
    fn default() -> Self {
        Self::blank()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
