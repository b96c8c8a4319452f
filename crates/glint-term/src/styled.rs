// SPDX-License-Identifier: MIT
//
// ANSI-styled text: reading it into cells and writing cells back out.
//
// Text handed to the compositor already carries its styling as SGR escape
// sequences (`\x1b[1;31mred\x1b[0m`). This module:
//
//   - tokenizes such text and tracks the SGR state across it, yielding one
//     `StyledChar` per grapheme cluster (`styled_chars`)
//   - measures display width while ignoring escapes (`string_width`,
//     `widest_line`)
//   - cuts a column range out of styled text without losing the style of
//     the surviving characters (`slice_ansi`)
//   - serializes a run of cells back into a string with the fewest SGR
//     transitions (`StyleWriter`, `styled_chars_to_string`)
//
// Escape sequences other than SGR (cursor movement, OSC strings, ...) are
// zero-width and dropped: the compositor owns cursor placement.

use std::io::Write;

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::ansi;
use crate::cell::{Attr, StyledChar, Style, UnderlineStyle};
use crate::color::CellColor;

// ─── Tokenizer ───────────────────────────────────────────────────────────────

/// One lexical piece of styled text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// Printable text with no escapes.
    Text(&'a str),
    /// Parameters of an SGR sequence (`1;31` for `\x1b[1;31m`).
    Sgr(&'a str),
    /// Any other escape sequence. Dropped.
    Other,
}

/// Iterator over the tokens of a string.
struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    const fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.rest.is_empty() {
            return None;
        }
        let Some(rest) = self.rest.strip_prefix('\x1b') else {
            let end = self.rest.find('\x1b').unwrap_or(self.rest.len());
            let (text, rest) = self.rest.split_at(end);
            self.rest = rest;
            return Some(Token::Text(text));
        };

        let (token, len) = escape_token(rest);
        self.rest = &rest[len..];
        Some(token)
    }
}

/// Classify the escape whose introducer (ESC) was already stripped.
/// Returns the token and how many bytes of `rest` it spans.
fn escape_token(rest: &str) -> (Token<'_>, usize) {
    let bytes = rest.as_bytes();
    match bytes.first() {
        // CSI: parameters and intermediates, then a final byte in 0x40..=0x7E.
        Some(b'[') => {
            let body = &bytes[1..];
            match body.iter().position(|b| (0x40..=0x7E).contains(b)) {
                Some(fin) if body[fin] == b'm' => (Token::Sgr(&rest[1..=fin]), fin + 2),
                Some(fin) => (Token::Other, fin + 2),
                None => (Token::Other, rest.len()),
            }
        }
        // OSC: terminated by BEL or ST (ESC \).
        Some(b']') => {
            let mut i = 1;
            while i < bytes.len() {
                match bytes[i] {
                    0x07 => return (Token::Other, i + 1),
                    0x1B if bytes.get(i + 1) == Some(&b'\\') => return (Token::Other, i + 2),
                    _ => i += 1,
                }
            }
            (Token::Other, rest.len())
        }
        // Two-byte escape. Never split a multi-byte character.
        Some(_) => {
            let len = rest.chars().next().map_or(0, char::len_utf8);
            (Token::Other, len)
        }
        None => (Token::Other, 0),
    }
}

// ─── SGR State ───────────────────────────────────────────────────────────────

/// Apply the parameters of one SGR sequence to `style`.
///
/// Handles both the `;` and the `:` forms of extended colors and underline
/// styles. Unknown codes are ignored.
fn apply_sgr(style: &mut Style, params: &str) {
    let groups: Vec<&str> = params.split(';').collect();
    let mut i = 0;
    while i < groups.len() {
        let mut parts = groups[i].split(':');
        let code: u16 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let sub: Vec<u16> = parts.filter_map(|p| p.parse().ok()).collect();
        let has_sub = groups[i].contains(':');
        i += 1;

        match code {
            0 => *style = Style::PLAIN,
            1 => style.attrs |= Attr::BOLD,
            2 => style.attrs |= Attr::DIM,
            3 => style.attrs |= Attr::ITALIC,
            4 => {
                style.underline = sub
                    .first()
                    .map_or(UnderlineStyle::Straight, |&n| UnderlineStyle::from_subparam(n));
            }
            5 => style.attrs |= Attr::SLOW_BLINK,
            6 => style.attrs |= Attr::RAPID_BLINK,
            7 => style.attrs |= Attr::INVERSE,
            8 => style.attrs |= Attr::HIDDEN,
            9 => style.attrs |= Attr::STRIKETHROUGH,
            21 => style.underline = UnderlineStyle::Double,
            22 => style.attrs -= Attr::BOLD | Attr::DIM,
            23 => style.attrs -= Attr::ITALIC,
            24 => style.underline = UnderlineStyle::None,
            25 => style.attrs -= Attr::SLOW_BLINK | Attr::RAPID_BLINK,
            27 => style.attrs -= Attr::INVERSE,
            28 => style.attrs -= Attr::HIDDEN,
            29 => style.attrs -= Attr::STRIKETHROUGH,
            30..=37 => style.fg = palette(code - 30),
            38 | 48 => {
                let color = if has_sub {
                    extended_colon(&sub)
                } else {
                    let rest: Vec<u16> = groups[i..]
                        .iter()
                        .map(|g| g.parse().unwrap_or(u16::MAX))
                        .collect();
                    // The selector's parameters are consumed even when
                    // malformed, so they are never read as codes.
                    i += extended_len(&rest);
                    CellColor::from_extended(&rest).map(|(color, _)| color)
                };
                if let Some(color) = color {
                    if code == 38 {
                        style.fg = color;
                    } else {
                        style.bg = color;
                    }
                }
            }
            39 => style.fg = CellColor::Default,
            40..=47 => style.bg = palette(code - 40),
            49 => style.bg = CellColor::Default,
            90..=97 => style.fg = palette(code - 90 + 8),
            100..=107 => style.bg = palette(code - 100 + 8),
            _ => {}
        }
    }
}

/// `38:5:n`, `38:2:r:g:b`, and `38:2:colorspace:r:g:b`.
/// Parameters taken by a `38` / `48` selector in the `;` form, capped at
/// what is left. An unknown selector swallows the rest of the sequence.
fn extended_len(rest: &[u16]) -> usize {
    let len = match rest.first() {
        Some(5) => 2,
        Some(2) => 4,
        _ => rest.len(),
    };
    len.min(rest.len())
}

fn extended_colon(sub: &[u16]) -> Option<CellColor> {
    match sub {
        [2, _, r, g, b] => CellColor::from_extended(&[2, *r, *g, *b]).map(|(c, _)| c),
        _ => CellColor::from_extended(sub).map(|(c, _)| c),
    }
}

#[allow(clippy::cast_possible_truncation)] // callers pass 0..=15
const fn palette(idx: u16) -> CellColor {
    CellColor::Ansi256(idx as u8)
}

// ─── Reading ─────────────────────────────────────────────────────────────────

/// Display width of one grapheme cluster, `None` if it takes no column.
fn grapheme_width(g: &str) -> Option<usize> {
    if g.chars().all(char::is_control) {
        return None;
    }
    match g.width() {
        0 => None,
        w => Some(w.min(2)),
    }
}

/// Split styled text into cells, one per grapheme cluster.
///
/// Each cell carries the SGR state in effect where it was read.
/// Zero-width graphemes and control characters produce no cell.
#[must_use]
pub fn styled_chars(text: &str) -> Vec<StyledChar> {
    let mut style = Style::PLAIN;
    let mut out = Vec::with_capacity(text.len());
    for token in Tokens::new(text) {
        match token {
            Token::Text(t) => {
                for g in t.graphemes(true) {
                    if let Some(w) = grapheme_width(g) {
                        out.push(StyledChar::new(g, w == 2, style));
                    }
                }
            }
            Token::Sgr(params) => apply_sgr(&mut style, params),
            Token::Other => {}
        }
    }
    out
}

/// Display width of styled text, ignoring escape sequences.
#[must_use]
pub fn string_width(text: &str) -> usize {
    Tokens::new(text)
        .filter_map(|token| match token {
            Token::Text(t) => Some(t.graphemes(true).filter_map(grapheme_width).sum::<usize>()),
            _ => None,
        })
        .sum()
}

/// Width of the widest line of `text`.
#[must_use]
pub fn widest_line(text: &str) -> usize {
    text.split('\n').map(string_width).max().unwrap_or(0)
}

/// Cut columns `from..to` out of styled text.
///
/// Characters keep their style. A double-width character straddling either
/// edge is replaced by styled spaces for the columns that fall inside, so
/// everything after it stays in its column.
#[must_use]
pub fn slice_ansi(text: &str, from: usize, to: usize) -> String {
    if from >= to {
        return String::new();
    }
    if from == 0 && to >= string_width(text) {
        return text.to_owned();
    }

    let mut cells = Vec::new();
    let mut col = 0;
    for cell in styled_chars(text) {
        let start = col;
        let end = col + cell.columns();
        col = end;
        if end <= from {
            continue;
        }
        if start >= to {
            break;
        }
        if start >= from && end <= to {
            cells.push(cell);
        } else {
            let covered = end.min(to) - start.max(from);
            cells.extend((0..covered).map(|_| StyledChar::new(" ", false, cell.style)));
        }
    }
    styled_chars_to_string(&cells)
}

// ─── Writing ─────────────────────────────────────────────────────────────────

/// Stateful serializer that emits only the SGR changes between cells.
///
/// Starts from the terminal default state. On an attribute change it resets
/// (SGR 0) when attributes were set, which also clears colors and underline,
/// and re-emits what the next cell needs. Colors and underline are emitted
/// only when they differ from the last emitted value.
#[derive(Debug, Default)]
pub struct StyleWriter {
    current: Style,
}

impl StyleWriter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: Style::PLAIN,
        }
    }

    /// Append one cell. Continuation cells produce nothing: the terminal
    /// already advanced past them when it drew the wide character.
    pub fn write_cell(&mut self, out: &mut Vec<u8>, cell: &StyledChar) {
        if cell.is_continuation() {
            return;
        }
        self.apply_style(out, cell.style);
        out.extend_from_slice(cell.value.as_bytes());
    }

    /// Return the terminal to the default style if anything is still set.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if !self.current.is_plain() {
            ansi::reset(out).ok();
            self.current = Style::PLAIN;
        }
    }

    fn apply_style(&mut self, out: &mut Vec<u8>, next: Style) {
        if next == self.current {
            return;
        }

        if next.attrs != self.current.attrs {
            if !self.current.attrs.is_empty() {
                // SGR 0 clears everything; we now know the state exactly.
                ansi::reset(out).ok();
                self.current = Style::PLAIN;
            }
            ansi::attrs(out, next.attrs).ok();
            self.current.attrs = next.attrs;
        }

        if next.underline != self.current.underline {
            ansi::underline(out, next.underline).ok();
            self.current.underline = next.underline;
        }

        if next.fg != self.current.fg {
            ansi::fg(out, next.fg).ok();
            self.current.fg = next.fg;
        }

        if next.bg != self.current.bg {
            ansi::bg(out, next.bg).ok();
            self.current.bg = next.bg;
        }
    }
}

/// Serialize cells to a string, closing any open style at the end.
#[must_use]
pub fn styled_chars_to_string(cells: &[StyledChar]) -> String {
    let mut out = Vec::with_capacity(cells.len());
    let mut writer = StyleWriter::new();
    for cell in cells {
        writer.write_cell(&mut out, cell);
    }
    writer.finish(&mut out);
    // Cell values are `&str` slices and escapes are ASCII.
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Write `s` with every SGR parameter list rendered back through `Style`.
///
/// Equivalent to `styled_chars_to_string(&styled_chars(s))`; handy to
/// normalize text for comparison.
#[must_use]
pub fn normalize(s: &str) -> String {
    styled_chars_to_string(&styled_chars(s))
}

/// Convenience for tests and callers building styled text by hand.
///
/// Wraps `text` in the SGR codes for `style` and a trailing reset.
#[must_use]
pub fn paint(text: &str, style: Style) -> String {
    let mut out = Vec::new();
    let mut writer = StyleWriter::new();
    writer.apply_style(&mut out, style);
    out.write_all(text.as_bytes()).ok();
    writer.finish(&mut out);
    String::from_utf8_lossy(&out).into_owned()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
