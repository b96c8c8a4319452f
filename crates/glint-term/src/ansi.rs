// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`, plus the
// literal sequences the scheduler splices into frame strings. No state, no
// decisions about when to emit; that belongs to the row serializer in
// `styled.rs` and to the scheduler.
//
// All functions return `io::Result` propagated from the underlying writer.
// They never fail when writing into a `Vec<u8>`.

use std::io::{self, Write};

use crate::cell::{Attr, UnderlineStyle};
use crate::color::CellColor;

// ─── Literal Sequences ──────────────────────────────────────────────────────

/// Begin synchronized output (DEC private mode 2026).
///
/// The terminal buffers everything until [`SYNC_END`] and then paints the
/// frame at once. Terminals that don't know the mode ignore it.
pub const SYNC_BEGIN: &str = "\x1b[?2026h";
/// End synchronized output.
pub const SYNC_END: &str = "\x1b[?2026l";

/// Clear the screen and the scrollback, then home the cursor.
///
/// Used only by full rewrites.
pub const CLEAR_TERMINAL: &str = "\x1b[2J\x1b[3J\x1b[H";

/// Erase the entire current line (EL 2).
pub const ERASE_LINE: &str = "\x1b[2K";
/// Move the cursor up one row (CUU 1).
pub const CURSOR_UP: &str = "\x1b[1A";
/// Move the cursor to column 1 (CHA).
pub const CURSOR_LEFT: &str = "\x1b[G";

/// SGR 0.
pub const RESET: &str = "\x1b[0m";

/// Semantic prompt markers (OSC 133).
///
/// `A` starts a prompt. iTerm2 only honours the "refresh line" form, which
/// is also the one that never moves the cursor when sent at column 1.
pub const PROMPT_START: &str = "\x1b]133;A\x07";
/// End of prompt, start of user input.
pub const PROMPT_END: &str = "\x1b]133;B\x07";
/// Start of command output.
pub const COMMAND_START: &str = "\x1b]133;C\x07";
/// End of command output.
pub const COMMAND_END: &str = "\x1b]133;D\x07";

/// Debug-mode background for prompt regions (dark blue).
pub const DEBUG_PROMPT_BG: &str = "\x1b[48;5;17m";
/// Debug-mode background for command regions (dark red).
pub const DEBUG_COMMAND_BG: &str = "\x1b[48;5;52m";
/// Restore the default background (SGR 49).
pub const DEFAULT_BG: &str = "\x1b[49m";

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Lines ───────────────────────────────────────────────────────────────────

/// Erase `count` lines ending at the cursor row, leaving the cursor at
/// column 1 of the topmost erased row.
///
/// Writes nothing for `count == 0`.
pub fn erase_lines(w: &mut impl Write, count: usize) -> io::Result<()> {
    for i in 0..count {
        w.write_all(ERASE_LINE.as_bytes())?;
        if i + 1 < count {
            w.write_all(CURSOR_UP.as_bytes())?;
        }
    }
    if count > 0 {
        w.write_all(CURSOR_LEFT.as_bytes())?;
    }
    Ok(())
}

// ─── Bracketed Paste ────────────────────────────────────────────────────────

/// Enable bracketed paste mode (DEC 2004).
///
/// Pasted text is wrapped with `\x1b[200~` / `\x1b[201~` so the decoder can
/// deliver it as one block instead of a burst of keystrokes.
#[inline]
pub fn enable_bracketed_paste(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2004h")
}

/// Disable bracketed paste mode.
#[inline]
pub fn disable_bracketed_paste(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2004l")
}

// ─── Foreground Color ────────────────────────────────────────────────────────

/// Set the foreground (text) color.
///
/// Uses compact SGR codes for standard colors (30-37, 90-97), the 256-color
/// extended format for palette indices 16-255, and 24-bit `TrueColor` for RGB.
pub fn fg(w: &mut impl Write, color: CellColor) -> io::Result<()> {
    match color {
        CellColor::Default => w.write_all(b"\x1b[39m"),
        CellColor::Ansi256(idx) => {
            if idx < 8 {
                write!(w, "\x1b[{}m", 30 + u16::from(idx))
            } else if idx < 16 {
                write!(w, "\x1b[{}m", 82 + u16::from(idx))
            } else {
                write!(w, "\x1b[38;5;{idx}m")
            }
        }
        CellColor::Rgb(r, g, b) => write!(w, "\x1b[38;2;{r};{g};{b}m"),
    }
}

// ─── Background Color ────────────────────────────────────────────────────────

/// Set the background color.
///
/// Same encoding strategy as [`fg`] with the background codes
/// (40-47, 100-107, 48;5;N, 48;2;R;G;B).
pub fn bg(w: &mut impl Write, color: CellColor) -> io::Result<()> {
    match color {
        CellColor::Default => w.write_all(b"\x1b[49m"),
        CellColor::Ansi256(idx) => {
            if idx < 8 {
                write!(w, "\x1b[{}m", 40 + u16::from(idx))
            } else if idx < 16 {
                write!(w, "\x1b[{}m", 92 + u16::from(idx))
            } else {
                write!(w, "\x1b[48;5;{idx}m")
            }
        }
        CellColor::Rgb(r, g, b) => write!(w, "\x1b[48;2;{r};{g};{b}m"),
    }
}

// ─── Text Attributes ─────────────────────────────────────────────────────────

/// Emit SGR codes for text attributes as a single CSI sequence.
///
/// Multiple attributes are semicolon-separated: `\x1b[1;3;9m` for
/// bold + italic + strikethrough. Does nothing if no attributes are set.
pub fn attrs(w: &mut impl Write, attr: Attr) -> io::Result<()> {
    if attr.is_empty() {
        return Ok(());
    }

    const CODES: [(Attr, &str); 8] = [
        (Attr::BOLD, "1"),
        (Attr::DIM, "2"),
        (Attr::ITALIC, "3"),
        (Attr::SLOW_BLINK, "5"),
        (Attr::RAPID_BLINK, "6"),
        (Attr::INVERSE, "7"),
        (Attr::HIDDEN, "8"),
        (Attr::STRIKETHROUGH, "9"),
    ];

    w.write_all(b"\x1b[")?;
    let mut first = true;
    for (flag, code) in CODES {
        if attr.contains(flag) {
            if !first {
                w.write_all(b";")?;
            }
            w.write_all(code.as_bytes())?;
            first = false;
        }
    }
    w.write_all(b"m")
}

// ─── Underline Style ─────────────────────────────────────────────────────────

/// Set the underline style.
///
/// A straight underline uses plain SGR 4 so every terminal understands it;
/// the other variants need the `4:N` sub-parameter syntax. `None` is SGR 24.
pub fn underline(w: &mut impl Write, style: UnderlineStyle) -> io::Result<()> {
    match style {
        UnderlineStyle::None => w.write_all(b"\x1b[24m"),
        UnderlineStyle::Straight => w.write_all(b"\x1b[4m"),
        UnderlineStyle::Double => w.write_all(b"\x1b[4:2m"),
        UnderlineStyle::Curly => w.write_all(b"\x1b[4:3m"),
        UnderlineStyle::Dotted => w.write_all(b"\x1b[4:4m"),
        UnderlineStyle::Dashed => w.write_all(b"\x1b[4:5m"),
    }
}

/// Reset all SGR attributes (SGR 0).
///
/// Clears everything. A stateful writer must invalidate what it tracks.
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(RESET.as_bytes())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
