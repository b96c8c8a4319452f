// SPDX-License-Identifier: MIT
//
// Line primitive — replace the previously written dynamic frame in place.
//
// Inline rendering never owns the screen. The dynamic frame lives in the
// rows just above the cursor, and redrawing it means erasing exactly the
// rows the last frame took and writing the new one. `LogUpdate` is that
// operation; the scheduler goes through the trait so tests can record what
// it asked for.
//
// `LineEraser` is the implementation used for real terminals. It counts the
// rows of what it wrote (the trailing newline included, which leaves the
// cursor on a fresh row below the frame) and skips writes identical to the
// previous one.

use std::io::{self, Write};

use crate::ansi;

/// Replaces the dynamic frame on screen.
pub trait LogUpdate {
    /// Erase the previous frame and write `text` followed by a newline.
    ///
    /// # Errors
    ///
    /// Propagates write failures from `out`.
    fn render(&mut self, out: &mut dyn Write, text: &str) -> io::Result<()>;

    /// Erase the previous frame and forget it.
    ///
    /// # Errors
    ///
    /// Propagates write failures from `out`.
    fn clear(&mut self, out: &mut dyn Write) -> io::Result<()>;

    /// Leave the current frame on screen for good and restore the cursor.
    ///
    /// # Errors
    ///
    /// Propagates write failures from `out`.
    fn done(&mut self, out: &mut dyn Write) -> io::Result<()>;

    /// Record that `text` was written by someone else, so the next render
    /// erases the right number of rows.
    fn update_line_count(&mut self, text: &str);
}

// ─── LineEraser ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct LineEraser {
    previous_line_count: usize,
    previous_output: String,
    cursor_hidden: bool,
    /// Keep the cursor visible while rendering.
    show_cursor: bool,
}

impl LineEraser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A line eraser that never hides the cursor.
    #[must_use]
    pub fn with_visible_cursor() -> Self {
        Self {
            show_cursor: true,
            ..Self::default()
        }
    }

    /// Rows the next render will erase.
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.previous_line_count
    }
}

impl LogUpdate for LineEraser {
    fn render(&mut self, out: &mut dyn Write, text: &str) -> io::Result<()> {
        let mut buf = Vec::new();
        if !self.show_cursor && !self.cursor_hidden {
            ansi::cursor_hide(&mut buf)?;
            self.cursor_hidden = true;
        }

        let output = format!("{text}\n");
        if output == self.previous_output {
            return out.write_all(&buf);
        }

        ansi::erase_lines(&mut buf, self.previous_line_count)?;
        buf.extend_from_slice(output.as_bytes());
        out.write_all(&buf)?;

        self.previous_line_count = output.split('\n').count();
        self.previous_output = output;
        Ok(())
    }

    fn clear(&mut self, out: &mut dyn Write) -> io::Result<()> {
        let mut buf = Vec::new();
        ansi::erase_lines(&mut buf, self.previous_line_count)?;
        out.write_all(&buf)?;
        self.previous_output.clear();
        self.previous_line_count = 0;
        Ok(())
    }

    fn done(&mut self, out: &mut dyn Write) -> io::Result<()> {
        self.previous_output.clear();
        self.previous_line_count = 0;
        if !self.show_cursor {
            let mut buf = Vec::new();
            ansi::cursor_show(&mut buf)?;
            out.write_all(&buf)?;
            self.cursor_hidden = false;
        }
        Ok(())
    }

    fn update_line_count(&mut self, text: &str) {
        self.previous_line_count = text.split('\n').count();
        text.clone_into(&mut self.previous_output);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
