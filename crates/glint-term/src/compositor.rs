// SPDX-License-Identifier: MIT
//
// Compositor — turns positioned, styled text fragments into one frame.
//
// The layout side walks its tree and records operations in paint order:
//
//   write(x, y, text, transformers)   paint styled text at a position
//   push_clip(clip) / pop_clip()      nest clip regions (overflow: hidden)
//
// `get()` replays them onto a fresh grid of `StyledChar`s and serializes the
// grid into the string the scheduler writes to the terminal.
//
// Design:
//
//   - Operations are recorded, not applied. Nothing is painted until
//     `get()`, which consumes the list. The caller may emit clips and writes
//     in any order its tree walk produces.
//
//   - Clips are inclusive cell rectangles; each bound is optional. Only the
//     innermost clip applies to a write. Horizontal clipping cuts styled
//     text by display column (`slice_ansi`), so styles and wide characters
//     survive the cut.
//
//   - Transformers run per line after clipping. One of them may mark the
//     destination row as part of the interactive prompt; the serializer
//     wraps runs of prompt rows in the caller-supplied boundary strings
//     (OSC 133 markers in practice).
//
//   - Two memo tables persist across frames: text → cells, and row cells →
//     row string. Frames in a live UI repeat almost every line, so both hit
//     constantly. They are bounded and simply dropped when full.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug_span, trace, warn};

use crate::cell::StyledChar;
use crate::styled::{slice_ansi, string_width, styled_chars, styled_chars_to_string, widest_line};

/// Entries kept in each memo table before it is cleared.
const CACHE_LIMIT: usize = 4096;

// ─── Clip ───────────────────────────────────────────────────────────────────

/// A clip region in cell coordinates.
///
/// Bounds are inclusive. A missing bound leaves that side unbounded, so
/// `Clip { x1: Some(1), x2: Some(1), ..Clip::default() }` admits exactly
/// column 1 on every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Clip {
    pub x1: Option<i32>,
    pub x2: Option<i32>,
    pub y1: Option<i32>,
    pub y2: Option<i32>,
}

impl Clip {
    /// Columns `x1..=x2`, all rows.
    #[must_use]
    pub const fn columns(x1: i32, x2: i32) -> Self {
        Self {
            x1: Some(x1),
            x2: Some(x2),
            y1: None,
            y2: None,
        }
    }

    /// Rows `y1..=y2`, all columns.
    #[must_use]
    pub const fn rows(y1: i32, y2: i32) -> Self {
        Self {
            x1: None,
            x2: None,
            y1: Some(y1),
            y2: Some(y2),
        }
    }

    /// The rectangle `(x1, y1)..=(x2, y2)`.
    #[must_use]
    pub const fn rect(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1: Some(x1),
            x2: Some(x2),
            y1: Some(y1),
            y2: Some(y2),
        }
    }

    /// Whether a `width × height` box at `(x, y)` overlaps this clip.
    #[must_use]
    pub fn intersects(&self, x: i32, y: i32, width: i32, height: i32) -> bool {
        let left_of = self.x1.is_some_and(|x1| x + width <= x1);
        let right_of = self.x2.is_some_and(|x2| x > x2);
        let above = self.y1.is_some_and(|y1| y + height <= y1);
        let below = self.y2.is_some_and(|y2| y > y2);
        !(left_of || right_of || above || below)
    }

    const fn clips_horizontally(&self) -> bool {
        self.x1.is_some() || self.x2.is_some()
    }

    const fn clips_vertically(&self) -> bool {
        self.y1.is_some() || self.y2.is_some()
    }
}

// ─── Transformers ───────────────────────────────────────────────────────────

/// What a transformer made of one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformed {
    /// The rewritten line.
    Plain(String),
    /// The rewritten line, plus whether its row belongs to the prompt.
    Marked { line: String, is_prompt: bool },
}

impl Transformed {
    /// The line, and whether it marks a prompt row.
    #[must_use]
    pub fn into_parts(self) -> (String, bool) {
        match self {
            Self::Plain(line) => (line, false),
            Self::Marked { line, is_prompt } => (line, is_prompt),
        }
    }
}

/// Per-line text rewriting attached to a write (coloring, prompt marking).
///
/// Receives the line after clipping and its index among the surviving
/// lines. Any `Fn(&str, usize) -> Transformed` is a transformer.
pub trait Transformer {
    fn transform(&self, line: &str, index: usize) -> Transformed;
}

impl<F> Transformer for F
where
    F: Fn(&str, usize) -> Transformed,
{
    fn transform(&self, line: &str, index: usize) -> Transformed {
        self(line, index)
    }
}

// ─── Operations ─────────────────────────────────────────────────────────────

enum Operation {
    Write {
        x: i32,
        y: i32,
        text: String,
        transformers: Vec<Rc<dyn Transformer>>,
    },
    PushClip(Clip),
    PopClip,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write {
                x,
                y,
                text,
                transformers,
            } => f
                .debug_struct("Write")
                .field("x", x)
                .field("y", y)
                .field("text", text)
                .field("transformers", &transformers.len())
                .finish(),
            Self::PushClip(clip) => f.debug_tuple("PushClip").field(clip).finish(),
            Self::PopClip => f.write_str("PopClip"),
        }
    }
}

// ─── Frame ──────────────────────────────────────────────────────────────────

/// The serialized result of one composite pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The frame as written to the terminal. Rows are joined by `\n`.
    pub output: String,
    /// Grid rows, including a trailing blank row that was not serialized.
    pub height: usize,
    lines: usize,
}

impl Frame {
    /// Rows actually present in `output`.
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.lines
    }
}

// ─── Compositor ─────────────────────────────────────────────────────────────

/// Records paint operations and composites them into a [`Frame`].
#[derive(Debug)]
pub struct Compositor {
    width: usize,
    height: usize,
    prompt_start: String,
    prompt_end: String,
    operations: Vec<Operation>,
    char_cache: HashMap<String, Vec<StyledChar>>,
    row_cache: HashMap<Vec<StyledChar>, String>,
}

impl Compositor {
    /// A compositor for a `width × height` grid with no prompt markers.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            prompt_start: String::new(),
            prompt_end: String::new(),
            operations: Vec::new(),
            char_cache: HashMap::new(),
            row_cache: HashMap::new(),
        }
    }

    /// Strings spliced in where a run of prompt rows begins and ends.
    #[must_use]
    pub fn with_prompt_markers(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.set_prompt_markers(start, end);
        self
    }

    pub fn set_prompt_markers(&mut self, start: impl Into<String>, end: impl Into<String>) {
        self.prompt_start = start.into();
        self.prompt_end = end.into();
    }

    /// Change the grid size for the next pass. Caches are kept.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Paint `text` with its top-left corner at `(x, y)`.
    ///
    /// Coordinates may lie outside the grid; whatever falls outside is
    /// dropped. Empty text is ignored.
    pub fn write(
        &mut self,
        x: i32,
        y: i32,
        text: impl Into<String>,
        transformers: &[Rc<dyn Transformer>],
    ) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.operations.push(Operation::Write {
            x,
            y,
            text,
            transformers: transformers.to_vec(),
        });
    }

    /// Restrict later writes to `clip` until the matching [`pop_clip`].
    ///
    /// [`pop_clip`]: Self::pop_clip
    pub fn push_clip(&mut self, clip: Clip) {
        self.operations.push(Operation::PushClip(clip));
    }

    /// Drop the innermost clip.
    ///
    /// A pop without a matching push does nothing (it is logged at `warn`
    /// when the operations are replayed).
    pub fn pop_clip(&mut self) {
        self.operations.push(Operation::PopClip);
    }

    /// Composite every recorded operation and serialize the grid.
    ///
    /// Consumes the operation list: the next pass starts empty.
    pub fn get(&mut self) -> Frame {
        let _span = debug_span!(
            "composite",
            width = self.width,
            height = self.height,
            ops = self.operations.len()
        )
        .entered();

        let mut grid = vec![vec![StyledChar::blank(); self.width]; self.height];
        let mut prompt_rows = vec![false; self.height];
        let mut clips: Vec<Clip> = Vec::new();

        for op in std::mem::take(&mut self.operations) {
            match op {
                Operation::PushClip(clip) => clips.push(clip),
                Operation::PopClip => {
                    if clips.pop().is_none() {
                        warn!("pop_clip without a matching push_clip; ignored");
                    }
                }
                Operation::Write {
                    x,
                    y,
                    text,
                    transformers,
                } => self.paint(
                    &mut grid,
                    &mut prompt_rows,
                    clips.last(),
                    (x, y),
                    &text,
                    &transformers,
                ),
            }
        }

        self.serialize(&grid, &prompt_rows)
    }

    // ─── Painting ──────────────────────────────────────────────────────────

    fn paint(
        &mut self,
        grid: &mut [Vec<StyledChar>],
        prompt_rows: &mut [bool],
        clip: Option<&Clip>,
        (mut x, mut y): (i32, i32),
        text: &str,
        transformers: &[Rc<dyn Transformer>],
    ) {
        let mut lines: Vec<String> = text.split('\n').map(str::to_owned).collect();

        if let Some(clip) = clip {
            let width = to_i32(widest_line(text));
            let height = to_i32(lines.len());
            if !clip.intersects(x, y, width, height) {
                trace!(x, y, width, height, "write outside clip; skipped");
                return;
            }

            if clip.clips_horizontally() {
                let from = clip.x1.map_or(0, |x1| (x1 - x).max(0));
                for line in &mut lines {
                    let line_width = to_i32(string_width(line));
                    let to = clip.x2.map_or(line_width, |x2| (x2 + 1 - x).min(line_width));
                    *line = if to <= from {
                        String::new()
                    } else {
                        slice_ansi(line, to_usize(from), to_usize(to))
                    };
                }
                if let Some(x1) = clip.x1 {
                    x = x.max(x1);
                }
            }

            if clip.clips_vertically() {
                let from = clip.y1.map_or(0, |y1| (y1 - y).max(0));
                let to = clip.y2.map_or(height, |y2| (y2 + 1 - y).min(height));
                lines = if to <= from {
                    Vec::new()
                } else {
                    lines.drain(to_usize(from)..to_usize(to)).collect()
                };
                if let Some(y1) = clip.y1 {
                    y = y.max(y1);
                }
            }
        }

        for (index, line) in lines.into_iter().enumerate() {
            let Some(row) = grid_index(y + to_i32(index), self.height) else {
                continue;
            };

            let mut line = line;
            for transformer in transformers {
                let (next, is_prompt) = transformer.transform(&line, index).into_parts();
                if is_prompt {
                    prompt_rows[row] = true;
                }
                line = next;
            }

            if self.char_cache.len() >= CACHE_LIMIT && !self.char_cache.contains_key(&line) {
                self.char_cache.clear();
            }
            let cells = self
                .char_cache
                .entry(line)
                .or_insert_with_key(|line| styled_chars(line));

            let target = &mut grid[row];
            let mut col = x;
            for cell in cells.iter() {
                if cell.full_width {
                    put_wide(target, col, cell);
                } else {
                    put(target, col, cell.clone());
                }
                col += to_i32(cell.columns());
            }
        }
    }

    // ─── Serialization ─────────────────────────────────────────────────────

    fn serialize(&mut self, grid: &[Vec<StyledChar>], prompt_rows: &[bool]) -> Frame {
        let mut output = String::new();
        let mut in_prompt = false;
        let mut lines = 0;
        let last = grid.len().saturating_sub(1);

        for (i, row) in grid.iter().enumerate() {
            if i == last && row.iter().all(StyledChar::is_space) {
                continue;
            }

            if !in_prompt && prompt_rows[i] {
                output.push_str(&self.prompt_start);
                in_prompt = true;
            }
            if in_prompt && !prompt_rows[i] {
                output.push_str(&self.prompt_end);
                in_prompt = false;
            }

            output.push_str(&self.row_string(row));
            if i < last {
                output.push('\n');
            }
            lines += 1;
        }

        if in_prompt {
            output.push_str(&self.prompt_end);
        }

        trace!(lines, bytes = output.len(), "frame serialized");
        Frame {
            output,
            height: grid.len(),
            lines,
        }
    }

    /// One row as a string, trailing unstyled blanks trimmed.
    fn row_string(&mut self, row: &[StyledChar]) -> String {
        let end = row
            .iter()
            .rposition(|c| !c.is_plain_blank())
            .map_or(0, |i| i + 1);
        let row = &row[..end];

        if let Some(s) = self.row_cache.get(row) {
            return s.clone();
        }
        if self.row_cache.len() >= CACHE_LIMIT {
            self.row_cache.clear();
        }
        let s = styled_chars_to_string(row);
        self.row_cache.insert(row.to_vec(), s.clone());
        s
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Grid coordinates are tiny; saturate rather than wrap on absurd input.
fn to_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Callers only pass non-negative values.
fn to_usize(n: i32) -> usize {
    usize::try_from(n).unwrap_or(0)
}

/// Index of a row or column inside `0..len`.
fn grid_index(n: i32, len: usize) -> Option<usize> {
    usize::try_from(n).ok().filter(|&i| i < len)
}

fn put(row: &mut [StyledChar], col: i32, cell: StyledChar) {
    if let Some(i) = grid_index(col, row.len()) {
        break_wide_char_at(row, i);
        row[i] = cell;
    }
}

/// Paint a double-width cell and its continuation.
///
/// When only one of the two columns lies inside the row, that column gets a
/// space instead: half a glyph is garbage in every terminal, and a glyph in
/// the last column would wrap the row.
fn put_wide(row: &mut [StyledChar], col: i32, cell: &StyledChar) {
    let space = || StyledChar::new(" ", false, cell.style);
    match (grid_index(col, row.len()), grid_index(col + 1, row.len())) {
        (Some(_), Some(_)) => {
            put(row, col, cell.clone());
            put(row, col + 1, StyledChar::continuation(cell.style));
        }
        (Some(_), None) => put(row, col, space()),
        (None, Some(_)) => put(row, col + 1, space()),
        (None, None) => {}
    }
}

/// Break any wide glyph touching column `i` before it is overwritten.
///
/// - On a continuation cell, the owning glyph at `i - 1` becomes a space.
/// - On a glyph start, its continuation at `i + 1` becomes blank.
fn break_wide_char_at(row: &mut [StyledChar], i: usize) {
    if row[i].is_continuation() && i > 0 {
        let style = row[i - 1].style;
        row[i - 1] = StyledChar::new(" ", false, style);
    }
    if row.get(i + 1).is_some_and(StyledChar::is_continuation) {
        row[i + 1] = StyledChar::blank();
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Style;
    use crate::color::CellColor;
    use crate::styled::paint;
    use pretty_assertions::assert_eq;

    fn upper() -> Rc<dyn Transformer> {
        Rc::new(|line: &str, _: usize| Transformed::Plain(line.to_uppercase()))
    }

    fn prompt() -> Rc<dyn Transformer> {
        Rc::new(|line: &str, _: usize| Transformed::Marked {
            line: line.to_owned(),
            is_prompt: true,
        })
    }

    // ── Basics ──────────────────────────────────────────────────────────

    #[test]
    fn write_fills_grid() {
        let mut c = Compositor::new(2, 1);
        c.write(0, 0, "ab", &[]);
        let frame = c.get();
        assert_eq!(frame.output, "ab");
        assert_eq!(frame.height, 1);
        assert_eq!(frame.line_count(), 1);
    }

    #[test]
    fn empty_write_is_ignored() {
        let mut c = Compositor::new(3, 1);
        c.write(0, 0, "", &[]);
        assert!(c.operations.is_empty());
        assert_eq!(c.get().output, "");
    }

    #[test]
    fn later_write_wins() {
        let mut c = Compositor::new(3, 1);
        c.write(0, 0, "abc", &[]);
        c.write(1, 0, "X", &[]);
        assert_eq!(c.get().output, "aXc");
    }

    #[test]
    fn multiline_write() {
        let mut c = Compositor::new(4, 3);
        c.write(1, 0, "ab\ncd\nef", &[]);
        assert_eq!(c.get().output, " ab\n cd\n ef");
    }

    #[test]
    fn trailing_blanks_are_trimmed() {
        let mut c = Compositor::new(10, 2);
        c.write(0, 0, "hi", &[]);
        c.write(0, 1, "x", &[]);
        assert_eq!(c.get().output, "hi\nx");
    }

    #[test]
    fn styled_trailing_blank_is_kept() {
        let mut c = Compositor::new(4, 1);
        let style = Style::PLAIN.with_bg(CellColor::Ansi256(4));
        c.write(0, 0, format!("a{}", paint(" ", style)), &[]);
        assert_eq!(c.get().output, "a\x1b[44m \x1b[0m");
    }

    #[test]
    fn last_blank_row_is_skipped_but_counted() {
        let mut c = Compositor::new(3, 2);
        c.write(0, 0, "ab", &[]);
        let frame = c.get();
        assert_eq!(frame.output, "ab\n");
        assert_eq!(frame.height, 2);
        assert_eq!(frame.line_count(), 1);
    }

    #[test]
    fn blank_rows_in_the_middle_are_kept() {
        let mut c = Compositor::new(3, 3);
        c.write(0, 0, "a", &[]);
        c.write(0, 2, "b", &[]);
        assert_eq!(c.get().output, "a\n\nb");
    }

    #[test]
    fn get_resets_operations() {
        let mut c = Compositor::new(3, 1);
        c.write(0, 0, "abc", &[]);
        assert_eq!(c.get().output, "abc");
        assert_eq!(c.get().output, "");
    }

    #[test]
    fn out_of_bounds_writes_are_dropped() {
        let mut c = Compositor::new(3, 2);
        c.write(0, -1, "top\nmid", &[]);
        c.write(-1, 1, "abcd", &[]);
        c.write(0, 5, "zzz", &[]);
        assert_eq!(c.get().output, "mid\nbcd");
    }

    #[test]
    fn zero_sized_grid() {
        let mut c = Compositor::new(0, 0);
        c.write(0, 0, "abc", &[]);
        let frame = c.get();
        assert_eq!(frame.output, "");
        assert_eq!(frame.height, 0);
    }

    // ── Wide characters ─────────────────────────────────────────────────

    #[test]
    fn wide_char_blanks_next_column() {
        let mut c = Compositor::new(4, 1);
        c.write(0, 0, "abcd", &[]);
        c.write(1, 0, "語", &[]);
        assert_eq!(c.get().output, "a語d");
    }

    #[test]
    fn overwriting_wide_start_clears_its_continuation() {
        let mut c = Compositor::new(3, 1);
        c.write(0, 0, "語b", &[]);
        c.write(0, 0, "x", &[]);
        let out = c.get().output;
        assert_eq!(out, "x b");
        assert_eq!(string_width(&out), 3);
    }

    #[test]
    fn overwriting_continuation_breaks_the_owner() {
        let mut c = Compositor::new(3, 1);
        c.write(0, 0, "語", &[]);
        c.write(1, 0, "x", &[]);
        assert_eq!(c.get().output, " x");
    }

    #[test]
    fn wide_glyph_overlapping_wide_glyph() {
        let mut c = Compositor::new(4, 1);
        c.write(0, 0, "語語", &[]);
        c.write(1, 0, "本", &[]);
        let out = c.get().output;
        // The broken halves become spaces; the trailing one is trimmed.
        assert_eq!(out, " 本");
        assert_eq!(string_width(&out), 3);
    }

    #[test]
    fn wide_char_in_last_column_becomes_space() {
        let mut c = Compositor::new(3, 1);
        c.write(0, 0, "ab語", &[]);
        let out = c.get().output;
        assert_eq!(out, "ab");
        assert!(string_width(&out) <= 3);
    }

    #[test]
    fn wide_char_half_off_left_edge_becomes_space() {
        let mut c = Compositor::new(3, 1);
        c.write(-1, 0, "語x", &[]);
        assert_eq!(c.get().output, " x");
    }

    #[test]
    fn styled_wide_char_at_edge_keeps_width() {
        let style = Style::PLAIN.with_bg(CellColor::Ansi256(1));
        let mut c = Compositor::new(2, 1);
        c.write(1, 0, paint("語", style), &[]);
        let out = c.get().output;
        assert_eq!(string_width(&out), 2);
        assert!(!out.contains('語'));
    }

    // ── Clipping ────────────────────────────────────────────────────────

    #[test]
    fn clip_single_column() {
        let mut c = Compositor::new(3, 1);
        c.push_clip(Clip::columns(1, 1));
        c.write(0, 0, "abc", &[]);
        c.pop_clip();
        assert_eq!(c.get().output, " b");
    }

    #[test]
    fn clip_rows() {
        let mut c = Compositor::new(3, 4);
        c.push_clip(Clip::rows(1, 2));
        c.write(0, 0, "a\nb\nc\nd", &[]);
        c.pop_clip();
        assert_eq!(c.get().output, "\nb\nc\n");
    }

    #[test]
    fn clip_rect_shifts_origin() {
        let mut c = Compositor::new(5, 3);
        c.push_clip(Clip::rect(1, 1, 3, 1));
        c.write(0, 0, "01234\n56789\nabcde", &[]);
        c.pop_clip();
        assert_eq!(c.get().output, "\n 678\n");
    }

    #[test]
    fn clip_rejects_disjoint_write() {
        let mut c = Compositor::new(10, 1);
        c.push_clip(Clip::columns(5, 9));
        c.write(0, 0, "abc", &[]);
        c.write(10, 0, "z", &[]);
        c.pop_clip();
        assert_eq!(c.get().output, "");
    }

    #[test]
    fn one_sided_clip() {
        let mut c = Compositor::new(6, 1);
        c.push_clip(Clip {
            x1: Some(2),
            ..Clip::default()
        });
        c.write(0, 0, "abcdef", &[]);
        c.pop_clip();
        assert_eq!(c.get().output, "  cdef");
    }

    #[test]
    fn innermost_clip_applies() {
        let mut c = Compositor::new(6, 1);
        c.push_clip(Clip::columns(0, 5));
        c.push_clip(Clip::columns(4, 5));
        c.write(0, 0, "abcdef", &[]);
        c.pop_clip();
        c.write(0, 0, "xy", &[]);
        c.pop_clip();
        assert_eq!(c.get().output, "xy  ef");
    }

    #[test]
    fn clip_keeps_styles() {
        let mut c = Compositor::new(4, 1);
        let red = Style::PLAIN.with_fg(CellColor::Ansi256(1));
        c.push_clip(Clip::columns(1, 2));
        c.write(0, 0, paint("abcd", red), &[]);
        c.pop_clip();
        assert_eq!(c.get().output, " \x1b[31mbc\x1b[0m");
    }

    #[test]
    fn unmatched_pop_is_a_no_op() {
        let mut c = Compositor::new(3, 1);
        c.pop_clip();
        c.write(0, 0, "abc", &[]);
        assert_eq!(c.get().output, "abc");
    }

    #[test]
    fn clips_left_open_are_discarded() {
        let mut c = Compositor::new(3, 1);
        c.push_clip(Clip::columns(0, 0));
        c.write(0, 0, "abc", &[]);
        assert_eq!(c.get().output, "a");
        c.write(0, 0, "abc", &[]);
        assert_eq!(c.get().output, "abc");
    }

    // ── Transformers ────────────────────────────────────────────────────

    #[test]
    fn transformers_apply_in_order() {
        let mut c = Compositor::new(5, 1);
        let exclaim: Rc<dyn Transformer> =
            Rc::new(|line: &str, _: usize| Transformed::Plain(format!("{line}!")));
        c.write(0, 0, "hey", &[upper(), exclaim]);
        assert_eq!(c.get().output, "HEY!");
    }

    #[test]
    fn transformer_sees_post_clip_index() {
        let mut c = Compositor::new(3, 3);
        let number: Rc<dyn Transformer> =
            Rc::new(|_: &str, i: usize| Transformed::Plain(i.to_string()));
        c.push_clip(Clip::rows(1, 2));
        c.write(0, 0, "a\nb\nc", &[number]);
        c.pop_clip();
        assert_eq!(c.get().output, "\n0\n1");
    }

    #[test]
    fn prompt_rows_get_markers() {
        let mut c = Compositor::new(3, 4).with_prompt_markers("<", ">");
        c.write(0, 0, "a", &[]);
        c.write(0, 1, "b\nc", &[prompt()]);
        c.write(0, 3, "d", &[]);
        assert_eq!(c.get().output, "a\n<b\nc\n>d");
    }

    #[test]
    fn prompt_region_closed_at_end() {
        let mut c = Compositor::new(3, 2).with_prompt_markers("<", ">");
        c.write(0, 0, "a", &[]);
        c.write(0, 1, "b", &[prompt()]);
        assert_eq!(c.get().output, "a\n<b>");
    }

    #[test]
    fn prompt_mark_survives_overwrite() {
        let mut c = Compositor::new(3, 1).with_prompt_markers("<", ">");
        c.write(0, 0, "abc", &[prompt()]);
        c.write(0, 0, "x", &[]);
        assert_eq!(c.get().output, "<xbc>");
    }

    #[test]
    fn marked_false_is_not_prompt() {
        let mut c = Compositor::new(3, 1).with_prompt_markers("<", ">");
        let t: Rc<dyn Transformer> = Rc::new(|line: &str, _: usize| Transformed::Marked {
            line: line.to_owned(),
            is_prompt: false,
        });
        c.write(0, 0, "a", &[t]);
        assert_eq!(c.get().output, "a");
    }

    // ── Caches ──────────────────────────────────────────────────────────

    #[test]
    fn caches_fill_and_reuse() {
        let mut c = Compositor::new(3, 2);
        c.write(0, 0, "ab", &[]);
        c.write(0, 1, "ab", &[]);
        let first = c.get();
        assert_eq!(c.char_cache.len(), 1);
        assert_eq!(c.row_cache.len(), 1);

        c.write(0, 0, "ab", &[]);
        c.write(0, 1, "ab", &[]);
        assert_eq!(c.get(), first);
        assert_eq!(c.char_cache.len(), 1);
    }

    #[test]
    fn resize_changes_grid() {
        let mut c = Compositor::new(2, 1);
        c.resize(4, 1);
        c.write(0, 0, "abcd", &[]);
        assert_eq!(c.get().output, "abcd");
        assert_eq!((c.width(), c.height()), (4, 1));
    }
}
