// SPDX-License-Identifier: MIT
//
// glint-term — the terminal I/O core of an inline, declarative TUI renderer.
//
// Two directions:
//
//   in:  raw bytes from the terminal → ordered key and paste events
//        (`input`, `keys`, `reader`)
//   out: positioned, styled text fragments → one ANSI frame string, written
//        with as little redraw and flicker as the situation allows
//        (`compositor`, `styled`, `cell`, `color`, `scheduler`, `throttle`,
//        `log_update`)
//
// `terminal`, `ansi` and `event_loop` are the glue: raw mode, literal
// control sequences, and the single-threaded loop that runs an `App`.
//
// Rendering is inline. No alternate screen: frames are drawn below the
// shell prompt, finished output scrolls into the scrollback like any other
// program's, and only the live region at the bottom is ever rewritten.
// Layout is not done here; callers hand the compositor absolute positions.

pub mod ansi;
pub mod cell;
pub mod color;
pub mod compositor;
pub mod error;
pub mod event_loop;
pub mod input;
pub mod keys;
pub mod log_update;
pub mod reader;
pub mod scheduler;
pub mod styled;
pub mod terminal;
pub mod throttle;

pub use compositor::{Clip, Compositor, Frame, Transformed, Transformer};
pub use error::{Error, Result};
pub use input::{Decoder, KeyParseState, ParseMode, decode};
pub use keys::ParsedKey;
pub use scheduler::{
    ExitSignal, FrameSource, RenderContext, RenderOptions, RenderOutput, Scheduler,
};
