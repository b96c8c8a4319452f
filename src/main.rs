// SPDX-License-Identifier: MIT
//
// glint — a small inline prompt built on glint-term.
//
// This binary exercises the whole pipeline:
//
//   stdin → reader → decoder → on_key → prompt state
//   render → compositor → scheduler → terminal
//
// Submitted lines become static output: they are written once above the
// live region and scroll away like ordinary terminal output. The live
// region is three rows:
//
//   ┌──────────────────────────────┐
//   │ hint (dim)                   │
//   │ > input                      │  ← prompt row (OSC 133 marked)
//   │ last key · paste count       │
//   └──────────────────────────────┘
//
// Logging: set GLINT_LOG to a file path to get a tracing log there
// (filtered by RUST_LOG, `debug` for glint crates by default). stdout and
// stderr belong to the UI, so without GLINT_LOG nothing is logged.

use std::env;
use std::fs::File;
use std::process;
use std::rc::Rc;
use std::sync::Arc;

use glint_term::cell::{Attr, Style};
use glint_term::color::CellColor;
use glint_term::event_loop::{Action, App, EventLoop};
use glint_term::keys::ParsedKey;
use glint_term::scheduler::{FrameSource, RenderContext, RenderOptions, RenderOutput};
use glint_term::styled::{paint, string_width};
use glint_term::{Clip, Compositor, Transformed, Transformer};
use tracing::{debug, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const HINT: &str = "glint: type, paste, Enter to submit, Ctrl+C to quit";

/// Rows in the live region.
const HEIGHT: usize = 3;

/// Column where the input text starts (after "> ").
const INPUT_X: i32 = 2;

// ─── Prompt ─────────────────────────────────────────────────────────────────

struct Prompt {
    compositor: Compositor,
    input: String,
    /// Submitted lines not yet handed to the scheduler.
    pending_static: String,
    submitted: usize,
    pastes: usize,
    last_key: String,
}

impl Prompt {
    fn new() -> Self {
        Self {
            compositor: Compositor::new(0, HEIGHT),
            input: String::new(),
            pending_static: String::new(),
            submitted: 0,
            pastes: 0,
            last_key: String::new(),
        }
    }

    fn submit(&mut self) {
        if self.input.is_empty() {
            return;
        }
        let you = paint("you", Style::PLAIN.with_fg(CellColor::Ansi256(4)));
        self.pending_static.push_str(&format!("{you}: {}\n", self.input));
        self.input.clear();
        self.submitted += 1;
        debug!(submitted = self.submitted, "line submitted");
    }

    fn describe(key: &ParsedKey) -> String {
        if key.is_pasted {
            return format!("paste ({} bytes)", key.sequence.len());
        }
        let mut s = String::new();
        for (on, name) in [
            (key.ctrl, "ctrl+"),
            (key.meta, "meta+"),
            (key.option, "option+"),
            (key.shift, "shift+"),
        ] {
            if on {
                s.push_str(name);
            }
        }
        if key.name.is_empty() {
            s.push_str(&format!("{:?}", key.sequence));
        } else {
            s.push_str(&key.name);
        }
        s
    }
}

/// Printable text only: pastes may carry newlines or escapes.
fn printable(s: &str) -> String {
    s.chars()
        .map(|c| if c == '\n' || c == '\t' { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect()
}

fn to_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

impl FrameSource for Prompt {
    fn render(&mut self, ctx: &RenderContext) -> glint_term::Result<RenderOutput> {
        let width = ctx.width.max(1);
        let c = &mut self.compositor;
        c.resize(width, HEIGHT);
        c.set_prompt_markers(ctx.prompt_start.as_str(), ctx.prompt_end.as_str());

        let mark_prompt: Rc<dyn Transformer> =
            Rc::new(|line: &str, _: usize| Transformed::Marked {
                line: line.to_owned(),
                is_prompt: true,
            });

        c.write(0, 0, paint(HINT, Style::PLAIN.with_attrs(Attr::DIM)), &[]);

        let caret = Style::PLAIN
            .with_fg(CellColor::Ansi256(2))
            .with_attrs(Attr::BOLD);
        c.write(0, 1, paint(">", caret), &[Rc::clone(&mark_prompt)]);

        // Keep the end of long input visible: shift it left under a clip.
        let overflow = to_i32(string_width(&self.input)) - (to_i32(width) - INPUT_X);
        c.push_clip(Clip::columns(INPUT_X, to_i32(width) - 1));
        c.write(INPUT_X - overflow.max(0), 1, self.input.as_str(), &[mark_prompt]);
        c.pop_clip();

        let status = format!(
            "{}  pastes: {}",
            if self.last_key.is_empty() {
                "no keys yet"
            } else {
                &self.last_key
            },
            self.pastes
        );
        c.write(0, 2, paint(&status, Style::PLAIN.with_fg(CellColor::Ansi256(6))), &[]);

        let frame = c.get();
        Ok(RenderOutput::from(frame).with_static(std::mem::take(&mut self.pending_static)))
    }
}

impl App for Prompt {
    fn on_key(&mut self, key: &ParsedKey) -> Action {
        self.last_key = Self::describe(key);

        if key.is_pasted {
            self.pastes += 1;
            self.input.push_str(&printable(&key.sequence));
            return Action::Render;
        }

        match key.name.as_str() {
            "return" | "enter" => self.submit(),
            "backspace" => {
                self.input.pop();
            }
            "d" if key.ctrl => return Action::Quit,
            // Named keys with escape sequences (arrows, f-keys) are not text.
            _ if !key.ctrl && !key.meta && !key.sequence.starts_with('\x1b') => {
                self.input.push_str(&printable(&key.sequence));
            }
            _ => {}
        }
        Action::Render
    }
}

// ─── Logging ────────────────────────────────────────────────────────────────

/// Log to the file named by `GLINT_LOG`, if set.
fn init_tracing() {
    let Some(path) = env::var_os("GLINT_LOG") else {
        return;
    };
    let file = match File::create(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("glint: cannot open log file: {e}");
            return;
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("glint=debug,glint_term=debug"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        .with(filter)
        .init();
}

// ─── Entry point ────────────────────────────────────────────────────────────

fn main() {
    init_tracing();

    let options = RenderOptions {
        prompt_markers: true,
        ..RenderOptions::from_env()
    };
    info!(?options, "starting");

    match EventLoop::new().run(Prompt::new(), options) {
        Ok(prompt) => {
            info!(submitted = prompt.submitted, "exited");
        }
        Err(e) => {
            eprintln!("glint: {e}");
            process::exit(1);
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
