// SPDX-License-Identifier: MIT
//
// Render scheduler — decides when and how a frame reaches the terminal.
//
// The scheduler owns the output streams for the lifetime of a mount. Each
// render pass asks the frame source for the current frame (plus any new
// permanent "static" lines), compares it with what is on screen, and picks
// one strategy:
//
//   - full rewrite: the terminal was resized, or this frame or the last one
//     is at least as tall as the screen (the line primitive can no longer
//     reach the top of it). Clear everything, replay the whole static log,
//     write the frame.
//   - static append: erase the dynamic frame, write the new static lines
//     above it, write the frame again.
//   - replace: erase the dynamic frame, write the new one.
//   - skip: nothing changed.
//
// Writes of one pass are gathered into a single buffer and bracketed with
// synchronized-update markers, so the terminal paints each frame at once.
// A pass that changes nothing writes nothing at all.
//
// Two special modes bypass the strategy table. Debug mode writes the whole
// static log plus the frame on every pass, unthrottled, and never erases.
// Non-interactive mode (CI logs, pipes) writes static lines as they come,
// only remembers the dynamic frame, and prints the last one at unmount.
//
// Recomputation and dynamic writes are throttled (leading + trailing). The
// scheduler never sleeps or spawns timers: the caller's loop asks for
// `next_deadline()` and calls `poll()` when it passes.
//
// Lifecycle: Mounted → Unmounting → Unmounted. Unmount renders one last
// time, runs teardown hooks, leaves the cursor below the output, and
// settles the `ExitSignal`. After that every call is a no-op.

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Condvar, LazyLock, Mutex, PoisonError};
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, debug_span, trace, warn};

use crate::ansi;
use crate::compositor::Frame;
use crate::error::{Error, Result};
use crate::log_update::{LineEraser, LogUpdate};
use crate::throttle::Throttle;

/// Width reported to the frame source when the terminal doesn't know.
const FALLBACK_COLUMNS: usize = 80;

static OSC_133: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\]133;[^\x07\x1b]*(?:\x07|\x1b\\)").expect("pattern is valid")
});

/// Remove every OSC 133 marker from `s`.
#[must_use]
pub fn strip_osc133(s: &str) -> Cow<'_, str> {
    OSC_133.replace_all(s, "")
}

// ─── Options ─────────────────────────────────────────────────────────────────

/// Scheduler configuration.
pub struct RenderOptions {
    /// Write every frame in full, unthrottled, never erasing.
    pub debug: bool,
    /// Ctrl+C unmounts. Read by the event loop.
    pub exit_on_ctrl_c: bool,
    /// Emit OSC 133 prompt/command markers.
    pub prompt_markers: bool,
    /// Output goes to a live terminal (as opposed to a CI log or a pipe).
    pub interactive: bool,
    /// Throttle window for recomputing the frame.
    pub render_interval: Duration,
    /// Throttle window for writing the dynamic frame.
    pub write_interval: Duration,
    /// Called whenever a frame too tall for the screen forces a full rewrite.
    pub on_flicker: Option<Box<dyn FnMut()>>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            debug: false,
            exit_on_ctrl_c: true,
            prompt_markers: false,
            interactive: true,
            render_interval: Duration::from_millis(32),
            write_interval: Duration::ZERO,
            on_flicker: None,
        }
    }
}

impl RenderOptions {
    /// Defaults, with `interactive` turned off when running under CI.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            interactive: !is_ci(std::env::vars()),
            ..Self::default()
        }
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("debug", &self.debug)
            .field("exit_on_ctrl_c", &self.exit_on_ctrl_c)
            .field("prompt_markers", &self.prompt_markers)
            .field("interactive", &self.interactive)
            .field("render_interval", &self.render_interval)
            .field("write_interval", &self.write_interval)
            .field("on_flicker", &self.on_flicker.is_some())
            .finish()
    }
}

/// Whether the environment looks like a CI runner.
///
/// `CI=0` and `CI=false` opt out explicitly; otherwise `CI`,
/// `CONTINUOUS_INTEGRATION` or any `CI_*` variable counts.
pub fn is_ci<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> bool
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut detected = false;
    for (key, value) in vars {
        let (key, value) = (key.as_ref(), value.as_ref());
        if key == "CI" && (value == "0" || value == "false") {
            return false;
        }
        if key == "CI" || key == "CONTINUOUS_INTEGRATION" || key.starts_with("CI_") {
            detected = true;
        }
    }
    detected
}

// ─── Frame Source ────────────────────────────────────────────────────────────

/// What the frame source gets to know about the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    /// Columns available.
    pub width: usize,
    /// Written where a prompt region begins. Pass to the compositor.
    pub prompt_start: String,
    /// Written where a prompt region ends.
    pub prompt_end: String,
}

/// One rendered frame plus newly finalized static lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutput {
    /// The dynamic frame.
    pub output: String,
    /// Rows the frame takes.
    pub height: usize,
    /// Lines to append permanently above the frame. Empty (or a lone
    /// `\n`) means nothing new.
    pub static_output: String,
}

impl RenderOutput {
    #[must_use]
    pub fn with_static(mut self, static_output: impl Into<String>) -> Self {
        self.static_output = static_output.into();
        self
    }
}

impl From<Frame> for RenderOutput {
    fn from(frame: Frame) -> Self {
        Self {
            output: frame.output,
            height: frame.height,
            static_output: String::new(),
        }
    }
}

/// Produces frames on demand. Usually wraps a layout pass and a
/// [`Compositor`](crate::compositor::Compositor).
pub trait FrameSource {
    /// # Errors
    ///
    /// Any error unmounts the scheduler and settles its exit signal with it.
    fn render(&mut self, ctx: &RenderContext) -> Result<RenderOutput>;
}

impl<F> FrameSource for F
where
    F: FnMut(&RenderContext) -> Result<RenderOutput>,
{
    fn render(&mut self, ctx: &RenderContext) -> Result<RenderOutput> {
        self(ctx)
    }
}

// ─── Exit Signal ─────────────────────────────────────────────────────────────

/// Settled once when a mount ends: `Ok` on a clean unmount, the error
/// otherwise. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct ExitSignal {
    inner: Arc<(Mutex<Option<Result<()>>>, Condvar)>,
}

impl ExitSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the mount ends.
    ///
    /// # Errors
    ///
    /// Returns the error the mount ended with.
    pub fn wait(&self) -> Result<()> {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let guard = cvar
            .wait_while(guard, |result| result.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.clone().unwrap_or(Ok(()))
    }

    /// The outcome, if the mount has ended.
    #[must_use]
    pub fn try_result(&self) -> Option<Result<()>> {
        let (lock, _) = &*self.inner;
        lock.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Record the outcome. Only the first call has any effect.
    fn settle(&self, result: Result<()>) -> bool {
        let (lock, cvar) = &*self.inner;
        let mut slot = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(result);
        cvar.notify_all();
        true
    }
}

// ─── Markers ─────────────────────────────────────────────────────────────────

/// The four OSC 133 strings for the current mode. All empty when markers
/// are off; debug mode adds region background colors.
#[derive(Debug, Default)]
struct Markers {
    prompt_start: String,
    prompt_end: String,
    command_start: String,
    command_end: String,
}

impl Markers {
    fn new(options: &RenderOptions) -> Self {
        let mut m = if options.prompt_markers && options.interactive {
            Self {
                prompt_start: ansi::PROMPT_START.to_owned(),
                prompt_end: ansi::PROMPT_END.to_owned(),
                command_start: ansi::COMMAND_START.to_owned(),
                command_end: ansi::COMMAND_END.to_owned(),
            }
        } else {
            Self::default()
        };

        if options.debug && options.interactive {
            m.prompt_start.push_str(ansi::DEBUG_PROMPT_BG);
            m.prompt_end.insert_str(0, ansi::DEFAULT_BG);
            m.command_start.push_str(ansi::DEBUG_COMMAND_BG);
            m.command_end.insert_str(0, ansi::DEFAULT_BG);
        }
        m
    }

    /// Static lines are written between prompts: close the prompt, open a
    /// command region, write, reopen the prompt.
    fn wrap_static(&self, static_output: &str) -> String {
        format!(
            "{}{}{static_output}{}",
            self.prompt_end, self.command_start, self.prompt_start
        )
    }
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Mounted,
    Unmounting,
    Unmounted,
}

pub struct Scheduler<S, L = LineEraser, W = io::Stdout, E = io::Stderr> {
    source: S,
    log: L,
    stdout: W,
    stderr: E,
    options: RenderOptions,
    markers: Markers,
    columns: usize,
    rows: usize,

    lifecycle: Lifecycle,
    last_output: String,
    last_output_height: usize,
    /// Every static line written so far, wrapped. Replayed by full rewrites.
    full_static_output: String,

    render_throttle: Throttle,
    log_throttle: Throttle,
    pending_log: Option<String>,

    teardown: Vec<Box<dyn FnOnce()>>,
    exit: ExitSignal,
}

impl<S, L, W, E> Scheduler<S, L, W, E>
where
    S: FrameSource,
    L: LogUpdate,
    W: Write,
    E: Write,
{
    /// Take over `stdout` / `stderr` and start a mount.
    ///
    /// `size` is `(columns, rows)`; zero means unknown. Writes the initial
    /// prompt marker when markers are on. Nothing is rendered until the
    /// first [`request_render`](Self::request_render).
    pub fn mount(
        source: S,
        log: L,
        stdout: W,
        stderr: E,
        size: (usize, usize),
        options: RenderOptions,
    ) -> Self {
        let markers = Markers::new(&options);
        let mut scheduler = Self {
            source,
            log,
            stdout,
            stderr,
            render_throttle: Throttle::new(options.render_interval),
            log_throttle: Throttle::new(options.write_interval),
            options,
            markers,
            columns: size.0,
            rows: size.1,
            lifecycle: Lifecycle::Mounted,
            last_output: String::new(),
            last_output_height: 0,
            full_static_output: String::new(),
            pending_log: None,
            teardown: Vec::new(),
            exit: ExitSignal::new(),
        };

        if scheduler.options.prompt_markers && scheduler.options.interactive {
            scheduler.write_raw(ansi::PROMPT_START.as_bytes());
        }
        debug!(
            columns = scheduler.columns,
            rows = scheduler.rows,
            options = ?scheduler.options,
            "mounted"
        );
        scheduler
    }

    // ── Accessors ────────────────────────────────────────────────────

    #[must_use]
    pub const fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    #[must_use]
    pub fn is_unmounted(&self) -> bool {
        self.lifecycle == Lifecycle::Unmounted
    }

    #[must_use]
    pub const fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// A handle that settles when this mount ends.
    #[must_use]
    pub fn exit_signal(&self) -> ExitSignal {
        self.exit.clone()
    }

    /// The dynamic frame as last rendered.
    #[must_use]
    pub fn last_output(&self) -> &str {
        &self.last_output
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    pub const fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Give the frame source back, typically after unmount.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Run `hook` once when the mount ends.
    pub fn on_teardown(&mut self, hook: impl FnOnce() + 'static) {
        self.teardown.push(Box::new(hook));
    }

    // ── Scheduling ───────────────────────────────────────────────────

    /// Ask for a new frame. Runs now unless a render ran within the
    /// throttle window; then it runs once when the window closes.
    pub fn request_render(&mut self, now: Instant) {
        if self.lifecycle != Lifecycle::Mounted {
            return;
        }
        if self.options.debug || self.render_throttle.call(now) {
            self.render_pass(false, now);
        } else {
            trace!("render deferred");
        }
    }

    /// Run whatever throttled work is due at `now`.
    pub fn poll(&mut self, now: Instant) {
        if self.lifecycle != Lifecycle::Mounted {
            return;
        }
        if self.render_throttle.poll(now) {
            self.render_pass(false, now);
        }
        if self.log_throttle.poll(now) {
            if let Some(text) = self.pending_log.take() {
                let mut buf = Vec::new();
                let result = self.log.render(&mut buf, &text);
                self.report(result);
                self.write_frame(&buf);
            }
        }
    }

    /// When [`poll`](Self::poll) next has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (
            self.render_throttle.next_deadline(),
            self.log_throttle.next_deadline(),
        ) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// The terminal changed size: rewrite everything right away.
    ///
    /// Ignored when the output is not interactive.
    pub fn resize(&mut self, columns: usize, rows: usize, now: Instant) {
        if self.lifecycle != Lifecycle::Mounted || !self.options.interactive {
            return;
        }
        debug!(columns, rows, "resized");
        self.columns = columns;
        self.rows = rows;
        self.render_pass(true, now);
    }

    // ── Render Pass ──────────────────────────────────────────────────

    fn context(&self) -> RenderContext {
        let m = &self.markers;
        RenderContext {
            width: if self.columns == 0 {
                FALLBACK_COLUMNS
            } else {
                self.columns
            },
            prompt_start: format!("{}{}", m.command_end, m.prompt_start),
            prompt_end: format!("{}{}", m.prompt_end, m.command_start),
        }
    }

    fn render_pass(&mut self, did_resize: bool, now: Instant) {
        if self.lifecycle == Lifecycle::Unmounted {
            return;
        }
        let _span = debug_span!("render", resize = did_resize).entered();

        let ctx = self.context();
        let rendered = match self.source.render(&ctx) {
            Ok(rendered) => rendered,
            Err(err) => {
                if self.lifecycle == Lifecycle::Mounted {
                    warn!(error = %err, "frame source failed; unmounting");
                    self.unmount(Some(err));
                } else {
                    warn!(error = %err, "frame source failed during unmount");
                }
                return;
            }
        };

        let mut buf = Vec::new();
        let result = self.apply(rendered, did_resize, now, &mut buf);
        self.report(result);
        self.write_frame(&buf);
    }

    /// Pick a strategy for `rendered` and put its bytes in `buf`.
    fn apply(
        &mut self,
        rendered: RenderOutput,
        did_resize: bool,
        now: Instant,
        buf: &mut Vec<u8>,
    ) -> io::Result<()> {
        let RenderOutput {
            output,
            height,
            static_output,
        } = rendered;
        let has_static = !static_output.is_empty() && static_output != "\n";
        let wrapped_static = if has_static {
            self.markers.wrap_static(&static_output)
        } else {
            String::new()
        };

        if self.options.debug {
            self.full_static_output.push_str(&wrapped_static);
            buf.extend_from_slice(self.full_static_output.as_bytes());
            buf.extend_from_slice(output.as_bytes());
            return Ok(());
        }

        if !self.options.interactive {
            buf.extend_from_slice(wrapped_static.as_bytes());
            self.remember(output, height);
            return Ok(());
        }

        self.full_static_output.push_str(&wrapped_static);

        let too_tall =
            self.rows > 0 && (height >= self.rows || self.last_output_height >= self.rows);
        if too_tall || did_resize {
            if too_tall {
                debug!(height, rows = self.rows, "frame fills the screen; full rewrite");
                if let Some(on_flicker) = self.options.on_flicker.as_mut() {
                    on_flicker();
                }
            } else {
                debug!("full rewrite after resize");
            }
            self.write_full(&output, buf);
            self.log.update_line_count(&format!("{output}\n"));
            self.log_throttle.cancel();
            self.pending_log = None;
            self.remember(output, height);
            return Ok(());
        }

        if has_static {
            trace!(bytes = static_output.len(), "static append");
            self.log.clear(buf)?;
            buf.extend_from_slice(wrapped_static.as_bytes());
            self.throttled_log(strip_osc133(&output).into_owned(), now, buf)?;
        } else if output != self.last_output {
            trace!("replace frame");
            self.throttled_log(strip_osc133(&output).into_owned(), now, buf)?;
        } else {
            trace!("frame unchanged");
        }

        self.remember(output, height);
        Ok(())
    }

    fn remember(&mut self, output: String, height: usize) {
        self.last_output = output;
        self.last_output_height = height;
    }

    /// Clear the terminal and replay the static log plus `output`.
    fn write_full(&self, output: &str, buf: &mut Vec<u8>) {
        // The static log ends in prompt state; the clear happens outside it.
        let prompt_end = &self.markers.prompt_end;
        let replay = self
            .full_static_output
            .strip_prefix(prompt_end.as_str())
            .unwrap_or(&self.full_static_output);
        buf.extend_from_slice(prompt_end.as_bytes());
        buf.extend_from_slice(ansi::CLEAR_TERMINAL.as_bytes());
        buf.extend_from_slice(replay.as_bytes());
        buf.extend_from_slice(output.as_bytes());
        buf.push(b'\n');
    }

    fn throttled_log(&mut self, text: String, now: Instant, buf: &mut Vec<u8>) -> io::Result<()> {
        if self.log_throttle.call(now) {
            self.pending_log = None;
            self.log.render(buf, &text)
        } else {
            trace!("write deferred");
            self.pending_log = Some(text);
            Ok(())
        }
    }

    // ── Out-of-band Writes ───────────────────────────────────────────

    /// Write `data` above the dynamic frame without disturbing it.
    pub fn write_to_stdout(&mut self, data: &str) {
        if self.lifecycle != Lifecycle::Mounted {
            return;
        }
        let mut buf = Vec::new();
        if self.options.debug {
            buf.extend_from_slice(data.as_bytes());
            buf.extend_from_slice(self.full_static_output.as_bytes());
            buf.extend_from_slice(self.last_output.as_bytes());
        } else if !self.options.interactive {
            buf.extend_from_slice(data.as_bytes());
        } else {
            let result = self.redraw_around(&mut buf, |buf| {
                buf.extend_from_slice(strip_osc133(data).as_bytes());
            });
            self.report(result);
        }
        self.write_raw(&buf);
    }

    /// Write `data` to stderr above the dynamic frame.
    pub fn write_to_stderr(&mut self, data: &str) {
        if self.lifecycle != Lifecycle::Mounted {
            return;
        }
        if self.options.debug {
            self.write_err(data.as_bytes());
            let mut buf = self.full_static_output.clone().into_bytes();
            buf.extend_from_slice(self.last_output.as_bytes());
            self.write_raw(&buf);
            return;
        }
        if !self.options.interactive {
            self.write_err(data.as_bytes());
            return;
        }

        let mut before = Vec::new();
        let result = self.log.clear(&mut before);
        self.report(result);
        self.write_raw(&before);

        self.write_err(strip_osc133(data).as_bytes());

        let mut after = Vec::new();
        let last = self.last_output.clone();
        let result = self.log.render(&mut after, &last);
        self.pending_log = None;
        self.report(result);
        self.write_raw(&after);
    }

    /// Erase the frame, let `between` write, then put the last frame back.
    fn redraw_around(
        &mut self,
        buf: &mut Vec<u8>,
        between: impl FnOnce(&mut Vec<u8>),
    ) -> io::Result<()> {
        self.log.clear(buf)?;
        between(buf);
        self.pending_log = None;
        let last = self.last_output.clone();
        self.log.render(buf, &last)
    }

    // ── Unmount ──────────────────────────────────────────────────────

    /// End the mount, with `error` if it failed.
    ///
    /// Renders one last time (unthrottled), runs teardown hooks, leaves the
    /// cursor below the output and settles the exit signal. Idempotent.
    pub fn unmount(&mut self, error: Option<Error>) {
        if self.lifecycle != Lifecycle::Mounted {
            return;
        }
        self.lifecycle = Lifecycle::Unmounting;
        let _span = debug_span!("unmount", failed = error.is_some()).entered();

        // A deferred write holds newer content than the screen.
        let mut buf = Vec::new();
        if let Some(text) = self.pending_log.take() {
            let result = self.log.render(&mut buf, &text);
            self.report(result);
        }
        self.write_frame(&buf);

        self.render_throttle.cancel();
        self.log_throttle.cancel();
        self.render_pass(false, Instant::now());

        for hook in self.teardown.drain(..) {
            hook();
        }

        let mut buf = Vec::new();
        if self.options.interactive {
            if !self.options.debug {
                let result = self.log.done(&mut buf);
                self.report(result);
            }
            if self.options.debug {
                buf.extend_from_slice(ansi::DEFAULT_BG.as_bytes());
            }
            if self.options.prompt_markers {
                buf.extend_from_slice(ansi::PROMPT_END.as_bytes());
            }
        } else {
            buf.extend_from_slice(self.last_output.as_bytes());
            buf.push(b'\n');
        }
        self.write_raw(&buf);

        self.lifecycle = Lifecycle::Unmounted;
        let result = error.map_or(Ok(()), Err);
        if self.exit.settle(result) {
            debug!("unmounted");
        }
    }

    // ── Output ───────────────────────────────────────────────────────

    /// Write one pass's bytes, bracketed for synchronized update.
    fn write_frame(&mut self, buf: &[u8]) {
        if buf.is_empty() {
            return;
        }
        if self.options.interactive {
            let mut framed = Vec::with_capacity(buf.len() + 16);
            framed.extend_from_slice(ansi::SYNC_BEGIN.as_bytes());
            framed.extend_from_slice(buf);
            framed.extend_from_slice(ansi::SYNC_END.as_bytes());
            self.write_raw(&framed);
        } else {
            self.write_raw(buf);
        }
    }

    fn write_raw(&mut self, buf: &[u8]) {
        if buf.is_empty() {
            return;
        }
        trace!(bytes = buf.len(), "stdout write");
        let result = self
            .stdout
            .write_all(buf)
            .and_then(|()| self.stdout.flush());
        self.report(result);
    }

    fn write_err(&mut self, buf: &[u8]) {
        let result = self
            .stderr
            .write_all(buf)
            .and_then(|()| self.stderr.flush());
        self.report(result);
    }

    /// Output is fire-and-forget: failures are logged, never propagated.
    #[allow(clippy::unused_self)]
    fn report(&self, result: io::Result<()>) {
        if let Err(err) = result {
            warn!(error = %err, "terminal write failed");
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
