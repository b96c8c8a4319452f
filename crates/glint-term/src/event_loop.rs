// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Event loop — stdin bytes in, frames out, one thread.
//
// The loop wires the pieces together:
//
//   reader thread ──bytes──▶ Decoder ──keys──▶ App ──▶ Scheduler ──▶ stdout
//
// The application is the scheduler's frame source; the loop reaches it
// through `Scheduler::source_mut` to deliver keys, resizes and ticks.
//
// # Waking up
//
// The loop blocks on the reader channel with `recv_timeout`. The timeout is
// the earliest of three deadlines:
//
//   1. the decoder flush deadline: a chunk left a partial escape sequence
//      (or an unterminated paste) pending, and if nothing else arrives
//      within the flush timeout the pending bytes are taken at face value.
//      Every new chunk replaces the deadline;
//   2. the scheduler's throttle deadline (a deferred render or write);
//   3. the idle tick, so `App::on_tick` can drive animations.
//
// Idle with nothing pending, the thread sleeps a full tick.
//
// # SIGWINCH
//
// The handler only sets an `AtomicBool`. The loop checks it every turn and
// hands the new size to the app and to `Scheduler::resize`, which rewrites
// the screen right away.
//
// # Ctrl+C
//
// Raw mode turns off signal keys, so Ctrl+C arrives as byte 0x03. With
// `exit_on_ctrl_c` set it unmounts; otherwise it is an ordinary key.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::Result;
use crate::input::Decoder;
use crate::keys::ParsedKey;
use crate::log_update::{LineEraser, LogUpdate};
use crate::reader::InputReader;
use crate::scheduler::{FrameSource, RenderOptions, Scheduler};
use crate::terminal::{Size, Terminal};

// ─── SIGWINCH ────────────────────────────────────────────────────────────────

static SIGWINCH_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Install a SIGWINCH handler that sets [`SIGWINCH_RECEIVED`].
///
/// Storing to an atomic is async-signal-safe.
#[cfg(unix)]
fn install_sigwinch_handler() {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigwinch_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&raw mut sa.sa_mask);
        libc::sigaction(libc::SIGWINCH, &raw const sa, std::ptr::null_mut());
    }
}

#[cfg(unix)]
extern "C" fn sigwinch_handler(_sig: libc::c_int) {
    SIGWINCH_RECEIVED.store(true, Ordering::Relaxed);
}

#[cfg(not(unix))]
fn install_sigwinch_handler() {}

// ─── App Trait ───────────────────────────────────────────────────────────────

/// What the application wants after handling a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing visible changed.
    Continue,
    /// State changed; schedule a render.
    Render,
    /// Unmount and leave the loop.
    Quit,
}

/// An application driven by [`EventLoop`].
///
/// The application renders itself: it is the scheduler's
/// [`FrameSource`]. Only [`on_key`](App::on_key) is required.
pub trait App: FrameSource {
    /// Handle one decoded key or pasted block.
    fn on_key(&mut self, key: &ParsedKey) -> Action;

    /// The terminal changed size. A full redraw follows.
    fn on_resize(&mut self, _size: Size) {}

    /// Called every loop turn. Return `true` to request a render.
    fn on_tick(&mut self) -> bool {
        false
    }
}

// ─── Config ──────────────────────────────────────────────────────────────────

/// Event loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Longest the loop sleeps with nothing pending.
    pub tick_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
        }
    }
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

/// Deliver `keys` to the application, in order.
///
/// Returns [`Action::Quit`] as soon as a key asks to exit (the remaining
/// keys are dropped). Otherwise renders once if any key asked for it and
/// returns [`Action::Continue`].
pub fn dispatch<A, L, W, E>(
    scheduler: &mut Scheduler<A, L, W, E>,
    keys: &[ParsedKey],
    now: Instant,
) -> Action
where
    A: App,
    L: LogUpdate,
    W: io::Write,
    E: io::Write,
{
    let mut render = false;
    for key in keys {
        trace!(name = %key.name, sequence = ?key.sequence, pasted = key.is_pasted, "key");
        if key.sequence == "\x03" && scheduler.options().exit_on_ctrl_c {
            debug!("ctrl+c");
            return Action::Quit;
        }
        match scheduler.source_mut().on_key(key) {
            Action::Quit => return Action::Quit,
            Action::Render => render = true,
            Action::Continue => {}
        }
    }
    if render {
        scheduler.request_render(now);
    }
    Action::Continue
}

/// How long to wait for input: until the earliest deadline, at most `tick`.
#[must_use]
pub fn next_timeout(now: Instant, tick: Duration, deadlines: &[Option<Instant>]) -> Duration {
    deadlines
        .iter()
        .flatten()
        .map(|deadline| deadline.saturating_duration_since(now))
        .fold(tick, Duration::min)
}

// ─── EventLoop ───────────────────────────────────────────────────────────────

/// Owns the terminal and the decoder; runs an [`App`] until it quits.
///
/// ```no_run
/// use glint_term::event_loop::{Action, App, EventLoop};
/// use glint_term::keys::ParsedKey;
/// use glint_term::scheduler::{FrameSource, RenderContext, RenderOptions, RenderOutput};
///
/// struct Hello;
///
/// impl FrameSource for Hello {
///     fn render(&mut self, _ctx: &RenderContext) -> glint_term::Result<RenderOutput> {
///         Ok(RenderOutput { output: "hello".into(), height: 1, ..RenderOutput::default() })
///     }
/// }
///
/// impl App for Hello {
///     fn on_key(&mut self, key: &ParsedKey) -> Action {
///         if key.name == "q" { Action::Quit } else { Action::Continue }
///     }
/// }
///
/// EventLoop::new().run(Hello, RenderOptions::from_env())?;
/// # Ok::<(), glint_term::Error>(())
/// ```
pub struct EventLoop {
    terminal: Terminal,
    decoder: Decoder,
    config: LoopConfig,
    flush_deadline: Option<Instant>,
}

impl EventLoop {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    #[must_use]
    pub fn with_config(config: LoopConfig) -> Self {
        Self {
            terminal: Terminal::new(),
            decoder: Decoder::new(),
            config,
            flush_deadline: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.terminal.size()
    }

    /// Mount `app` and run until it quits, Ctrl+C, or stdin closes.
    ///
    /// Returns the application in its final state.
    ///
    /// # Errors
    ///
    /// [`Error::RawModeUnsupported`](crate::Error::RawModeUnsupported) when
    /// stdin is not a terminal, I/O errors from terminal setup, or the error
    /// the frame source failed with.
    pub fn run<A: App>(&mut self, app: A, options: RenderOptions) -> Result<A> {
        self.terminal.enter()?;
        install_sigwinch_handler();

        let (mut reader, rx) = match InputReader::spawn() {
            Ok(spawned) => spawned,
            Err(e) => {
                self.terminal.leave()?;
                return Err(e.into());
            }
        };

        let mut scheduler = Scheduler::mount(
            app,
            LineEraser::new(),
            io::stdout(),
            io::stderr(),
            self.terminal.size().as_usize(),
            options,
        );
        let exit = scheduler.exit_signal();
        scheduler.request_render(Instant::now());

        self.drive(&mut scheduler, &rx);
        scheduler.unmount(None);

        // Leave the terminal even when the frame source failed.
        reader.stop();
        self.terminal.leave()?;

        exit.try_result()
            .unwrap_or(Ok(()))
            .map(|()| scheduler.into_source())
    }

    fn drive<A, L, W, E>(&mut self, scheduler: &mut Scheduler<A, L, W, E>, rx: &Receiver<Vec<u8>>)
    where
        A: App,
        L: LogUpdate,
        W: io::Write,
        E: io::Write,
    {
        while !scheduler.is_unmounted() {
            let timeout = next_timeout(
                Instant::now(),
                self.config.tick_interval,
                &[self.flush_deadline, scheduler.next_deadline()],
            );

            let keys = match rx.recv_timeout(timeout) {
                Ok(bytes) => {
                    let keys = self.decoder.advance(&bytes);
                    self.flush_deadline = self
                        .decoder
                        .has_pending()
                        .then(|| Instant::now() + self.decoder.flush_timeout());
                    keys
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.flush_deadline.is_some_and(|d| Instant::now() >= d) {
                        self.flush_deadline = None;
                        self.decoder.flush()
                    } else {
                        Vec::new()
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("stdin closed");
                    return;
                }
            };

            if dispatch(scheduler, &keys, Instant::now()) == Action::Quit {
                return;
            }

            if SIGWINCH_RECEIVED.swap(false, Ordering::Relaxed) {
                let size = self.terminal.refresh_size();
                scheduler.source_mut().on_resize(size);
                let (columns, rows) = size.as_usize();
                scheduler.resize(columns, rows, Instant::now());
            }

            if scheduler.source_mut().on_tick() {
                scheduler.request_render(Instant::now());
            }

            scheduler.poll(Instant::now());
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::keys::classify;
    use crate::scheduler::{RenderContext, RenderOutput};
    use pretty_assertions::assert_eq;

    const MS: Duration = Duration::from_millis(1);

    /// Appends typed characters to a line; Enter quits.
    #[derive(Default)]
    struct LineApp {
        line: String,
        seen: Vec<String>,
    }

    impl FrameSource for LineApp {
        fn render(&mut self, _ctx: &RenderContext) -> Result<RenderOutput> {
            Ok(RenderOutput {
                output: format!("> {}", self.line),
                height: 1,
                static_output: String::new(),
            })
        }
    }

    impl App for LineApp {
        fn on_key(&mut self, key: &ParsedKey) -> Action {
            self.seen.push(key.sequence.clone());
            match key.name.as_str() {
                "return" => Action::Quit,
                "left" => Action::Continue,
                _ => {
                    self.line.push_str(&key.sequence);
                    Action::Render
                }
            }
        }
    }

    #[derive(Clone, Default)]
    struct Sink(Rc<RefCell<Vec<u8>>>);

    impl io::Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn mount(options: RenderOptions) -> (Scheduler<LineApp, LineEraser, Sink, Sink>, Sink) {
        let out = Sink::default();
        let s = Scheduler::mount(
            LineApp::default(),
            LineEraser::with_visible_cursor(),
            out.clone(),
            Sink::default(),
            (80, 24),
            options,
        );
        (s, out)
    }

    fn keys(s: &str) -> Vec<ParsedKey> {
        s.chars().map(|c| classify(&c.to_string())).collect()
    }

    // ── Config ──────────────────────────────────────────────────

    #[test]
    fn default_tick() {
        assert_eq!(LoopConfig::default().tick_interval, 100 * MS);
    }

    // ── Timeouts ────────────────────────────────────────────────

    #[test]
    fn timeout_is_tick_when_idle() {
        let now = Instant::now();
        assert_eq!(next_timeout(now, 100 * MS, &[None, None]), 100 * MS);
    }

    #[test]
    fn timeout_picks_earliest_deadline() {
        let now = Instant::now();
        let t = next_timeout(now, 100 * MS, &[Some(now + 50 * MS), Some(now + 32 * MS)]);
        assert_eq!(t, 32 * MS);
    }

    #[test]
    fn past_deadline_means_no_wait() {
        let now = Instant::now();
        let t = next_timeout(now + 10 * MS, 100 * MS, &[Some(now)]);
        assert_eq!(t, Duration::ZERO);
    }

    // ── Dispatch ────────────────────────────────────────────────

    #[test]
    fn keys_reach_app_and_render_once() {
        let (mut s, out) = mount(RenderOptions::default());
        let action = dispatch(&mut s, &keys("hi"), Instant::now());
        assert_eq!(action, Action::Continue);
        assert_eq!(s.source().line, "hi");
        let written = String::from_utf8(out.0.borrow().clone()).unwrap();
        assert!(written.contains("> hi\n"));
        assert_eq!(written.matches("> ").count(), 1);
    }

    #[test]
    fn continue_does_not_render() {
        let (mut s, out) = mount(RenderOptions::default());
        dispatch(&mut s, &[classify("\x1b[D")], Instant::now());
        assert_eq!(s.source().seen, vec!["\x1b[D".to_owned()]);
        assert!(out.0.borrow().is_empty());
    }

    #[test]
    fn ctrl_c_quits_before_app_sees_it() {
        let (mut s, _) = mount(RenderOptions::default());
        let action = dispatch(&mut s, &keys("a\x03b"), Instant::now());
        assert_eq!(action, Action::Quit);
        assert_eq!(s.source().seen, vec!["a".to_owned()]);
    }

    #[test]
    fn ctrl_c_is_a_key_when_exit_disabled() {
        let options = RenderOptions {
            exit_on_ctrl_c: false,
            ..RenderOptions::default()
        };
        let (mut s, _) = mount(options);
        let action = dispatch(&mut s, &keys("\x03"), Instant::now());
        assert_eq!(action, Action::Continue);
        assert_eq!(s.source().seen, vec!["\x03".to_owned()]);
    }

    #[test]
    fn app_quit_stops_dispatch() {
        let (mut s, _) = mount(RenderOptions::default());
        let action = dispatch(&mut s, &keys("a\rb"), Instant::now());
        assert_eq!(action, Action::Quit);
        assert_eq!(s.source().line, "a");
    }

    // ── SIGWINCH ────────────────────────────────────────────────

    #[test]
    fn sigwinch_flag_swap() {
        SIGWINCH_RECEIVED.store(true, Ordering::Relaxed);
        assert!(SIGWINCH_RECEIVED.swap(false, Ordering::Relaxed));
        assert!(!SIGWINCH_RECEIVED.load(Ordering::Relaxed));
    }

    // ── EventLoop ───────────────────────────────────────────────

    #[test]
    fn event_loop_with_config() {
        let config = LoopConfig {
            tick_interval: 16 * MS,
        };
        let event_loop = EventLoop::with_config(config);
        assert_eq!(event_loop.config, config);
        assert_eq!(event_loop.flush_deadline, None);
    }
}
