// SPDX-License-Identifier: MIT
//
// Terminal input decoder.
//
// Splits the raw input stream into logical key events and bracketed-paste
// blocks. Handles:
//
// - CSI sequences (arrows, editing keys, function keys, modifier params)
// - SS3 sequences (`ESC O letter`, F1-F4 and keypad arrows)
// - OSC and DCS strings (swallowed whole, emitted verbatim)
// - Meta keys (ESC followed by one ASCII character)
// - Bracketed paste (`CSI 200~` ... `CSI 201~`)
// - UTF-8 text, one event per character
//
// # Design
//
// The core is a pure function, [`decode`]: it takes the previous
// [`KeyParseState`] and a chunk (or `None` to flush) and returns the events
// plus the next state. A sequence that is cut off at the end of a chunk is
// parked in `state.incomplete` and re-scanned when the next chunk arrives,
// so the events never depend on where the stream was split.
//
// A lone ESC is ambiguous: it is either the Escape key or the first byte of
// a sequence still in flight. The decoder cannot resolve that alone. The
// caller flushes after [`Decoder::flush_timeout`] of silence, at which point
// the buffered bytes are taken at face value.
//
// [`Decoder`] is the stateful byte-level front end used by the event loop:
// it carries split UTF-8 across reads and owns the parse state.

use std::time::Duration;

use tracing::trace;

use crate::keys::{ParsedKey, classify};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Bracketed paste start delimiter.
const PASTE_START: &str = "\x1b[200~";
/// Bracketed paste end delimiter.
const PASTE_END: &str = "\x1b[201~";

/// How long a partial escape may wait for its tail in normal mode.
pub const FLUSH_TIMEOUT_NORMAL: Duration = Duration::from_millis(50);
/// How long a paste may stall before the buffered text is delivered as-is.
pub const FLUSH_TIMEOUT_PASTE: Duration = Duration::from_millis(500);

// ─── State ──────────────────────────────────────────────────────────────────

/// Which handler owns the next bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    #[default]
    Normal,
    /// Inside a bracketed paste; everything up to `CSI 201~` is content.
    InPaste,
}

/// Decoder state carried between calls.
///
/// In normal mode `incomplete` is either empty or a trailing partial escape
/// sequence. It is never a complete sequence by itself. In paste mode it is
/// the pasted text collected so far.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyParseState {
    pub mode: ParseMode,
    pub incomplete: String,
}

impl KeyParseState {
    /// Is there buffered input waiting for more data or a flush?
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.incomplete.is_empty()
    }
}

// ─── Decoding ───────────────────────────────────────────────────────────────

/// Decode one chunk of input.
///
/// `None` flushes: every buffered partial sequence is treated as final, and
/// an unterminated paste is delivered as the complete pasted block.
#[must_use]
pub fn decode(state: KeyParseState, input: Option<&str>) -> (Vec<ParsedKey>, KeyParseState) {
    let is_flush = input.is_none();
    let chunk = input.unwrap_or_default();
    let KeyParseState {
        mut mode,
        mut incomplete,
    } = state;
    let mut keys = Vec::new();

    // Large pastes arrive in many chunks. Only the seam between the buffered
    // text and the new chunk can hide a new terminator, so look there instead
    // of rescanning the whole paste every time.
    if mode == ParseMode::InPaste && !is_flush {
        let seam = floor_char_boundary(
            &incomplete,
            incomplete.len().saturating_sub(PASTE_END.len() - 1),
        );
        let mut window = String::with_capacity(incomplete.len() - seam + chunk.len());
        window.push_str(&incomplete[seam..]);
        window.push_str(chunk);
        if !window.contains(PASTE_END) {
            incomplete.push_str(chunk);
            return (keys, KeyParseState { mode, incomplete });
        }
    }

    let mut text = incomplete;
    text.push_str(chunk);

    let mut pos = 0;
    let leftover = loop {
        let rest = &text[pos..];
        let step = match mode {
            ParseMode::Normal => normal_step(rest, is_flush, &mut keys),
            ParseMode::InPaste => paste_step(rest, is_flush, &mut keys),
        };
        match step {
            Step::Advance(consumed, next) => {
                pos += consumed;
                mode = next;
            }
            Step::Park(consumed) => break rest[consumed..].to_owned(),
        }
    };

    (
        keys,
        KeyParseState {
            mode,
            incomplete: leftover,
        },
    )
}

/// What a handler did with the text it was given.
enum Step {
    /// Consumed this many bytes; continue in the given mode.
    Advance(usize, ParseMode),
    /// Consumed this many bytes; the rest waits for the next call.
    Park(usize),
}

/// Normal-mode handler: emit plain characters up to the next escape
/// sequence, then that sequence.
fn normal_step(rest: &str, is_flush: bool, keys: &mut Vec<ParsedKey>) -> Step {
    let bytes = rest.as_bytes();
    // (position, Some(len) for a complete sequence, None for a partial one)
    let found = rest
        .match_indices('\x1b')
        .find_map(|(i, _)| match scan_escape(&bytes[i..], is_flush) {
            Scan::NoMatch => None,
            Scan::Partial => Some((i, None)),
            Scan::Match(len) => Some((i, Some(len))),
        });

    let plain_end = found.map_or(rest.len(), |(i, _)| i);
    keys.extend(
        rest[..plain_end]
            .char_indices()
            .map(|(i, c)| classify(&rest[i..i + c.len_utf8()])),
    );

    match found {
        None => Step::Park(rest.len()),
        Some((i, None)) => Step::Park(i),
        Some((i, Some(len))) => {
            let seq = &rest[i..i + len];
            if seq == PASTE_START {
                trace!("bracketed paste begins");
                return Step::Advance(i + len, ParseMode::InPaste);
            }
            keys.push(classify(seq));
            Step::Advance(i + len, ParseMode::Normal)
        }
    }
}

/// Paste-mode handler: everything up to the end delimiter is one block.
fn paste_step(rest: &str, is_flush: bool, keys: &mut Vec<ParsedKey>) -> Step {
    if let Some(end) = rest.find(PASTE_END) {
        push_paste(&rest[..end], keys);
        return Step::Advance(end + PASTE_END.len(), ParseMode::Normal);
    }
    if is_flush {
        push_paste(rest, keys);
        return Step::Advance(rest.len(), ParseMode::Normal);
    }
    Step::Park(0)
}

fn push_paste(content: &str, keys: &mut Vec<ParsedKey>) {
    trace!(len = content.len(), "bracketed paste block");
    if !content.is_empty() {
        keys.push(ParsedKey::pasted(content));
    }
}

// ─── Escape Scanning ────────────────────────────────────────────────────────
//
// All scanners are pure: they look at bytes starting with ESC and report
// how far a complete sequence reaches. `Partial` means the bytes ran out
// while the sequence was still well-formed.

/// Result of scanning for one escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// A complete sequence of this many bytes.
    Match(usize),
    /// Well-formed so far but cut off by the end of input.
    Partial,
    /// Not a sequence at this position.
    NoMatch,
}

/// Scan one escape sequence at `buf[0] == ESC`.
///
/// Alternatives are tried in order: OSC, DCS, CSI, SS3, then ESC + any
/// ASCII byte (meta key, which also covers ESC ESC). A structured sequence
/// cut off at the end of the buffer wins over the meta reading unless this
/// is a flush.
fn scan_escape(buf: &[u8], is_flush: bool) -> Scan {
    debug_assert_eq!(buf.first(), Some(&0x1B));

    if buf.len() < 2 {
        return if is_flush { Scan::NoMatch } else { Scan::Partial };
    }

    for scanner in [scan_osc, scan_dcs, scan_csi, scan_ss3] {
        match scanner(buf) {
            Scan::Match(n) => return Scan::Match(n),
            Scan::Partial if !is_flush => return Scan::Partial,
            _ => {}
        }
    }

    if buf[1].is_ascii() {
        Scan::Match(2)
    } else {
        Scan::NoMatch
    }
}

/// `ESC ] digits (; body)* (BEL | ESC \)`
fn scan_osc(buf: &[u8]) -> Scan {
    if buf[1] != b']' {
        return Scan::NoMatch;
    }
    let mut i = skip_digits(buf, 2);
    loop {
        match buf.get(i) {
            None => return Scan::Partial,
            Some(b';') => {
                i += 1;
                while buf.get(i).is_some_and(|&b| b != 0x07 && b != 0x1B) {
                    i += 1;
                }
            }
            Some(0x07) => return Scan::Match(i + 1),
            Some(0x1B) => return string_terminator(buf, i),
            Some(_) => return Scan::NoMatch,
        }
    }
}

/// `ESC P body ESC \`
fn scan_dcs(buf: &[u8]) -> Scan {
    if buf[1] != b'P' {
        return Scan::NoMatch;
    }
    match buf[2..].iter().position(|&b| b == 0x1B) {
        Some(offset) => string_terminator(buf, 2 + offset),
        None => Scan::Partial,
    }
}

/// `ESC [ [? digits (; digits)* final`, final in `A-Z a-z ~ $ ^`.
///
/// The optional second `[` covers the Cygwin and putty encodings
/// (`ESC [[A`, `ESC [[5~`).
fn scan_csi(buf: &[u8]) -> Scan {
    if buf[1] != b'[' {
        return Scan::NoMatch;
    }
    let mut i = 2;
    if buf.get(i) == Some(&b'[') {
        i += 1;
    }
    i = skip_digits(buf, i);
    while buf.get(i) == Some(&b';') {
        i = skip_digits(buf, i + 1);
    }
    match buf.get(i) {
        None => Scan::Partial,
        Some(b) if b.is_ascii_alphabetic() || matches!(b, b'~' | b'$' | b'^') => Scan::Match(i + 1),
        Some(_) => Scan::NoMatch,
    }
}

/// `ESC O letter`
fn scan_ss3(buf: &[u8]) -> Scan {
    if buf[1] != b'O' {
        return Scan::NoMatch;
    }
    match buf.get(2) {
        None => Scan::Partial,
        Some(b) if b.is_ascii_alphabetic() => Scan::Match(3),
        Some(_) => Scan::NoMatch,
    }
}

/// String terminator `ESC \` expected at `buf[esc]`.
fn string_terminator(buf: &[u8], esc: usize) -> Scan {
    match buf.get(esc + 1) {
        None => Scan::Partial,
        Some(b'\\') => Scan::Match(esc + 2),
        Some(_) => Scan::NoMatch,
    }
}

fn skip_digits(buf: &[u8], mut i: usize) -> usize {
    while buf.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    i
}

/// Largest char boundary `<= index`.
fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

// ─── Byte Front End ─────────────────────────────────────────────────────────

/// Stateful decoder over raw input bytes.
///
/// Feed bytes with [`advance`](Self::advance). When [`has_pending`]
/// (Self::has_pending) is true and no input arrives within
/// [`flush_timeout`](Self::flush_timeout), call [`flush`](Self::flush).
#[derive(Debug, Default)]
pub struct Decoder {
    state: KeyParseState,
    /// Trailing bytes of a UTF-8 character split across reads.
    carry: Vec<u8>,
}

impl Decoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk of raw bytes.
    ///
    /// A chunk that is exactly one byte `>= 0x80` is the legacy 8-bit meta
    /// encoding: it decodes as ESC followed by the byte with its high bit
    /// cleared.
    ///
    /// This is ambiguous with a multi-byte UTF-8 character delivered one
    /// byte per read: `é` (`C3 A9`) read that way decodes as meta+`C` and
    /// then meta+`)`. Terminals write a keypress in one `write`, so a lone
    /// high byte is taken as Alt+key. Bytes that follow an incomplete UTF-8
    /// prefix in the same or a later chunk are still carried normally.
    pub fn advance(&mut self, bytes: &[u8]) -> Vec<ParsedKey> {
        // A lone lead byte is meta too, not the start of a character.
        if let [b @ 0x80..=0xFF] = *bytes {
            if self.carry.is_empty() {
                let text = format!("\x1b{}", char::from(b - 0x80));
                return self.feed(Some(&text));
            }
        }

        self.carry.extend_from_slice(bytes);
        let text = take_utf8(&mut self.carry);
        if text.is_empty() {
            return Vec::new();
        }
        self.feed(Some(&text))
    }

    /// Take everything buffered at face value.
    pub fn flush(&mut self) -> Vec<ParsedKey> {
        let mut keys = Vec::new();
        if !self.carry.is_empty() {
            let tail = String::from_utf8_lossy(&self.carry).into_owned();
            self.carry.clear();
            keys.extend(self.feed(Some(&tail)));
        }
        keys.extend(self.feed(None));
        keys
    }

    /// Is there input that might still complete with more bytes?
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.state.has_pending() || !self.carry.is_empty()
    }

    /// Silence after which pending input should be flushed.
    #[must_use]
    pub fn flush_timeout(&self) -> Duration {
        match self.state.mode {
            ParseMode::Normal => FLUSH_TIMEOUT_NORMAL,
            ParseMode::InPaste => FLUSH_TIMEOUT_PASTE,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> ParseMode {
        self.state.mode
    }

    fn feed(&mut self, input: Option<&str>) -> Vec<ParsedKey> {
        let (keys, next) = decode(std::mem::take(&mut self.state), input);
        self.state = next;
        keys
    }
}

/// Drain the longest decodable prefix of `carry`.
///
/// Invalid bytes become U+FFFD. An incomplete character at the very end
/// stays in `carry` for the next read.
fn take_utf8(carry: &mut Vec<u8>) -> String {
    let mut out = String::with_capacity(carry.len());
    let mut start = 0;
    while start < carry.len() {
        match std::str::from_utf8(&carry[start..]) {
            Ok(s) => {
                out.push_str(s);
                start = carry.len();
            }
            Err(e) => {
                let valid = start + e.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&carry[start..valid]));
                match e.error_len() {
                    Some(n) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        start = valid + n;
                    }
                    None => {
                        start = valid;
                        break;
                    }
                }
            }
        }
    }
    carry.drain(..start);
    out
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    /// Helper: decode `input` from a fresh state, then flush.
    fn decode_all(input: &str) -> Vec<ParsedKey> {
        let (mut keys, state) = decode(KeyParseState::default(), Some(input));
        let (tail, state) = decode(state, None);
        keys.extend(tail);
        assert_eq!(state, KeyParseState::default());
        keys
    }

    /// Helper: decode chunk by chunk, flush only at the end.
    fn decode_chunks(chunks: &[&str]) -> Vec<ParsedKey> {
        let mut state = KeyParseState::default();
        let mut keys = Vec::new();
        for chunk in chunks {
            let (out, next) = decode(state, Some(chunk));
            keys.extend(out);
            state = next;
        }
        let (out, _) = decode(state, None);
        keys.extend(out);
        keys
    }

    fn names(keys: &[ParsedKey]) -> Vec<&str> {
        keys.iter().map(|k| k.name.as_str()).collect()
    }

    fn sequences(keys: &[ParsedKey]) -> Vec<&str> {
        keys.iter().map(|k| k.sequence.as_str()).collect()
    }

    // ── Plain text ──────────────────────────────────────────────────────

    #[test]
    fn plain_text_one_event_per_char() {
        let keys = decode_all("aB1");
        assert_eq!(names(&keys), vec!["a", "b", "number"]);
        assert_eq!(
            keys.iter().map(|k| k.shift).collect::<Vec<_>>(),
            vec![false, true, false]
        );
    }

    #[test]
    fn ctrl_c_byte() {
        let keys = decode_all("\x03");
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].name, "c");
        assert!(keys[0].ctrl);
    }

    #[test]
    fn utf8_text_keeps_characters() {
        let keys = decode_all("héllo");
        assert_eq!(sequences(&keys), vec!["h", "é", "l", "l", "o"]);
    }

    #[test]
    fn carriage_return_then_line_feed() {
        let keys = decode_all("\r\n");
        assert_eq!(names(&keys), vec!["return", "enter"]);
    }

    // ── Escape sequences ────────────────────────────────────────────────

    #[test]
    fn csi_arrow() {
        let keys = decode_all("\x1b[A");
        assert_eq!(names(&keys), vec!["up"]);
        assert_eq!(keys[0].sequence, "\x1b[A");
    }

    #[test]
    fn text_around_sequences() {
        let keys = decode_all("a\x1b[Bb");
        assert_eq!(names(&keys), vec!["a", "down", "b"]);
    }

    #[test]
    fn ss3_function_key() {
        assert_eq!(names(&decode_all("\x1bOQ")), vec!["f2"]);
    }

    #[test]
    fn cygwin_double_bracket() {
        assert_eq!(names(&decode_all("\x1b[[A\x1b[[5~")), vec!["f1", "pageup"]);
    }

    #[test]
    fn rxvt_dollar_final() {
        let keys = decode_all("\x1b[3$");
        assert_eq!(names(&keys), vec!["delete"]);
        assert!(keys[0].shift);
    }

    #[test]
    fn meta_key() {
        let keys = decode_all("\x1bx");
        assert_eq!(keys.len(), 1);
        assert!(keys[0].meta);
    }

    #[test]
    fn osc_is_one_opaque_event() {
        let keys = decode_all("\x1b]11;rgb:0000/0000/0000\x1b\\q");
        assert_eq!(
            sequences(&keys),
            vec!["\x1b]11;rgb:0000/0000/0000\x1b\\", "q"]
        );
        assert_eq!(keys[0].name, "");
    }

    #[test]
    fn osc_with_bel_terminator() {
        let keys = decode_all("\x1b]0;title\x07");
        assert_eq!(sequences(&keys), vec!["\x1b]0;title\x07"]);
    }

    #[test]
    fn dcs_is_one_opaque_event() {
        let keys = decode_all("\x1bP1$r0m\x1b\\");
        assert_eq!(sequences(&keys), vec!["\x1bP1$r0m\x1b\\"]);
    }

    #[test]
    fn broken_csi_falls_back_to_meta() {
        // `?` is not a valid parameter byte for key sequences.
        let keys = decode_all("\x1b[?1u");
        assert_eq!(sequences(&keys), vec!["\x1b[", "?", "1", "u"]);
    }

    #[test]
    fn escape_before_non_ascii_is_plain() {
        let keys = decode_all("\x1bé");
        assert_eq!(names(&keys), vec!["escape", ""]);
        assert_eq!(keys[1].sequence, "é");
    }

    // ── Partial sequences ───────────────────────────────────────────────

    #[test]
    fn lone_escape_waits_for_flush() {
        let (keys, state) = decode(KeyParseState::default(), Some("\x1b"));
        assert!(keys.is_empty());
        assert_eq!(state.incomplete, "\x1b");

        let (keys, state) = decode(state, None);
        assert_eq!(names(&keys), vec!["escape"]);
        assert!(!state.has_pending());
    }

    #[test]
    fn partial_csi_completes_with_next_chunk() {
        let (keys, state) = decode(KeyParseState::default(), Some("x\x1b[1;5"));
        assert_eq!(names(&keys), vec!["x"]);
        assert_eq!(state.incomplete, "\x1b[1;5");

        let (keys, state) = decode(state, Some("C"));
        assert_eq!(names(&keys), vec!["right"]);
        assert!(keys[0].ctrl);
        assert!(!state.has_pending());
    }

    #[test]
    fn partial_csi_flushes_as_meta_bracket() {
        let (_, state) = decode(KeyParseState::default(), Some("\x1b[12"));
        let (keys, _) = decode(state, None);
        assert_eq!(sequences(&keys), vec!["\x1b[", "1", "2"]);
    }

    #[test]
    fn partial_osc_waits_for_terminator() {
        let (keys, state) = decode(KeyParseState::default(), Some("\x1b]0;ti"));
        assert!(keys.is_empty());
        let (keys, state) = decode(state, Some("tle\x1b"));
        assert!(keys.is_empty());
        let (keys, state) = decode(state, Some("\\"));
        assert_eq!(sequences(&keys), vec!["\x1b]0;title\x1b\\"]);
        assert!(!state.has_pending());
    }

    #[test]
    fn incomplete_is_never_complete_sequence() {
        let (_, state) = decode(KeyParseState::default(), Some("\x1b[A\x1bO"));
        assert_eq!(state.incomplete, "\x1bO");
    }

    // ── Bracketed paste ─────────────────────────────────────────────────

    #[test]
    fn paste_round_trip() {
        let keys = decode_all("\x1b[200~hello\r\nworld\x1b[201~");
        assert_eq!(keys.len(), 1);
        assert!(keys[0].is_pasted);
        assert_eq!(keys[0].sequence, "hello\r\nworld");
        assert_eq!(keys[0].raw.as_deref(), Some("hello\r\nworld"));
        assert_eq!(keys[0].name, "");
    }

    #[test]
    fn paste_contents_are_not_interpreted() {
        let keys = decode_all("\x1b[200~\x1b[A\x03\x1b[201~");
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].sequence, "\x1b[A\x03");
    }

    #[test]
    fn empty_paste_emits_nothing() {
        assert!(decode_all("\x1b[200~\x1b[201~").is_empty());
    }

    #[test]
    fn keys_after_paste_in_same_chunk() {
        let keys = decode_all("\x1b[200~p\x1b[201~q\x1b[B");
        assert_eq!(sequences(&keys), vec!["p", "q", "\x1b[B"]);
        assert!(keys[0].is_pasted);
        assert!(!keys[1].is_pasted);
    }

    #[test]
    fn paste_spanning_chunks() {
        let (keys, state) = decode(KeyParseState::default(), Some("\x1b[200~abc"));
        assert!(keys.is_empty());
        assert_eq!(state.mode, ParseMode::InPaste);
        assert_eq!(state.incomplete, "abc");

        let (keys, state) = decode(state, Some("def\x1b[20"));
        assert!(keys.is_empty());

        let (keys, state) = decode(state, Some("1~"));
        assert_eq!(sequences(&keys), vec!["abcdef"]);
        assert_eq!(state, KeyParseState::default());
    }

    #[test]
    fn unterminated_paste_flushes_as_paste() {
        let (_, state) = decode(KeyParseState::default(), Some("\x1b[200~half"));
        let (keys, state) = decode(state, None);
        assert_eq!(keys.len(), 1);
        assert!(keys[0].is_pasted);
        assert_eq!(keys[0].sequence, "half");
        assert_eq!(state.mode, ParseMode::Normal);
    }

    #[test]
    fn paste_with_multibyte_seam() {
        let keys = decode_chunks(&["\x1b[200~日本", "語\x1b[201~"]);
        assert_eq!(sequences(&keys), vec!["日本語"]);
    }

    // ── Byte front end ──────────────────────────────────────────────────

    #[test]
    fn decoder_carries_split_utf8() {
        let mut decoder = Decoder::new();
        let bytes = "語".as_bytes();
        assert!(decoder.advance(&bytes[..2]).is_empty());
        assert!(decoder.has_pending());
        let keys = decoder.advance(&bytes[2..]);
        assert_eq!(sequences(&keys), vec!["語"]);
        assert!(!decoder.has_pending());
    }

    #[test]
    fn decoder_high_bit_single_byte_is_meta() {
        let mut decoder = Decoder::new();
        let keys = decoder.advance(&[b'x' | 0x80]);
        assert_eq!(sequences(&keys), vec!["\x1bx"]);
        assert!(keys[0].meta);
    }

    #[test]
    fn decoder_lone_utf8_bytes_read_as_meta() {
        let mut decoder = Decoder::new();
        let first = decoder.advance(&[0xC3]);
        let second = decoder.advance(&[0xA9]);
        assert_eq!(sequences(&first), vec!["\x1bC"]);
        assert!(first[0].meta);
        assert!(first[0].shift);
        assert_eq!(sequences(&second), vec!["\x1b)"]);
        assert!(!decoder.has_pending());

        // The same character in one read is text.
        let keys = decoder.advance("é".as_bytes());
        assert_eq!(sequences(&keys), vec!["é"]);
    }

    #[test]
    fn decoder_invalid_utf8_is_replaced() {
        let mut decoder = Decoder::new();
        let keys = decoder.advance(&[b'a', 0xFF, b'b']);
        assert_eq!(sequences(&keys), vec!["a", "\u{FFFD}", "b"]);
    }

    #[test]
    fn decoder_flush_timeout_tracks_mode() {
        let mut decoder = Decoder::new();
        assert_eq!(decoder.flush_timeout(), FLUSH_TIMEOUT_NORMAL);
        decoder.advance(b"\x1b[200~abc");
        assert_eq!(decoder.mode(), ParseMode::InPaste);
        assert_eq!(decoder.flush_timeout(), FLUSH_TIMEOUT_PASTE);
        let keys = decoder.flush();
        assert_eq!(sequences(&keys), vec!["abc"]);
        assert_eq!(decoder.flush_timeout(), FLUSH_TIMEOUT_NORMAL);
    }

    #[test]
    fn decoder_flush_resolves_lone_escape() {
        let mut decoder = Decoder::new();
        assert!(decoder.advance(b"\x1b").is_empty());
        assert!(decoder.has_pending());
        assert_eq!(names(&decoder.flush()), vec!["escape"]);
        assert!(!decoder.has_pending());
    }

    // ── Properties ──────────────────────────────────────────────────────

    const TOKENS: &[&str] = &[
        "a", "Z", "7", " ", "\r", "\t", "\x03", "\x7f", "é", "語", "\x1b", "\x1bx", "\x1b[A",
        "\x1b[1;5C", "\x1b[3~", "\x1b[15;2~", "\x1bOP", "\x1b[[A", "\x1b]0;t\x07",
        "\x1b]8;;u\x1b\\", "\x1bP1$r\x1b\\", "\x1b[200~pasted\r\x1b[A\x1b[201~", "\x1b[200~",
        "\x1b[201~", "\x1b[?",
    ];

    fn split_at_char_boundaries<'a>(s: &'a str, cuts: &[prop::sample::Index]) -> Vec<&'a str> {
        let boundaries: Vec<usize> = s.char_indices().map(|(i, _)| i).collect();
        let mut points: Vec<usize> = if boundaries.is_empty() {
            Vec::new()
        } else {
            cuts.iter().map(|c| boundaries[c.index(boundaries.len())]).collect()
        };
        points.sort_unstable();
        points.dedup();

        let mut chunks = Vec::new();
        let mut last = 0;
        for p in points {
            chunks.push(&s[last..p]);
            last = p;
        }
        chunks.push(&s[last..]);
        chunks
    }

    proptest! {
        #[test]
        fn chunk_boundaries_do_not_change_events(
            tokens in prop::collection::vec(prop::sample::select(TOKENS), 0..12),
            cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
        ) {
            let input: String = tokens.concat();
            let chunks = split_at_char_boundaries(&input, &cuts);
            prop_assert_eq!(decode_chunks(&chunks), decode_chunks(&[&input]));
        }

        #[test]
        fn plain_text_maps_char_to_key(text in "[a-zA-Z]{0,24}") {
            let keys = decode_all(&text);
            prop_assert_eq!(keys.len(), text.chars().count());
            for (key, c) in keys.iter().zip(text.chars()) {
                prop_assert_eq!(key.shift, c.is_ascii_uppercase());
                prop_assert_eq!(&key.name, &c.to_ascii_lowercase().to_string());
                prop_assert!(!key.is_pasted);
            }
        }

        #[test]
        fn pasted_text_round_trips(text in "[^\x1b]{1,40}") {
            let keys = decode_all(&format!("\x1b[200~{text}\x1b[201~"));
            prop_assert_eq!(keys.len(), 1);
            prop_assert!(keys[0].is_pasted);
            prop_assert_eq!(&keys[0].sequence, &text);
        }
    }
}
