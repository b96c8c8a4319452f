// SPDX-License-Identifier: MIT
//
// Key classification.
//
// The decoder in `input.rs` slices the input stream into sequences; this
// module turns one sequence into a `ParsedKey`. Classification is a fixed
// precedence ladder:
//
//   1. Literal controls (CR, LF, TAB, BS, DEL, ESC, space), optionally
//      ESC-prefixed, which sets `meta`.
//   2. A single control byte <= 0x1A → ctrl + letter.
//   3. A single digit or letter.
//   4. ESC + alphanumeric → meta key.
//   5. The function-key grammar (xterm, rxvt, putty, Cygwin variants) with a
//      numeric modifier bitfield, looked up in a static table.
//   6. Literal full-sequence overrides for specific terminal combinations.
//
// Classification never fails. Anything unrecognized keeps a blank `name`
// and its verbatim `sequence` / `raw`, so callers can still match on bytes.

use std::sync::LazyLock;

use regex::Regex;

// ─── ParsedKey ──────────────────────────────────────────────────────────────

/// One logical keypress or one pasted block.
///
/// `sequence` is exactly the input consumed to produce this key. `raw` is
/// the same text, except for a bare carriage return where it is `None`
/// (callers distinguish "return" from "enter" by that).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedKey {
    /// Semantic key name (`"up"`, `"f5"`, `"a"`, `"return"`…). Empty when
    /// the sequence is not recognized or is pasted text.
    pub name: String,
    /// Function-key modifier (only set by the ctrl+fn overrides).
    pub fn_key: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    /// Option/Alt reported through a doubled leading ESC.
    pub option: bool,
    /// The consumed input, verbatim.
    pub sequence: String,
    /// The consumed input, verbatim (`None` for a bare `\r`).
    pub raw: Option<String>,
    /// Reassembled function-key code (`"[A"`, `"[15~"`…) when the
    /// function-key grammar matched.
    pub code: Option<String>,
    /// `true` for a bracketed-paste block.
    pub is_pasted: bool,
}

impl ParsedKey {
    /// A key with blank semantics carrying `s` verbatim.
    #[must_use]
    pub fn verbatim(s: &str) -> Self {
        Self {
            sequence: s.to_owned(),
            raw: Some(s.to_owned()),
            ..Self::default()
        }
    }

    /// A pasted block. No name, no modifiers, `is_pasted` set.
    #[must_use]
    pub fn pasted(content: &str) -> Self {
        Self {
            is_pasted: true,
            ..Self::verbatim(content)
        }
    }
}

// ─── Patterns ───────────────────────────────────────────────────────────────

/// `ESC` followed by exactly one alphanumeric character.
static META_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\x1b([a-zA-Z0-9])$").expect("meta-key pattern is valid")
});

/// The function-key grammar:
///
/// ```text
/// ESC+ (O | N | [ | [[) ( digits [; digits] (~ | ^ | $)
///                       | [1;] [digits] letter )
/// ```
///
/// Groups: 1 prefix, 2 number, 3 modifier, 4 terminator, 5 modifier
/// (letter form), 6 letter.
static FN_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:\x1b+)(O|N|\[|\[\[)(?:([0-9]+)(?:;([0-9]+))?([~^$])|(?:1;)?([0-9]+)?([a-zA-Z]))",
    )
    .expect("function-key pattern is valid")
});

// ─── Static Tables ──────────────────────────────────────────────────────────

/// Name for a reassembled function-key code.
///
/// Covers xterm `ESC O letter` / `ESC [ letter`, the `ESC [ number ~`
/// family, rxvt's shifted (`$`, lowercase) and ctrl (`^`, `O` lowercase)
/// variants, putty's `[[5~`, and Cygwin/libuv's `[[A`–`[[E`.
#[must_use]
pub fn fn_key_name(code: &str) -> Option<&'static str> {
    let name = match code {
        "OP" | "[11~" | "[[A" => "f1",
        "OQ" | "[12~" | "[[B" => "f2",
        "OR" | "[13~" | "[[C" => "f3",
        "OS" | "[14~" | "[[D" => "f4",
        "[[E" | "[15~" => "f5",
        "[17~" => "f6",
        "[18~" => "f7",
        "[19~" => "f8",
        "[20~" => "f9",
        "[21~" => "f10",
        "[23~" => "f11",
        "[24~" => "f12",
        "[A" | "OA" | "[a" | "Oa" => "up",
        "[B" | "OB" | "[b" | "Ob" => "down",
        "[C" | "OC" | "[c" | "Oc" => "right",
        "[D" | "OD" | "[d" | "Od" => "left",
        "[E" | "OE" | "[e" | "Oe" => "clear",
        "[F" | "OF" | "[4~" | "[8~" | "[8$" | "[8^" => "end",
        "[H" | "OH" | "[1~" | "[7~" | "[7$" | "[7^" => "home",
        "[2~" | "[2$" | "[2^" => "insert",
        "[3~" | "[3$" | "[3^" => "delete",
        "[5~" | "[[5~" | "[5$" | "[5^" => "pageup",
        "[6~" | "[[6~" | "[6$" | "[6^" => "pagedown",
        "[Z" => "tab",
        _ => return None,
    };
    Some(name)
}

/// rxvt codes that imply Shift regardless of the modifier parameter.
fn is_shift_code(code: &str) -> bool {
    matches!(
        code,
        "[a" | "[b" | "[c" | "[d" | "[e" | "[2$" | "[3$" | "[5$" | "[6$" | "[7$" | "[8$" | "[Z"
    )
}

/// rxvt codes that imply Ctrl regardless of the modifier parameter.
fn is_ctrl_code(code: &str) -> bool {
    matches!(
        code,
        "Oa" | "Ob" | "Oc" | "Od" | "Oe" | "[2^" | "[3^" | "[5^" | "[6^" | "[7^" | "[8^"
    )
}

/// Every name the classifier can produce for a non-alphanumeric key.
pub const NON_ALPHANUMERIC_KEYS: &[&str] = &[
    "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12", "up", "down",
    "right", "left", "clear", "end", "home", "insert", "delete", "pageup", "pagedown", "tab",
    "backspace",
];

// ─── Classification ─────────────────────────────────────────────────────────

/// Classify one decoded sequence into a [`ParsedKey`].
#[must_use]
pub fn classify(s: &str) -> ParsedKey {
    if let Some(key) = literal_override(s) {
        return key;
    }

    let mut key = ParsedKey::verbatim(s);
    let mut chars = s.chars();
    let single = match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    };

    match s {
        "\r" => {
            key.raw = None;
            key.name = "return".into();
        }
        "\n" => key.name = "enter".into(),
        "\t" => key.name = "tab".into(),
        "\x08" | "\x1b\x08" | "\x7f" | "\x1b\x7f" => {
            key.name = "backspace".into();
            key.meta = s.starts_with('\x1b');
        }
        "\x1b" | "\x1b\x1b" => {
            key.name = "escape".into();
            key.meta = s.len() == 2;
        }
        " " | "\x1b " => {
            key.name = "space".into();
            key.meta = s.len() == 2;
        }
        _ => match single {
            Some(c @ '\0'..='\x1a') => {
                key.name = char::from(c as u8 + b'a' - 1).to_string();
                key.ctrl = true;
            }
            Some('0'..='9') => key.name = "number".into(),
            Some(c @ 'a'..='z') => key.name = c.to_string(),
            Some(c @ 'A'..='Z') => {
                key.name = c.to_ascii_lowercase().to_string();
                key.shift = true;
            }
            _ => classify_escape(s, &mut key),
        },
    }

    // iTerm2 "natural text editing" sends ESC b / ESC f for word motion.
    match s {
        "\x1bb" => {
            key.meta = true;
            key.name = "left".into();
        }
        "\x1bf" => {
            key.meta = true;
            key.name = "right".into();
        }
        _ => {}
    }

    key
}

/// Meta keys and the function-key grammar.
fn classify_escape(s: &str, key: &mut ParsedKey) {
    if let Some(caps) = META_KEY.captures(s) {
        key.meta = true;
        key.shift = caps[1].chars().all(|c| c.is_ascii_uppercase());
        return;
    }

    let Some(caps) = FN_KEY.captures(s) else {
        return;
    };

    if s.starts_with("\x1b\x1b") {
        key.option = true;
    }

    let code: String = [1, 2, 4, 6]
        .iter()
        .filter_map(|&i| caps.get(i).map(|m| m.as_str()))
        .collect();

    // A missing parameter means "no modifiers" (param 1). Overlong digit
    // runs degrade the same way rather than failing.
    let param = caps
        .get(3)
        .or_else(|| caps.get(5))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .unwrap_or(1);
    let modifier = param - 1;

    key.ctrl = modifier & 4 != 0 || is_ctrl_code(&code);
    key.meta = modifier & 10 != 0;
    key.shift = modifier & 1 != 0 || is_shift_code(&code);
    key.name = fn_key_name(&code).unwrap_or_default().to_owned();
    key.code = Some(code);
}

/// Full-sequence overrides for specific terminal combinations.
///
/// `ESC[1~` / `ESC[4~` resolve to plain home / end. Some terminals use the
/// same bytes for fn+ctrl+arrow; home/end is the common meaning and the
/// one we keep.
fn literal_override(s: &str) -> Option<ParsedKey> {
    let (name, ctrl) = match s {
        "\x1b[1~" => ("home", false),
        "\x1b[4~" => ("end", false),
        "\x1b[5~" => ("pageup", false),
        "\x1b[6~" => ("pagedown", false),
        "\x1b[1;5D" => ("left", true),
        "\x1b[1;5C" => ("right", true),
        _ => return None,
    };
    Some(ParsedKey {
        name: name.into(),
        ctrl,
        ..ParsedKey::verbatim(s)
    })
}

// ─── Tests ──────────────────────────────────────────────────────────────────
