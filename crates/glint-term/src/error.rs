// SPDX-License-Identifier: MIT
//
// Crate-wide error type.
//
// Decoding and compositing never fail: malformed input becomes a key with
// blank semantic fields, out-of-bounds writes are clipped. Errors only come
// from the outside world: the terminal device, or the frame source that
// produces content for the scheduler.

use std::fmt;
use std::io;

/// Errors surfaced by the terminal layer and the render scheduler.
#[derive(Debug)]
pub enum Error {
    /// Writing to or configuring the terminal failed.
    Io(io::Error),
    /// Raw input was requested on a handle that is not a terminal.
    ///
    /// This is a caller misconfiguration (e.g. stdin is a pipe), never a
    /// consequence of malformed input data.
    RawModeUnsupported,
    /// The frame source failed while producing content.
    Render(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "terminal I/O failed: {e}"),
            Self::RawModeUnsupported => {
                f.write_str("raw mode is not supported on the provided input stream")
            }
            Self::Render(msg) => write!(f, "render failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// `io::Error` is not `Clone`; a copy keeps its kind and message.
///
/// Needed so every waiter on an exit signal can receive the error.
impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Self::Io(e) => Self::Io(io::Error::new(e.kind(), e.to_string())),
            Self::RawModeUnsupported => Self::RawModeUnsupported,
            Self::Render(msg) => Self::Render(msg.clone()),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Shorthand for results carrying [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_raw_mode() {
        let msg = Error::RawModeUnsupported.to_string();
        assert!(msg.contains("raw mode"));
    }

    #[test]
    fn display_render_carries_message() {
        let msg = Error::Render("boom".into()).to_string();
        assert_eq!(msg, "render failed: boom");
    }

    #[test]
    fn io_error_has_source() {
        let err = Error::from(io::Error::other("disk"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(std::error::Error::source(&Error::RawModeUnsupported).is_none());
    }

    #[test]
    fn clone_keeps_io_kind_and_message() {
        let err = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        let Error::Io(copy) = err.clone() else {
            panic!("expected Io");
        };
        assert_eq!(copy.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(copy.to_string(), "gone");
    }
}
