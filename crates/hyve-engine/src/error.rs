//! Engine error type, context-frame stack, and the reporting switch.

use std::cell::Cell;
use std::fmt;

use thiserror::Error;

/// Failure families used by the engine.
///
/// Callers branch on the kind (e.g. `AlreadyExists` on a create call, or
/// `TypeMismatch` on an optimistic attribute overwrite); everything else in
/// the error is diagnostic text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A link or attribute with that name already exists.
    AlreadyExists,
    /// The named link, attribute, or file does not exist.
    NotFound,
    /// The container was opened read-only.
    ReadOnly,
    /// Element type classes are not convertible (e.g. string vs. numeric).
    TypeMismatch,
    /// Element counts or buffer sizes do not line up.
    ShapeMismatch,
    /// A malformed argument (bad rank, zero dimension, wrong handle kind).
    InvalidArgument,
    /// The handle does not name a live resource.
    InvalidHandle,
    /// Filesystem failure underneath the container.
    Io,
    /// The container bytes on disk do not parse.
    Corrupt,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::NotFound => "not found",
            ErrorKind::ReadOnly => "read-only container",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::ShapeMismatch => "shape mismatch",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::InvalidHandle => "invalid handle",
            ErrorKind::Io => "I/O failure",
            ErrorKind::Corrupt => "corrupt container",
        };
        f.write_str(s)
    }
}

/// One entry of the error stack: the operation that observed the failure
/// plus a human-readable detail line.
#[derive(Debug, Clone)]
pub struct Frame {
    pub op: &'static str,
    pub detail: String,
}

/// An engine failure: a kind plus the stack of frames accumulated while the
/// error propagated outward.  [`EngineError::stack_text`] renders the stack
/// the way a diagnostic log would.
#[derive(Debug, Clone, Error)]
#[error("{}: {}", self.kind, self.stack_text())]
pub struct EngineError {
    kind: ErrorKind,
    frames: Vec<Frame>,
}

impl EngineError {
    /// Raise a new error.  When reporting is enabled this also emits a
    /// `tracing` event.
    pub fn new(kind: ErrorKind, op: &'static str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if reporting_enabled() {
            tracing::debug!(%kind, op, %detail, "engine error raised");
        }
        EngineError {
            kind,
            frames: vec![Frame { op, detail }],
        }
    }

    /// Push an outer context frame onto the stack.
    pub fn context(mut self, op: &'static str, detail: impl Into<String>) -> Self {
        self.frames.push(Frame {
            op,
            detail: detail.into(),
        });
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Walk the frame stack into one human-readable line, innermost first.
    pub fn stack_text(&self) -> String {
        let mut out = String::new();
        for (i, frame) in self.frames.iter().enumerate() {
            if i > 0 {
                out.push_str("; ");
            }
            out.push_str(frame.op);
            if !frame.detail.is_empty() {
                out.push_str(": ");
                out.push_str(&frame.detail);
            }
        }
        out
    }
}

thread_local! {
    static REPORTING: Cell<bool> = const { Cell::new(true) };
}

/// Whether raising an engine error currently emits a `tracing` event on
/// this thread.
pub fn reporting_enabled() -> bool {
    REPORTING.with(|r| r.get())
}

/// Enable or disable error reporting on this thread, returning the previous
/// setting.  Callers are expected to restore the old value; the object
/// layer wraps this in a scope guard.
pub fn set_reporting(on: bool) -> bool {
    REPORTING.with(|r| r.replace(on))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_text_walks_innermost_first() {
        let e = EngineError::new(ErrorKind::NotFound, "link_lookup", "no link 'x'")
            .context("dataset_open", "while opening '/a/x'");
        assert_eq!(e.kind(), ErrorKind::NotFound);
        let text = e.stack_text();
        assert!(text.starts_with("link_lookup: no link 'x'"));
        assert!(text.contains("dataset_open"));
        assert!(e.to_string().starts_with("not found"));
    }

    #[test]
    fn reporting_toggle_round_trips() {
        assert!(reporting_enabled());
        let prev = set_reporting(false);
        assert!(prev);
        assert!(!reporting_enabled());
        set_reporting(prev);
        assert!(reporting_enabled());
    }
}
