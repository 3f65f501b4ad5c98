//! Failure classification for render diagnostics.
//!
//! A failed render only carries the engine's exit status and raw output. This
//! module maps that text onto a small set of failure kinds, each with a
//! corrective hint that is fed back to the generator on the next attempt.
//! Everything here is a pure function of the diagnostic text.

mod excerpt;

pub use excerpt::{environment_problem, excerpt};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Why a render failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SyntaxError,
    UndefinedSymbol,
    RuntimeException,
    Timeout,
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::SyntaxError => "syntax_error",
            FailureKind::UndefinedSymbol => "undefined_symbol",
            FailureKind::RuntimeException => "runtime_exception",
            FailureKind::Timeout => "timeout",
            FailureKind::Unknown => "unknown",
        }
    }

    /// Human-readable label used in prompts and terminal output
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::SyntaxError => "syntax error",
            FailureKind::UndefinedSymbol => "undefined symbol",
            FailureKind::RuntimeException => "runtime exception",
            FailureKind::Timeout => "timeout",
            FailureKind::Unknown => "unknown failure",
        }
    }

    /// Kinds a code change can plausibly fix
    pub fn is_auto_fixable(&self) -> bool {
        matches!(
            self,
            FailureKind::SyntaxError | FailureKind::UndefinedSymbol | FailureKind::RuntimeException
        )
    }

    fn hint(&self) -> &'static str {
        match self {
            FailureKind::SyntaxError => {
                "The previous code failed to parse. Correct the syntax error shown above and check indentation, brackets and string quotes."
            }
            FailureKind::UndefinedSymbol => {
                "The previous code used a name, attribute or module that does not exist. Import or define it, or replace it with the correct Manim v0.18+ API."
            }
            FailureKind::RuntimeException => {
                "The previous code raised an exception while rendering. Fix the failing call shown in the traceback."
            }
            FailureKind::Timeout => {
                "Rendering exceeded the time limit. Reduce the number of objects, animations and total run time."
            }
            FailureKind::Unknown => {
                "The previous code failed to render without a clear error. Review it for mistakes and return a corrected version."
            }
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Result of classifying one diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: FailureKind,
    pub hint: String,
}

const SYNTAX_MARKERS: &[&str] = &[
    "SyntaxError",
    "IndentationError",
    "TabError",
    "invalid syntax",
    "unexpected EOF",
    "unterminated string literal",
    "unmatched ')'",
    "was never closed",
];

const UNDEFINED_MARKERS: &[&str] = &[
    "is not defined",
    "NameError",
    "UnboundLocalError",
    "cannot import name",
    "No module named",
    "has no attribute",
];

const TIMEOUT_PREFIX: &str = "TIMEOUT:";

const TIMEOUT_MARKERS: &[&str] = &["timed out", "wall-clock limit"];

const RUNTIME_MARKERS: &[&str] = &["Traceback", "Error", "Exception"];

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

/// Classify a failed render's diagnostic text.
///
/// Patterns are checked in priority order: parse errors, unresolved names,
/// wall-clock timeouts, any other stack trace, then `Unknown`. Empty text is
/// `Unknown`.
pub fn classify(diagnostic: &str) -> Classification {
    let kind = if diagnostic.trim().is_empty() {
        FailureKind::Unknown
    } else if contains_any(diagnostic, SYNTAX_MARKERS) {
        FailureKind::SyntaxError
    } else if contains_any(diagnostic, UNDEFINED_MARKERS) {
        FailureKind::UndefinedSymbol
    } else if diagnostic.trim_start().starts_with(TIMEOUT_PREFIX) || contains_any(diagnostic, TIMEOUT_MARKERS) {
        FailureKind::Timeout
    } else if contains_any(diagnostic, RUNTIME_MARKERS) {
        FailureKind::RuntimeException
    } else {
        FailureKind::Unknown
    };

    log::debug!("classify: {} ({} bytes of diagnostic)", kind.as_str(), diagnostic.len());

    Classification {
        kind,
        hint: kind.hint().to_string(),
    }
}

/// Diagnostic text for a render killed at the wall-clock limit
pub fn timeout_diagnostic(limit: Duration, output: &str) -> String {
    let mut text = format!("{} render exceeded the {:?} wall-clock limit and was killed", TIMEOUT_PREFIX, limit);
    if !output.trim().is_empty() {
        text.push_str("\n\n");
        text.push_str(output);
    }
    text
}
