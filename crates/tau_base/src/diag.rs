//! Diagnostic accumulation and crumb-style rendering.
//!
//! Passes never unwind on a user error. They push a [`Diagnostic`] into the
//! shared [`ErrorBag`] and keep going, poisoning whatever result the failed
//! node would have produced. The bag is bounded: once it fills up,
//! [`ErrorBag::report`] signals [`BagFull`] and the caller bails cleanly.
//!
//! Rendered output follows the crumb format:
//!
//! ```text
//! Error (E0301): undefined symbol
//! [main.tau:2:12]
//!     2 |     return nope
//!                    ^~~~ not found in this scope
//! ```

use std::fmt;
use std::io::{self, Write};

use crate::source::{SourceId, SourceRegistry};
use crate::span::Span;
use crate::style::Style;

/// Whether a diagnostic stops compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Hard error: later passes are skipped, the process exits nonzero.
    Error,
    /// Informational: formatted like an error, never stops compilation.
    Warning,
}

/// A single reported problem, tied to a source span.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Numeric code within the severity's class, e.g. `0301`.
    pub code: u16,
    pub title: String,
    pub source: SourceId,
    pub span: Span,
    /// Extra labeled spans, rendered as secondary snippets.
    pub labels: Vec<(SourceId, Span, String)>,
}

impl Diagnostic {
    pub fn error(code: u16, title: impl Into<String>, source: SourceId, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            code,
            title: title.into(),
            source,
            span,
            labels: Vec::new(),
        }
    }

    pub fn warning(code: u16, title: impl Into<String>, source: SourceId, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            title: title.into(),
            source,
            span,
            labels: Vec::new(),
        }
    }

    /// Attaches a labeled secondary span (e.g. the first declaration in a
    /// redeclaration report).
    pub fn with_label(mut self, source: SourceId, span: Span, text: impl Into<String>) -> Self {
        self.labels.push((source, span, text.into()));
        self
    }
}

/// Signalled by [`ErrorBag::report`] when the bag reached its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BagFull;

impl fmt::Display for BagFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error limit reached")
    }
}

impl std::error::Error for BagFull {}

/// Bounded accumulator for diagnostics.
///
/// Only errors count toward the capacity; warnings are always accepted.
pub struct ErrorBag {
    diagnostics: Vec<Diagnostic>,
    capacity: usize,
    error_count: usize,
    warning_count: usize,
}

impl ErrorBag {
    /// Default error capacity used by the driver.
    pub const DEFAULT_CAPACITY: usize = 16;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            diagnostics: Vec::new(),
            capacity,
            error_count: 0,
            warning_count: 0,
        }
    }

    /// Records a diagnostic.
    ///
    /// Returns `Err(BagFull)` when an error would exceed the capacity; the
    /// diagnostic is still recorded so the last report is not lost.
    pub fn report(&mut self, diagnostic: Diagnostic) -> Result<(), BagFull> {
        match diagnostic.severity {
            Severity::Error => {
                self.error_count += 1;
                self.diagnostics.push(diagnostic);
                if self.error_count >= self.capacity {
                    return Err(BagFull);
                }
            }
            Severity::Warning => {
                self.warning_count += 1;
                self.diagnostics.push(diagnostic);
            }
        }
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.error_count >= self.capacity
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Moves all diagnostics out of `other` into `self`, ignoring capacity.
    pub fn absorb(&mut self, other: ErrorBag) {
        self.error_count += other.error_count;
        self.warning_count += other.warning_count;
        self.diagnostics.extend(other.diagnostics);
    }
}

impl Default for ErrorBag {
    fn default() -> Self {
        Self::new()
    }
}

fn render_snippet(
    out: &mut impl Write,
    registry: &SourceRegistry,
    source: SourceId,
    span: Span,
    label: Option<&str>,
    style: &Style,
) -> io::Result<()> {
    let loc = registry.location(source, span);
    writeln!(
        out,
        "{}",
        style.dim(&format!("[{}:{}:{}]", loc.path, loc.row + 1, loc.col + 1))
    )?;

    let line = registry.line_at(source, span.start);
    let line_no = format!("{:>4}", loc.row + 1);
    writeln!(out, " {} | {}", line_no, line)?;

    // Caret under the first spanned byte, tildes under the rest.
    let mut marker = String::from("^");
    for _ in 1..span.len().max(1) {
        marker.push('~');
    }

    let pad = " ".repeat(loc.col + line_no.len() + 4);
    match label {
        Some(text) => writeln!(out, "{}{} {}", pad, style.red(&marker), text)?,
        None => writeln!(out, "{}{}", pad, style.red(&marker))?,
    }

    Ok(())
}

/// Renders every diagnostic in the bag to `out` in crumb format.
pub fn render(
    bag: &ErrorBag,
    registry: &SourceRegistry,
    out: &mut impl Write,
    style: Style,
) -> io::Result<()> {
    for diagnostic in bag.diagnostics() {
        let header = match diagnostic.severity {
            Severity::Error => style.red(&format!(
                "Error (E{:04}): {}",
                diagnostic.code, diagnostic.title
            )),
            Severity::Warning => style.yellow(&format!(
                "Warning (W{:04}): {}",
                diagnostic.code, diagnostic.title
            )),
        };
        writeln!(out, "{}", header)?;

        render_snippet(out, registry, diagnostic.source, diagnostic.span, None, &style)?;

        for (source, span, text) in &diagnostic.labels {
            render_snippet(out, registry, *source, *span, Some(text), &style)?;
        }
    }
    Ok(())
}
