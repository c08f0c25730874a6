//! The diagnostic sink shared by every stage of a compile.
//!
//! Nothing in the compiler reports shader problems through Rust errors.
//! Each stage appends entries here and signals failure through its return
//! value; the driver renders the accumulated entries into the info log.

use std::fmt;

/// A position in the concatenated shader source.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceLoc {
    /// Index of the source fragment (or the `#line` file number).
    pub file: u32,
    /// One-based line number.
    pub line: u32,
}

impl SourceLoc {
    pub const fn new(file: u32, line: u32) -> Self {
        Self { file, line }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// How serious a diagnostic is.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Free-form text appended to the log (graph dumps and similar).
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => Ok(()),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// One entry of the info log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub loc: Option<SourceLoc>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.severity, self.loc) {
            (Severity::Info, _) => write!(f, "{}", self.message),
            (severity, Some(loc)) => write!(f, "{severity}: {loc}: {}", self.message),
            (severity, None) => write!(f, "{severity}: {}", self.message),
        }
    }
}

/// Ordered collection of diagnostics for one compile.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Reports an error in the `'<token>' : <reason> <extra>` style.
    pub fn error(&mut self, loc: SourceLoc, reason: &str, token: &str, extra: &str) {
        self.push(Diagnostic {
            severity: Severity::Error,
            loc: Some(loc),
            message: token_message(reason, token, extra),
        });
    }

    /// Reports a warning in the `'<token>' : <reason> <extra>` style.
    pub fn warning(&mut self, loc: SourceLoc, reason: &str, token: &str, extra: &str) {
        self.push(Diagnostic {
            severity: Severity::Warning,
            loc: Some(loc),
            message: token_message(reason, token, extra),
        });
    }

    /// Reports a located error with a free-form message.
    pub fn error_at(&mut self, loc: SourceLoc, message: impl Into<String>) {
        self.push(Diagnostic {
            severity: Severity::Error,
            loc: Some(loc),
            message: message.into(),
        });
    }

    /// Reports a located warning with a free-form message.
    pub fn warning_at(&mut self, loc: SourceLoc, message: impl Into<String>) {
        self.push(Diagnostic {
            severity: Severity::Warning,
            loc: Some(loc),
            message: message.into(),
        });
    }

    /// Reports an error that has no meaningful source position.
    pub fn global_error(&mut self, message: impl Into<String>) {
        self.push(Diagnostic {
            severity: Severity::Error,
            loc: None,
            message: message.into(),
        });
    }

    /// Appends raw text to the log.
    pub fn note(&mut self, text: impl Into<String>) {
        self.push(Diagnostic {
            severity: Severity::Info,
            loc: None,
            message: text.into(),
        });
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    fn count(&self, severity: Severity) -> usize {
        self.entries
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }

    /// Renders every entry, one per line.
    pub fn info_log(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

fn token_message(reason: &str, token: &str, extra: &str) -> String {
    let mut message = format!("'{token}' : {reason}");
    if !extra.is_empty() {
        message.push(' ');
        message.push_str(extra);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn located_error_format() {
        let mut diags = Diagnostics::new();
        diags.error(SourceLoc::new(0, 3), "undeclared identifier", "foo", "");
        assert_eq!(diags.info_log(), "ERROR: 0:3: 'foo' : undeclared identifier\n");
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn extra_info_appended() {
        let mut diags = Diagnostics::new();
        diags.warning(SourceLoc::new(1, 2), "unexpected", "#pragma", "STDGL");
        assert_eq!(
            diags.info_log(),
            "WARNING: 1:2: '#pragma' : unexpected STDGL\n"
        );
        assert!(!diags.has_errors());
    }

    #[test]
    fn global_error_has_no_location() {
        let mut diags = Diagnostics::new();
        diags.global_error("Missing main()");
        assert_eq!(diags.info_log(), "ERROR: Missing main()\n");
    }

    #[test]
    fn notes_render_verbatim() {
        let mut diags = Diagnostics::new();
        diags.note("selection\n");
        diags.global_error("x");
        assert_eq!(diags.info_log(), "selection\nERROR: x\n");
        assert_eq!(diags.len(), 2);
    }
}
