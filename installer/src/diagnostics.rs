//! Human-readable diagnostic trail for install and uninstall attempts.
//!
//! Every entry is also forwarded to the `log` facade so the same messages show
//! up in verbose logs without callers emitting them twice.

use std::fmt;

/// Severity of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Progress information.
    Info,
    /// Something degraded but the attempt continued.
    Warning,
    /// The attempt failed.
    Error,
}

/// One entry in the trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// How serious the entry is.
    pub severity: Severity,
    /// Message shown to the user.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Info => f.write_str(&self.message),
            Severity::Warning => write!(f, "Warning: {}", self.message),
            Severity::Error => write!(f, "Error: {}", self.message),
        }
    }
}

/// Ordered collection of diagnostics for one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty trail.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a progress message.
    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message.into());
    }

    /// Record a degraded-but-continuing message.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message.into());
    }

    /// Record a failure message.
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message.into());
    }

    fn push(&mut self, severity: Severity, message: String) {
        match severity {
            Severity::Info => log::info!("{message}"),
            Severity::Warning => log::warn!("{message}"),
            Severity::Error => log::error!("{message}"),
        }
        self.entries.push(Diagnostic { severity, message });
    }

    /// All entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Entries at or above `severity`.
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.severity >= severity)
    }

    /// Returns true when any warning or error was recorded.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.at_least(Severity::Warning).next().is_some()
    }

    /// Returns true when a message containing `needle` was recorded.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|d| d.message.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_keep_insertion_order() {
        let mut trail = Diagnostics::new();
        trail.info("first");
        trail.warn("second");
        trail.error("third");

        let messages: Vec<&str> = trail.entries().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }

    #[test]
    fn at_least_filters_by_severity() {
        let mut trail = Diagnostics::new();
        trail.info("progress");
        assert!(!trail.has_warnings());
        trail.warn("degraded");
        assert_eq!(trail.at_least(Severity::Warning).count(), 1);
        assert!(trail.has_warnings());
    }

    #[test]
    fn display_prefixes_non_info_entries() {
        let warning = Diagnostic {
            severity: Severity::Warning,
            message: "d3d9.dll missing".to_owned(),
        };
        assert_eq!(warning.to_string(), "Warning: d3d9.dll missing");
    }
}
