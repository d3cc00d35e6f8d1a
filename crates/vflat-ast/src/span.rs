//! Source locations attached to tree nodes
//!
//! The elaboration model only reports a file name and a line number per
//! object, so spans here are line-granular. They exist to attribute
//! diagnostics to the originating source.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Source location of an elaborated object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    /// File path (if the elaborator reported one)
    pub file: Option<PathBuf>,
    /// First line (1-indexed)
    pub line: usize,
    /// Last line, equal to `line` for single-line objects
    pub end_line: usize,
}

impl SourceSpan {
    /// Span covering a single line
    pub fn at_line(line: usize) -> Self {
        Self {
            file: None,
            line,
            end_line: line,
        }
    }

    /// Span covering a range of lines
    pub fn lines(line: usize, end_line: usize) -> Self {
        Self {
            file: None,
            line,
            end_line: end_line.max(line),
        }
    }

    /// Attach a file path
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Format as "file:line" for diagnostics
    pub fn display(&self) -> String {
        let file_str = self
            .file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        format!("{}:{}", file_str, self.line)
    }
}

impl Default for SourceSpan {
    fn default() -> Self {
        Self::at_line(1)
    }
}

/// Location reported with a diagnostic
///
/// Unlike [`SourceSpan`] this is always printable, falling back to
/// `<unknown>` when a node carries no span.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: Option<PathBuf>,
    pub line: Option<usize>,
}

impl Location {
    pub fn unknown() -> Self {
        Self::default()
    }
}

impl From<Option<&SourceSpan>> for Location {
    fn from(span: Option<&SourceSpan>) -> Self {
        match span {
            Some(span) => Self {
                file: span.file.clone(),
                line: Some(span.line),
            },
            None => Self::unknown(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}", file.display())?,
            None => write!(f, "<unknown>")?,
        }
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_span_display() {
        let span = SourceSpan::at_line(12).with_file("top.sv");
        assert_eq!(span.display(), "top.sv:12");
        assert_eq!(SourceSpan::at_line(3).display(), "<unknown>:3");
    }

    #[test]
    fn test_location_from_span() {
        let span = SourceSpan::lines(4, 2).with_file("pkg.sv");
        assert_eq!(span.end_line, 4);

        let loc = Location::from(Some(&span));
        assert_eq!(loc.to_string(), "pkg.sv:4");
        assert_eq!(Location::from(None).to_string(), "<unknown>");
    }
}
