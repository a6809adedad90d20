use std::fmt;

use codespan_reporting::diagnostic::{Diagnostic as CodespanDiagnostic, Label, Severity as CodespanSeverity};
use serde::Serialize;

use crate::ast::SourceRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// The compiler phase that reported a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSource {
    Frontmatter,
    Translator,
    Container,
    References,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    FrontmatterParseError,
    YamlParseError,
    SchemaValidationError,
    InvalidRef,
    RecursionDepthExceeded,
    DuplicateGlyphId,
    UnresolvedReference,
    AmbiguousReference,
    CrossDocumentReference,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::FrontmatterParseError => "FRONTMATTER_PARSE_ERROR",
            DiagnosticCode::YamlParseError => "YAML_PARSE_ERROR",
            DiagnosticCode::SchemaValidationError => "SCHEMA_VALIDATION_ERROR",
            DiagnosticCode::InvalidRef => "INVALID_REF",
            DiagnosticCode::RecursionDepthExceeded => "RECURSION_DEPTH_EXCEEDED",
            DiagnosticCode::DuplicateGlyphId => "DUPLICATE_GLYPH_ID",
            DiagnosticCode::UnresolvedReference => "UNRESOLVED_REFERENCE",
            DiagnosticCode::AmbiguousReference => "AMBIGUOUS_REFERENCE",
            DiagnosticCode::CrossDocumentReference => "CROSS_DOCUMENT_REFERENCE",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured, non-fatal report produced during compilation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub source: DiagnosticSource,
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<SourceRange>,
}

impl Diagnostic {
    pub fn error(source: DiagnosticSource, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, source, code, message)
    }

    pub fn warning(
        source: DiagnosticSource,
        code: DiagnosticCode,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Warning, source, code, message)
    }

    pub fn info(source: DiagnosticSource, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, source, code, message)
    }

    fn new(
        severity: Severity,
        source: DiagnosticSource,
        code: DiagnosticCode,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            source,
            severity,
            code,
            message: message.into(),
            position: None,
        }
    }

    pub fn at(mut self, position: SourceRange) -> Self {
        self.position = Some(position);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_codespan<FileId: Copy>(&self, file_id: FileId) -> CodespanDiagnostic<FileId> {
        let severity = match self.severity {
            Severity::Error => CodespanSeverity::Error,
            Severity::Warning => CodespanSeverity::Warning,
            Severity::Info => CodespanSeverity::Note,
        };
        let labels = self
            .position
            .map(|p| vec![Label::primary(file_id, p.byte_range())])
            .unwrap_or_default();
        CodespanDiagnostic::new(severity)
            .with_code(self.code.as_str())
            .with_message(&self.message)
            .with_labels(labels)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        write!(f, "{}[{}]: {}", severity, self.code, self.message)?;
        if let Some(position) = &self.position {
            write!(f, " ({}:{})", position.start.line, position.start.column)?;
        }
        Ok(())
    }
}

/// Append-only diagnostics sink shared by every compiler phase.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::trace!(code = %diagnostic.code, "{}", diagnostic.message);
        self.entries.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_error)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_errors_ignores_warnings_and_infos() {
        let mut sink = Diagnostics::new();
        sink.push(Diagnostic::warning(
            DiagnosticSource::Translator,
            DiagnosticCode::InvalidRef,
            "bad ref",
        ));
        sink.push(Diagnostic::info(
            DiagnosticSource::References,
            DiagnosticCode::CrossDocumentReference,
            "elsewhere",
        ));
        assert!(!sink.has_errors());
        sink.push(Diagnostic::error(
            DiagnosticSource::References,
            DiagnosticCode::UnresolvedReference,
            "missing",
        ));
        assert!(sink.has_errors());
        assert_eq!(sink.len(), 3);
    }

    #[test]
    fn serializes_with_screaming_codes() {
        let d = Diagnostic::error(
            DiagnosticSource::Frontmatter,
            DiagnosticCode::FrontmatterParseError,
            "bad yaml",
        );
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "source": "frontmatter",
                "severity": "error",
                "code": "FRONTMATTER_PARSE_ERROR",
                "message": "bad yaml",
            })
        );
    }

    #[test]
    fn codespan_conversion_maps_info_to_note() {
        let d = Diagnostic::info(
            DiagnosticSource::References,
            DiagnosticCode::CrossDocumentReference,
            "x",
        );
        let c = d.to_codespan(0usize);
        assert_eq!(c.severity, CodespanSeverity::Note);
        assert_eq!(c.code.as_deref(), Some("CROSS_DOCUMENT_REFERENCE"));
        assert!(c.labels.is_empty());
    }
}
