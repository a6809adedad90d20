use serde_json::{Map, Value};

use crate::ast::{Node, NodeKind};
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSource, Diagnostics};
use crate::ir::block::GLYPH_ID_KEY;
use crate::ir::{DocumentMetadata, LayoutHints, LayoutMode, Spacing};

/// What the frontmatter contributes to the IR.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    pub metadata: DocumentMetadata,
    pub layout: LayoutHints,
    /// Author-declared stable document id.
    pub glyph_id: Option<String>,
}

/// Extract metadata from the first AST child if it is a YAML node.
///
/// Unknown and mistyped fields are dropped without a diagnostic; layout enum
/// values outside their sets fall back to defaults. A YAML syntax error yields
/// one `FRONTMATTER_PARSE_ERROR` and empty defaults.
pub fn extract(first: Option<&Node>, diagnostics: &mut Diagnostics) -> Frontmatter {
    let Some(Node {
        kind: NodeKind::Yaml { value },
        position,
    }) = first
    else {
        return Frontmatter::default();
    };

    let parsed: Value = match serde_yaml::from_str(value) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(
                Diagnostic::error(
                    DiagnosticSource::Frontmatter,
                    DiagnosticCode::FrontmatterParseError,
                    format!("invalid frontmatter YAML: {}", e),
                )
                .at(*position),
            );
            return Frontmatter::default();
        }
    };

    match parsed {
        Value::Object(fields) => from_fields(&fields),
        _ => Frontmatter::default(),
    }
}

fn from_fields(fields: &Map<String, Value>) -> Frontmatter {
    let metadata = DocumentMetadata {
        title: string_field(fields, "title"),
        description: string_field(fields, "description"),
        authors: string_list_field(fields, "authors"),
        created_at: string_field(fields, "createdAt"),
        tags: string_list_field(fields, "tags"),
        source_file: None,
    };

    let layout = match fields.get("layout") {
        Some(Value::Object(layout)) => layout_hints(layout),
        _ => LayoutHints::default(),
    };

    Frontmatter {
        metadata,
        layout,
        glyph_id: string_field(fields, GLYPH_ID_KEY).filter(|id| !id.is_empty()),
    }
}

fn layout_hints(layout: &Map<String, Value>) -> LayoutHints {
    let mode = layout
        .get("mode")
        .and_then(Value::as_str)
        .and_then(LayoutMode::parse)
        .unwrap_or_default();
    let spacing = layout
        .get("spacing")
        .and_then(Value::as_str)
        .and_then(Spacing::parse)
        .unwrap_or_default();
    let columns = layout
        .get("columns")
        .and_then(Value::as_u64)
        .filter(|&n| n > 0)
        .and_then(|n| u32::try_from(n).ok());
    let max_width = match layout.get("maxWidth") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    LayoutHints {
        mode,
        spacing,
        columns,
        max_width,
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

/// An array whose elements are all strings; anything else is dropped whole.
fn string_list_field(fields: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    fields
        .get(key)?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast;

    fn extract_from(source: &str) -> (Frontmatter, Diagnostics) {
        let root = ast::parse(source);
        let mut diagnostics = Diagnostics::new();
        let fm = extract(root.children.first(), &mut diagnostics);
        (fm, diagnostics)
    }

    #[test]
    fn known_fields_are_copied() {
        let (fm, diags) = extract_from(
            "---\ntitle: Hello\ndescription: World\nauthors: [ann, bo]\ncreatedAt: 2024-05-01\ntags:\n  - a\nglyph-id: doc1\n---\n",
        );
        assert!(diags.is_empty());
        assert_eq!(fm.metadata.title.as_deref(), Some("Hello"));
        assert_eq!(fm.metadata.description.as_deref(), Some("World"));
        assert_eq!(
            fm.metadata.authors,
            Some(vec!["ann".to_string(), "bo".to_string()])
        );
        assert_eq!(fm.metadata.created_at.as_deref(), Some("2024-05-01"));
        assert_eq!(fm.metadata.tags, Some(vec!["a".to_string()]));
        assert_eq!(fm.glyph_id.as_deref(), Some("doc1"));
    }

    #[test]
    fn mistyped_and_unknown_fields_are_dropped_silently() {
        let (fm, diags) =
            extract_from("---\ntitle: 42\nauthors: [ann, 3]\ntags: solo\nextra: yes\n---\n");
        assert!(diags.is_empty());
        assert_eq!(fm.metadata, DocumentMetadata::default());
    }

    #[test]
    fn parse_error_reports_once_and_defaults() {
        let (fm, diags) = extract_from("---\ntitle: [unclosed\n---\n# Body\n");
        assert_eq!(fm, Frontmatter::default());
        let all: Vec<_> = diags.iter().collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].code, DiagnosticCode::FrontmatterParseError);
        assert_eq!(all[0].position.map(|p| p.start.line), Some(1));
    }

    #[test]
    fn layout_values_fall_back_to_defaults() {
        let (fm, diags) = extract_from(
            "---\nlayout:\n  mode: carousel\n  spacing: relaxed\n  columns: 3\n  maxWidth: 960\n---\n",
        );
        assert!(diags.is_empty());
        assert_eq!(fm.layout.mode, LayoutMode::Document);
        assert_eq!(fm.layout.spacing, Spacing::Relaxed);
        assert_eq!(fm.layout.columns, Some(3));
        assert_eq!(fm.layout.max_width.as_deref(), Some("960"));
    }

    #[test]
    fn non_mapping_frontmatter_is_empty() {
        let (fm, diags) = extract_from("---\n- just\n- a list\n---\n");
        assert!(diags.is_empty());
        assert_eq!(fm, Frontmatter::default());
    }

    #[test]
    fn no_yaml_node_means_defaults() {
        let (fm, _) = extract_from("# Title\n");
        assert_eq!(fm.layout, LayoutHints::default());
        assert!(fm.glyph_id.is_none());
    }
}
