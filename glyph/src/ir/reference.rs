use serde::Serialize;

/// Marker separating an optional document id from a block target in links.
pub const GLYPH_LINK_MARKER: &str = "#glyph:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// Declared in a component's `refs` array.
    Explicit,
    /// A `#glyph:` link found in inline content.
    Inline,
}

/// What a reference points at: a glyph-id or block id, optionally in another document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceTarget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub id: String,
}

impl ReferenceTarget {
    /// Parse a link URL of the form `[<document-id>]#glyph:<id>`.
    /// Returns `None` for ordinary links.
    pub fn from_link(url: &str) -> Option<Self> {
        let (document, id) = url.split_once(GLYPH_LINK_MARKER)?;
        Self::from_parts(document, id)
    }

    /// Parse a declared target. Accepts the link form, `<document-id>#<id>`,
    /// or a bare same-document `<id>`.
    pub fn from_declared(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.contains(GLYPH_LINK_MARKER) {
            return Self::from_link(raw);
        }
        match raw.split_once('#') {
            Some((document, id)) => Self::from_parts(document, id),
            None => Self::from_parts("", raw),
        }
    }

    fn from_parts(document: &str, id: &str) -> Option<Self> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        let document = document.trim();
        Some(ReferenceTarget {
            document_id: (!document.is_empty()).then(|| document.to_string()),
            id: id.to_string(),
        })
    }

    /// True if the target names a document other than `document_id`.
    pub fn is_cross_document(&self, document_id: &str) -> bool {
        self.document_id
            .as_deref()
            .is_some_and(|doc| doc != document_id)
    }
}

/// An edge in the document's reference graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub kind: ReferenceKind,
    pub source_block_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_anchor: Option<String>,
    pub target: ReferenceTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_block_id: Option<String>,
}

impl Reference {
    pub fn is_resolved(&self) -> bool {
        self.resolved_block_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_targets() {
        assert_eq!(
            ReferenceTarget::from_link("#glyph:intro"),
            Some(ReferenceTarget {
                document_id: None,
                id: "intro".into()
            })
        );
        assert_eq!(
            ReferenceTarget::from_link("guide#glyph:setup"),
            Some(ReferenceTarget {
                document_id: Some("guide".into()),
                id: "setup".into()
            })
        );
        assert_eq!(ReferenceTarget::from_link("https://example.com/#top"), None);
        assert_eq!(ReferenceTarget::from_link("#glyph:"), None);
    }

    #[test]
    fn declared_targets() {
        assert_eq!(
            ReferenceTarget::from_declared("intro").map(|t| t.id),
            Some("intro".to_string())
        );
        let t = ReferenceTarget::from_declared("other#summary").unwrap();
        assert_eq!(t.document_id.as_deref(), Some("other"));
        assert_eq!(t.id, "summary");
        let t = ReferenceTarget::from_declared("#glyph:x").unwrap();
        assert_eq!(t.document_id, None);
        assert!(ReferenceTarget::from_declared("  ").is_none());
    }

    #[test]
    fn cross_document_detection() {
        let t = ReferenceTarget::from_link("a#glyph:x").unwrap();
        assert!(t.is_cross_document("b"));
        assert!(!t.is_cross_document("a"));
        let local = ReferenceTarget::from_link("#glyph:x").unwrap();
        assert!(!local.is_cross_document("a"));
    }
}
