//! Glyph-id validation and the document's reference graph.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::ast::{Inline, List, SourceRange, for_each_link};
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSource, Diagnostics};
use crate::ir::block::walk_blocks;
use crate::ir::{Block, BlockData, Reference, ReferenceKind, ReferenceTarget, Section, SectionContent};

/// Markdown link syntax inside component string props: `[text](url "title")`.
static PROP_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[([^\]]*)\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#).unwrap()
});

/// Final block ids and glyph-id claims for one document.
#[derive(Debug, Clone, Default)]
pub struct BlockIndex {
    positions: HashMap<String, SourceRange>,
    glyph_ids: BTreeMap<String, Vec<String>>,
}

impl BlockIndex {
    /// Index `blocks` with the given glyph-id → claiming block ids map.
    pub fn new(blocks: &[Block], glyph_ids: BTreeMap<String, Vec<String>>) -> Self {
        let mut positions = HashMap::new();
        walk_blocks(blocks, &mut |block| {
            positions.insert(block.id.clone(), block.position);
        });
        BlockIndex {
            positions,
            glyph_ids,
        }
    }

    /// Index `blocks`, reading glyph-id claims from the block data.
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let mut glyph_ids: BTreeMap<String, Vec<String>> = BTreeMap::new();
        walk_blocks(blocks, &mut |block| {
            if let Some(glyph_id) = block.glyph_id() {
                glyph_ids
                    .entry(glyph_id.to_string())
                    .or_default()
                    .push(block.id.clone());
            }
        });
        Self::new(blocks, glyph_ids)
    }

    pub fn contains(&self, block_id: &str) -> bool {
        self.positions.contains_key(block_id)
    }

    pub fn position(&self, block_id: &str) -> Option<SourceRange> {
        self.positions.get(block_id).copied()
    }

    /// Final ids of every block claiming `glyph_id`, in document order.
    pub fn claimants(&self, glyph_id: &str) -> &[String] {
        self.glyph_ids.get(glyph_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn glyph_ids(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.glyph_ids.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Report every glyph-id claimed by more than one block.
pub fn validate_glyph_ids(index: &BlockIndex, diagnostics: &mut Diagnostics) {
    for (glyph_id, claimants) in index.glyph_ids() {
        if claimants.len() < 2 {
            continue;
        }
        let mut diagnostic = Diagnostic::error(
            DiagnosticSource::References,
            DiagnosticCode::DuplicateGlyphId,
            format!(
                "glyph-id \"{}\" is declared by {} blocks: {}",
                glyph_id,
                claimants.len(),
                claimants.join(", ")
            ),
        );
        if let Some(position) = claimants.get(1).and_then(|id| index.position(id)) {
            diagnostic = diagnostic.at(position);
        }
        diagnostics.push(diagnostic);
    }
}

/// Collect every `#glyph:` link in `blocks`, depth-first, as inline references.
pub fn extract_inline_references(blocks: &[Block]) -> Vec<Reference> {
    let mut references = Vec::new();
    walk_blocks(blocks, &mut |block| {
        let mut links = Vec::new();
        block_links(&block.data, &mut links);

        for (url, text) in links {
            let Some(target) = ReferenceTarget::from_link(&url) else {
                continue;
            };
            references.push(Reference {
                kind: ReferenceKind::Inline,
                source_block_id: block.id.clone(),
                source_anchor: Some(block.glyph_id().unwrap_or(&block.id).to_string()),
                target,
                relation: None,
                label: (!text.is_empty()).then_some(text),
                resolved_block_id: None,
            });
        }
    });
    references
}

fn block_links(data: &BlockData, out: &mut Vec<(String, String)>) {
    match data {
        BlockData::Heading(h) => inline_links(&h.children, out),
        BlockData::Paragraph(p) => inline_links(&p.children, out),
        BlockData::Blockquote(q) => inline_links(&q.children, out),
        BlockData::List(list) => list_links(list, out),
        BlockData::Table(table) => {
            for cell in table.header.iter().chain(table.rows.iter().flatten()) {
                inline_links(cell, out);
            }
        }
        BlockData::Component(component) => {
            for value in component.props.values() {
                prop_links(value, out);
            }
        }
        BlockData::Container(container) => {
            for value in container.props.values() {
                prop_links(value, out);
            }
            for section in container.sections() {
                match section {
                    Section::Entry(entry) => {
                        for value in entry.props.values() {
                            prop_links(value, out);
                        }
                        // Compiled content is walked as blocks of its own.
                        if let Some(SectionContent::Markdown(markdown)) = &entry.content {
                            string_links(markdown, out);
                        }
                    }
                    Section::Malformed(value) => prop_links(value, out),
                }
            }
        }
        BlockData::Image(_) | BlockData::Code(_) | BlockData::ThematicBreak {} | BlockData::Html(_) => {}
    }
}

fn inline_links(inlines: &[Inline], out: &mut Vec<(String, String)>) {
    for_each_link(inlines, &mut |url, text| out.push((url.to_string(), text)));
}

fn list_links(list: &List, out: &mut Vec<(String, String)>) {
    for item in &list.items {
        inline_links(&item.children, out);
        if let Some(sublist) = &item.sublist {
            list_links(sublist, out);
        }
    }
}

fn prop_links(value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::String(s) => string_links(s, out),
        Value::Array(items) => items.iter().for_each(|v| prop_links(v, out)),
        Value::Object(fields) => fields.values().for_each(|v| prop_links(v, out)),
        _ => {}
    }
}

fn string_links(text: &str, out: &mut Vec<(String, String)>) {
    for caps in PROP_LINK.captures_iter(text) {
        out.push((caps[2].to_string(), caps[1].to_string()));
    }
}

/// Resolve `references` in order against `index`.
///
/// Each reference either gains a `resolved_block_id` or adds exactly one
/// diagnostic. References already resolved are skipped, so a cross-document
/// linker can run this again with its own index.
pub fn resolve_references(
    references: &mut [Reference],
    document_id: &str,
    index: &BlockIndex,
    diagnostics: &mut Diagnostics,
) {
    for reference in references.iter_mut().filter(|r| !r.is_resolved()) {
        let position = index.position(&reference.source_block_id);
        let target = &reference.target;

        let outcome = if target.is_cross_document(document_id) {
            Err(Diagnostic::info(
                DiagnosticSource::References,
                DiagnosticCode::CrossDocumentReference,
                format!(
                    "reference to \"{}\" in document \"{}\" is left for cross-document linking",
                    target.id,
                    target.document_id.as_deref().unwrap_or_default()
                ),
            ))
        } else {
            match index.claimants(&target.id) {
                [only] => Ok(only.clone()),
                [] if index.contains(&target.id) => Ok(target.id.clone()),
                [] => Err(Diagnostic::error(
                    DiagnosticSource::References,
                    DiagnosticCode::UnresolvedReference,
                    format!("reference target \"{}\" not found", target.id),
                )),
                many => Err(Diagnostic::error(
                    DiagnosticSource::References,
                    DiagnosticCode::AmbiguousReference,
                    format!(
                        "reference target \"{}\" is declared by several blocks: {}",
                        target.id,
                        many.join(", ")
                    ),
                )),
            }
        };

        match outcome {
            Ok(resolved) => reference.resolved_block_id = Some(resolved),
            Err(mut diagnostic) => {
                if let Some(position) = position {
                    diagnostic = diagnostic.at(position);
                }
                diagnostics.push(diagnostic);
            }
        }
    }
}
