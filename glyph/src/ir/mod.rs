pub mod block;
pub mod reference;

pub use block::{
    Block, BlockData, BlockquoteData, CodeData, ComponentData, ContainerData, HeadingData,
    HtmlData, ImageData, ParagraphData, Section, SectionContent, SectionEntry,
};
pub use reference::{Reference, ReferenceKind, ReferenceTarget};

use serde::Serialize;

use crate::diagnostics::Diagnostic;

pub const IR_VERSION: &str = "1.0.0";

/// The compiled document. Immutable once returned from the compiler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlyphIR {
    pub version: String,
    pub id: String,
    pub metadata: DocumentMetadata,
    pub blocks: Vec<Block>,
    pub references: Vec<Reference>,
    pub layout: LayoutHints,
}

impl GlyphIR {
    /// Find a block anywhere in the tree by its final id.
    pub fn find_block(&self, id: &str) -> Option<&Block> {
        let mut found = None;
        block::walk_blocks(&self.blocks, &mut |block| {
            if found.is_none() && block.id == id {
                found = Some(block);
            }
        });
        found
    }

    /// All block ids in depth-first order, nested blocks included.
    pub fn all_block_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        block::walk_blocks(&self.blocks, &mut |block| ids.push(block.id.as_str()));
        ids
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Document,
    Dashboard,
    Presentation,
}

impl LayoutMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "document" => Some(LayoutMode::Document),
            "dashboard" => Some(LayoutMode::Dashboard),
            "presentation" => Some(LayoutMode::Presentation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Spacing {
    Compact,
    #[default]
    Normal,
    Relaxed,
}

impl Spacing {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "compact" => Some(Spacing::Compact),
            "normal" => Some(Spacing::Normal),
            "relaxed" => Some(Spacing::Relaxed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutHints {
    pub mode: LayoutMode,
    pub spacing: Spacing,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<String>,
}

/// Output of one compile call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationResult {
    pub ir: GlyphIR,
    pub diagnostics: Vec<Diagnostic>,
    pub has_errors: bool,
}

impl CompilationResult {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}
