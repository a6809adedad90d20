use std::collections::BTreeMap;

use crate::ast;
use crate::config::CompilerConfig;
use crate::container::{compile_containers, validate_containers};
use crate::context::TranslationContext;
use crate::diagnostics::Diagnostics;
use crate::frontmatter;
use crate::ids::{finalize_block_ids, generate_document_id};
use crate::ir::{CompilationResult, GlyphIR, IR_VERSION, Reference};
use crate::metadata::infer_metadata;
use crate::references::{
    BlockIndex, extract_inline_references, resolve_references, validate_glyph_ids,
};
use crate::schema::SchemaRegistry;
use crate::translate::translate;

/// Per-document inputs that are not part of the Markdown text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Source path, recorded as `sourceFile` and mixed into the hashed document id.
    pub file_path: Option<String>,
    /// Forces the document id, ahead of any frontmatter `glyph-id`.
    pub document_id: Option<String>,
}

impl CompileOptions {
    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_document_id(mut self, id: impl Into<String>) -> Self {
        self.document_id = Some(id.into());
        self
    }
}

/// Compiles Glyph Markdown into [`GlyphIR`].
///
/// Holds configuration and schemas only, so one compiler can serve any number
/// of documents, from any number of threads.
pub struct Compiler {
    config: CompilerConfig,
    registry: SchemaRegistry,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_config(CompilerConfig::default())
    }

    /// Built-in schemas plus the containers declared in `config`.
    pub fn with_config(config: CompilerConfig) -> Self {
        let mut registry = SchemaRegistry::builtin();
        for (kind, schema) in &config.containers {
            registry.register_container(kind, schema.clone());
        }
        Compiler { config, registry }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Register extra validators or containers before compiling.
    pub fn registry_mut(&mut self) -> &mut SchemaRegistry {
        &mut self.registry
    }

    /// Compile one document. Never fails: problems are reported as diagnostics
    /// next to a best-effort IR.
    pub fn compile(&self, markdown: &str, options: &CompileOptions) -> CompilationResult {
        let root = ast::parse(markdown);
        let mut diagnostics = Diagnostics::new();
        let frontmatter = frontmatter::extract(root.children.first(), &mut diagnostics);

        let document_id = generate_document_id(
            options.document_id.as_deref(),
            frontmatter.glyph_id.as_deref(),
            options.file_path.as_deref(),
            markdown,
        );
        let span = tracing::debug_span!("compile", document_id = %document_id);
        let _enter = span.enter();

        let mut ctx = TranslationContext::new(
            document_id,
            &self.registry,
            self.config.max_container_depth,
            diagnostics,
        );
        let mut blocks = translate(&root.children, &mut ctx);
        tracing::debug!(blocks = blocks.len(), "translated top-level blocks");

        compile_containers(&mut blocks, &mut ctx);
        validate_containers(&blocks, &mut ctx);

        let mut metadata = frontmatter.metadata;
        if metadata.source_file.is_none() {
            metadata.source_file.clone_from(&options.file_path);
        }
        infer_metadata(&mut metadata, &blocks);

        let finals = finalize_block_ids(&mut blocks);
        tracing::debug!(blocks = finals.len(), "finalized block ids");

        let document_id = ctx.document_id;
        let mut diagnostics = ctx.diagnostics;

        let mut references: Vec<Reference> = ctx
            .references
            .into_iter()
            .map(|pending| {
                let mut reference = pending.reference;
                if let Some(id) = finals.get(&pending.source) {
                    reference.source_block_id.clone_from(id);
                    reference.source_anchor.get_or_insert_with(|| id.clone());
                }
                reference
            })
            .collect();

        let glyph_ids: BTreeMap<String, Vec<String>> = ctx
            .block_id_map
            .into_iter()
            .map(|(glyph_id, paths)| {
                let ids = paths.iter().filter_map(|p| finals.get(p).cloned()).collect();
                (glyph_id, ids)
            })
            .collect();
        let index = BlockIndex::new(&blocks, glyph_ids);
        validate_glyph_ids(&index, &mut diagnostics);

        references.extend(extract_inline_references(&blocks));
        resolve_references(&mut references, &document_id, &index, &mut diagnostics);
        tracing::debug!(
            references = references.len(),
            resolved = references.iter().filter(|r| r.is_resolved()).count(),
            diagnostics = diagnostics.len(),
            "resolved references"
        );

        let has_errors = diagnostics.has_errors();
        CompilationResult {
            ir: GlyphIR {
                version: IR_VERSION.to_string(),
                id: document_id,
                metadata,
                blocks,
                references,
                layout: frontmatter.layout,
            },
            diagnostics: diagnostics.into_vec(),
            has_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticCode;
    use crate::schema::ContainerSchema;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn compiler_is_shareable() {
        assert_send_sync::<Compiler>();
    }

    #[test]
    fn source_file_comes_from_options() {
        let result = Compiler::new().compile("Text", &CompileOptions::default().with_file_path("a.md"));
        assert_eq!(result.ir.metadata.source_file.as_deref(), Some("a.md"));
        assert_eq!(result.ir.version, IR_VERSION);
    }

    #[test]
    fn explicit_refs_are_rewritten_to_final_ids() {
        let source = "```ui:chart\nrefs: [intro]\n```\n\n```ui:chart\nrefs: [intro]\n```\n\n# Intro {#intro}\n";
        let result = Compiler::new().compile(source, &CompileOptions::default());
        assert!(!result.has_errors, "{:?}", result.diagnostics);
        let ids = result.ir.all_block_ids();
        let sources: Vec<_> = result
            .ir
            .references
            .iter()
            .map(|r| r.source_block_id.as_str())
            .collect();
        assert_eq!(sources, vec![ids[0], ids[1]]);
        assert_ne!(ids[0], ids[1]);
        assert!(result.ir.references.iter().all(|r| r.resolved_block_id.as_deref() == Some(ids[2])));
    }

    #[test]
    fn configured_containers_compile_nested_markdown() {
        let mut config = CompilerConfig::default();
        config
            .containers
            .insert("ui:accordion".into(), ContainerSchema::new("panels", "body"));
        let compiler = Compiler::with_config(config);
        assert!(compiler.config().containers.contains_key("ui:accordion"));
        let result = compiler.compile(
            "```ui:accordion\npanels:\n  - body: \"## Inside\"\n```\n",
            &CompileOptions::default(),
        );
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        assert_eq!(result.ir.all_block_ids().len(), 2);
        assert_eq!(
            result.ir.find_block(result.ir.all_block_ids()[1]).map(|b| b.kind.as_str()),
            Some("heading")
        );
    }

    #[test]
    fn custom_validators_can_be_registered() {
        struct RequireTitle;
        impl crate::schema::BlockValidator for RequireTitle {
            fn validate(&self, data: &crate::ir::BlockData) -> Vec<crate::schema::Violation> {
                match data {
                    crate::ir::BlockData::Component(c) if c.props.contains_key("title") => vec![],
                    _ => vec![crate::schema::Violation::new("title", "missing required field")],
                }
            }
        }

        let mut compiler = Compiler::new();
        compiler.registry_mut().register_validator("ui:chart", RequireTitle);
        let result = compiler.compile("```ui:chart\ntype: bar\n```\n", &CompileOptions::default());
        let codes: Vec<_> = result.diagnostics.iter().map(|d| d.code).collect();
        assert_eq!(codes, vec![DiagnosticCode::SchemaValidationError]);
        assert!(result.has_errors);
    }
}
