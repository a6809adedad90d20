use crate::ast;
use crate::context::TranslationContext;
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSource};
use crate::ir::block::walk_blocks;
use crate::ir::{Block, BlockData, Section, SectionContent, SectionEntry};
use crate::translate::translate;

/// Compile the nested Markdown of every container in `blocks`, depth-first.
///
/// Each section string is replaced by its compiled blocks. A container whose
/// sections would sit deeper than `ctx.max_depth` is reported once and left raw.
pub fn compile_containers(blocks: &mut [Block], ctx: &mut TranslationContext<'_>) {
    for (index, block) in blocks.iter_mut().enumerate() {
        let BlockData::Container(container) = &mut block.data else {
            continue;
        };
        if !container.has_markdown() {
            continue;
        }
        if ctx.depth() >= ctx.max_depth {
            ctx.report(
                Diagnostic::error(
                    DiagnosticSource::Container,
                    DiagnosticCode::RecursionDepthExceeded,
                    format!(
                        "{} block nested deeper than the limit of {}",
                        block.kind, ctx.max_depth
                    ),
                )
                .at(block.position),
            );
            continue;
        }

        let Some(sections) = container.sections.as_mut() else {
            continue;
        };
        for (s, section) in sections.iter_mut().enumerate() {
            let Section::Entry(SectionEntry {
                content: Some(content),
                ..
            }) = section
            else {
                continue;
            };
            let SectionContent::Markdown(markdown) = content else {
                continue;
            };
            let nested = ctx.enter_section(index, s, block.position, |ctx| {
                tracing::trace!(depth = ctx.depth(), kind = %block.kind, section = s, "compiling nested section");
                compile_fragment(markdown, ctx)
            });
            *content = SectionContent::Blocks(nested);
        }
    }
}

/// Parse, translate, and compile containers for a nested Markdown text.
pub fn compile_fragment(markdown: &str, ctx: &mut TranslationContext<'_>) -> Vec<Block> {
    let root = ast::parse(markdown);
    let mut blocks = translate(&root.children, ctx);
    compile_containers(&mut blocks, ctx);
    blocks
}

/// Run each container's structural validator, nested containers included.
/// Reports one error per violation; never touches block data.
pub fn validate_containers(blocks: &[Block], ctx: &mut TranslationContext<'_>) {
    let registry = ctx.registry;
    walk_blocks(blocks, &mut |block| {
        if !block.is_container() {
            return;
        }
        for violation in registry.validate(&block.kind, &block.data) {
            ctx.report(
                Diagnostic::error(
                    DiagnosticSource::Container,
                    DiagnosticCode::SchemaValidationError,
                    format!("block {} ({}): {}", block.id, block.kind, violation),
                )
                .at(block.position),
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::schema::SchemaRegistry;

    const TABS: &str = "```ui:tabs\ntabs:\n  - label: One\n    content: |\n      # Inner\n\n      Body text\n  - label: Two\n    content: plain\n```\n";

    fn compile(source: &str, max_depth: usize) -> (Vec<Block>, Diagnostics) {
        let registry = SchemaRegistry::builtin();
        let mut ctx = TranslationContext::new("doc".into(), &registry, max_depth, Diagnostics::new());
        let blocks = compile_fragment(source, &mut ctx);
        validate_containers(&blocks, &mut ctx);
        (blocks, ctx.diagnostics)
    }

    fn nested_kinds(block: &Block) -> Vec<Vec<String>> {
        let BlockData::Container(container) = &block.data else {
            panic!("expected container");
        };
        container
            .nested_blocks()
            .map(|(_, blocks)| blocks.iter().map(|b| b.kind.clone()).collect())
            .collect()
    }

    #[test]
    fn sections_compile_to_blocks() {
        let (blocks, diags) = compile(TABS, 8);
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(
            nested_kinds(&blocks[0]),
            vec![vec!["heading", "paragraph"], vec!["paragraph"]]
        );
    }

    #[test]
    fn nested_blocks_take_the_container_position() {
        let (blocks, _) = compile(&format!("Intro\n\n{}", TABS), 8);
        let BlockData::Container(container) = &blocks[1].data else {
            panic!("expected container");
        };
        for (_, nested) in container.nested_blocks() {
            for block in nested {
                assert_eq!(block.position, blocks[1].position);
            }
        }
    }

    #[test]
    fn depth_limit_reports_once_and_keeps_markdown() {
        let source = "```ui:tabs\ntabs:\n  - label: Outer\n    content: |\n      ```ui:tabs\n      tabs:\n        - label: Inner\n          content: deep\n        - label: Inner2\n          content: deeper\n      ```\n```\n";
        let (blocks, diags) = compile(source, 1);
        let codes: Vec<_> = diags.iter().map(|d| d.code).collect();
        assert_eq!(codes, vec![DiagnosticCode::RecursionDepthExceeded]);

        let BlockData::Container(outer) = &blocks[0].data else {
            panic!("expected container");
        };
        let (_, nested) = outer.nested_blocks().next().unwrap();
        let BlockData::Container(inner) = &nested[0].data else {
            panic!("expected nested container");
        };
        assert!(inner.has_markdown());
    }

    #[test]
    fn violations_name_the_block() {
        let (blocks, diags) = compile("```ui:steps\nsteps:\n  - content: x\n    status: done\n```\n", 8);
        let messages: Vec<_> = diags.iter().map(|d| d.message.clone()).collect();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.starts_with(&format!("block {} (ui:steps)", blocks[0].id))));
        assert!(diags.iter().all(|d| d.source == DiagnosticSource::Container));
    }

    #[test]
    fn empty_items_are_reported() {
        let (_, diags) = compile("```ui:tabs\ntabs: []\n```\n", 8);
        assert_eq!(diags.len(), 1);
    }
}
