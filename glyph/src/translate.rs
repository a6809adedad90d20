use crate::ast::{Inline, Node, NodeKind};
use crate::component::{self, COMPONENT_PREFIX};
use crate::context::{PendingReference, TranslationContext};
use crate::ids::provisional_block_id;
use crate::ir::{
    Block, BlockData, BlockquoteData, CodeData, HeadingData, HtmlData, ImageData, ParagraphData,
    Reference, ReferenceKind,
};

/// Translate a sequence of AST nodes into blocks with provisional ids.
///
/// YAML nodes and unsupported constructs produce no block. Declared refs and
/// glyph-ids are recorded in `ctx` against the block's path.
pub fn translate(nodes: &[Node], ctx: &mut TranslationContext<'_>) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(nodes.len());

    for node in nodes {
        let position = ctx.position(node.position);
        let (kind, data, declared) = match &node.kind {
            NodeKind::Code {
                lang: Some(lang), value, ..
            } if lang.starts_with(COMPONENT_PREFIX) => {
                let (data, declared) = component::translate_component(lang, value, position, ctx);
                (lang.clone(), data, declared)
            }
            other => match translate_markdown(other) {
                Some((kind, data)) => (kind.to_string(), data, Vec::new()),
                None => continue,
            },
        };

        let id = provisional_block_id(&ctx.document_id, &kind, &data);
        let path = ctx.path_for(blocks.len());
        let glyph_id = data.glyph_id().map(str::to_string);
        if let Some(glyph_id) = &glyph_id {
            ctx.record_glyph_id(glyph_id, path.clone());
        }
        for declared in declared {
            ctx.references.push(PendingReference {
                source: path.clone(),
                reference: Reference {
                    kind: ReferenceKind::Explicit,
                    source_block_id: id.clone(),
                    source_anchor: glyph_id.clone(),
                    target: declared.target,
                    relation: declared.relation,
                    label: declared.label,
                    resolved_block_id: None,
                },
            });
        }

        blocks.push(Block {
            id,
            kind,
            data,
            position,
        });
    }

    blocks
}

fn translate_markdown(kind: &NodeKind) -> Option<(&'static str, BlockData)> {
    let translated = match kind {
        NodeKind::Heading {
            depth,
            anchor,
            children,
        } => (
            "heading",
            BlockData::Heading(HeadingData {
                depth: *depth,
                anchor: anchor.clone(),
                children: children.clone(),
            }),
        ),
        NodeKind::Paragraph { children } => match lone_image(children) {
            Some(image) => ("image", BlockData::Image(image)),
            None => (
                "paragraph",
                BlockData::Paragraph(ParagraphData {
                    children: children.clone(),
                }),
            ),
        },
        NodeKind::List(list) => ("list", BlockData::List(list.clone())),
        NodeKind::Code { lang, meta, value } => (
            "code",
            BlockData::Code(CodeData {
                language: lang.clone(),
                meta: meta.clone(),
                value: value.clone(),
            }),
        ),
        NodeKind::Blockquote { children } => (
            "blockquote",
            BlockData::Blockquote(BlockquoteData {
                children: flatten_quote(children),
            }),
        ),
        NodeKind::Table(table) => ("table", BlockData::Table(table.clone())),
        NodeKind::ThematicBreak => ("thematic-break", BlockData::ThematicBreak {}),
        NodeKind::Html { value } => (
            "html",
            BlockData::Html(HtmlData {
                value: value.clone(),
            }),
        ),
        NodeKind::Yaml { .. } | NodeKind::Unsupported { .. } => return None,
    };
    Some(translated)
}

/// A paragraph that is exactly one image, ignoring whitespace and line breaks.
fn lone_image(children: &[Inline]) -> Option<ImageData> {
    let mut significant = children.iter().filter(|inline| match inline {
        Inline::Text { value } => !value.trim().is_empty(),
        Inline::SoftBreak | Inline::Break => false,
        _ => true,
    });
    let image = significant.next()?;
    if significant.next().is_some() {
        return None;
    }
    match image {
        Inline::Image { url, title, alt } => Some(ImageData {
            src: url.clone(),
            alt: crate::ast::plain_text(alt),
            title: (!title.is_empty()).then(|| title.clone()),
        }),
        _ => None,
    }
}

/// Join the inline content of a quote's paragraphs (and nested quotes) with soft breaks.
fn flatten_quote(children: &[Node]) -> Vec<Inline> {
    let mut out = Vec::new();
    for child in children {
        let inlines = match &child.kind {
            NodeKind::Paragraph { children } | NodeKind::Heading { children, .. } => {
                children.clone()
            }
            NodeKind::Blockquote { children } => flatten_quote(children),
            _ => continue,
        };
        if inlines.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(Inline::SoftBreak);
        }
        out.extend(inlines);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast;
    use crate::diagnostics::Diagnostics;
    use crate::schema::SchemaRegistry;

    fn blocks_of(source: &str) -> (Vec<Block>, Vec<PendingReference>) {
        let registry = SchemaRegistry::builtin();
        let mut ctx = TranslationContext::new("doc".into(), &registry, 8, Diagnostics::new());
        let root = ast::parse(source);
        let blocks = translate(&root.children, &mut ctx);
        (blocks, ctx.references)
    }

    fn kinds(blocks: &[Block]) -> Vec<&str> {
        blocks.iter().map(|b| b.kind.as_str()).collect()
    }

    #[test]
    fn markdown_constructs_map_to_block_types() {
        let (blocks, _) = blocks_of(
            "---\ntitle: x\n---\n# Title\n\nText\n\n- a\n- b\n\n```rust\nfn main() {}\n```\n\n> quoted\n\n| a |\n|---|\n| 1 |\n\n---\n\n<div>hi</div>\n",
        );
        assert_eq!(
            kinds(&blocks),
            vec![
                "heading",
                "paragraph",
                "list",
                "code",
                "blockquote",
                "table",
                "thematic-break",
                "html"
            ]
        );
        assert!(blocks.iter().all(|b| b.id.starts_with("b-")));
    }

    #[test]
    fn lone_image_paragraph_becomes_image_block() {
        let (blocks, _) = blocks_of("![A cat](cat.png \"Cat\")\n\n![x](y.png) and text\n");
        assert_eq!(kinds(&blocks), vec!["image", "paragraph"]);
        assert_eq!(
            blocks[0].data,
            BlockData::Image(ImageData {
                src: "cat.png".into(),
                alt: "A cat".into(),
                title: Some("Cat".into()),
            })
        );
    }

    #[test]
    fn quote_paragraphs_join_with_soft_breaks() {
        let (blocks, _) = blocks_of("> one\n>\n> two\n");
        let BlockData::Blockquote(quote) = &blocks[0].data else {
            panic!("expected blockquote");
        };
        assert_eq!(
            quote.children,
            vec![Inline::text("one"), Inline::SoftBreak, Inline::text("two")]
        );
    }

    #[test]
    fn component_refs_become_pending_explicit_references() {
        let (blocks, refs) = blocks_of(
            "# Intro {#intro}\n\n```ui:chart\nglyph-id: sales\nrefs:\n  - intro\n```\n",
        );
        assert_eq!(kinds(&blocks), vec!["heading", "ui:chart"]);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].source.indices(), &[1]);
        assert_eq!(refs[0].reference.kind, ReferenceKind::Explicit);
        assert_eq!(refs[0].reference.source_block_id, blocks[1].id);
        assert_eq!(refs[0].reference.source_anchor.as_deref(), Some("sales"));
    }

    #[test]
    fn identical_blocks_share_provisional_ids() {
        let (blocks, _) = blocks_of("Same\n\nSame\n");
        assert_eq!(blocks[0].id, blocks[1].id);
    }

    #[test]
    fn plain_code_is_not_a_component() {
        let (blocks, _) = blocks_of("```yaml\na: 1\n```\n");
        assert_eq!(
            blocks[0].data,
            BlockData::Code(CodeData {
                language: Some("yaml".into()),
                meta: None,
                value: "a: 1\n".into(),
            })
        );
    }
}
