use crate::ast::plain_text;
use crate::ir::{Block, BlockData, DocumentMetadata};

/// Back-fill a missing title and description from top-level blocks.
///
/// The title comes from the first depth-1 heading, the description from the
/// first paragraph. Fields already set are never replaced.
pub fn infer_metadata(metadata: &mut DocumentMetadata, blocks: &[Block]) {
    if metadata.title.is_none() {
        metadata.title = blocks.iter().find_map(|block| match &block.data {
            BlockData::Heading(heading) if heading.depth == 1 => {
                Some(plain_text(&heading.children).trim().to_string())
            }
            _ => None,
        });
    }
    if metadata.description.is_none() {
        metadata.description = blocks.iter().find_map(|block| match &block.data {
            BlockData::Paragraph(paragraph) => Some(plain_text(&paragraph.children).trim().to_string()),
            _ => None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Inline, SourceRange};
    use crate::ir::{HeadingData, ParagraphData};

    fn heading(depth: u8, text: &str) -> Block {
        Block {
            id: format!("h{}", depth),
            kind: "heading".into(),
            data: BlockData::Heading(HeadingData {
                depth,
                anchor: None,
                children: vec![Inline::text(text)],
            }),
            position: SourceRange::default(),
        }
    }

    fn paragraph(children: Vec<Inline>) -> Block {
        Block {
            id: "p".into(),
            kind: "paragraph".into(),
            data: BlockData::Paragraph(ParagraphData { children }),
            position: SourceRange::default(),
        }
    }

    #[test]
    fn fills_missing_fields() {
        let blocks = vec![
            heading(2, "Sub"),
            paragraph(vec![
                Inline::text("Line one"),
                Inline::SoftBreak,
                Inline::Strong {
                    children: vec![Inline::text("two")],
                },
            ]),
            heading(1, "Main"),
        ];
        let mut metadata = DocumentMetadata::default();
        infer_metadata(&mut metadata, &blocks);
        assert_eq!(metadata.title.as_deref(), Some("Main"));
        assert_eq!(metadata.description.as_deref(), Some("Line one two"));
    }

    #[test]
    fn existing_fields_win() {
        let blocks = vec![heading(1, "Inferred"), paragraph(vec![Inline::text("Inferred")])];
        let mut metadata = DocumentMetadata {
            title: Some("Set".into()),
            description: Some("Also set".into()),
            ..Default::default()
        };
        infer_metadata(&mut metadata, &blocks);
        assert_eq!(metadata.title.as_deref(), Some("Set"));
        assert_eq!(metadata.description.as_deref(), Some("Also set"));
    }

    #[test]
    fn nothing_to_infer() {
        let mut metadata = DocumentMetadata::default();
        infer_metadata(&mut metadata, &[]);
        assert_eq!(metadata, DocumentMetadata::default());
    }
}
