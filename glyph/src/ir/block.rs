use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::ast::{Inline, List, SourceRange, Table};

/// Key under which components declare their stable anchor.
pub const GLYPH_ID_KEY: &str = "glyph-id";

/// One typed content unit in the IR.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    /// Content-addressed at creation; rewritten at most once to break collisions.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: BlockData,
    pub position: SourceRange,
}

impl Block {
    /// Author-declared stable anchor, if any.
    pub fn glyph_id(&self) -> Option<&str> {
        self.data.glyph_id()
    }

    pub fn is_container(&self) -> bool {
        matches!(self.data, BlockData::Container(_))
    }
}

/// Block payload, keyed by [`Block::kind`].
///
/// Markdown constructs get one variant each. `ui:*` components whose schema
/// declares nested Markdown become [`BlockData::Container`]; every other
/// component keeps its YAML payload as [`BlockData::Component`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BlockData {
    Heading(HeadingData),
    Paragraph(ParagraphData),
    Image(ImageData),
    List(List),
    Code(CodeData),
    Blockquote(BlockquoteData),
    Table(Table),
    ThematicBreak {},
    Html(HtmlData),
    Container(ContainerData),
    Component(ComponentData),
}

impl BlockData {
    /// The block's glyph-id. Blank ids are rejected at translation and read as absent.
    pub fn glyph_id(&self) -> Option<&str> {
        let id = match self {
            BlockData::Heading(h) => h.anchor.as_deref(),
            BlockData::Component(c) => c.props.get(GLYPH_ID_KEY).and_then(Value::as_str),
            BlockData::Container(c) => c.props.get(GLYPH_ID_KEY).and_then(Value::as_str),
            _ => None,
        }?;
        (!id.trim().is_empty()).then_some(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadingData {
    pub depth: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    pub children: Vec<Inline>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParagraphData {
    pub children: Vec<Inline>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockquoteData {
    pub children: Vec<Inline>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageData {
    pub src: String,
    pub alt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HtmlData {
    pub value: String,
}

/// A component payload the compiler has no structure for beyond its schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ComponentData {
    pub props: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

/// A component whose items each carry a nested Markdown field.
///
/// `items_field` and `content_field` come from the type's container schema,
/// e.g. `tabs` / `content` for `ui:tabs`. Serializes back into the shape the
/// author wrote, with each section's content replaced by compiled blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerData {
    pub items_field: String,
    pub content_field: String,
    /// Every top-level prop except the items array.
    pub props: Map<String, Value>,
    /// `None` when the items field is missing or not an array; a non-array
    /// value is left in `props` for the validator to report.
    pub sections: Option<Vec<Section>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Entry(SectionEntry),
    /// An item that is not a mapping.
    Malformed(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionEntry {
    /// Every prop except the content field.
    pub props: Map<String, Value>,
    pub content: Option<SectionContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SectionContent {
    /// Raw Markdown, not yet compiled.
    Markdown(String),
    Blocks(Vec<Block>),
    /// Content that is neither a string nor compiled blocks.
    Other(Value),
}

impl ContainerData {
    pub fn from_props(mut props: Map<String, Value>, items_field: &str, content_field: &str) -> Self {
        let sections = match props.remove(items_field) {
            Some(Value::Array(items)) => Some(
                items
                    .into_iter()
                    .map(|item| Section::from_value(item, content_field))
                    .collect(),
            ),
            Some(other) => {
                props.insert(items_field.to_string(), other);
                None
            }
            None => None,
        };
        ContainerData {
            items_field: items_field.to_string(),
            content_field: content_field.to_string(),
            props,
            sections,
        }
    }

    pub fn sections(&self) -> &[Section] {
        self.sections.as_deref().unwrap_or(&[])
    }

    /// Compiled nested sequences, with their section index.
    pub fn nested_blocks(&self) -> impl Iterator<Item = (usize, &[Block])> {
        self.sections
            .iter()
            .flatten()
            .enumerate()
            .filter_map(|(i, section)| match section {
                Section::Entry(SectionEntry {
                    content: Some(SectionContent::Blocks(blocks)),
                    ..
                }) => Some((i, blocks.as_slice())),
                _ => None,
            })
    }

    pub fn nested_blocks_mut(&mut self) -> impl Iterator<Item = (usize, &mut Vec<Block>)> {
        self.sections
            .iter_mut()
            .flatten()
            .enumerate()
            .filter_map(|(i, section)| match section {
                Section::Entry(SectionEntry {
                    content: Some(SectionContent::Blocks(blocks)),
                    ..
                }) => Some((i, blocks)),
                _ => None,
            })
    }

    /// True if any section still holds uncompiled Markdown.
    pub fn has_markdown(&self) -> bool {
        self.sections().iter().any(|section| {
            matches!(
                section,
                Section::Entry(SectionEntry {
                    content: Some(SectionContent::Markdown(_)),
                    ..
                })
            )
        })
    }
}

impl Section {
    fn from_value(item: Value, content_field: &str) -> Self {
        match item {
            Value::Object(mut props) => {
                let content = props.remove(content_field).map(|v| match v {
                    Value::String(markdown) => SectionContent::Markdown(markdown),
                    other => SectionContent::Other(other),
                });
                Section::Entry(SectionEntry { props, content })
            }
            other => Section::Malformed(other),
        }
    }
}

impl Serialize for ContainerData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.props.len() + usize::from(self.sections.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, value) in &self.props {
            map.serialize_entry(key, value)?;
        }
        if let Some(sections) = &self.sections {
            map.serialize_entry(
                &self.items_field,
                &SectionsSer {
                    sections,
                    content_field: &self.content_field,
                },
            )?;
        }
        map.end()
    }
}

struct SectionsSer<'a> {
    sections: &'a [Section],
    content_field: &'a str,
}

impl Serialize for SectionsSer<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.sections.len()))?;
        for section in self.sections {
            match section {
                Section::Malformed(value) => seq.serialize_element(value)?,
                Section::Entry(entry) => seq.serialize_element(&EntrySer {
                    entry,
                    content_field: self.content_field,
                })?,
            }
        }
        seq.end()
    }
}

struct EntrySer<'a> {
    entry: &'a SectionEntry,
    content_field: &'a str,
}

impl Serialize for EntrySer<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.entry.props.len() + usize::from(self.entry.content.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, value) in &self.entry.props {
            map.serialize_entry(key, value)?;
        }
        if let Some(content) = &self.entry.content {
            map.serialize_entry(self.content_field, content)?;
        }
        map.end()
    }
}

/// Visit every block depth-first (pre-order), descending into compiled containers.
pub fn walk_blocks<'a>(blocks: &'a [Block], f: &mut impl FnMut(&'a Block)) {
    for block in blocks {
        f(block);
        if let BlockData::Container(container) = &block.data {
            for (_, nested) in container.nested_blocks() {
                walk_blocks(nested, f);
            }
        }
    }
}
