mod parser;
pub mod position;

pub use parser::parse;
pub use position::{LineIndex, SourcePoint, SourceRange};

use serde::Serialize;

/// The position-annotated syntax tree for one Markdown text.
#[derive(Debug, Clone, PartialEq)]
pub struct Root {
    pub children: Vec<Node>,
}

impl Root {
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// A block-level node with its source range.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub position: SourceRange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Leading `---` frontmatter. Only ever the first child.
    Yaml { value: String },
    Heading {
        depth: u8,
        /// `{#anchor}` heading attribute.
        anchor: Option<String>,
        children: Vec<Inline>,
    },
    Paragraph { children: Vec<Inline> },
    Code {
        lang: Option<String>,
        meta: Option<String>,
        value: String,
    },
    List(List),
    Blockquote { children: Vec<Node> },
    Table(Table),
    ThematicBreak,
    Html { value: String },
    /// A construct the parser recognises but the IR has no block for.
    Unsupported { name: &'static str },
}

/// A Markdown list. Shared between the AST and list block data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub ordered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    pub items: Vec<ListItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    /// Task list state, when the item carries a `[ ]`/`[x]` marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    pub children: Vec<Inline>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sublist: Option<List>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub align: Vec<ColumnAlignment>,
    pub header: Vec<Vec<Inline>>,
    pub rows: Vec<Vec<Vec<Inline>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnAlignment {
    None,
    Left,
    Center,
    Right,
}

/// Inline elements that appear within a line of text.
/// Inline types nest freely within one another.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inline {
    Text { value: String },
    Strong { children: Vec<Inline> },
    Emphasis { children: Vec<Inline> },
    Delete { children: Vec<Inline> },
    InlineCode { value: String },
    Link {
        url: String,
        #[serde(skip_serializing_if = "String::is_empty")]
        title: String,
        children: Vec<Inline>,
    },
    Image {
        url: String,
        #[serde(skip_serializing_if = "String::is_empty")]
        title: String,
        alt: Vec<Inline>,
    },
    Html { value: String },
    SoftBreak,
    Break,
}

impl Inline {
    pub fn text(value: impl Into<String>) -> Self {
        Inline::Text {
            value: value.into(),
        }
    }
}

/// Concatenate the text content of inline nodes. Breaks become single spaces.
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    push_plain_text(inlines, &mut out);
    out
}

fn push_plain_text(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text { value } | Inline::InlineCode { value } => out.push_str(value),
            Inline::Strong { children }
            | Inline::Emphasis { children }
            | Inline::Delete { children }
            | Inline::Link { children, .. } => push_plain_text(children, out),
            Inline::Image { alt, .. } => push_plain_text(alt, out),
            Inline::SoftBreak | Inline::Break => out.push(' '),
            Inline::Html { .. } => {}
        }
    }
}

/// Visit every link in `inlines`, depth-first, as `(url, link text)`.
pub fn for_each_link(inlines: &[Inline], f: &mut impl FnMut(&str, String)) {
    for inline in inlines {
        match inline {
            Inline::Link { url, children, .. } => {
                f(url, plain_text(children));
                for_each_link(children, f);
            }
            Inline::Strong { children }
            | Inline::Emphasis { children }
            | Inline::Delete { children } => for_each_link(children, f),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_flattens_nesting_and_breaks() {
        let inlines = vec![
            Inline::text("Hello"),
            Inline::SoftBreak,
            Inline::Strong {
                children: vec![Inline::text("big")],
            },
            Inline::text(" "),
            Inline::InlineCode {
                value: "code".into(),
            },
        ];
        assert_eq!(plain_text(&inlines), "Hello big code");
    }

    #[test]
    fn links_are_visited_inside_emphasis() {
        let inlines = vec![Inline::Emphasis {
            children: vec![Inline::Link {
                url: "#glyph:a".into(),
                title: String::new(),
                children: vec![Inline::text("see a")],
            }],
        }];
        let mut seen = Vec::new();
        for_each_link(&inlines, &mut |url, text| seen.push((url.to_string(), text)));
        assert_eq!(seen, vec![("#glyph:a".to_string(), "see a".to_string())]);
    }
}
