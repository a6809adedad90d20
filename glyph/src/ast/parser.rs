use std::ops::Range;

use pulldown_cmark::{
    Alignment, CodeBlockKind, Event, HeadingLevel, Options, Parser as CmarkParser, Tag, TagEnd,
};

use crate::ast::position::LineIndex;
use crate::ast::{ColumnAlignment, Inline, List, ListItem, Node, NodeKind, Root, Table};

/// Deepest quote, list or inline nesting kept in the tree. Deeper quotes and
/// lists become [`NodeKind::Unsupported`]; deeper inlines collapse to text.
pub const MAX_NESTING: usize = 64;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse Markdown text into a position-annotated tree.
///
/// A leading `---` block is split off before pulldown-cmark sees the text and
/// becomes a [`NodeKind::Yaml`] first child. Parsing never fails: constructs
/// that have no node kind surface as [`NodeKind::Unsupported`].
pub fn parse(source: &str) -> Root {
    let index = LineIndex::new(source);
    let mut children = Vec::new();

    let body_start = match split_frontmatter(source) {
        Some(frontmatter) => {
            children.push(Node {
                kind: NodeKind::Yaml {
                    value: frontmatter.value.to_string(),
                },
                position: index.range(0..frontmatter.end),
            });
            frontmatter.body_start
        }
        None => 0,
    };

    let options = Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TABLES
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES;
    let body = &source[body_start..];
    let events: Vec<(Event<'_>, Range<usize>)> = CmarkParser::new_ext(body, options)
        .into_offset_iter()
        .map(|(ev, range)| (ev, range.start + body_start..range.end + body_start))
        .collect();

    let mut state = TreeState {
        index: &index,
        events: &events,
        i: 0,
        depth: 0,
    };
    children.extend(state.collect_blocks(&|_| false));

    Root { children }
}

// ---------------------------------------------------------------------------
// Frontmatter
// ---------------------------------------------------------------------------

struct Frontmatter<'a> {
    value: &'a str,
    /// End of the closing delimiter line, excluding its newline.
    end: usize,
    body_start: usize,
}

/// Split a leading `---` block off the source. The block must not be empty,
/// its first line must not be blank, and it closes with `---` or `...`.
fn split_frontmatter(source: &str) -> Option<Frontmatter<'_>> {
    let source_no_bom = source.strip_prefix('\u{feff}').unwrap_or(source);
    let bom = source.len() - source_no_bom.len();

    let first_line_end = source_no_bom.find('\n')?;
    if source_no_bom[..first_line_end].trim_end() != "---" {
        return None;
    }

    let value_start = bom + first_line_end + 1;
    let mut line_start = value_start;
    while line_start < source.len() {
        let rest = &source[line_start..];
        let line_len = rest.find('\n').unwrap_or(rest.len());
        let line = rest[..line_len].trim_end();

        if line_start == value_start && (line.is_empty() || line == "---" || line == "...") {
            return None;
        }
        if line_start > value_start && (line == "---" || line == "...") {
            let value = source[value_start..line_start].trim_end_matches(['\n', '\r']);
            let end = line_start + line_len;
            let body_start = (end + 1).min(source.len());
            return Some(Frontmatter {
                value,
                end,
                body_start,
            });
        }
        line_start += line_len + 1;
    }

    None
}

// ---------------------------------------------------------------------------
// Event walking
// ---------------------------------------------------------------------------

struct TreeState<'s, 'e> {
    index: &'s LineIndex<'s>,
    events: &'s [(Event<'e>, Range<usize>)],
    i: usize,
    depth: usize,
}

impl<'s, 'e> TreeState<'s, 'e> {
    /// Collect block nodes until `is_end` matches an End tag (consumed) or the
    /// events run out.
    fn collect_blocks(&mut self, is_end: &dyn Fn(&TagEnd) -> bool) -> Vec<Node> {
        let mut nodes = Vec::new();

        while self.i < self.events.len() {
            let (ev, range) = &self.events[self.i];
            let position = self.index.range(range.clone());

            let kind = match ev {
                Event::End(tag_end) if is_end(tag_end) => {
                    self.i += 1;
                    break;
                }

                Event::Start(Tag::Heading { level, id, .. }) => {
                    let depth = heading_level_to_u8(level);
                    let anchor = id.as_ref().map(|id| id.to_string());
                    self.i += 1;
                    let children = self.collect_inlines(&|e| matches!(e, TagEnd::Heading(_)));
                    NodeKind::Heading {
                        depth,
                        anchor,
                        children,
                    }
                }

                Event::Start(Tag::Paragraph) => {
                    self.i += 1;
                    let children = self.collect_inlines(&|e| matches!(e, TagEnd::Paragraph));
                    NodeKind::Paragraph { children }
                }

                Event::Start(Tag::CodeBlock(kind)) => {
                    let (lang, meta) = match kind {
                        CodeBlockKind::Fenced(info) => split_info_string(info),
                        CodeBlockKind::Indented => (None, None),
                    };
                    self.i += 1;
                    let value = self.collect_text(&|e| matches!(e, TagEnd::CodeBlock));
                    NodeKind::Code { lang, meta, value }
                }

                Event::Start(Tag::List(start)) => {
                    let start = *start;
                    match self.nested(|s| s.collect_list(start)) {
                        Some(list) => NodeKind::List(list),
                        None => {
                            self.skip_element();
                            NodeKind::Unsupported { name: "list" }
                        }
                    }
                }

                Event::Start(Tag::BlockQuote(_)) => {
                    let children =
                        self.nested(|s| s.collect_blocks(&|e| matches!(e, TagEnd::BlockQuote(_))));
                    match children {
                        Some(children) => NodeKind::Blockquote { children },
                        None => {
                            self.skip_element();
                            NodeKind::Unsupported { name: "blockquote" }
                        }
                    }
                }

                Event::Start(Tag::Table(alignments)) => {
                    let align = alignments.iter().map(convert_alignment).collect();
                    self.i += 1;
                    let (header, rows) = self.collect_table();
                    NodeKind::Table(Table {
                        align,
                        header,
                        rows,
                    })
                }

                Event::Start(Tag::HtmlBlock) => {
                    self.i += 1;
                    let value = self.collect_text(&|e| matches!(e, TagEnd::HtmlBlock));
                    NodeKind::Html { value }
                }

                Event::Rule => {
                    self.i += 1;
                    NodeKind::ThematicBreak
                }

                Event::Start(tag) => {
                    let name = tag_name(tag);
                    self.skip_element();
                    NodeKind::Unsupported { name }
                }

                _ => {
                    self.i += 1;
                    continue;
                }
            };

            nodes.push(Node { kind, position });
        }

        nodes
    }

    /// Collect inline nodes until a matching End tag.
    fn collect_inlines(&mut self, is_end: &dyn Fn(&TagEnd) -> bool) -> Vec<Inline> {
        let mut inlines = Vec::new();

        while self.i < self.events.len() {
            match &self.events[self.i].0 {
                Event::End(tag_end) if is_end(tag_end) => {
                    self.i += 1;
                    break;
                }
                _ => {
                    if !self.push_inline(&mut inlines) {
                        self.i += 1;
                    }
                }
            }
        }

        inlines
    }

    /// Consume one inline event (and its children) into `out`.
    /// Returns false without consuming anything if the event is not inline.
    fn push_inline(&mut self, out: &mut Vec<Inline>) -> bool {
        if self.depth >= MAX_NESTING && is_inline_start(&self.events[self.i].0) {
            let text = self.flatten_element();
            out.push(Inline::text(text));
            return true;
        }
        let inline = match &self.events[self.i].0 {
            Event::Text(s) => {
                self.i += 1;
                Inline::text(s.to_string())
            }
            Event::Code(s) => {
                self.i += 1;
                Inline::InlineCode {
                    value: s.to_string(),
                }
            }
            Event::InlineHtml(s) => {
                self.i += 1;
                Inline::Html {
                    value: s.to_string(),
                }
            }
            Event::SoftBreak => {
                self.i += 1;
                Inline::SoftBreak
            }
            Event::HardBreak => {
                self.i += 1;
                Inline::Break
            }
            Event::Start(Tag::Strong) => {
                self.i += 1;
                let children = self.collect_nested_inlines(&|e| matches!(e, TagEnd::Strong));
                Inline::Strong { children }
            }
            Event::Start(Tag::Emphasis) => {
                self.i += 1;
                let children = self.collect_nested_inlines(&|e| matches!(e, TagEnd::Emphasis));
                Inline::Emphasis { children }
            }
            Event::Start(Tag::Strikethrough) => {
                self.i += 1;
                let children = self.collect_nested_inlines(&|e| matches!(e, TagEnd::Strikethrough));
                Inline::Delete { children }
            }
            Event::Start(Tag::Link {
                dest_url, title, ..
            }) => {
                let url = dest_url.to_string();
                let title = title.to_string();
                self.i += 1;
                let children = self.collect_nested_inlines(&|e| matches!(e, TagEnd::Link));
                Inline::Link {
                    url,
                    title,
                    children,
                }
            }
            Event::Start(Tag::Image {
                dest_url, title, ..
            }) => {
                let url = dest_url.to_string();
                let title = title.to_string();
                self.i += 1;
                let alt = self.collect_nested_inlines(&|e| matches!(e, TagEnd::Image));
                Inline::Image { url, title, alt }
            }
            _ => return false,
        };
        out.push(inline);
        true
    }

    /// Collect list items until End(List).
    fn collect_list(&mut self, start: Option<u64>) -> List {
        let mut items = Vec::new();

        while self.i < self.events.len() {
            match &self.events[self.i].0 {
                Event::End(TagEnd::List(_)) => {
                    self.i += 1;
                    break;
                }
                Event::Start(Tag::Item) => {
                    self.i += 1;
                    items.push(self.collect_item());
                }
                _ => {
                    self.i += 1;
                }
            }
        }

        List {
            ordered: start.is_some(),
            start,
            items,
        }
    }

    /// Collect a single list item. Tight items carry bare text; loose items
    /// wrap it in paragraphs, which are joined with soft breaks.
    fn collect_item(&mut self) -> ListItem {
        let mut item = ListItem {
            checked: None,
            children: Vec::new(),
            sublist: None,
        };

        while self.i < self.events.len() {
            match &self.events[self.i].0 {
                Event::End(TagEnd::Item) => {
                    self.i += 1;
                    break;
                }
                Event::TaskListMarker(checked) => {
                    item.checked = Some(*checked);
                    self.i += 1;
                }
                Event::Start(Tag::Paragraph) => {
                    self.i += 1;
                    if !item.children.is_empty() {
                        item.children.push(Inline::SoftBreak);
                    }
                    let inlines = self.collect_inlines(&|e| matches!(e, TagEnd::Paragraph));
                    item.children.extend(inlines);
                }
                Event::Start(Tag::List(start)) => {
                    let start = *start;
                    item.sublist = self.nested(|s| s.collect_list(start));
                    if item.sublist.is_none() {
                        self.skip_element();
                    }
                }
                Event::Start(_) if !is_inline_start(&self.events[self.i].0) => {
                    self.skip_element();
                }
                _ => {
                    if !self.push_inline(&mut item.children) {
                        self.i += 1;
                    }
                }
            }
        }

        item
    }

    /// Collect table headers and rows.
    fn collect_table(&mut self) -> (Vec<Vec<Inline>>, Vec<Vec<Vec<Inline>>>) {
        let mut header: Vec<Vec<Inline>> = Vec::new();
        let mut rows: Vec<Vec<Vec<Inline>>> = Vec::new();
        let mut in_head = false;
        let mut current_row: Vec<Vec<Inline>> = Vec::new();

        while self.i < self.events.len() {
            match &self.events[self.i].0 {
                Event::End(TagEnd::Table) => {
                    self.i += 1;
                    break;
                }
                Event::Start(Tag::TableHead) => {
                    in_head = true;
                    self.i += 1;
                }
                Event::End(TagEnd::TableHead) => {
                    in_head = false;
                    header = std::mem::take(&mut current_row);
                    self.i += 1;
                }
                Event::Start(Tag::TableRow) => {
                    current_row = Vec::new();
                    self.i += 1;
                }
                Event::End(TagEnd::TableRow) => {
                    if !in_head {
                        rows.push(std::mem::take(&mut current_row));
                    }
                    self.i += 1;
                }
                Event::Start(Tag::TableCell) => {
                    self.i += 1;
                    let cell = self.collect_inlines(&|e| matches!(e, TagEnd::TableCell));
                    current_row.push(cell);
                }
                _ => {
                    self.i += 1;
                }
            }
        }

        (header, rows)
    }

    /// Collect all text content until a matching End tag.
    fn collect_text(&mut self, is_end: &dyn Fn(&TagEnd) -> bool) -> String {
        let mut text = String::new();
        while self.i < self.events.len() {
            match &self.events[self.i].0 {
                Event::End(tag_end) if is_end(tag_end) => {
                    self.i += 1;
                    break;
                }
                Event::Text(s) | Event::Html(s) => {
                    text.push_str(s);
                    self.i += 1;
                }
                _ => {
                    self.i += 1;
                }
            }
        }
        text
    }

    /// Step past the Start event at the cursor and run `f` one level deeper.
    /// Returns None, leaving the cursor on the Start event, at [`MAX_NESTING`].
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> Option<T> {
        if self.depth >= MAX_NESTING {
            return None;
        }
        self.i += 1;
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        Some(out)
    }

    /// `collect_inlines` one level deeper, for inline containers.
    fn collect_nested_inlines(&mut self, is_end: &dyn Fn(&TagEnd) -> bool) -> Vec<Inline> {
        self.depth += 1;
        let inlines = self.collect_inlines(is_end);
        self.depth -= 1;
        inlines
    }

    /// Consume a Start event up to its matching End, keeping only its text.
    fn flatten_element(&mut self) -> String {
        let mut text = String::new();
        let mut depth = 0usize;
        while self.i < self.events.len() {
            match &self.events[self.i].0 {
                Event::Start(_) => depth += 1,
                Event::End(_) => depth = depth.saturating_sub(1),
                Event::Text(s) | Event::Code(s) => text.push_str(s),
                Event::SoftBreak | Event::HardBreak => text.push(' '),
                _ => {}
            }
            self.i += 1;
            if depth == 0 {
                break;
            }
        }
        text
    }

    /// Skip a Start event and everything up to its matching End.
    fn skip_element(&mut self) {
        let mut depth = 0usize;
        while self.i < self.events.len() {
            match &self.events[self.i].0 {
                Event::Start(_) => depth += 1,
                Event::End(_) => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.i += 1;
            if depth == 0 {
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn convert_alignment(alignment: &Alignment) -> ColumnAlignment {
    match alignment {
        Alignment::None => ColumnAlignment::None,
        Alignment::Left => ColumnAlignment::Left,
        Alignment::Center => ColumnAlignment::Center,
        Alignment::Right => ColumnAlignment::Right,
    }
}

/// Split a fence info string like `ui:tabs title="x"` into language and meta.
fn split_info_string(info: &str) -> (Option<String>, Option<String>) {
    let info = info.trim();
    if info.is_empty() {
        return (None, None);
    }
    match info.split_once(char::is_whitespace) {
        Some((lang, meta)) => {
            let meta = meta.trim();
            (
                Some(lang.to_string()),
                (!meta.is_empty()).then(|| meta.to_string()),
            )
        }
        None => (Some(info.to_string()), None),
    }
}

fn is_inline_start(ev: &Event<'_>) -> bool {
    matches!(
        ev,
        Event::Start(
            Tag::Strong
                | Tag::Emphasis
                | Tag::Strikethrough
                | Tag::Link { .. }
                | Tag::Image { .. }
        )
    )
}

fn tag_name(tag: &Tag<'_>) -> &'static str {
    match tag {
        Tag::FootnoteDefinition(_) => "footnoteDefinition",
        Tag::DefinitionList
        | Tag::DefinitionListTitle
        | Tag::DefinitionListDefinition => "definitionList",
        Tag::MetadataBlock(_) => "metadataBlock",
        _ => "unknown",
    }
}
