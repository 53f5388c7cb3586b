//! Owned Markdown syntax tree.

use serde::{Deserialize, Serialize};

/// Root of a parsed Markdown document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkdownTree {
    /// Top-level blocks in source order
    pub children: Vec<Block>,
}

impl MarkdownTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the tree has no blocks.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Visit every inline node depth-first in document order.
    ///
    /// Descends into nested blocks (quotes, list items, table cells,
    /// footnotes) and nested inlines (emphasis, links, image alt content).
    pub fn walk_inlines<'a>(&'a self, f: &mut impl FnMut(&'a Inline)) {
        for block in &self.children {
            block.walk_inlines(f);
        }
    }

    /// Collect the URL of every image in document order, duplicates included.
    pub fn image_urls(&self) -> Vec<&str> {
        let mut urls = Vec::new();
        self.walk_inlines(&mut |inline| {
            if let Inline::Image { url, .. } = inline {
                urls.push(url.as_str());
            }
        });
        urls
    }
}

/// Block-level node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Paragraph of inline content
    Paragraph {
        /// Inline children
        children: Vec<Inline>,
    },

    /// ATX or setext heading
    Heading {
        /// Heading level (1-6)
        level: u8,
        /// Inline children
        children: Vec<Inline>,
    },

    /// Block quote
    BlockQuote {
        /// Nested blocks
        children: Vec<Block>,
    },

    /// Ordered or bulleted list
    List {
        /// Start number for ordered lists
        start: Option<u64>,
        /// List items
        items: Vec<ListItem>,
    },

    /// Fenced or indented code block
    CodeBlock {
        /// Info string language, if fenced with one
        lang: Option<String>,
        /// Literal content
        value: String,
    },

    /// GFM table
    Table {
        /// Rows, header row first
        rows: Vec<TableRow>,
    },

    /// Horizontal rule
    ThematicBreak,

    /// Raw HTML block
    Html {
        /// Raw markup
        value: String,
    },

    /// Footnote definition
    FootnoteDefinition {
        /// Footnote label
        label: String,
        /// Nested blocks
        children: Vec<Block>,
    },
}

impl Block {
    /// Create a paragraph block.
    pub fn paragraph(children: Vec<Inline>) -> Self {
        Block::Paragraph { children }
    }

    /// Node type name, matching the serialized tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Block::Paragraph { .. } => "paragraph",
            Block::Heading { .. } => "heading",
            Block::BlockQuote { .. } => "block_quote",
            Block::List { .. } => "list",
            Block::CodeBlock { .. } => "code_block",
            Block::Table { .. } => "table",
            Block::ThematicBreak => "thematic_break",
            Block::Html { .. } => "html",
            Block::FootnoteDefinition { .. } => "footnote_definition",
        }
    }

    fn walk_inlines<'a>(&'a self, f: &mut impl FnMut(&'a Inline)) {
        match self {
            Block::Paragraph { children } | Block::Heading { children, .. } => {
                for inline in children {
                    inline.walk(f);
                }
            }
            Block::BlockQuote { children } | Block::FootnoteDefinition { children, .. } => {
                for block in children {
                    block.walk_inlines(f);
                }
            }
            Block::List { items, .. } => {
                for block in items.iter().flat_map(|item| &item.children) {
                    block.walk_inlines(f);
                }
            }
            Block::Table { rows } => {
                for inline in rows.iter().flat_map(|r| &r.cells).flatten() {
                    inline.walk(f);
                }
            }
            Block::CodeBlock { .. } | Block::ThematicBreak | Block::Html { .. } => {}
        }
    }
}

/// A list item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    /// Task list state, if this is a task item
    pub checked: Option<bool>,
    /// Nested blocks
    pub children: Vec<Block>,
}

/// A table row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    /// Whether this is the header row
    pub is_header: bool,
    /// Cells, each an inline sequence
    pub cells: Vec<Vec<Inline>>,
}

/// Inline node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inline {
    /// Literal text
    Text {
        /// Text content
        value: String,
    },

    /// Image reference; bytes are resolved out-of-band
    Image {
        /// Image URL or path, verbatim
        url: String,
        /// Alternative text
        alt: Option<String>,
        /// Title
        title: Option<String>,
    },

    /// Emphasis (`*a*`)
    Emphasis {
        /// Inline children
        children: Vec<Inline>,
    },

    /// Strong emphasis (`**a**`)
    Strong {
        /// Inline children
        children: Vec<Inline>,
    },

    /// Strikethrough (`~~a~~`)
    Delete {
        /// Inline children
        children: Vec<Inline>,
    },

    /// Hyperlink
    Link {
        /// Destination
        url: String,
        /// Title
        title: Option<String>,
        /// Inline children
        children: Vec<Inline>,
    },

    /// Code span
    InlineCode {
        /// Literal code
        value: String,
    },

    /// Hard line break
    Break,

    /// Raw inline HTML
    Html {
        /// Raw markup
        value: String,
    },

    /// Footnote reference (`[^label]`)
    FootnoteReference {
        /// Footnote label
        label: String,
    },
}

impl Inline {
    /// Create a text node.
    pub fn text(value: impl Into<String>) -> Self {
        Inline::Text {
            value: value.into(),
        }
    }

    /// Create an image node without alt or title.
    pub fn image(url: impl Into<String>) -> Self {
        Inline::Image {
            url: url.into(),
            alt: None,
            title: None,
        }
    }

    /// Flattened text content.
    pub fn plain_text(&self) -> String {
        match self {
            Inline::Text { value } | Inline::InlineCode { value } => value.clone(),
            Inline::Emphasis { children }
            | Inline::Strong { children }
            | Inline::Delete { children }
            | Inline::Link { children, .. } => children.iter().map(Inline::plain_text).collect(),
            Inline::Image { alt, .. } => alt.clone().unwrap_or_default(),
            Inline::Break => "\n".to_string(),
            Inline::Html { .. } | Inline::FootnoteReference { .. } => String::new(),
        }
    }

    fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Inline)) {
        f(self);
        match self {
            Inline::Emphasis { children }
            | Inline::Strong { children }
            | Inline::Delete { children }
            | Inline::Link { children, .. } => {
                for child in children {
                    child.walk(f);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_urls_nested() {
        let tree = MarkdownTree {
            children: vec![
                Block::Heading {
                    level: 1,
                    children: vec![Inline::image("a.png")],
                },
                Block::paragraph(vec![
                    Inline::text("x"),
                    Inline::Link {
                        url: "https://example.com".to_string(),
                        title: None,
                        children: vec![Inline::image("b.png")],
                    },
                    Inline::image("a.png"),
                ]),
            ],
        };

        assert_eq!(tree.image_urls(), vec!["a.png", "b.png", "a.png"]);
    }

    #[test]
    fn test_plain_text() {
        let inline = Inline::Strong {
            children: vec![Inline::text("bold "), Inline::text("text")],
        };
        assert_eq!(inline.plain_text(), "bold text");
    }

    #[test]
    fn test_block_kind_matches_tag() {
        let block = Block::ThematicBreak;
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], block.kind());
    }
}
