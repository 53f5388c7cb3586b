//! Markdown parser producing a [`MarkdownTree`].
//!
//! Folds the pulldown-cmark event stream into an owned tree with an
//! explicit frame stack. Parsing is total: malformed input degrades to
//! literal text and unbalanced events are ignored.

use super::tree::{Block, Inline, ListItem, MarkdownTree, TableRow};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use std::ops::Range;

/// Parse Markdown text into a tree.
///
/// GitHub-flavored extensions (tables, strikethrough, task lists,
/// footnotes) are enabled.
///
/// # Example
///
/// ```
/// use mdpatch::markdown::{parse_markdown, Block};
///
/// let tree = parse_markdown("# Hello\n\nThis is a test with an ![image](test.png)");
/// assert_eq!(tree.children.len(), 2);
/// assert!(matches!(tree.children[1], Block::Paragraph { .. }));
/// ```
pub fn parse_markdown(markdown: &str) -> MarkdownTree {
    let parser = Parser::new_ext(markdown, gfm_options());
    let mut builder = TreeBuilder::new(markdown);
    for (event, range) in parser.into_offset_iter() {
        builder.push_event(event, range);
    }
    builder.finish()
}

fn gfm_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    options
}

/// Block container kinds that hold nested blocks.
enum Container {
    Root,
    BlockQuote,
    Item { checked: Option<bool> },
    Footnote { label: String },
}

/// Inline container kinds.
enum Span {
    Paragraph,
    Heading(u8),
    Emphasis,
    Strong,
    Delete,
    Link { url: String, title: Option<String> },
    Image { url: String, title: Option<String> },
    Cell,
}

enum Frame {
    /// Blocks plus inlines awaiting an implicit paragraph (tight list items)
    Blocks {
        container: Container,
        blocks: Vec<Block>,
        pending: Vec<Inline>,
    },
    Inlines {
        span: Span,
        children: Vec<Inline>,
    },
    List {
        start: Option<u64>,
        items: Vec<ListItem>,
    },
    Code {
        lang: Option<String>,
        value: String,
    },
    Table {
        rows: Vec<TableRow>,
    },
    Row(TableRow),
}

struct TreeBuilder<'s> {
    source: &'s str,
    stack: Vec<Frame>,
    /// Source offset where the previous event ended, if it was block HTML
    html_end: Option<usize>,
}

impl<'s> TreeBuilder<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            stack: vec![Frame::Blocks {
                container: Container::Root,
                blocks: Vec::new(),
                pending: Vec::new(),
            }],
            html_end: None,
        }
    }

    fn push_event(&mut self, event: Event<'_>, range: Range<usize>) {
        let html_end = self.html_end.take();
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(_) => self.end(),
            Event::Text(text) => self.push_text(&text),
            Event::Code(code) => self.push_inline(Inline::InlineCode {
                value: code.to_string(),
            }),
            Event::Html(html) => {
                let continues = html_end
                    .is_some_and(|end| same_html_block(self.source, end, range.start));
                self.push_html(&html, continues, range.end);
            }
            Event::FootnoteReference(label) => self.push_inline(Inline::FootnoteReference {
                label: label.to_string(),
            }),
            Event::SoftBreak => self.push_text("\n"),
            Event::HardBreak => self.push_inline(Inline::Break),
            Event::Rule => self.push_block(Block::ThematicBreak),
            Event::TaskListMarker(checked) => {
                if let Some(Frame::Blocks {
                    container: Container::Item { checked: slot },
                    ..
                }) = self.stack.last_mut()
                {
                    *slot = Some(checked);
                }
            }
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let frame = match tag {
            Tag::Paragraph => inlines(Span::Paragraph),
            Tag::Heading(level, _, _) => inlines(Span::Heading(heading_level(level))),
            Tag::BlockQuote => blocks(Container::BlockQuote),
            Tag::CodeBlock(kind) => Frame::Code {
                lang: match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(|lang| lang.to_string()),
                    CodeBlockKind::Indented => None,
                },
                value: String::new(),
            },
            Tag::List(start) => Frame::List {
                start,
                items: Vec::new(),
            },
            Tag::Item => blocks(Container::Item { checked: None }),
            Tag::FootnoteDefinition(label) => blocks(Container::Footnote {
                label: label.to_string(),
            }),
            Tag::Table(_) => Frame::Table { rows: Vec::new() },
            Tag::TableHead => Frame::Row(TableRow {
                is_header: true,
                cells: Vec::new(),
            }),
            Tag::TableRow => Frame::Row(TableRow::default()),
            Tag::TableCell => inlines(Span::Cell),
            Tag::Emphasis => inlines(Span::Emphasis),
            Tag::Strong => inlines(Span::Strong),
            Tag::Strikethrough => inlines(Span::Delete),
            Tag::Link(_, url, title) => inlines(Span::Link {
                url: url.to_string(),
                title: non_empty(&title),
            }),
            Tag::Image(_, url, title) => inlines(Span::Image {
                url: url.to_string(),
                title: non_empty(&title),
            }),
        };
        self.stack.push(frame);
    }

    fn end(&mut self) {
        // The root frame is only consumed by finish().
        if self.stack.len() <= 1 {
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };

        match frame {
            Frame::Inlines { span, children } => match span {
                Span::Paragraph => self.push_block(Block::Paragraph { children }),
                Span::Heading(level) => self.push_block(Block::Heading { level, children }),
                Span::Emphasis => self.push_inline(Inline::Emphasis { children }),
                Span::Strong => self.push_inline(Inline::Strong { children }),
                Span::Delete => self.push_inline(Inline::Delete { children }),
                Span::Link { url, title } => self.push_inline(Inline::Link {
                    url,
                    title,
                    children,
                }),
                Span::Image { url, title } => {
                    let alt: String = children.iter().map(Inline::plain_text).collect();
                    self.push_inline(Inline::Image {
                        url,
                        alt: (!alt.is_empty()).then_some(alt),
                        title,
                    });
                }
                Span::Cell => {
                    if let Some(Frame::Row(row)) = self.stack.last_mut() {
                        row.cells.push(children);
                    }
                }
            },
            Frame::Blocks {
                container,
                mut blocks,
                pending,
            } => {
                flush_pending(&mut blocks, pending);
                match container {
                    Container::BlockQuote => self.push_block(Block::BlockQuote { children: blocks }),
                    Container::Footnote { label } => self.push_block(Block::FootnoteDefinition {
                        label,
                        children: blocks,
                    }),
                    Container::Item { checked } => {
                        if let Some(Frame::List { items, .. }) = self.stack.last_mut() {
                            items.push(ListItem {
                                checked,
                                children: blocks,
                            });
                        }
                    }
                    Container::Root => {}
                }
            }
            Frame::List { start, items } => self.push_block(Block::List { start, items }),
            Frame::Code { lang, value } => self.push_block(Block::CodeBlock { lang, value }),
            Frame::Table { rows } => self.push_block(Block::Table { rows }),
            Frame::Row(row) => {
                if let Some(Frame::Table { rows }) = self.stack.last_mut() {
                    rows.push(row);
                }
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(Frame::Code { value, .. }) = self.stack.last_mut() {
            value.push_str(text);
            return;
        }
        self.push_inline(Inline::text(text));
    }

    fn push_html(&mut self, html: &str, continues: bool, end: usize) {
        match self.stack.last_mut() {
            Some(Frame::Blocks {
                blocks, pending, ..
            }) if pending.is_empty() => {
                // Block HTML arrives one line per event.
                match blocks.last_mut() {
                    Some(Block::Html { value }) if continues => value.push_str(html),
                    _ => blocks.push(Block::Html {
                        value: html.to_string(),
                    }),
                }
                self.html_end = Some(end);
            }
            _ => self.push_inline(Inline::Html {
                value: html.to_string(),
            }),
        }
    }

    fn push_inline(&mut self, inline: Inline) {
        match self.stack.last_mut() {
            Some(Frame::Inlines { children, .. }) => append_inline(children, inline),
            Some(Frame::Blocks { pending, .. }) => append_inline(pending, inline),
            _ => {}
        }
    }

    fn push_block(&mut self, block: Block) {
        if let Some(Frame::Blocks {
            blocks, pending, ..
        }) = self.stack.last_mut()
        {
            flush_pending(blocks, std::mem::take(pending));
            blocks.push(block);
        }
    }

    fn finish(mut self) -> MarkdownTree {
        // Close anything left open by a truncated event stream.
        while self.stack.len() > 1 {
            self.end();
        }
        match self.stack.pop() {
            Some(Frame::Blocks {
                mut blocks,
                pending,
                ..
            }) => {
                flush_pending(&mut blocks, pending);
                MarkdownTree { children: blocks }
            }
            _ => MarkdownTree::new(),
        }
    }
}

fn inlines(span: Span) -> Frame {
    Frame::Inlines {
        span,
        children: Vec::new(),
    }
}

fn blocks(container: Container) -> Frame {
    Frame::Blocks {
        container,
        blocks: Vec::new(),
        pending: Vec::new(),
    }
}

/// Append an inline, merging adjacent text nodes.
fn append_inline(children: &mut Vec<Inline>, inline: Inline) {
    if let Inline::Text { value: next } = &inline {
        if let Some(Inline::Text { value }) = children.last_mut() {
            value.push_str(next);
            return;
        }
    }
    children.push(inline);
}

fn flush_pending(blocks: &mut Vec<Block>, pending: Vec<Inline>) {
    if !pending.is_empty() {
        blocks.push(Block::Paragraph { children: pending });
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Check if an HTML line starting at `start` continues the block that ended
/// at `previous_end`. A blank line in between starts a new block.
fn same_html_block(source: &str, previous_end: usize, start: usize) -> bool {
    let head = match source.get(..previous_end) {
        Some(head) => head,
        None => return false,
    };
    let from = head.strip_suffix('\n').map_or(previous_end, str::len);
    source
        .get(from..start)
        .is_some_and(|gap| gap.matches('\n').count() < 2)
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}
