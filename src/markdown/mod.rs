//! Markdown parsing module.

mod parser;
mod tree;

pub use parser::parse_markdown;
pub use tree::{Block, Inline, ListItem, MarkdownTree, TableRow};
