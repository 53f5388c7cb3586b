//! Structural document nodes produced from Markdown.

use super::{ImageData, ImageFormat};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A block-level node spliced into the document body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentNode {
    /// A paragraph of runs
    Paragraph(ParagraphNode),
}

impl ContentNode {
    /// Get the paragraph if this node is one.
    pub fn as_paragraph(&self) -> Option<&ParagraphNode> {
        match self {
            ContentNode::Paragraph(p) => Some(p),
        }
    }
}

impl From<ParagraphNode> for ContentNode {
    fn from(p: ParagraphNode) -> Self {
        ContentNode::Paragraph(p)
    }
}

/// A paragraph holding an ordered sequence of runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParagraphNode {
    /// Runs in source order
    pub children: Vec<RunNode>,
}

impl ParagraphNode {
    /// Create a new empty paragraph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a paragraph with a single text run.
    pub fn with_text(text: impl Into<String>) -> Self {
        let mut p = Self::new();
        p.add_text(text);
        p
    }

    /// Add a text run.
    pub fn add_text(&mut self, text: impl Into<String>) {
        self.children.push(RunNode::Text(TextRunNode::new(text)));
    }

    /// Add an image run.
    pub fn add_image(&mut self, image: Arc<ImageData>, format: ImageFormat) {
        self.children
            .push(RunNode::Image(ImageRunNode::new(image, format)));
    }

    /// Get plain text content of the paragraph.
    pub fn plain_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|run| match run {
                RunNode::Text(t) => Some(t.text.as_str()),
                RunNode::Image(_) => None,
            })
            .collect()
    }

    /// Iterate over the image runs.
    pub fn images(&self) -> impl Iterator<Item = &ImageRunNode> {
        self.children.iter().filter_map(|run| match run {
            RunNode::Image(img) => Some(img),
            RunNode::Text(_) => None,
        })
    }

    /// Check if the paragraph has no runs.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// A run inside a paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunNode {
    /// Plain text
    Text(TextRunNode),
    /// Inline image
    Image(ImageRunNode),
}

/// A run of plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRunNode {
    /// The text content
    pub text: String,
}

impl TextRunNode {
    /// Create a new text run.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// An inline image run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRunNode {
    /// Resolved image, shared with other runs of the same URL
    pub image: Arc<ImageData>,

    /// Format used when embedding
    pub format: ImageFormat,
}

impl ImageRunNode {
    /// Create a new image run.
    pub fn new(image: Arc<ImageData>, format: ImageFormat) -> Self {
        Self { image, format }
    }

    /// Raw image bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.image.data
    }

    /// Display width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width
    }

    /// Display height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_plain_text() {
        let mut p = ParagraphNode::new();
        p.add_text("Hello ");
        p.add_image(Arc::new(ImageData::new(vec![1], 10, 10)), ImageFormat::Png);
        p.add_text("world");

        assert_eq!(p.plain_text(), "Hello world");
        assert_eq!(p.images().count(), 1);
        assert_eq!(p.children.len(), 3);
    }

    #[test]
    fn test_image_run_accessors() {
        let run = ImageRunNode::new(
            Arc::new(ImageData::new(b"abc".to_vec(), 300, 200)),
            ImageFormat::Png,
        );
        assert_eq!(run.bytes(), b"abc");
        assert_eq!(run.width(), 300);
        assert_eq!(run.height(), 200);
    }

    #[test]
    fn test_serialize_tagged() {
        let node: ContentNode = ParagraphNode::with_text("hi").into();
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "paragraph");
        assert_eq!(json["children"][0]["type"], "text");
        assert_eq!(json["children"][0]["text"], "hi");
    }
}
