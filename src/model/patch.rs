//! Patch and patch set types.

use super::{ContentNode, ParagraphNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of replacement a patch performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchType {
    /// Replaces the placeholder with block-level content
    #[default]
    Document,
}

/// Ordered replacement content for one placeholder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Patch kind
    #[serde(rename = "type")]
    pub patch_type: PatchType,

    /// Content nodes in source order
    pub children: Vec<ContentNode>,
}

impl Patch {
    /// Create a document patch from content nodes.
    pub fn document(children: Vec<ContentNode>) -> Self {
        Self {
            patch_type: PatchType::Document,
            children,
        }
    }

    /// Iterate over the paragraphs of this patch.
    pub fn paragraphs(&self) -> impl Iterator<Item = &ParagraphNode> {
        self.children.iter().filter_map(ContentNode::as_paragraph)
    }

    /// Get plain text of the patch, one line per paragraph.
    pub fn plain_text(&self) -> String {
        self.paragraphs()
            .map(ParagraphNode::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of image runs across all paragraphs.
    pub fn image_count(&self) -> usize {
        self.paragraphs().map(|p| p.images().count()).sum()
    }

    /// Check if the patch has no content nodes.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Placeholder name to patch mapping for one document.
pub type PatchSet = HashMap<String, Patch>;
