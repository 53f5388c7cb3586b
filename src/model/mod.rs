//! Document content model for Markdown patches.
//!
//! This module defines the run-based content vocabulary that bridges the
//! Markdown tree and the document package engine. Paragraphs own ordered
//! text and image runs; a patch owns the paragraphs that replace one
//! placeholder.

mod content;
mod image;
mod patch;

pub use content::{ContentNode, ImageRunNode, ParagraphNode, RunNode, TextRunNode};
pub use image::{ImageData, ImageFormat};
pub use patch::{Patch, PatchSet, PatchType};
