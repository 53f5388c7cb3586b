//! Document package engines that splice patches into templates.
//!
//! The engine is the boundary between the Markdown pipeline and the
//! binary document: it locates `{{placeholder}}` tokens, replaces them with
//! patch content and re-serializes the package. [`DocxEngine`] handles
//! WordprocessingML packages; implement [`PatchEngine`] to target another
//! format.
//!
//! # Example
//!
//! ```no_run
//! use mdpatch::engine::{ApplyOptions, DocxEngine, PatchEngine};
//! use mdpatch::model::{ParagraphNode, Patch, PatchSet};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let template = std::fs::read("template.docx")?;
//!     let mut patches = PatchSet::new();
//!     patches.insert(
//!         "greeting".to_string(),
//!         Patch::document(vec![ParagraphNode::with_text("Hello").into()]),
//!     );
//!
//!     let output = DocxEngine::new().apply_patches(&template, &patches, &ApplyOptions::default())?;
//!     std::fs::write("output.docx", output.into_bytes())?;
//!     Ok(())
//! }
//! ```

mod docx;
mod package;
mod scan;
mod xml;

pub use docx::DocxEngine;

use crate::error::TemplateError;
use crate::model::PatchSet;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Trait for document package engines.
pub trait PatchEngine: Send + Sync {
    /// Get the name of this engine.
    fn name(&self) -> &str;

    /// Apply every patch to the document and return the new package.
    ///
    /// Placeholders with no patch, and patches with no placeholder, are
    /// left alone.
    fn apply_patches(
        &self,
        data: &[u8],
        patches: &PatchSet,
        options: &ApplyOptions,
    ) -> Result<PatchOutput, TemplateError>;
}

/// Options passed through to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Form of the returned document
    pub output_type: OutputType,

    /// Copy the placeholder run's formatting onto inserted runs
    pub keep_original_styles: bool,

    /// Placeholder delimiters
    pub placeholder_delimiters: PlaceholderDelimiters,

    /// Replace every occurrence of a placeholder instead of only the first
    pub recursive: bool,
}

impl ApplyOptions {
    /// Create new apply options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output type.
    pub fn with_output_type(mut self, output_type: OutputType) -> Self {
        self.output_type = output_type;
        self
    }

    /// Enable or disable keeping original run styles.
    pub fn with_keep_original_styles(mut self, keep: bool) -> Self {
        self.keep_original_styles = keep;
        self
    }

    /// Set the placeholder delimiters.
    pub fn with_delimiters(mut self, delimiters: PlaceholderDelimiters) -> Self {
        self.placeholder_delimiters = delimiters;
        self
    }

    /// Enable or disable recursive replacement.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            output_type: OutputType::default(),
            keep_original_styles: true,
            placeholder_delimiters: PlaceholderDelimiters::default(),
            recursive: true,
        }
    }
}

/// Start and end markers around a placeholder name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderDelimiters {
    /// Opening marker
    pub start: String,
    /// Closing marker
    pub end: String,
}

impl PlaceholderDelimiters {
    /// Create delimiters.
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Format the token for a placeholder name.
    pub fn token(&self, name: &str) -> String {
        format!("{}{}{}", self.start, name, self.end)
    }
}

impl Default for PlaceholderDelimiters {
    fn default() -> Self {
        Self::new("{{", "}}")
    }
}

/// Output container for the patched document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputType {
    /// Raw bytes
    #[default]
    Bytes,
    /// Standard base64 text
    Base64,
}

/// Patched document in the requested container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutput {
    /// Raw package bytes
    Bytes(Vec<u8>),
    /// Base64-encoded package
    Base64(String),
}

impl PatchOutput {
    /// Wrap package bytes in the requested container.
    pub fn encode(bytes: Vec<u8>, output_type: OutputType) -> Self {
        match output_type {
            OutputType::Bytes => PatchOutput::Bytes(bytes),
            OutputType::Base64 => PatchOutput::Base64(STANDARD.encode(bytes)),
        }
    }

    /// Get the raw package bytes, decoding base64 if needed.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            PatchOutput::Bytes(bytes) => bytes,
            // Invalid base64 yields an empty buffer
            PatchOutput::Base64(text) => STANDARD.decode(text).unwrap_or_default(),
        }
    }

    /// Get the output length in its container form.
    pub fn len(&self) -> usize {
        match self {
            PatchOutput::Bytes(bytes) => bytes.len(),
            PatchOutput::Base64(text) => text.len(),
        }
    }

    /// Check if the output is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
