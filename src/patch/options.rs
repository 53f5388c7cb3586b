//! Options for patching a document with Markdown.

use crate::engine::{ApplyOptions, OutputType, PlaceholderDelimiters};
use crate::resolve::ImageResolverOptions;
use std::collections::HashMap;

/// Input for [`patch_document_with_markdown`](super::patch_document_with_markdown).
#[derive(Debug, Clone)]
pub struct MarkdownPatchOptions {
    /// Template document bytes
    pub data: Vec<u8>,

    /// Markdown source per placeholder name
    pub markdown_patches: HashMap<String, String>,

    /// How image references are resolved
    pub image_resolver_options: ImageResolverOptions,

    /// Form of the returned document
    pub output_type: OutputType,

    /// Copy the placeholder run's formatting onto inserted runs
    pub keep_original_styles: bool,

    /// Placeholder delimiters
    pub placeholder_delimiters: PlaceholderDelimiters,

    /// Replace every occurrence of a placeholder
    pub recursive: bool,

    /// Resolve each URL once across all placeholders of the call
    pub share_image_cache: bool,
}

impl MarkdownPatchOptions {
    /// Create options for a template with no patches.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let defaults = ApplyOptions::default();
        Self {
            data: data.into(),
            markdown_patches: HashMap::new(),
            image_resolver_options: ImageResolverOptions::default(),
            output_type: defaults.output_type,
            keep_original_styles: defaults.keep_original_styles,
            placeholder_delimiters: defaults.placeholder_delimiters,
            recursive: defaults.recursive,
            share_image_cache: false,
        }
    }

    /// Add the Markdown for one placeholder.
    pub fn with_patch(mut self, name: impl Into<String>, markdown: impl Into<String>) -> Self {
        self.markdown_patches.insert(name.into(), markdown.into());
        self
    }

    /// Add several placeholder patches.
    pub fn with_patches<I, K, V>(mut self, patches: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.markdown_patches
            .extend(patches.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the image resolver options.
    pub fn with_image_resolver_options(mut self, options: ImageResolverOptions) -> Self {
        self.image_resolver_options = options;
        self
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
    pub fn with_delimiters(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.placeholder_delimiters = PlaceholderDelimiters::new(start, end);
        self
    }

    /// Enable or disable recursive replacement.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Share resolved images between placeholders.
    pub fn with_shared_image_cache(mut self, share: bool) -> Self {
        self.share_image_cache = share;
        self
    }

    /// Engine options derived from these options.
    pub fn apply_options(&self) -> ApplyOptions {
        ApplyOptions {
            output_type: self.output_type,
            keep_original_styles: self.keep_original_styles,
            placeholder_delimiters: self.placeholder_delimiters.clone(),
            recursive: self.recursive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let options = MarkdownPatchOptions::new(Vec::new());
        assert_eq!(options.apply_options(), ApplyOptions::default());
        assert!(!options.share_image_cache);
        assert!(options.markdown_patches.is_empty());
    }

    #[test]
    fn test_builder() {
        let options = MarkdownPatchOptions::new(b"PK".to_vec())
            .with_patch("intro", "# Hi")
            .with_patches([("a", "x"), ("b", "y")])
            .with_delimiters("<<", ">>")
            .with_recursive(false)
            .with_keep_original_styles(false)
            .with_output_type(OutputType::Base64)
            .with_shared_image_cache(true);

        assert_eq!(options.markdown_patches.len(), 3);
        assert_eq!(options.markdown_patches["intro"], "# Hi");
        assert!(options.share_image_cache);

        let apply = options.apply_options();
        assert_eq!(apply.placeholder_delimiters.token("x"), "<<x>>");
        assert!(!apply.recursive);
        assert!(!apply.keep_original_styles);
        assert_eq!(apply.output_type, OutputType::Base64);
    }
}
