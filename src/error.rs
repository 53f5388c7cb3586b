//! Error types for mdpatch library.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mdpatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by caller-supplied fetch functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error types that can occur while building or applying Markdown patches.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading local files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A remote image was referenced but no fetch function was supplied.
    #[error("Fetch function not implemented for '{url}'. Please provide your own fetch function.")]
    ImageNotConfigured {
        /// The remote URL that could not be fetched
        url: String,
    },

    /// A local image path does not exist.
    #[error("Image file not found: {}", .0.display())]
    ImageFileNotFound(PathBuf),

    /// The caller-supplied fetch function failed.
    #[error("Failed to fetch image '{url}': {source}")]
    ImageFetchFailed {
        /// The remote URL
        url: String,
        /// Error returned by the fetch function
        #[source]
        source: BoxError,
    },

    /// Error reported by the document engine, passed through unchanged.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Building the patch for a placeholder failed.
    #[error("Failed to build patch for placeholder '{placeholder}': {source}")]
    Patch {
        /// Placeholder name of the failing entry
        placeholder: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an error with the placeholder it belongs to.
    pub fn for_placeholder(self, placeholder: impl Into<String>) -> Self {
        Error::Patch {
            placeholder: placeholder.into(),
            source: Box::new(self),
        }
    }

    /// Get the placeholder name if this error carries one.
    pub fn placeholder(&self) -> Option<&str> {
        match self {
            Error::Patch { placeholder, .. } => Some(placeholder),
            _ => None,
        }
    }

    /// Get the innermost error, skipping placeholder context.
    pub fn root(&self) -> &Error {
        match self {
            Error::Patch { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Errors raised by a document package engine.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// The input bytes are not a readable package.
    #[error("Invalid document package: {0}")]
    InvalidPackage(String),

    /// A required package part is missing.
    #[error("Missing package part: {0}")]
    MissingPart(String),

    /// A package part contains malformed XML.
    #[error("XML error in {part}: {message}")]
    Xml {
        /// Package part name
        part: String,
        /// Parser message
        message: String,
    },

    /// Placeholder delimiters cannot form a token pattern.
    #[error("Invalid placeholder delimiters: {0}")]
    InvalidDelimiters(String),

    /// I/O error while reading or writing the package.
    #[error("Package I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<zip::result::ZipError> for TemplateError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => TemplateError::Io(e),
            zip::result::ZipError::FileNotFound => {
                TemplateError::MissingPart("requested entry".to_string())
            }
            _ => TemplateError::InvalidPackage(err.to_string()),
        }
    }
}
