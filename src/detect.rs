//! Document package detection and validation.

use crate::error::TemplateError;

/// Package format information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFormat {
    /// A ZIP container with at least one local file entry
    Zip,
    /// An empty ZIP archive (end-of-central-directory record only)
    EmptyZip,
}

impl std::fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageFormat::Zip => write!(f, "zip"),
            PackageFormat::EmptyZip => write!(f, "empty zip"),
        }
    }
}

/// ZIP local file header: PK\x03\x04
const ZIP_LOCAL_MAGIC: &[u8] = b"PK\x03\x04";
/// ZIP end of central directory: PK\x05\x06
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";

/// Detect the package format from the leading bytes.
///
/// # Returns
/// * `Ok(PackageFormat)` if the data starts with a ZIP signature
/// * `Err(TemplateError::InvalidPackage)` otherwise
pub fn detect_package(data: &[u8]) -> Result<PackageFormat, TemplateError> {
    if data.starts_with(ZIP_LOCAL_MAGIC) {
        return Ok(PackageFormat::Zip);
    }
    if data.starts_with(ZIP_EMPTY_MAGIC) {
        return Ok(PackageFormat::EmptyZip);
    }
    Err(TemplateError::InvalidPackage(
        "data is not a ZIP container".to_string(),
    ))
}

/// Check if bytes look like a ZIP-based office package.
pub fn is_package_bytes(data: &[u8]) -> bool {
    matches!(detect_package(data), Ok(PackageFormat::Zip))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_zip() {
        let data = b"PK\x03\x04\x14\x00\x00\x00";
        assert_eq!(detect_package(data).unwrap(), PackageFormat::Zip);
        assert!(is_package_bytes(data));
    }

    #[test]
    fn test_detect_empty_zip() {
        let data = b"PK\x05\x06\x00\x00";
        assert_eq!(detect_package(data).unwrap(), PackageFormat::EmptyZip);
        assert!(!is_package_bytes(data));
    }

    #[test]
    fn test_detect_invalid() {
        assert!(matches!(
            detect_package(b"mock-docx-data"),
            Err(TemplateError::InvalidPackage(_))
        ));
        assert!(detect_package(b"").is_err());
    }
}
