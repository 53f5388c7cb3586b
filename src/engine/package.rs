//! Package-level bookkeeping: media parts, relationships, content types.

use crate::model::{ImageData, ImageFormat};
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, OnceLock};

const IMAGE_RELATIONSHIP_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Package path of the content types part.
pub(crate) const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// A media file to be written into the package.
#[derive(Debug)]
pub(crate) struct MediaFile {
    /// File name inside `word/media/`
    pub file_name: String,
    /// Raw bytes
    pub data: Vec<u8>,
    /// Image format
    pub format: ImageFormat,
}

impl MediaFile {
    /// Full package path.
    pub fn package_path(&self) -> String {
        format!("{}{}", MEDIA_DIR, self.file_name)
    }

    /// Relationship target relative to `word/`.
    pub fn target(&self) -> String {
        format!("media/{}", self.file_name)
    }
}

const MEDIA_DIR: &str = "word/media/";

/// Media parts written for one patch call, one per distinct image.
#[derive(Debug, Default)]
pub(crate) struct MediaRegistry {
    files: Vec<MediaFile>,
    by_image: HashMap<usize, usize>,
    /// File names already present in `word/media/`
    taken: HashSet<String>,
    counter: usize,
}

impl MediaRegistry {
    /// Start from the entry names of an existing package so that new media
    /// never reuses a file name it already holds.
    pub fn with_existing<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let taken = entries
            .into_iter()
            .filter_map(|name| name.as_ref().strip_prefix(MEDIA_DIR).map(String::from))
            .collect();
        Self {
            taken,
            ..Default::default()
        }
    }

    /// Register an image and return its media index.
    ///
    /// Runs sharing one `Arc<ImageData>` share one media part.
    pub fn register(&mut self, image: &Arc<ImageData>, format: ImageFormat) -> usize {
        let key = Arc::as_ptr(image) as usize;
        if let Some(&index) = self.by_image.get(&key) {
            return index;
        }

        let file_name = loop {
            self.counter += 1;
            let candidate = format!("mdpatch_image{}.{}", self.counter, format.extension());
            if !self.taken.contains(&candidate) {
                break candidate;
            }
        };

        let index = self.files.len();
        self.files.push(MediaFile {
            file_name,
            data: image.data.clone(),
            format,
        });
        self.by_image.insert(key, index);
        index
    }

    /// Get a registered media file.
    pub fn get(&self, index: usize) -> Option<&MediaFile> {
        self.files.get(index)
    }

    /// Formats in use.
    pub fn formats(&self) -> BTreeSet<&'static str> {
        self.files.iter().map(|f| f.format.extension()).collect()
    }

    /// All registered files.
    pub fn files(&self) -> &[MediaFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Image relationships added to one part.
#[derive(Debug, Default)]
pub(crate) struct PartRelationships {
    existing: String,
    added: Vec<(String, String)>,
    by_media: HashMap<usize, String>,
}

impl PartRelationships {
    /// Start from the part's current relationships XML, if any.
    pub fn new(existing: Option<&str>) -> Self {
        Self {
            existing: existing.unwrap_or_default().to_string(),
            ..Default::default()
        }
    }

    /// Get or create the relationship id for a media file.
    pub fn image_relationship(&mut self, media_index: usize, target: &str) -> String {
        if let Some(id) = self.by_media.get(&media_index) {
            return id.clone();
        }

        let mut n = self.added.len() + 1;
        let id = loop {
            let candidate = format!("rIdMdpatch{}", n);
            if !self.existing.contains(&format!("Id=\"{}\"", candidate)) {
                break candidate;
            }
            n += 1;
        };

        self.added.push((id.clone(), target.to_string()));
        self.by_media.insert(media_index, id.clone());
        id
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
    }

    /// Render the merged relationships part.
    pub fn merged(&self) -> String {
        let entries: String = self
            .added
            .iter()
            .map(|(id, target)| {
                format!(
                    r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
                    id, IMAGE_RELATIONSHIP_TYPE, target
                )
            })
            .collect();

        if self.existing.trim().is_empty() {
            return format!(
                r#"{}<Relationships xmlns="{}">{}</Relationships>"#,
                XML_DECLARATION, RELATIONSHIPS_NS, entries
            );
        }
        insert_before_close(&self.existing, "Relationships", &entries)
            .unwrap_or_else(|| self.existing.clone())
    }
}

/// Get the relationships part path for a part (`word/x.xml` → `word/_rels/x.xml.rels`).
pub(crate) fn rels_part_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Register default content types for the given image extensions.
///
/// Returns `None` when the existing part has no `Types` element to extend.
pub(crate) fn merge_content_types(
    existing: Option<&str>,
    extensions: &BTreeSet<&'static str>,
) -> Option<String> {
    let existing = existing.unwrap_or_default();
    let lower = existing.to_ascii_lowercase();

    let defaults: String = extensions
        .iter()
        .filter(|ext| !lower.contains(&format!("extension=\"{}\"", ext)))
        .map(|ext| {
            format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                ext,
                content_type_for(ext)
            )
        })
        .collect();

    if existing.trim().is_empty() {
        return Some(format!(
            r#"{}<Types xmlns="{}">{}</Types>"#,
            XML_DECLARATION, CONTENT_TYPES_NS, defaults
        ));
    }
    if defaults.is_empty() {
        return Some(existing.to_string());
    }
    insert_before_close(existing, "Types", &defaults)
}

fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "jpg" => ImageFormat::Jpg.content_type(),
        "gif" => ImageFormat::Gif.content_type(),
        "bmp" => ImageFormat::Bmp.content_type(),
        _ => ImageFormat::Png.content_type(),
    }
}

/// Insert `content` before the closing tag of the root element `name`,
/// expanding a self-closing root if needed.
fn insert_before_close(xml: &str, name: &str, content: &str) -> Option<String> {
    let close = format!("</{}>", name);
    if let Some(pos) = xml.rfind(&close) {
        let mut out = String::with_capacity(xml.len() + content.len());
        out.push_str(&xml[..pos]);
        out.push_str(content);
        out.push_str(&xml[pos..]);
        return Some(out);
    }

    let re = self_closing_root(name)?;
    let caps = re.captures(xml)?;
    let whole = caps.get(0)?;
    let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    Some(format!(
        "{}<{}{}>{}</{}>{}",
        &xml[..whole.start()],
        name,
        attrs,
        content,
        name,
        &xml[whole.end()..]
    ))
}

fn self_closing_root(name: &str) -> Option<&'static Regex> {
    static RELATIONSHIPS: OnceLock<Option<Regex>> = OnceLock::new();
    static TYPES: OnceLock<Option<Regex>> = OnceLock::new();
    let cell = match name {
        "Relationships" => &RELATIONSHIPS,
        "Types" => &TYPES,
        _ => return None,
    };
    cell.get_or_init(|| Regex::new(&format!(r"<{}(\s[^>]*?)?\s*/>", name)).ok())
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rels_part_name() {
        assert_eq!(rels_part_name("word/document.xml"), "word/_rels/document.xml.rels");
        assert_eq!(rels_part_name("word/header1.xml"), "word/_rels/header1.xml.rels");
    }

    #[test]
    fn test_media_registry_dedups_shared_images() {
        let mut media = MediaRegistry::default();
        let a = Arc::new(ImageData::new(vec![1], 1, 1));
        let b = Arc::new(ImageData::new(vec![1], 1, 1));

        assert_eq!(media.register(&a, ImageFormat::Png), 0);
        assert_eq!(media.register(&Arc::clone(&a), ImageFormat::Png), 0);
        assert_eq!(media.register(&b, ImageFormat::Png), 1);
        assert_eq!(media.files().len(), 2);
        assert_eq!(media.get(1).unwrap().package_path(), "word/media/mdpatch_image2.png");
        assert_eq!(media.get(0).unwrap().target(), "media/mdpatch_image1.png");
    }

    #[test]
    fn test_media_names_skip_existing_entries() {
        let mut media = MediaRegistry::with_existing([
            "word/document.xml",
            "word/media/mdpatch_image1.png",
            "word/media/mdpatch_image3.png",
            "word/media/image1.jpeg",
        ]);
        let a = Arc::new(ImageData::new(vec![1], 1, 1));
        let b = Arc::new(ImageData::new(vec![2], 1, 1));

        media.register(&a, ImageFormat::Png);
        media.register(&b, ImageFormat::Png);
        assert_eq!(media.get(0).unwrap().file_name, "mdpatch_image2.png");
        assert_eq!(media.get(1).unwrap().file_name, "mdpatch_image4.png");
    }

    #[test]
    fn test_relationships_avoid_existing_ids() {
        let existing = r#"<Relationships xmlns="x"><Relationship Id="rIdMdpatch1" Target="a"/></Relationships>"#;
        let mut rels = PartRelationships::new(Some(existing));
        let id = rels.image_relationship(0, "media/mdpatch_image1.png");
        assert_eq!(id, "rIdMdpatch2");
        assert_eq!(rels.image_relationship(0, "media/mdpatch_image1.png"), id);

        let merged = rels.merged();
        assert!(merged.contains(r#"Id="rIdMdpatch1""#));
        assert!(merged.contains(r#"<Relationship Id="rIdMdpatch2""#));
        assert!(merged.ends_with("</Relationships>"));
    }

    #[test]
    fn test_relationships_created_when_missing() {
        let mut rels = PartRelationships::new(None);
        rels.image_relationship(0, "media/mdpatch_image1.png");
        let merged = rels.merged();
        assert!(merged.starts_with("<?xml"));
        assert!(merged.contains(RELATIONSHIPS_NS));
    }

    #[test]
    fn test_self_closing_root_is_expanded() {
        let mut rels = PartRelationships::new(Some(r#"<Relationships xmlns="x"/>"#));
        rels.image_relationship(0, "media/a.png");
        let merged = rels.merged();
        assert!(merged.starts_with(r#"<Relationships xmlns="x"><Relationship "#));
        assert!(merged.ends_with("</Relationships>"));
    }

    #[test]
    fn test_merge_content_types() {
        let existing = r#"<Types xmlns="x"><Default Extension="xml" ContentType="application/xml"/></Types>"#;
        let exts: BTreeSet<&'static str> = ["png"].into_iter().collect();
        let merged = merge_content_types(Some(existing), &exts).unwrap();
        assert!(merged.contains(r#"<Default Extension="png" ContentType="image/png"/></Types>"#));

        // Already registered: unchanged
        let again = merge_content_types(Some(&merged), &exts).unwrap();
        assert_eq!(again, merged);

        // No Types element to extend
        assert!(merge_content_types(Some("<?xml version=\"1.0\"?>"), &exts).is_none());
    }
}
