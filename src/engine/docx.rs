//! WordprocessingML (`.docx`) patch engine.

use super::package::{merge_content_types, rels_part_name, PartRelationships, CONTENT_TYPES_PART};
use super::scan::{last_drawing_id, patch_part, PatchContext};
use super::{ApplyOptions, PatchEngine, PatchOutput};
use crate::detect::{detect_package, PackageFormat};
use crate::error::TemplateError;
use crate::model::PatchSet;
use regex::Regex;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::OnceLock;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MAIN_PART: &str = "word/document.xml";

/// Engine for `.docx` templates.
///
/// Placeholders are searched in the main document part and in every
/// header and footer part. Entries that are not modified are copied into
/// the output without recompression.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxEngine;

impl DocxEngine {
    /// Create a new engine.
    pub fn new() -> Self {
        Self
    }
}

impl PatchEngine for DocxEngine {
    fn name(&self) -> &str {
        "docx"
    }

    fn apply_patches(
        &self,
        data: &[u8],
        patches: &PatchSet,
        options: &ApplyOptions,
    ) -> Result<PatchOutput, TemplateError> {
        if detect_package(data)? == PackageFormat::EmptyZip {
            return Err(TemplateError::MissingPart(MAIN_PART.to_string()));
        }

        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let names: Vec<String> = archive.file_names().map(String::from).collect();
        if !names.iter().any(|name| name == MAIN_PART) {
            return Err(TemplateError::MissingPart(MAIN_PART.to_string()));
        }

        let mut parts = Vec::new();
        for name in names.iter().filter(|name| is_content_part(name)) {
            parts.push((name, read_entry(&mut archive, name)?));
        }

        // New media and drawings must not collide with what the package holds
        let mut ctx = PatchContext::new(patches, options)?.with_existing_media(&names);
        if let Some(last) = parts.iter().filter_map(|(_, xml)| last_drawing_id(xml)).max() {
            ctx.reserve_drawing_ids(last);
        }
        let mut replaced: HashMap<String, Vec<u8>> = HashMap::new();

        for (part, xml) in &parts {
            let rels_name = rels_part_name(part);
            let existing_rels = if names.contains(&rels_name) {
                Some(read_entry(&mut archive, &rels_name)?)
            } else {
                None
            };

            let mut rels = PartRelationships::new(existing_rels.as_deref());
            let body = xml.strip_prefix('\u{feff}').unwrap_or(&xml);
            if let Some(patched) = patch_part(body, part, &mut ctx, &mut rels)? {
                log::debug!("Patched {}", part);
                replaced.insert(part.to_string(), patched.into_bytes());
                if !rels.is_empty() {
                    replaced.insert(rels_name, rels.merged().into_bytes());
                }
            }
        }

        for name in patches.keys() {
            if !ctx.was_replaced(name) {
                log::warn!(
                    "Placeholder '{}' not found in template",
                    options.placeholder_delimiters.token(name)
                );
            }
        }

        if replaced.is_empty() {
            return Ok(PatchOutput::encode(data.to_vec(), options.output_type));
        }

        let media = ctx.media();
        if !media.is_empty() {
            let existing = if names.iter().any(|name| name == CONTENT_TYPES_PART) {
                Some(read_entry(&mut archive, CONTENT_TYPES_PART)?)
            } else {
                None
            };
            match merge_content_types(existing.as_deref(), &media.formats()) {
                Some(types) => {
                    replaced.insert(CONTENT_TYPES_PART.to_string(), types.into_bytes());
                }
                None => log::warn!(
                    "{} has no Types element; image types not registered",
                    CONTENT_TYPES_PART
                ),
            }
        }

        let file_options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(data.len())));

        for i in 0..archive.len() {
            let file = archive.by_index(i)?;
            let name = file.name().to_string();
            match replaced.remove(&name) {
                Some(content) => {
                    drop(file);
                    writer.start_file(name, file_options)?;
                    writer.write_all(&content)?;
                }
                None => writer.raw_copy_file(file)?,
            }
        }

        // Parts that did not exist in the template, in a stable order
        let mut added: Vec<(String, Vec<u8>)> = replaced.into_iter().collect();
        added.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, content) in added {
            writer.start_file(name, file_options)?;
            writer.write_all(&content)?;
        }

        for file in media.files() {
            writer.start_file(file.package_path(), file_options)?;
            writer.write_all(&file.data)?;
        }

        let bytes = writer.finish()?.into_inner();
        log::info!(
            "Patched document: {} media files, {} bytes",
            media.files().len(),
            bytes.len()
        );
        Ok(PatchOutput::encode(bytes, options.output_type))
    }
}

/// Check if a package part can hold placeholders.
fn is_content_part(name: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^word/(document|header\d*|footer\d*)\.xml$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

fn read_entry(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<String, TemplateError> {
    let mut file = archive
        .by_name(name)
        .map_err(|_| TemplateError::MissingPart(name.to_string()))?;
    let mut content = String::new();
    file.read_to_string(&mut content).map_err(|e| TemplateError::Xml {
        part: name.to_string(),
        message: e.to_string(),
    })?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OutputType;
    use crate::model::{ImageData, ImageFormat, ParagraphNode, Patch};

    fn build_docx(document: &str) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.start_file(CONTENT_TYPES_PART, options).unwrap();
        writer
            .write_all(br#"<?xml version="1.0"?><Types xmlns="t"><Default Extension="xml" ContentType="application/xml"/></Types>"#)
            .unwrap();
        writer.start_file(MAIN_PART, options).unwrap();
        writer.write_all(document.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn read_part(data: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(data)).unwrap();
        read_entry(&mut archive, name).unwrap()
    }

    #[test]
    fn test_is_content_part() {
        assert!(is_content_part("word/document.xml"));
        assert!(is_content_part("word/header1.xml"));
        assert!(is_content_part("word/footer.xml"));
        assert!(!is_content_part("word/styles.xml"));
        assert!(!is_content_part("word/_rels/document.xml.rels"));
    }

    #[test]
    fn test_rejects_non_package() {
        let err = DocxEngine::new()
            .apply_patches(b"not a zip", &PatchSet::new(), &ApplyOptions::default())
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidPackage(_)));
    }

    #[test]
    fn test_requires_main_part() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("other.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<a/>").unwrap();
        let data = writer.finish().unwrap().into_inner();

        let err = DocxEngine::new()
            .apply_patches(&data, &PatchSet::new(), &ApplyOptions::default())
            .unwrap_err();
        assert!(matches!(err, TemplateError::MissingPart(ref p) if p == MAIN_PART));
    }

    #[test]
    fn test_untouched_template_is_returned_verbatim() {
        let data = build_docx(r#"<w:document><w:body><w:p><w:r><w:t>static</w:t></w:r></w:p></w:body></w:document>"#);
        let output = DocxEngine::new()
            .apply_patches(&data, &PatchSet::new(), &ApplyOptions::default())
            .unwrap();
        assert_eq!(output, PatchOutput::Bytes(data));
    }

    #[test]
    fn test_patching_output_again_avoids_collisions() {
        let data = build_docx(concat!(
            r#"<w:document><w:body>"#,
            r#"<w:p><w:r><w:t>{{a}}</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:t>{{b}}</w:t></w:r></w:p>"#,
            r#"</w:body></w:document>"#
        ));
        let engine = DocxEngine::new();
        let options = ApplyOptions::default();

        let first = engine
            .apply_patches(&data, &image_patch("a", b"first"), &options)
            .unwrap()
            .into_bytes();
        let second = engine
            .apply_patches(&first, &image_patch("b", b"second"), &options)
            .unwrap()
            .into_bytes();

        let mut archive = ZipArchive::new(Cursor::new(second.as_slice())).unwrap();
        let mut first_media = Vec::new();
        archive
            .by_name("word/media/mdpatch_image1.png")
            .unwrap()
            .read_to_end(&mut first_media)
            .unwrap();
        assert_eq!(first_media, b"first");
        let mut second_media = Vec::new();
        archive
            .by_name("word/media/mdpatch_image2.png")
            .unwrap()
            .read_to_end(&mut second_media)
            .unwrap();
        assert_eq!(second_media, b"second");

        let document = read_part(&second, MAIN_PART);
        assert!(document.contains(r#"<wp:docPr id="10000""#));
        assert!(document.contains(r#"<wp:docPr id="10001""#));
        let rels = read_part(&second, "word/_rels/document.xml.rels");
        assert!(rels.contains(r#"Id="rIdMdpatch1""#));
        assert!(rels.contains(r#"Id="rIdMdpatch2""#));
        assert!(rels.contains(r#"Target="media/mdpatch_image2.png""#));
    }

    fn image_patch(name: &str, data: &[u8]) -> PatchSet {
        let mut paragraph = ParagraphNode::new();
        paragraph.add_image(
            std::sync::Arc::new(ImageData::new(data.to_vec(), 10, 10)),
            ImageFormat::Png,
        );
        let mut patches = PatchSet::new();
        patches.insert(name.to_string(), Patch::document(vec![paragraph.into()]));
        patches
    }

    #[test]
    fn test_patches_document_part() {
        let data = build_docx(r#"<w:document><w:body><w:p><w:r><w:t>{{greeting}}</w:t></w:r></w:p></w:body></w:document>"#);
        let mut patches = PatchSet::new();
        patches.insert(
            "greeting".to_string(),
            Patch::document(vec![ParagraphNode::with_text("Hi there").into()]),
        );

        let output = DocxEngine::new()
            .apply_patches(
                &data,
                &patches,
                &ApplyOptions::default().with_output_type(OutputType::Base64),
            )
            .unwrap();
        assert!(matches!(output, PatchOutput::Base64(_)));

        let document = read_part(&output.into_bytes(), MAIN_PART);
        assert!(document.contains("Hi there"));
        assert!(!document.contains("{{greeting}}"));
    }
}
