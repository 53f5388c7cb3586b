//! WordprocessingML fragments for generated paragraphs and runs.

use quick_xml::escape::escape;

/// English Metric Units per pixel at 96 DPI.
pub(crate) const EMU_PER_PIXEL: u64 = 9525;

const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Wrap runs in a paragraph, with optional `w:pPr` markup.
pub(crate) fn paragraph(properties: Option<&str>, runs: &str) -> String {
    format!("<w:p>{}{}</w:p>", properties.unwrap_or_default(), runs)
}

/// A text run. Newlines become `w:br` breaks and tabs `w:tab`.
pub(crate) fn text_run(text: &str, properties: Option<&str>) -> String {
    format!(
        "<w:r>{}{}</w:r>",
        properties.unwrap_or_default(),
        run_content(text)
    )
}

/// Run children for `text`, without the enclosing `w:r`.
pub(crate) fn run_content(text: &str) -> String {
    let mut out = String::new();

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push_str("<w:br/>");
        }
        for (j, segment) in line.split('\t').enumerate() {
            if j > 0 {
                out.push_str("<w:tab/>");
            }
            if !segment.is_empty() {
                out.push_str(r#"<w:t xml:space="preserve">"#);
                out.push_str(&escape(segment));
                out.push_str("</w:t>");
            }
        }
    }

    out
}

/// An inline picture run referencing a media relationship.
pub(crate) fn image_run(
    relationship_id: &str,
    drawing_id: u32,
    width_px: u32,
    height_px: u32,
    properties: Option<&str>,
) -> String {
    let cx = u64::from(width_px) * EMU_PER_PIXEL;
    let cy = u64::from(height_px) * EMU_PER_PIXEL;

    format!(
        concat!(
            "<w:r>{rpr}<w:drawing>",
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0" xmlns:wp="{wp}">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:docPr id="{id}" name="Picture {id}"/>"#,
            r#"<a:graphic xmlns:a="{a}"><a:graphicData uri="{pic}">"#,
            r#"<pic:pic xmlns:pic="{pic}">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="Picture {id}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rel}" xmlns:r="{r}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            "</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"
        ),
        rpr = properties.unwrap_or_default(),
        wp = NS_WP,
        a = NS_A,
        pic = NS_PIC,
        r = NS_R,
        id = drawing_id,
        rel = relationship_id,
        cx = cx,
        cy = cy,
    )
}
