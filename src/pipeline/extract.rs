//! Segment extraction: turn a document into ordered, non-empty text segments.
//!
//! Every reader honours the same contract: segments come back in document
//! order, each trimmed and non-empty. Anything the reader cannot parse is a
//! fatal [`FrdError::CorruptDocument`]; there is no partial extraction.
//!
//! | Format | Segment |
//! |--------|---------|
//! | docx   | one body paragraph (table cells and content controls included) |
//! | pptx   | the text of one shape, paragraphs joined by `\n` |
//! | txt/md | one non-blank line |

use crate::config::DocumentFormat;
use crate::error::FrdError;
use crate::pipeline::input::{resolve_bytes, ResolvedDocument};
use docx_rust::document::{
    BodyContent, Paragraph, ParagraphContent, Run, RunContent, TableCellContent, TableRowContent,
};
use docx_rust::DocxFile;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Produces ordered text segments from one kind of document.
pub trait SegmentExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Vec<String>, FrdError>;
}

/// Return the reader for `format`.
pub fn extractor_for(format: DocumentFormat) -> Box<dyn SegmentExtractor> {
    match format {
        DocumentFormat::Docx => Box::new(DocxExtractor),
        DocumentFormat::Pptx => Box::new(PptxExtractor),
        DocumentFormat::Text => Box::new(PlainTextExtractor),
    }
}

/// Extract segments from a resolved document on the blocking pool.
pub async fn extract_segments(doc: &ResolvedDocument) -> Result<Vec<String>, FrdError> {
    let path = doc.path().to_path_buf();
    let format = doc.format();
    let segments = tokio::task::spawn_blocking(move || extractor_for(format).extract(&path))
        .await
        .map_err(|e| FrdError::Internal(format!("extraction task panicked: {e}")))??;
    debug!(
        "Extracted {} segments from {}",
        segments.len(),
        doc.path().display()
    );
    Ok(segments)
}

/// Extract segments from uploaded bytes via a managed temp file.
///
/// `name` is the uploaded file name, used in error messages.
pub async fn extract_segments_from_bytes(
    bytes: &[u8],
    name: &str,
    format: DocumentFormat,
) -> Result<Vec<String>, FrdError> {
    let doc = resolve_bytes(bytes, name, format)?;
    // `doc` owns the temp dir; it is removed when this returns.
    extract_segments(&doc).await
}

fn push_segment(segments: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }
}

fn corrupt(path: &Path, detail: impl std::fmt::Display) -> FrdError {
    FrdError::CorruptDocument {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

// ── DOCX ─────────────────────────────────────────────────────────────────────

/// Word reader: one segment per paragraph.
pub struct DocxExtractor;

impl SegmentExtractor for DocxExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<String>, FrdError> {
        let file = DocxFile::from_file(path).map_err(|e| corrupt(path, e))?;
        let docx = file.parse().map_err(|e| corrupt(path, e))?;

        let mut segments = Vec::new();
        for content in &docx.document.body.content {
            collect_body_content(content, &mut segments);
        }
        Ok(segments)
    }
}

fn collect_body_content(content: &BodyContent, segments: &mut Vec<String>) {
    match content {
        BodyContent::Paragraph(para) => push_segment(segments, &paragraph_text(para)),
        BodyContent::Table(table) => {
            for row in &table.rows {
                for cell_content in &row.cells {
                    if let TableRowContent::TableCell(cell) = cell_content {
                        for tc in &cell.content {
                            let TableCellContent::Paragraph(para) = tc;
                            push_segment(segments, &paragraph_text(para));
                        }
                    }
                }
            }
        }
        BodyContent::Sdt(sdt) => {
            if let Some(ref sdt_content) = sdt.content {
                for item in &sdt_content.content {
                    collect_body_content(item, segments);
                }
            }
        }
        _ => {}
    }
}

fn paragraph_text(para: &Paragraph) -> String {
    let mut text = String::new();
    for pc in &para.content {
        match pc {
            ParagraphContent::Run(run) => run_text(run, &mut text),
            ParagraphContent::Link(link) => {
                if let Some(ref run) = link.content {
                    run_text(run, &mut text);
                }
            }
            _ => {}
        }
    }
    text
}

fn run_text(run: &Run, out: &mut String) {
    for rc in &run.content {
        match rc {
            RunContent::Text(t) => out.push_str(&t.text),
            RunContent::Break(_) => out.push('\n'),
            RunContent::Tab(_) => out.push('\t'),
            _ => {}
        }
    }
}

// ── PPTX ─────────────────────────────────────────────────────────────────────

/// PowerPoint reader: one segment per shape, slides in presentation order.
pub struct PptxExtractor;

static RE_SLIDE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ppt/slides/slide(\d+)\.xml$").unwrap());
static RE_SLIDE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<p:sldId\s[^>]*r:id="([^"]+)""#).unwrap());
static RE_RELATIONSHIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<Relationship\s[^>]*>").unwrap());
static RE_REL_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\sId="([^"]+)""#).unwrap());
static RE_REL_TARGET: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\sTarget="([^"]+)""#).unwrap());
static RE_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<p:sp(?:\s[^>]*)?>(.*?)</p:sp>").unwrap());
static RE_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<a:p(?:\s[^>]*)?>(.*?)</a:p>").unwrap());
static RE_RUN_OR_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<a:t(?:\s[^>]*)?>(.*?)</a:t>|<a:br(?:\s[^>]*)?/>").unwrap());
static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(amp|lt|gt|quot|apos|#\d+|#x[0-9a-fA-F]+);").unwrap());

impl SegmentExtractor for PptxExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<String>, FrdError> {
        let file = std::fs::File::open(path).map_err(|e| corrupt(path, e))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| corrupt(path, e))?;

        let slide_names = slide_order(&mut archive, path)?;
        let mut segments = Vec::new();
        for name in slide_names {
            let xml = read_entry(&mut archive, &name, path)?;
            segments.extend(shape_texts(&xml));
        }
        Ok(segments)
    }
}

fn read_entry<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
    path: &Path,
) -> Result<String, FrdError> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| corrupt(path, format!("{name}: {e}")))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| corrupt(path, format!("{name}: {e}")))?;
    Ok(xml)
}

/// Slide entry names in presentation order.
///
/// Uses the `sldIdLst` of `ppt/presentation.xml` when it resolves; otherwise
/// falls back to the numeric order of `ppt/slides/slideN.xml`.
fn slide_order<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    path: &Path,
) -> Result<Vec<String>, FrdError> {
    let mut numbered: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|n| {
            let num = RE_SLIDE_NAME.captures(n)?.get(1)?.as_str().parse().ok()?;
            Some((num, n.to_string()))
        })
        .collect();
    numbered.sort_by_key(|(num, _)| *num);
    let fallback: Vec<String> = numbered.into_iter().map(|(_, n)| n).collect();

    let (Ok(presentation), Ok(rels)) = (
        read_entry(archive, "ppt/presentation.xml", path),
        read_entry(archive, "ppt/_rels/presentation.xml.rels", path),
    ) else {
        return Ok(fallback);
    };

    let ordered = presentation_slide_order(&presentation, &rels);
    if !ordered.is_empty() && ordered.iter().all(|n| fallback.contains(n)) {
        Ok(ordered)
    } else {
        Ok(fallback)
    }
}

fn presentation_slide_order(presentation_xml: &str, rels_xml: &str) -> Vec<String> {
    let targets: HashMap<&str, &str> = RE_RELATIONSHIP
        .find_iter(rels_xml)
        .filter_map(|m| {
            let tag = m.as_str();
            let id = RE_REL_ID.captures(tag)?.get(1)?.as_str();
            let target = RE_REL_TARGET.captures(tag)?.get(1)?.as_str();
            Some((id, target))
        })
        .collect();

    RE_SLIDE_ID
        .captures_iter(presentation_xml)
        .filter_map(|c| {
            let target = targets.get(c.get(1)?.as_str())?;
            Some(format!("ppt/{}", target.trim_start_matches('/').trim_start_matches("ppt/")))
        })
        .collect()
}

/// Text of every shape on a slide, in document order.
fn shape_texts(slide_xml: &str) -> Vec<String> {
    let mut segments = Vec::new();
    for shape in RE_SHAPE.captures_iter(slide_xml) {
        let body = &shape[1];
        let paragraphs: Vec<String> = RE_PARAGRAPH
            .captures_iter(body)
            .map(|p| {
                RE_RUN_OR_BREAK
                    .captures_iter(&p[1])
                    .map(|r| match r.get(1) {
                        Some(t) => decode_xml_entities(t.as_str()),
                        None => "\n".to_string(),
                    })
                    .collect::<String>()
            })
            .collect();
        push_segment(&mut segments, &paragraphs.join("\n"));
    }
    segments
}

fn decode_xml_entities(s: &str) -> String {
    RE_ENTITY
        .replace_all(s, |caps: &Captures| {
            let name = &caps[1];
            match name {
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                _ => {
                    let code = if let Some(hex) = name.strip_prefix("#x") {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        name[1..].parse().ok()
                    };
                    code.and_then(char::from_u32)
                        .map(String::from)
                        .unwrap_or_else(|| caps[0].to_string())
                }
            }
        })
        .into_owned()
}

// ── Plain text ───────────────────────────────────────────────────────────────

/// Text reader: one segment per non-blank line.
pub struct PlainTextExtractor;

impl SegmentExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<String>, FrdError> {
        let text = std::fs::read_to_string(path).map_err(|e| corrupt(path, e))?;
        Ok(text_segments(&text))
    }
}

/// Split text into trimmed, non-blank lines.
pub fn text_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    for line in text.lines() {
        push_segment(&mut segments, line);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE: &str = r#"<?xml version="1.0"?>
<p:sld><p:cSld><p:spTree>
<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title"/></p:nvSpPr><p:spPr/>
<p:txBody><a:bodyPr/><a:p><a:r><a:t>Checkout &amp; Refund</a:t></a:r></a:p></p:txBody></p:sp>
<p:sp><p:spPr/><p:txBody><a:p><a:r><a:t>Req 1: </a:t></a:r><a:r><a:t>login</a:t></a:r></a:p>
<a:p><a:pPr lvl="1"/><a:r><a:t>Req 2: checkout</a:t></a:r><a:br/><a:r><a:t>fast</a:t></a:r></a:p></p:txBody></p:sp>
<p:sp><p:spPr/><p:txBody><a:p/><a:p><a:r><a:t>   </a:t></a:r></a:p></p:txBody></p:sp>
</p:spTree></p:cSld></p:sld>"#;

    #[test]
    fn shapes_become_segments_in_order() {
        let segs = shape_texts(SLIDE);
        assert_eq!(
            segs,
            vec![
                "Checkout & Refund".to_string(),
                "Req 1: login\nReq 2: checkout\nfast".to_string(),
            ]
        );
    }

    #[test]
    fn decodes_numeric_entities() {
        assert_eq!(decode_xml_entities("a &lt;b&gt; &#233; &#x41;"), "a <b> é A");
        assert_eq!(decode_xml_entities("&#xFFFFFFF;"), "&#xFFFFFFF;");
    }

    #[test]
    fn presentation_order_follows_slide_id_list() {
        let pres = r#"<p:sldIdLst><p:sldId id="257" r:id="rId3"/><p:sldId id="256" r:id="rId2"/></p:sldIdLst>"#;
        let rels = r#"<Relationships>
<Relationship Id="rId2" Type="http://x/slide" Target="slides/slide1.xml"/>
<Relationship Target="slides/slide2.xml" Id="rId3" Type="http://x/slide"/>
</Relationships>"#;
        assert_eq!(
            presentation_slide_order(pres, rels),
            vec!["ppt/slides/slide2.xml", "ppt/slides/slide1.xml"]
        );
    }

    #[test]
    fn text_segments_trim_and_skip_blank() {
        assert_eq!(
            text_segments("  Req 1  \n\n\t\nReq 2\r\n"),
            vec!["Req 1".to_string(), "Req 2".to_string()]
        );
        assert!(text_segments("").is_empty());
    }

    #[test]
    fn plain_text_extractor_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("brd.txt");
        std::fs::write(&p, "Scope\n\nReq 1: login\n").unwrap();
        let segs = PlainTextExtractor.extract(&p).unwrap();
        assert_eq!(segs, vec!["Scope", "Req 1: login"]);
    }

    #[tokio::test]
    async fn uploaded_text_bytes_are_extracted() {
        let segs =
            extract_segments_from_bytes(b"Goal\nReq 3: refund\n", "brd.txt", DocumentFormat::Text)
                .await
                .unwrap();
        assert_eq!(segs, vec!["Goal", "Req 3: refund"]);
    }

    #[tokio::test]
    async fn uploaded_non_zip_docx_names_the_upload() {
        let err = extract_segments_from_bytes(b"plain text", "brd_v2.docx", DocumentFormat::Docx)
            .await
            .unwrap_err();
        match err {
            FrdError::CorruptDocument { path, .. } => {
                assert_eq!(path, std::path::PathBuf::from("brd_v2.docx"))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn pptx_extractor_rejects_non_zip() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("deck.pptx");
        std::fs::write(&p, "nope").unwrap();
        let err = PptxExtractor.extract(&p).unwrap_err();
        assert!(matches!(err, FrdError::CorruptDocument { .. }));
    }
}
