//! Multi-format text extraction for downloaded library files.
//!
//! The walker hands over the file name and raw bytes; this module resolves a
//! [`FileFormat`] from the name's suffix and returns plain UTF-8 text.
//!
//! | Suffix | Decoder |
//! |--------|---------|
//! | `pdf` | `pdf-extract`, page by page |
//! | `docx` | `zip` + `quick-xml` over `word/document.xml` |
//! | `pptx` | `zip` + `quick-xml` over `ppt/slides/slideN.xml` |
//! | `xlsx`, `xlsm` | `calamine` (OOXML workbook) |
//! | `xls` | `calamine` (legacy BIFF workbook) |
//! | `csv`, `txt`, `md`, `json`, `xml`, `html` | lossy UTF-8 |
//!
//! Extraction never fails outward: [`extract`] logs and returns `None` on any
//! decode error so one malformed file cannot stop a traversal.

use std::io::{Cursor, Read, Seek};

use calamine::{Data, Reader, Xls, Xlsx};
use quick_xml::events::Event;
use tracing::{debug, warn};

use crate::error::SyncError;

/// Maximum decompressed bytes read from a single ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Document format, resolved once from a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Xls,
    PlainText,
    Unsupported,
}

impl FileFormat {
    /// Resolve the format from the lower-cased suffix after the last `.`.
    ///
    /// Names without a `.` are [`FileFormat::Unsupported`].
    pub fn from_name(name: &str) -> Self {
        let Some((_, suffix)) = name.rsplit_once('.') else {
            return FileFormat::Unsupported;
        };
        match suffix.to_ascii_lowercase().as_str() {
            "pdf" => FileFormat::Pdf,
            "docx" => FileFormat::Docx,
            "pptx" => FileFormat::Pptx,
            "xlsx" | "xlsm" => FileFormat::Xlsx,
            "xls" => FileFormat::Xls,
            "csv" | "txt" | "md" | "json" | "xml" | "html" => FileFormat::PlainText,
            _ => FileFormat::Unsupported,
        }
    }

    pub fn is_supported(self) -> bool {
        self != FileFormat::Unsupported
    }
}

/// Extraction error. Contained by [`extract`]; surfaced by [`try_extract`].
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("spreadsheet extraction failed: {0}")]
    Spreadsheet(String),
    #[error("XLS extraction failed: {0}")]
    LegacySpreadsheet(String),
}

impl From<ExtractError> for SyncError {
    fn from(e: ExtractError) -> Self {
        SyncError::Decode(e.to_string())
    }
}

/// Extract plain text from a file's bytes, dispatching on its name.
///
/// Returns `None` for unsupported formats and for any decode failure.
/// The returned text is trimmed and may be empty.
pub fn extract(name: &str, bytes: &[u8]) -> Option<String> {
    let format = FileFormat::from_name(name);
    match try_extract(format, bytes) {
        Ok(Some(text)) => {
            debug!(file = name, ?format, chars = text.chars().count(), "extracted text");
            Some(text)
        }
        Ok(None) => None,
        Err(e) => {
            let err = SyncError::from(e);
            warn!(file = name, error = %err, "text extraction failed");
            None
        }
    }
}

/// Run the decoder for `format`. `Ok(None)` means the format is unsupported
/// and no parser was invoked.
pub fn try_extract(format: FileFormat, bytes: &[u8]) -> Result<Option<String>, ExtractError> {
    let text = match format {
        FileFormat::Pdf => extract_pdf(bytes)?,
        FileFormat::Docx => extract_docx(bytes)?,
        FileFormat::Pptx => extract_pptx(bytes)?,
        FileFormat::Xlsx => extract_xlsx(bytes)?,
        FileFormat::Xls => extract_xls(bytes)?,
        FileFormat::PlainText => decode_text(bytes),
        FileFormat::Unsupported => return Ok(None),
    };
    Ok(Some(text))
}

fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_start_matches('\u{feff}')
        .trim()
        .to_string()
}

// ============ PDF ============

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed inputs instead of returning an error.
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| ExtractError::Pdf("parser panicked on malformed input".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let mut out = String::new();
    for page in pages {
        if page.trim().is_empty() {
            continue;
        }
        out.push_str(&page);
        out.push('\n');
    }
    Ok(out.trim().to_string())
}

// ============ OOXML (docx, pptx) ============

fn open_zip(bytes: &[u8]) -> Result<zip::ZipArchive<Cursor<&[u8]>>, ExtractError> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_zip(bytes)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    let paragraphs = docx_body_paragraphs(&xml)?;
    Ok(paragraphs.join("\n").trim().to_string())
}

/// Collect the text of each body-level `<w:p>`. Paragraphs inside tables are
/// not body paragraphs and are skipped, as are text boxes, which Word writes
/// once under `mc:Choice` and again under `mc:Fallback`.
fn docx_body_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();

    let mut table_depth = 0usize;
    let mut skip_depth = 0usize;
    let mut para_depth = 0usize;
    let mut current: Option<String> = None;
    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if skip_depth > 0 => {
                if is_docx_skipped(e.local_name().as_ref()) {
                    skip_depth += 1;
                }
            }
            Ok(Event::End(e)) if skip_depth > 0 => {
                if is_docx_skipped(e.local_name().as_ref()) {
                    skip_depth -= 1;
                }
            }
            Ok(Event::Empty(_) | Event::Text(_) | Event::CData(_)) if skip_depth > 0 => {}
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                name if is_docx_skipped(name) => skip_depth = 1,
                b"tbl" => table_depth += 1,
                b"p" => {
                    if current.is_some() {
                        para_depth += 1;
                    } else if table_depth == 0 {
                        current = Some(String::new());
                        para_depth = 1;
                    }
                }
                b"r" => in_run = true,
                b"t" => in_text = current.is_some(),
                _ => {}
            },
            Ok(Event::Empty(e)) => match (e.local_name().as_ref(), current.as_mut()) {
                (b"p", None) if table_depth == 0 => paragraphs.push(String::new()),
                (b"tab", Some(p)) if in_run => p.push('\t'),
                (b"br" | b"cr", Some(p)) if in_run => p.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                if let Some(p) = current.as_mut() {
                    p.push_str(&te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?);
                }
            }
            Ok(Event::CData(cd)) if in_text => {
                if let Some(p) = current.as_mut() {
                    p.push_str(&String::from_utf8_lossy(&cd));
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                b"t" => in_text = false,
                b"r" => in_run = false,
                b"p" if current.is_some() => {
                    para_depth -= 1;
                    if para_depth == 0 {
                        paragraphs.extend(current.take());
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}

fn is_docx_skipped(local_name: &[u8]) -> bool {
    matches!(local_name, b"txbxContent" | b"Fallback")
}

fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_zip(bytes)?;
    let slide_names = numbered_parts(&archive, "ppt/slides/slide", ".xml");
    let mut lines = Vec::new();
    for name in slide_names {
        let xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        lines.extend(slide_shape_paragraphs(&xml)?);
    }
    Ok(lines.join("\n").trim().to_string())
}

/// Part names matching `{prefix}N{suffix}`, sorted by `N`.
fn numbered_parts(
    archive: &zip::ZipArchive<Cursor<&[u8]>>,
    prefix: &str,
    suffix: &str,
) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(suffix))
        .filter(|n| !n[prefix.len()..].contains('/'))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(suffix)
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Paragraph texts of every top-level shape (`<p:sp>`) that carries a text
/// body. Group members and table cells are not top-level text frames.
fn slide_shape_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();

    let mut group_depth = 0usize;
    let mut shape_depth = 0usize;
    let mut body_depth = 0usize;
    let mut current: Option<String> = None;
    let mut in_text = false;

    loop {
        let in_frame = group_depth == 0 && shape_depth > 0 && body_depth > 0;
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"grpSp" => group_depth += 1,
                b"sp" => shape_depth += 1,
                b"txBody" if shape_depth > 0 => body_depth += 1,
                b"p" if in_frame && current.is_none() => current = Some(String::new()),
                b"t" => in_text = current.is_some(),
                _ => {}
            },
            Ok(Event::Empty(e)) => match (e.local_name().as_ref(), current.as_mut()) {
                (b"p", None) if in_frame => paragraphs.push(String::new()),
                (b"br", Some(p)) => p.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                if let Some(p) = current.as_mut() {
                    p.push_str(&te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"grpSp" => group_depth = group_depth.saturating_sub(1),
                b"sp" => shape_depth = shape_depth.saturating_sub(1),
                b"txBody" if shape_depth > 0 => body_depth = body_depth.saturating_sub(1),
                b"t" => in_text = false,
                b"p" => paragraphs.extend(current.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}

// ============ Spreadsheets ============

fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes)).map_err(|e| ExtractError::Spreadsheet(e.to_string()))?;
    render_workbook::<Cursor<&[u8]>, _>(&mut workbook).map_err(ExtractError::Spreadsheet)
}

fn extract_xls(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut workbook: Xls<_> = Xls::new(Cursor::new(bytes))
        .map_err(|e| ExtractError::LegacySpreadsheet(e.to_string()))?;
    render_workbook::<Cursor<&[u8]>, _>(&mut workbook).map_err(ExtractError::LegacySpreadsheet)
}

/// Render every sheet as a `[name]` line, one comma-joined line per row, and
/// a blank separator line.
///
/// Rows and columns are anchored at `A1`: calamine's range begins at the
/// first used cell, so the rows and columns before it are emitted as empty.
fn render_workbook<RS, R>(workbook: &mut R) -> Result<String, String>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    let mut lines = Vec::new();
    for sheet in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| format!("sheet '{}': {}", sheet, e))?;
        lines.push(format!("[{}]", sheet));
        if let Some((first_row, first_col)) = range.start() {
            lines.extend(std::iter::repeat(String::new()).take(first_row as usize));
            let indent = ",".repeat(first_col as usize);
            for row in range.rows() {
                let cells: Vec<String> = row.iter().map(cell_text).collect();
                lines.push(format!("{}{}", indent, cells.join(",")));
            }
        }
        lines.push(String::new());
    }
    Ok(lines.join("\n").trim().to_string())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_suffix() {
        assert_eq!(FileFormat::from_name("Report.PDF"), FileFormat::Pdf);
        assert_eq!(FileFormat::from_name("a.b.docx"), FileFormat::Docx);
        assert_eq!(FileFormat::from_name("deck.pptx"), FileFormat::Pptx);
        assert_eq!(FileFormat::from_name("book.xlsm"), FileFormat::Xlsx);
        assert_eq!(FileFormat::from_name("old.XLS"), FileFormat::Xls);
        assert_eq!(FileFormat::from_name("notes.md"), FileFormat::PlainText);
        assert_eq!(FileFormat::from_name("index.html"), FileFormat::PlainText);
    }

    #[test]
    fn names_without_known_suffix_are_unsupported() {
        assert_eq!(FileFormat::from_name("txt"), FileFormat::Unsupported);
        assert_eq!(FileFormat::from_name("archive.zip"), FileFormat::Unsupported);
        assert_eq!(FileFormat::from_name("photo.jpeg"), FileFormat::Unsupported);
        assert_eq!(FileFormat::from_name("trailing."), FileFormat::Unsupported);
        assert!(!FileFormat::Unsupported.is_supported());
    }

    #[test]
    fn unsupported_format_invokes_no_parser() {
        let out = try_extract(FileFormat::Unsupported, b"%PDF-1.4 garbage").unwrap();
        assert!(out.is_none());
        assert!(extract("binary.exe", b"MZ\x90\x00").is_none());
    }

    #[test]
    fn plain_text_is_lossy_and_trimmed() {
        let bytes = b"  hello \xff world\n\n";
        assert_eq!(extract("a.txt", bytes).unwrap(), "hello \u{fffd} world");
        assert_eq!(extract("b.csv", b"\xef\xbb\xbfa,b\n1,2\n").unwrap(), "a,b\n1,2");
    }

    #[test]
    fn invalid_pdf_yields_nothing() {
        assert!(extract("broken.pdf", b"not a pdf").is_none());
        assert!(matches!(
            try_extract(FileFormat::Pdf, b"not a pdf"),
            Err(ExtractError::Pdf(_))
        ));
    }

    #[test]
    fn invalid_zip_yields_nothing_for_ooxml() {
        assert!(extract("broken.docx", b"not a zip").is_none());
        assert!(extract("broken.pptx", b"not a zip").is_none());
        assert!(matches!(
            try_extract(FileFormat::Docx, b"not a zip"),
            Err(ExtractError::Ooxml(_))
        ));
    }

    #[test]
    fn invalid_spreadsheets_yield_nothing() {
        assert!(extract("broken.xlsx", b"not a workbook").is_none());
        assert!(matches!(
            try_extract(FileFormat::Xls, b"not a workbook"),
            Err(ExtractError::LegacySpreadsheet(_))
        ));
    }

    #[test]
    fn docx_paragraphs_skip_tables() {
        let xml = br#"<w:document xmlns:w="w"><w:body>
            <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p>
            <w:p/>
            <w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
            <w:p><w:pPr><w:tabs><w:tab w:val="left"/></w:tabs></w:pPr><w:r><w:t>a</w:t><w:tab/><w:t>b &amp; c</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let paragraphs = docx_body_paragraphs(xml).unwrap();
        assert_eq!(paragraphs, vec!["Hello world", "", "a\tb & c"]);
    }

    #[test]
    fn docx_text_boxes_stay_out_of_body_paragraphs() {
        let xml = br#"<w:document xmlns:w="w" xmlns:mc="mc" xmlns:wps="wps" xmlns:v="v"><w:body>
            <w:p><w:r><w:t>Before</w:t></w:r><w:r><mc:AlternateContent>
                <mc:Choice Requires="wps"><w:drawing><wps:txbx><w:txbxContent>
                    <w:p><w:r><w:t>boxed</w:t></w:r></w:p>
                </w:txbxContent></wps:txbx></w:drawing></mc:Choice>
                <mc:Fallback><w:pict><v:textbox><w:txbxContent>
                    <w:p><w:r><w:t>boxed</w:t></w:r></w:p>
                </w:txbxContent></v:textbox></w:pict></mc:Fallback>
            </mc:AlternateContent></w:r><w:r><w:t xml:space="preserve"> after</w:t></w:r></w:p>
            <w:p><w:r><w:t>Next</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let paragraphs = docx_body_paragraphs(xml).unwrap();
        assert_eq!(paragraphs, vec!["Before after", "Next"]);
    }

    #[test]
    fn date_cells_render_as_timestamps() {
        use calamine::{ExcelDateTime, ExcelDateTimeType};

        let date = ExcelDateTime::new(45292.0, ExcelDateTimeType::DateTime, false);
        assert_eq!(cell_text(&Data::DateTime(date)), "2024-01-01 00:00:00");
        assert_eq!(
            cell_text(&Data::DateTimeIso("2024-01-01T08:30:00".to_string())),
            "2024-01-01T08:30:00"
        );
        assert_eq!(cell_text(&Data::Float(3.0)), "3");
        assert_eq!(cell_text(&Data::Empty), "");
    }

    #[test]
    fn slide_paragraphs_only_from_shape_text_bodies() {
        let xml = br#"<p:sld xmlns:p="p" xmlns:a="a"><p:cSld><p:spTree>
            <p:sp><p:txBody><a:bodyPr/><a:p><a:r><a:t>Title</a:t></a:r></a:p></p:txBody></p:sp>
            <p:sp><p:txBody><a:p><a:r><a:t>one</a:t></a:r></a:p><a:p><a:r><a:t>two</a:t></a:r></a:p></p:txBody></p:sp>
            <p:graphicFrame><a:graphic><a:tbl><a:tr><a:tc><a:txBody><a:p><a:r><a:t>table</a:t></a:r></a:p></a:txBody></a:tc></a:tr></a:tbl></a:graphic></p:graphicFrame>
            <p:grpSp><p:sp><p:txBody><a:p><a:r><a:t>grouped</a:t></a:r></a:p></p:txBody></p:sp></p:grpSp>
        </p:spTree></p:cSld></p:sld>"#;
        let paragraphs = slide_shape_paragraphs(xml).unwrap();
        assert_eq!(paragraphs, vec!["Title", "one", "two"]);
    }
}
