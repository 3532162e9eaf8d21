//! Multi-format text extraction for client documents.
//!
//! Each extractor turns one file into an ordered sequence of page-level
//! [`PageText`] chunks. Dispatch is by file extension; unrecognized
//! extensions yield an empty sequence rather than an error, and empty or
//! whitespace-only text never produces a chunk. Raster images delegate to
//! the [`ImageDescriber`] collaborator, which is the only extractor with a
//! network side effect.

use std::io::Read;
use std::path::Path;

use crate::genai::ImageDescriber;
use crate::models::PageText;

/// Maximum sheets to process in an xlsx workbook.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet (avoids unbounded memory).
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction error. Recovered per file by the ingest layer; never aborts
/// ingestion of sibling files.
#[derive(Debug)]
pub enum ExtractError {
    Io(String),
    Pdf(String),
    Ooxml(String),
    Image(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Io(e) => write!(f, "file read failed: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Ooxml(e) => write!(f, "OOXML extraction failed: {}", e),
            ExtractError::Image(e) => write!(f, "image description failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extracts ordered page chunks from a file, dispatching on its extension.
///
/// Returns `Ok(vec![])` for unrecognized extensions and for files whose
/// extracted text is entirely empty or whitespace.
pub async fn extract_file(
    path: &Path,
    describer: &dyn ImageDescriber,
) -> Result<Vec<PageText>, ExtractError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => extract_pdf(&read_bytes(path)?),
        "docx" => extract_docx(&read_bytes(path)?),
        "xlsx" => extract_xlsx(&read_bytes(path)?),
        "png" | "jpg" | "jpeg" | "webp" => {
            extract_image(&read_bytes(path)?, image_mime(&ext), describer).await
        }
        "txt" | "csv" | "md" => extract_plain(&read_bytes(path)?),
        _ => Ok(Vec::new()),
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, ExtractError> {
    std::fs::read(path).map_err(|e| ExtractError::Io(e.to_string()))
}

fn image_mime(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

/// Wraps non-blank text as a page chunk; blank text yields nothing.
fn page_chunk(text: &str, page: i64) -> Option<PageText> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PageText {
            text: trimmed.to_string(),
            page,
        })
    }
}

// ============ Plain text ============

fn extract_plain(bytes: &[u8]) -> Result<Vec<PageText>, ExtractError> {
    let text = String::from_utf8_lossy(bytes);
    Ok(page_chunk(&text, 1).into_iter().collect())
}

// ============ PDF ============

/// Per-page plain-text extraction. The page split is load-bearing: tabular
/// financial data loses meaning when pages are flattened together, and the
/// brief cites `(document, page)` pairs.
fn extract_pdf(bytes: &[u8]) -> Result<Vec<PageText>, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    Ok(pages
        .iter()
        .enumerate()
        .filter_map(|(i, text)| page_chunk(text, i as i64 + 1))
        .collect())
}

// ============ Raster images ============

async fn extract_image(
    bytes: &[u8],
    mime: &str,
    describer: &dyn ImageDescriber,
) -> Result<Vec<PageText>, ExtractError> {
    let text = describer
        .describe(bytes, mime)
        .await
        .map_err(|e| ExtractError::Image(e.to_string()))?;
    Ok(page_chunk(&text, 1).into_iter().collect())
}

// ============ OOXML helpers ============

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
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

// ============ DOCX ============

/// All paragraphs of the document body, joined with newlines, as one
/// page-1 chunk.
fn extract_docx(bytes: &[u8]) -> Result<Vec<PageText>, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let doc_xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    let text = extract_docx_paragraphs(&doc_xml)?;
    Ok(page_chunk(&text, 1).into_iter().collect())
}

fn extract_docx_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        current.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" && !current.trim().is_empty() {
                    paragraphs.push(std::mem::take(&mut current));
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !current.trim().is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs.join("\n"))
}

// ============ XLSX ============

/// One chunk per worksheet, in workbook file order. Each sheet is rendered
/// as a textual table: rows on lines, cells tab-separated.
fn extract_xlsx(bytes: &[u8]) -> Result<Vec<PageText>, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheet_names = list_worksheet_names(&mut archive)?;

    let mut out = Vec::new();
    for (idx, name) in sheet_names.into_iter().take(XLSX_MAX_SHEETS).enumerate() {
        let sheet_xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        let table = render_xlsx_sheet(&sheet_xml, &shared_strings)?;
        if let Some(chunk) = page_chunk(&table, idx as i64 + 1) {
            out.push(chunk);
        }
    }
    Ok(out)
}

fn read_shared_strings(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
    // Workbooks with no string cells have no sharedStrings part at all.
    if !archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_si = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"si" {
                    in_si = true;
                } else if in_si && e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        strings.push(te.unescape().unwrap_or_default().into_owned());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"si" {
                    in_si = false;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn list_worksheet_names(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    Ok(names)
}

fn render_xlsx_sheet(xml: &[u8], shared_strings: &[String]) -> Result<String, ExtractError> {
    let mut lines: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_v = false;
    let mut cell_is_shared_str = false;
    let mut cell_count = 0usize;
    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => row.clear(),
                b"c" => {
                    cell_is_shared_str = e.attributes().any(|a| {
                        a.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                }
                b"v" => in_v = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_v => {
                let v = te.unescape().unwrap_or_default();
                let s = v.trim();
                if !s.is_empty() {
                    if cell_is_shared_str {
                        if let Some(shared) = s
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared_strings.get(i))
                        {
                            row.push(shared.clone());
                            cell_count += 1;
                        }
                    } else {
                        // Numeric or inline literal: keep the raw value.
                        row.push(s.to_string());
                        cell_count += 1;
                    }
                }
                in_v = false;
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_v = false,
                b"c" => cell_is_shared_str = false,
                b"row" => {
                    if !row.is_empty() {
                        lines.push(row.join("\t"));
                        row.clear();
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genai::NullDescriber;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    /// Minimal parseable PDF with one page per phrase. Body is emitted first,
    /// then the xref with correct byte offsets.
    fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
        let n = pages.len();
        // ids: 1 catalog, 2 page tree, 3..2+n pages, 3+n..2+2n streams, 3+2n font
        let font_id = 3 + 2 * n;
        let mut out = Vec::new();
        let mut offsets = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        offsets.push(out.len());
        out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        offsets.push(out.len());
        let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 3 + i)).collect();
        out.extend_from_slice(
            format!(
                "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
                kids.join(" "),
                n
            )
            .as_bytes(),
        );
        for i in 0..n {
            offsets.push(out.len());
            out.extend_from_slice(
                format!(
                    "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 {} 0 R >> >> >> endobj\n",
                    3 + i,
                    3 + n + i,
                    font_id
                )
                .as_bytes(),
            );
        }
        for (i, phrase) in pages.iter().enumerate() {
            let content = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", phrase);
            offsets.push(out.len());
            out.extend_from_slice(
                format!(
                    "{} 0 obj << /Length {} >> stream\n",
                    3 + n + i,
                    content.len()
                )
                .as_bytes(),
            );
            out.extend_from_slice(content.as_bytes());
            out.extend_from_slice(b"\nendstream endobj\n");
        }
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
                font_id
            )
            .as_bytes(),
        );
        let xref_start = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", font_id + 1).as_bytes());
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for off in &offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                font_id + 1,
                xref_start
            )
            .as_bytes(),
        );
        out
    }

    fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut z = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            z.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            let body: String = paragraphs
                .iter()
                .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
                .collect();
            let xml = format!(
                "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
                body
            );
            z.write_all(xml.as_bytes()).unwrap();
            z.finish().unwrap();
        }
        buf
    }

    fn xlsx_bytes(sheets: &[Vec<Vec<&str>>]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut z = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let mut shared: Vec<String> = Vec::new();
            let mut sheet_xmls: Vec<String> = Vec::new();
            for rows in sheets {
                let mut rows_xml = String::new();
                for row in rows {
                    rows_xml.push_str("<row>");
                    for cell in row {
                        let idx = shared.len();
                        shared.push(cell.to_string());
                        rows_xml.push_str(&format!("<c t=\"s\"><v>{}</v></c>", idx));
                    }
                    rows_xml.push_str("</row>");
                }
                sheet_xmls.push(format!(
                    "<?xml version=\"1.0\"?><worksheet><sheetData>{}</sheetData></worksheet>",
                    rows_xml
                ));
            }
            z.start_file(
                "xl/sharedStrings.xml",
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
            let sst: String = shared
                .iter()
                .map(|s| format!("<si><t>{}</t></si>", s))
                .collect();
            z.write_all(format!("<?xml version=\"1.0\"?><sst>{}</sst>", sst).as_bytes())
                .unwrap();
            for (i, xml) in sheet_xmls.iter().enumerate() {
                z.start_file(
                    format!("xl/worksheets/sheet{}.xml", i + 1),
                    zip::write::SimpleFileOptions::default(),
                )
                .unwrap();
                z.write_all(xml.as_bytes()).unwrap();
            }
            z.finish().unwrap();
        }
        buf
    }

    #[tokio::test]
    async fn unrecognized_extension_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "archive.bin", b"whatever");
        let chunks = extract_file(&path, &NullDescriber).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn plain_text_is_single_page_one_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "notes.txt", b"  Meeting notes from March.  ");
        let chunks = extract_file(&path, &NullDescriber).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[0].text, "Meeting notes from March.");
    }

    #[tokio::test]
    async fn whitespace_only_file_yields_no_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "blank.txt", b"   \n\t  ");
        let chunks = extract_file(&path, &NullDescriber).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn pdf_pages_become_ordered_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "stmt.pdf",
            &pdf_bytes(&[
                "portfolio grew four percent",
                "schedule roth conversion review",
            ]),
        );
        let chunks = extract_file(&path, &NullDescriber).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, 1);
        assert!(chunks[0].text.contains("portfolio grew four percent"));
        assert_eq!(chunks[1].page, 2);
        assert!(chunks[1].text.contains("schedule roth conversion review"));
    }

    #[tokio::test]
    async fn invalid_pdf_returns_pdf_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "bad.pdf", b"not a pdf");
        let err = extract_file(&path, &NullDescriber).await.unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[tokio::test]
    async fn invalid_zip_returns_ooxml_error_for_docx() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "bad.docx", b"not a zip");
        let err = extract_file(&path, &NullDescriber).await.unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[tokio::test]
    async fn docx_paragraphs_concatenate_into_page_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "letter.docx",
            &docx_bytes(&["Dear client,", "Your portfolio grew 4%."]),
        );
        let chunks = extract_file(&path, &NullDescriber).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[0].text, "Dear client,\nYour portfolio grew 4%.");
    }

    #[tokio::test]
    async fn xlsx_sheets_become_ordered_page_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let sheets = vec![
            vec![vec!["Holding", "Value"], vec!["Bonds", "1200"]],
            vec![vec!["Tax year", "2024"]],
        ];
        let path = write_temp(&dir, "portfolio.xlsx", &xlsx_bytes(&sheets));
        let chunks = extract_file(&path, &NullDescriber).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[0].text, "Holding\tValue\nBonds\t1200");
        assert_eq!(chunks[1].page, 2);
        assert_eq!(chunks[1].text, "Tax year\t2024");
    }

    #[tokio::test]
    async fn image_with_disabled_describer_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "chart.png", b"\x89PNG\r\n");
        let err = extract_file(&path, &NullDescriber).await.unwrap_err();
        assert!(matches!(err, ExtractError::Image(_)));
    }
}
