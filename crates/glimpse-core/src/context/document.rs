//! Plain-text extraction from DOCX (and plain text) documents.
//!
//! A DOCX file is a ZIP archive; the body lives in `word/document.xml` as
//! WordprocessingML. Body paragraphs (`w:p`) are rebuilt from their text runs
//! (`w:t`), with tabs and breaks read as spaces. Paragraphs inside tables are
//! skipped.

use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::PipelineError;

const DOCUMENT_XML: &str = "word/document.xml";

/// Reads context documents as plain text.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxReader;

impl DocxReader {
    /// Read a document's text.
    ///
    /// Non-empty paragraphs are trimmed and joined with a blank line. Files
    /// with a `.txt` or `.md` extension are returned as-is.
    pub fn read_text(&self, path: &Path) -> Result<String, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }

        let is_plain = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("txt") || e.eq_ignore_ascii_case("md"));
        if is_plain {
            return std::fs::read_to_string(path).map_err(|e| document_error(path, e));
        }

        let file = std::fs::File::open(path).map_err(|e| document_error(path, e))?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| document_error(path, format!("Failed to read DOCX as ZIP: {e}")))?;
        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_XML)
            .map_err(|e| document_error(path, format!("Missing {DOCUMENT_XML}: {e}")))?
            .read_to_string(&mut xml)
            .map_err(|e| document_error(path, format!("Failed to read {DOCUMENT_XML}: {e}")))?;

        let paragraphs = body_paragraphs(&xml).map_err(|e| document_error(path, e))?;
        tracing::debug!("Read {} paragraphs from {:?}", paragraphs.len(), path);
        Ok(join_paragraphs(&paragraphs))
    }
}

/// Extract a document's text and optionally save it as a `.txt` file.
pub fn convert_docx_to_txt(input: &Path, output: Option<&Path>) -> Result<String, PipelineError> {
    let text = DocxReader.read_text(input)?;
    if let Some(output) = output {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| document_error(output, e))?;
        }
        std::fs::write(output, &text).map_err(|e| document_error(output, e))?;
        tracing::info!("Wrote document text to {:?}", output);
    }
    Ok(text)
}

fn join_paragraphs(paragraphs: &[String]) -> String {
    paragraphs
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Text of each top-level body paragraph, in document order.
fn body_paragraphs(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut table_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:tbl" => table_depth += 1,
                b"w:p" if table_depth == 0 => current.clear(),
                b"w:t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" | b"w:br" | b"w:cr" if table_depth == 0 => current.push(' '),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text && table_depth == 0 => {
                let text = t.unescape().map_err(|e| format!("Invalid XML text: {e}"))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:tbl" => table_depth = table_depth.saturating_sub(1),
                b"w:p" if table_depth == 0 => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "Malformed XML at position {}: {e}",
                    reader.buffer_position()
                ))
            }
            _ => {}
        }
    }

    Ok(paragraphs)
}

fn document_error(path: &Path, message: impl ToString) -> PipelineError {
    PipelineError::Document {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::docx_bytes;

    #[test]
    fn test_body_paragraphs_joins_runs() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Hola </w:t></w:r><w:r><w:t>mundo</w:t></w:r></w:p>
            <w:p><w:r><w:t>A</w:t><w:tab/><w:t>B &amp; C</w:t></w:r></w:p>
            <w:p/>
        </w:body></w:document>"#;
        let paragraphs = body_paragraphs(xml).unwrap();
        assert_eq!(paragraphs, vec!["Hola mundo", "A B & C"]);
    }

    #[test]
    fn test_table_paragraphs_are_skipped() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Antes</w:t></w:r></w:p>
            <w:tbl><w:tr><w:tc><w:p><w:r><w:t>Celda</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
            <w:p><w:r><w:t>Después</w:t></w:r></w:p>
        </w:body></w:document>"#;
        assert_eq!(body_paragraphs(xml).unwrap(), vec!["Antes", "Después"]);
    }

    #[test]
    fn test_read_docx_drops_empty_paragraphs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.docx");
        std::fs::write(&path, docx_bytes(&["  Primero. ", "", "   ", "Segundo"])).unwrap();

        let text = DocxReader.read_text(&path).unwrap();
        assert_eq!(text, "Primero.\n\nSegundo");
    }

    #[test]
    fn test_convert_writes_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.docx");
        std::fs::write(&input, docx_bytes(&["Uno", "Dos"])).unwrap();
        let output = dir.path().join("out").join("doc.txt");

        let text = convert_docx_to_txt(&input, Some(&output)).unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), text);
    }

    #[test]
    fn test_plain_text_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "línea uno\n\nlínea dos").unwrap();
        assert_eq!(
            DocxReader.read_text(&path).unwrap(),
            "línea uno\n\nlínea dos"
        );
    }

    #[test]
    fn test_not_a_zip_is_document_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.docx");
        std::fs::write(&path, b"plain bytes").unwrap();
        let err = DocxReader.read_text(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Document { .. }));
    }

    #[test]
    fn test_missing_document() {
        let err = DocxReader
            .read_text(Path::new("/nonexistent/doc.docx"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }
}
