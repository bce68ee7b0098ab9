use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::debug;

/// Source of document lines for scoring.
pub trait LineExtractor {
    fn extract_lines(&self, path: &Path) -> Result<Vec<String>>;
}

/// Reads PDFs through `pdftotext` and any other file as plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExtractor;

impl LineExtractor for DocumentExtractor {
    fn extract_lines(&self, path: &Path) -> Result<Vec<String>> {
        extract_lines(path)
    }
}

/// Returns the document's text as trimmed, non-empty lines in page order.
pub fn extract_lines(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        bail!("document not found: {}", path.display());
    }

    let pages = if is_pdf(path) {
        extract_pages_with_pdftotext(path)?
    } else {
        vec![
            fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
        ]
    };

    let lines = lines_from_pages(&pages);
    debug!(
        path = %path.display(),
        pages = pages.len(),
        lines = lines.len(),
        "extracted document lines"
    );
    Ok(lines)
}

pub fn lines_from_pages<S: AsRef<str>>(pages: &[S]) -> Vec<String> {
    pages
        .iter()
        .flat_map(|page| page.as_ref().lines())
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn extract_pages_with_pdftotext(pdf_path: &Path) -> Result<Vec<String>> {
    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg(pdf_path)
        .arg("-")
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    Ok(split_pages(&String::from_utf8_lossy(&output.stdout)))
}

fn split_pages(raw: &str) -> Vec<String> {
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    while let Some(last_page) = pages.last() {
        if last_page.trim().is_empty() {
            pages.pop();
            continue;
        }
        break;
    }

    pages
}

/// First line of `pdftotext -v`, if the tool is installed.
pub fn pdftotext_version() -> Option<String> {
    let output = Command::new("pdftotext").arg("-v").output().ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };

    source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_from_pages_drops_blank_lines_and_keeps_order() {
        let pages = vec![
            "  First line  \n\n   \nSecond line\n".to_string(),
            "\t\nThird line\r\n  ".to_string(),
        ];

        let lines = lines_from_pages(&pages);
        assert_eq!(lines, vec!["First line", "Second line", "Third line"]);
        assert!(lines.iter().all(|line| !line.trim().is_empty()));
    }

    #[test]
    fn split_pages_drops_trailing_empty_pages_and_nuls() {
        let pages = split_pages("page one\u{0000}\u{000C}page two\u{000C}\n\u{000C}");
        assert_eq!(pages, vec!["page one".to_string(), "page two".to_string()]);
    }

    #[test]
    fn extract_lines_reads_plain_text_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("reference.txt");
        fs::write(&path, "the cat sat\n\n  on the mat  \n").expect("write fixture");

        let lines = extract_lines(&path).expect("extract");
        assert_eq!(lines, vec!["the cat sat", "on the mat"]);
    }

    #[test]
    fn extract_lines_fails_for_missing_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(extract_lines(&dir.path().join("missing.pdf")).is_err());
    }
}
