use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use tracing::info;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 10.0;
const LINE_HEIGHT_MM: f32 = 10.0;
const FONT_SIZE_PT: f32 = 12.0;
/// Helvetica at 12pt fits roughly this many average-width glyphs in a 120mm cell.
const CELL_WIDTH_CHARS: usize = 56;

/// Lays out one paragraph per input line, word-wrapped, on A4 pages.
pub fn layout_lines(text: &str) -> Vec<Vec<String>> {
    let usable = PAGE_HEIGHT_MM - 2.0 * MARGIN_MM;
    let lines_per_page = (usable / LINE_HEIGHT_MM).floor().max(1.0) as usize;

    let rows: Vec<String> = text
        .lines()
        .flat_map(|line| wrap_paragraph(line.trim(), CELL_WIDTH_CHARS))
        .collect();

    if rows.is_empty() {
        return vec![Vec::new()];
    }

    rows.chunks(lines_per_page)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Greedy word wrap; words longer than `width` are split hard.
pub fn wrap_paragraph(paragraph: &str, width: usize) -> Vec<String> {
    let mut rows = Vec::new();
    let mut current = String::new();

    for word in paragraph.split_whitespace() {
        let mut word = word.to_string();
        while word.chars().count() > width {
            if !current.is_empty() {
                rows.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(width).collect();
            word = word.chars().skip(width).collect();
            rows.push(head);
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            rows.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() || rows.is_empty() {
        rows.push(current);
    }
    rows
}

/// Characters outside WinAnsi that the built-in Helvetica would silently drop, in order of
/// first appearance.
pub fn unencodable_chars(text: &str) -> Vec<char> {
    let mut found = Vec::new();
    for character in text.chars() {
        if character.is_whitespace() || encodable_in_win_ansi(character) {
            continue;
        }
        if !found.contains(&character) {
            found.push(character);
        }
    }
    found
}

fn encodable_in_win_ansi(character: char) -> bool {
    matches!(
        character,
        ' '..='~'
            | '\u{A0}'..='\u{FF}'
            | '€' | '‚' | 'ƒ' | '„' | '…' | '†' | '‡' | 'ˆ' | '‰' | 'Š' | '‹' | 'Œ' | 'Ž'
            | '‘' | '’' | '“' | '”' | '•' | '–' | '—' | '˜' | '™' | 'š' | '›' | 'œ' | 'ž'
            | 'Ÿ'
    )
}

/// Converts a text file to PDF. `font` is a TrueType file to embed; without it the
/// built-in Helvetica is used and text it cannot encode is rejected.
pub fn text_file_to_pdf(txt_path: &Path, pdf_path: &Path, font: Option<&Path>) -> Result<()> {
    let text = fs::read_to_string(txt_path)
        .with_context(|| format!("failed to read {}", txt_path.display()))?;
    write_pdf(&text, pdf_path, font)?;
    info!(path = %pdf_path.display(), "wrote PDF document");
    Ok(())
}

pub fn write_pdf(text: &str, pdf_path: &Path, font: Option<&Path>) -> Result<()> {
    if font.is_none() {
        let unsupported = unencodable_chars(text);
        if !unsupported.is_empty() {
            let listed: String = unsupported.iter().take(16).collect();
            bail!(
                "text for {} has {} character(s) the built-in font cannot encode ({}); pass --font with a Unicode TrueType font",
                pdf_path.display(),
                unsupported.len(),
                listed
            );
        }
    }

    let pages = layout_lines(text);
    let title = pdf_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("model output");

    let (document, first_page, first_layer) = PdfDocument::new(
        title,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "text",
    );
    let font = match font {
        Some(font_path) => {
            let file = File::open(font_path)
                .with_context(|| format!("failed to open font {}", font_path.display()))?;
            document
                .add_external_font(file)
                .map_err(|error| anyhow!("failed to embed font {}: {error:?}", font_path.display()))?
        }
        None => document
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|error| anyhow!("failed to register PDF font: {error:?}"))?,
    };

    for (index, rows) in pages.iter().enumerate() {
        let (page, layer) = if index == 0 {
            (first_page, first_layer)
        } else {
            document.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "text")
        };
        let canvas = document.get_page(page).get_layer(layer);

        let mut baseline = PAGE_HEIGHT_MM - MARGIN_MM - LINE_HEIGHT_MM / 2.0;
        for row in rows {
            if !row.is_empty() {
                canvas.use_text(row.as_str(), FONT_SIZE_PT, Mm(MARGIN_MM), Mm(baseline), &font);
            }
            baseline -= LINE_HEIGHT_MM;
        }
    }

    if let Some(parent) = pdf_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    let file = File::create(pdf_path)
        .with_context(|| format!("failed to create {}", pdf_path.display()))?;
    document
        .save(&mut BufWriter::new(file))
        .map_err(|error| anyhow!("failed to write {}: {error:?}", pdf_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_paragraph_breaks_on_word_boundaries() {
        let rows = wrap_paragraph("the quick brown fox jumps", 10);
        assert_eq!(rows, vec!["the quick", "brown fox", "jumps"]);
    }

    #[test]
    fn wrap_paragraph_splits_overlong_words() {
        let rows = wrap_paragraph("abcdefghijkl xy", 5);
        assert_eq!(rows, vec!["abcde", "fghij", "kl xy"]);
    }

    #[test]
    fn blank_lines_keep_their_row() {
        let pages = layout_lines("first\n\nsecond");
        assert_eq!(pages, vec![vec!["first", "", "second"]]);
    }

    #[test]
    fn long_text_spills_onto_more_pages() {
        let text = (0..60).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let pages = layout_lines(&text);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].len(), 27);
        assert_eq!(pages[0][0], "line 0");
        assert_eq!(pages[2].last().map(String::as_str), Some("line 59"));
    }

    #[test]
    fn write_pdf_produces_pdf_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let txt = dir.path().join("answer.txt");
        let pdf = dir.path().join("answer.pdf");
        fs::write(&txt, "Hello there.\nSecond paragraph.").expect("write text");

        text_file_to_pdf(&txt, &pdf, None).expect("convert");
        let bytes = fs::read(&pdf).expect("read pdf");
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn unencodable_chars_lists_each_character_once() {
        assert_eq!(
            unencodable_chars("Zażółć gęślą jaźń, café — 日本日"),
            vec!['ż', 'ł', 'ć', 'ę', 'ś', 'ą', 'ź', 'ń', '日', '本']
        );
        assert!(unencodable_chars("naïve café — “quoted” €5\tok").is_empty());
    }

    #[test]
    fn builtin_font_rejects_text_it_would_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pdf = dir.path().join("answer.pdf");

        let error = write_pdf("Zażółć gęślą jaźń 🙂", &pdf, None).expect_err("should reject");
        let message = error.to_string();
        assert!(message.contains('ż'));
        assert!(message.contains("--font"));
        assert!(!pdf.exists());
    }

    #[test]
    fn builtin_font_accepts_latin1_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pdf = dir.path().join("answer.pdf");

        write_pdf("Crème brûlée — naïve café", &pdf, None).expect("latin-1 text");
        assert!(pdf.is_file());
    }

    #[test]
    fn missing_font_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pdf = dir.path().join("answer.pdf");

        assert!(write_pdf("Zażółć", &pdf, Some(&dir.path().join("missing.ttf"))).is_err());
    }

    #[test]
    fn external_font_embeds_unicode_text() {
        let font = Path::new("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf");
        if !font.is_file() {
            eprintln!("skipping: {} not installed", font.display());
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let pdf = dir.path().join("answer.pdf");

        write_pdf("Zażółć gęślą jaźń", &pdf, Some(font)).expect("embedded font");
        assert!(fs::read(&pdf).expect("read pdf").starts_with(b"%PDF"));
    }
}
