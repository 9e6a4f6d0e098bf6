use super::{pdf_path_for, ConversionError, PdfConverter};
use crate::docx::paragraph::RunText;
use crate::docx::Document;
use genpdf::elements::{Break, Paragraph};
use genpdf::style::{Style, StyledString};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Font families tried in order inside the fonts directory.
const FONT_FAMILIES: [&str; 2] = ["Arial", "LiberationSans"];

/// In-process renderer: one PDF paragraph per body paragraph, keeping bold
/// and italic runs. Tables are rendered where they stand, cell by cell, as
/// plain paragraphs.
pub struct BuiltinConverter {
    fonts_dir: PathBuf,
}

impl BuiltinConverter {
    pub fn new(fonts_dir: impl Into<PathBuf>) -> BuiltinConverter {
        BuiltinConverter {
            fonts_dir: fonts_dir.into(),
        }
    }
}

/// Fragments with detected styling.
enum TextStyle {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

struct TextSegment {
    text: String,
    style: TextStyle,
}

impl From<RunText> for TextSegment {
    fn from(run: RunText) -> Self {
        let style = match (run.bold, run.italic) {
            (true, true) => TextStyle::BoldItalic,
            (true, false) => TextStyle::Bold,
            (false, true) => TextStyle::Italic,
            (false, false) => TextStyle::Regular,
        };
        TextSegment {
            text: run.text,
            style,
        }
    }
}

fn push_segments_into_paragraph(p: &mut Paragraph, segments: Vec<TextSegment>) {
    for seg in segments {
        let style = match seg.style {
            TextStyle::Regular => Style::new(),
            TextStyle::Bold => Style::new().bold(),
            TextStyle::Italic => Style::new().italic(),
            TextStyle::BoldItalic => Style::new().bold().italic(),
        };
        p.push(StyledString::new(seg.text, style));
    }
}

fn load_font(
    fonts_dir: &Path,
) -> Result<genpdf::fonts::FontFamily<genpdf::fonts::FontData>, ConversionError> {
    let mut last_error = None;
    for family in FONT_FAMILIES {
        match genpdf::fonts::from_files(fonts_dir, family, None) {
            Ok(fonts) => return Ok(fonts),
            Err(e) => last_error = Some(e),
        }
    }
    Err(ConversionError::Render(format!(
        "no usable font family in {}: {}",
        fonts_dir.display(),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

fn configure_document(fonts_dir: &Path, title: &str) -> Result<genpdf::Document, ConversionError> {
    let mut doc = genpdf::Document::new(load_font(fonts_dir)?);
    doc.set_title(title);
    doc.set_font_size(11);
    doc.set_line_spacing(1.15);

    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(20);
    doc.set_page_decorator(decorator);
    Ok(doc)
}

impl PdfConverter for BuiltinConverter {
    fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, ConversionError> {
        let bytes = fs::read(input)?;
        let source = Document::from_bytes(&bytes).map_err(|e| ConversionError::Render(e.to_string()))?;

        let title = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut doc = configure_document(&self.fonts_dir, &title)?;

        for runs in source.body_runs() {
            if runs.is_empty() {
                doc.push(Break::new(1));
                continue;
            }
            let mut p = Paragraph::new("");
            push_segments_into_paragraph(&mut p, runs.into_iter().map(TextSegment::from).collect());
            doc.push(p);
        }

        let output = pdf_path_for(input, out_dir);
        let mut tmp = NamedTempFile::new_in(out_dir)?;
        doc.render(tmp.as_file_mut())
            .map_err(|e| ConversionError::Render(e.to_string()))?;
        tmp.persist(&output).map_err(|e| e.error)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures::docx;

    #[test]
    fn run_styles_map_to_segment_styles() {
        let seg = TextSegment::from(RunText {
            text: "x".into(),
            bold: true,
            italic: true,
        });
        assert!(matches!(seg.style, TextStyle::BoldItalic));
        let seg = TextSegment::from(RunText {
            text: "x".into(),
            bold: false,
            italic: true,
        });
        assert!(matches!(seg.style, TextStyle::Italic));
    }

    #[test]
    fn missing_fonts_fail_without_writing_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("c.docx");
        fs::write(&input, docx("<w:p><w:r><w:t>Hello</w:t></w:r></w:p>")).unwrap();
        let converter = BuiltinConverter::new(dir.path().join("no-fonts"));

        assert!(matches!(
            converter.convert(&input, dir.path()),
            Err(ConversionError::Render(_))
        ));
        assert!(!dir.path().join("c.pdf").exists());
    }

    #[test]
    fn non_docx_input_is_a_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("c.docx");
        fs::write(&input, b"not a zip").unwrap();
        let converter = BuiltinConverter::new(dir.path());
        assert!(matches!(
            converter.convert(&input, dir.path()),
            Err(ConversionError::Render(_))
        ));
    }
}
