//! Turns a template plus field values into a contract `.docx` and, when the
//! converter cooperates, a sibling `.pdf`.

use crate::docx::Document;
use crate::engine::substitute_document;
use crate::error::{ServiceError, ServiceResult};
use crate::pdf::PdfConverter;
use crate::store::TemplateRegistry;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Length of a hyphenated uuid v4.
const UUID_LEN: usize = 36;

#[derive(Debug, Clone)]
pub struct MaterializedFiles {
    pub docx_path: PathBuf,
    pub pdf_path: Option<PathBuf>,
}

pub struct Materializer {
    templates: Arc<dyn TemplateRegistry>,
    converter: Arc<dyn PdfConverter>,
    output_dir: PathBuf,
}

impl Materializer {
    pub fn new(
        templates: Arc<dyn TemplateRegistry>,
        converter: Arc<dyn PdfConverter>,
        output_dir: impl Into<PathBuf>,
    ) -> Materializer {
        Materializer {
            templates,
            converter,
            output_dir: output_dir.into(),
        }
    }

    /// Writes a fresh, uniquely named copy of the template with `values`
    /// substituted. The template file itself is only ever read.
    pub fn materialize(
        &self,
        template_id: i64,
        values: &HashMap<String, String>,
    ) -> ServiceResult<MaterializedFiles> {
        let template = self
            .templates
            .get_by_id(template_id)?
            .ok_or(ServiceError::TemplateNotFound(template_id))?;

        let bytes = read_file(&template.file_path)?;
        let mut doc = Document::from_bytes(&bytes)?;
        let replaced = substitute_document(&mut doc, values);

        let docx_path = self.output_dir.join(contract_file_name(&template.file_path));
        write_atomically(&docx_path, &doc.to_bytes()?)?;
        log::debug!(
            "Materialized template {} into {} ({} paragraphs rewritten)",
            template_id,
            docx_path.display(),
            replaced
        );

        let pdf_path = match self.converter.convert(&docx_path, &self.output_dir) {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("PDF conversion of {} failed: {}", docx_path.display(), e);
                None
            }
        };

        Ok(MaterializedFiles {
            docx_path,
            pdf_path,
        })
    }
}

/// Reads a stored file, reporting a vanished one as `FileNotFound`.
pub(crate) fn read_file(path: &Path) -> ServiceResult<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ServiceError::FileNotFound(path.display().to_string()),
        _ => ServiceError::from(e),
    })
}

/// Writes through a temp file in the target directory, then renames it into
/// place, so readers never see a partial file.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// `<template stem without its uuid suffix>-<new uuid>.docx`
fn contract_file_name(template_path: &Path) -> String {
    let stem = template_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = strip_uuid_suffix(&stem).trim_end_matches('-');
    let base = if base.is_empty() { "contract" } else { base };
    format!("{}-{}.docx", base, Uuid::new_v4())
}

fn strip_uuid_suffix(stem: &str) -> &str {
    if stem.len() < UUID_LEN || !stem.is_char_boundary(stem.len() - UUID_LEN) {
        return stem;
    }
    let (head, tail) = stem.split_at(stem.len() - UUID_LEN);
    match Uuid::parse_str(tail) {
        Ok(_) => head,
        Err(_) => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures::{docx, paragraph, table};
    use crate::pdf::fakes::FakeConverter;
    use crate::store::SqliteStore;
    use std::sync::atomic::Ordering;

    struct Setup {
        dir: tempfile::TempDir,
        store: Arc<SqliteStore>,
        template_path: PathBuf,
        template_id: i64,
    }

    fn setup() -> Setup {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("contracts")).unwrap();
        let store = Arc::new(SqliteStore::open(dir.path().join("db.sqlite")).unwrap());
        let template_path = dir
            .path()
            .join("lease-0b7a6a36-6d55-4a0c-9f55-2f4f7c7a1e11.docx");
        let body = format!(
            "{}{}",
            paragraph("Dear ##NAME##, your balance is ##AMOUNT##."),
            table(&[&["Signed: ##NAME##"]])
        );
        fs::write(&template_path, docx(&body)).unwrap();
        let template_id = TemplateRegistry::save(&*store, "Lease", &template_path, "abc", &[]).unwrap();
        Setup {
            dir,
            store,
            template_path,
            template_id,
        }
    }

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn produces_a_fresh_substituted_copy_and_a_pdf() {
        let s = setup();
        let converter = Arc::new(FakeConverter::default());
        let materializer =
            Materializer::new(s.store.clone(), converter.clone(), s.dir.path().join("contracts"));
        let original = fs::read(&s.template_path).unwrap();

        let files = materializer
            .materialize(s.template_id, &values(&[("NAME", "Alice"), ("AMOUNT", "$10")]))
            .unwrap();

        let name = files.docx_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("lease-"));
        assert!(!name.contains("0b7a6a36"));
        let doc = Document::from_bytes(&fs::read(&files.docx_path).unwrap()).unwrap();
        assert_eq!(
            doc.paragraph_texts(),
            vec!["Dear Alice, your balance is $10.", "Signed: Alice"]
        );
        assert_eq!(fs::read(&s.template_path).unwrap(), original);
        assert_eq!(files.pdf_path, Some(files.docx_path.with_extension("pdf")));
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn every_call_writes_a_new_file() {
        let s = setup();
        let materializer = Materializer::new(
            s.store.clone(),
            Arc::new(FakeConverter::default()),
            s.dir.path().join("contracts"),
        );
        let first = materializer.materialize(s.template_id, &HashMap::new()).unwrap();
        let second = materializer.materialize(s.template_id, &HashMap::new()).unwrap();
        assert_ne!(first.docx_path, second.docx_path);
    }

    #[test]
    fn conversion_failure_leaves_only_the_docx() {
        let s = setup();
        let materializer = Materializer::new(
            s.store.clone(),
            Arc::new(FakeConverter::failing()),
            s.dir.path().join("contracts"),
        );
        let files = materializer
            .materialize(s.template_id, &values(&[("NAME", "Bob")]))
            .unwrap();
        assert!(files.docx_path.is_file());
        assert_eq!(files.pdf_path, None);
    }

    #[test]
    fn unknown_template_and_vanished_file_are_reported() {
        let s = setup();
        let materializer = Materializer::new(
            s.store.clone(),
            Arc::new(FakeConverter::default()),
            s.dir.path().join("contracts"),
        );
        assert!(matches!(
            materializer.materialize(999, &HashMap::new()),
            Err(ServiceError::TemplateNotFound(999))
        ));

        fs::remove_file(&s.template_path).unwrap();
        assert!(matches!(
            materializer.materialize(s.template_id, &HashMap::new()),
            Err(ServiceError::FileNotFound(_))
        ));
    }

    #[test]
    fn uuid_suffix_is_only_stripped_when_it_is_a_uuid() {
        assert_eq!(
            strip_uuid_suffix("lease-0b7a6a36-6d55-4a0c-9f55-2f4f7c7a1e11"),
            "lease-"
        );
        assert_eq!(strip_uuid_suffix("lease"), "lease");
        assert_eq!(
            strip_uuid_suffix("a-much-longer-template-name-without-id"),
            "a-much-longer-template-name-without-id"
        );
        assert_eq!(strip_uuid_suffix("договор аренды помещения №1"), "договор аренды помещения №1");
        assert!(contract_file_name(Path::new("0b7a6a36-6d55-4a0c-9f55-2f4f7c7a1e11.docx"))
            .starts_with("contract-"));
    }
}
