//! # PDF conversion
//!
//! Contracts are converted to PDF next to their `.docx`. Two backends exist:
//!
//! - `soffice`: LibreOffice in headless mode, run as a subprocess with a
//!   timeout. Layout matches what Word users see.
//! - `builtin`: renders paragraph text in-process with genpdf. No external
//!   program is needed, but tables, images and page layout are flattened.
//!
//! Conversion is best-effort for the callers: a failure is reported as a
//! `ConversionError` and the contract simply has no PDF.

mod builtin;
mod soffice;

pub use builtin::BuiltinConverter;
pub use soffice::SofficeConverter;

use crate::config::{Config, PdfBackend};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("conversion timed out after {0:?}")]
    Timeout(Duration),

    #[error("converter exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("converter reported success but {0} was not written")]
    MissingOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("render error: {0}")]
    Render(String),
}

pub trait PdfConverter: Send + Sync {
    /// Converts `input` into `<out_dir>/<input stem>.pdf` and returns that path.
    fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, ConversionError>;
}

/// Path the converters write for `input`.
pub(crate) fn pdf_path_for(input: &Path, out_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "contract".into());
    out_dir.join(stem).with_extension("pdf")
}

pub fn from_config(config: &Config) -> Arc<dyn PdfConverter> {
    match config.pdf_backend {
        PdfBackend::Soffice => Arc::new(SofficeConverter::new(
            config.soffice_path.clone(),
            config.conversion_timeout,
        )),
        PdfBackend::Builtin => Arc::new(BuiltinConverter::new(config.fonts_dir.clone())),
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes a stub PDF, or fails every call when `failing`.
    #[derive(Default)]
    pub struct FakeConverter {
        pub failing: bool,
        pub calls: AtomicUsize,
    }

    impl FakeConverter {
        pub fn failing() -> FakeConverter {
            FakeConverter {
                failing: true,
                ..Default::default()
            }
        }
    }

    impl PdfConverter for FakeConverter {
        fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, ConversionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing {
                return Err(ConversionError::Failed {
                    status: "exit status: 1".into(),
                    stderr: "conversion disabled".into(),
                });
            }
            let output = pdf_path_for(input, out_dir);
            std::fs::write(&output, b"%PDF-1.4 stub")?;
            Ok(output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_sits_next_to_input_stem() {
        assert_eq!(
            pdf_path_for(Path::new("/in/lease-1234.docx"), Path::new("/out")),
            PathBuf::from("/out/lease-1234.pdf")
        );
    }
}
