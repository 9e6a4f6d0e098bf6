use super::{pdf_path_for, ConversionError, PdfConverter};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs `<soffice> --headless --convert-to pdf --outdir <dir> <input>`.
///
/// Each run gets a throwaway LibreOffice profile so concurrent conversions
/// do not fight over the user installation lock.
pub struct SofficeConverter {
    program: PathBuf,
    timeout: Duration,
}

impl SofficeConverter {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> SofficeConverter {
        SofficeConverter {
            program: program.into(),
            timeout,
        }
    }
}

impl PdfConverter for SofficeConverter {
    fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, ConversionError> {
        let profile = tempfile::tempdir()?;
        let stderr = NamedTempFile::new()?;

        let mut child = Command::new(&self.program)
            .arg(format!(
                "-env:UserInstallation=file://{}",
                profile.path().display()
            ))
            .args(["--headless", "--convert-to", "pdf", "--outdir"])
            .arg(out_dir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr.reopen()?))
            .spawn()
            .map_err(|source| ConversionError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ConversionError::Timeout(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            let message = fs::read_to_string(stderr.path()).unwrap_or_default();
            return Err(ConversionError::Failed {
                status: status.to_string(),
                stderr: message.trim().to_string(),
            });
        }

        let output = pdf_path_for(input, out_dir);
        if output.is_file() {
            Ok(output)
        } else {
            Err(ConversionError::MissingOutput(output))
        }
    }
}
