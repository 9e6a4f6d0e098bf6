use crate::error::{ServiceError, ServiceResult};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Writes `members` into a flat zip at `archive_path`, each under its file
/// name. The archive is assembled in a temp file next to `archive_path` and
/// renamed into place, so a failed build leaves nothing behind.
pub fn write_archive(archive_path: &Path, members: &[PathBuf]) -> ServiceResult<()> {
    let dir = archive_path
        .parent()
        .ok_or_else(|| ServiceError::Internal(format!("bad archive path {}", archive_path.display())))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut zip = ZipWriter::new(BufWriter::new(tmp.as_file_mut()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut names = HashSet::new();

        for member in members {
            let name = member
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| ServiceError::FileNotFound(member.display().to_string()))?;
            if !names.insert(name.clone()) {
                return Err(ServiceError::Internal(format!("duplicate archive member {}", name)));
            }
            let mut file = File::open(member).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ServiceError::FileNotFound(member.display().to_string()),
                _ => ServiceError::from(e),
            })?;
            zip.start_file(name, options)?;
            io::copy(&mut file, &mut zip)?;
        }

        zip.finish()?.flush()?;
    }
    tmp.persist(archive_path).map_err(|e| ServiceError::from(e.error))?;
    Ok(())
}
