//! Configuration read from the environment (and `.env`, loaded in `main`).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {name} '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// How contracts are turned into PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PdfBackend {
    #[default]
    Soffice,
    Builtin,
}

impl FromStr for PdfBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "soffice" | "libreoffice" => Ok(PdfBackend::Soffice),
            "builtin" | "genpdf" => Ok(PdfBackend::Builtin),
            _ => Err("must be one of: soffice, builtin".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    /// Holds the `templates/`, `contracts/` and `zips/` directories.
    pub files_root: PathBuf,
    pub pdf_backend: PdfBackend,
    pub soffice_path: PathBuf,
    pub conversion_timeout: Duration,
    /// Font families for the builtin PDF backend.
    pub fonts_dir: PathBuf,
    pub max_concurrent_jobs: usize,
    pub job_queue_capacity: usize,
    pub upload_limit_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_path() -> PathBuf {
    PathBuf::from("contracts.sqlite")
}

fn default_files_root() -> PathBuf {
    PathBuf::from("./files")
}

fn default_soffice_path() -> PathBuf {
    PathBuf::from("soffice")
}

fn default_conversion_timeout_secs() -> u64 {
    120
}

fn default_fonts_dir() -> PathBuf {
    PathBuf::from("./fonts")
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_job_queue_capacity() -> usize {
    100
}

fn default_upload_limit_bytes() -> usize {
    10 * 1024 * 1024
}

/// Parses `name`, keeping the default when the value is absent or unusable.
fn parsed_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    match lookup(name) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Ignoring invalid {}='{}', using the default", name, raw);
                default
            }
        },
        None => default,
    }
}

/// Like `parsed_or` for counts that must be at least one.
fn positive_or(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: usize) -> usize {
    match parsed_or(lookup, name, default) {
        0 => {
            log::warn!("{} must be at least 1, using {}", name, default);
            default
        }
        n => n,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = |name: &str, default: PathBuf| lookup(name).map(PathBuf::from).unwrap_or(default);

        let pdf_backend = match lookup("PDF_BACKEND") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                name: "PDF_BACKEND",
                value: raw.clone(),
                reason,
            })?,
            None => PdfBackend::default(),
        };

        Ok(Config {
            host: lookup("SERVER_HOST").unwrap_or_else(default_host),
            port: parsed_or(&lookup, "SERVER_PORT", default_port()),
            database_path: path("DATABASE_PATH", default_database_path()),
            files_root: path("FILES_ROOT", default_files_root()),
            pdf_backend,
            soffice_path: path("SOFFICE_PATH", default_soffice_path()),
            conversion_timeout: Duration::from_secs(parsed_or(
                &lookup,
                "CONVERSION_TIMEOUT_SECS",
                default_conversion_timeout_secs(),
            )),
            fonts_dir: path("FONTS_DIR", default_fonts_dir()),
            max_concurrent_jobs: positive_or(&lookup, "MAX_CONCURRENT_JOBS", default_max_concurrent_jobs()),
            job_queue_capacity: positive_or(&lookup, "JOB_QUEUE_CAPACITY", default_job_queue_capacity()),
            upload_limit_bytes: positive_or(&lookup, "UPLOAD_LIMIT_BYTES", default_upload_limit_bytes()),
        })
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.files_root.join("templates")
    }

    pub fn contracts_dir(&self) -> PathBuf {
        self.files_root.join("contracts")
    }

    pub fn zips_dir(&self) -> PathBuf {
        self.files_root.join("zips")
    }

    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [self.templates_dir(), self.contracts_dir(), self.zips_dir()] {
            std::fs::create_dir_all(&dir)?;
        }
        if let Some(parent) = self.database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_address(), ("127.0.0.1", 8080));
        assert_eq!(config.database_path, PathBuf::from("contracts.sqlite"));
        assert_eq!(config.pdf_backend, PdfBackend::Soffice);
        assert_eq!(config.conversion_timeout, Duration::from_secs(120));
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.zips_dir(), PathBuf::from("./files/zips"));
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = config(&[
            ("SERVER_PORT", "eighty"),
            ("MAX_CONCURRENT_JOBS", "0"),
            ("CONVERSION_TIMEOUT_SECS", "30"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.conversion_timeout, Duration::from_secs(30));
    }

    #[test]
    fn unknown_pdf_backend_is_an_error() {
        assert!(matches!(
            config(&[("PDF_BACKEND", "wkhtmltopdf")]),
            Err(ConfigError::Invalid { name: "PDF_BACKEND", .. })
        ));
        assert_eq!(
            config(&[("PDF_BACKEND", "Builtin")]).unwrap().pdf_backend,
            PdfBackend::Builtin
        );
    }

    #[test]
    fn directories_are_created_under_the_files_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("files");
        let config = config(&[
            ("FILES_ROOT", root.to_str().unwrap()),
            ("DATABASE_PATH", dir.path().join("db/contracts.sqlite").to_str().unwrap()),
        ])
        .unwrap();
        config.ensure_directories().unwrap();
        assert!(config.templates_dir().is_dir());
        assert!(config.contracts_dir().is_dir());
        assert!(config.zips_dir().is_dir());
        assert!(dir.path().join("db").is_dir());
    }
}
