use crate::error::{ServiceError, ServiceResult};
use actix_multipart::Multipart;
use futures_util::StreamExt;
use md5::Context;

/// Longest accepted `name` part, in bytes.
const MAX_NAME_BYTES: usize = 1024;

/// A `.docx` received as `multipart/form-data`: an optional `name` part and
/// a required `file` part.
#[derive(Debug)]
pub struct TemplateUpload {
    pub name: Option<String>,
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// md5 of `bytes`, lowercase hex.
    pub checksum: String,
}

impl TemplateUpload {
    /// The `name` part, or else the uploaded file's stem.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self
                .file_name
                .rsplit_once('.')
                .map(|(stem, _)| stem)
                .unwrap_or(&self.file_name)
                .to_string(),
        }
    }
}

fn multipart_error(e: actix_multipart::MultipartError) -> ServiceError {
    ServiceError::Validation(e.to_string())
}

/// Reads the whole upload, hashing the file bytes as they arrive. Exactly
/// one `file` part is accepted.
pub async fn read_template_upload(mut payload: Multipart, limit: usize) -> ServiceResult<TemplateUpload> {
    let mut name: Option<String> = None;
    let mut file: Option<(String, Vec<u8>, String)> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(multipart_error)?;
        let part = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));

        match part.as_deref() {
            Some("file") => {
                if file.is_some() {
                    return Err(ServiceError::Validation("only one file may be uploaded".into()));
                }
                let file_name = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
                    .unwrap_or_default();
                if !file_name.to_lowercase().ends_with(".docx") {
                    return Err(ServiceError::InvalidFileType(file_name));
                }

                let mut md5_hasher = Context::new();
                let mut bytes = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk = chunk.map_err(multipart_error)?;
                    if bytes.len() + chunk.len() > limit {
                        return Err(ServiceError::Validation(format!(
                            "file is larger than {} bytes",
                            limit
                        )));
                    }
                    md5_hasher.consume(&chunk);
                    bytes.extend_from_slice(&chunk);
                }
                file = Some((file_name, bytes, format!("{:x}", md5_hasher.finalize())));
            }

            Some("name") => {
                let mut bytes = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk = chunk.map_err(multipart_error)?;
                    if bytes.len() + chunk.len() > MAX_NAME_BYTES {
                        return Err(ServiceError::Validation(format!(
                            "name is longer than {} bytes",
                            MAX_NAME_BYTES
                        )));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                let text = String::from_utf8(bytes)
                    .map_err(|_| ServiceError::Validation("name is not valid UTF-8".into()))?;
                name = Some(text);
            }

            _ => {}
        }
    }

    let (file_name, bytes, checksum) =
        file.ok_or_else(|| ServiceError::Validation("missing file".into()))?;
    Ok(TemplateUpload {
        name,
        file_name,
        bytes,
        checksum,
    })
}
