//! Error taxonomy shared by the engine, the stores and the HTTP layer.
//!
//! Every variant maps to a stable numeric code and a localized message. The
//! HTTP layer turns an error into a `BaseMessage` body; the archive pipeline
//! instead stores the error text on the failed job.

use crate::docx::DocxError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use common::responses::BaseMessage;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Template not found: {0}")]
    TemplateNotFound(i64),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Field already exists: {0}")]
    FieldExists(String),

    #[error("Field {field} does not belong to template {template_id}")]
    FieldNotBelongToTemplate { field: String, template_id: i64 },

    #[error("Contract not found: {0}")]
    ContractNotFound(i64),

    #[error("Job not found")]
    JobNotFound,

    #[error("Job queue is full")]
    JobQueueFull,

    #[error("Invalid file type: {0}")]
    InvalidFileType(String),

    #[error("Access denied")]
    AccessDenied,

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        ServiceError::Database(err.to_string())
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Io(err.to_string())
    }
}

impl From<zip::result::ZipError> for ServiceError {
    fn from(err: zip::result::ZipError) -> Self {
        ServiceError::Io(format!("zip: {}", err))
    }
}

impl From<DocxError> for ServiceError {
    fn from(err: DocxError) -> Self {
        match err {
            DocxError::Io(e) => ServiceError::Io(e.to_string()),
            other => ServiceError::InvalidDocument(other.to_string()),
        }
    }
}

impl From<actix_web::error::BlockingError> for ServiceError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

/// Languages the error catalogue is translated into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    Uz,
    En,
    Ru,
}

impl Locale {
    /// Picks the first supported language of an `Accept-Language` header.
    pub fn from_accept_language(header: &str) -> Locale {
        header
            .split(',')
            .filter_map(|part| part.split(';').next())
            .map(|tag| tag.trim().to_ascii_lowercase())
            .find_map(|tag| match tag.split('-').next().unwrap_or_default() {
                "uz" => Some(Locale::Uz),
                "en" => Some(Locale::En),
                "ru" => Some(Locale::Ru),
                _ => None,
            })
            .unwrap_or_default()
    }
}

impl ServiceError {
    pub fn code(&self) -> i32 {
        match self {
            ServiceError::FieldNotFound(_) => 102,
            ServiceError::FieldExists(_) => 103,
            ServiceError::TemplateNotFound(_) => 104,
            ServiceError::FieldNotBelongToTemplate { .. } => 105,
            ServiceError::ContractNotFound(_) => 106,
            ServiceError::AccessDenied => 107,
            ServiceError::InvalidFileType(_) => 108,
            ServiceError::JobNotFound => 110,
            ServiceError::JobQueueFull => 111,
            ServiceError::FileNotFound(_) => 300,
            ServiceError::InvalidDocument(_) | ServiceError::Validation(_) => 400,
            ServiceError::Unauthorized => 401,
            ServiceError::Database(_) | ServiceError::Io(_) | ServiceError::Internal(_) => 500,
        }
    }

    fn title(&self, locale: Locale) -> &'static str {
        use Locale::*;
        match (self, locale) {
            (ServiceError::TemplateNotFound(_), Uz) => "Shablon topilmadi",
            (ServiceError::TemplateNotFound(_), En) => "Template not found",
            (ServiceError::TemplateNotFound(_), Ru) => "Шаблон не найден",
            (ServiceError::FieldNotFound(_), Uz) => "Maydon topilmadi",
            (ServiceError::FieldNotFound(_), En) => "Field not found",
            (ServiceError::FieldNotFound(_), Ru) => "Поле не найдено",
            (ServiceError::FieldExists(_), Uz) => "Bunday maydon allaqachon mavjud",
            (ServiceError::FieldExists(_), En) => "Field already exists",
            (ServiceError::FieldExists(_), Ru) => "Поле уже существует",
            (ServiceError::FieldNotBelongToTemplate { .. }, Uz) => "Maydon shablonga tegishli emas",
            (ServiceError::FieldNotBelongToTemplate { .. }, En) => "Field does not belong to the template",
            (ServiceError::FieldNotBelongToTemplate { .. }, Ru) => "Поле не принадлежит шаблону",
            (ServiceError::ContractNotFound(_), Uz) => "Shartnoma topilmadi",
            (ServiceError::ContractNotFound(_), En) => "Contract not found",
            (ServiceError::ContractNotFound(_), Ru) => "Договор не найден",
            (ServiceError::JobNotFound, Uz) => "Vazifa topilmadi",
            (ServiceError::JobNotFound, En) => "Job not found",
            (ServiceError::JobNotFound, Ru) => "Задача не найдена",
            (ServiceError::JobQueueFull, Uz) => "Navbat to'lgan, keyinroq urinib ko'ring",
            (ServiceError::JobQueueFull, En) => "Job queue is full, try again later",
            (ServiceError::JobQueueFull, Ru) => "Очередь задач заполнена, повторите позже",
            (ServiceError::InvalidFileType(_), Uz) => "Fayl turi noto'g'ri",
            (ServiceError::InvalidFileType(_), En) => "Invalid file type",
            (ServiceError::InvalidFileType(_), Ru) => "Неверный тип файла",
            (ServiceError::AccessDenied, Uz) => "Ruxsat yo'q",
            (ServiceError::AccessDenied, En) => "Access denied",
            (ServiceError::AccessDenied, Ru) => "Доступ запрещён",
            (ServiceError::FileNotFound(_), Uz) => "Fayl topilmadi",
            (ServiceError::FileNotFound(_), En) => "File not found",
            (ServiceError::FileNotFound(_), Ru) => "Файл не найден",
            (ServiceError::InvalidDocument(_), Uz) => "Hujjat formati noto'g'ri",
            (ServiceError::InvalidDocument(_), En) => "Invalid document",
            (ServiceError::InvalidDocument(_), Ru) => "Некорректный документ",
            (ServiceError::Unauthorized, Uz) => "Avtorizatsiya talab qilinadi",
            (ServiceError::Unauthorized, En) => "Authentication required",
            (ServiceError::Unauthorized, Ru) => "Требуется авторизация",
            (ServiceError::Validation(_), Uz) => "Noto'g'ri so'rov",
            (ServiceError::Validation(_), En) => "Invalid request",
            (ServiceError::Validation(_), Ru) => "Некорректный запрос",
            (_, Uz) => "Ichki xatolik",
            (_, En) => "Internal error",
            (_, Ru) => "Внутренняя ошибка",
        }
    }

    /// Localized text for the caller. Client-side errors carry their detail;
    /// infrastructure errors do not leak it.
    pub fn message(&self, locale: Locale) -> String {
        let title = self.title(locale);
        match self {
            ServiceError::FieldNotFound(detail)
            | ServiceError::FieldExists(detail)
            | ServiceError::InvalidFileType(detail)
            | ServiceError::InvalidDocument(detail)
            | ServiceError::Validation(detail) => format!("{}: {}", title, detail),
            ServiceError::TemplateNotFound(id) | ServiceError::ContractNotFound(id) => {
                format!("{}: {}", title, id)
            }
            _ => title.to_string(),
        }
    }

    pub fn to_response(&self, locale: Locale) -> HttpResponse {
        if self.status_code().is_server_error() {
            log::error!("{}", self);
        }
        HttpResponse::build(self.status_code()).json(BaseMessage {
            code: self.code(),
            message: self.message(locale),
        })
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::TemplateNotFound(_)
            | ServiceError::FieldNotFound(_)
            | ServiceError::ContractNotFound(_)
            | ServiceError::JobNotFound
            | ServiceError::FileNotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::AccessDenied => StatusCode::FORBIDDEN,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::FieldExists(_) => StatusCode::CONFLICT,
            ServiceError::JobQueueFull => StatusCode::SERVICE_UNAVAILABLE,

            ServiceError::FieldNotBelongToTemplate { .. }
            | ServiceError::InvalidFileType(_)
            | ServiceError::InvalidDocument(_)
            | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,

            ServiceError::Database(_) | ServiceError::Io(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        self.to_response(Locale::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_language_picks_first_supported_tag() {
        assert_eq!(Locale::from_accept_language("de-DE, ru;q=0.8, en;q=0.5"), Locale::Ru);
        assert_eq!(Locale::from_accept_language("en-US"), Locale::En);
        assert_eq!(Locale::from_accept_language("fr"), Locale::Uz);
        assert_eq!(Locale::from_accept_language(""), Locale::Uz);
    }

    #[test]
    fn codes_follow_the_published_catalogue() {
        assert_eq!(ServiceError::TemplateNotFound(1).code(), 104);
        assert_eq!(ServiceError::InvalidFileType("txt".into()).code(), 108);
        assert_eq!(ServiceError::JobNotFound.code(), 110);
        assert_eq!(ServiceError::JobQueueFull.code(), 111);
        assert_eq!(ServiceError::JobQueueFull.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ServiceError::FileNotFound("x".into()).code(), 300);
    }

    #[test]
    fn infrastructure_details_stay_out_of_messages() {
        let err = ServiceError::Database("disk I/O error at /var/db".into());
        assert_eq!(err.message(Locale::En), "Internal error");
        let err = ServiceError::InvalidFileType("txt".into());
        assert_eq!(err.message(Locale::En), "Invalid file type: txt");
    }
}
