use crate::auth::{can_access_contract, Caller};
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;
use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use common::jobs::FileType;
use common::requests::ContractFileQuery;
use std::path::PathBuf;

/// `GET /api/contracts/{id}?format=pdf|docx`: the contract's generated
/// file as an attachment. Defaults to `docx`.
pub async fn process(
    req: HttpRequest,
    state: web::Data<AppState>,
    caller: Caller,
    contract_id: web::Path<i64>,
    query: web::Query<ContractFileQuery>,
) -> HttpResponse {
    let path = match contract_file(state, caller, contract_id.into_inner(), query.into_inner()).await {
        Ok(path) => path,
        Err(e) => return e.to_response(caller.locale),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match NamedFile::open_async(&path).await {
        Ok(file) => file
            .set_content_disposition(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(name)],
            })
            .into_response(&req),
        Err(e) => {
            log::warn!("Contract file {} unreadable: {}", path.display(), e);
            ServiceError::FileNotFound(name).to_response(caller.locale)
        }
    }
}

pub async fn contract_file(
    state: web::Data<AppState>,
    caller: Caller,
    contract_id: i64,
    query: ContractFileQuery,
) -> ServiceResult<PathBuf> {
    let file_type = match query.format.as_deref() {
        Some(raw) => raw
            .parse::<FileType>()
            .map_err(|_| ServiceError::InvalidFileType(raw.to_string()))?,
        None => FileType::Docx,
    };

    let contract = web::block(move || state.contracts.get_by_id(contract_id))
        .await??
        .ok_or(ServiceError::ContractNotFound(contract_id))?;
    if !can_access_contract(&caller, &contract) {
        return Err(ServiceError::AccessDenied);
    }

    let path = match file_type {
        FileType::Docx => contract.docx_path,
        FileType::Pdf => contract.pdf_path,
    };
    path.ok_or_else(|| {
        ServiceError::FileNotFound(format!("{} of contract {}", file_type, contract_id))
    })
}
