use serde::{Deserialize, Serialize};

/// Listing view of a generated contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contract {
    pub contract_id: i64,
    pub template_id: i64,
    pub template_name: String,
    pub client_passport: Option<String>,
    /// `false` until the contract has been materialized at least once.
    pub has_docx: bool,
    pub has_pdf: bool,
    pub created_by: i64,
}
