use serde::Deserialize;
use std::collections::HashMap;

/// One contract to generate from a template.
#[derive(Deserialize, Clone, Debug)]
pub struct CreateContractRequest {
    pub template_id: i64,
    #[serde(default)]
    pub client_passport: Option<String>,
    /// Field name to value. Names that are not part of the template are ignored.
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

/// Asks for an archive of the given contracts, rendered as `file_type`
/// (`pdf` or `docx`, any case).
#[derive(Deserialize, Clone, Debug)]
pub struct DownloadContractsRequest {
    pub contract_ids: Vec<i64>,
    pub file_type: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CreateFieldRequest {
    pub name: String,
    #[serde(default = "default_field_type")]
    pub field_type: String,
}

/// Replaces a field of one template with a new field.
#[derive(Deserialize, Clone, Debug)]
pub struct UpdateFieldRequest {
    pub template_id: i64,
    pub name: Option<String>,
    pub field_type: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct ContractFileQuery {
    pub format: Option<String>,
}

fn default_field_type() -> String {
    "STRING".to_string()
}
