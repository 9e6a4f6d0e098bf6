use serde::{Deserialize, Serialize};

/// Error body returned by every endpoint: a stable numeric code and a
/// localized message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BaseMessage {
    pub code: i32,
    pub message: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContractIds {
    pub contract_ids: Vec<i64>,
}
