use crate::model::field::Field;
use serde::{Deserialize, Serialize};

/// A template as returned by the API: its identity and discovered field schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    pub name: String,
    pub fields: Vec<Field>,
}
