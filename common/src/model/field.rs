use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Descriptive type of a field. The substitution engine ignores it and always
/// works on text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    #[default]
    String,
    Date,
    Number,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "STRING",
            FieldType::Date => "DATE",
            FieldType::Number => "NUMBER",
        }
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STRING" => Ok(FieldType::String),
            "DATE" => Ok(FieldType::Date),
            "NUMBER" => Ok(FieldType::Number),
            other => Err(format!("unknown field type: {}", other)),
        }
    }
}

/// A named placeholder slot, shared by every template that mentions it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub id: i64,
    pub name: String,
    pub field_type: FieldType,
}
