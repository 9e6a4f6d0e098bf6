use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Director,
    Admin,
    Operator,
    #[default]
    Default,
}

/// Accepts both `ADMIN` and `ROLE_ADMIN` spellings.
impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.strip_prefix("ROLE_").unwrap_or(&upper) {
            "DIRECTOR" => Ok(Role::Director),
            "ADMIN" => Ok(Role::Admin),
            "OPERATOR" => Ok(Role::Operator),
            "DEFAULT" => Ok(Role::Default),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}
