use serde::Deserialize;

/// The slice of an account-service record this service reads.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Account {
    pub id: i32,
    pub account_id: String,
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}
