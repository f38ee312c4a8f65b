use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Card {
    pub id: i32,
    pub fk_account_id: i32,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>, // resolved from the account service, never stored
    pub card_number: String,
    #[serde(rename = "type")]
    pub card_type: String,
    pub holder: String,
    #[serde(rename = "model")]
    pub card_model: String,
    pub status: String, // e.g. "ACTIVE"
    pub atc: i32,
    pub expired_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub tenant_id: String,
}

/// Fields a caller may supply when issuing a card.
///
/// `atc`, `created_at` and `expired_at` are deliberately absent: they are
/// always set by the repository on insert.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCard {
    pub account_id: String,
    pub card_number: String,
    #[serde(rename = "type", default)]
    pub card_type: String,
    #[serde(default)]
    pub holder: String,
    #[serde(rename = "model", default)]
    pub card_model: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tenant_id: String,
}

/// A persisted token row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct CardToken {
    pub id: i32,
    pub fk_id_card: i32,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
    pub token: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub tenant_id: String,
}

#[derive(Debug, Clone)]
pub struct NewCardToken {
    pub fk_id_card: i32,
    pub token: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
    pub tenant_id: String,
}

/// A token row joined back to its card, as returned by a token lookup.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct CardTokenView {
    pub id: i32,
    pub card_number: String,
    #[serde(rename = "model")]
    pub card_model: String,
    pub token: String,
    pub status: String,
    pub expired_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub tenant_id: String,
}

/// Masks a card number for logging, keeping only the last four digits.
pub fn mask_card_number(card_number: &str) -> String {
    let chars: Vec<char> = card_number.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_card_number() {
        assert_eq!(mask_card_number("4111111111111111"), "************1111");
        assert_eq!(mask_card_number("123"), "***");
        assert_eq!(mask_card_number(""), "");
    }

    #[test]
    fn test_new_card_ignores_server_side_fields() {
        let payload = r#"{
            "account_id": "acc-42",
            "card_number": "4111111111111111",
            "holder": "J DOE",
            "type": "CREDIT",
            "model": "CHIP",
            "atc": 99,
            "created_at": "2001-01-01T00:00:00Z"
        }"#;
        let card: NewCard = serde_json::from_str(payload).unwrap();
        assert_eq!(card.account_id, "acc-42");
        assert_eq!(card.card_type, "CREDIT");
        assert_eq!(card.card_model, "CHIP");
        assert_eq!(card.status, "");
    }

    #[test]
    fn test_card_serializes_wire_names() {
        let now = Utc::now();
        let card = Card {
            id: 1,
            fk_account_id: 7,
            account_id: None,
            card_number: "4111111111111111".to_string(),
            card_type: "CREDIT".to_string(),
            holder: "J DOE".to_string(),
            card_model: "CHIP".to_string(),
            status: "ACTIVE".to_string(),
            atc: 0,
            expired_at: now,
            created_at: now,
            updated_at: None,
            tenant_id: "t1".to_string(),
        };

        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["type"], "CREDIT");
        assert_eq!(json["model"], "CHIP");
        assert_eq!(json["fk_account_id"], 7);
        assert!(json.get("account_id").is_none());
    }
}
