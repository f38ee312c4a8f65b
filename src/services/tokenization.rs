use chrono::{DateTime, Months, Utc};

/// Status given to every freshly issued token.
pub const TOKEN_STATUS_ACTIVE: &str = "ACTIVE";

/// How long an issued token stays valid.
pub const TOKEN_VALIDITY: Months = Months::new(3);

/// Derives the token for a card number: the lowercase hex BLAKE3 digest of
/// the raw card-number bytes. No salt, so the same number always maps to the
/// same token.
pub fn derive_token(card_number: &str) -> String {
    hex::encode(blake3::hash(card_number.as_bytes()).as_bytes())
}

pub fn token_expiry(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + TOKEN_VALIDITY
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_token_is_deterministic() {
        let first = derive_token("4111111111111111");
        let second = derive_token("4111111111111111");
        assert_eq!(first, second);
    }

    #[test]
    fn test_token_shape() {
        let token = derive_token("4111111111111111");
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_distinct_numbers_yield_distinct_tokens() {
        assert_ne!(derive_token("4111111111111111"), derive_token("4111111111111112"));
    }

    #[test]
    fn test_known_digest() {
        // BLAKE3 of the empty input
        assert_eq!(
            derive_token(""),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn test_token_expiry_is_three_months() {
        let created = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        assert_eq!(
            token_expiry(created),
            Utc.with_ymd_and_hms(2024, 4, 10, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_token_expiry_clamps_to_month_end() {
        let created = Utc.with_ymd_and_hms(2024, 11, 30, 0, 0, 0).unwrap();
        assert_eq!(
            token_expiry(created),
            Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap()
        );
    }
}
