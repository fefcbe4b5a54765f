//! Credential and error-body types shared by the client and its stores.

use serde::{Deserialize, Serialize};

/// Access/refresh credential pair as issued by `/sessions` and
/// `/sessions/refresh-token`.
///
/// Serialized with the backend's field names (`token`, `refresh_token`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived bearer credential.
    #[serde(rename = "token")]
    pub access_token: String,
    /// Credential exchanged for a new pair when the access token expires.
    pub refresh_token: String,
}

impl TokenPair {
    /// Creates a new token pair.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// A pair only counts as a session when both halves are present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }
}

/// Error payload the backend attaches to non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine code (`token.expired`) or human-readable message.
    #[serde(default)]
    pub message: String,
}

/// 401 message codes that mean the access token, not the user, is the
/// problem and a refresh may recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCode {
    /// `token.expired`
    Expired,
    /// `token.invalid`
    Invalid,
}

impl TokenCode {
    /// Returns the wire code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Expired => "token.expired",
            Self::Invalid => "token.invalid",
        }
    }

    /// Recognizes a refreshable message code. Anything else (for example
    /// `token.revoked`) is `None`.
    #[must_use]
    pub fn parse(message: &str) -> Option<Self> {
        match message {
            "token.expired" => Some(Self::Expired),
            "token.invalid" => Some(Self::Invalid),
            _ => None,
        }
    }
}

/// Shortens a credential for log output (first 8 chars + `...`).
#[must_use]
pub fn token_preview(token: &str) -> String {
    if token.len() > 12 {
        format!("{}...", token.get(..8).unwrap_or(token))
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_token_pair_wire_names() {
        let pair: TokenPair =
            serde_json::from_str(r#"{"token":"a1","refresh_token":"r1"}"#).unwrap();
        assert_eq!(pair, TokenPair::new("a1", "r1"));
        assert!(pair.is_complete());

        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["token"], "a1");
    }

    #[test]
    fn test_incomplete_pair() {
        assert!(!TokenPair::new("a1", "").is_complete());
        assert!(!TokenPair::new("", "r1").is_complete());
    }

    #[test]
    fn test_token_code_parse() {
        assert_eq!(TokenCode::parse("token.expired"), Some(TokenCode::Expired));
        assert_eq!(TokenCode::parse("token.invalid"), Some(TokenCode::Invalid));
        assert_eq!(TokenCode::parse("token.revoked"), None);
        assert_eq!(TokenCode::Invalid.as_str(), "token.invalid");
    }

    #[test]
    fn test_token_preview() {
        assert_eq!(token_preview("abcdefghijklmnop"), "abcdefgh...");
        assert_eq!(token_preview("short"), "***");
    }
}
