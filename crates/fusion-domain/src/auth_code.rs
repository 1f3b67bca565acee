use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The opaque payload embedded in `fusion-auth <blob>` instructions
/// (spec §3, §6). Field names match the wire format exactly
/// (`{"URL":…,"Code":…,"Service":…}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCodeBlob {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Service")]
    pub service: String,
}

impl AuthCodeBlob {
    /// `base64url(no padding)` of the canonical JSON encoding.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub fn decode(blob: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(blob)
            .map_err(|e| Error::Token(format!("invalid auth-code blob encoding: {e}")))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// The `fusion-auth <blob>` instruction string the auth-setup tool
    /// emits (spec §4.15).
    pub fn to_instruction(&self) -> Result<String> {
        Ok(format!("fusion-auth {}", self.encode()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let blob = AuthCodeBlob {
            url: "https://gateway.example.com".into(),
            code: "a".repeat(32),
            service: "graph".into(),
        };
        let encoded = blob.encode().unwrap();
        let decoded = AuthCodeBlob::decode(&encoded).unwrap();
        assert_eq!(blob, decoded);
    }

    #[test]
    fn encoding_has_no_padding_and_is_url_safe() {
        let blob = AuthCodeBlob {
            url: "https://x".into(),
            code: "c".repeat(32),
            service: "s".into(),
        };
        let encoded = blob.encode().unwrap();
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
    }

    #[test]
    fn instruction_has_expected_prefix() {
        let blob = AuthCodeBlob {
            url: "https://x".into(),
            code: "c".repeat(32),
            service: "s".into(),
        };
        let instr = blob.to_instruction().unwrap();
        assert!(instr.starts_with("fusion-auth "));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(AuthCodeBlob::decode("not valid base64url!!!").is_err());
    }
}
