//! Closed set of key suites the tokenizer can request.

use crate::error::TokenizerError;
use std::fmt;
use std::str::FromStr;

/// Key suite understood by the key-custody service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// Symmetric signing (HMAC-SHA256)
    Hmac,
    /// Symmetric key wrapping (AES-KW)
    Kek,
    /// Asymmetric signing (Ed25519)
    Asymmetric,
    /// Key agreement (X25519)
    KeyAgreement,
}

// (accepted name, key type)
const KEY_TYPE_TABLE: &[(&str, KeyType)] = &[
    ("hmac", KeyType::Hmac),
    ("Sha256HmacKey2019", KeyType::Hmac),
    ("kek", KeyType::Kek),
    ("AesKeyWrappingKey2019", KeyType::Kek),
    ("Ed25519VerificationKey2018", KeyType::Asymmetric),
    ("Ed25519VerificationKey2020", KeyType::Asymmetric),
    ("keyAgreement", KeyType::KeyAgreement),
    ("X25519KeyAgreementKey2019", KeyType::KeyAgreement),
    ("X25519KeyAgreementKey2020", KeyType::KeyAgreement),
];

impl KeyType {
    /// Canonical suite name sent to the key-custody service.
    #[must_use]
    pub const fn suite(self) -> &'static str {
        match self {
            Self::Hmac => "Sha256HmacKey2019",
            Self::Kek => "AesKeyWrappingKey2019",
            Self::Asymmetric => "Ed25519VerificationKey2018",
            Self::KeyAgreement => "X25519KeyAgreementKey2019",
        }
    }

    /// Resolve a short name or suite name.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedKeyType` for unknown names.
    pub fn parse(name: &str) -> Result<Self, TokenizerError> {
        KEY_TYPE_TABLE
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, key_type)| *key_type)
            .ok_or_else(|| TokenizerError::UnsupportedKeyType(name.to_string()))
    }
}

impl FromStr for KeyType {
    type Err = TokenizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_resolve() {
        assert_eq!(KeyType::parse("hmac").unwrap(), KeyType::Hmac);
        assert_eq!(KeyType::parse("Sha256HmacKey2019").unwrap(), KeyType::Hmac);
        assert_eq!(KeyType::parse("kek").unwrap(), KeyType::Kek);
        assert_eq!(
            KeyType::parse("Ed25519VerificationKey2018").unwrap(),
            KeyType::Asymmetric
        );
        assert_eq!(KeyType::parse("keyAgreement").unwrap(), KeyType::KeyAgreement);
    }

    #[test]
    fn test_unknown_rejected() {
        let err = KeyType::parse("RsaSignature2018").unwrap_err();
        assert!(matches!(err, TokenizerError::UnsupportedKeyType(name) if name == "RsaSignature2018"));
    }

    #[test]
    fn test_suite_round_trips_through_parse() {
        for key_type in [
            KeyType::Hmac,
            KeyType::Kek,
            KeyType::Asymmetric,
            KeyType::KeyAgreement,
        ] {
            assert_eq!(KeyType::parse(key_type.suite()).unwrap(), key_type);
        }
    }
}
