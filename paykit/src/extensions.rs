//! Protocol extensions riding inside a current-format `402`.
//!
//! The extension map is open-ended: servers may attach any number of named
//! sub-protocols. Only [`SIGN_IN_WITH_X`] is understood here; every other entry
//! is carried as an opaque JSON blob and serialized back untouched.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;

use crate::chain::{ChainId, ChainIdFormatError};

/// Extension key of the address-ownership challenge.
pub const SIGN_IN_WITH_X: &str = "sign-in-with-x";

/// Challenge fields that must be present and non-empty before signing.
pub const REQUIRED_CHALLENGE_FIELDS: [&str; 6] =
    ["domain", "uri", "version", "chainId", "nonce", "issuedAt"];

/// A single extension entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Extension {
    /// The `sign-in-with-x` challenge, kept raw until validated.
    SignInWithX(Value),
    /// Any extension this crate does not interpret.
    Opaque(Value),
}

impl Extension {
    fn from_entry(name: &str, payload: Value) -> Self {
        if name == SIGN_IN_WITH_X {
            Self::SignInWithX(payload)
        } else {
            Self::Opaque(payload)
        }
    }

    /// The raw JSON payload of the extension.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        match self {
            Self::SignInWithX(payload) | Self::Opaque(payload) => payload,
        }
    }
}

/// Extension map of a `402` response, keyed by extension name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extensions(BTreeMap<String, Extension>);

impl Extensions {
    /// Looks up an extension by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Extension> {
        self.0.get(name)
    }

    /// The raw `sign-in-with-x` payload, if the server issued one.
    #[must_use]
    pub fn sign_in_with_x(&self) -> Option<&Value> {
        self.0.values().find_map(|extension| match extension {
            Extension::SignInWithX(payload) => Some(payload),
            Extension::Opaque(_) => None,
        })
    }

    /// Names of all extensions present, in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    /// Number of extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(name, extension)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Extension)> {
        self.0.iter().map(|(name, extension)| (name.as_str(), extension))
    }
}

impl FromIterator<(String, Value)> for Extensions {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, payload)| {
                    let extension = Extension::from_entry(&name, payload);
                    (name, extension)
                })
                .collect(),
        )
    }
}

impl Serialize for Extensions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(name, ext)| (name, ext.payload())))
    }
}

impl<'de> Deserialize<'de> for Extensions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}

/// A server-issued address-ownership challenge.
///
/// The field set mirrors an EIP-4361 message; `chainId` is a CAIP-2 string.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionChallenge {
    /// Domain requesting the signature.
    pub domain: String,
    /// URI of the resource being accessed.
    pub uri: String,
    /// Message version, `"1"` for EIP-4361.
    pub version: String,
    /// CAIP-2 chain id the signature is bound to.
    pub chain_id: String,
    /// Single-use server nonce.
    pub nonce: String,
    /// RFC 3339 issuance time.
    pub issued_at: String,
    /// RFC 3339 expiry time.
    pub expiration_time: Option<String>,
    /// Human-readable statement shown to the signer.
    pub statement: Option<String>,
    /// RFC 3339 time before which the signature is not valid.
    pub not_before: Option<String>,
    /// Server-side request correlation id.
    pub request_id: Option<String>,
    /// Additional resources covered by the signature.
    pub resources: Option<Vec<String>>,
}

/// Why a challenge could not be accepted.
#[derive(Debug, thiserror::Error)]
pub enum ChallengeError {
    /// Required fields are absent or empty.
    #[error("challenge is missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    /// Fields are present but have the wrong JSON type.
    #[error("malformed challenge: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ExtensionChallenge {
    /// Validates and extracts a challenge from a `sign-in-with-x` payload.
    ///
    /// Fields are read from the payload's `info` object when there is one,
    /// otherwise from the payload itself. Empty optional fields are dropped,
    /// so `""` and `[]` read the same as an absent field.
    ///
    /// # Errors
    ///
    /// [`ChallengeError::MissingFields`] names every absent or empty required
    /// field; [`ChallengeError::Malformed`] reports wrongly typed fields.
    pub fn from_extension(payload: &Value) -> Result<Self, ChallengeError> {
        let info = payload
            .get("info")
            .filter(|info| info.is_object())
            .unwrap_or(payload);

        let missing: Vec<&'static str> = REQUIRED_CHALLENGE_FIELDS
            .into_iter()
            .filter(|field| info.get(field).is_none_or(is_blank))
            .collect();
        if !missing.is_empty() {
            return Err(ChallengeError::MissingFields(missing));
        }

        let mut challenge = Self::deserialize(info)?;
        challenge.drop_empty_optionals();
        Ok(challenge)
    }

    fn drop_empty_optionals(&mut self) {
        for field in [
            &mut self.expiration_time,
            &mut self.statement,
            &mut self.not_before,
            &mut self.request_id,
        ] {
            if field.as_deref().is_some_and(str::is_empty) {
                *field = None;
            }
        }
        if self.resources.as_ref().is_some_and(Vec::is_empty) {
            self.resources = None;
        }
    }

    /// Parses [`chain_id`](Self::chain_id) as a CAIP-2 id.
    ///
    /// # Errors
    ///
    /// Returns [`ChainIdFormatError`] if the value is not `namespace:reference`.
    pub fn chain(&self) -> Result<ChainId, ChainIdFormatError> {
        self.chain_id.parse()
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn challenge_info() -> Value {
        json!({
            "domain": "api.example.com",
            "uri": "https://api.example.com/profile",
            "version": "1",
            "chainId": "eip155:8453",
            "nonce": "a1b2c3d4e5f6",
            "issuedAt": "2026-10-18T12:00:00Z",
            "expirationTime": "2026-10-18T12:05:00Z",
            "statement": "Sign in to read your profile"
        })
    }

    #[test]
    fn test_known_extension_is_tagged() {
        let extensions: Extensions = serde_json::from_value(json!({
            "bazaar": {"info": {"discoverable": true}},
            "sign-in-with-x": {"info": challenge_info()}
        }))
        .unwrap();
        assert!(matches!(
            extensions.get("bazaar"),
            Some(Extension::Opaque(_))
        ));
        assert!(matches!(
            extensions.get(SIGN_IN_WITH_X),
            Some(Extension::SignInWithX(_))
        ));
        assert_eq!(extensions.names(), vec!["bazaar", "sign-in-with-x"]);
        assert!(extensions.sign_in_with_x().is_some());
    }

    #[test]
    fn test_extensions_serialize_back_untouched() {
        let raw = json!({
            "bazaar": {"info": {"output": [1, 2, 3]}},
            "vendor-x": "opaque"
        });
        let extensions: Extensions = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&extensions).unwrap(), raw);
        assert!(extensions.sign_in_with_x().is_none());
    }

    #[test]
    fn test_challenge_from_info_object() {
        let challenge =
            ExtensionChallenge::from_extension(&json!({"info": challenge_info()})).unwrap();
        assert_eq!(challenge.domain, "api.example.com");
        assert_eq!(challenge.chain().unwrap(), ChainId::eip155(8453));
        assert_eq!(
            challenge.statement.as_deref(),
            Some("Sign in to read your profile")
        );
    }

    #[test]
    fn test_challenge_from_flat_payload() {
        let challenge = ExtensionChallenge::from_extension(&challenge_info()).unwrap();
        assert_eq!(challenge.nonce, "a1b2c3d4e5f6");
        assert_eq!(challenge.resources, None);
    }

    #[test]
    fn test_challenge_missing_fields_are_named() {
        let mut info = challenge_info();
        let object = info.as_object_mut().unwrap();
        object.remove("nonce");
        object.remove("domain");
        object.insert("issuedAt".into(), json!(""));

        let err = ExtensionChallenge::from_extension(&info).unwrap_err();
        match err {
            ChallengeError::MissingFields(missing) => {
                assert_eq!(missing, vec!["domain", "nonce", "issuedAt"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_optionals_read_as_absent() {
        let mut info = challenge_info();
        info["statement"] = json!("");
        info["requestId"] = json!("");
        info["resources"] = json!([]);
        let challenge = ExtensionChallenge::from_extension(&info).unwrap();
        assert_eq!(challenge.statement, None);
        assert_eq!(challenge.request_id, None);
        assert_eq!(challenge.resources, None);
        assert_eq!(
            challenge.expiration_time.as_deref(),
            Some("2026-10-18T12:05:00Z")
        );
    }

    #[test]
    fn test_challenge_wrong_type_is_malformed() {
        let mut info = challenge_info();
        info["version"] = json!(1);
        assert!(matches!(
            ExtensionChallenge::from_extension(&info),
            Err(ChallengeError::Malformed(_))
        ));
    }
}
