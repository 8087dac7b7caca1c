//! Wire models for keystores and keys.

use serde::{Deserialize, Serialize};

/// Keystore creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystoreConfig {
    /// Configuration sequence number, 0 on creation
    pub sequence: u64,
    /// Identity that controls the keystore
    pub controller: String,
    /// Caller-supplied correlation id; makes creation idempotent remotely
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    /// Key module backing the keystore
    pub kms_module: String,
    /// Meter / usage reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meter_id: Option<String>,
    /// CIDRs permitted to use the keystore
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_allow_list: Option<Vec<String>>,
}

impl KeystoreConfig {
    /// Create a keystore config for a controller.
    #[must_use]
    pub fn new(controller: impl Into<String>, kms_module: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            controller: controller.into(),
            reference_id: None,
            kms_module: kms_module.into(),
            meter_id: None,
            ip_allow_list: None,
        }
    }

    /// Set the reference id.
    #[must_use]
    pub fn with_reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    /// Set the meter reference.
    #[must_use]
    pub fn with_meter_id(mut self, meter_id: Option<String>) -> Self {
        self.meter_id = meter_id;
        self
    }

    /// Set the IP allow list.
    #[must_use]
    pub fn with_ip_allow_list(mut self, allow_list: Option<Vec<String>>) -> Self {
        self.ip_allow_list = allow_list;
        self
    }
}

/// Keystore as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystoreDescriptor {
    /// Keystore id (absolute URL)
    pub id: String,
    /// Configuration sequence number
    #[serde(default)]
    pub sequence: u64,
    /// Controlling identity
    pub controller: String,
    /// Correlation id, if one was supplied at creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    /// Key module backing the keystore
    #[serde(default)]
    pub kms_module: String,
    /// Meter / usage reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meter_id: Option<String>,
    /// CIDRs permitted to use the keystore
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_allow_list: Option<Vec<String>>,
}

/// Key description returned by key generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyDescription {
    /// Key id (absolute URL under its keystore)
    pub id: String,
    /// Key suite name, e.g. `Sha256HmacKey2019`
    #[serde(rename = "type")]
    pub key_type: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateKeyRequest<'a> {
    #[serde(rename = "type")]
    pub key_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignRequest {
    pub verify_data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignResponse {
    pub signature_value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VerifyRequest {
    pub verify_data: String,
    pub signature: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyResponse {
    pub verified: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WrapRequest {
    pub unwrapped_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WrapResponse {
    pub wrapped_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UnwrapRequest {
    pub wrapped_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UnwrapResponse {
    pub unwrapped_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeriveSecretRequest {
    pub public_key: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeriveSecretResponse {
    pub secret: String,
}
