//! WebKMS HTTP client.

use crate::{
    config::WebKmsConfig,
    error::{KmsError, KmsResult},
    models::{
        DeriveSecretRequest, DeriveSecretResponse, GenerateKeyRequest, KeyDescription,
        KeystoreConfig, KeystoreDescriptor, SignRequest, SignResponse, UnwrapRequest,
        UnwrapResponse, VerifyRequest, VerifyResponse, WrapRequest, WrapResponse,
    },
    provider::KeyCustody,
    signer::InvocationSigner,
};
use async_trait::async_trait;
use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use reqwest::{
    Client, Method, Url,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, DATE},
};
use serde::{Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

/// Header names covered by the request signature, in signing order.
const SIGNED_HEADERS: &str = "(request-target) date digest";

/// HTTP client for a WebKMS-style key-custody service.
pub struct WebKmsClient {
    config: WebKmsConfig,
    http: Client,
}

impl WebKmsClient {
    /// Create a new WebKMS client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: WebKmsConfig) -> KmsResult<Self> {
        config
            .validate()
            .map_err(|e| KmsError::InvalidConfig(e.to_string()))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { config, http })
    }

    /// Client configuration.
    #[must_use]
    pub const fn config(&self) -> &WebKmsConfig {
        &self.config
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        signer: Option<&dyn InvocationSigner>,
        context: &str,
    ) -> KmsResult<T> {
        let body = serde_json::to_vec(body)?;
        self.request(Method::POST, url, body, signer, context).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Vec<u8>,
        signer: Option<&dyn InvocationSigner>,
        context: &str,
    ) -> KmsResult<T> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(ACCEPT, "application/json");

        if let Some(signer) = signer {
            let headers = signature_headers(&method, url, &body, signer)?;
            request = request
                .header(DATE, headers.date)
                .header("Digest", headers.digest)
                .header(AUTHORIZATION, headers.authorization);
        }

        if method != Method::GET {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                KmsError::Timeout(format!("{context}: {e}"))
            } else {
                KmsError::unavailable(format!("{context}: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), context, "KMS request rejected");
            return Err(KmsError::from_status(status.as_u16(), context, &text));
        }

        response.json().await.map_err(KmsError::from)
    }
}

#[async_trait]
impl KeyCustody for WebKmsClient {
    #[instrument(skip(self, config), fields(controller = %config.controller))]
    async fn create_keystore(&self, config: &KeystoreConfig) -> KmsResult<KeystoreDescriptor> {
        let url = format!("{}/keystores", self.config.base());
        let keystore: KeystoreDescriptor = self.post(&url, config, None, "create keystore").await?;
        debug!(keystore = %keystore.id, "Created keystore");
        Ok(keystore)
    }

    #[instrument(skip(self, signer))]
    async fn get_keystore(
        &self,
        id: &str,
        signer: &dyn InvocationSigner,
    ) -> KmsResult<KeystoreDescriptor> {
        self.request(Method::GET, id, Vec::new(), Some(signer), "get keystore")
            .await
    }

    #[instrument(skip(self, signer))]
    async fn generate_key(
        &self,
        keystore_id: &str,
        key_type: &str,
        signer: &dyn InvocationSigner,
    ) -> KmsResult<KeyDescription> {
        let url = format!("{}/keys", keystore_id.trim_end_matches('/'));
        let key: KeyDescription = self
            .post(&url, &GenerateKeyRequest { key_type }, Some(signer), "generate key")
            .await?;
        debug!(key = %key.id, key_type = %key.key_type, "Generated key");
        Ok(key)
    }

    #[instrument(skip(self, data, signer), fields(data_len = data.len()))]
    async fn sign(
        &self,
        key_id: &str,
        data: &[u8],
        signer: &dyn InvocationSigner,
    ) -> KmsResult<Vec<u8>> {
        let request = SignRequest {
            verify_data: URL_SAFE_NO_PAD.encode(data),
        };
        let response: SignResponse = self
            .post(&operation_url(key_id, "sign"), &request, Some(signer), "sign")
            .await?;
        decode(&response.signature_value, "signatureValue")
    }

    #[instrument(skip(self, data, signature, signer), fields(data_len = data.len()))]
    async fn verify(
        &self,
        key_id: &str,
        data: &[u8],
        signature: &[u8],
        signer: &dyn InvocationSigner,
    ) -> KmsResult<bool> {
        let request = VerifyRequest {
            verify_data: URL_SAFE_NO_PAD.encode(data),
            signature: URL_SAFE_NO_PAD.encode(signature),
        };
        let response: VerifyResponse = self
            .post(&operation_url(key_id, "verify"), &request, Some(signer), "verify")
            .await?;
        Ok(response.verified)
    }

    #[instrument(skip(self, unwrapped, signer))]
    async fn wrap_key(
        &self,
        key_id: &str,
        unwrapped: &[u8],
        signer: &dyn InvocationSigner,
    ) -> KmsResult<Vec<u8>> {
        let request = WrapRequest {
            unwrapped_key: URL_SAFE_NO_PAD.encode(unwrapped),
        };
        let response: WrapResponse = self
            .post(&operation_url(key_id, "wrap"), &request, Some(signer), "wrap key")
            .await?;
        decode(&response.wrapped_key, "wrappedKey")
    }

    #[instrument(skip(self, wrapped, signer))]
    async fn unwrap_key(
        &self,
        key_id: &str,
        wrapped: &[u8],
        signer: &dyn InvocationSigner,
    ) -> KmsResult<Vec<u8>> {
        let request = UnwrapRequest {
            wrapped_key: URL_SAFE_NO_PAD.encode(wrapped),
        };
        let response: UnwrapResponse = self
            .post(&operation_url(key_id, "unwrap"), &request, Some(signer), "unwrap key")
            .await?;
        decode(&response.unwrapped_key, "unwrappedKey")
    }

    #[instrument(skip(self, public_key, signer))]
    async fn derive_secret(
        &self,
        key_id: &str,
        public_key: &[u8],
        signer: &dyn InvocationSigner,
    ) -> KmsResult<Vec<u8>> {
        let request = DeriveSecretRequest {
            public_key: URL_SAFE_NO_PAD.encode(public_key),
        };
        let response: DeriveSecretResponse = self
            .post(
                &operation_url(key_id, "deriveSecret"),
                &request,
                Some(signer),
                "derive secret",
            )
            .await?;
        decode(&response.secret, "secret")
    }
}

fn operation_url(key_id: &str, operation: &str) -> String {
    format!("{}/{operation}", key_id.trim_end_matches('/'))
}

fn decode(value: &str, field: &str) -> KmsResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| KmsError::operation(format!("Malformed {field} in response: {e}")))
}

/// Headers authenticating a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SignatureHeaders {
    pub date: String,
    pub digest: String,
    pub authorization: String,
}

pub(crate) fn signature_headers(
    method: &Method,
    url: &str,
    body: &[u8],
    signer: &dyn InvocationSigner,
) -> KmsResult<SignatureHeaders> {
    let date = chrono::Utc::now().to_rfc2822();
    let digest = format!("SHA-256={}", STANDARD.encode(Sha256::digest(body)));
    let target = request_target(method, url)?;
    let signing_string = signing_string(&target, &date, &digest);
    let signature = URL_SAFE_NO_PAD.encode(signer.sign(signing_string.as_bytes()));

    let authorization = format!(
        "Signature keyId=\"{}\",headers=\"{SIGNED_HEADERS}\",signature=\"{signature}\"",
        signer.verification_method()
    );

    Ok(SignatureHeaders {
        date,
        digest,
        authorization,
    })
}

fn request_target(method: &Method, url: &str) -> KmsResult<String> {
    let parsed = Url::parse(url).map_err(|e| KmsError::operation(format!("Invalid URL {url}: {e}")))?;
    let mut target = format!("{} {}", method.as_str().to_lowercase(), parsed.path());
    if let Some(query) = parsed.query() {
        target.push('?');
        target.push_str(query);
    }
    Ok(target)
}

fn signing_string(target: &str, date: &str, digest: &str) -> String {
    format!("(request-target): {target}\ndate: {date}\ndigest: {digest}")
}
