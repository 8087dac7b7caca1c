//! Request credentials.

/// A locally held identity able to authenticate requests to the
/// key-custody service.
pub trait InvocationSigner: Send + Sync {
    /// Identity id (the keystore controller).
    fn id(&self) -> &str;

    /// Verification method id referenced in the request signature.
    fn verification_method(&self) -> String;

    /// Sign request bytes.
    fn sign(&self, data: &[u8]) -> Vec<u8>;
}
