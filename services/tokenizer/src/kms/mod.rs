//! Key-custody integration for tokenizers.

pub mod handle;
pub mod key_type;
pub mod mock;
pub mod provisioner;

pub use handle::{AsymmetricKey, HmacKey, KeyAgreementKey, KeyHandle, Kek};
pub use key_type::KeyType;
pub use mock::MockKms;
pub use provisioner::KeystoreProvisioner;
