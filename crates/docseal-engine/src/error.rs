use docseal_crypto::CryptoError;
use thiserror::Error;

/// Configuration rejected at `Sealer::configure` time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Provide either `secret` or both `encryption_key` and `signing_key`")]
    KeySource,

    #[error("Field `{0}` cannot be both encrypted and authenticated")]
    OverlappingFields(String),

    #[error("Field `{0}` has conflicting treatments")]
    ConflictingTreatment(String),

    #[error("Field `{0}` is reserved and cannot be configured")]
    ReservedField(String),
}

#[derive(Debug, Error)]
pub enum SealError {
    #[error("No key available for document")]
    NoKeyAvailable,

    #[error("Document already contains ciphertext")]
    AlreadyEncrypted,

    #[error("Field `{field}` is not serializable: {reason}")]
    NonSerializableField { field: String, reason: String },

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Document must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl SealError {
    /// True for the generic decryption failure (wrong key, padding, framing).
    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, Self::Crypto(CryptoError::DecryptionError))
    }

    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed | Self::Crypto(CryptoError::AuthenticationFailed)
        )
    }
}

pub type Result<T> = std::result::Result<T, SealError>;
