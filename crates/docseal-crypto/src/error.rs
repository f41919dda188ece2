use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(u8),

    /// Padding, framing and wrong-key failures all map here.
    #[error("Decryption failed")]
    DecryptionError,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Malformed authentication code: {0}")]
    MalformedAuthCode(String),

    #[error("Value is not canonically serializable: {0}")]
    NonSerializable(String),

    #[error("Random number generation failed: {0}")]
    RngFailed(String),
}
