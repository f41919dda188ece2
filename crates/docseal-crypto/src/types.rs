/// Wire format version for ciphertext envelopes.
///
/// Version `a`: AES-256-CBC with PKCS#7 padding.
/// Format: [version:1B][IV:16B][ciphertext]
pub const ENVELOPE_VERSION: u8 = b'a';

/// Supported envelope versions (for decryption).
pub const SUPPORTED_ENVELOPE_VERSIONS: &[u8] = &[b'a'];

/// Wire format version for authentication codes.
///
/// Version `a`: HMAC-SHA-512.
/// Format: [version:1B][digest:64B][JSON array of authenticated field names]
pub const AUTH_CODE_VERSION: u8 = b'a';

/// Supported authentication code versions (for verification).
pub const SUPPORTED_AUTH_CODE_VERSIONS: &[u8] = &[b'a'];

/// AES key length in bytes (256 bits).
pub const ENCRYPTION_KEY_LENGTH: usize = 32;

/// HMAC-SHA-512 signing key length in bytes.
pub const SIGNING_KEY_LENGTH: usize = 64;

/// Per-document key length in bytes (one HMAC-SHA-512 output).
pub const DOCUMENT_KEY_LENGTH: usize = 64;

/// AES-CBC IV length in bytes.
pub const AES_CBC_IV_LENGTH: usize = 16;

/// AES block length in bytes.
pub const AES_BLOCK_LENGTH: usize = 16;

/// HMAC-SHA-512 digest length in bytes.
pub const DIGEST_LENGTH: usize = 64;

/// Tag key marking a date value inside a document: `{"$date": "<RFC 3339>"}`.
pub const DATE_TAG: &str = "$date";

/// Tag key marking a binary value inside a document: `{"$binary": "<base64>"}`.
pub const BINARY_TAG: &str = "$binary";
