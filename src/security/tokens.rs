/// Opaque token generation and hashing
///
/// Refresh and session tokens are random byte strings, URL-safe encoded.
/// Only SHA-256 hashes of refresh tokens ever reach the database.
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};

/// Entropy of opaque refresh/session tokens in bytes
pub const OPAQUE_TOKEN_BYTES: usize = 48;

/// Backup codes: 8 uppercase-alphanumeric characters
pub const BACKUP_CODE_LENGTH: usize = 8;
const BACKUP_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate an opaque high-entropy token (48 random bytes, URL-safe base64)
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hex digest used to key tokens at rest
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a single-use MFA backup code, sampling the alphabet uniformly
pub fn generate_backup_code() -> String {
    let mut rng = OsRng;
    (0..BACKUP_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..BACKUP_CODE_ALPHABET.len());
            BACKUP_CODE_ALPHABET[idx] as char
        })
        .collect()
}
