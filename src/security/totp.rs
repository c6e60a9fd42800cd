/// Time-based One-Time Passwords (RFC 6238 over RFC 4226 HOTP)
///
/// HMAC-SHA1 over the big-endian time-step counter, dynamic truncation, six
/// digits. Verification accepts the current step and one step either side to
/// tolerate clock skew, and compares in constant time.
use crate::error::{AuthError, Result};
use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

/// Time step in seconds (standard TOTP)
pub const STEP_SECONDS: u64 = 30;
/// Code length in digits
pub const CODE_DIGITS: usize = 6;
/// Secret length in bytes (160 bits)
pub const SECRET_BYTES: usize = 20;
/// Steps accepted either side of "now"
const SKEW_STEPS: u64 = 1;

/// Generate a fresh TOTP secret from the OS CSPRNG
pub fn generate_secret() -> Vec<u8> {
    let mut secret = vec![0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut secret);
    secret
}

/// Base32 encoding used in provisioning URIs and at-rest storage
pub fn encode_secret(secret: &[u8]) -> String {
    BASE32_NOPAD.encode(secret)
}

pub fn decode_secret(encoded: &str) -> Result<Vec<u8>> {
    let bytes = BASE32_NOPAD
        .decode(encoded.as_bytes())
        .map_err(|_| AuthError::Internal("Stored TOTP secret is not valid base32".to_string()))?;
    if bytes.len() != SECRET_BYTES {
        return Err(AuthError::Internal(
            "Stored TOTP secret has unexpected length".to_string(),
        ));
    }
    Ok(bytes)
}

/// Provisioning URI for authenticator apps
///
/// `otpauth://totp/{issuer}:{username}?secret={base32}&issuer={issuer}&digits=6&period=30`
pub fn provisioning_uri(issuer: &str, username: &str, secret_base32: &str) -> String {
    format!(
        "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&digits={digits}&period={period}",
        issuer = urlencoding::encode(issuer),
        account = urlencoding::encode(username),
        secret = secret_base32,
        digits = CODE_DIGITS,
        period = STEP_SECONDS,
    )
}

/// RFC 4226 HOTP: HMAC-SHA1 over the 8-byte big-endian counter, dynamic
/// truncation (low nibble of the last byte selects a 4-byte window, sign bit
/// masked), reduced mod 10^6 and zero-padded.
fn hotp(secret: &[u8], counter: u64) -> Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret)
        .map_err(|_| AuthError::Internal("HMAC key setup failed".to_string()))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    Ok(format!("{:06}", binary % 1_000_000))
}

/// Code for an explicit unix timestamp
pub fn code_at(secret: &[u8], unix_time: u64) -> Result<String> {
    hotp(secret, unix_time / STEP_SECONDS)
}

/// Verify a code at an explicit unix timestamp with ±1-step skew tolerance
pub fn verify_at(secret: &[u8], code: &str, unix_time: u64) -> Result<bool> {
    if code.len() != CODE_DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(false);
    }

    let current_step = unix_time / STEP_SECONDS;
    let first_step = current_step.saturating_sub(SKEW_STEPS);

    // Check every window unconditionally so timing does not reveal which
    // step (if any) matched.
    let mut matched = false;
    for step in first_step..=current_step + SKEW_STEPS {
        let expected = hotp(secret, step)?;
        matched |= constant_time_eq(expected.as_bytes(), code.as_bytes());
    }
    Ok(matched)
}

/// Verify a code against the system clock
pub fn verify(secret: &[u8], code: &str) -> Result<bool> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| AuthError::Internal("System clock before unix epoch".to_string()))?
        .as_secs();
    verify_at(secret, code, now)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 6238 Appendix B reference secret (SHA-1 rows)
    const RFC_SECRET: &[u8] = b"12345678901234567890";

    #[test]
    fn test_rfc6238_reference_vectors() {
        // Six-digit truncations of the RFC 6238 SHA-1 test vectors
        assert_eq!(code_at(RFC_SECRET, 59).unwrap(), "287082");
        assert_eq!(code_at(RFC_SECRET, 1111111109).unwrap(), "081804");
        assert_eq!(code_at(RFC_SECRET, 1111111111).unwrap(), "050471");
        assert_eq!(code_at(RFC_SECRET, 1234567890).unwrap(), "005924");
    }

    #[test]
    fn test_code_is_zero_padded() {
        let code = code_at(RFC_SECRET, 1234567890).unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.starts_with("00"));
    }

    #[test]
    fn test_verify_current_step() {
        let secret = generate_secret();
        let t = 1_700_000_000;
        let code = code_at(&secret, t).unwrap();
        assert!(verify_at(&secret, &code, t).unwrap());
    }

    #[test]
    fn test_verify_accepts_adjacent_steps() {
        let secret = generate_secret();
        let t = 1_700_000_000;
        let code = code_at(&secret, t).unwrap();
        assert!(verify_at(&secret, &code, t + STEP_SECONDS).unwrap());
        assert!(verify_at(&secret, &code, t - STEP_SECONDS).unwrap());
    }

    #[test]
    fn test_verify_rejects_two_steps_away() {
        let secret = generate_secret();
        // Mid-step timestamp so the step arithmetic is unambiguous
        let t = 1_700_000_015;
        let code = code_at(&secret, t).unwrap();
        assert!(!verify_at(&secret, &code, t + 2 * STEP_SECONDS).unwrap());
        assert!(!verify_at(&secret, &code, t - 2 * STEP_SECONDS).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_codes() {
        let secret = generate_secret();
        let t = 1_700_000_000;
        assert!(!verify_at(&secret, "12345", t).unwrap());
        assert!(!verify_at(&secret, "1234567", t).unwrap());
        assert!(!verify_at(&secret, "12a456", t).unwrap());
    }

    #[test]
    fn test_secret_roundtrip() {
        let secret = generate_secret();
        let encoded = encode_secret(&secret);
        assert_eq!(decode_secret(&encoded).unwrap(), secret);
    }

    #[test]
    fn test_provisioning_uri_format() {
        let uri = provisioning_uri("auth-service", "alice@example.com", "JBSWY3DPEHPK3PXP");
        assert!(uri.starts_with("otpauth://totp/auth-service:alice%40example.com?"));
        assert!(uri.contains("secret=JBSWY3DPEHPK3PXP"));
        assert!(uri.contains("issuer=auth-service"));
        assert!(uri.contains("digits=6"));
        assert!(uri.contains("period=30"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"123456", b"123456"));
        assert!(!constant_time_eq(b"123456", b"123457"));
        assert!(!constant_time_eq(b"123456", b"12345"));
    }
}
