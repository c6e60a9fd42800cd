/// Password hashing and verification using Argon2id
use crate::error::{AuthError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use zxcvbn::zxcvbn;

/// Hash a password using Argon2id with a per-password random salt.
/// Strength policy is enforced before hashing.
pub fn hash_password(password: &str) -> Result<String> {
    validate_password_strength(password)?;

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against its PHC-formatted hash
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| AuthError::Internal(format!("Invalid password hash format: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Internal(format!(
            "Password verification failed: {}",
            e
        ))),
    }
}

/// Plain comparison for new/confirm password pairs
pub fn passwords_match(password: &str, confirmation: &str) -> Result<()> {
    if password != confirmation {
        return Err(AuthError::PasswordMismatch);
    }
    Ok(())
}

/// Composition rules plus a zxcvbn entropy floor (score >= 3)
fn validate_password_strength(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(AuthError::WeakPassword(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if !has_uppercase {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one uppercase letter".to_string(),
        ));
    }
    if !has_lowercase {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one lowercase letter".to_string(),
        ));
    }
    if !has_digit {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one digit".to_string(),
        ));
    }
    if !has_special {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one special character".to_string(),
        ));
    }

    let entropy = zxcvbn(password, &[])
        .map_err(|e| AuthError::Internal(format!("Password entropy calculation failed: {}", e)))?;

    if entropy.score() < 3 {
        return Err(AuthError::WeakPassword(
            "Password is too predictable, choose a stronger one".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_valid_password() {
        let password = "Str0ng&Unrelated!";
        let hash = hash_password(password).expect("should hash password");
        assert!(verify_password(password, &hash).expect("should verify"));
    }

    #[test]
    fn test_verify_wrong_password() {
        let password = "Str0ng&Unrelated!";
        let hash = hash_password(password).expect("should hash password");
        assert!(!verify_password("WrongPassword123!", &hash).expect("verification should run"));
    }

    #[test]
    fn test_weak_password_too_short() {
        assert!(matches!(
            hash_password("Sh0rt!"),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_weak_password_no_uppercase() {
        assert!(matches!(
            hash_password("lowercase-only-123!"),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_weak_password_no_digit() {
        assert!(matches!(
            hash_password("NoDigitsHere!!"),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_weak_password_no_special() {
        assert!(matches!(
            hash_password("NoSpecials1234"),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_different_hashes_for_same_password() {
        let password = "Str0ng&Unrelated!";
        let hash1 = hash_password(password).expect("should hash");
        let hash2 = hash_password(password).expect("should hash");
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_passwords_match_comparison() {
        assert!(passwords_match("abc", "abc").is_ok());
        assert!(matches!(
            passwords_match("abc", "abd"),
            Err(AuthError::PasswordMismatch)
        ));
    }
}
