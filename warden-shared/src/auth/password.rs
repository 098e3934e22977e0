/// Password credentials for Warden users
///
/// Passwords are stored as Argon2id PHC strings. The parameters follow the OWASP
/// baseline for Argon2id (19 MiB memory, 2 passes, 1 lane) and are embedded in the
/// stored hash, so raising them later does not invalidate existing credentials.
///
/// Login paths should call [`verify_against_dummy`] when the e-mail is unknown, so
/// that a missing account costs the same time as a wrong password.
///
/// # Example
///
/// ```
/// use warden_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Tr1cky!Passphrase")?;
/// assert!(verify_password("Tr1cky!Passphrase", &hash)?);
/// assert!(!verify_password("tr1cky!passphrase", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, ParamsBuilder, Version,
};

/// Minimum accepted password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Precomputed hash of a throwaway secret, used to equalize unknown-user logins
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$QP8p9Ul3ZQ0pJZ3aGZL0sOqQ3Cj6X3mJm0A8d0o5tRw";

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(19_456)
        .t_cost(2)
        .p_cost(1)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password into a PHC string (`$argon2id$v=19$m=19456,t=2,p=1$...`)
///
/// # Errors
///
/// Returns `PasswordError::HashError` if the hasher rejects its input
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC hash
///
/// Returns `Ok(false)` for a wrong password and an error only when the stored hash
/// itself cannot be parsed or checked.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Burns one verification against a fixed hash and always reports a mismatch
pub fn verify_against_dummy(password: &str) -> bool {
    let _ = verify_password(password, DUMMY_HASH);
    false
}

/// Checks a new password against the registration policy
///
/// The policy asks for at least [`MIN_PASSWORD_LENGTH`] characters mixing letters and
/// digits. The returned message is safe to show to the user.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }

    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }

    if !password.chars().any(|c| c.is_numeric()) {
        return Err("Password must contain at least one digit".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_uses_argon2id_parameters() {
        let hash = hash_password("workspace-owner-1").expect("hash should succeed");

        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(hash.contains("m=19456"));
        assert!(hash.contains("t=2"));
        assert!(hash.contains("p=1"));
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        let first = hash_password("same-secret-9").expect("hash should succeed");
        let second = hash_password("same-secret-9").expect("hash should succeed");
        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_accepts_only_the_original_password() {
        let hash = hash_password("invitee-pass-42").expect("hash should succeed");

        assert!(verify_password("invitee-pass-42", &hash).expect("verify should succeed"));
        assert!(!verify_password("invitee-pass-43", &hash).expect("verify should succeed"));
        assert!(!verify_password("", &hash).expect("verify should succeed"));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
        assert!(verify_password("anything", "").is_err());
    }

    #[test]
    fn test_dummy_verification_never_matches() {
        assert!(!verify_against_dummy("whatever-1"));
        assert!(!verify_against_dummy(""));
    }

    #[test]
    fn test_password_policy() {
        assert!(validate_password_strength("abcdefg1").is_ok());
        assert!(validate_password_strength("pässwörd2").is_ok());

        let short = validate_password_strength("ab1").unwrap_err();
        assert!(short.contains("at least 8 characters"));

        let no_digit = validate_password_strength("onlyletters").unwrap_err();
        assert!(no_digit.contains("digit"));

        let no_letter = validate_password_strength("1234567890").unwrap_err();
        assert!(no_letter.contains("letter"));
    }
}
