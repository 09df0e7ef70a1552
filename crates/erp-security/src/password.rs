//! Password hashing with Argon2

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;
use zxcvbn::{zxcvbn, Score};

use erp_shared::constants::{MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH};

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Hash error: {0}")]
    HashError(String),
    #[error("Verification failed")]
    VerificationFailed,
    #[error("Password too short")]
    TooShort,
    #[error("Password too long")]
    TooLong,
    #[error("Password too weak")]
    TooWeak,
}

pub struct PasswordService;

impl PasswordService {
    pub fn hash(password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordError::HashError(e.to_string()))
    }

    pub fn verify(password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| PasswordError::HashError(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Length bounds plus a zxcvbn score of at least three. `user_inputs`
    /// (name, email) are penalised when they appear in the password.
    pub fn check_strength(password: &str, user_inputs: &[&str]) -> Result<(), PasswordError> {
        let len = password.chars().count();
        if len < MIN_PASSWORD_LENGTH {
            return Err(PasswordError::TooShort);
        }
        if len > MAX_PASSWORD_LENGTH {
            return Err(PasswordError::TooLong);
        }
        let entropy = zxcvbn(password, user_inputs);
        if matches!(entropy.score(), Score::Zero | Score::One | Score::Two) {
            return Err(PasswordError::TooWeak);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = PasswordService::hash("correct horse battery staple").unwrap();
        assert!(PasswordService::verify("correct horse battery staple", &hash).unwrap());
        assert!(!PasswordService::verify("wrong", &hash).unwrap());
    }

    #[test]
    fn test_invalid_hash_is_error() {
        assert!(PasswordService::verify("x", "not-a-hash").is_err());
    }

    #[test]
    fn test_strength_rules() {
        assert!(matches!(PasswordService::check_strength("short", &[]), Err(PasswordError::TooShort)));
        assert!(matches!(
            PasswordService::check_strength(&"a".repeat(200), &[]),
            Err(PasswordError::TooLong)
        ));
        assert!(matches!(PasswordService::check_strength("password", &[]), Err(PasswordError::TooWeak)));
        assert!(PasswordService::check_strength("Tr0ub4dor&3-horse-Staple!", &[]).is_ok());
    }
}
