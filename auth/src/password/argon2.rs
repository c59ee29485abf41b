use std::sync::OnceLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::Error as PasswordHashError;
use argon2::password_hash::PasswordHash;
use argon2::password_hash::PasswordHasher as Argon2PasswordHasher;
use argon2::password_hash::PasswordVerifier;
use argon2::password_hash::SaltString;
use argon2::Algorithm;
use argon2::Argon2;
use argon2::Params;
use argon2::Version;

use super::errors::PasswordError;

/// Memory cost in KiB.
const MEMORY_COST_KIB: u32 = 19 * 1024;
/// Number of passes over memory.
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

/// Hash of a random secret, verified against when there is no real hash.
static DECOY_HASH: OnceLock<String> = OnceLock::new();

/// Password hashing implementation.
///
/// Argon2id with fixed cost parameters, so every hash produced by this
/// process costs the same to compute and to verify.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher;

impl PasswordHasher {
    /// Create a new password hasher instance.
    pub fn new() -> Self {
        Self
    }

    fn argon2(&self) -> Result<Argon2<'static>, PasswordError> {
        let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hash a plaintext password securely.
    ///
    /// # Arguments
    /// * `password` - Plaintext password to hash
    ///
    /// # Returns
    /// PHC string format hash (includes algorithm, parameters, salt, and hash)
    ///
    /// # Errors
    /// * `HashingFailed` - Password hashing operation failed
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }

    /// Verify a password against a stored hash.
    ///
    /// The final digest comparison is constant-time (`password-hash` compares
    /// outputs with `subtle`), so timing does not reveal where a mismatch is.
    ///
    /// # Arguments
    /// * `password` - Plaintext password to verify
    /// * `hash` - Stored password hash in PHC string format
    ///
    /// # Returns
    /// True if password matches, false otherwise
    ///
    /// # Errors
    /// * `MalformedHash` - Stored hash cannot be parsed or uses unsupported parameters
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;

        match self
            .argon2()?
            .verify_password(password.as_bytes(), &parsed_hash)
        {
            Ok(()) => Ok(true),
            Err(PasswordHashError::Password) => Ok(false),
            Err(e) => Err(PasswordError::MalformedHash(e.to_string())),
        }
    }
}

impl PasswordHasher {
    /// Run one full verification against a decoy hash and discard the outcome.
    ///
    /// Lets a lookup that found no account cost the same as a wrong password.
    /// The decoy uses the same parameters as every real hash.
    ///
    /// # Errors
    /// * `HashingFailed` - The decoy could not be created
    pub fn verify_decoy(&self, password: &str) -> Result<(), PasswordError> {
        let decoy = self.decoy_hash()?;
        self.verify(password, decoy).map(|_| ())
    }

    fn decoy_hash(&self) -> Result<&'static str, PasswordError> {
        if let Some(hash) = DECOY_HASH.get() {
            return Ok(hash);
        }

        let hash = self.hash(&crate::refresh::generate_opaque_token())?;
        Ok(DECOY_HASH.get_or_init(|| hash))
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::new();
        let password = "my_secure_password";

        let hash = hasher.hash(password).expect("Failed to hash password");
        assert!(hash.starts_with("$argon2id$v=19$m=19456,t=2,p=1$"));

        assert!(hasher
            .verify(password, &hash)
            .expect("Failed to verify password"));

        assert!(!hasher
            .verify("wrong_password", &hash)
            .expect("Failed to verify password"));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let hasher = PasswordHasher::new();

        let first = hasher.hash("pw123").unwrap();
        let second = hasher.hash("pw123").unwrap();

        assert_ne!(first, second);
        assert!(hasher.verify("pw123", &first).unwrap());
        assert!(hasher.verify("pw123", &second).unwrap());
    }

    #[test]
    fn test_decoy_matches_real_hash_parameters() {
        let hasher = PasswordHasher::new();

        let decoy = hasher.decoy_hash().unwrap();
        let real = hasher.hash("pw123").unwrap();

        let params = |hash: &str| hash.rsplitn(3, '$').nth(2).map(str::to_string);
        assert_eq!(params(decoy), params(&real));
        assert_eq!(hasher.decoy_hash().unwrap(), decoy);

        assert!(hasher.verify_decoy("pw123").is_ok());
        assert!(hasher.verify_decoy("").is_ok());
    }

    #[test]
    fn test_verify_invalid_hash() {
        let hasher = PasswordHasher::new();
        let result = hasher.verify("password", "invalid_hash");
        assert!(matches!(result, Err(PasswordError::MalformedHash(_))));
    }
}
