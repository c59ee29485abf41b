//! Authentication utilities library
//!
//! Provides the credential and token primitives the auth service builds on:
//! - Password hashing (Argon2id, fixed cost)
//! - Access token issuing and parsing (HS256 JWT)
//! - Opaque refresh token generation and digesting
//!
//! The service defines its own ports and adapts these implementations.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! let is_valid = hasher.verify("my_password", &hash).unwrap();
//! assert!(is_valid);
//! ```
//!
//! ## Access Tokens
//! ```
//! use auth::{TokenError, TokenIssuer};
//!
//! let issuer = TokenIssuer::new(b"secret_key_at_least_32_bytes_long!").unwrap();
//! let token = issuer.issue_access_token("alice", "USER").unwrap();
//! let claims = issuer.parse_access_token(&token).unwrap();
//! assert_eq!(claims.sub, "alice");
//!
//! assert!(matches!(
//!     TokenIssuer::new(b"short"),
//!     Err(TokenError::KeyTooShort { .. })
//! ));
//! ```
//!
//! ## Refresh Tokens
//! ```
//! let token = auth::generate_opaque_token();
//! assert_eq!(token.len(), 43);
//! assert_eq!(auth::hash_opaque_token(&token).len(), 64);
//! ```

pub mod issuer;
pub mod jwt;
pub mod password;
pub mod refresh;

// Re-export commonly used items
pub use issuer::TokenIssuer;
pub use jwt::AccessTokenClaims;
pub use jwt::JwtHandler;
pub use jwt::TokenError;
pub use password::PasswordError;
pub use password::PasswordHasher;
pub use refresh::generate_opaque_token;
pub use refresh::hash_opaque_token;
