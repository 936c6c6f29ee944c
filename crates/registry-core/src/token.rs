//! Confirmation token authority
//!
//! The only place confirmation tokens are generated or checked. Plaintext
//! leaves `issue` exactly once; storage only ever sees the bcrypt hash.

use rand::Rng;
use subtle::ConstantTimeEq;

use crate::error::AppError;

/// Random bytes per token (hex-encoded to twice this many characters).
const TOKEN_BYTES: usize = 32;

/// A freshly issued token pair.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub plaintext: String,
    pub hash: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ConfirmationTokenAuthority {
    cost: u32,
}

impl Default for ConfirmationTokenAuthority {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl ConfirmationTokenAuthority {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Generates a random token and its one-way hash.
    pub fn issue(&self) -> Result<IssuedToken, AppError> {
        let mut rng = rand::rng();
        let random_bytes: Vec<u8> = (0..TOKEN_BYTES).map(|_| rng.random()).collect();
        let plaintext = hex::encode(random_bytes);
        let hash = bcrypt::hash(&plaintext, self.cost).map_err(|e| {
            AppError::Internal(format!("Failed to hash confirmation token: {}", e))
        })?;
        Ok(IssuedToken { plaintext, hash })
    }

    /// One-way check of a supplied token against a stored hash. Malformed
    /// hashes simply fail to verify.
    pub fn verify(&self, hash: &str, supplied: &str) -> bool {
        if supplied.is_empty() {
            return false;
        }
        match bcrypt::verify(supplied, hash) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(error = %e, "Stored confirmation token hash could not be parsed");
                false
            }
        }
    }
}

/// Constant-time string comparison for shared secrets.
pub fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> ConfirmationTokenAuthority {
        ConfirmationTokenAuthority::new(4)
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = authority();
        let issued = tokens.issue().unwrap();
        assert_eq!(issued.plaintext.len(), TOKEN_BYTES * 2);
        assert_ne!(issued.plaintext, issued.hash);
        assert!(tokens.verify(&issued.hash, &issued.plaintext));
    }

    #[test]
    fn test_verify_rejects_other_strings() {
        let tokens = authority();
        let issued = tokens.issue().unwrap();
        assert!(!tokens.verify(&issued.hash, ""));
        assert!(!tokens.verify(&issued.hash, "not-the-token"));
        assert!(!tokens.verify(&issued.hash, &issued.plaintext[1..]));
        assert!(!tokens.verify(&issued.hash, &issued.hash));
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens = authority();
        let a = tokens.issue().unwrap();
        let b = tokens.issue().unwrap();
        assert_ne!(a.plaintext, b.plaintext);
        assert!(!tokens.verify(&a.hash, &b.plaintext));
    }

    #[test]
    fn test_malformed_hash_does_not_verify() {
        assert!(!authority().verify("plainly-not-bcrypt", "anything"));
    }

    #[test]
    fn test_secure_compare() {
        assert!(secure_compare("abc", "abc"));
        assert!(!secure_compare("abc", "abd"));
        assert!(!secure_compare("abc", "abcd"));
    }
}
