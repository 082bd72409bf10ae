//! Stored representation of `user.password`.
//!
//! The column holds at most 80 characters; a bcrypt hash is always 60, so any
//! cost fits.

pub use bcrypt::DEFAULT_COST;

/// Hash a plaintext password for storage.
pub fn hash(plaintext: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plaintext, cost)
}

/// Verify plaintext against a stored hash. Malformed hashes never verify.
pub fn verify(plaintext: &str, stored: &str) -> bool {
    bcrypt::verify(plaintext, stored).unwrap_or(false)
}
