use crate::error::{Error, Result};

/// Password hashing seam consumed by the facade.
///
/// Implementations must be one-way: the facade never stores or returns
/// plaintext, only digests produced here.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password into a storable digest.
    fn hash(&self, password: &str) -> Result<String>;

    /// Checks a plaintext password against a stored digest.
    fn verify(&self, password: &str, digest: &str) -> bool;
}

/// Bcrypt-backed hasher using the library's default cost.
#[cfg(feature = "bcrypt")]
#[derive(Debug, Default, Clone, Copy)]
pub struct BcryptHasher;

#[cfg(feature = "bcrypt")]
impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|err| Error::Hash(Box::new(err)))
    }

    fn verify(&self, password: &str, digest: &str) -> bool {
        bcrypt::verify(password, digest).unwrap_or(false)
    }
}
