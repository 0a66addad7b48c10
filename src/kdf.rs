//! Password-based key derivation
//!
//! Keys are derived with PBKDF2 using HMAC-SHA-256 as the pseudorandom
//! function. The iteration count is not stored in containers, so it is fixed
//! per container format version.

use crate::error::{ErrorKind, PmanError, Result};
use hmac::Hmac;
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of derived key in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// PBKDF2 iteration count for format version 001.000
pub const PBKDF2_ITERATIONS: u32 = 600_000;

/// A derived key. Wiped when dropped.
pub type DerivedKey = Zeroizing<[u8; KEY_LEN]>;

/// Derive a 32-byte key from a password and salt using PBKDF2-HMAC-SHA256
///
/// Same password, salt and iteration count always produce the same key.
pub fn derive_key(password: &[u8], salt: &[u8; SALT_LEN], iterations: u32) -> Result<DerivedKey> {
    if iterations == 0 {
        return Err(PmanError::with_kind(
            ErrorKind::UnsupportedAlgorithm,
            "PBKDF2 iteration count must be at least 1",
        ));
    }

    debug!(iterations, "deriving key with PBKDF2-HMAC-SHA256");

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, iterations, &mut key[..]).map_err(|e| {
        PmanError::with_kind(
            ErrorKind::UnsupportedAlgorithm,
            format!("PBKDF2-HMAC-SHA256 key derivation failed: {}", e),
        )
    })?;

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let salt = [42u8; SALT_LEN];

        let k1 = derive_key(b"password", &salt, 1000).unwrap();
        let k2 = derive_key(b"password", &salt, 1000).unwrap();

        assert_eq!(*k1, *k2);
    }

    #[test]
    fn test_salt_changes_key() {
        let k1 = derive_key(b"password", &[1u8; SALT_LEN], 1000).unwrap();
        let k2 = derive_key(b"password", &[2u8; SALT_LEN], 1000).unwrap();

        assert_ne!(*k1, *k2);
    }

    #[test]
    fn test_iterations_change_key() {
        let salt = [7u8; SALT_LEN];

        let k1 = derive_key(b"pw", &salt, 1000).unwrap();
        let k2 = derive_key(b"pw", &salt, 1001).unwrap();

        assert_ne!(*k1, *k2);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let err = derive_key(b"pw", &[0u8; SALT_LEN], 0).expect_err("expected rejection");
        assert_eq!(err.kind, ErrorKind::UnsupportedAlgorithm);
    }

    /// Expected value computed with an independent PBKDF2 implementation.
    #[test]
    fn test_known_answer() {
        let salt: [u8; SALT_LEN] = *b"1234567890123456";
        let key = derive_key(b"mark1", &salt, 1).unwrap();

        #[rustfmt::skip]
        let expected: [u8; KEY_LEN] = [
            0x96, 0x95, 0x40, 0x30, 0xe2, 0xeb, 0x53, 0x06,
            0x6a, 0x20, 0x78, 0xfc, 0xc2, 0x5d, 0x49, 0x62,
            0x23, 0x10, 0x64, 0xaf, 0x1a, 0x22, 0x6e, 0x8f,
            0x51, 0xa5, 0xdb, 0x27, 0x4e, 0xb0, 0xde, 0x14,
        ];

        assert_eq!(*key, expected);
    }
}
