//! Encryption/decryption using PBKDF2 + AES-256-CBC
//!
//! This module implements password-based encryption using:
//! - PBKDF2-HMAC-SHA256 for key derivation from the password
//! - AES-256 in CBC mode with PKCS#7 padding
//!
//! Output is a complete container (see [`crate::container`]).
//!
//! There is no MAC. A wrong password is detected only because the padding
//! of the last block fails to decode, which happens for all but roughly 1 in
//! 256 wrong keys. Adding a MAC would change the container format.

use crate::container::{self, IV_LEN};
use crate::error::{ErrorKind, PmanError, Result};
use crate::kdf::{PBKDF2_ITERATIONS, SALT_LEN, derive_key};
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::debug;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Encrypt plaintext with a password using random salt and IV
///
/// Returns the complete container bytes.
pub fn encrypt(password: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    encrypt_deterministic(password, plaintext, &salt, &iv)
}

/// Encrypt plaintext with a password using provided salt and IV
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates random salt/IV.
pub fn encrypt_deterministic(
    password: &[u8],
    plaintext: &[u8],
    salt: &[u8; SALT_LEN],
    iv: &[u8; IV_LEN],
) -> Result<Vec<u8>> {
    let key = derive_key(password, salt, PBKDF2_ITERATIONS)?;

    let cipher = Aes256CbcEnc::new_from_slices(&key[..], iv).map_err(|e| {
        PmanError::with_kind(
            ErrorKind::UnsupportedAlgorithm,
            format!("failed to initialize AES-256-CBC: {}", e),
        )
    })?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    debug!(
        plaintext_len = plaintext.len(),
        ciphertext_len = ciphertext.len(),
        "encrypted container body"
    );

    Ok(container::encode(salt, iv, &ciphertext))
}

/// Decrypt a container with a password
///
/// Fails with `InvalidContainer` when the bytes are not a well-formed
/// container, and with `BadPassword` when the padding does not decode.
pub fn decrypt(password: &[u8], bytes: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let container = container::decode(bytes)?;

    let key = derive_key(password, &container.salt, PBKDF2_ITERATIONS)?;
    let cipher = Aes256CbcDec::new_from_slices(&key[..], &container.iv).map_err(|e| {
        PmanError::with_kind(
            ErrorKind::UnsupportedAlgorithm,
            format!("failed to initialize AES-256-CBC: {}", e),
        )
    })?;

    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(container.ciphertext)
        .map_err(|_| {
            PmanError::with_kind(
                ErrorKind::BadPassword,
                "bad password or corrupt ciphertext",
            )
        })?;

    Ok(Zeroizing::new(plaintext))
}
