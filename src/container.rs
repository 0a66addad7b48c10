//! Container codec
//!
//! A container is the on-disk form of one `.pman` file. The layout is:
//! - magic: 16 bytes, `PMFileVer001.000`
//! - salt: 16 bytes
//! - iv: 16 bytes
//! - begin marker: 16 bytes, `PMBeginCipherTxt`
//! - ciphertext: variable, a positive multiple of the block size
//! - end marker: 16 bytes, `PMFileEndCipherT`
//!
//! Decoding is purely structural. Nothing here knows about passwords.

use crate::error::{ErrorKind, PmanError, Result};
use crate::kdf::SALT_LEN;
use std::path::Path;

/// Cipher block size in bytes
pub const BLOCK_LEN: usize = 16;

/// Length of IV in bytes (one cipher block)
pub const IV_LEN: usize = BLOCK_LEN;

/// Magic identifying the format family, shared by every version
const MAGIC_FAMILY: &[u8] = b"PMFileVer";

/// Magic for format version 001.000
pub const MAGIC: &[u8; 16] = b"PMFileVer001.000";

/// Sentinel preceding the ciphertext
pub const BEGIN_MARKER: &[u8; 16] = b"PMBeginCipherTxt";

/// Sentinel following the ciphertext
pub const END_MARKER: &[u8; 16] = b"PMFileEndCipherT";

/// Bytes before the ciphertext
pub const HEADER_LEN: usize = MAGIC.len() + SALT_LEN + IV_LEN + BEGIN_MARKER.len();

/// Bytes after the ciphertext
pub const TRAILER_LEN: usize = END_MARKER.len();

/// Conventional file extension, matched case-insensitively
pub const EXTENSION: &str = "pman";

/// A decoded container, borrowing its ciphertext from the input buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container<'a> {
    pub salt: [u8; SALT_LEN],
    pub iv: [u8; IV_LEN],
    pub ciphertext: &'a [u8],
}

/// Serialize salt, iv and ciphertext into the container layout
pub fn encode(salt: &[u8; SALT_LEN], iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(HEADER_LEN + ciphertext.len() + TRAILER_LEN);
    output.extend_from_slice(MAGIC);
    output.extend_from_slice(salt);
    output.extend_from_slice(iv);
    output.extend_from_slice(BEGIN_MARKER);
    output.extend_from_slice(ciphertext);
    output.extend_from_slice(END_MARKER);
    output
}

/// Parse the container layout, validating magic, markers and lengths
pub fn decode(bytes: &[u8]) -> Result<Container<'_>> {
    if bytes.len() < HEADER_LEN + TRAILER_LEN {
        return Err(invalid(format!(
            "input likely truncated; {} bytes is shorter than the minimum of {}",
            bytes.len(),
            HEADER_LEN + TRAILER_LEN
        )));
    }

    let mut pos = 0;

    let magic = &bytes[pos..pos + MAGIC.len()];
    if magic != MAGIC {
        return if magic.starts_with(MAGIC_FAMILY) {
            Err(invalid(format!(
                "input claims to be a pman container, but version {} is not supported",
                String::from_utf8_lossy(&magic[MAGIC_FAMILY.len()..])
            )))
        } else {
            Err(invalid("input unrecognized as a pman container"))
        };
    }
    pos += MAGIC.len();

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&bytes[pos..pos + SALT_LEN]);
    pos += SALT_LEN;

    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&bytes[pos..pos + IV_LEN]);
    pos += IV_LEN;

    if &bytes[pos..pos + BEGIN_MARKER.len()] != BEGIN_MARKER {
        return Err(invalid("begin marker not found; corrupt container header"));
    }
    pos += BEGIN_MARKER.len();

    let end = bytes.len() - TRAILER_LEN;
    if &bytes[end..] != END_MARKER {
        return Err(invalid("end marker not found; container truncated or corrupt"));
    }

    let ciphertext = &bytes[pos..end];
    if ciphertext.is_empty() {
        return Err(invalid("container holds no ciphertext"));
    }
    if ciphertext.len() % BLOCK_LEN != 0 {
        return Err(invalid(format!(
            "ciphertext length {} is not a multiple of the {}-byte block size",
            ciphertext.len(),
            BLOCK_LEN
        )));
    }

    Ok(Container {
        salt,
        iv,
        ciphertext,
    })
}

/// Whether `path` carries the `.pman` extension, ignoring case
pub fn has_pman_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(EXTENSION))
}

fn invalid(msg: impl Into<String>) -> PmanError {
    PmanError::with_kind(ErrorKind::InvalidContainer, msg)
}
