//! pman - password-protected text containers
//!
//! A container holds one UTF-8 text encrypted with AES-256-CBC under a key
//! derived from a password with PBKDF2-HMAC-SHA256. [`PasswordManager`]
//! is the entry point; the other modules are the layers underneath it and
//! the command-line glue.

#![forbid(unsafe_code)]

pub mod container;
pub mod crypt;
pub mod error;
pub mod file_ops;
pub mod kdf;
pub mod manager;
pub mod passphrase;

pub use error::{ErrorKind, PmanError, Result};
pub use manager::{PasswordManager, State};
