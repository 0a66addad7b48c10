use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// The conditions a caller has to tell apart.
///
/// The match is intended to be exhaustive: a front end decides what to show
/// the user (retry the password, pick another file, give up) from the kind
/// alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The container is structurally valid but the ciphertext did not
    /// decrypt to well-formed plaintext under the derived key. In practice
    /// this means the password is wrong.
    BadPassword,
    /// Magic, markers or lengths do not match the container layout. The file
    /// is not a container at all, is from an unsupported version, or is
    /// corrupted.
    InvalidContainer,
    /// Reading or writing the filesystem failed.
    Io,
    /// The key derivation function or cipher could not be set up. Nothing can
    /// succeed after this, so callers should treat it as fatal.
    UnsupportedAlgorithm,
    /// A passphrase reader could not supply a passphrase (no terminal or
    /// the prompt could not be read). Never produced by the container
    /// operations.
    PassphraseUnavailable,
    /// A plaintext input file was read but is not UTF-8 text. Only the
    /// file-level commands produce this.
    InvalidText,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct PmanError {
    /// Condition tag, always provided.
    pub kind: ErrorKind,
    path: Option<PathBuf>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl PmanError {
    /// Creates a new error tagged with a kind.
    pub fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            path: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            path: None,
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Attaches the path the failed operation was working on.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// The file the failed operation was working on, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving
    /// the original as source. Kind and path carry over.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let kind = self.kind;
        let path = self.path.clone();
        Self {
            kind,
            path,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }

    /// Whether the user can reasonably retry with a different password or file.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::BadPassword
                | ErrorKind::InvalidContainer
                | ErrorKind::PassphraseUnavailable
                | ErrorKind::InvalidText
        )
    }

    /// Whether no container operation can succeed in this process.
    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::UnsupportedAlgorithm
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PmanError>;
