//! Passphrase sources
//!
//! A [`PassphraseReader`] is what the container operations consume when a
//! front end needs a password: the terminal, stdin, a fixed value in tests.

use crate::error::{ErrorKind, PmanError, Result};
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

/// Trait for reading passphrases from various sources
pub trait PassphraseReader {
    /// Read a passphrase as arbitrary bytes (not necessarily UTF-8)
    ///
    /// Returns the passphrase wrapped in `Zeroizing` so it is wiped from
    /// memory when dropped. Fails with `PassphraseUnavailable` when the
    /// source cannot supply one.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

impl<R: PassphraseReader + ?Sized> PassphraseReader for &mut R {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        (**self).read_passphrase()
    }
}

/// Returns a fixed passphrase (for testing)
pub struct ConstantPassphraseReader {
    passphrase: Zeroizing<Vec<u8>>,
}

impl ConstantPassphraseReader {
    pub fn new(passphrase: Vec<u8>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase),
        }
    }
}

impl PassphraseReader for ConstantPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(self.passphrase.clone())
    }
}

/// Reads the whole of an io::Read source as the passphrase
pub struct ReaderPassphraseReader {
    reader: Box<dyn Read>,
}

impl ReaderPassphraseReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PassphraseReader for ReaderPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            PmanError::with_kind_and_source(
                ErrorKind::PassphraseUnavailable,
                format!("error reading passphrase: {}", e),
                e,
            )
        })?;
        Ok(data)
    }
}

/// Prompts on the terminal and reads the passphrase with no echo
///
/// An empty entry is an empty passphrase, same as empty stdin.
pub struct TerminalPassphraseReader {
    prompt: &'static str,
}

impl TerminalPassphraseReader {
    pub fn new() -> Self {
        Self {
            prompt: "Password (pman): ",
        }
    }
}

impl Default for TerminalPassphraseReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PassphraseReader for TerminalPassphraseReader {
    /// Terminal input is limited to UTF-8 by rpassword. For other byte
    /// sequences use `--passphrase-stdin`.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(PmanError::with_kind(
                ErrorKind::PassphraseUnavailable,
                "cannot read password from terminal - stdin is not a terminal",
            ));
        }

        let mut stderr = io::stderr();
        stderr
            .write_all(self.prompt.as_bytes())
            .and_then(|()| stderr.flush())
            .map_err(|e| {
                PmanError::with_kind_and_source(
                    ErrorKind::Io,
                    format!("failed to write prompt: {}", e),
                    e,
                )
            })?;

        // rpassword hands back a plain String; move it into Zeroizing at once
        let passphrase = Zeroizing::new(rpassword::read_password().map_err(|e| {
            PmanError::with_kind_and_source(
                ErrorKind::PassphraseUnavailable,
                format!("failure reading password: {}", e),
                e,
            )
        })?);

        Ok(entry_bytes(&passphrase))
    }
}

/// The bytes of a line typed at the prompt, taken as is
fn entry_bytes(entry: &str) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(entry.as_bytes().to_vec())
}

/// Wraps another PassphraseReader and caches the result
///
/// The upstream reader is called only until it first succeeds; later calls
/// return copies of the cached value. Used where one command needs the same
/// password twice, e.g. to verify an existing container and then re-save it.
pub struct CachingPassphraseReader<R: PassphraseReader> {
    upstream: R,
    cached: Option<Zeroizing<Vec<u8>>>,
}

impl<R: PassphraseReader> CachingPassphraseReader<R> {
    pub fn new(upstream: R) -> Self {
        Self {
            upstream,
            cached: None,
        }
    }
}

impl<R: PassphraseReader> PassphraseReader for CachingPassphraseReader<R> {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        match &self.cached {
            Some(cached) => Ok(cached.clone()),
            None => {
                let passphrase = self.upstream.read_passphrase()?;
                self.cached = Some(passphrase.clone());
                Ok(passphrase)
            }
        }
    }
}
