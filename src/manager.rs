//! The password manager: an in-memory plaintext buffer bound to an
//! encrypted container on disk
//!
//! [`PasswordManager`] owns the text a user is editing and moves it to and
//! from containers. It does no prompting and no formatting of messages; a
//! front end supplies paths and passwords and reacts to the error kinds.

use crate::crypt;
use crate::error::{ErrorKind, PmanError, Result};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Whether the instance is associated with a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No file association. The text only exists in memory.
    Empty,
    /// The text came from, or has been saved to, [`PasswordManager::path`].
    Loaded,
}

/// Holds the plaintext of one password file.
///
/// Passwords are taken by value as `Zeroizing<Vec<u8>>`, so they are wiped
/// when `open` or `save` returns, whether or not the call succeeded.
///
/// `open` and `save` take `&mut self`; concurrent use of one instance has to
/// go through the caller's own synchronization.
pub struct PasswordManager {
    text: Zeroizing<String>,
    path: Option<PathBuf>,
    unsaved_changes: bool,
}

impl PasswordManager {
    /// An empty buffer with no associated file.
    pub fn new() -> Self {
        Self {
            text: Zeroizing::new(String::new()),
            path: None,
            unsaved_changes: false,
        }
    }

    /// A buffer holding `text`, with no associated file.
    pub fn with_text(text: impl Into<String>) -> Self {
        let text = Zeroizing::new(text.into());
        let unsaved_changes = !text.is_empty();
        Self {
            text,
            path: None,
            unsaved_changes,
        }
    }

    /// The current contents of the buffer.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the buffer. Does not touch the file association.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Zeroizing::new(text.into());
        self.unsaved_changes = true;
    }

    /// The file the text was loaded from or last saved to.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// `Loaded` once the buffer is bound to a file, `Empty` otherwise.
    pub fn state(&self) -> State {
        if self.path.is_some() {
            State::Loaded
        } else {
            State::Empty
        }
    }

    /// True after `set_text` until the next successful `open`, `save` or
    /// `close`.
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved_changes
    }

    /// Drops the text and the file association.
    pub fn close(&mut self) {
        *self = Self::new();
    }

    /// Load and decrypt the container at `path`, replacing the buffer
    ///
    /// On any error the instance is left exactly as it was.
    pub fn open(&mut self, path: impl AsRef<Path>, password: Zeroizing<Vec<u8>>) -> Result<()> {
        let path = path.as_ref();

        let bytes = fs::read(path).map_err(|e| read_error(path, e))?;
        let plaintext = crypt::decrypt(&password, &bytes).map_err(|e| {
            if e.kind == ErrorKind::BadPassword {
                warn!(path = %path.display(), "password rejected");
            }
            e.with_path(path)
                .with_context(format!("failed to open {}", path.display()))
        })?;

        // Valid padding means the password is accepted. Text written in a
        // legacy charset is decoded with replacement characters.
        let text = Zeroizing::new(String::from_utf8_lossy(&plaintext).into_owned());
        if std::str::from_utf8(&plaintext).is_err() {
            warn!(
                path = %path.display(),
                "container text is not valid UTF-8; invalid sequences replaced"
            );
        }

        self.text = text;
        self.path = Some(path.to_path_buf());
        self.unsaved_changes = false;

        info!(path = %path.display(), "opened container");
        Ok(())
    }

    /// Encrypt the buffer under `password` and write it to `path`
    ///
    /// Salt and IV are fresh for every call. Any existing file at `path` is
    /// replaced atomically: the destination holds either the old content or
    /// the complete new content, never a partial write.
    pub fn save(&mut self, path: impl AsRef<Path>, password: Zeroizing<Vec<u8>>) -> Result<()> {
        let path = path.as_ref();
        let bytes = crypt::encrypt(&password, self.text.as_bytes())
            .map_err(|e| e.with_context(format!("failed to encrypt for {}", path.display())))?;
        self.commit_save(path, &bytes)
    }

    #[cfg(test)]
    fn save_deterministic(
        &mut self,
        path: &Path,
        password: Zeroizing<Vec<u8>>,
        salt: &[u8; crate::kdf::SALT_LEN],
        iv: &[u8; crate::container::IV_LEN],
    ) -> Result<()> {
        let bytes = crypt::encrypt_deterministic(&password, self.text.as_bytes(), salt, iv)?;
        self.commit_save(path, &bytes)
    }

    fn commit_save(&mut self, path: &Path, bytes: &[u8]) -> Result<()> {
        write_atomically(path, bytes)
            .map_err(|e| e.with_context(format!("failed to save to {}", path.display())))?;

        self.path = Some(path.to_path_buf());
        self.unsaved_changes = false;

        info!(path = %path.display(), "saved container");
        Ok(())
    }
}

impl Default for PasswordManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PasswordManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordManager")
            .field("text", &"<redacted>")
            .field("path", &self.path)
            .field("unsaved_changes", &self.unsaved_changes)
            .finish()
    }
}

/// Write `contents` to `path` via tempfile + fsync + rename
fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp_file =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| io_error(path, "failed to create tempfile", e))?;
    debug!(tempfile = %temp_file.path().display(), "writing container to tempfile");

    temp_file
        .write_all(contents)
        .map_err(|e| io_error(path, "failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file
        .flush()
        .map_err(|e| io_error(path, "failed to flush tempfile", e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| io_error(path, "failed to sync file prior to rename", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp_file
            .as_file()
            .metadata()
            .map_err(|e| io_error(path, "failed to get tempfile metadata", e))?
            .permissions();
        perms.set_mode(0o600);
        temp_file
            .as_file()
            .set_permissions(perms)
            .map_err(|e| io_error(path, "failed to set tempfile permissions", e))?;
    }

    // On failure the tempfile is dropped, which deletes it.
    temp_file.persist(path).map_err(|e| {
        io_error(
            path,
            format!("failed to rename to target file {}", path.display()),
            e.error,
        )
    })?;
    Ok(())
}

fn io_error(path: &Path, msg: impl Into<String>, err: io::Error) -> PmanError {
    PmanError::with_kind_and_source(ErrorKind::Io, msg, err).with_path(path)
}

fn read_error(path: &Path, err: io::Error) -> PmanError {
    io_error(path, format!("failed to read from {}", path.display()), err)
}
