//! File-level commands
//!
//! These glue plaintext files, passphrase readers and [`PasswordManager`]
//! together for the command line. Container semantics live in the manager;
//! this module only moves plaintext in and out of ordinary files.

use crate::container::has_pman_extension;
use crate::error::{ErrorKind, PmanError, Result};
use crate::manager::PasswordManager;
use crate::passphrase::{CachingPassphraseReader, PassphraseReader};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::warn;
use zeroize::Zeroizing;

/// Encrypt a UTF-8 text file into a new container
///
/// Reads plaintext from `plain_path`, encrypts it using a passphrase from
/// `passphrase_reader`, and writes the container to `crypt_path`.
pub fn encrypt_file(
    plain_path: &Path,
    crypt_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    warn_on_extension(crypt_path);

    let text = read_text(plain_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;

    let mut manager = PasswordManager::with_text(text.as_str());
    manager.save(crypt_path, passphrase)
}

/// Decrypt a container into a plaintext file
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn decrypt_file(
    crypt_path: &Path,
    plain_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    warn_on_extension(crypt_path);

    let passphrase = passphrase_reader.read_passphrase()?;
    let mut manager = PasswordManager::new();
    manager.open(crypt_path, passphrase)?;

    write_file_secure(plain_path, manager.text().as_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", plain_path.display())))
}

/// Replace the text of an existing container, keeping its password
///
/// The existing container is opened first, so a mistyped password fails
/// with `BadPassword` instead of silently re-keying the file. The new
/// container replaces the old one atomically.
pub fn update_file(
    plain_path: &Path,
    crypt_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    warn_on_extension(crypt_path);

    let text = read_text(plain_path)?;
    let mut reader = CachingPassphraseReader::new(passphrase_reader);

    let mut manager = PasswordManager::new();
    manager.open(crypt_path, reader.read_passphrase()?)?;

    manager.set_text(text.as_str());
    manager.save(crypt_path, reader.read_passphrase()?)
}

/// Check that `crypt_path` is a container that opens with the passphrase
///
/// Nothing is written.
pub fn verify_file(crypt_path: &Path, passphrase_reader: &mut dyn PassphraseReader) -> Result<()> {
    warn_on_extension(crypt_path);

    let passphrase = passphrase_reader.read_passphrase()?;
    PasswordManager::new().open(crypt_path, passphrase)
}

fn warn_on_extension(crypt_path: &Path) {
    if !has_pman_extension(crypt_path) {
        warn!(path = %crypt_path.display(), "container path does not end in .pman");
    }
}

/// Read a plaintext file that must hold UTF-8 text
fn read_text(path: &Path) -> Result<Zeroizing<String>> {
    let bytes = Zeroizing::new(fs::read(path).map_err(|e| read_error(path, e))?);
    let text = std::str::from_utf8(&bytes).map_err(|e| {
        PmanError::with_kind_and_source(
            ErrorKind::InvalidText,
            format!("{} is not valid UTF-8 text", path.display()),
            e,
        )
        .with_path(path)
    })?;
    Ok(Zeroizing::new(text.to_owned()))
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| write_error(path, format!("failed to open {}", path.display()), e))?;

        file.write_all(contents)
            .map_err(|e| write_error(path, format!("failed to write {}", path.display()), e))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents)
            .map_err(|e| write_error(path, format!("failed to write {}", path.display()), e))?;
        Ok(())
    }
}

fn write_error(path: &Path, msg: String, err: io::Error) -> PmanError {
    PmanError::with_kind_and_source(ErrorKind::Io, msg, err).with_path(path)
}

fn read_error(path: &Path, err: io::Error) -> PmanError {
    PmanError::with_kind_and_source(
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
    .with_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypt::encrypt_deterministic;
    use crate::passphrase::{ConstantPassphraseReader, ReaderPassphraseReader};
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        let crypt_path = temp_dir.path().join("crypt.pman");
        let decrypted_path = temp_dir.path().join("decrypted.txt");

        let plaintext = "Hello, pman!\nemail: hunter2\n";
        fs::write(&plain_path, plaintext).unwrap();

        let mut reader = ConstantPassphraseReader::new(b"test password".to_vec());
        encrypt_file(&plain_path, &crypt_path, &mut reader).unwrap();
        assert!(crypt_path.exists());

        let mut reader = ConstantPassphraseReader::new(b"test password".to_vec());
        decrypt_file(&crypt_path, &decrypted_path, &mut reader).unwrap();
        let decrypted = fs::read_to_string(&decrypted_path).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_rejects_non_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("binary.bin");
        let crypt_path = temp_dir.path().join("binary.pman");
        fs::write(&plain_path, [0xffu8, 0xfe, 0x00]).unwrap();

        let mut reader = ConstantPassphraseReader::new(b"test".to_vec());
        let err = encrypt_file(&plain_path, &crypt_path, &mut reader)
            .expect_err("expected UTF-8 failure");

        assert_eq!(err.kind, ErrorKind::InvalidText);
        assert_eq!(err.path(), Some(plain_path.as_path()));
        assert!(!crypt_path.exists());
    }

    #[test]
    fn test_update_file() {
        let temp_dir = TempDir::new().unwrap();
        let plain1_path = temp_dir.path().join("plain1.txt");
        let plain2_path = temp_dir.path().join("plain2.txt");
        let crypt_path = temp_dir.path().join("crypt.pman");

        fs::write(&plain1_path, "Initial content").unwrap();
        let mut reader = ConstantPassphraseReader::new(b"test password".to_vec());
        encrypt_file(&plain1_path, &crypt_path, &mut reader).unwrap();

        fs::write(&plain2_path, "Updated content").unwrap();
        let mut reader = ConstantPassphraseReader::new(b"test password".to_vec());
        update_file(&plain2_path, &crypt_path, &mut reader).unwrap();

        let decrypted_path = temp_dir.path().join("decrypted.txt");
        let mut reader = ConstantPassphraseReader::new(b"test password".to_vec());
        decrypt_file(&crypt_path, &decrypted_path, &mut reader).unwrap();

        assert_eq!(fs::read_to_string(&decrypted_path).unwrap(), "Updated content");
    }

    /// A reader that can only be drained once must still be enough for an
    /// update, which needs the password for both open and save.
    #[test]
    fn test_update_reads_passphrase_once() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        let crypt_path = temp_dir.path().join("crypt.pman");

        fs::write(&plain_path, "v1").unwrap();
        let mut reader = ConstantPassphraseReader::new(b"stdin pw".to_vec());
        encrypt_file(&plain_path, &crypt_path, &mut reader).unwrap();

        fs::write(&plain_path, "v2").unwrap();
        let mut reader = ReaderPassphraseReader::new(Box::new(&b"stdin pw"[..]));
        update_file(&plain_path, &crypt_path, &mut reader).unwrap();

        let mut reader = ConstantPassphraseReader::new(b"stdin pw".to_vec());
        verify_file(&crypt_path, &mut reader).unwrap();
    }

    #[test]
    fn test_update_with_wrong_passphrase_fails() {
        let temp_dir = TempDir::new().unwrap();
        let plain2_path = temp_dir.path().join("plain2.txt");
        let crypt_path = temp_dir.path().join("crypt.pman");

        // With this salt and IV the wrong password leaves invalid padding
        let before =
            encrypt_deterministic(b"correct password", b"Initial", &[1u8; 16], &[2u8; 16]).unwrap();
        fs::write(&crypt_path, &before).unwrap();

        fs::write(&plain2_path, "Updated").unwrap();
        let mut reader = ConstantPassphraseReader::new(b"wrong password".to_vec());
        let err = update_file(&plain2_path, &crypt_path, &mut reader)
            .expect_err("expected bad password");

        assert_eq!(err.kind, ErrorKind::BadPassword);
        assert_eq!(fs::read(&crypt_path).unwrap(), before);
    }

    #[test]
    fn test_verify_file() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        let crypt_path = temp_dir.path().join("crypt.pman");

        fs::write(&plain_path, "check me").unwrap();
        let bytes = encrypt_deterministic(b"right", b"check me", &[1u8; 16], &[2u8; 16]).unwrap();
        fs::write(&crypt_path, &bytes).unwrap();

        let mut reader = ConstantPassphraseReader::new(b"right".to_vec());
        verify_file(&crypt_path, &mut reader).unwrap();

        let mut reader = ConstantPassphraseReader::new(b"wrong".to_vec());
        let err = verify_file(&crypt_path, &mut reader).expect_err("expected bad password");
        assert_eq!(err.kind, ErrorKind::BadPassword);

        let mut reader = ConstantPassphraseReader::new(b"right".to_vec());
        let err = verify_file(&plain_path, &mut reader).expect_err("expected invalid container");
        assert_eq!(err.kind, ErrorKind::InvalidContainer);
    }

    #[test]
    #[cfg(unix)]
    fn test_decrypted_file_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        let crypt_path = temp_dir.path().join("crypt.pman");
        let decrypted_path = temp_dir.path().join("decrypted.txt");

        fs::write(&plain_path, "test").unwrap();

        let mut reader = ConstantPassphraseReader::new(b"test".to_vec());
        encrypt_file(&plain_path, &crypt_path, &mut reader).unwrap();

        let mut reader = ConstantPassphraseReader::new(b"test".to_vec());
        decrypt_file(&crypt_path, &decrypted_path, &mut reader).unwrap();

        let permissions = fs::metadata(&decrypted_path).unwrap().permissions();
        assert_eq!(permissions.mode() & 0o777, 0o600);
    }

    #[test]
    fn test_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("empty.txt");
        let crypt_path = temp_dir.path().join("empty.pman");
        let decrypted_path = temp_dir.path().join("decrypted.txt");

        fs::write(&plain_path, b"").unwrap();

        let mut reader = ConstantPassphraseReader::new(b"test".to_vec());
        encrypt_file(&plain_path, &crypt_path, &mut reader).unwrap();

        let mut reader = ConstantPassphraseReader::new(b"test".to_vec());
        decrypt_file(&crypt_path, &decrypted_path, &mut reader).unwrap();

        assert_eq!(fs::read(&decrypted_path).unwrap(), b"");
    }

    #[test]
    fn test_missing_input() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.txt");
        let crypt_path = temp_dir.path().join("out.pman");

        let mut reader = ConstantPassphraseReader::new(b"test".to_vec());
        let err = encrypt_file(&missing, &crypt_path, &mut reader).expect_err("expected io error");

        assert_eq!(err.kind, ErrorKind::Io);
        assert_eq!(err.path(), Some(missing.as_path()));
    }
}
