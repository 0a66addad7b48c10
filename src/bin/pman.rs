//! pman CLI - password-protected text containers
//!
//! Command-line front end for creating, reading and updating `.pman`
//! containers.

use clap::{Parser, Subcommand};
use std::error::Error as StdError;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pman::file_ops;
use pman::passphrase::{PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader};
use pman::{ErrorKind, PmanError};

#[derive(Parser)]
#[command(name = "pman")]
#[command(version)]
#[command(about = "Password-protected text containers.", long_about = None)]
struct Cli {
    /// Read the password from stdin (all of it, as raw bytes) instead of
    /// prompting on the terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a text file into a new container
    #[command(alias = "e")]
    Encrypt {
        /// Path to the UTF-8 text file to encrypt
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to write the container to (conventionally *.pman)
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Decrypt a container into a text file
    #[command(alias = "d")]
    Decrypt {
        /// Path to the container to decrypt
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to write the decrypted text to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Replace the text of an existing container, after checking that the
    /// password opens it.
    #[command(alias = "u")]
    Update {
        /// Path to the UTF-8 text file holding the new content
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the existing container to replace
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Check that a container opens with the password, writing nothing
    #[command(alias = "v")]
    Verify {
        /// Path to the container to check
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },
}

/// One exit code per error kind
fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::UnsupportedAlgorithm => 1,
        ErrorKind::BadPassword => 2,
        ErrorKind::InvalidContainer => 3,
        ErrorKind::Io => 4,
        ErrorKind::PassphraseUnavailable => 5,
        ErrorKind::InvalidText => 6,
    }
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with anything written to stdout.
    // RUST_LOG accepts `trace`, `debug`, `info`, `warn` and `error`.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Unable to set global default subscriber");
    }

    let mut reader = get_passphrase_reader(cli.passphrase_stdin);
    let result = match cli.command {
        Commands::Encrypt { input, output } => {
            file_ops::encrypt_file(&input, &output, &mut *reader)
        }
        Commands::Decrypt { input, output } => {
            file_ops::decrypt_file(&input, &output, &mut *reader)
        }
        Commands::Update { input, output } => {
            file_ops::update_file(&input, &output, &mut *reader)
        }
        Commands::Verify { input } => {
            let result = file_ops::verify_file(&input, &mut *reader);
            if result.is_ok() {
                println!("{}: OK", input.display());
            }
            result
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", render(&e));
        process::exit(exit_code(e.kind));
    }
}

/// The message followed by each source in turn
fn render(err: &PmanError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

fn get_passphrase_reader(use_stdin: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPassphraseReader::new())
    }
}
