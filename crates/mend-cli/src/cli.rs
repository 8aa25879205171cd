use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use mend_core::VERSION;

/// Mend - an encrypted, append-only personal log with file encryption
#[derive(Parser)]
#[command(name = "mend")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, env = "MEND_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose diagnostics on stderr
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a key pair and write a new config
    Init(InitArgs),

    /// Adopt an existing DER-encoded key pair
    Import(ImportArgs),

    /// Materialize the private key in the working directory
    Unlock,

    /// Securely delete the working key material
    Lock,

    /// Show configuration and lock state
    Status,

    /// Append an entry to the current log
    Log(LogArgs),

    /// Decrypt and print a log
    Read(ReadArgs),

    /// List logs
    Logs,

    /// Switch the current log
    Use(UseArgs),

    /// Encrypt a file into the encrypted-files directory
    Encrypt(FileArgs),

    /// Decrypt an envelope file into the decrypted-files directory
    Decrypt(FileArgs),

    /// Merge two logs chronologically
    Merge(MergeArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// RSA modulus size in bits
    #[arg(long, value_name = "N")]
    pub modulus_bits: Option<usize>,

    /// Asymmetric padding scheme (oaep-sha256, pkcs1v15)
    #[arg(long, value_name = "SCHEME")]
    pub scheme: Option<String>,

    /// Session key size in bits (128, 192, 256)
    #[arg(long, value_name = "N")]
    pub key_bits: Option<usize>,

    /// Replace an existing identity
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `import` command
#[derive(Args)]
pub struct ImportArgs {
    /// PKCS#8 DER private key
    #[arg(value_name = "PRIVATE_DER")]
    pub private_key: PathBuf,

    /// SubjectPublicKeyInfo DER public key
    #[arg(value_name = "PUBLIC_DER")]
    pub public_key: PathBuf,

    /// Asymmetric padding scheme (oaep-sha256, pkcs1v15)
    #[arg(long, value_name = "SCHEME")]
    pub scheme: Option<String>,

    /// Replace an existing identity
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `log` command
#[derive(Args)]
pub struct LogArgs {
    /// Entry text (reads stdin otherwise)
    #[arg(long)]
    pub body: Option<String>,
}

/// Arguments for the `read` command
#[derive(Args)]
pub struct ReadArgs {
    /// Log name or path (defaults to the current log)
    #[arg(value_name = "LOG")]
    pub log: Option<String>,
}

/// Arguments for the `use` command
#[derive(Args)]
pub struct UseArgs {
    /// Log name
    #[arg(value_name = "NAME")]
    pub name: String,
}

/// Arguments for `encrypt` and `decrypt`
#[derive(Args)]
pub struct FileArgs {
    /// File to process
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Arguments for the `merge` command
#[derive(Args)]
pub struct MergeArgs {
    /// First log name or path
    #[arg(value_name = "FIRST")]
    pub first: String,

    /// Second log name or path
    #[arg(value_name = "SECOND")]
    pub second: String,

    /// Destination log name or path (defaults to FIRST)
    #[arg(short, long, value_name = "DEST")]
    pub output: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_merge_args_parse() {
        let cli = Cli::parse_from(["mend", "merge", "a", "b", "--output", "c"]);
        match cli.command {
            Some(Commands::Merge(args)) => {
                assert_eq!(args.first, "a");
                assert_eq!(args.second, "b");
                assert_eq!(args.output.as_deref(), Some("c"));
            }
            _ => panic!("expected merge"),
        }
    }
}
