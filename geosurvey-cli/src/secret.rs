//! `encrypt-secret` command.

use clap::Parser;
use geosurvey_data::VaultKey;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::store::resolve_vault;
use crate::{ARG_VAULT_KEY, CliError};

pub(crate) const ARG_SECRET: &str = "secret";
pub(crate) const ENV_SECRET: &str = "GEOSURVEY_CMDS_ENCRYPT_SECRET_SECRET";

/// CLI arguments for the `encrypt-secret` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Print `base64(IV || AES-256-CBC(secret))` for a backend \
                 secret, using the same vault key the stores use. With \
                 --generate-key, print a fresh random vault key instead.",
    about = "Encrypt a secret or generate a vault key"
)]
#[ortho_config(prefix = "GEOSURVEY")]
pub(crate) struct EncryptSecretArgs {
    /// Plaintext to encrypt.
    #[arg(value_name = "secret")]
    #[serde(default)]
    pub(crate) secret: Option<String>,
    /// Print a new base64 vault key and exit.
    #[arg(long)]
    #[serde(default)]
    pub(crate) generate_key: bool,
    /// Base64 vault key; defaults to `GEOSURVEY_VAULT_KEY`.
    #[arg(long = ARG_VAULT_KEY, value_name = "base64")]
    #[serde(default)]
    pub(crate) vault_key: Option<String>,
}

pub(super) fn run_encrypt_secret(
    args: EncryptSecretArgs,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    run_encrypt_secret_with(merged, out)
}

pub(crate) fn run_encrypt_secret_with(
    args: EncryptSecretArgs,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    if args.generate_key {
        return writeln!(out, "{}", VaultKey::generate().to_base64()).map_err(CliError::WriteOutput);
    }
    let secret = args.secret.ok_or(CliError::MissingArgument {
        field: ARG_SECRET,
        env: ENV_SECRET,
    })?;
    let vault = resolve_vault(args.vault_key.as_deref())?;
    writeln!(out, "{}", vault.encrypt(&secret)).map_err(CliError::WriteOutput)
}
