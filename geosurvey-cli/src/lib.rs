//! Command-line interface for operating geosurvey stores and exports.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use std::io::Write;

mod error;
mod export;
mod provision;
mod register;
mod secret;
mod store;
mod submit;

pub use error::CliError;

use export::ExportArgs;
use provision::ProvisionArgs;
use register::RegisterArgs;
use secret::EncryptSecretArgs;
use submit::SubmitArgs;

pub(crate) const ARG_ADMIN_DB: &str = "admin-db";
pub(crate) const ARG_VAULT_KEY: &str = "vault-key";
pub(crate) const ARG_FORM_ID: &str = "form-id";

/// Run the geosurvey CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when arguments, configuration, or the selected
/// command fail.
pub fn run() -> Result<(), CliError> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // `--help` and `--version` arrive as errors that print to stdout.
        Err(err) if !err.use_stderr() => {
            err.print().map_err(CliError::WriteOutput)?;
            return Ok(());
        }
        Err(err) => return Err(CliError::ArgumentParsing(err)),
    };
    let mut stdout = std::io::stdout().lock();
    dispatch(cli.command, &mut stdout)
}

fn dispatch(command: Command, out: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Register(args) => register::run_register(args, out),
        Command::Submit(args) => submit::run_submit(args, out),
        Command::Export(args) => export::run_export(args, out),
        Command::EncryptSecret(args) => secret::run_encrypt_secret(args, out),
        Command::Provision(args) => provision::run_provision(args, out),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "geosurvey",
    about = "Operate survey stores: register forms, store submissions, export responses",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add or update a form in the admin catalogue.
    Register(RegisterArgs),
    /// Validate and store one submission.
    Submit(SubmitArgs),
    /// Export a form's responses.
    Export(ExportArgs),
    /// Encrypt a backend secret for storage, or generate a vault key.
    EncryptSecret(EncryptSecretArgs),
    /// Print or run the DDL for a form's remote response table.
    Provision(ProvisionArgs),
}

#[cfg(test)]
mod tests;
