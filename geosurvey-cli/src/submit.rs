//! `submit` command: route one JSON submission to its form's backend.

use camino::Utf8PathBuf;
use clap::Parser;
use geosurvey_core::Submission;
use geosurvey_data::{CredentialResolver, StorageRouter};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::store::{open_admin, read_json, require_existing, resolve_vault};
use crate::{ARG_ADMIN_DB, ARG_FORM_ID, ARG_VAULT_KEY, CliError};

pub(crate) const ARG_SUBMISSION: &str = "submission";
pub(crate) const ENV_SUBMIT_SUBMISSION: &str = "GEOSURVEY_CMDS_SUBMIT_SUBMISSION";
pub(crate) const ENV_SUBMIT_FORM_ID: &str = "GEOSURVEY_CMDS_SUBMIT_FORM_ID";
pub(crate) const ENV_SUBMIT_ADMIN_DB: &str = "GEOSURVEY_CMDS_SUBMIT_ADMIN_DB";

/// CLI arguments for the `submit` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Validate a JSON submission against its form and store it in \
                 the form's backend. The submission carries `data`, and \
                 optionally `latitude`, `longitude`, `accuracy`, and \
                 `client_ip`.",
    about = "Store one submission"
)]
#[ortho_config(prefix = "GEOSURVEY")]
pub(crate) struct SubmitArgs {
    /// Path to a JSON submission.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) submission: Option<Utf8PathBuf>,
    /// Target form.
    #[arg(long = ARG_FORM_ID, value_name = "id")]
    #[serde(default)]
    pub(crate) form_id: Option<i64>,
    /// Path to the admin SQLite catalogue.
    #[arg(long = ARG_ADMIN_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) admin_db: Option<Utf8PathBuf>,
    /// Base64 vault key; defaults to `GEOSURVEY_VAULT_KEY`.
    #[arg(long = ARG_VAULT_KEY, value_name = "base64")]
    #[serde(default)]
    pub(crate) vault_key: Option<String>,
}

/// Resolved `submit` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SubmitConfig {
    pub(crate) submission: Utf8PathBuf,
    pub(crate) form_id: i64,
    pub(crate) admin_db: Utf8PathBuf,
    pub(crate) vault_key: Option<String>,
}

impl TryFrom<SubmitArgs> for SubmitConfig {
    type Error = CliError;

    fn try_from(args: SubmitArgs) -> Result<Self, Self::Error> {
        let submission = args.submission.ok_or(CliError::MissingArgument {
            field: ARG_SUBMISSION,
            env: ENV_SUBMIT_SUBMISSION,
        })?;
        let form_id = args.form_id.ok_or(CliError::MissingArgument {
            field: ARG_FORM_ID,
            env: ENV_SUBMIT_FORM_ID,
        })?;
        let admin_db = args.admin_db.ok_or(CliError::MissingArgument {
            field: ARG_ADMIN_DB,
            env: ENV_SUBMIT_ADMIN_DB,
        })?;
        Ok(Self {
            submission,
            form_id,
            admin_db,
            vault_key: args.vault_key,
        })
    }
}

pub(super) fn run_submit(args: SubmitArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    run_submit_with(SubmitConfig::try_from(merged)?, out)
}

pub(crate) fn run_submit_with(config: SubmitConfig, out: &mut dyn Write) -> Result<(), CliError> {
    require_existing(&config.submission, ARG_SUBMISSION)?;
    require_existing(&config.admin_db, ARG_ADMIN_DB)?;
    let submission: Submission = read_json(&config.submission)?;

    let admin = open_admin(&config.admin_db)?;
    let form = admin
        .load_form(config.form_id)?
        .ok_or(CliError::UnknownForm {
            form_id: config.form_id,
        })?;
    let vault = resolve_vault(config.vault_key.as_deref())?;
    let router = StorageRouter::new(&admin, CredentialResolver::new(&admin, &vault));

    if !router.save(form.id, &submission)? {
        return Err(CliError::NotStored {
            form_id: form.id,
            storage_type: form.storage_type,
        });
    }
    writeln!(out, "stored response for form {} in {}", form.id, form.storage_type)
        .map_err(CliError::WriteOutput)
}
