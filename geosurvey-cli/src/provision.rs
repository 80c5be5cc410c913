//! `provision` command: create or describe a form's remote response table.

use camino::Utf8PathBuf;
use clap::Parser;
use geosurvey_core::{Form, StorageType};
use geosurvey_data::{AdminStore, PostgresConfig, PostgresDirectStore, sql};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::store::{open_admin, require_existing, resolve_vault};
use crate::{ARG_ADMIN_DB, ARG_FORM_ID, ARG_VAULT_KEY, CliError};

pub(crate) const ENV_PROVISION_FORM_ID: &str = "GEOSURVEY_CMDS_PROVISION_FORM_ID";
pub(crate) const ENV_PROVISION_ADMIN_DB: &str = "GEOSURVEY_CMDS_PROVISION_ADMIN_DB";

/// CLI arguments for the `provision` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Print the CREATE TABLE script for a form stored in Supabase \
                 or PostgreSQL. With --execute, run it against the owner's \
                 PostgreSQL database using the stored credentials.",
    about = "Provision a remote response table"
)]
#[ortho_config(prefix = "GEOSURVEY")]
pub(crate) struct ProvisionArgs {
    /// Form whose table to provision.
    #[arg(long = ARG_FORM_ID, value_name = "id")]
    #[serde(default)]
    pub(crate) form_id: Option<i64>,
    /// Run the script instead of printing it (PostgreSQL only).
    #[arg(long)]
    #[serde(default)]
    pub(crate) execute: bool,
    /// Path to the admin SQLite catalogue.
    #[arg(long = ARG_ADMIN_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) admin_db: Option<Utf8PathBuf>,
    /// Base64 vault key; defaults to `GEOSURVEY_VAULT_KEY`.
    #[arg(long = ARG_VAULT_KEY, value_name = "base64")]
    #[serde(default)]
    pub(crate) vault_key: Option<String>,
}

/// Resolved `provision` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProvisionConfig {
    pub(crate) form_id: i64,
    pub(crate) execute: bool,
    pub(crate) admin_db: Utf8PathBuf,
    pub(crate) vault_key: Option<String>,
}

impl TryFrom<ProvisionArgs> for ProvisionConfig {
    type Error = CliError;

    fn try_from(args: ProvisionArgs) -> Result<Self, Self::Error> {
        let form_id = args.form_id.ok_or(CliError::MissingArgument {
            field: ARG_FORM_ID,
            env: ENV_PROVISION_FORM_ID,
        })?;
        let admin_db = args.admin_db.ok_or(CliError::MissingArgument {
            field: ARG_ADMIN_DB,
            env: ENV_PROVISION_ADMIN_DB,
        })?;
        Ok(Self {
            form_id,
            execute: args.execute,
            admin_db,
            vault_key: args.vault_key,
        })
    }
}

pub(super) fn run_provision(args: ProvisionArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    run_provision_with(ProvisionConfig::try_from(merged)?, out)
}

pub(crate) fn run_provision_with(
    config: ProvisionConfig,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    require_existing(&config.admin_db, ARG_ADMIN_DB)?;
    let admin = open_admin(&config.admin_db)?;
    let form = admin
        .load_form(config.form_id)?
        .ok_or(CliError::UnknownForm {
            form_id: config.form_id,
        })?;

    match form.storage_type {
        StorageType::Admin => writeln!(
            out,
            "form {} stores responses in the admin catalogue; nothing to provision",
            form.id
        )
        .map_err(CliError::WriteOutput),
        StorageType::Postgres if config.execute => {
            execute_postgres(&admin, &form, config.vault_key.as_deref())?;
            writeln!(out, "created table {} for form {}", form.table_name, form.id)
                .map_err(CliError::WriteOutput)
        }
        StorageType::Supabase | StorageType::Postgres => {
            if config.execute {
                log::warn!(
                    "form {} uses the REST API, which cannot run DDL; printing the script instead",
                    form.id
                );
            }
            writeln!(out, "{}", sql::create_table_sql(&form)).map_err(CliError::WriteOutput)
        }
    }
}

fn execute_postgres(
    admin: &AdminStore,
    form: &Form,
    vault_key: Option<&str>,
) -> Result<(), CliError> {
    let vault = resolve_vault(vault_key)?;
    let credentials = admin
        .load_credentials(form.owner_id, StorageType::Postgres, &vault)?
        .filter(|credentials| credentials.is_complete())
        .ok_or(CliError::MissingCredentials {
            owner_id: form.owner_id,
            storage_type: StorageType::Postgres,
        })?;
    let provision_error = |source| CliError::Provision {
        form_id: form.id,
        source,
    };
    let store = PostgresDirectStore::from_credentials(&credentials, PostgresConfig::default())
        .map_err(provision_error)?;
    store.provision(form).map_err(provision_error)
}
