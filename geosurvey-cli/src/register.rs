//! `register` command: load a form definition into the admin catalogue.

use camino::Utf8PathBuf;
use clap::Parser;
use geosurvey_core::{
    BackendCredentials, DEFAULT_POSTGRES_PORT, FieldConfig, Form, StorageType,
};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::store::{open_admin, read_json, require_existing, resolve_vault};
use crate::{ARG_ADMIN_DB, ARG_VAULT_KEY, CliError};

pub(crate) const ARG_DEFINITION: &str = "definition";
pub(crate) const ENV_REGISTER_DEFINITION: &str = "GEOSURVEY_CMDS_REGISTER_DEFINITION";
pub(crate) const ENV_REGISTER_ADMIN_DB: &str = "GEOSURVEY_CMDS_REGISTER_ADMIN_DB";

/// CLI arguments for the `register` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Register or update a form from a JSON definition. Field and \
                 table names are sanitised on the way in. Credentials embedded \
                 in the definition are encrypted with the vault key before \
                 they are stored.",
    about = "Register a form definition"
)]
#[ortho_config(prefix = "GEOSURVEY")]
pub(crate) struct RegisterArgs {
    /// Path to a JSON form definition.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) definition: Option<Utf8PathBuf>,
    /// Path to the admin SQLite catalogue.
    #[arg(long = ARG_ADMIN_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) admin_db: Option<Utf8PathBuf>,
    /// Base64 vault key; defaults to `GEOSURVEY_VAULT_KEY`.
    #[arg(long = ARG_VAULT_KEY, value_name = "base64")]
    #[serde(default)]
    pub(crate) vault_key: Option<String>,
}

/// Resolved `register` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RegisterConfig {
    pub(crate) definition: Utf8PathBuf,
    pub(crate) admin_db: Utf8PathBuf,
    pub(crate) vault_key: Option<String>,
}

impl TryFrom<RegisterArgs> for RegisterConfig {
    type Error = CliError;

    fn try_from(args: RegisterArgs) -> Result<Self, Self::Error> {
        let definition = args.definition.ok_or(CliError::MissingArgument {
            field: ARG_DEFINITION,
            env: ENV_REGISTER_DEFINITION,
        })?;
        let admin_db = args.admin_db.ok_or(CliError::MissingArgument {
            field: ARG_ADMIN_DB,
            env: ENV_REGISTER_ADMIN_DB,
        })?;
        Ok(Self {
            definition,
            admin_db,
            vault_key: args.vault_key,
        })
    }
}

/// On-disk shape of a form definition. No `Debug`: it may carry secrets.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FormDefinition {
    id: i64,
    owner_id: i64,
    public_code: String,
    storage_type: StorageType,
    table_name: String,
    fields: Vec<FieldConfig>,
    #[serde(default)]
    max_responses: u32,
    #[serde(default)]
    credentials: Option<CredentialsDefinition>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CredentialsDefinition {
    Supabase {
        url: String,
        api_key: String,
    },
    Postgres {
        host: String,
        #[serde(default = "default_port")]
        port: u16,
        database: String,
        user: String,
        password: String,
    },
}

const fn default_port() -> u16 {
    DEFAULT_POSTGRES_PORT
}

impl From<CredentialsDefinition> for BackendCredentials {
    fn from(definition: CredentialsDefinition) -> Self {
        match definition {
            CredentialsDefinition::Supabase { url, api_key } => Self::Supabase { url, api_key },
            CredentialsDefinition::Postgres {
                host,
                port,
                database,
                user,
                password,
            } => Self::Postgres {
                host,
                port,
                database,
                user,
                password,
            },
        }
    }
}

const fn credentials_type(credentials: &BackendCredentials) -> StorageType {
    match credentials {
        BackendCredentials::Supabase { .. } => StorageType::Supabase,
        BackendCredentials::Postgres { .. } => StorageType::Postgres,
    }
}

pub(super) fn run_register(args: RegisterArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    run_register_with(RegisterConfig::try_from(merged)?, out)
}

pub(crate) fn run_register_with(
    config: RegisterConfig,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    require_existing(&config.definition, ARG_DEFINITION)?;
    let definition: FormDefinition = read_json(&config.definition)?;
    let form = Form::new(
        definition.id,
        definition.owner_id,
        definition.public_code,
        definition.storage_type,
        &definition.table_name,
        definition.fields,
    )
    .map_err(|source| CliError::InvalidForm {
        path: config.definition.clone(),
        source,
    })?
    .with_max_responses(definition.max_responses);

    let credentials = definition.credentials.map(BackendCredentials::from);
    if let Some(supplied) = credentials.as_ref().map(credentials_type) {
        if supplied != form.storage_type {
            return Err(CliError::CredentialsMismatch {
                form_id: form.id,
                expected: form.storage_type,
                supplied,
            });
        }
    }

    // Resolve the key first so a bad key leaves the catalogue untouched.
    let vault = match credentials {
        Some(_) => Some(resolve_vault(config.vault_key.as_deref())?),
        None => None,
    };

    let admin = open_admin(&config.admin_db)?;
    admin.save_form(&form)?;
    if let (Some(credentials), Some(vault)) = (credentials, vault) {
        admin.store_credentials(form.owner_id, &credentials, &vault)?;
    }
    log::info!("registered form {} ({})", form.id, form.storage_type);
    writeln!(
        out,
        "registered form {} as {} (table {}, {} fields)",
        form.id,
        form.storage_type,
        form.table_name,
        form.fields.len()
    )
    .map_err(CliError::WriteOutput)
}
