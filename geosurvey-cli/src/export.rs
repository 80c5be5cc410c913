//! `export` command: render a form's responses into one export format.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use geosurvey_data::{CredentialResolver, ExportOutcome, ExportRequest, StorageRouter};
use geosurvey_export::{ExportArtifact, ExportEngine, ExportFormat};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::store::{open_admin, require_existing, resolve_vault};
use crate::{ARG_ADMIN_DB, ARG_FORM_ID, ARG_VAULT_KEY, CliError};

pub(crate) const ARG_FORMAT: &str = "format";
pub(crate) const ARG_OUTPUT_DIR: &str = "output-dir";
pub(crate) const ENV_EXPORT_FORM_ID: &str = "GEOSURVEY_CMDS_EXPORT_FORM_ID";
pub(crate) const ENV_EXPORT_ADMIN_DB: &str = "GEOSURVEY_CMDS_EXPORT_ADMIN_DB";

/// CLI arguments for the `export` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Export up to 10 000 of a form's newest responses as csv, \
                 json, geojson, kml, gpkg, or shp. With --output-dir the file \
                 is written there under its attachment name; otherwise the \
                 bytes go to stdout.",
    about = "Export a form's responses"
)]
#[ortho_config(prefix = "GEOSURVEY")]
pub(crate) struct ExportArgs {
    /// Form to export.
    #[arg(long = ARG_FORM_ID, value_name = "id")]
    #[serde(default)]
    pub(crate) form_id: Option<i64>,
    /// Format token; defaults to `csv`.
    #[arg(long = ARG_FORMAT, value_name = "token")]
    #[serde(default)]
    pub(crate) format: Option<String>,
    /// Directory receiving the export file.
    #[arg(long = ARG_OUTPUT_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) output_dir: Option<Utf8PathBuf>,
    /// Path to the admin SQLite catalogue.
    #[arg(long = ARG_ADMIN_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) admin_db: Option<Utf8PathBuf>,
    /// Base64 vault key; defaults to `GEOSURVEY_VAULT_KEY`.
    #[arg(long = ARG_VAULT_KEY, value_name = "base64")]
    #[serde(default)]
    pub(crate) vault_key: Option<String>,
}

/// Resolved `export` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExportConfig {
    pub(crate) form_id: i64,
    pub(crate) format: String,
    pub(crate) output_dir: Option<Utf8PathBuf>,
    pub(crate) admin_db: Utf8PathBuf,
    pub(crate) vault_key: Option<String>,
}

impl TryFrom<ExportArgs> for ExportConfig {
    type Error = CliError;

    fn try_from(args: ExportArgs) -> Result<Self, Self::Error> {
        let form_id = args.form_id.ok_or(CliError::MissingArgument {
            field: ARG_FORM_ID,
            env: ENV_EXPORT_FORM_ID,
        })?;
        let admin_db = args.admin_db.ok_or(CliError::MissingArgument {
            field: ARG_ADMIN_DB,
            env: ENV_EXPORT_ADMIN_DB,
        })?;
        let format = args
            .format
            .unwrap_or_else(|| ExportFormat::Csv.token().to_owned());
        Ok(Self {
            form_id,
            format,
            output_dir: args.output_dir,
            admin_db,
            vault_key: args.vault_key,
        })
    }
}

pub(super) fn run_export(args: ExportArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    run_export_with(ExportConfig::try_from(merged)?, &ExportEngine::new(), out)
}

pub(crate) fn run_export_with(
    config: ExportConfig,
    engine: &ExportEngine,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    require_existing(&config.admin_db, ARG_ADMIN_DB)?;
    let admin = open_admin(&config.admin_db)?;
    let vault = resolve_vault(config.vault_key.as_deref())?;
    let router = StorageRouter::new(&admin, CredentialResolver::new(&admin, &vault));

    let mut request = ExportRequest::new(config.form_id, config.format.as_str());
    match request.run(&router, engine) {
        ExportOutcome::File(artifact) => match config.output_dir.as_deref() {
            Some(dir) => write_to_dir(dir, &artifact, out),
            None => request
                .stream_to(&artifact, out)
                .map_err(CliError::WriteOutput),
        },
        ExportOutcome::Redirect { location, error } => {
            log::info!("export of form {} redirected to {location}", config.form_id);
            Err(CliError::Export {
                form_id: config.form_id,
                code: error.code(),
            })
        }
    }
}

fn write_to_dir(
    dir: &Utf8Path,
    artifact: &ExportArtifact,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let path = dir.join(&artifact.file_name);
    geosurvey_fs::write_file_atomically(&path, &artifact.bytes).map_err(|source| {
        CliError::WriteExport {
            path: path.clone(),
            source,
        }
    })?;
    log::info!("wrote {} ({} bytes)", path, artifact.bytes.len());
    writeln!(out, "{path}").map_err(CliError::WriteOutput)
}
