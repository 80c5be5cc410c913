//! Command flows against a scratch admin catalogue.

use super::helpers::{FORM_ID, Workspace, bird_form, fixed_engine, wren_submission};
use super::*;
use crate::export::{ExportConfig, run_export_with};
use crate::provision::{ProvisionConfig, run_provision_with};
use crate::submit::{SubmitConfig, run_submit_with};
use geosurvey_core::{BackendCredentials, StorageType};
use geosurvey_data::{AdminStore, CredentialVault, SubmissionError, VaultKey};
use rstest::{fixture, rstest};
use serde_json::json;
use std::fs;

#[fixture]
fn workspace() -> Workspace {
    Workspace::new()
}

fn submit(workspace: &Workspace, submission: &serde_json::Value) -> Result<String, CliError> {
    let config = SubmitConfig {
        submission: workspace.write_json("submission.json", submission),
        form_id: FORM_ID,
        admin_db: workspace.admin_db(),
        vault_key: Some(workspace.vault_key.clone()),
    };
    let mut out = Vec::new();
    run_submit_with(config, &mut out)?;
    Ok(String::from_utf8(out).expect("utf-8 output"))
}

fn export_config(workspace: &Workspace, format: &str) -> ExportConfig {
    ExportConfig {
        form_id: FORM_ID,
        format: format.to_owned(),
        output_dir: None,
        admin_db: workspace.admin_db(),
        vault_key: Some(workspace.vault_key.clone()),
    }
}

fn provision(workspace: &Workspace, execute: bool) -> Result<String, CliError> {
    let config = ProvisionConfig {
        form_id: FORM_ID,
        execute,
        admin_db: workspace.admin_db(),
        vault_key: Some(workspace.vault_key.clone()),
    };
    let mut out = Vec::new();
    run_provision_with(config, &mut out)?;
    Ok(String::from_utf8(out).expect("utf-8 output"))
}

#[rstest]
fn register_reports_sanitised_table(workspace: Workspace) {
    let output = workspace.register(&bird_form("admin")).expect("register");
    assert_eq!(
        output.trim(),
        "registered form 21 as admin (table bird_sightings, 2 fields)"
    );
}

#[rstest]
fn register_stores_encrypted_credentials(workspace: Workspace) {
    let mut definition = bird_form("postgres");
    definition["credentials"] = json!({
        "host": "db.internal",
        "database": "surveys",
        "user": "collector",
        "password": "hunter2"
    });
    workspace.register(&definition).expect("register");

    let admin = AdminStore::open(workspace.admin_db().as_std_path()).expect("open admin");
    let vault = CredentialVault::new(VaultKey::from_base64(&workspace.vault_key).expect("key"));
    let loaded = admin
        .load_credentials(4, StorageType::Postgres, &vault)
        .expect("load")
        .expect("stored");
    assert_eq!(
        loaded,
        BackendCredentials::Postgres {
            host: "db.internal".into(),
            port: 5432,
            database: "surveys".into(),
            user: "collector".into(),
            password: "hunter2".into(),
        }
    );
}

#[rstest]
fn register_rejects_credentials_for_another_backend(workspace: Workspace) {
    let mut definition = bird_form("postgres");
    definition["credentials"] = json!({"url": "https://x.example", "api_key": "k"});
    let err = workspace.register(&definition).expect_err("mismatch");
    assert!(matches!(
        err,
        CliError::CredentialsMismatch {
            expected: StorageType::Postgres,
            supplied: StorageType::Supabase,
            ..
        }
    ));
}

#[rstest]
fn register_rejects_a_form_without_fields(workspace: Workspace) {
    let mut definition = bird_form("admin");
    definition["fields"] = json!([]);
    let err = workspace.register(&definition).expect_err("no fields");
    assert!(matches!(err, CliError::InvalidForm { .. }));
}

#[rstest]
fn submit_then_export_csv_to_a_directory(workspace: Workspace) {
    workspace.register_birds("admin");
    let output = submit(&workspace, &wren_submission()).expect("submit");
    assert_eq!(output.trim(), "stored response for form 21 in admin");

    let mut config = export_config(&workspace, "csv");
    config.output_dir = Some(workspace.path("exports"));
    let mut out = Vec::new();
    run_export_with(config, &fixed_engine(), &mut out).expect("export");

    let expected = workspace.path("exports/BIRDS_2024-04-01.csv");
    assert_eq!(String::from_utf8(out).expect("utf-8").trim(), expected.as_str());
    let csv = fs::read_to_string(&expected).expect("read export");
    assert!(csv.contains("wren"), "unexpected CSV: {csv}");
}

#[rstest]
fn export_without_output_dir_streams_to_stdout(workspace: Workspace) {
    workspace.register_birds("admin");
    submit(&workspace, &wren_submission()).expect("submit");

    let mut out = Vec::new();
    run_export_with(export_config(&workspace, "geojson"), &fixed_engine(), &mut out)
        .expect("export");
    let document: serde_json::Value = serde_json::from_slice(&out).expect("GeoJSON");
    assert_eq!(document["type"], "FeatureCollection");
    assert_eq!(
        document["features"][0]["geometry"]["coordinates"],
        json!([-1.25, 51.75])
    );
}

#[rstest]
#[case("csv", "no_responses")]
#[case("docx", "unsupported_format")]
fn failed_exports_report_their_code(
    workspace: Workspace,
    #[case] format: &str,
    #[case] expected: &str,
) {
    workspace.register_birds("admin");
    let mut out = Vec::new();
    let err = run_export_with(export_config(&workspace, format), &fixed_engine(), &mut out)
        .expect_err("nothing to export");
    match err {
        CliError::Export { form_id, code } => {
            assert_eq!(form_id, FORM_ID);
            assert_eq!(code, expected);
        }
        other => panic!("expected Export, found {other:?}"),
    }
    assert!(out.is_empty());
}

#[rstest]
fn invalid_submission_is_refused(workspace: Workspace) {
    workspace.register_birds("admin");
    let err = submit(&workspace, &json!({"data": {"count": "2"}})).expect_err("missing species");
    assert!(matches!(
        err,
        CliError::Submission(SubmissionError::Validation(_))
    ));
}

#[rstest]
fn submitting_to_an_unknown_form_fails(workspace: Workspace) {
    workspace.register_birds("admin");
    let config = SubmitConfig {
        submission: workspace.write_json("submission.json", &wren_submission()),
        form_id: FORM_ID + 1,
        admin_db: workspace.admin_db(),
        vault_key: Some(workspace.vault_key.clone()),
    };
    let err = run_submit_with(config, &mut Vec::new()).expect_err("unknown form");
    assert!(matches!(err, CliError::UnknownForm { form_id } if form_id == FORM_ID + 1));
}

#[rstest]
fn supabase_form_without_credentials_is_not_stored(workspace: Workspace) {
    workspace.register_birds("supabase");
    let err = submit(&workspace, &wren_submission()).expect_err("no credentials");
    assert!(matches!(
        err,
        CliError::NotStored {
            storage_type: StorageType::Supabase,
            ..
        }
    ));
}

#[rstest]
fn provision_prints_ddl_for_remote_forms(workspace: Workspace) {
    workspace.register_birds("supabase");
    let script = provision(&workspace, false).expect("provision");
    assert!(script.starts_with("CREATE TABLE IF NOT EXISTS \"bird_sightings\" ("));
    assert!(script.contains("\"species\" TEXT"));
}

#[rstest]
fn provision_has_nothing_to_do_for_admin_forms(workspace: Workspace) {
    workspace.register_birds("admin");
    let output = provision(&workspace, true).expect("provision");
    assert!(output.contains("nothing to provision"));
}

#[rstest]
fn executing_provision_needs_postgres_credentials(workspace: Workspace) {
    workspace.register_birds("postgres");
    let err = provision(&workspace, true).expect_err("no credentials");
    assert!(matches!(
        err,
        CliError::MissingCredentials {
            owner_id: 4,
            storage_type: StorageType::Postgres,
        }
    ));
}
