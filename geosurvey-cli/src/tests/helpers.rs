//! Scratch workspaces with an admin catalogue and JSON inputs.

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use geosurvey_data::VaultKey;
use geosurvey_export::ExportEngine;
use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;

use crate::CliError;
use crate::register::{RegisterConfig, run_register_with};

pub(super) const FORM_ID: i64 = 21;

/// Engine stamping a fixed date into file names.
pub(super) fn fixed_engine() -> ExportEngine {
    ExportEngine::for_date(NaiveDate::from_ymd_opt(2024, 4, 1).expect("valid date"))
}

/// A temporary directory holding the admin catalogue and input files.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
    pub(super) vault_key: String,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        Self {
            _dir: dir,
            root,
            vault_key: VaultKey::generate().to_base64(),
        }
    }

    pub(super) fn admin_db(&self) -> Utf8PathBuf {
        self.root.join("admin/catalogue.db")
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub(super) fn write_json(&self, name: &str, value: &Value) -> Utf8PathBuf {
        let path = self.path(name);
        fs::write(&path, value.to_string()).expect("write JSON input");
        path
    }

    pub(super) fn register(&self, definition: &Value) -> Result<String, CliError> {
        let path = self.write_json("form.json", definition);
        let config = RegisterConfig {
            definition: path,
            admin_db: self.admin_db(),
            vault_key: Some(self.vault_key.clone()),
        };
        let mut out = Vec::new();
        run_register_with(config, &mut out)?;
        Ok(String::from_utf8(out).expect("utf-8 output"))
    }

    /// Register the bird survey used across the command tests.
    pub(super) fn register_birds(&self, storage_type: &str) {
        self.register(&bird_form(storage_type))
            .expect("register bird survey");
    }
}

pub(super) fn bird_form(storage_type: &str) -> Value {
    json!({
        "id": FORM_ID,
        "owner_id": 4,
        "public_code": "BIRDS",
        "storage_type": storage_type,
        "table_name": "Bird Sightings",
        "fields": [
            {"name": "species", "label": "Species", "type": "text", "required": true},
            {"name": "count", "label": "Count", "type": "number"}
        ]
    })
}

pub(super) fn wren_submission() -> Value {
    json!({
        "data": {"species": "wren", "count": "2"},
        "latitude": 51.75,
        "longitude": -1.25,
        "accuracy": 8.0
    })
}
