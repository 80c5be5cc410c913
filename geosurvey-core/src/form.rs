//! Survey form definitions.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identifier::{disambiguate, sanitize_identifier};

/// Storage backend holding a form's responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Shared relational store operated alongside the form catalogue.
    Admin,
    /// User-owned store reached through a PostgREST-style HTTP API.
    Supabase,
    /// User-owned PostgreSQL database reached with a direct connection.
    Postgres,
}

impl StorageType {
    /// Stable token used in persisted catalogue rows and configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Supabase => "supabase",
            Self::Postgres => "postgres",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised storage type token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown storage type {token:?}")]
pub struct UnknownStorageType {
    /// Token that failed to parse.
    pub token: String,
}

impl FromStr for StorageType {
    type Err = UnknownStorageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "supabase" => Ok(Self::Supabase),
            "postgres" => Ok(Self::Postgres),
            _ => Err(UnknownStorageType {
                token: s.to_owned(),
            }),
        }
    }
}

/// Input widget type of a survey field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Single-line free text.
    Text,
    /// Multi-line free text.
    Textarea,
    /// Numeric input.
    Number,
    /// Calendar date.
    Date,
    /// E-mail address.
    Email,
    /// Drop-down with a single choice.
    Select,
    /// Radio group with a single choice.
    Radio,
    /// Checkbox group allowing several choices.
    Checkbox,
    /// Any widget this crate does not interpret.
    #[serde(other)]
    Other,
}

impl FieldType {
    /// Whether the field draws its values from [`FieldConfig::options`].
    #[must_use]
    pub const fn is_choice(self) -> bool {
        matches!(self, Self::Select | Self::Radio | Self::Checkbox)
    }
}

/// Configuration of a single survey field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Sanitised identifier used as storage column name and data key.
    pub name: String,
    /// Display text shown to respondents and used in human-facing exports.
    pub label: String,
    /// Widget type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether a submission must supply a value.
    #[serde(default)]
    pub required: bool,
    /// Ordered choices; only meaningful for choice types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl FieldConfig {
    /// Build a field, sanitising `name` into a storage identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use geosurvey_core::{FieldConfig, FieldType};
    ///
    /// let field = FieldConfig::new("Tree Species", "Tree species", FieldType::Text);
    /// assert_eq!(field.name, "tree_species");
    /// ```
    #[must_use]
    pub fn new(name: &str, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: sanitize_identifier(name),
            label: label.into(),
            field_type,
            required: false,
            options: Vec::new(),
        }
    }

    /// Mark the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the ordered options of a choice field.
    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Label for display, falling back to the identifier when blank.
    #[must_use]
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// Errors returned by [`Form::new`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    /// The public share code was blank.
    #[error("form public code must not be empty")]
    MissingPublicCode,
    /// The form defines no fields.
    #[error("form must define at least one field")]
    NoFields,
}

/// A survey form and the bookkeeping needed to route its responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    /// Catalogue identifier.
    pub id: i64,
    /// Owner whose backend credentials serve remote storage.
    pub owner_id: i64,
    /// Short share code used in public links and export filenames.
    pub public_code: String,
    /// Backend holding this form's responses.
    pub storage_type: StorageType,
    /// Sanitised name of the response table in remote backends.
    pub table_name: String,
    /// Ordered field definitions.
    pub fields: Vec<FieldConfig>,
    /// Capacity limit; zero means unlimited.
    pub max_responses: u32,
    /// Approximate number of persisted responses.
    pub response_count: u32,
}

impl Form {
    /// Validate and construct a [`Form`].
    ///
    /// The table name is sanitised and field names are re-sanitised and
    /// de-duplicated with numeric suffixes, so every identifier that reaches
    /// a backend satisfies the identifier contract.
    pub fn new(
        id: i64,
        owner_id: i64,
        public_code: impl Into<String>,
        storage_type: StorageType,
        table_name: &str,
        fields: Vec<FieldConfig>,
    ) -> Result<Self, FormError> {
        let public_code = public_code.into();
        if public_code.trim().is_empty() {
            return Err(FormError::MissingPublicCode);
        }
        if fields.is_empty() {
            return Err(FormError::NoFields);
        }
        Ok(Self {
            id,
            owner_id,
            public_code,
            storage_type,
            table_name: sanitize_identifier(table_name),
            fields: normalise_fields(fields),
            max_responses: 0,
            response_count: 0,
        })
    }

    /// Set the capacity limit.
    #[must_use]
    pub fn with_max_responses(mut self, max_responses: u32) -> Self {
        self.max_responses = max_responses;
        self
    }

    /// Look up a field by identifier.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Whether the approximate response count has reached the capacity limit.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.max_responses > 0 && self.response_count >= self.max_responses
    }
}

fn normalise_fields(fields: Vec<FieldConfig>) -> Vec<FieldConfig> {
    let mut seen: Vec<String> = Vec::with_capacity(fields.len());
    fields
        .into_iter()
        .map(|mut field| {
            let base = sanitize_identifier(&field.name);
            let name = disambiguate(&base, |candidate| seen.iter().any(|s| s == candidate));
            seen.push(name.clone());
            field.name = name;
            field
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn fields() -> Vec<FieldConfig> {
        vec![
            FieldConfig::new("species", "Species", FieldType::Text).required(),
            FieldConfig::new("count", "Count", FieldType::Number),
        ]
    }

    #[rstest]
    fn form_requires_fields() {
        let result = Form::new(1, 1, "abc", StorageType::Admin, "t", Vec::new());
        assert_eq!(result, Err(FormError::NoFields));
    }

    #[rstest]
    fn form_requires_public_code(fields: Vec<FieldConfig>) {
        let result = Form::new(1, 1, "  ", StorageType::Admin, "t", fields);
        assert_eq!(result, Err(FormError::MissingPublicCode));
    }

    #[rstest]
    fn form_sanitises_table_name(fields: Vec<FieldConfig>) {
        let form = Form::new(1, 1, "abc", StorageType::Postgres, "Bird Counts!", fields)
            .expect("valid form");
        assert_eq!(form.table_name, "bird_counts");
    }

    #[rstest]
    fn form_deduplicates_field_names() {
        let fields = vec![
            FieldConfig::new("Name", "Name", FieldType::Text),
            FieldConfig::new("name", "Other name", FieldType::Text),
            FieldConfig::new("NAME!", "Third", FieldType::Text),
        ];
        let form = Form::new(1, 1, "abc", StorageType::Admin, "t", fields).expect("valid form");
        let names: Vec<_> = form.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["name", "name_2", "name_3"]);
    }

    #[rstest]
    fn deserialised_fields_are_resanitised() {
        let raw = r#"[{"name":"Site Code","label":"Site","type":"text"}]"#;
        let fields: Vec<FieldConfig> = serde_json::from_str(raw).expect("parse fields");
        let form = Form::new(1, 1, "abc", StorageType::Admin, "t", fields).expect("valid form");
        assert_eq!(form.fields[0].name, "site_code");
    }

    #[rstest]
    #[case(0, 10, false)]
    #[case(10, 9, false)]
    #[case(10, 10, true)]
    #[case(10, 11, true)]
    fn capacity_limit(
        fields: Vec<FieldConfig>,
        #[case] max: u32,
        #[case] count: u32,
        #[case] expected: bool,
    ) {
        let mut form = Form::new(1, 1, "abc", StorageType::Admin, "t", fields).expect("valid form");
        form.max_responses = max;
        form.response_count = count;
        assert_eq!(form.is_full(), expected);
    }

    #[rstest]
    fn unknown_field_type_deserialises_as_other() {
        let raw = r#"{"name":"pic","label":"Photo","type":"photo"}"#;
        let field: FieldConfig = serde_json::from_str(raw).expect("parse field");
        assert_eq!(field.field_type, FieldType::Other);
    }

    #[rstest]
    #[case("admin", StorageType::Admin)]
    #[case(" Supabase ", StorageType::Supabase)]
    #[case("POSTGRES", StorageType::Postgres)]
    fn parses_storage_type(#[case] token: &str, #[case] expected: StorageType) {
        assert_eq!(token.parse::<StorageType>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_storage_type() {
        assert!("mysql".parse::<StorageType>().is_err());
    }
}
