//! Incoming submissions and their validation against a form.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{FieldMap, FieldType, Form, value_to_text};

/// A respondent's submission before it is persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Submitted values keyed by field identifier.
    #[serde(default)]
    pub data: FieldMap,
    /// WGS84 latitude in degrees.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// WGS84 longitude in degrees.
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Reported horizontal accuracy in metres.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Address of the submitting client.
    #[serde(default)]
    pub client_ip: Option<String>,
}

/// Reasons a submission is rejected before any persistence attempt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field was absent or blank.
    #[error("required field {field} is missing")]
    MissingRequiredField {
        /// Identifier of the missing field.
        field: String,
    },
    /// A number field held something that does not parse as a number.
    #[error("field {field} expects a number, got {value:?}")]
    InvalidNumber {
        /// Identifier of the offending field.
        field: String,
        /// Text rendering of the rejected value.
        value: String,
    },
    /// A choice field held a value outside its configured options.
    #[error("field {field} does not offer the option {value:?}")]
    InvalidOption {
        /// Identifier of the offending field.
        field: String,
        /// Rejected option.
        value: String,
    },
    /// Only one of latitude and longitude was supplied.
    #[error("latitude and longitude must be supplied together")]
    IncompleteCoordinates,
    /// Latitude was non-finite or outside `[-90, 90]`.
    #[error("latitude {value} is outside [-90, 90]")]
    InvalidLatitude {
        /// Rejected latitude.
        value: f64,
    },
    /// Longitude was non-finite or outside `[-180, 180]`.
    #[error("longitude {value} is outside [-180, 180]")]
    InvalidLongitude {
        /// Rejected longitude.
        value: f64,
    },
    /// Accuracy was negative or non-finite.
    #[error("accuracy {value} must be a non-negative number of metres")]
    InvalidAccuracy {
        /// Rejected accuracy.
        value: f64,
    },
}

impl Submission {
    /// Create a submission carrying only field values.
    #[must_use]
    pub fn new(data: FieldMap) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Attach a location fix.
    #[must_use]
    pub fn with_location(mut self, latitude: f64, longitude: f64, accuracy: Option<f64>) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self.accuracy = accuracy;
        self
    }

    /// Attach the client address.
    #[must_use]
    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = Some(client_ip.into());
        self
    }

    /// Check the submission against `form`.
    ///
    /// Values for identifiers the form does not define are ignored here;
    /// backends only ever persist the form's own columns.
    pub fn validate(&self, form: &Form) -> Result<(), ValidationError> {
        self.validate_location()?;
        for field in &form.fields {
            let value = self.data.get(&field.name).unwrap_or(&Value::Null);
            if is_blank(value) {
                if field.required {
                    return Err(ValidationError::MissingRequiredField {
                        field: field.name.clone(),
                    });
                }
                continue;
            }
            if field.field_type == FieldType::Number && !is_numeric(value) {
                return Err(ValidationError::InvalidNumber {
                    field: field.name.clone(),
                    value: value_to_text(value),
                });
            }
            if field.field_type.is_choice() && !field.options.is_empty() {
                for choice in choices(value) {
                    if !field.options.iter().any(|option| *option == choice) {
                        return Err(ValidationError::InvalidOption {
                            field: field.name.clone(),
                            value: choice,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_location(&self) -> Result<(), ValidationError> {
        match (self.latitude, self.longitude) {
            (None, None) => {}
            (Some(lat), Some(lon)) => {
                if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                    return Err(ValidationError::InvalidLatitude { value: lat });
                }
                if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
                    return Err(ValidationError::InvalidLongitude { value: lon });
                }
            }
            _ => return Err(ValidationError::IncompleteCoordinates),
        }
        match self.accuracy {
            Some(value) if !value.is_finite() || value < 0.0 => {
                Err(ValidationError::InvalidAccuracy { value })
            }
            _ => Ok(()),
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_blank),
        _ => false,
    }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(text) => text.trim().parse::<f64>().is_ok_and(f64::is_finite),
        _ => false,
    }
}

fn choices(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter(|item| !is_blank(item))
            .map(value_to_text)
            .collect(),
        other => vec![value_to_text(other)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldConfig, StorageType};
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn form() -> Form {
        Form::new(
            7,
            1,
            "trees",
            StorageType::Admin,
            "trees",
            vec![
                FieldConfig::new("species", "Species", FieldType::Text).required(),
                FieldConfig::new("count", "Count", FieldType::Number),
                FieldConfig::new("health", "Health", FieldType::Radio)
                    .with_options(["good", "poor"]),
                FieldConfig::new("threats", "Threats", FieldType::Checkbox)
                    .with_options(["fungus", "drought", "fire"]),
            ],
        )
        .expect("valid form")
    }

    fn submission(data: serde_json::Value) -> Submission {
        let map = data
            .as_object()
            .expect("object literal")
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Submission::new(map)
    }

    #[rstest]
    fn accepts_complete_submission(form: Form) {
        let sub = submission(json!({
            "species": "oak",
            "count": "3",
            "health": "good",
            "threats": ["fungus", "fire"]
        }))
        .with_location(40.0, -3.0, Some(5.0));
        assert_eq!(sub.validate(&form), Ok(()));
    }

    #[rstest]
    #[case(json!({}))]
    #[case(json!({"species": "   "}))]
    #[case(json!({"species": null}))]
    #[case(json!({"species": []}))]
    fn rejects_missing_required(form: Form, #[case] data: serde_json::Value) {
        let err = submission(data).validate(&form).expect_err("should fail");
        assert_eq!(
            err,
            ValidationError::MissingRequiredField {
                field: "species".into()
            }
        );
    }

    #[rstest]
    fn rejects_non_numeric_number(form: Form) {
        let err = submission(json!({"species": "oak", "count": "many"}))
            .validate(&form)
            .expect_err("should fail");
        assert!(matches!(err, ValidationError::InvalidNumber { .. }));
    }

    #[rstest]
    fn rejects_unknown_option(form: Form) {
        let err = submission(json!({"species": "oak", "threats": ["fungus", "flood"]}))
            .validate(&form)
            .expect_err("should fail");
        assert_eq!(
            err,
            ValidationError::InvalidOption {
                field: "threats".into(),
                value: "flood".into()
            }
        );
    }

    #[rstest]
    #[case(Some(91.0), Some(0.0))]
    #[case(Some(0.0), Some(181.0))]
    #[case(Some(f64::INFINITY), Some(0.0))]
    #[case(Some(1.0), None)]
    #[case(None, Some(1.0))]
    fn rejects_bad_coordinates(form: Form, #[case] lat: Option<f64>, #[case] lon: Option<f64>) {
        let mut sub = submission(json!({"species": "oak"}));
        sub.latitude = lat;
        sub.longitude = lon;
        assert!(sub.validate(&form).is_err());
    }

    #[rstest]
    fn rejects_negative_accuracy(form: Form) {
        let sub = submission(json!({"species": "oak"})).with_location(1.0, 1.0, Some(-2.0));
        assert!(matches!(
            sub.validate(&form),
            Err(ValidationError::InvalidAccuracy { .. })
        ));
    }

    #[rstest]
    fn location_is_optional(form: Form) {
        let sub = submission(json!({"species": "oak"}));
        assert_eq!(sub.validate(&form), Ok(()));
    }
}
