//! Behavioural tests for submission validation.

use geosurvey_core::{
    FieldConfig, FieldMap, FieldType, Form, StorageType, Submission, ValidationError,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;
use std::cell::RefCell;

type ValidationCell = RefCell<Option<Result<(), ValidationError>>>;

#[fixture]
fn form() -> RefCell<Option<Form>> {
    RefCell::new(None)
}

#[fixture]
fn outcome() -> ValidationCell {
    RefCell::new(None)
}

#[given("a tree survey form")]
fn tree_form(#[from(form)] form: &RefCell<Option<Form>>) {
    let built = Form::new(
        1,
        1,
        "trees",
        StorageType::Admin,
        "trees",
        vec![
            FieldConfig::new("species", "Species", FieldType::Text).required(),
            FieldConfig::new("count", "Count", FieldType::Number),
        ],
    )
    .expect("valid form");
    *form.borrow_mut() = Some(built);
}

fn validate_with_species(
    form: &RefCell<Option<Form>>,
    outcome: &ValidationCell,
    species: &str,
    lat: f64,
    lon: f64,
) {
    let guard = form.borrow();
    let form = guard.as_ref().expect("form must be initialised");
    let mut data = FieldMap::new();
    data.insert("species".into(), Value::String(species.to_owned()));
    let submission = Submission::new(data).with_location(lat, lon, None);
    *outcome.borrow_mut() = Some(submission.validate(form));
}

#[when("I submit an oak at latitude {lat} and longitude {lon}")]
fn submit_oak(
    #[from(form)] form: &RefCell<Option<Form>>,
    #[from(outcome)] outcome: &ValidationCell,
    lat: f64,
    lon: f64,
) {
    validate_with_species(form, outcome, "oak", lat, lon);
}

#[when("I submit no species at latitude {lat} and longitude {lon}")]
fn submit_blank(
    #[from(form)] form: &RefCell<Option<Form>>,
    #[from(outcome)] outcome: &ValidationCell,
    lat: f64,
    lon: f64,
) {
    validate_with_species(form, outcome, "", lat, lon);
}

#[then("the submission is accepted")]
fn accepted(#[from(outcome)] outcome: &ValidationCell) {
    let borrowed = outcome.borrow();
    assert!(
        matches!(&*borrowed, Some(Ok(()))),
        "expected acceptance, got {borrowed:?}"
    );
}

#[then("the submission is rejected for the missing species field")]
fn rejected_missing(#[from(outcome)] outcome: &ValidationCell) {
    let borrowed = outcome.borrow();
    assert!(
        matches!(
            &*borrowed,
            Some(Err(ValidationError::MissingRequiredField { field })) if field == "species"
        ),
        "expected missing species, got {borrowed:?}"
    );
}

#[then("the submission is rejected for an invalid latitude")]
fn rejected_latitude(#[from(outcome)] outcome: &ValidationCell) {
    let borrowed = outcome.borrow();
    assert!(
        matches!(&*borrowed, Some(Err(ValidationError::InvalidLatitude { .. }))),
        "expected invalid latitude, got {borrowed:?}"
    );
}

macro_rules! register_scenario {
    ($fn_name:ident, $title:literal) => {
        #[scenario(path = "tests/features/submission_validation.feature", name = $title)]
        fn $fn_name(form: RefCell<Option<Form>>, outcome: ValidationCell) {
            let _ = (form, outcome);
        }
    };
}

register_scenario!(accepting_located_submission, "accepting a located submission");
register_scenario!(
    rejecting_missing_species,
    "rejecting a submission without the required species"
);
register_scenario!(rejecting_bad_latitude, "rejecting an out of range latitude");
