//! REST backend behaviour against a local mock endpoint.

use std::time::Duration;

use geosurvey_core::{
    BackendCredentials, BackendError, FieldConfig, FieldMap, FieldType, Form, ResponseBackend,
    StorageType, Submission,
};
use geosurvey_data::supabase::{DEFAULT_USER_AGENT, SupabaseHttpConfig, SupabaseHttpStore};
use geosurvey_data::{AdminStore, CredentialResolver, CredentialVault, StorageRouter, VaultKey};
use rstest::{fixture, rstest};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "service-role-key";

#[fixture]
fn form() -> Form {
    Form::new(
        5,
        2,
        "HEDGE",
        StorageType::Supabase,
        "hedgerows",
        vec![
            FieldConfig::new("species", "Species", FieldType::Text).required(),
            FieldConfig::new("features", "Features", FieldType::Checkbox),
        ],
    )
    .expect("valid form")
}

fn sighting() -> Submission {
    let mut data = FieldMap::new();
    data.insert("species".into(), json!("hawthorn"));
    data.insert("features".into(), json!(["berries", "nest"]));
    Submission::new(data).with_location(52.2, 0.12, Some(3.5))
}

fn store(server: &MockServer) -> SupabaseHttpStore {
    let config = SupabaseHttpConfig::default().with_timeout(Duration::from_secs(5));
    SupabaseHttpStore::with_config(server.uri(), API_KEY, config).expect("store should build")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn insert_sends_headers_and_text_values(form: Form) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/hedgerows"))
        .and(header("apikey", API_KEY))
        .and(header("Authorization", format!("Bearer {API_KEY}").as_str()))
        .and(header("Prefer", "return=minimal"))
        .and(header("User-Agent", DEFAULT_USER_AGENT))
        .and(body_json(json!({
            "species": "hawthorn",
            "features": "berries, nest",
            "latitude": 52.2,
            "longitude": 0.12,
            "accuracy": 3.5,
            "ip_address": null
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(store(&server).persist(&form, &sighting()), Ok(()));
}

#[rstest]
#[case(200)]
#[case(204)]
#[case(409)]
#[tokio::test(flavor = "multi_thread")]
async fn insert_requires_created(form: Form, #[case] status: u16) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
        .mount(&server)
        .await;

    let err = store(&server)
        .persist(&form, &sighting())
        .expect_err("only 201 counts as success");
    assert!(matches!(err, BackendError::Status { status: s, .. } if s == status));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn select_normalises_rows_newest_first(form: Form) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/hedgerows"))
        .and(query_param("select", "*"))
        .and(query_param("order", "created_at.desc,id.desc"))
        .and(query_param("limit", "2"))
        .and(query_param("offset", "0"))
        .and(header("apikey", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 8,
                "species": "blackthorn",
                "features": null,
                "latitude": 52.3,
                "longitude": 0.2,
                "accuracy": null,
                "ip_address": "192.0.2.1",
                "created_at": "2024-05-02T09:00:00+00:00"
            },
            {
                "id": 7,
                "species": "hawthorn",
                "features": "berries, nest",
                "latitude": null,
                "longitude": null,
                "accuracy": null,
                "created_at": "2024-05-01T09:00:00+00:00"
            }
        ])))
        .mount(&server)
        .await;

    let rows = store(&server).fetch(&form, 2, 0).expect("rows");
    let ids: Vec<i64> = rows.iter().map(|r| r.unique_display_id).collect();
    assert_eq!(ids, [8, 7]);
    assert_eq!(rows[0].text("species"), "blackthorn");
    assert!(!rows[0].data.contains_key("ip_address"));
    assert_eq!(rows[1].text("features"), "berries, nest");
    assert_eq!(rows[1].geo_point(), None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn select_failure_is_a_status_error(form: Form) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let err = store(&server).fetch(&form, 10, 0).expect_err("401 should fail");
    assert_eq!(
        err,
        BackendError::Status {
            target: format!("{}/rest/v1/hedgerows", server.uri()),
            status: 401,
            message: "invalid api key".into(),
        }
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn slow_backend_times_out(form: Form) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let config = SupabaseHttpConfig::default().with_timeout(Duration::from_millis(200));
    let store = SupabaseHttpStore::with_config(server.uri(), API_KEY, config).expect("store");
    let err = store.fetch(&form, 10, 0).expect_err("should time out");
    assert!(matches!(err, BackendError::Timeout { .. }));
}

fn one_row() -> serde_json::Value {
    json!([{
        "id": 3,
        "species": "hazel",
        "features": null,
        "latitude": 52.0,
        "longitude": 0.1,
        "accuracy": null,
        "created_at": "2024-05-03T09:00:00+00:00"
    }])
}

#[rstest]
#[tokio::test]
async fn store_is_usable_inside_current_thread_runtime(form: Form) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/hedgerows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(one_row()))
        .mount(&server)
        .await;

    let store = store(&server);
    let rows = store.fetch(&form, 10, 0).expect("rows");
    assert_eq!(rows.len(), 1);
    drop(store);
}

#[rstest]
#[tokio::test]
async fn router_fetch_inside_current_thread_runtime(form: Form) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/hedgerows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(one_row()))
        .mount(&server)
        .await;

    let admin = AdminStore::open_in_memory().expect("admin store");
    let vault = CredentialVault::new(VaultKey::generate());
    admin.save_form(&form).expect("save form");
    admin
        .store_credentials(
            form.owner_id,
            &BackendCredentials::Supabase {
                url: server.uri(),
                api_key: API_KEY.into(),
            },
            &vault,
        )
        .expect("store credentials");

    let router = StorageRouter::new(&admin, CredentialResolver::new(&admin, &vault));
    let rows = router.fetch(form.id, 10, 0);
    let ids: Vec<i64> = rows.iter().map(|r| r.unique_display_id).collect();
    assert_eq!(ids, [3]);
}
