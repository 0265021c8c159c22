mod common;

use common::{get, json_body, send};
use http::StatusCode;
use hugroute::http::Request;
use hugroute::introspect::Signature;
use hugroute::route::{self, Router};
use hugroute::{types, Api, ApiError, ApiServer, Call, Endpoint, Error};
use serde_json::{json, Value};

fn echo_signature() -> Signature {
    Signature::new("echo").param_with("text", types::text())
}

fn versioned_echo() -> Api {
    let mut api = Api::new("versions");

    let raw = Endpoint::new(echo_signature(), |call: &mut Call<'_>| -> Result<String, ApiError> {
        call.arg("text")
    });
    route::get().versions(1).route(&mut api, &raw);

    let decorated = Endpoint::new(echo_signature(), |call: &mut Call<'_>| -> Result<String, ApiError> {
        Ok(format!("Echo: {}", call.arg::<String>("text")?))
    });
    route::get()
        .versions(2..5)
        .examples(&["text=hi"])
        .route(&mut api, &decorated);

    let reports = Endpoint::new(echo_signature(), |call: &mut Call<'_>| call.api_version());
    route::get().versions(7).route(&mut api, &reports);

    let fallback = Endpoint::new(echo_signature(), |_call: &mut Call<'_>| "Not Implemented");
    route::get().route(&mut api, &fallback);
    api
}

fn server() -> ApiServer {
    versioned_echo().server().unwrap()
}

#[test]
fn test_path_prefix_selects_version() {
    let server = server();
    assert_eq!(json_body(&mut get(&server, "/v1/echo?text=hi")), json!("hi"));
    for version in 2..5 {
        let target = format!("/v{version}/echo?text=hi");
        assert_eq!(json_body(&mut get(&server, &target)), json!("Echo: hi"), "{target}");
    }
    assert_eq!(json_body(&mut get(&server, "/v7/echo?text=hi")), json!(7));
}

#[test]
fn test_unmatched_version_falls_back_to_unversioned() {
    let server = server();
    assert_eq!(json_body(&mut get(&server, "/echo?text=hi")), json!("Not Implemented"));
    assert_eq!(json_body(&mut get(&server, "/v5/echo?text=hi")), json!("Not Implemented"));
}

#[test]
fn test_header_and_query_signals() {
    let server = server();
    let by_header = Request::get("/echo?text=hi").with_header("X-API-VERSION", "3");
    assert_eq!(json_body(&mut send(&server, by_header)), json!("Echo: hi"));
    assert_eq!(json_body(&mut get(&server, "/echo?text=hi&api_version=7")), json!(7));

    let agreeing = Request::get("/v1/echo?text=hi&api_version=1").with_header("X-API-VERSION", "1");
    assert_eq!(json_body(&mut send(&server, agreeing)), json!("hi"));
}

#[test]
fn test_custom_version_header() {
    let mut api = versioned_echo();
    api.http.set_version_header("Accept-Version");
    let server = api.server().unwrap();

    let request = Request::get("/echo?text=hi").with_header("Accept-Version", "1");
    assert_eq!(json_body(&mut send(&server, request)), json!("hi"));
}

#[test]
fn test_conflicting_versions_fail() {
    let server = server();
    let request = Request::get("/v1/echo?text=hi").with_header("X-API-VERSION", "2");
    match server.handle(request) {
        Err(Error::ConflictingVersions(versions)) => assert_eq!(versions, ["1", "2"]),
        other => panic!("expected a version conflict, got {other:?}"),
    }
}

#[test]
fn test_non_numeric_version_fails() {
    let server = server();
    let request = Request::get("/echo?text=hi&api_version=latest");
    assert!(matches!(server.handle(request), Err(Error::InvalidVersion(raw)) if raw == "latest"));
}

#[test]
fn test_documentation_groups_versions() {
    let api = versioned_echo();
    let doc = api.documentation(None);
    let versions = doc["versions"].as_object().unwrap();
    let listed: Vec<&str> = versions.keys().map(String::as_str).collect();
    assert_eq!(listed, ["1", "2", "3", "4", "7"]);

    assert_eq!(
        doc["versions"]["3"]["/echo"]["GET"]["examples"],
        json!(["/v3/echo?text=hi"])
    );
    assert_eq!(
        doc["versions"]["1"]["/echo"]["GET"]["inputs"]["text"]["type"],
        json!("Basic text / string value")
    );
    assert!(doc.get("handlers").is_none());
}

#[test]
fn test_documentation_for_single_version_is_flat() {
    let api = versioned_echo();
    let doc = api.documentation(Some(3));
    assert!(doc.get("versions").is_none());
    assert!(doc["handlers"]["/echo"]["GET"].is_object());
}

#[test]
fn test_not_found_documents_requested_version() {
    let server = server();
    let mut response = get(&server, "/v2/missing");
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let body = json_body(&mut response);
    assert_eq!(
        body["documentation"]["handlers"]["/echo"]["GET"]["examples"],
        json!(["/v2/echo?text=hi"])
    );
    assert_eq!(body["404"].as_str().map(str::is_empty), Some(false));
    assert!(matches!(body["documentation"]["versions"], Value::Null));
}
