mod common;

use common::{get, json_body};
use http::StatusCode;
use hugroute::authentication;
use hugroute::error::{kinds, ErrorKind};
use hugroute::introspect::Signature;
use hugroute::route::{self, HttpOptions, Router};
use hugroute::{redirect, Api, ApiError, Call, Endpoint, Error};
use serde_json::{json, Value};

static BASE: ErrorKind = ErrorKind::extends("BaseError", &kinds::APPLICATION);
static FRIENDLY: ErrorKind = ErrorKind::extends("FriendlyError", &BASE);

/// `/raise?kind=...` fails with the named kind.
fn raiser() -> Endpoint {
    Endpoint::new(
        Signature::new("raise").param("kind"),
        |call: &mut Call<'_>| -> Result<Value, ApiError> {
            let kind: String = call.arg("kind")?;
            Err(match kind.as_str() {
                "friendly" => ApiError::new(&FRIENDLY, "be nice"),
                "base" => ApiError::new(&BASE, "base failure"),
                _ => ApiError::application("plain failure"),
            })
        },
    )
}

fn reporter(label: &'static str) -> Endpoint {
    Endpoint::new(Signature::new(label), move |call: &mut Call<'_>| {
        let exception = call.exception().map(|err| err.to_value()).unwrap_or(Value::Null);
        json!({"handler": label, "exception": exception})
    })
}

#[test]
fn test_most_specific_handler_wins() {
    let mut api = Api::new("exceptions");
    route::get().route(&mut api, &raiser());
    route::exception(&[&FRIENDLY]).route(&mut api, &reporter("friendly"));
    route::exception(&[&BASE]).route(&mut api, &reporter("base"));
    let server = api.server().unwrap();

    let mut friendly = get(&server, "/raise?kind=friendly");
    let body = json_body(&mut friendly);
    assert_eq!(body["handler"], json!("friendly"));
    assert_eq!(body["exception"]["message"], json!("be nice"));

    let mut base = get(&server, "/raise?kind=base");
    assert_eq!(json_body(&mut base)["handler"], json!("base"));
}

#[test]
fn test_unclaimed_error_is_returned() {
    let mut api = Api::new("exceptions");
    route::get().route(&mut api, &raiser());
    route::exception(&[&BASE]).route(&mut api, &reporter("base"));
    let server = api.server().unwrap();

    match server.handle(hugroute::http::Request::get("/raise?kind=plain")) {
        Err(Error::Unhandled(err)) => assert_eq!(err.message(), "plain failure"),
        other => panic!("expected an unhandled error, got {other:?}"),
    }
}

#[test]
fn test_excluded_kinds_are_skipped() {
    let mut api = Api::new("exceptions");
    route::get().route(&mut api, &raiser());
    route::exception(&[&kinds::APPLICATION]).route(&mut api, &reporter("catch_all"));
    route::exception(&[&BASE])
        .exclude(&[&FRIENDLY])
        .route(&mut api, &reporter("base_only"));
    let server = api.server().unwrap();

    assert_eq!(json_body(&mut get(&server, "/raise?kind=base"))["handler"], json!("base_only"));
    assert_eq!(
        json_body(&mut get(&server, "/raise?kind=friendly"))["handler"],
        json!("catch_all")
    );
    assert_eq!(json_body(&mut get(&server, "/raise?kind=plain"))["handler"], json!("catch_all"));
}

#[test]
fn test_latest_registration_wins_ties() {
    let mut api = Api::new("exceptions");
    route::get().route(&mut api, &raiser());
    route::exception(&[&BASE]).route(&mut api, &reporter("first"));
    route::exception(&[&BASE]).route(&mut api, &reporter("second"));
    let server = api.server().unwrap();

    assert_eq!(json_body(&mut get(&server, "/raise?kind=base"))["handler"], json!("second"));
}

#[test]
fn test_versioned_handler_preferred() {
    let mut api = Api::new("exceptions");
    route::get().versions([1, 2]).route(&mut api, &raiser());
    route::exception(&[&BASE]).route(&mut api, &reporter("any_version"));
    route::exception(&[&BASE])
        .versions(2)
        .route(&mut api, &reporter("version_two"));
    let server = api.server().unwrap();

    assert_eq!(
        json_body(&mut get(&server, "/v1/raise?kind=base"))["handler"],
        json!("any_version")
    );
    assert_eq!(
        json_body(&mut get(&server, "/v2/raise?kind=base"))["handler"],
        json!("version_two")
    );
}

#[test]
fn test_exception_handler_status() {
    let mut api = Api::new("exceptions");
    route::get().route(&mut api, &raiser());
    route::exception(&[&BASE])
        .status(StatusCode::CONFLICT)
        .route(&mut api, &reporter("base"));
    let server = api.server().unwrap();

    assert_eq!(get(&server, "/raise?kind=friendly").status, StatusCode::CONFLICT);
}

#[test]
fn test_unclaimed_status_errors_are_rendered() {
    let secret = Endpoint::new(Signature::new("secret"), |_call: &mut Call<'_>| "hidden");
    let mut api = Api::new("auth");
    route::get()
        .requires([authentication::api_key(|key| (key == "k1").then(|| json!("bot")))])
        .route(&mut api, &secret);
    let server = api.server().unwrap();

    let mut denied = get(&server, "/secret");
    assert_eq!(denied.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(&mut denied),
        json!({"errors": {"Authentication Required": "Please provide valid API Key credentials"}})
    );

    let request = hugroute::http::Request::get("/secret").with_header("X-Api-Key", "k1");
    let mut allowed = common::send(&server, request);
    assert_eq!(json_body(&mut allowed), json!("hidden"));
}

#[test]
fn test_redirects_have_empty_bodies() {
    let moved = Endpoint::new(
        Signature::new("moved"),
        |_call: &mut Call<'_>| -> Result<Value, ApiError> { Err(redirect::see_other("/new-home")) },
    );
    let mut api = Api::new("redirects");
    route::get().route(&mut api, &moved);
    let server = api.server().unwrap();

    let mut response = get(&server, "/moved");
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.header("Location"), Some("/new-home"));
    assert!(response.take_bytes().unwrap().is_empty());
}

#[test]
fn test_error_in_exception_handler_is_not_recaught() {
    let failing = Endpoint::new(
        Signature::new("failing"),
        |_call: &mut Call<'_>| -> Result<Value, ApiError> { Err(ApiError::new(&BASE, "again")) },
    );
    let mut api = Api::new("exceptions");
    route::get().route(&mut api, &raiser());
    route::exception(&[&BASE]).route(&mut api, &failing);
    let server = api.server().unwrap();

    let result = server.handle(hugroute::http::Request::get("/raise?kind=base"));
    assert!(matches!(result, Err(Error::Unhandled(err)) if err.message() == "again"));
}
