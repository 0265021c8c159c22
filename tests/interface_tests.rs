mod common;

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::{args, get, json_body, send};
use http::StatusCode;
use hugroute::context::{Context, Outcome};
use hugroute::directives::{self, Resource};
use hugroute::http::Request;
use hugroute::interface::{requirement, Conclusion};
use hugroute::introspect::Signature;
use hugroute::route::{self, Router};
use hugroute::{types, Api, ApiError, Call, Content, Endpoint, Error};
use serde_json::{json, Map, Value};

fn add_numbers() -> Endpoint {
    Endpoint::new(
        Signature::new("add")
            .param_with("numbers", types::multiple())
            .doc("Adds the given numbers"),
        |call: &mut Call<'_>| -> Result<i64, ApiError> {
            let numbers: Vec<String> = call.arg("numbers")?;
            numbers
                .iter()
                .map(|number| {
                    number
                        .parse::<i64>()
                        .map_err(|_| ApiError::invalid(format!("Not a number: {number}")))
                })
                .sum()
        },
    )
}

fn shout() -> Endpoint {
    Endpoint::new(
        Signature::new("shout")
            .param("text")
            .optional_with("times", json!(1), types::number()),
        |call: &mut Call<'_>| -> Result<String, ApiError> {
            let text: String = call.arg("text")?;
            let times: usize = call.arg("times")?;
            Ok(text.to_uppercase().repeat(times))
        },
    )
}

#[test]
fn test_cli_sums_repeated_positionals() {
    let mut api = Api::new("calculator");
    route::cli().route(&mut api, &add_numbers());
    route::cli().route(&mut api, &shout());

    let mut out = Vec::new();
    let value = api.cli.run(&api, &args(&["add", "1", "2", "3"]), &mut out).unwrap();
    assert_eq!(value, json!(6));
    assert_eq!(String::from_utf8(out).unwrap(), "6\n");

    let mut out = Vec::new();
    let value = api
        .cli
        .run(&api, &args(&["shout", "hey", "--times", "2"]), &mut out)
        .unwrap();
    assert_eq!(value, json!("HEYHEY"));
}

#[test]
fn test_cli_unknown_command_prints_usage() {
    let mut api = Api::new("calculator");
    route::cli().route(&mut api, &add_numbers());
    route::cli().route(&mut api, &shout());

    match api.cli.run(&api, &args(&["divide", "1"]), &mut Vec::new()) {
        Err(Error::Cli { message, code }) => {
            assert_eq!(code, 1);
            assert!(message.starts_with("calculator"));
            assert!(message.contains("- add: Adds the given numbers"));
            assert!(message.contains("- shout"));
        }
        other => panic!("expected usage, got {other:?}"),
    }
}

#[test]
fn test_cli_single_command_runs_directly() {
    let mut api = Api::new("shouter");
    route::cli().name("yell").route(&mut api, &shout());

    let mut out = Vec::new();
    let value = api.cli.run(&api, &args(&["quiet"]), &mut out).unwrap();
    assert_eq!(value, json!("QUIET"));
    assert_eq!(api.cli.commands().collect::<Vec<_>>(), ["yell"]);
}

#[test]
fn test_cli_application_error_is_unhandled() {
    let mut api = Api::new("calculator");
    route::cli().route(&mut api, &add_numbers());

    let result = api.cli.run(&api, &args(&["add", "1", "two"]), &mut Vec::new());
    assert!(matches!(result, Err(Error::Unhandled(err)) if err.message() == "Not a number: two"));
}

#[test]
fn test_local_calls_bind_positionals_and_keywords() {
    let mut api = Api::new("local");
    route::local().route(&mut api, &shout());

    assert_eq!(api.call("shout", vec![json!("hi")], Map::new()).unwrap(), json!("HI"));

    let mut kwargs = Map::new();
    kwargs.insert("times".to_string(), json!(3));
    assert_eq!(api.call("shout", vec![json!("a")], kwargs).unwrap(), json!("AAA"));

    let invalid = api.call("shout", Vec::new(), Map::new()).unwrap();
    assert_eq!(invalid, json!({"errors": {"text": "Required parameter not supplied"}}));

    assert!(matches!(
        api.call("missing", Vec::new(), Map::new()),
        Err(Error::Unhandled(err)) if err.is_not_found()
    ));
}

#[test]
fn test_local_too_many_positionals() {
    let mut api = Api::new("local");
    route::local().route(&mut api, &shout());

    let result = api.call("shout", vec![json!("a"), json!(1), json!(2)], Map::new());
    assert!(result.is_err());
}

/// Records each cleanup with the error it saw.
struct Tracked {
    cleanups: Arc<Mutex<Vec<Option<String>>>>,
}

impl Resource for Tracked {
    fn as_value(&self) -> Value {
        json!("tracked")
    }

    fn cleanup(&self, error: Option<&ApiError>) {
        self.cleanups
            .lock()
            .unwrap()
            .push(error.map(|err| err.message().to_string()));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn tracked_api(cleanups: &Arc<Mutex<Vec<Option<String>>>>) -> Api {
    let mut api = Api::new("directives");
    let shared = Arc::clone(cleanups);
    api.add_directive(directives::resource_fn("tracked", "A tracked resource", move |_ctx| {
        Ok(Arc::new(Tracked {
            cleanups: Arc::clone(&shared),
        }) as Arc<dyn Resource>)
    }));
    let work = Endpoint::new(
        Signature::new("work")
            .param("with_tracked")
            .optional_with("fail", json!(false), types::smart_boolean()),
        |call: &mut Call<'_>| -> Result<Value, ApiError> {
            if call.arg::<bool>("fail")? {
                return Err(ApiError::application("boom"));
            }
            let injected = call.directive::<Tracked>("with_tracked").is_some();
            Ok(json!({"injected": injected, "value": call.arg::<Value>("with_tracked")?}))
        },
    );
    route::get().route(&mut api, &work);
    route::local().route(&mut api, &work);
    api
}

#[test]
fn test_directive_resources_are_cleaned_up_once() {
    let cleanups = Arc::new(Mutex::new(Vec::new()));
    let server = tracked_api(&cleanups).server().unwrap();

    let mut response = get(&server, "/work");
    assert_eq!(json_body(&mut response), json!({"injected": true, "value": "tracked"}));
    assert_eq!(*cleanups.lock().unwrap(), [None]);

    assert!(server.handle(Request::get("/work?fail=true")).is_err());
    assert_eq!(*cleanups.lock().unwrap(), [None, Some("boom".to_string())]);

    let value = server.api().call("work", Vec::new(), Map::new()).unwrap();
    assert_eq!(value["injected"], json!(true));
    assert_eq!(cleanups.lock().unwrap().len(), 3);
}

#[test]
fn test_http_directives_ignore_caller_values() {
    let cleanups = Arc::new(Mutex::new(Vec::new()));
    let server = tracked_api(&cleanups).server().unwrap();

    let mut response = get(&server, "/work?with_tracked=forged");
    assert_eq!(json_body(&mut response)["value"], json!("tracked"));

    let mut kwargs = Map::new();
    kwargs.insert("with_tracked".to_string(), json!("supplied"));
    let value = server.api().call("work", Vec::new(), kwargs).unwrap();
    assert_eq!(value["value"], json!("supplied"));
}

#[test]
fn test_builtin_directives() {
    let mut api = Api::new("builtins");
    let info = Endpoint::new(
        Signature::new("info").param("with_api_version").param("with_module"),
        |call: &mut Call<'_>| -> Result<Value, ApiError> {
            Ok(json!([call.arg::<Value>("with_api_version")?, call.arg::<Value>("with_module")?]))
        },
    );
    route::get().versions(2).route(&mut api, &info);
    let server = api.server().unwrap();

    let mut response = get(&server, "/v2/info");
    assert_eq!(json_body(&mut response), json!([2, "builtins"]));
}

struct Tenant(&'static str);

fn label(outcome: &Outcome<'_>) -> &'static str {
    match outcome {
        Outcome::Completed => "completed",
        Outcome::Invalid(_) => "invalid",
        Outcome::Lacking(_) => "lacking",
        Outcome::Failed(_) => "failed",
    }
}

#[test]
fn test_context_factory_and_cleanup() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut api = Api::new("contexts");
    api.set_context_factory(|kind, interface, version| {
        let mut context = Context::new(kind, interface, version);
        context.insert(Tenant("acme"));
        context
    });
    let sink = Arc::clone(&log);
    api.set_context_cleanup(move |context, outcome| {
        sink.lock()
            .unwrap()
            .push(format!("{}:{}", context.interface(), label(outcome)));
    });

    let tenant = Endpoint::new(
        Signature::new("tenant").param_with("count", types::number()),
        |call: &mut Call<'_>| -> Result<String, ApiError> {
            if call.arg::<i64>("count")? < 0 {
                return Err(ApiError::application("negative"));
            }
            Ok(call
                .context()
                .get::<Tenant>()
                .map_or("none", |tenant| tenant.0)
                .to_string())
        },
    );
    let gate = requirement(|ctx| {
        let denied = ctx
            .request
            .as_deref()
            .and_then(|request| request.header("x-deny"))
            .is_some();
        Ok(if denied {
            Conclusion::Deny(json!("denied"))
        } else {
            Conclusion::Pass
        })
    });
    route::get().requires([gate]).route(&mut api, &tenant);
    let server = api.server().unwrap();

    assert_eq!(json_body(&mut get(&server, "/tenant?count=1")), json!("acme"));
    assert_eq!(get(&server, "/tenant?count=x").status, StatusCode::BAD_REQUEST);
    let mut denied = send(&server, Request::get("/tenant?count=1").with_header("X-Deny", "1"));
    assert_eq!(json_body(&mut denied), json!("denied"));
    assert!(server.handle(Request::get("/tenant?count=-1")).is_err());

    assert_eq!(
        *log.lock().unwrap(),
        [
            "tenant:completed",
            "tenant:invalid",
            "tenant:lacking",
            "tenant:failed",
        ]
    );
}

#[test]
fn test_startup_handlers_run_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut api = Api::new("startup");
    let counter = Arc::clone(&runs);
    api.add_startup_handler(move |_api| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    route::get().route(&mut api, &shout());
    route::local().route(&mut api, &shout());
    route::cli().route(&mut api, &shout());
    let server = api.server().unwrap();
    assert!(!server.api().is_started());

    get(&server, "/shout?text=a");
    get(&server, "/shout?text=b");
    server.api().call("shout", vec![json!("c")], Map::new()).unwrap();
    server
        .api()
        .cli
        .run(server.api(), &args(&["d"]), &mut Vec::new())
        .unwrap();

    assert!(server.api().is_started());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_forwarding_between_functions() {
    let target = shout();
    let mut api = Api::new("forward");
    route::get().route(&mut api, &target);
    let forwarded = target.clone();
    let legacy = Endpoint::new(Signature::new("legacy"), move |_call: &mut Call<'_>| {
        Content::Forward(forwarded.clone())
    });
    route::get().route(&mut api, &legacy);
    let by_name = Endpoint::new(Signature::new("by_name"), |_call: &mut Call<'_>| {
        Content::forward_named("shout")
    });
    route::get().route(&mut api, &by_name);
    route::local().route(&mut api, &by_name);
    let server = api.server().unwrap();

    assert_eq!(json_body(&mut get(&server, "/legacy?text=yo")), json!("YO"));
    assert_eq!(json_body(&mut get(&server, "/by_name?text=yo&times=2")), json!("YOYO"));
    assert!(server.api().call("by_name", Vec::new(), Map::new()).is_err());
}
