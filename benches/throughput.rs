use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use hugroute::http::Request;
use hugroute::introspect::Signature;
use hugroute::route::{self, Router};
use hugroute::{types, Api, ApiError, ApiServer, Call, Endpoint};
use serde_json::{json, Map, Value};

fn zoo() -> ApiServer {
    let mut api = Api::new("zoo");
    let animal = Endpoint::new(
        Signature::new("animal").param_with("id", types::number()),
        |call: &mut Call<'_>| -> Result<Value, ApiError> { Ok(json!({"id": call.arg::<i64>("id")?})) },
    );
    route::get().urls(&["/zoo/animals/{id}"]).route(&mut api, &animal);

    let section = Endpoint::new(
        Signature::new("section")
            .param("category")
            .param_with("id", types::number())
            .param_with("habitat_id", types::number())
            .param_with("section_id", types::number()),
        |call: &mut Call<'_>| call.params().clone(),
    );
    route::get()
        .urls(&["/zoo/{category}/animals/{id}/habitats/{habitat_id}/sections/{section_id}"])
        .route(&mut api, &section);

    let add = Endpoint::new(
        Signature::new("add")
            .param_with("a", types::number())
            .param_with("b", types::number()),
        |call: &mut Call<'_>| -> Result<i64, ApiError> { Ok(call.arg::<i64>("a")? + call.arg::<i64>("b")?) },
    );
    route::get().versions(1..4).route(&mut api, &add);
    route::local().route(&mut api, &add);

    let health = Endpoint::new(Signature::new("health"), |_call: &mut Call<'_>| "ok");
    route::get().route(&mut api, &health);

    match api.server() {
        Ok(server) => server,
        Err(err) => panic!("failed to build benchmark api: {err}"),
    }
}

fn bench_http_dispatch(c: &mut Criterion) {
    let server = zoo();
    let targets = [
        "/health",
        "/zoo/animals/123",
        "/zoo/cats/animals/123/habitats/88/sections/5",
        "/v2/add?a=1&b=2",
        "/missing",
    ];
    c.bench_function("http_dispatch", |b| {
        b.iter(|| {
            for target in &targets {
                let response = server.handle(Request::get(black_box(target)));
                black_box(&response);
            }
        })
    });
}

fn bench_local_call(c: &mut Criterion) {
    let server = zoo();
    c.bench_function("local_call", |b| {
        b.iter(|| {
            let value = server
                .api()
                .call("add", vec![json!(1), json!(2)], Map::new());
            black_box(&value);
        })
    });
}

criterion_group!(benches, bench_http_dispatch, bench_local_call);
criterion_main!(benches);
