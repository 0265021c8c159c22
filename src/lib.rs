//! # hugroute
//!
//! **hugroute** exposes one function over several interfaces at once: as an
//! HTTP route, as a command-line command and as a locally callable function.
//! Every interface shares the same parameter typing and validation,
//! requirements, directives, transforms and output formatting, and HTTP routes
//! can be versioned.
//!
//! ## Architecture
//!
//! - **[`introspect`]** - what a function accepts: parameters, defaults,
//!   annotations
//! - **[`types`]** - converters and validators for parameter values
//! - **[`directives`]** - framework-supplied values injected into parameters
//! - **[`route`]** - routers and the route options they collect
//! - **[`interface`]** - the HTTP, CLI and local execution pipelines
//! - **[`api`]** - the registry everything is routed into, version resolution
//!   and the dispatching [`ApiServer`]
//! - **[`middleware`]** - request/response hooks (logging, CORS, sessions)
//! - **[`server`]** - development HTTP server on `may_minihttp`
//!
//! ## Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as ApiServer
//!     participant Middleware
//!     participant Interface as HttpInterface
//!     participant Handler
//!
//!     Client->>Server: GET /v2/echo?text=hi
//!     Server->>Middleware: before
//!     Server->>Server: strip base URL and /v2, resolve version
//!     Server->>Interface: route match (method, version)
//!     Interface->>Interface: requirements
//!     Interface->>Interface: gather query, path and body
//!     Interface->>Interface: directives, validation
//!     Interface->>Handler: call
//!     Handler-->>Interface: Content
//!     Interface->>Interface: transform, output format
//!     Server->>Middleware: after
//!     Server-->>Client: 200 "hi"
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use hugroute::api::Api;
//! use hugroute::http::Request;
//! use hugroute::route::{self, Router};
//! use hugroute::types;
//! use hugroute::{Call, Endpoint, Signature};
//!
//! let add = Endpoint::new(
//!     Signature::new("add")
//!         .param_with("a", types::number())
//!         .param_with("b", types::number()),
//!     |call: &mut Call<'_>| -> Result<i64, hugroute::ApiError> {
//!         Ok(call.arg::<i64>("a")? + call.arg::<i64>("b")?)
//!     },
//! );
//!
//! let mut api = Api::new("math");
//! route::get().route(&mut api, &add);
//! route::cli().route(&mut api, &add);
//! route::local().route(&mut api, &add);
//!
//! let local = api.call("add", vec![1.into(), 2.into()], Default::default()).unwrap();
//! assert_eq!(local, 3);
//!
//! let server = api.server().unwrap();
//! let mut response = server.handle(Request::get("/add?a=1&b=2")).unwrap();
//! assert_eq!(response.json().unwrap(), 3);
//! ```
//!
//! ## Runtime Considerations
//!
//! The development server runs on the `may` coroutine runtime; the coroutine
//! stack size comes from `HUGROUTE_STACK_SIZE`. Dispatch itself
//! ([`ApiServer::handle`]) is synchronous and runtime agnostic.

pub mod api;
pub mod authentication;
pub mod config;
pub mod context;
pub mod directives;
pub mod error;
pub mod format;
pub mod http;
pub mod ids;
pub mod interface;
pub mod introspect;
pub mod logging;
pub mod middleware;
pub mod redirect;
pub mod route;
pub mod server;
pub mod store;
pub mod transform;
pub mod types;
pub mod validate;

pub use api::{Api, ApiServer};
pub use error::{ApiError, Error};
pub use hugroute_macros::endpoint;
pub use interface::{Call, Content, Endpoint, IntoContent, Json};
pub use introspect::Signature;

// Lets `#[endpoint]` expansions name this crate as `::hugroute` from inside it.
extern crate self as hugroute;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
