//! # switchyard
//!
//! An embeddable HTTP router: one radix tree per method, and a dispatch
//! pipeline that converts path parameters into the types your handler
//! declares before calling it.
//!
//! ## What it does
//!
//! - Radix-tree routing with `:name` segments and `*rest` catch-alls. Static
//!   segments win over parameters regardless of registration order.
//! - Typed handlers: `async fn(ctx, org: String, id: u64)` gets its params
//!   converted by position. A value that does not convert answers `400` and
//!   the handler never runs.
//! - Plain handlers (`async fn(Request)`) and hyper services ([`Native`])
//!   mount side by side with typed ones.
//! - `405` with `Allow`, automatic `OPTIONS`, trailing-slash redirects.
//! - Registration while serving, through [`SharedRouter`].
//!
//! Routing problems are found at registration: conflicting wildcards, a
//! duplicate route, or a typed handler whose parameter count does not match
//! its pattern all fail with a [`RouteError`] before anything is served.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use serde::Deserialize;
//! use switchyard::{Context, Ctx, Json, Request, Response, Router, Server};
//!
//! #[derive(Deserialize)]
//! struct NewApp {
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .get("/orgs/:org/apps/:id", show_app)
//!         .post("/orgs/:org/apps", create_app)
//!         .get("/static/*file", static_file);
//!
//!     Server::bind(([0, 0, 0, 0], 3000)).serve(app).await.unwrap();
//! }
//!
//! async fn show_app(ctx: Ctx, org: String, id: u64) -> Response {
//!     ctx.json(&serde_json::json!({ "org": org, "id": id }))
//! }
//!
//! async fn create_app(ctx: Json<NewApp>, org: String) -> Response {
//!     let name = ctx.body().map(|b| b.name.as_str()).unwrap_or_default();
//!     ctx.text(format!("created {org}/{name}"))
//! }
//!
//! async fn static_file(req: Request) -> String {
//!     format!("file {}", req.param("file").unwrap_or_default())
//! }
//! ```

mod context;
mod dispatch;
mod error;
mod handler;
mod method;
mod params;
mod request;
mod response;
mod router;
mod server;
mod shared;

pub mod tree;

pub use context::{Context, Ctx, Json};
pub use error::{BoxError, Error, Rejection, RouteError};
pub use handler::{Endpoint, IntoEndpoint, Native, Shape};
pub use method::Method;
pub use params::{FromParam, Param, ParamError, Params};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::{Resolution, Router};
pub use server::Server;
pub use shared::SharedRouter;
