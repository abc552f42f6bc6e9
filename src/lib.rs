//! # users-api
//!
//! An async HTTP/1.1 service exposing CRUD over an in-memory `users`
//! collection, routed by a small first-match URL router.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use users_api::database::MemoryDatabase;
//! use users_api::middleware::{JsonMiddleware, LoggerMiddleware, Pipeline};
//! use users_api::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let routes = users_api::users::routes(Arc::new(MemoryDatabase::new()))?;
//!     let app = Arc::new(Pipeline::new(routes).with(LoggerMiddleware).with(JsonMiddleware));
//!
//!     let server = Server::bind("127.0.0.1:3333").await?;
//!     server
//!         .run(move |req| {
//!             let app = Arc::clone(&app);
//!             async move { app.handle(req).await }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod database;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;
pub mod users;

pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::{PatternError, RouteTable, Router};
pub use server::{Server, ServerError};
