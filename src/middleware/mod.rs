//! Middleware pipeline: composable before/after request logic around the router.
//!
//! ## Core types
//!
//! - [`Middleware`]: trait implemented by all middleware.
//! - [`Next`]: cursor into the remaining chain; call [`Next::run`] to advance.
//! - [`MiddlewareHandler`]: type-erased, cheaply-cloneable middleware function.
//! - [`Pipeline`]: an ordered middleware stack terminated by a [`RouteTable`].
//! - [`LoggerMiddleware`]: one structured log line per request.
//! - [`JsonMiddleware`]: JSON request body decoding and JSON response content type.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::context::Context;
use crate::router::{ResponseFuture, RouteTable};
use crate::{Request, Response, StatusCode};

/// A type-erased, reference-counted middleware function.
pub type MiddlewareHandler = Arc<dyn Fn(Context, Next) -> ResponseFuture + Send + Sync + 'static>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`run`](Self::run), so each middleware can forward a
/// request at most once.
pub struct Next {
    middlewares: Arc<[MiddlewareHandler]>,
    // Position of the middleware invoked by the next `run` call.
    index: usize,
}

impl Next {
    /// Creates a `Next` positioned at the start of `middlewares`.
    pub fn new(middlewares: Arc<[MiddlewareHandler]>) -> Self {
        Self {
            middlewares,
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// If the chain is exhausted without any layer producing a response, a
    /// `500 Internal Server Error` is returned.
    pub async fn run(mut self, ctx: Context) -> Response {
        match self.middlewares.get(self.index).cloned() {
            Some(handler) => {
                self.index += 1;
                handler(ctx, self).await
            }
            None => Response::new(StatusCode::InternalServerError),
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors may pass a request through (`next.run(ctx).await`),
/// short-circuit by returning a [`Response`] without calling `next`, or
/// decorate the downstream response.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> ResponseFuture;
}

/// Ordered middleware stack whose innermost layer is a [`RouteTable`].
///
/// # Examples
///
/// ```
/// use users_api::middleware::{JsonMiddleware, LoggerMiddleware, Pipeline};
/// use users_api::Router;
///
/// let table = Router::new().build().unwrap();
/// let pipeline = Pipeline::new(table)
///     .with(LoggerMiddleware)
///     .with(JsonMiddleware);
/// ```
pub struct Pipeline {
    layers: Vec<MiddlewareHandler>,
    routes: Arc<RouteTable>,
    chain: Arc<[MiddlewareHandler]>,
}

impl Pipeline {
    pub fn new(routes: RouteTable) -> Self {
        let routes = Arc::new(routes);
        let chain = Self::assemble(&[], &routes);
        Self {
            layers: Vec::new(),
            routes,
            chain,
        }
    }

    /// Append `middleware`; earlier layers wrap later ones.
    #[must_use]
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.layers.push(from_middleware(Arc::new(middleware)));
        self.chain = Self::assemble(&self.layers, &self.routes);
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Run `request` through every layer and then the route table.
    pub async fn handle(&self, request: Request) -> Response {
        Next::new(Arc::clone(&self.chain))
            .run(Context::new(request))
            .await
    }

    // The route table always sits at the end of the chain and never calls `next`.
    fn assemble(
        layers: &[MiddlewareHandler],
        routes: &Arc<RouteTable>,
    ) -> Arc<[MiddlewareHandler]> {
        let routes = Arc::clone(routes);
        let terminal: MiddlewareHandler =
            Arc::new(move |ctx: Context, _next: Next| -> ResponseFuture {
                let routes = Arc::clone(&routes);
                Box::pin(async move { routes.serve(ctx).await })
            });
        layers.iter().cloned().chain([terminal]).collect()
    }
}

/// Logs each request's method, target, status, and duration.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> ResponseFuture {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().to_string();
            let target = ctx.request().target().to_owned();

            let response = next.run(ctx).await;

            info!(
                %method,
                %target,
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "request handled"
            );
            response
        })
    }
}

/// Decodes JSON request bodies and marks responses as JSON.
///
/// A non-empty body is parsed into a [`serde_json::Value`] and stored on the
/// [`Context`]; a body that is not valid JSON is answered with
/// `400 Bad Request` without reaching the router. Responses without a
/// `Content-Type` are given `application/json`.
pub struct JsonMiddleware;

impl Middleware for JsonMiddleware {
    fn handle(&self, mut ctx: Context, next: Next) -> ResponseFuture {
        Box::pin(async move {
            if !ctx.request().body().is_empty() {
                let parsed: Result<serde_json::Value, _> =
                    serde_json::from_slice(ctx.request().body());
                match parsed {
                    Ok(value) => ctx.set_body(value),
                    Err(e) => {
                        warn!(error = %e, "rejecting request with malformed JSON body");
                        return Response::new(StatusCode::BadRequest)
                            .json(&serde_json::json!({ "error": "malformed JSON body" }));
                    }
                }
            }

            let mut response = next.run(ctx).await;
            if !response.headers().contains("content-type") {
                response.set_header("Content-Type", "application/json");
            }
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Router;

    fn make_request(method: &str, target: &str, body: &str) -> Request {
        let raw = format!(
            "{method} {target} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req.with_body(body.as_bytes().to_vec())
    }

    fn echo_table() -> RouteTable {
        let mut router = Router::new();
        router.post("/echo", |ctx: Context| async move {
            match ctx.body() {
                Some(body) => Response::new(StatusCode::Ok).json(body),
                None => Response::new(StatusCode::NoContent),
            }
        });
        router.build().unwrap()
    }

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn handle(&self, ctx: Context, next: Next) -> ResponseFuture {
            let tag = self.0;
            Box::pin(async move {
                let mut response = next.run(ctx).await;
                let seen = response.headers().get("x-order").unwrap_or_default().to_owned();
                response.set_header("X-Order", format!("{seen}{tag}"));
                response
            })
        }
    }

    struct ShortCircuit;

    impl Middleware for ShortCircuit {
        fn handle(&self, _ctx: Context, _next: Next) -> ResponseFuture {
            Box::pin(async { Response::new(StatusCode::ServiceUnavailable) })
        }
    }

    #[tokio::test]
    async fn exhausted_chain_is_500() {
        let res = Next::new(Arc::from(Vec::new()))
            .run(Context::new(make_request("GET", "/", "")))
            .await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
    }

    #[tokio::test]
    async fn pipeline_without_layers_routes() {
        let pipeline = Pipeline::new(echo_table());
        let res = pipeline.handle(make_request("POST", "/echo", "")).await;
        assert_eq!(res.status(), StatusCode::NoContent);

        let res = pipeline.handle(make_request("GET", "/missing", "")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn layers_run_outermost_first() {
        let pipeline = Pipeline::new(echo_table()).with(Tag("a")).with(Tag("b"));
        let res = pipeline.handle(make_request("POST", "/echo", "")).await;
        // Inner layers decorate first on the way out.
        assert_eq!(res.headers().get("x-order"), Some("ba"));
    }

    #[tokio::test]
    async fn short_circuit_skips_router() {
        let pipeline = Pipeline::new(echo_table()).with(ShortCircuit);
        let res = pipeline.handle(make_request("POST", "/echo", "{}")).await;
        assert_eq!(res.status(), StatusCode::ServiceUnavailable);
    }

    #[tokio::test]
    async fn json_body_reaches_handler() {
        let pipeline = Pipeline::new(echo_table()).with(JsonMiddleware);
        let res = pipeline
            .handle(make_request("POST", "/echo", r#"{"name":"ann"}"#))
            .await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.body_bytes(), br#"{"name":"ann"}"#);
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let pipeline = Pipeline::new(echo_table()).with(JsonMiddleware);
        let res = pipeline.handle(make_request("POST", "/echo", "{name")).await;
        assert_eq!(res.status(), StatusCode::BadRequest);
        assert_eq!(res.headers().get("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn json_content_type_added_to_all_responses() {
        let pipeline = Pipeline::new(echo_table()).with(JsonMiddleware);
        let res = pipeline.handle(make_request("GET", "/missing", "")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
        assert_eq!(res.headers().get("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn logger_passes_response_through() {
        let pipeline = Pipeline::new(echo_table()).with(LoggerMiddleware);
        let res = pipeline.handle(make_request("POST", "/echo", "")).await;
        assert_eq!(res.status(), StatusCode::NoContent);
    }
}
