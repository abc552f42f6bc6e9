//! Request routing: map HTTP methods and URL templates to handler functions.
//!
//! Route templates are compiled by [`RoutePattern`]; a literal segment must
//! match exactly and a `:name` segment captures one or more characters from
//! `[a-z0-9_-]`:
//!
//! | Template     | Example target        | Params          | Raw query     |
//! |--------------|-----------------------|-----------------|---------------|
//! | `/users`     | `/users?search=john`  | *(none)*        | `search=john` |
//! | `/users/:id` | `/users/42`           | `id → "42"`     | *(none)*      |
//!
//! Routes live in a [`RouteTable`] in declaration order. [`RouteTable::dispatch`]
//! scans it linearly and the first entry whose method and pattern both match
//! wins. There is no trailing-slash normalization, no wildcard and no
//! case folding.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::context::{Context, PathParams};
use crate::{Method, Response, StatusCode};

pub mod pattern;

pub use pattern::{PatternError, PatternMatch, RoutePattern};

/// The boxed future every handler and middleware resolves through.
pub type ResponseFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Type-erased async handler that processes a [`Context`] and returns a [`Response`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so the route table can be
/// shared across connection tasks. Build them through [`Router`] or [`handler`].
pub type Handler = Arc<dyn Fn(Context) -> ResponseFuture + Send + Sync + 'static>;

/// Erase the concrete type of an async handler function.
pub fn handler<H, F>(h: H) -> Handler
where
    H: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |ctx: Context| -> ResponseFuture { Box::pin(h(ctx)) })
}

/// One compiled route: method, pattern and handler.
pub struct RouteEntry {
    method: Method,
    pattern: RoutePattern,
    handler: Handler,
}

impl RouteEntry {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("pattern", &self.pattern.template())
            .finish_non_exhaustive()
    }
}

/// A successful dispatch: the winning entry plus what its pattern extracted.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    /// Position of the entry in declaration order.
    pub index: usize,
    pub entry: &'a RouteEntry,
    pub params: PathParams,
    /// Raw query string without the leading `?`.
    pub raw_query: Option<String>,
}

impl RouteMatch<'_> {
    pub fn handler(&self) -> &Handler {
        &self.entry.handler
    }
}

/// The immutable, ordered list of routes consulted on every request.
///
/// # Examples
///
/// ```
/// use users_api::router::{RouteTable, handler};
/// use users_api::{Method, Response, StatusCode};
///
/// let ok = handler(|_ctx| async { Response::new(StatusCode::Ok) });
/// let table = RouteTable::build([
///     (Method::Get, "/users", ok.clone()),
///     (Method::Put, "/users/:id", ok),
/// ])
/// .unwrap();
///
/// let m = table.dispatch(&Method::Put, "/users/42").unwrap();
/// assert_eq!(m.index, 1);
/// assert_eq!(m.params.get("id"), Some("42"));
///
/// assert!(table.dispatch(&Method::Get, "/unknown").is_none());
/// ```
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Compile every template in `entries`, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns the [`PatternError`] of the first template that fails to compile;
    /// no table is produced in that case.
    pub fn build<'t, I>(entries: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = (Method, &'t str, Handler)>,
    {
        let entries = entries
            .into_iter()
            .map(|(method, template, handler)| {
                Ok(RouteEntry {
                    method,
                    pattern: RoutePattern::compile(template)?,
                    handler,
                })
            })
            .collect::<Result<Vec<_>, PatternError>>()?;

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Find the first entry registered for `method` whose pattern matches `target`.
    ///
    /// `target` is the raw request target; a `?query` suffix is returned as
    /// [`RouteMatch::raw_query`]. `None` means no route matched.
    pub fn dispatch(&self, method: &Method, target: &str) -> Option<RouteMatch<'_>> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| &entry.method == method)
            .find_map(|(index, entry)| {
                entry.pattern.matches(target).map(|m| RouteMatch {
                    index,
                    entry,
                    params: m.params,
                    raw_query: m.query,
                })
            })
    }

    /// Dispatch the context's request and run the matching handler.
    ///
    /// Returns `404 Not Found` when no route matches.
    pub async fn serve(&self, mut ctx: Context) -> Response {
        let request = ctx.request();
        let Some(found) = self.dispatch(request.method(), request.target()) else {
            debug!(
                method = %request.method(),
                target = %request.target(),
                "no route matched"
            );
            return Response::new(StatusCode::NotFound);
        };

        debug!(
            method = %found.entry.method,
            route = %found.entry.pattern,
            index = found.index,
            "route matched"
        );
        let handler = Arc::clone(found.handler());
        ctx.set_route(found.params, found.raw_query.as_deref());
        handler(ctx).await
    }
}

/// Builder that collects routes in declaration order and compiles them into a
/// [`RouteTable`].
///
/// # Examples
///
/// ```
/// use users_api::{Response, Router, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/ping", |_ctx| async { Response::new(StatusCode::Ok) });
/// router.delete("/users/:id", |_ctx| async { Response::new(StatusCode::NoContent) });
///
/// let table = router.build().unwrap();
/// assert_eq!(table.len(), 2);
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<(Method, String, Handler)>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `GET` requests matching `template`.
    pub fn get<H, F>(&mut self, template: &str, h: H) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.route(Method::Get, template, h)
    }

    /// Register a handler for `POST` requests matching `template`.
    pub fn post<H, F>(&mut self, template: &str, h: H) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.route(Method::Post, template, h)
    }

    /// Register a handler for `PUT` requests matching `template`.
    pub fn put<H, F>(&mut self, template: &str, h: H) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.route(Method::Put, template, h)
    }

    /// Register a handler for `DELETE` requests matching `template`.
    pub fn delete<H, F>(&mut self, template: &str, h: H) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.route(Method::Delete, template, h)
    }

    /// Register a handler for `method`. Templates are compiled by [`build`](Self::build).
    pub fn route<H, F>(&mut self, method: Method, template: &str, h: H) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.routes.push((method, template.to_owned(), handler(h)));
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Compile all registered templates into a [`RouteTable`].
    ///
    /// # Errors
    ///
    /// Fails with the first template's [`PatternError`].
    pub fn build(self) -> Result<RouteTable, PatternError> {
        let routes = self.routes;
        RouteTable::build(
            routes
                .iter()
                .map(|(method, template, h)| (method.clone(), template.as_str(), Arc::clone(h))),
        )
    }
}
