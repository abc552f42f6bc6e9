//! The `users` resource: list, create, update and delete over a [`Database`].
//!
//! | Method   | Route        | Success                          |
//! |----------|--------------|----------------------------------|
//! | `GET`    | `/users`     | `200` with a JSON array          |
//! | `POST`   | `/users`     | `201`, empty body                |
//! | `PUT`    | `/users/:id` | `204`, `404` for an unknown id   |
//! | `DELETE` | `/users/:id` | `204`, `404` for an unknown id   |
//!
//! `GET /users?search=term` returns the users whose name or email contains
//! `term`, ignoring case. An empty `term` is the same as no search.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::Context;
use crate::database::{Database, Filter, Record};
use crate::router::{PatternError, RouteTable, Router};
use crate::{Response, StatusCode};

/// Storage table holding user records.
pub const TABLE: &str = "users";

/// Fields accepted by `POST /users` and `PUT /users/:id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserInput {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserInput {
    // Absent fields are left out of the record.
    fn into_record(self, id: Option<String>) -> Record {
        let mut record = Record::new();
        if let Some(id) = id {
            record.insert("id".to_owned(), Value::String(id));
        }
        if let Some(name) = self.name {
            record.insert("name".to_owned(), Value::String(name));
        }
        if let Some(email) = self.email {
            record.insert("email".to_owned(), Value::String(email));
        }
        record
    }
}

/// Build the route table for the users resource.
///
/// # Errors
///
/// Fails only if one of the route templates is invalid.
pub fn routes(db: Arc<dyn Database>) -> Result<RouteTable, PatternError> {
    let mut router = Router::new();

    let list_db = Arc::clone(&db);
    router.get("/users", move |ctx: Context| {
        let db = Arc::clone(&list_db);
        async move { list(db.as_ref(), &ctx) }
    });

    let create_db = Arc::clone(&db);
    router.post("/users", move |ctx: Context| {
        let db = Arc::clone(&create_db);
        async move { create(db.as_ref(), &ctx) }
    });

    let update_db = Arc::clone(&db);
    router.put("/users/:id", move |ctx: Context| {
        let db = Arc::clone(&update_db);
        async move { update(db.as_ref(), &ctx) }
    });

    router.delete("/users/:id", move |ctx: Context| {
        let db = Arc::clone(&db);
        async move { delete(db.as_ref(), &ctx) }
    });

    router.build()
}

fn list(db: &dyn Database, ctx: &Context) -> Response {
    // An empty `search` lists everything, including records with no name or email.
    let filter = ctx
        .query()
        .get("search")
        .filter(|term| !term.is_empty())
        .map(|term| {
            Filter::from([
                ("name".to_owned(), term.to_owned()),
                ("email".to_owned(), term.to_owned()),
            ])
        });

    let users = db.select(TABLE, filter.as_ref());
    debug!(count = users.len(), search = ?ctx.query().get("search"), "listing users");
    Response::new(StatusCode::Ok).json(&users)
}

fn create(db: &dyn Database, ctx: &Context) -> Response {
    let input = match read_input(ctx) {
        Ok(input) => input,
        Err(response) => return response,
    };

    let id = Uuid::new_v4().to_string();
    db.insert(TABLE, input.into_record(Some(id.clone())));
    info!(%id, "user created");
    Response::new(StatusCode::Created)
}

fn update(db: &dyn Database, ctx: &Context) -> Response {
    let Some(id) = ctx.params().get("id") else {
        return Response::new(StatusCode::NotFound);
    };
    let input = match read_input(ctx) {
        Ok(input) => input,
        Err(response) => return response,
    };

    if db.update(TABLE, id, input.into_record(None)) {
        info!(%id, "user updated");
        Response::new(StatusCode::NoContent)
    } else {
        Response::new(StatusCode::NotFound)
    }
}

fn delete(db: &dyn Database, ctx: &Context) -> Response {
    let Some(id) = ctx.params().get("id") else {
        return Response::new(StatusCode::NotFound);
    };

    if db.delete(TABLE, id) {
        info!(%id, "user deleted");
        Response::new(StatusCode::NoContent)
    } else {
        Response::new(StatusCode::NotFound)
    }
}

// A missing body or one that is not a JSON object is a client error.
fn read_input(ctx: &Context) -> Result<UserInput, Response> {
    if !ctx.body().is_some_and(Value::is_object) {
        return Err(bad_request("expected a JSON object body"));
    }
    ctx.json::<UserInput>().map_err(|e| {
        warn!(error = %e, "invalid user payload");
        bad_request("name and email must be strings")
    })
}

fn bad_request(message: &str) -> Response {
    Response::new(StatusCode::BadRequest).json(&serde_json::json!({ "error": message }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;
    use crate::middleware::{JsonMiddleware, Pipeline};
    use serde_json::json;

    fn make_request(method: &str, target: &str, body: Option<Value>) -> Request {
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let raw = format!(
            "{method} {target} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req.with_body(body.into_bytes())
    }

    fn app() -> (Arc<MemoryDb>, Pipeline) {
        let db = Arc::new(MemoryDb::new());
        let table = routes(db.clone()).unwrap();
        (db, Pipeline::new(table).with(JsonMiddleware))
    }

    type MemoryDb = crate::database::MemoryDatabase;

    fn body_json(res: &Response) -> Value {
        serde_json::from_slice(res.body_bytes()).unwrap()
    }

    #[test]
    fn table_declares_crud_routes_in_order() {
        let table = routes(Arc::new(MemoryDb::new())).unwrap();
        let order: Vec<_> = table
            .entries()
            .iter()
            .map(|e| format!("{} {}", e.method(), e.pattern()))
            .collect();
        assert_eq!(
            order,
            vec!["GET /users", "POST /users", "PUT /users/:id", "DELETE /users/:id"]
        );
    }

    #[tokio::test]
    async fn list_starts_empty() {
        let (_, app) = app();
        let res = app.handle(make_request("GET", "/users", None)).await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(body_json(&res), json!([]));
    }

    #[tokio::test]
    async fn create_then_list() {
        let (db, app) = app();
        let res = app
            .handle(make_request(
                "POST",
                "/users",
                Some(json!({ "name": "John Doe", "email": "john@example.com" })),
            ))
            .await;
        assert_eq!(res.status(), StatusCode::Created);
        assert!(res.body_bytes().is_empty());

        let stored = db.select(TABLE, None);
        assert_eq!(stored.len(), 1);
        let id = stored[0]["id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());

        let res = app.handle(make_request("GET", "/users", None)).await;
        let listed = body_json(&res);
        assert_eq!(listed[0]["name"], "John Doe");
        assert_eq!(listed[0]["email"], "john@example.com");
    }

    #[tokio::test]
    async fn search_filters_by_name_or_email() {
        let (_, app) = app();
        for (name, email) in [
            ("John", "j@example.com"),
            ("Ann", "ann@johnson.io"),
            ("Bob", "bob@example.com"),
        ] {
            let res = app
                .handle(make_request(
                    "POST",
                    "/users",
                    Some(json!({ "name": name, "email": email })),
                ))
                .await;
            assert_eq!(res.status(), StatusCode::Created);
        }

        let res = app.handle(make_request("GET", "/users?search=JOHN", None)).await;
        let names: Vec<_> = body_json(&res)
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["name"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["John", "Ann"]);
    }

    #[tokio::test]
    async fn empty_search_lists_everything() {
        let (db, app) = app();
        db.insert(
            TABLE,
            UserInput {
                name: Some("John".into()),
                email: Some("j@example.com".into()),
            }
            .into_record(Some("a".into())),
        );
        db.insert(TABLE, UserInput::default().into_record(Some("b".into())));

        for target in ["/users?search=", "/users?search", "/users"] {
            let res = app.handle(make_request("GET", target, None)).await;
            assert_eq!(res.status(), StatusCode::Ok, "{target}");
            let ids: Vec<_> = body_json(&res)
                .as_array()
                .unwrap()
                .iter()
                .map(|u| u["id"].as_str().unwrap().to_owned())
                .collect();
            assert_eq!(ids, vec!["a", "b"], "{target}");
        }
    }

    #[tokio::test]
    async fn create_requires_object_body() {
        let (db, app) = app();
        let res = app.handle(make_request("POST", "/users", None)).await;
        assert_eq!(res.status(), StatusCode::BadRequest);

        let res = app
            .handle(make_request("POST", "/users", Some(json!(["not", "an", "object"]))))
            .await;
        assert_eq!(res.status(), StatusCode::BadRequest);

        let res = app
            .handle(make_request("POST", "/users", Some(json!({ "name": 7 }))))
            .await;
        assert_eq!(res.status(), StatusCode::BadRequest);

        assert!(db.select(TABLE, None).is_empty());
    }

    #[tokio::test]
    async fn update_existing_user() {
        let (db, app) = app();
        db.insert(
            TABLE,
            UserInput {
                name: Some("Old".into()),
                email: Some("old@example.com".into()),
            }
            .into_record(Some("abc-123".into())),
        );

        let res = app
            .handle(make_request(
                "PUT",
                "/users/abc-123",
                Some(json!({ "name": "New", "email": "new@example.com" })),
            ))
            .await;
        assert_eq!(res.status(), StatusCode::NoContent);

        let stored = db.select(TABLE, None);
        assert_eq!(
            Value::Object(stored[0].clone()),
            json!({ "id": "abc-123", "name": "New", "email": "new@example.com" })
        );
    }

    #[tokio::test]
    async fn update_unknown_user_is_404() {
        let (_, app) = app();
        let res = app
            .handle(make_request("PUT", "/users/42", Some(json!({ "name": "x" }))))
            .await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn delete_user() {
        let (db, app) = app();
        db.insert(TABLE, UserInput::default().into_record(Some("42".into())));

        let res = app.handle(make_request("DELETE", "/users/42", None)).await;
        assert_eq!(res.status(), StatusCode::NoContent);
        assert!(db.select(TABLE, None).is_empty());

        let res = app.handle(make_request("DELETE", "/users/42", None)).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn routing_limits_apply() {
        let (_, app) = app();
        for (method, target) in [
            ("GET", "/users/"),
            ("GET", "/unknown"),
            ("DELETE", "/users/UPPER"),
            ("PUT", "/users"),
            ("PATCH", "/users/1"),
        ] {
            let res = app.handle(make_request(method, target, None)).await;
            assert_eq!(res.status(), StatusCode::NotFound, "{method} {target}");
        }
    }
}
