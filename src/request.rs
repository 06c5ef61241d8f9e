//! request/response contract
//!
//! every remote operation is described once as a [`Call`]: method, path,
//! body, auth, and a handler that turns `(status, body)` into a typed result.
//! the async and blocking clients only differ in how they move the bytes.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::graphql::{GraphQlRequest, GraphQlResponse};
use crate::types::{Collection, Query, Update, ID_FIELD};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

/// turns a finished response into the operation result
pub(crate) type Handler<T> = fn(&'static str, StatusCode, String) -> Result<T>;

/// one remote operation, ready to be sent
pub(crate) struct Call<T> {
    /// human-readable operation name used in errors and logs
    pub(crate) action: &'static str,
    pub(crate) method: Method,
    /// path segments below the base url, encoded when the url is built
    pub(crate) path: Vec<String>,
    pub(crate) body: Option<Value>,
    /// attach `Authorization: Bearer <token>`
    pub(crate) authenticated: bool,
    pub(crate) handler: Handler<T>,
}

impl<T> Call<T> {
    fn new(action: &'static str, method: Method, path: Vec<String>, handler: Handler<T>) -> Self {
        Self {
            action,
            method,
            path,
            body: None,
            authenticated: true,
            handler,
        }
    }

    fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// resolve the url and split the call into what goes out and what handles the reply
    pub(crate) fn prepare(self, config: &ClientConfig) -> Result<(Outgoing, Reply<T>)> {
        let url = config.endpoint(&self.path)?;
        tracing::debug!(
            action = self.action,
            method = %self.method,
            url = %url,
            "sending request"
        );
        Ok((
            Outgoing {
                method: self.method,
                url,
                body: self.body,
                authenticated: self.authenticated,
            },
            Reply {
                action: self.action,
                handler: self.handler,
            },
        ))
    }
}

/// a fully resolved request, handed to the transport
#[derive(Debug)]
pub(crate) struct Outgoing {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) body: Option<Value>,
    pub(crate) authenticated: bool,
}

/// the response half of a [`Call`]
pub(crate) struct Reply<T> {
    action: &'static str,
    handler: Handler<T>,
}

impl<T> Reply<T> {
    pub(crate) fn handle(self, status: StatusCode, body: String) -> Result<T> {
        tracing::debug!(
            action = self.action,
            status = status.as_u16(),
            bytes = body.len(),
            "received response"
        );
        (self.handler)(self.action, status, body)
    }
}

/// first document of a find result, or [`Error::NotFound`]
pub(crate) fn first_or_not_found<T>(collection: &str, documents: Vec<T>) -> Result<T> {
    documents.into_iter().next().ok_or_else(|| Error::NotFound {
        collection: collection.to_string(),
    })
}

fn collections() -> Vec<String> {
    vec!["api".into(), "v1".into(), "collections".into()]
}

fn collection_path(collection: &str) -> Vec<String> {
    let mut path = collections();
    path.push(collection.to_string());
    path
}

fn documents_path(collection: &str, rest: &[&str]) -> Vec<String> {
    let mut path = collection_path(collection);
    path.push("documents".into());
    path.extend(rest.iter().map(|segment| segment.to_string()));
    path
}

pub(crate) fn health() -> Call<()> {
    let mut call = Call::new(
        "check health",
        Method::GET,
        vec!["health".into()],
        |_, status, _| {
            if status == StatusCode::OK {
                Ok(())
            } else {
                Err(Error::ServerUnhealthy {
                    status: status.as_u16(),
                })
            }
        },
    );
    call.authenticated = false;
    call
}

pub(crate) fn create_collection(name: &str) -> Call<()> {
    Call::new(
        "create collection",
        Method::POST,
        collections(),
        expect_created,
    )
    .with_body(serde_json::json!({ "name": name }))
}

pub(crate) fn list_collections() -> Call<Vec<Collection>> {
    Call::new(
        "list collections",
        Method::GET,
        collections(),
        decode_ok::<Vec<Collection>>,
    )
}

pub(crate) fn delete_collection(name: &str) -> Call<()> {
    Call::new(
        "delete collection",
        Method::DELETE,
        collection_path(name),
        expect_ok,
    )
}

pub(crate) fn insert(collection: &str, document: Value) -> Call<String> {
    Call::new(
        "insert document",
        Method::POST,
        documents_path(collection, &[]),
        inserted_id,
    )
    .with_body(document)
}

pub(crate) fn find<T: DeserializeOwned>(collection: &str, query: &Query) -> Call<Vec<T>> {
    Call::new(
        "find documents",
        Method::POST,
        documents_path(collection, &["find"]),
        decode_ok::<Vec<T>>,
    )
    .with_body(Value::Object(query.clone()))
}

pub(crate) fn find_by_id<T: DeserializeOwned>(collection: &str, id: &str) -> Call<T> {
    Call::new(
        "find document",
        Method::GET,
        documents_path(collection, &[id]),
        decode_ok::<T>,
    )
}

pub(crate) fn update(collection: &str, id: &str, update: &Update) -> Call<()> {
    Call::new(
        "update document",
        Method::PUT,
        documents_path(collection, &[id]),
        expect_ok,
    )
    .with_body(Value::Object(update.clone()))
}

pub(crate) fn update_many(collection: &str, query: &Query, update: &Update) -> Call<u64> {
    let mut body = Map::new();
    body.insert("query".into(), Value::Object(query.clone()));
    body.insert("update".into(), Value::Object(update.clone()));

    Call::new(
        "update documents",
        Method::POST,
        documents_path(collection, &["update-many"]),
        |action, status, body| count_field(action, "modifiedCount", status, body),
    )
    .with_body(Value::Object(body))
}

pub(crate) fn delete(collection: &str, id: &str) -> Call<()> {
    Call::new(
        "delete document",
        Method::DELETE,
        documents_path(collection, &[id]),
        expect_ok,
    )
}

pub(crate) fn delete_many(collection: &str, query: &Query) -> Call<u64> {
    Call::new(
        "delete documents",
        Method::POST,
        documents_path(collection, &["delete-many"]),
        |action, status, body| count_field(action, "deletedCount", status, body),
    )
    .with_body(Value::Object(query.clone()))
}

pub(crate) fn count(collection: &str, query: &Query) -> Call<u64> {
    Call::new(
        "count documents",
        Method::POST,
        documents_path(collection, &["count"]),
        |action, status, body| count_field(action, "count", status, body),
    )
    .with_body(Value::Object(query.clone()))
}

pub(crate) fn graphql<T: DeserializeOwned>(
    query: &str,
    variables: Option<Value>,
) -> Result<Call<GraphQlResponse<T>>> {
    let body = serde_json::to_value(GraphQlRequest { query, variables })?;
    Ok(Call::new(
        "execute graphql query",
        Method::POST,
        vec!["graphql".into()],
        parse_graphql::<T>,
    )
    .with_body(body))
}

/// serialize a typed record into a document body
pub(crate) fn document_body<D: Serialize>(document: &D) -> Result<Value> {
    crate::types::into_document(document).map(Value::Object)
}

fn expect_ok(action: &'static str, status: StatusCode, body: String) -> Result<()> {
    expect_status(action, StatusCode::OK, status, body).map(drop)
}

fn expect_created(action: &'static str, status: StatusCode, body: String) -> Result<()> {
    expect_status(action, StatusCode::CREATED, status, body).map(drop)
}

fn decode_ok<T: DeserializeOwned>(
    action: &'static str,
    status: StatusCode,
    body: String,
) -> Result<T> {
    decode(action, &expect_status(action, StatusCode::OK, status, body)?)
}

fn inserted_id(action: &'static str, status: StatusCode, body: String) -> Result<String> {
    let body = expect_status(action, StatusCode::CREATED, status, body)?;
    let result: Map<String, Value> = decode(action, &body)?;
    match result.get(ID_FIELD) {
        Some(Value::String(id)) => Ok(id.clone()),
        _ => Err(Error::MissingField {
            action,
            field: ID_FIELD,
        }),
    }
}

/// pass the body through if the status matches, otherwise report it verbatim
fn expect_status(
    action: &'static str,
    expected: StatusCode,
    status: StatusCode,
    body: String,
) -> Result<String> {
    if status == expected {
        Ok(body)
    } else {
        Err(Error::UnexpectedStatus {
            action,
            status: status.as_u16(),
            body,
        })
    }
}

fn decode<T: DeserializeOwned>(action: &'static str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|source| Error::Decode { action, source })
}

fn count_field(
    action: &'static str,
    field: &'static str,
    status: StatusCode,
    body: String,
) -> Result<u64> {
    let body = expect_status(action, StatusCode::OK, status, body)?;
    let result: Map<String, Value> = decode(action, &body)?;
    result
        .get(field)
        .and_then(as_count)
        .ok_or(Error::MissingField { action, field })
}

/// largest integer an f64 represents exactly
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// non-negative integral json number, accepting `4` as well as `4.0`
fn as_count(value: &Value) -> Option<u64> {
    if let Some(count) = value.as_u64() {
        return Some(count);
    }
    let float = value.as_f64()?;
    if float.is_finite() && float >= 0.0 && float.fract() == 0.0 && float <= MAX_EXACT_FLOAT {
        Some(float as u64)
    } else {
        None
    }
}

fn parse_graphql<T: DeserializeOwned>(
    action: &'static str,
    status: StatusCode,
    body: String,
) -> Result<GraphQlResponse<T>> {
    let body = expect_status(action, StatusCode::OK, status, body)?;
    let parsed: GraphQlResponse<Value> = decode(action, &body)?;

    if parsed.has_errors() {
        tracing::warn!(
            action,
            errors = parsed.errors.len(),
            "graphql endpoint reported errors"
        );
        return Err(Error::RemoteErrors {
            errors: parsed.errors,
            data: parsed.data,
        });
    }

    let data = match parsed.data {
        Some(Value::Null) | None => None,
        Some(data) => Some(
            serde_json::from_value(data).map_err(|source| Error::Decode { action, source })?,
        ),
    };

    Ok(GraphQlResponse {
        data,
        errors: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Document;
    use serde::Deserialize;
    use serde_json::json;

    fn run<T>(call: Call<T>, status: StatusCode, body: &str) -> Result<T> {
        (call.handler)(call.action, status, body.to_string())
    }

    fn query(value: Value) -> Query {
        match value {
            Value::Object(map) => map,
            _ => panic!("test query must be an object"),
        }
    }

    #[test]
    fn test_health_is_unauthenticated() {
        let call = health();
        assert!(!call.authenticated);
        assert_eq!(call.path, vec!["health"]);
        assert!(run(health(), StatusCode::OK, "").is_ok());

        let err = run(health(), StatusCode::SERVICE_UNAVAILABLE, "down").unwrap_err();
        assert!(matches!(err, Error::ServerUnhealthy { status: 503 }));
    }

    #[test]
    fn test_every_other_call_is_authenticated() {
        let q = Query::new();
        let u = Update::new();
        assert!(create_collection("c").authenticated);
        assert!(list_collections().authenticated);
        assert!(delete_collection("c").authenticated);
        assert!(insert("c", json!({})).authenticated);
        assert!(find::<Document>("c", &q).authenticated);
        assert!(find_by_id::<Document>("c", "1").authenticated);
        assert!(update("c", "1", &u).authenticated);
        assert!(update_many("c", &q, &u).authenticated);
        assert!(delete("c", "1").authenticated);
        assert!(delete_many("c", &q).authenticated);
        assert!(count("c", &q).authenticated);
        assert!(graphql::<Value>("{ x }", None).unwrap().authenticated);
    }

    #[test]
    fn test_create_collection_expects_created() {
        let call = create_collection("users");
        assert_eq!(call.method, Method::POST);
        assert_eq!(call.body, Some(json!({"name": "users"})));
        assert!(run(call, StatusCode::CREATED, "{}").is_ok());

        let err = run(create_collection("users"), StatusCode::OK, "already exists").unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedStatus {
                status: 200,
                ref body,
                ..
            } if body == "already exists"
        ));
    }

    #[test]
    fn test_list_collections_decodes_descriptors() {
        let collections = run(
            list_collections(),
            StatusCode::OK,
            r#"[{"name": "users", "count": 2, "created": "2024-05-01T00:00:00Z"}]"#,
        )
        .unwrap();
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].name, "users");
        assert_eq!(collections[0].count, 2);

        let err = run(list_collections(), StatusCode::OK, "{not json").unwrap_err();
        assert!(matches!(err, Error::Decode { action: "list collections", .. }));
    }

    #[test]
    fn test_delete_collection_reports_body() {
        let call = delete_collection("missing");
        assert_eq!(call.method, Method::DELETE);
        assert_eq!(call.path, vec!["api", "v1", "collections", "missing"]);

        let err = run(call, StatusCode::NOT_FOUND, "not found").unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_insert_extracts_id() {
        let id = run(
            insert("users", json!({"name": "A", "age": 30})),
            StatusCode::CREATED,
            r#"{"_id": "abc123"}"#,
        )
        .unwrap();
        assert_eq!(id, "abc123");
    }

    #[test]
    fn test_insert_missing_or_mistyped_id() {
        let err = run(insert("users", json!({})), StatusCode::CREATED, r#"{"ok": true}"#).unwrap_err();
        assert!(matches!(err, Error::MissingField { field: "_id", .. }));

        let err = run(insert("users", json!({})), StatusCode::CREATED, r#"{"_id": 7}"#).unwrap_err();
        assert!(matches!(err, Error::MissingField { field: "_id", .. }));

        let err = run(insert("users", json!({})), StatusCode::OK, r#"{"_id": "x"}"#).unwrap_err();
        assert!(matches!(err, Error::UnexpectedStatus { status: 200, .. }));
    }

    #[test]
    fn test_find_paths_and_body() {
        let q = query(json!({"age": {"$gte": 18}}));
        let call = find::<Document>("users", &q);
        assert_eq!(call.path, vec!["api", "v1", "collections", "users", "documents", "find"]);
        assert_eq!(call.body, Some(json!({"age": {"$gte": 18}})));

        let docs = run(call, StatusCode::OK, r#"[{"_id": "1", "age": 20}, {"_id": "2", "age": 40}]"#).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["age"], 40);
    }

    #[test]
    fn test_find_empty_query_sends_empty_object() {
        let call = find::<Document>("users", &Query::new());
        assert_eq!(call.body, Some(json!({})));
    }

    #[test]
    fn test_find_by_id_typed() {
        #[derive(Debug, Deserialize)]
        struct User {
            #[serde(rename = "_id")]
            id: String,
            name: String,
        }

        let call = find_by_id::<User>("users", "abc123");
        assert_eq!(call.method, Method::GET);
        assert_eq!(call.path.last().map(String::as_str), Some("abc123"));
        let user = run(call, StatusCode::OK, r#"{"_id": "abc123", "name": "A"}"#).unwrap();
        assert_eq!(user.id, "abc123");
        assert_eq!(user.name, "A");

        let err = run(find_by_id::<User>("users", "abc123"), StatusCode::OK, r#"{"_id": 1}"#).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_update_uses_put() {
        let u = query(json!({"$set": {"age": 31}}));
        let call = update("users", "abc123", &u);
        assert_eq!(call.method, Method::PUT);
        assert_eq!(call.body, Some(json!({"$set": {"age": 31}})));
        assert!(run(call, StatusCode::OK, "").is_ok());
    }

    #[test]
    fn test_update_many_body_and_count() {
        let q = query(json!({"active": true}));
        let u = query(json!({"$inc": {"visits": 1}}));
        let call = update_many("users", &q, &u);
        assert_eq!(call.path.last().map(String::as_str), Some("update-many"));
        assert_eq!(
            call.body,
            Some(json!({"query": {"active": true}, "update": {"$inc": {"visits": 1}}}))
        );

        assert_eq!(run(call, StatusCode::OK, r#"{"modifiedCount": 3}"#).unwrap(), 3);

        let err = run(update_many("users", &q, &u), StatusCode::OK, r#"{"matched": 3}"#).unwrap_err();
        assert!(matches!(err, Error::MissingField { field: "modifiedCount", .. }));
    }

    #[test]
    fn test_delete_many_and_delete() {
        let q = query(json!({"age": {"$lt": 18}}));
        let call = delete_many("users", &q);
        assert_eq!(call.method, Method::POST);
        assert_eq!(call.body, Some(json!({"age": {"$lt": 18}})));
        assert_eq!(run(call, StatusCode::OK, r#"{"deletedCount": 2.0}"#).unwrap(), 2);

        let call = delete("users", "abc123");
        assert_eq!(call.method, Method::DELETE);
        assert!(call.body.is_none());
        assert!(run(call, StatusCode::OK, "").is_ok());
    }

    #[test]
    fn test_count() {
        let q = query(json!({"active": true}));
        assert_eq!(run(count("users", &q), StatusCode::OK, r#"{"count": 4}"#).unwrap(), 4);

        let err = run(count("users", &q), StatusCode::OK, r#"{"count": "four"}"#).unwrap_err();
        assert!(matches!(err, Error::MissingField { field: "count", .. }));
    }

    #[test]
    fn test_as_count() {
        assert_eq!(as_count(&json!(0)), Some(0));
        assert_eq!(as_count(&json!(u64::MAX)), Some(u64::MAX));
        assert_eq!(as_count(&json!(12.0)), Some(12));
        assert_eq!(as_count(&json!(-1)), None);
        assert_eq!(as_count(&json!(1.5)), None);
        assert_eq!(as_count(&json!(1e300)), None);
        assert_eq!(as_count(&json!(null)), None);
    }

    #[test]
    fn test_graphql_success() {
        let call = graphql::<Value>("{ users { name } }", None).unwrap();
        assert_eq!(call.path, vec!["graphql"]);
        assert_eq!(call.body, Some(json!({"query": "{ users { name } }"})));

        let response = run(call, StatusCode::OK, r#"{"data": {"users": [{"name": "A"}]}}"#).unwrap();
        assert!(!response.has_errors());
        assert_eq!(response.data.unwrap()["users"][0]["name"], "A");
    }

    #[test]
    fn test_graphql_errors_keep_data_and_messages() {
        let call = graphql::<Value>("{ users { name } }", Some(json!({"limit": 1}))).unwrap();
        assert_eq!(call.body.as_ref().unwrap()["variables"]["limit"], 1);

        let err = run(
            call,
            StatusCode::OK,
            r#"{"data": {"users": []}, "errors": [{"message": "a"}, {"message": "b"}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.messages(), vec!["a", "b"]);
        match err {
            Error::RemoteErrors { data, errors } => {
                assert_eq!(errors.len(), 2);
                assert_eq!(data, Some(json!({"users": []})));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_graphql_empty_errors_is_success() {
        let call = graphql::<Value>("{ x }", None).unwrap();
        let response = run(call, StatusCode::OK, r#"{"data": null, "errors": []}"#).unwrap();
        assert!(response.data.is_none());
    }

    #[test]
    fn test_graphql_null_errors_is_success() {
        let call = graphql::<Value>("{ x }", None).unwrap();
        let response = run(call, StatusCode::OK, r#"{"data": {"x": 1}, "errors": null}"#).unwrap();
        assert!(!response.has_errors());
        assert_eq!(response.data, Some(json!({"x": 1})));
    }

    #[test]
    fn test_graphql_error_without_message_is_remote_error() {
        let call = graphql::<Value>("{ x }", None).unwrap();
        let err = run(
            call,
            StatusCode::OK,
            r#"{"data": null, "errors": [{"extensions": {"code": "INTERNAL"}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::RemoteErrors { ref errors, data: None } if errors.len() == 1));
        assert_eq!(err.messages(), vec![""]);
    }

    #[test]
    fn test_graphql_http_error() {
        let call = graphql::<Value>("{ x }", None).unwrap();
        let err = run(call, StatusCode::BAD_GATEWAY, "upstream down").unwrap_err();
        assert!(matches!(err, Error::UnexpectedStatus { status: 502, .. }));
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn test_prepare_resolves_url_and_keeps_body() {
        let config = ClientConfig::new("http://localhost:7896", "t");
        let q = query(json!({"active": true}));
        let (outgoing, reply) = count("users", &q).prepare(&config).unwrap();
        assert_eq!(outgoing.method, Method::POST);
        assert_eq!(
            outgoing.url.as_str(),
            "http://localhost:7896/api/v1/collections/users/documents/count"
        );
        assert_eq!(outgoing.body, Some(json!({"active": true})));
        assert!(outgoing.authenticated);
        assert_eq!(reply.handle(StatusCode::OK, r#"{"count": 4}"#.into()).unwrap(), 4);
    }

    #[test]
    fn test_prepare_rejects_invalid_base_url() {
        let config = ClientConfig::new("", "t");
        assert!(matches!(health().prepare(&config), Err(Error::Url(_))));
    }

    #[test]
    fn test_first_or_not_found() {
        assert_eq!(first_or_not_found("users", vec![1, 2]).unwrap(), 1);
        let err = first_or_not_found::<i32>("users", vec![]).unwrap_err();
        assert!(matches!(err, Error::NotFound { ref collection } if collection == "users"));
    }

    #[test]
    fn test_path_segments_are_kept_raw() {
        let call = find_by_id::<Document>("a/b", "x y");
        assert_eq!(call.path, vec!["api", "v1", "collections", "a/b", "documents", "x y"]);
    }
}
