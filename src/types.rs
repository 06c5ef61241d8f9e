//! document model
//!
//! documents, queries, and updates are schema-less json objects; the server
//! interprets query and update operators (`$gte`, `$in`, `$set`, `$inc`, ...).

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// a stored record: field name to arbitrary json value, in insertion order
pub type Document = Map<String, Value>;

/// a filter: field to literal (equality) or to an operator object
///
/// an empty query matches every document.
pub type Query = Map<String, Value>;

/// a mutation built from operators such as `$set`, `$inc`, and `$push`
pub type Update = Map<String, Value>;

/// field the server injects into every inserted document
pub const ID_FIELD: &str = "_id";

/// collection descriptor returned by the listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// collection name
    pub name: String,
    /// number of documents stored
    #[serde(default)]
    pub count: u64,
    /// creation timestamp as reported by the server
    #[serde(default)]
    pub created: String,
}

/// convert any serializable value into a [`Document`]
///
/// works for `serde_json::json!` literals as well as derived structs. fails
/// with [`crate::Error::Encode`] if the value is not a json object.
///
/// ```
/// let doc = gitdb::into_document(serde_json::json!({"name": "A", "age": 30})).unwrap();
/// assert_eq!(doc["age"], 30);
/// ```
pub fn into_document<T: Serialize>(value: T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => {
            let err: serde_json::Error = serde::ser::Error::custom(format!(
                "expected a json object, got {}",
                kind(&other)
            ));
            Err(err.into())
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
