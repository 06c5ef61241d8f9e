//! graphql types
//!
//! request body, response wrapper, and error entries for the `/graphql` endpoint.

use serde::{Deserialize, Deserializer, Serialize};

/// graphql request body
#[derive(Debug, Clone, Serialize)]
pub(crate) struct GraphQlRequest<'a> {
    pub(crate) query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) variables: Option<serde_json::Value>,
}

/// graphql response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQlResponse<T> {
    /// response data or null if errors
    pub data: Option<T>,
    /// graphql errors array; `null` and absent both decode as empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub errors: Vec<GraphQlError>,
}

impl<T> GraphQlResponse<T> {
    /// true if the response contains graphql errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// graphql error entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlError {
    /// error message, empty if the server sent none
    #[serde(default)]
    pub message: String,
    /// error locations in the query
    #[serde(default, deserialize_with = "null_as_empty")]
    pub locations: Vec<GraphQlLocation>,
    /// response path
    #[serde(default, deserialize_with = "null_as_empty")]
    pub path: Vec<serde_json::Value>,
    /// optional extensions payload
    #[serde(default)]
    pub extensions: Option<serde_json::Value>,
}

/// graphql error location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlLocation {
    /// line number (1-based)
    pub line: i64,
    /// column number (1-based)
    pub column: i64,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}
