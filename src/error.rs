//! error types
//!
//! structured errors for config, transport, status, decode, and graphql failures.

use crate::graphql::GraphQlError;
use std::fmt;

/// library result type
pub type Result<T> = std::result::Result<T, Error>;

/// error type for every client operation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// connection refused, dns failure, timeout, or a body read that broke off
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("health check failed with status: {status}")]
    ServerUnhealthy {
        /// http status returned by the health endpoint
        status: u16,
    },

    #[error("failed to {action} (status {status}): {body}")]
    UnexpectedStatus {
        /// operation that was attempted
        action: &'static str,
        /// http status returned by the server
        status: u16,
        /// raw response body
        body: String,
    },

    #[error("failed to decode {action} response: {source}")]
    Decode {
        /// operation that was attempted
        action: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("no {field} returned by {action}")]
    MissingField {
        /// operation that was attempted
        action: &'static str,
        /// response field that was absent or mistyped
        field: &'static str,
    },

    #[error("no document found in collection {collection}")]
    NotFound {
        /// collection that was searched
        collection: String,
    },

    #[error("graphql errors: {}", join_messages(.errors))]
    RemoteErrors {
        /// every error entry reported by the server
        errors: Vec<GraphQlError>,
        /// partial data returned alongside the errors
        data: Option<serde_json::Value>,
    },
}

impl Error {
    /// http status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ServerUnhealthy { status } | Error::UnexpectedStatus { status, .. } => {
                Some(*status)
            }
            Error::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// true if the server had nothing to return
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. }) || self.status() == Some(404)
    }

    /// true if the error looks like an auth failure
    pub fn is_auth_error(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// messages reported by a graphql endpoint, in server order
    pub fn messages(&self) -> Vec<&str> {
        match self {
            Error::RemoteErrors { errors, .. } => {
                errors.iter().map(|err| err.message.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn join_messages(errors: &[GraphQlError]) -> String {
    errors
        .iter()
        .map(|err| err.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl fmt::Display for GraphQlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
