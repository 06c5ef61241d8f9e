//! gitdb client
//!
//! this crate provides a small, typed client for the gitdb http api:
//! collection management, document crud, and the graphql endpoint.
//! start with [`Client`] and [`ClientConfig`]; use [`blocking::Client`] when
//! there is no async runtime around.
//!
//! documents, queries, and updates are schema-less json objects. query and
//! update operators (`$gte`, `$in`, `$set`, `$inc`, ...) are evaluated by
//! the server; the client only carries them.
//!
//! ## quick start
//!
//! ```no_run
//! use gitdb::{into_document, Client, ClientConfig, Query};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(ClientConfig::new("http://localhost:7896", "token"))?;
//! client.health().await?;
//!
//! let id = client
//!     .insert("users", &into_document(json!({"name": "A", "age": 30}))?)
//!     .await?;
//! let user = client.find_by_id("users", &id).await?;
//! println!("{user:?}");
//!
//! let adults = into_document(json!({"age": {"$gte": 18}}))?;
//! println!("{} adults", client.count("users", &adults).await?);
//! let everyone = client.find("users", &Query::new()).await?;
//! println!("{} users", everyone.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## errors
//!
//! every method returns [`Result`]. a non-success status becomes
//! [`Error::UnexpectedStatus`] with the raw response body; graphql errors
//! reported by the server become [`Error::RemoteErrors`], which keeps each
//! message and any partial data.

pub mod blocking;
mod client;
mod config;
mod error;
mod graphql;
mod request;
mod types;

pub use client::Client;
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use error::{Error, Result};
pub use graphql::{GraphQlError, GraphQlLocation, GraphQlResponse};
pub use types::{into_document, Collection, Document, Query, Update, ID_FIELD};
