//! blocking client
//!
//! same operations as [`crate::Client`], each call blocking the current
//! thread until the response body has been read. do not use from inside an
//! async runtime; run it on a dedicated thread or `spawn_blocking` instead.

use crate::config::ClientConfig;
use crate::error::Result;
use crate::graphql::GraphQlResponse;
use crate::request::{self, Call, Outgoing};
use crate::types::{Collection, Document, Query, Update};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// blocking http client for gitdb
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    http: reqwest::blocking::Client,
    authorization: HeaderValue,
}

impl Client {
    /// create a new client
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let authorization = config.authorization()?;

        let http = reqwest::blocking::Client::builder()
            .default_headers(config.extra_headers.clone())
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            http,
            authorization,
        })
    }

    /// access the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// point the client at another server
    pub fn set_base_url(&mut self, base_url: impl AsRef<str>) -> Result<()> {
        Arc::make_mut(&mut self.config).set_base_url(base_url)
    }

    /// check that the server answers `GET /health` with 200
    pub fn health(&self) -> Result<()> {
        self.dispatch(request::health())
    }

    /// create a collection
    pub fn create_collection(&self, name: &str) -> Result<()> {
        self.dispatch(request::create_collection(name))
    }

    /// list every collection with its document count
    pub fn list_collections(&self) -> Result<Vec<Collection>> {
        self.dispatch(request::list_collections())
    }

    /// delete a collection and its documents
    pub fn delete_collection(&self, name: &str) -> Result<()> {
        self.dispatch(request::delete_collection(name))
    }

    /// insert a document and return the id assigned by the server
    pub fn insert(&self, collection: &str, document: &Document) -> Result<String> {
        let body = serde_json::Value::Object(document.clone());
        self.dispatch(request::insert(collection, body))
    }

    /// insert any serializable record that encodes as a json object
    pub fn insert_as<D: Serialize>(&self, collection: &str, document: &D) -> Result<String> {
        let body = request::document_body(document)?;
        self.dispatch(request::insert(collection, body))
    }

    /// find every document matching `query`; an empty query matches all
    pub fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        self.find_as(collection, query)
    }

    /// find and deserialize every matching document
    pub fn find_as<T: DeserializeOwned>(&self, collection: &str, query: &Query) -> Result<Vec<T>> {
        self.dispatch(request::find(collection, query))
    }

    /// first document matching `query`, or [`crate::Error::NotFound`]
    pub fn find_one(&self, collection: &str, query: &Query) -> Result<Document> {
        self.find_one_as(collection, query)
    }

    /// first matching document, deserialized
    pub fn find_one_as<T: DeserializeOwned>(&self, collection: &str, query: &Query) -> Result<T> {
        let documents = self.find_as(collection, query)?;
        request::first_or_not_found(collection, documents)
    }

    /// fetch a document by id
    pub fn find_by_id(&self, collection: &str, id: &str) -> Result<Document> {
        self.find_by_id_as(collection, id)
    }

    /// fetch a document by id and deserialize it
    pub fn find_by_id_as<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<T> {
        self.dispatch(request::find_by_id(collection, id))
    }

    /// apply `update` to the document with `id`
    pub fn update(&self, collection: &str, id: &str, update: &Update) -> Result<()> {
        self.dispatch(request::update(collection, id, update))
    }

    /// apply `update` to every matching document; returns the modified count
    pub fn update_many(&self, collection: &str, query: &Query, update: &Update) -> Result<u64> {
        self.dispatch(request::update_many(collection, query, update))
    }

    /// delete the document with `id`
    pub fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.dispatch(request::delete(collection, id))
    }

    /// delete every matching document; returns the deleted count
    pub fn delete_many(&self, collection: &str, query: &Query) -> Result<u64> {
        self.dispatch(request::delete_many(collection, query))
    }

    /// count the documents matching `query`
    pub fn count(&self, collection: &str, query: &Query) -> Result<u64> {
        self.dispatch(request::count(collection, query))
    }

    /// execute a raw graphql query; see [`crate::Client::graphql`]
    pub fn graphql(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<GraphQlResponse<serde_json::Value>> {
        self.graphql_as(query, variables)
    }

    /// execute a graphql query and deserialize `data` into a typed response
    pub fn graphql_as<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<GraphQlResponse<T>> {
        self.dispatch(request::graphql(query, variables)?)
    }

    fn dispatch<T>(&self, call: Call<T>) -> Result<T> {
        self.dispatch_with(call, |outgoing| self.send(outgoing))
    }

    fn send(&self, outgoing: Outgoing) -> Result<(StatusCode, String)> {
        let mut builder = self.http.request(outgoing.method, outgoing.url);
        if outgoing.authenticated {
            builder = builder.header(AUTHORIZATION, self.authorization.clone());
        }
        if let Some(body) = &outgoing.body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status();
        let text = response.text()?;
        Ok((status, text))
    }

    pub(crate) fn dispatch_with<T, F>(&self, call: Call<T>, send: F) -> Result<T>
    where
        F: FnOnce(Outgoing) -> Result<(StatusCode, String)>,
    {
        let (outgoing, reply) = call.prepare(&self.config)?;
        let (status, text) = send(outgoing)?;
        reply.handle(status, text)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("blocking::Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
