//! main client
//!
//! one async method per remote operation. every call is a single request and
//! response; nothing is retried or cached.

use crate::config::ClientConfig;
use crate::error::Result;
use crate::graphql::GraphQlResponse;
use crate::request::{self, Call, Outgoing};
use crate::types::{Collection, Document, Query, Update};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

/// async http client for gitdb
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    http: reqwest::Client,
    authorization: HeaderValue,
}

impl Client {
    /// create a new client
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let authorization = config.authorization()?;

        let http = reqwest::Client::builder()
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
    ///
    /// other clones of this client keep their current base url.
    pub fn set_base_url(&mut self, base_url: impl AsRef<str>) -> Result<()> {
        Arc::make_mut(&mut self.config).set_base_url(base_url)
    }

    /// check that the server answers `GET /health` with 200
    pub async fn health(&self) -> Result<()> {
        self.dispatch(request::health()).await
    }

    /// create a collection
    pub async fn create_collection(&self, name: &str) -> Result<()> {
        self.dispatch(request::create_collection(name)).await
    }

    /// list every collection with its document count
    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        self.dispatch(request::list_collections()).await
    }

    /// delete a collection and its documents
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        self.dispatch(request::delete_collection(name)).await
    }

    /// insert a document and return the id assigned by the server
    pub async fn insert(&self, collection: &str, document: &Document) -> Result<String> {
        let body = serde_json::Value::Object(document.clone());
        self.dispatch(request::insert(collection, body)).await
    }

    /// insert any serializable record that encodes as a json object
    pub async fn insert_as<D: Serialize>(
        &self,
        collection: &str,
        document: &D,
    ) -> Result<String> {
        let body = request::document_body(document)?;
        self.dispatch(request::insert(collection, body)).await
    }

    /// find every document matching `query`; an empty query matches all
    pub async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        self.find_as(collection, query).await
    }

    /// find and deserialize every matching document
    pub async fn find_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<T>> {
        self.dispatch(request::find(collection, query)).await
    }

    /// first document matching `query`, or [`crate::Error::NotFound`]
    pub async fn find_one(&self, collection: &str, query: &Query) -> Result<Document> {
        self.find_one_as(collection, query).await
    }

    /// first matching document, deserialized
    pub async fn find_one_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<T> {
        let documents = self.find_as(collection, query).await?;
        request::first_or_not_found(collection, documents)
    }

    /// fetch a document by id
    pub async fn find_by_id(&self, collection: &str, id: &str) -> Result<Document> {
        self.find_by_id_as(collection, id).await
    }

    /// fetch a document by id and deserialize it
    pub async fn find_by_id_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<T> {
        self.dispatch(request::find_by_id(collection, id)).await
    }

    /// apply `update` to the document with `id`
    pub async fn update(&self, collection: &str, id: &str, update: &Update) -> Result<()> {
        self.dispatch(request::update(collection, id, update)).await
    }

    /// apply `update` to every matching document; returns the modified count
    pub async fn update_many(
        &self,
        collection: &str,
        query: &Query,
        update: &Update,
    ) -> Result<u64> {
        self.dispatch(request::update_many(collection, query, update)).await
    }

    /// delete the document with `id`
    pub async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.dispatch(request::delete(collection, id)).await
    }

    /// delete every matching document; returns the deleted count
    pub async fn delete_many(&self, collection: &str, query: &Query) -> Result<u64> {
        self.dispatch(request::delete_many(collection, query)).await
    }

    /// count the documents matching `query`
    pub async fn count(&self, collection: &str, query: &Query) -> Result<u64> {
        self.dispatch(request::count(collection, query)).await
    }

    /// execute a raw graphql query
    ///
    /// if the server reports errors, the call fails with
    /// [`crate::Error::RemoteErrors`], which carries every message together
    /// with any partial `data`.
    pub async fn graphql(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<GraphQlResponse<serde_json::Value>> {
        self.graphql_as(query, variables).await
    }

    /// execute a graphql query and deserialize `data` into a typed response
    pub async fn graphql_as<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<GraphQlResponse<T>> {
        self.dispatch(request::graphql(query, variables)?).await
    }

    async fn dispatch<T>(&self, call: Call<T>) -> Result<T> {
        self.dispatch_with(call, |outgoing| self.send(outgoing)).await
    }

    async fn send(&self, outgoing: Outgoing) -> Result<(StatusCode, String)> {
        let mut builder = self.http.request(outgoing.method, outgoing.url);
        if outgoing.authenticated {
            builder = builder.header(AUTHORIZATION, self.authorization.clone());
        }
        if let Some(body) = &outgoing.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }

    pub(crate) async fn dispatch_with<T, F, Fut>(&self, call: Call<T>, send: F) -> Result<T>
    where
        F: FnOnce(Outgoing) -> Fut,
        Fut: Future<Output = Result<(StatusCode, String)>>,
    {
        let (outgoing, reply) = call.prepare(&self.config)?;
        let (status, text) = send(outgoing).await?;
        reply.handle(status, text)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
