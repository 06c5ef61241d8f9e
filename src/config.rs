//! client configuration
//!
//! build a [`ClientConfig`] with base url, token, and optional overrides.
//! pass it to [`crate::Client::new`] or [`crate::blocking::Client::new`].

use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use url::Url;

/// base url of a gitdb server running locally with default settings
pub const DEFAULT_BASE_URL: &str = "http://localhost:7896";

/// configuration for the gitdb client
#[derive(Clone)]
pub struct ClientConfig {
    /// base url as given by the caller
    pub(crate) raw_base_url: String,

    /// parsed base url, or the reason it did not parse
    pub(crate) base_url: std::result::Result<Url, url::ParseError>,

    /// bearer token sent on every authenticated request
    pub(crate) token: String,

    /// github owner of the backing repository
    pub(crate) owner: String,

    /// backing repository name
    pub(crate) repo: String,

    /// request timeout duration
    pub(crate) timeout: Duration,

    /// user agent string
    pub(crate) user_agent: String,

    /// whether to verify ssl certificates
    pub(crate) verify_ssl: bool,

    /// additional headers to send with every request
    pub(crate) extra_headers: HeaderMap,
}

impl ClientConfig {
    /// create a new client configuration
    ///
    /// # arguments
    ///
    /// * `base_url` - the base url of the gitdb server (with or without trailing slash)
    /// * `token` - the bearer token
    ///
    /// # example
    ///
    /// ```
    /// use gitdb::ClientConfig;
    ///
    /// let config = ClientConfig::new("http://localhost:7896", "your-token-here")
    ///     .with_repository("octocat", "data");
    /// assert_eq!(config.owner(), "octocat");
    /// ```
    pub fn new(base_url: impl AsRef<str>, token: impl Into<String>) -> Self {
        let raw_base_url = base_url.as_ref().to_string();
        Self {
            base_url: parse_base_url(&raw_base_url),
            raw_base_url,
            token: token.into(),
            owner: String::new(),
            repo: String::new(),
            timeout: Duration::from_secs(30),
            user_agent: format!("gitdb-rs/{} (Rust)", env!("CARGO_PKG_VERSION")),
            verify_ssl: true,
            extra_headers: HeaderMap::new(),
        }
    }

    /// configuration for a server at [`DEFAULT_BASE_URL`]
    pub fn local(token: impl Into<String>) -> Self {
        Self::new(DEFAULT_BASE_URL, token)
    }

    /// read configuration from the environment
    ///
    /// `GITDB_TOKEN` is required. `GITDB_URL` defaults to [`DEFAULT_BASE_URL`];
    /// `GITDB_OWNER`, `GITDB_REPO`, and `GITDB_TIMEOUT_SECS` are optional.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = lookup("GITDB_TOKEN")
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::Config("GITDB_TOKEN is not set".to_string()))?;
        let base_url = lookup("GITDB_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut config = Self::new(base_url, token).with_repository(
            lookup("GITDB_OWNER").unwrap_or_default(),
            lookup("GITDB_REPO").unwrap_or_default(),
        );

        if let Some(raw) = lookup("GITDB_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!("invalid GITDB_TIMEOUT_SECS value: {raw}"))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// set the repository that backs the database
    pub fn with_repository(mut self, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        self.owner = owner.into();
        self.repo = repo.into();
        self
    }

    /// set the request timeout
    ///
    /// default: 30 seconds
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// set a custom user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// disable ssl certificate verification (not recommended for production)
    ///
    /// default: enabled
    pub fn with_ssl_verification(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    /// add a header to every request
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.extra_headers.insert(name, value);
        self
    }

    /// add a set of headers to every request
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.extra_headers.extend(headers);
        self
    }

    /// base url as given by the caller
    pub fn base_url(&self) -> &str {
        &self.raw_base_url
    }

    /// repository owner
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// repository name
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// access extra headers configured on this client
    pub fn extra_headers(&self) -> &HeaderMap {
        &self.extra_headers
    }

    /// `Authorization: Bearer <token>` value, marked sensitive
    pub(crate) fn authorization(&self) -> Result<HeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|err| Error::Config(format!("invalid api token header value: {err}")))?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// replace the base url, keeping the previous one if the new one is invalid
    pub(crate) fn set_base_url(&mut self, base_url: impl AsRef<str>) -> Result<()> {
        let raw = base_url.as_ref();
        let parsed = parse_base_url(raw)?;
        check_scheme(&parsed)?;
        self.raw_base_url = raw.to_string();
        self.base_url = Ok(parsed);
        Ok(())
    }

    /// validate the configuration
    pub(crate) fn validate(&self) -> Result<()> {
        let base_url = self.parsed_base_url()?;
        check_scheme(base_url)?;

        if self.token.is_empty() {
            return Err(Error::Config("api token cannot be empty".to_string()));
        }

        Ok(())
    }

    /// build an endpoint url by appending percent-encoded path segments
    pub(crate) fn endpoint<S: AsRef<str>>(&self, segments: &[S]) -> Result<Url> {
        let mut url = self.parsed_base_url()?.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn parsed_base_url(&self) -> Result<&Url> {
        self.base_url.as_ref().map_err(|err| Error::Url(*err))
    }
}

/// parse a base url, retrying with `http://` when the scheme is missing
fn parse_base_url(raw: &str) -> std::result::Result<Url, url::ParseError> {
    let normalized = raw.trim().trim_end_matches('/');
    match Url::parse(normalized) {
        Ok(url) if url.has_host() => Ok(url),
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("http://{normalized}"))
        }
        Err(err) => Err(err),
    }
}

fn check_scheme(url: &Url) -> Result<()> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::Config(format!(
            "invalid url scheme: {}. must be http or https",
            url.scheme()
        )));
    }
    Ok(())
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.raw_base_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("verify_ssl", &self.verify_ssl)
            .field("extra_headers", &self.extra_headers.len())
            .field("token", &"<redacted>")
            .finish()
    }
}
