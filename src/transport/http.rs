//! Directus REST transport

use async_trait::async_trait;
use reqwest::{
    Client,
    RequestBuilder,
    Response,
    StatusCode,
};
use serde_json::{
    Value,
    json,
};

use super::{
    Query,
    Transport,
    TransportError,
};
use crate::config::{
    AuthMode,
    Credentials,
    DirectusSettings,
};

/// Maximum number of body characters kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Talks to a Directus instance over its REST API.
#[derive(Clone)]
pub struct HttpTransport {
    /// Shared HTTP client
    http: Client,
    /// Base URL without trailing slash
    base_url: String,
    /// Bearer token sent with every request, from a login or a static token
    token: Option<String>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Creates an anonymous transport for `url`.
    pub fn new(url: &str) -> Result<Self, TransportError> {
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Unreachable { url: url.to_string(), source: Box::new(e) })?;

        Ok(Self { http, base_url: url.trim_end_matches('/').to_string(), token: None })
    }

    /// Creates a transport and authenticates it the way the settings ask:
    /// a login first when credentials are given, then the static token if any.
    pub async fn connect(settings: &DirectusSettings) -> Result<Self, TransportError> {
        let mut transport = Self::new(&settings.url)?;

        if let Some(credentials) = &settings.login {
            transport.login(credentials, settings.auth.mode).await?;
        }
        if let Some(token) = &settings.token {
            transport.token = Some(token.expose().to_string());
        }

        Ok(transport)
    }

    /// Uses a static access token for every following request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Logs in with email and password and keeps the returned access token.
    pub async fn login(
        &mut self,
        credentials: &Credentials,
        mode: AuthMode,
    ) -> Result<(), TransportError> {
        let url = format!("{}/auth/login", self.base_url);
        tracing::debug!(%url, email = %credentials.email, "Logging in to Directus");

        let request = self.http.post(&url).json(&json!({
            "email": credentials.email,
            "password": credentials.password,
            "mode": mode.as_str(),
        }));
        let data = Self::send_for_data(&url, request).await?;

        let token = data.get("access_token").and_then(Value::as_str).ok_or_else(|| {
            TransportError::InvalidResponse {
                url: url.clone(),
                message: "login response carries no access_token".to_string(),
            }
        })?;
        self.token = Some(token.to_string());

        Ok(())
    }

    /// REST endpoint serving a collection.
    ///
    /// System collections live at the root (`directus_collections` is
    /// `/collections`), user collections under `/items`.
    #[must_use]
    pub fn endpoint(&self, collection: &str) -> String {
        collection.strip_prefix("directus_").map_or_else(
            || format!("{}/items/{collection}", self.base_url),
            |system| format!("{}/{system}", self.base_url),
        )
    }

    /// Attaches the bearer token when one is known.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends a request and checks the response status.
    async fn send(url: &str, request: RequestBuilder) -> Result<Response, TransportError> {
        let response = request.send().await.map_err(|e| TransportError::Unreachable {
            url: url.to_string(),
            source: Box::new(e),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(url, status, &body))
    }

    /// Sends a request and unwraps the `{"data": ...}` envelope.
    async fn send_for_data(url: &str, request: RequestBuilder) -> Result<Value, TransportError> {
        let response = Self::send(url, request).await?;
        let body: Value = response.json().await.map_err(|e| TransportError::InvalidResponse {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        unwrap_data(url, body)
    }
}

/// Error for a non-success response.
///
/// 401 and 403 mean access was refused; every other status keeps the start
/// of the body for the log.
fn status_error(url: &str, status: StatusCode, body: &str) -> TransportError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return TransportError::Forbidden { url: url.to_string(), status: status.as_u16() };
    }

    TransportError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        body: body.chars().take(ERROR_BODY_LIMIT).collect(),
    }
}

/// Extracts the `data` member of a Directus response envelope.
fn unwrap_data(url: &str, body: Value) -> Result<Value, TransportError> {
    match body {
        Value::Object(mut envelope) => {
            envelope.remove("data").ok_or_else(|| TransportError::InvalidResponse {
                url: url.to_string(),
                message: "response has no `data` member".to_string(),
            })
        }
        other => Err(TransportError::InvalidResponse {
            url: url.to_string(),
            message: format!("expected a JSON object, got {other}"),
        }),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn read_items(&self, collection: &str, query: &Query) -> Result<Value, TransportError> {
        let url = self.endpoint(collection);
        tracing::debug!(%url, collection, "Reading collection");

        let request = self.authorize(self.http.get(&url).query(&query.to_pairs()));
        Self::send_for_data(&url, request).await
    }

    async fn ping(&self) -> Result<String, TransportError> {
        let url = format!("{}/server/ping", self.base_url);
        let response = Self::send(&url, self.authorize(self.http.get(&url))).await?;

        response
            .text()
            .await
            .map_err(|e| TransportError::InvalidResponse { url, message: e.to_string() })
    }
}
