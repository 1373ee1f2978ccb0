//! HTTP transport with a uniform header and outcome contract.
//!
//! Every call resolves to an [`Outcome`]; nothing here panics or retries.
//! Authorization failures are only classified here, the gateway decides what
//! to do about them. A 401 on an anonymous request is a rejection of the
//! request itself, not of a session, and is reported like any other failure.

use std::sync::Arc;

use concierge_core::error::INVALID_RESPONSE_FORMAT;
use concierge_core::{ApiError, Outcome};
use concierge_store::SessionStore;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;

use crate::config::ClientConfig;

/// Which credential, if any, to attach to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// Use the credential of the stored session, if there is one.
    Session,
    /// Send no authorization header.
    Anonymous,
    /// Use this credential.
    Bearer(String),
}

/// Issues requests against the REST API and classifies their outcomes.
#[derive(Clone)]
pub struct Transport {
    client: Client,
    base_url: String,
    store: Arc<dyn SessionStore>,
}

impl Transport {
    /// Create a transport from configuration.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should never happen with default TLS).
    #[must_use]
    pub fn new(config: &ClientConfig, store: Arc<dyn SessionStore>) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .expect("failed to create HTTP client");

        Self::with_client(client, &config.base_url, store)
    }

    /// Create a transport with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: Client, base_url: &str, store: Arc<dyn SessionStore>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
        }
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Resolve the credential a request would carry.
    #[must_use]
    pub fn credential_for(&self, auth: &Auth) -> Option<String> {
        match auth {
            Auth::Anonymous => None,
            Auth::Bearer(token) => Some(token.clone()),
            Auth::Session => match self.store.read() {
                Ok(session) => session.map(|s| s.credential),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read session for request");
                    None
                }
            },
        }
    }

    fn headers(&self, auth: &Auth, json: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if json {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(token) = self.credential_for(auth) {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("Credential is not a valid header value, sending without it"),
            }
        }
        headers
    }

    /// Send a JSON request.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        auth: Auth,
    ) -> Outcome<Value> {
        let url = self.url(path);
        tracing::debug!(%method, url = %url, "Sending request");

        let mut request = self
            .client
            .request(method, &url)
            .headers(self.headers(&auth, true));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        Self::execute(request, &url, auth == Auth::Anonymous).await
    }

    /// Send a multipart upload.
    ///
    /// No `Content-Type` is set here; the multipart encoder supplies it with
    /// its boundary.
    pub async fn upload(&self, method: Method, path: &str, form: Form, auth: Auth) -> Outcome<Value> {
        let url = self.url(path);
        tracing::debug!(%method, url = %url, "Sending upload");

        let request = self
            .client
            .request(method, &url)
            .headers(self.headers(&auth, false))
            .multipart(form);

        Self::execute(request, &url, auth == Auth::Anonymous).await
    }

    async fn execute(request: RequestBuilder, url: &str, anonymous: bool) -> Outcome<Value> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Request failed without a response");
                return Err(ApiError::transport(e.to_string()));
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED && !anonymous {
            tracing::warn!(url = %url, "Request rejected as unauthorized");
            return Err(ApiError::auth_expired());
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to read response body");
                return Err(ApiError::transport(e.to_string()));
            }
        };

        let outcome = if anonymous {
            classify_body(status, &body)
        } else {
            classify(status, &body)
        };
        if let Err(err) = &outcome {
            tracing::warn!(url = %url, status = status.as_u16(), error = %err, "Request failed");
        }
        outcome
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Classify a received response.
pub(crate) fn classify(status: StatusCode, body: &str) -> Outcome<Value> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::auth_expired());
    }
    classify_body(status, body)
}

/// Classify a response by its status and body alone.
fn classify_body(status: StatusCode, body: &str) -> Outcome<Value> {
    let code = status.as_u16();
    let body = body.trim();

    if status.is_success() {
        if body.is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_str(body).map_err(|_| ApiError::server(code, INVALID_RESPONSE_FORMAT));
    }

    let phrase = status.canonical_reason().unwrap_or("request failed");
    if body.is_empty() {
        return Err(ApiError::server(code, phrase));
    }

    match serde_json::from_str::<Value>(body) {
        Ok(value) => {
            let message = ["error", "message"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str))
                .filter(|message| !message.is_empty())
                .unwrap_or(phrase);
            Err(ApiError::server(code, message))
        }
        Err(_) => Err(ApiError::server(code, INVALID_RESPONSE_FORMAT)),
    }
}
