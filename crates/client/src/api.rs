//! HTTP client for the storefront REST backend.
//!
//! Paths are relative to the configured base URL (`/auth/me`, `/cart/`, ...).
//! Every request carries `Authorization: Bearer <token>` when a token is
//! present in the shared [`TokenStorage`], so stores never pass credentials
//! around themselves. Any non-success status is an error.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::storage::{TOKEN_KEY, TokenStorage};

/// Longest slice of a response body copied into logs and error messages.
const BODY_SNIPPET_LEN: usize = 200;

/// Client for the storefront REST API.
///
/// Cheap to clone; clones share the connection pool and token storage.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    storage: Arc<dyn TokenStorage>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ClientConfig, storage: Arc<dyn TokenStorage>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("shopfront/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client: builder.build()?,
                base_url: config.api_url.as_str().trim_end_matches('/').to_string(),
                storage,
            }),
        })
    }

    /// The base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// The token storage this client authenticates from.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn TokenStorage> {
        &self.inner.storage
    }

    // =========================================================================
    // Verbs
    // =========================================================================

    /// `GET path` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the status is not a success,
    /// or the body does not decode as `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.request(Method::GET, path)?;
        self.execute(request, path).await
    }

    /// `GET path?query` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let request = self.request(Method::GET, path)?.query(query);
        self.execute(request, path).await
    }

    /// `POST path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::POST, path)?.json(body);
        self.execute(request, path).await
    }

    /// `POST path` with an `application/x-www-form-urlencoded` body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn post_form<T, B>(&self, path: &str, form: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::POST, path)?.form(form);
        self.execute(request, path).await
    }

    /// `PUT path?query` with no body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn put_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let request = self.request(Method::PUT, path)?.query(query);
        self.execute(request, path).await
    }

    /// `DELETE path`, returning whatever JSON the server sent (often a
    /// `{"message": ...}` acknowledgement).
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn delete(&self, path: &str) -> Result<serde_json::Value> {
        let request = self.request(Method::DELETE, path)?;
        self.execute(request, path).await
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.inner.base_url)
        } else {
            format!("{}/{path}", self.inner.base_url)
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = reqwest::Url::parse(&self.url(path))?;
        let request = self.inner.client.request(method, url);

        let token = self
            .inner
            .storage
            .get(TOKEN_KEY)?
            .filter(|t| !t.is_empty());

        Ok(match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    #[instrument(skip_all, fields(path = %path))]
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        debug!(status = %status, "API response");

        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }

        let text = response.text().await?;
        let body = if text.trim().is_empty() { "null" } else { &text };

        serde_json::from_str(body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %snippet(&text),
                "Failed to parse API response"
            );
            ClientError::Parse(e)
        })
    }
}

/// Build an [`ClientError::Api`] from a failed response.
///
/// The backend reports failures as `{"detail": "..."}` (or a list of
/// validation problems under `detail`); fall back to the raw body.
async fn error_from_response(status: StatusCode, response: Response) -> ClientError {
    let text = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("detail").cloned())
        .map_or_else(
            || snippet(&text),
            |detail| match detail {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            },
        );

    ClientError::Api { status, message }
}

fn snippet(text: &str) -> String {
    text.chars().take(BODY_SNIPPET_LEN).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, storage: MemoryStorage) -> ApiClient {
        let config = ClientConfig::for_api_url(&format!("{}/api", server.uri())).unwrap();
        ApiClient::new(&config, Arc::new(storage)).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let config = ClientConfig::for_api_url("http://shop.test/api/").unwrap();
        let client = ApiClient::new(&config, Arc::new(MemoryStorage::new())).unwrap();
        assert_eq!(client.url("/cart/"), "http://shop.test/api/cart/");
        assert_eq!(client.url("health"), "http://shop.test/api/health");
    }

    #[tokio::test]
    async fn test_bearer_token_attached_from_storage() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .and(header("authorization", "Bearer stored-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, MemoryStorage::with_token("stored-token"));
        let body: serde_json::Value = client.get("/auth/me").await.unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_no_authorization_without_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
            .mount(&server)
            .await;

        let client = client_for(&server, MemoryStorage::new());
        let body: serde_json::Value = client.get("/health").await.unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_form_post_is_urlencoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("username=jo&password=p%40ss"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, MemoryStorage::new());
        let _: serde_json::Value = client
            .post_form("/auth/login", &[("username", "jo"), ("password", "p@ss")])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_sends_query() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/cart/5"))
            .and(query_param("quantity", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, MemoryStorage::new());
        let _: serde_json::Value = client.put_query("/cart/5", &[("quantity", 3)]).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_detail_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/cart/9"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Cart item not found"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, MemoryStorage::new());
        let err = client.delete("/cart/9").await.unwrap_err();
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(message, "Cart item not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_plain_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = client_for(&server, MemoryStorage::new());
        let err = client.get::<serde_json::Value>("/cart/").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
        assert!(err.to_string().contains("bad gateway"));
    }

    #[tokio::test]
    async fn test_empty_body_decodes_as_null() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server, MemoryStorage::new());
        let body = client.delete("/cart/").await.unwrap();
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn test_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = client_for(&server, MemoryStorage::new());
        let err = client.get::<serde_json::Value>("/auth/me").await.unwrap_err();
        assert!(matches!(err, ClientError::Parse(_)));
    }
}
