//! HTTP client adapter for the recipe API
//!
//! Attaches bearer credentials from the session, unwraps error envelopes into
//! [`ApiError`] and runs a single token refresh cycle when a request is rejected
//! with 401.

use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Display;
use std::sync::Arc;
use url::Url;

use crate::auth::session::SessionState;
use crate::auth::RefreshResponse;
use crate::config::ClientOptions;
use crate::error::{ApiError, Result};

const REFRESH_PATH: &str = "/auth/token/refresh";

/// Query string parameters.
///
/// Absent and empty values are never added, so "no filter" is never sent as a
/// filter on the empty string. Order is preserved and keys may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
    // Names added through `repeated`
    lists: Vec<String>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter unless its rendered value is empty
    pub fn set<V: Display>(mut self, key: &str, value: V) -> Self {
        let value = value.to_string();
        if !value.is_empty() {
            self.pairs.push((key.to_string(), value));
        }
        self
    }

    /// Add a parameter when present
    pub fn opt<V: Display>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(key, value),
            None => self,
        }
    }

    /// Add one `key=value` pair per element
    pub fn repeated<V: Display>(mut self, key: &str, values: &[V]) -> Self {
        if !self.is_list(key) {
            self.lists.push(key.to_string());
        }
        for value in values {
            self = self.set(key, value);
        }
        self
    }

    /// Add `key=true` only when the flag is set
    pub fn flag(self, key: &str, value: bool) -> Self {
        if value {
            self.set(key, "true")
        } else {
            self
        }
    }

    /// Whether `key` holds a list, even when only one value was given
    pub fn is_list(&self, key: &str) -> bool {
        self.lists.iter().any(|name| name == key)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Helper for building and executing a single HTTP request
pub struct FetchBuilder<'a> {
    client: &'a Client,
    url: Url,
    method: Method,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl<'a> FetchBuilder<'a> {
    /// Create a new FetchBuilder
    pub fn new(client: &'a Client, url: Url, method: Method) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        Self {
            client,
            url,
            method,
            headers,
            body: None,
        }
    }

    /// Add a header to the request
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Add bearer token authentication to the request
    pub fn bearer_auth(self, token: Option<&str>) -> Self {
        match token {
            Some(token) => self.header("Authorization", &format!("Bearer {}", token)),
            None => self,
        }
    }

    /// Add query parameters to the request
    pub fn query(mut self, params: Option<&QueryParams>) -> Self {
        if let Some(params) = params.filter(|p| !p.is_empty()) {
            let mut query_pairs = self.url.query_pairs_mut();
            for (key, value) in params.pairs() {
                query_pairs.append_pair(key, value);
            }
        }
        self
    }

    /// Add a JSON body to the request
    pub fn json<T: Serialize>(mut self, body: Option<&T>) -> Result<Self> {
        if let Some(body) = body {
            self.body = Some(serde_json::to_vec(body)?);
        }
        Ok(self)
    }

    fn build(self) -> RequestBuilder {
        let mut req = self.client.request(self.method, self.url).headers(self.headers);
        if let Some(body) = self.body {
            req = req.body(body);
        }
        req
    }

    /// Execute the request and parse the response as JSON.
    ///
    /// Empty 2xx bodies decode to `Value::Null`.
    pub async fn execute(self) -> Result<Value> {
        let response = self.build().send().await?;
        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) if !status.is_success() => {
                return Err(ApiError::http(status.as_u16(), e));
            }
            Err(e) => return Err(ApiError::network(e)),
        };

        if !status.is_success() {
            return Err(ApiError::from_response(status.as_u16(), &text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(ApiError::decode)
    }
}

struct ClientInner {
    base_url: String,
    http: Client,
    session: Arc<SessionState>,
    options: ClientOptions,
}

/// Authenticated JSON client shared by all resource services
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    pub(crate) fn new(options: ClientOptions, session: Arc<SessionState>) -> Result<Self> {
        Url::parse(&options.base_url)?;

        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ApiError::network)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                base_url: options.base_url.trim_end_matches('/').to_string(),
                http,
                session,
                options,
            }),
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    pub(crate) fn session(&self) -> &Arc<SessionState> {
        &self.inner.session
    }

    /// Resolve an API path against the base URL
    pub fn url(&self, path: &str) -> Result<Url> {
        let mut full = format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'));
        if self.inner.options.trailing_slash && !full.ends_with('/') {
            full.push('/');
        }
        Ok(Url::parse(&full)?)
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: Option<&QueryParams>,
        token: Option<&str>,
    ) -> Result<Value> {
        debug!("{} {}", method, path);
        FetchBuilder::new(&self.inner.http, self.url(path)?, method)
            .bearer_auth(token)
            .query(query)
            .json(body)?
            .execute()
            .await
    }

    /// Send a request and return the decoded JSON body.
    ///
    /// A 401 on a request that carried an access token triggers exactly one refresh
    /// followed by one retry. When the refresh fails an [`ApiError::Auth`] carrying
    /// the original status and message is returned, and the session is cleared
    /// unless a newer one replaced it while the refresh was running.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: Option<&QueryParams>,
    ) -> Result<Value> {
        let (token, epoch) = self.inner.session.access_token_at();
        let result = self
            .send_once(method.clone(), path, body, query, token.as_deref())
            .await;

        let original = match result {
            Err(e)
                if e.is_unauthorized()
                    && token.is_some()
                    && self.inner.options.auto_refresh_token =>
            {
                e
            }
            other => return other,
        };

        match self.refresh_access_token(token.as_deref()).await {
            Ok(fresh) => {
                self.send_once(method, path, body, query, Some(&fresh))
                    .await
            }
            Err(e) => {
                if self.inner.session.clear_all_if(epoch).await {
                    warn!("Token refresh failed, session cleared: {}", e);
                } else {
                    debug!("Token refresh failed for a replaced session: {}", e);
                }
                let message = match &original {
                    ApiError::Http { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                Err(ApiError::auth(original.status(), message))
            }
        }
    }

    /// Send a request and decode the body into `T`
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: Option<&QueryParams>,
    ) -> Result<T> {
        let value = self.send(method, path, body, query).await?;
        serde_json::from_value(value).map_err(ApiError::decode)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: Option<&QueryParams>) -> Result<T> {
        self.send_json(Method::GET, path, None, query).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: Option<Value>) -> Result<T> {
        self.send_json(Method::POST, path, body.as_ref(), None).await
    }

    pub async fn put<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        self.send_json(Method::PUT, path, Some(&body), None).await
    }

    /// POST without credentials and without the refresh cycle, for login and
    /// registration
    pub async fn post_public<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        let value = self
            .send_once(Method::POST, path, Some(&body), None, None)
            .await?;
        serde_json::from_value(value).map_err(ApiError::decode)
    }

    /// DELETE a resource, ignoring any confirmation body
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(Method::DELETE, path, None, None).await.map(|_| ())
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Concurrent callers share one refresh: a caller that waited on another refresh
    /// and finds the access token already replaced gets the new token without a
    /// second network call. `stale` is the access token the caller saw rejected.
    pub(crate) async fn refresh_access_token(&self, stale: Option<&str>) -> Result<String> {
        let session = &self.inner.session;
        let _guard = session.refresh_lock.lock().await;

        let current = session.access_token();
        if let (Some(current), Some(stale)) = (&current, stale) {
            if current != stale {
                return Ok(current.clone());
            }
        }

        let refresh = session
            .refresh_token()
            .ok_or_else(|| ApiError::auth(None, "No refresh token available"))?;

        info!("Refreshing access token");
        let body = json!({ "refresh": refresh });
        let value = self
            .send_once(Method::POST, REFRESH_PATH, Some(&body), None, None)
            .await?;
        let response: RefreshResponse = serde_json::from_value(value)?;

        if !session.rotate_tokens(&refresh, response.access.clone(), response.refresh) {
            return Err(ApiError::auth(None, "Session changed during token refresh"));
        }
        session.persist_current().await;
        info!("Access token refreshed");
        Ok(response.access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStorage;

    fn client(options: ClientOptions) -> ApiClient {
        let session = Arc::new(SessionState::new(Arc::new(MemoryStorage::new()), &options));
        ApiClient::new(options, session).unwrap()
    }

    #[test]
    fn test_query_params_skip_absent_values() {
        let tags = vec!["vegan".to_string(), "".to_string(), "quick".to_string()];
        let params = QueryParams::new()
            .opt("q", None::<&str>)
            .opt("cuisine", Some(""))
            .repeated("tags", &tags)
            .opt("page", Some(2))
            .flag("unread_only", false);

        assert_eq!(
            params.pairs(),
            &[
                ("tags".to_string(), "vegan".to_string()),
                ("tags".to_string(), "quick".to_string()),
                ("page".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_url_join() {
        let api = client(ClientOptions::new("http://localhost:8000/api/"));
        assert_eq!(
            api.url("/recipes/choco-cookies").unwrap().as_str(),
            "http://localhost:8000/api/recipes/choco-cookies"
        );

        let django = client(ClientOptions::new("http://localhost:8000/api").with_trailing_slash(true));
        assert_eq!(
            django.url("/auth/me").unwrap().as_str(),
            "http://localhost:8000/api/auth/me/"
        );
    }

    #[tokio::test]
    async fn test_truncated_error_body_keeps_status() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 502 Bad Gateway\r\nContent-Length: 100\r\n\r\npartial")
                .await
                .unwrap();
        });

        let http = Client::new();
        let url = Url::parse(&format!("http://{}/recipes", addr)).unwrap();
        let err = FetchBuilder::new(&http, url, Method::GET)
            .execute()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Http);
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn test_invalid_base_url() {
        let options = ClientOptions::new("not a url");
        let session = Arc::new(SessionState::new(Arc::new(MemoryStorage::new()), &options));
        let err = ApiClient::new(options, session).err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::Url);
    }
}
