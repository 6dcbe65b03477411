//! HTTP client for the practice backend's JSON document API.
//!
//! Each logical record is one document; reads of absent documents return a
//! `null` body and writes are idempotent full-value replacements.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use aasanify_core::practice::{SessionRecord, UserId, UserProfile};
use aasanify_core::sync::{RemoteError, RemoteStoreTrait};

use crate::error::{RemoteSyncError, Result};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Error body shape the backend returns on failures.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
}

/// Client for the practice backend document API.
#[derive(Debug, Clone)]
pub struct PracticeSyncClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl PracticeSyncClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the backend (e.g., "https://api.aasanify.app")
    /// * `token` - Access token presented as a bearer credential
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Create headers for an API request.
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| RemoteSyncError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        Ok(headers)
    }

    fn document_url(&self, user: &UserId, suffix: &str) -> String {
        format!("{}/users/{}/{}.json", self.base_url, user, suffix)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    fn api_error(status: reqwest::StatusCode, body: &str) -> RemoteSyncError {
        if let Ok(error) = serde_json::from_str::<ApiErrorBody>(body) {
            return RemoteSyncError::api(status.as_u16(), error.error);
        }
        RemoteSyncError::api(status.as_u16(), format!("Request failed: {}", body))
    }

    /// Parse a JSON document body; a `null` body means the document does not
    /// exist.
    async fn parse_document<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Option<T>> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::api_error(status, &body));
        }
        if body.trim() == "null" {
            return Ok(None);
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| {
                log::error!("Failed to deserialize document. Body: {}, Error: {}", body, e);
                RemoteSyncError::from(e)
            })
    }

    /// Check a write response, discarding the echoed document body.
    async fn expect_success(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::api_error(status, &body));
        }
        Ok(())
    }

    /// Fetch the user profile document.
    ///
    /// GET /users/{userId}/profile.json
    pub async fn fetch_profile(&self, user: &UserId) -> Result<Option<UserProfile>> {
        let url = self.document_url(user, "profile");
        let response = self.client.get(&url).headers(self.headers()?).send().await?;
        Self::parse_document(response).await
    }

    /// Replace the user profile document.
    ///
    /// PUT /users/{userId}/profile.json
    pub async fn store_profile(&self, user: &UserId, profile: &UserProfile) -> Result<()> {
        let url = self.document_url(user, "profile");
        let response = self
            .client
            .put(&url)
            .headers(self.headers()?)
            .json(profile)
            .send()
            .await?;
        Self::expect_success(response).await
    }

    /// Fetch one session document.
    ///
    /// GET /users/{userId}/sessions/{date}.json
    pub async fn fetch_session(
        &self,
        user: &UserId,
        date: NaiveDate,
    ) -> Result<Option<SessionRecord>> {
        let url = self.document_url(user, &format!("sessions/{}", date));
        let response = self.client.get(&url).headers(self.headers()?).send().await?;
        Self::parse_document(response).await
    }

    /// Replace one session document.
    ///
    /// PUT /users/{userId}/sessions/{date}.json
    pub async fn store_session(
        &self,
        user: &UserId,
        date: NaiveDate,
        record: &SessionRecord,
    ) -> Result<()> {
        let url = self.document_url(user, &format!("sessions/{}", date));
        let response = self
            .client
            .put(&url)
            .headers(self.headers()?)
            .json(record)
            .send()
            .await?;
        Self::expect_success(response).await
    }

    /// Fetch the whole session collection, keyed by date.
    ///
    /// GET /users/{userId}/sessions.json
    pub async fn fetch_all_sessions(
        &self,
        user: &UserId,
    ) -> Result<BTreeMap<NaiveDate, SessionRecord>> {
        let url = self.document_url(user, "sessions");
        let response = self.client.get(&url).headers(self.headers()?).send().await?;

        let documents: Option<BTreeMap<String, SessionRecord>> =
            Self::parse_document(response).await?;
        let mut sessions = BTreeMap::new();
        for (key, record) in documents.unwrap_or_default() {
            let date: NaiveDate = key.parse().map_err(|_| {
                RemoteSyncError::invalid_request(format!("Invalid session date key: {}", key))
            })?;
            sessions.insert(date, record);
        }
        Ok(sessions)
    }
}

#[async_trait]
impl RemoteStoreTrait for PracticeSyncClient {
    async fn get_profile(
        &self,
        user: &UserId,
    ) -> std::result::Result<Option<UserProfile>, RemoteError> {
        self.fetch_profile(user).await.map_err(Into::into)
    }

    async fn put_profile(
        &self,
        user: &UserId,
        profile: &UserProfile,
    ) -> std::result::Result<(), RemoteError> {
        self.store_profile(user, profile).await.map_err(Into::into)
    }

    async fn get_session(
        &self,
        user: &UserId,
        date: NaiveDate,
    ) -> std::result::Result<Option<SessionRecord>, RemoteError> {
        self.fetch_session(user, date).await.map_err(Into::into)
    }

    async fn put_session(
        &self,
        user: &UserId,
        date: NaiveDate,
        record: &SessionRecord,
    ) -> std::result::Result<(), RemoteError> {
        self.store_session(user, date, record)
            .await
            .map_err(Into::into)
    }

    async fn all_sessions(
        &self,
        user: &UserId,
    ) -> std::result::Result<BTreeMap<NaiveDate, SessionRecord>, RemoteError> {
        self.fetch_all_sessions(user).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex as TokioMutex;

    #[derive(Debug, Clone)]
    struct CapturedRequest {
        method: String,
        path: String,
        authorization: Option<String>,
        body: String,
    }

    fn header_end_offset(buffer: &[u8]) -> Option<usize> {
        buffer.windows(4).position(|window| window == b"\r\n\r\n")
    }

    async fn read_http_request(stream: &mut tokio::net::TcpStream) -> Option<CapturedRequest> {
        let mut buffer = Vec::new();
        loop {
            let mut chunk = [0_u8; 2048];
            let read = stream.read(&mut chunk).await.ok()?;
            if read == 0 {
                return None;
            }
            buffer.extend_from_slice(&chunk[..read]);
            if header_end_offset(&buffer).is_some() {
                break;
            }
        }

        let header_end = header_end_offset(&buffer)?;
        let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
        let mut lines = head.lines();
        let request_line = lines.next()?.to_string();
        let mut parts = request_line.split_whitespace();
        let method = parts.next()?.to_string();
        let path = parts.next()?.to_string();

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        let content_length = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        let mut body = buffer[header_end + 4..].to_vec();
        while body.len() < content_length {
            let mut chunk = [0_u8; 2048];
            let read = stream.read(&mut chunk).await.ok()?;
            if read == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..read]);
        }

        Some(CapturedRequest {
            method,
            path,
            authorization: headers.get("authorization").cloned(),
            body: String::from_utf8_lossy(&body).to_string(),
        })
    }

    fn status_text(status: u16) -> &'static str {
        match status {
            200 => "OK",
            400 => "Bad Request",
            401 => "Unauthorized",
            500 => "Internal Server Error",
            _ => "Error",
        }
    }

    async fn write_http_response(
        stream: &mut tokio::net::TcpStream,
        status: u16,
        body: &str,
    ) -> std::io::Result<()> {
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            status_text(status),
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await?;
        stream.flush().await
    }

    async fn start_mock_server(
        responses: Vec<(u16, String)>,
    ) -> (
        String,
        Arc<TokioMutex<Vec<CapturedRequest>>>,
        tokio::task::JoinHandle<()>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let captured = Arc::new(TokioMutex::new(Vec::<CapturedRequest>::new()));
        let scripted = Arc::new(TokioMutex::new(VecDeque::from(responses)));
        let captured_clone = Arc::clone(&captured);
        let scripted_clone = Arc::clone(&scripted);

        let handle = tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(value) => value,
                    Err(_) => break,
                };
                let captured_inner = Arc::clone(&captured_clone);
                let scripted_inner = Arc::clone(&scripted_clone);
                tokio::spawn(async move {
                    let Some(request) = read_http_request(&mut stream).await else {
                        return;
                    };
                    captured_inner.lock().await.push(request);

                    let (status, body) = scripted_inner
                        .lock()
                        .await
                        .pop_front()
                        .unwrap_or((500, r#"{"error":"unexpected request"}"#.to_string()));
                    let _ = write_http_response(&mut stream, status, &body).await;
                });
            }
        });

        (format!("http://{}", addr), captured, handle)
    }

    fn user() -> UserId {
        UserId::new("uid-1").expect("user id")
    }

    fn profile_body() -> String {
        r#"{"name":"Asha","age":29,"email":"asha@example.com","createdAt":"2024-03-01T08:00:00Z"}"#
            .to_string()
    }

    #[tokio::test]
    async fn absent_profile_document_reads_as_none() {
        let (base_url, _captured, server) =
            start_mock_server(vec![(200, "null".to_string())]).await;

        let client = PracticeSyncClient::new(&base_url, "token-1");
        let profile = client.fetch_profile(&user()).await.expect("fetch profile");
        assert_eq!(profile, None);

        server.abort();
    }

    #[tokio::test]
    async fn fetch_profile_parses_document_and_sends_bearer_token() {
        let (base_url, captured, server) =
            start_mock_server(vec![(200, profile_body())]).await;

        let client = PracticeSyncClient::new(&base_url, "token-1");
        let profile = client
            .fetch_profile(&user())
            .await
            .expect("fetch profile")
            .expect("profile present");
        assert_eq!(profile.name, "Asha");
        assert_eq!(profile.age, 29);

        let requests = captured.lock().await.clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].path, "/users/uid-1/profile.json");
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer token-1"));

        server.abort();
    }

    #[tokio::test]
    async fn store_session_puts_the_full_document() {
        let (base_url, captured, server) =
            start_mock_server(vec![(200, "{}".to_string())]).await;

        let client = PracticeSyncClient::new(&base_url, "token-1");
        let record = SessionRecord {
            completed: true,
            duration_minutes: 25,
            rounds_done: 4,
            session_type: "breathing".into(),
        };
        client
            .store_session(&user(), "2024-01-01".parse().expect("date"), &record)
            .await
            .expect("store session");

        let requests = captured.lock().await.clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "PUT");
        assert_eq!(requests[0].path, "/users/uid-1/sessions/2024-01-01.json");
        let body: serde_json::Value =
            serde_json::from_str(&requests[0].body).expect("request body JSON");
        assert_eq!(body.get("durationMinutes").and_then(|v| v.as_u64()), Some(25));
        assert_eq!(body.get("sessionType").and_then(|v| v.as_str()), Some("breathing"));

        server.abort();
    }

    #[tokio::test]
    async fn null_session_collection_reads_as_empty() {
        let (base_url, _captured, server) =
            start_mock_server(vec![(200, "null".to_string())]).await;

        let client = PracticeSyncClient::new(&base_url, "token-1");
        let sessions = client.fetch_all_sessions(&user()).await.expect("fetch sessions");
        assert!(sessions.is_empty());

        server.abort();
    }

    #[tokio::test]
    async fn session_collection_keys_parse_as_dates() {
        let body = r#"{
            "2024-01-02":{"completed":true,"durationMinutes":20,"roundsDone":3,"sessionType":"am"},
            "2024-01-01":{"completed":false,"durationMinutes":10,"roundsDone":1,"sessionType":"pm"}
        }"#;
        let (base_url, _captured, server) =
            start_mock_server(vec![(200, body.to_string())]).await;

        let client = PracticeSyncClient::new(&base_url, "token-1");
        let sessions = client.fetch_all_sessions(&user()).await.expect("fetch sessions");
        assert_eq!(sessions.len(), 2);
        let first = sessions.keys().next().expect("first key");
        assert_eq!(first.to_string(), "2024-01-01");

        server.abort();
    }

    #[tokio::test]
    async fn server_error_maps_to_a_retryable_rejection() {
        let (base_url, _captured, server) =
            start_mock_server(vec![(500, r#"{"error":"internal"}"#.to_string())]).await;

        let client = PracticeSyncClient::new(&base_url, "token-1");
        let err = RemoteStoreTrait::get_profile(&client, &user())
            .await
            .expect_err("server error");
        assert_eq!(err, RemoteError::rejected(500, "internal"));
        assert!(err.is_retryable());

        server.abort();
    }

    #[tokio::test]
    async fn validation_failure_maps_to_invalid_payload() {
        let (base_url, _captured, server) =
            start_mock_server(vec![(400, r#"{"error":"malformed document"}"#.to_string())]).await;

        let client = PracticeSyncClient::new(&base_url, "token-1");
        let record = SessionRecord {
            completed: true,
            duration_minutes: 25,
            rounds_done: 4,
            session_type: "breathing".into(),
        };
        let err = RemoteStoreTrait::put_session(
            &client,
            &user(),
            "2024-01-01".parse().expect("date"),
            &record,
        )
        .await
        .expect_err("validation failure");
        assert_eq!(err, RemoteError::InvalidPayload("malformed document".into()));
        assert!(!err.is_retryable());

        server.abort();
    }
}
