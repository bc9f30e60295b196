pub mod auth;
pub mod catalog;
pub mod chat;
pub mod commerce;
pub mod learning;
pub mod models;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            token: None,
        }
    }
}

/// Thin client over the platform's REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    config: ApiConfig,
}

/// Most endpoints answer `{"success": true, "data": ...}`; a few return the
/// payload bare.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(data) => data,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: String,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            http: self.http.clone(),
            config: ApiConfig {
                base_url: self.config.base_url.clone(),
                token: Some(token.into()),
            },
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, self.url(path))
            .header("Accept", "application/json");
        if let Some(token) = self.config.token.as_deref().filter(|t| !t.is_empty()) {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req
    }

    async fn check(resp: Response) -> Result<Response, ApiError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        Err(ApiError::Api {
            status,
            message: error_message(&text),
        })
    }

    pub(crate) async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let resp = Self::check(req.send().await?).await?;
        let bytes = resp.bytes().await?;
        decode(&bytes)
    }

    pub(crate) async fn send_empty(&self, req: RequestBuilder) -> Result<(), ApiError> {
        Self::check(req.send().await?).await?;
        Ok(())
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!(path, "GET");
        self.send(self.request(Method::GET, path)).await
    }

    pub(crate) async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(path, "POST");
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        debug!(path, "DELETE");
        self.send_empty(self.request(Method::DELETE, path)).await
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice::<Envelope<T>>(bytes)
        .map(Envelope::into_inner)
        .map_err(|e| ApiError::Parse(e.to_string()))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Api { status: 401, .. })
    }
}

impl Serialize for ApiError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Course;

    #[test]
    fn test_url_join() {
        let client = ApiClient::new(ApiConfig {
            base_url: "https://learn.example/api/".into(),
            token: None,
        });
        assert_eq!(client.url("/courses"), "https://learn.example/api/courses");
        assert_eq!(client.url("courses/1"), "https://learn.example/api/courses/1");
    }

    #[test]
    fn test_decode_wrapped_and_bare() {
        let wrapped = br#"{"success": true, "data": [{"_id": "c1", "title": "Rust", "price": 19.99}]}"#;
        let courses: Vec<Course> = decode(wrapped).unwrap();
        assert_eq!(courses[0].id, "c1");

        let bare = br#"{"id": "c2", "title": "Go", "price": 0}"#;
        let course: Course = decode(bare).unwrap();
        assert_eq!(course.title, "Go");

        assert!(matches!(decode::<Course>(b"[1,2]"), Err(ApiError::Parse(_))));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"message": "Course not found"}"#), "Course not found");
        assert_eq!(error_message(r#"{"error": "Unauthorized"}"#), "Unauthorized");
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn test_error_serializes_as_string() {
        let err = ApiError::Api {
            status: 401,
            message: "expired".into(),
        };
        assert!(err.is_unauthorized());
        assert_eq!(
            serde_json::to_string(&err).unwrap(),
            r#""API error: 401 - expired""#
        );
    }
}
