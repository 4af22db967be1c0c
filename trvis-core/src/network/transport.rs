//! HTTP transport used by the network repository.
//!
//! The repository only needs "send this request, give me status and body";
//! keeping that behind [`Transport`] lets retry and queueing be exercised
//! without a server.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::repository::{RepositoryError, RepositoryResult};

/// A JSON request relative to the backend's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            path: path.into(),
            body: None,
        }
    }
}

/// Status code and raw body text of a completed exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> RepositoryResult<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            RepositoryError::Serialization(format!("unexpected response body: {}", e))
        })
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one exchange. Only failures to complete the exchange are
    /// errors; any HTTP status, including 5xx, is a response.
    async fn send(&self, request: &ApiRequest) -> RepositoryResult<ApiResponse>;
}

/// [`Transport`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds an absolute URL for a path, defaulting to `http://` when the
    /// base URL carries no scheme.
    fn build_url(&self, path: &str) -> String {
        let base_url = if self.base_url.starts_with("http://")
            || self.base_url.starts_with("https://")
        {
            self.base_url.clone()
        } else {
            format!("http://{}", self.base_url)
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> RepositoryResult<ApiResponse> {
        let url = self.build_url(&request.path);
        let mut builder = self.client.request(request.method.clone(), &url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RepositoryError::Network(format!("{} {}: {}", request.method, url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RepositoryError::Network(format!("failed to read response: {}", e)))?;

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        let transport = HttpTransport::new("http://localhost:8080");
        assert_eq!(
            transport.build_url("/api/projects"),
            "http://localhost:8080/api/projects"
        );

        let transport = HttpTransport::new("https://api.example.com/");
        assert_eq!(transport.build_url("/health"), "https://api.example.com/health");

        let transport = HttpTransport::new("localhost:3000");
        assert_eq!(transport.build_url("/health"), "http://localhost:3000/health");
    }

    #[test]
    fn test_response_success_range() {
        assert!(ApiResponse::new(200, "").is_success());
        assert!(ApiResponse::new(204, "").is_success());
        assert!(!ApiResponse::new(301, "").is_success());
        assert!(!ApiResponse::new(500, "").is_success());
    }

    #[test]
    fn test_response_json_error_is_serialization() {
        let response = ApiResponse::new(200, "<html>");
        let err = response.json::<Value>().unwrap_err();
        assert!(matches!(err, RepositoryError::Serialization(_)));
    }
}
