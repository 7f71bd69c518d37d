//! Wire operations with the vendor REST API.
//!
//! A thin GET/POST/PATCH wrapper around reqwest. Every call is JSON in, JSON
//! out, authorised with a bearer token, and bounded by the configured
//! timeout. Non-2xx responses become [`ApiError::Status`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::Config;

/// Error raised when interacting with the API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("API returned {status}: {error_type}")]
    Status {
        status: u16,
        error_type: String,
        body: Value,
    },
    #[error("API request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid API url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("no API access token configured")]
    MissingToken,
}

/// Operations the mirror needs from the vendor.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn get(&self, href: &str) -> Result<Value, ApiError>;
    async fn post(&self, href: &str, data: &Value) -> Result<Value, ApiError>;
    async fn patch(&self, href: &str, data: &Value) -> Result<Value, ApiError>;
}

/// HTTP implementation of [`RemoteApi`].
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    root: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(api_root: &str, token: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            root: Url::parse(api_root)?,
            token,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(
            &config.api_root,
            config.access_token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Absolute URL for a path relative to the API root.
    pub fn url(&self, href: &str) -> Result<Url, ApiError> {
        Ok(self.root.join(href)?)
    }

    async fn send(&self, method: Method, href: &str, data: Option<&Value>) -> Result<Value, ApiError> {
        let token = self.token.as_deref().ok_or(ApiError::MissingToken)?;
        let url = self.url(href)?;

        debug!(method = %method, url = %url, "api_request");

        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(data) = data {
            request = request.json(data);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            let error_type = error_type(&body);
            debug!(status = status.as_u16(), body = %body, "api_error");
            return Err(ApiError::Status {
                status: status.as_u16(),
                error_type,
                body,
            });
        }

        let body = response.json::<Value>().await?;
        debug!(status = status.as_u16(), "api_response");
        Ok(body)
    }
}

#[async_trait]
impl RemoteApi for ApiClient {
    async fn get(&self, href: &str) -> Result<Value, ApiError> {
        self.send(Method::GET, href, None).await
    }

    async fn post(&self, href: &str, data: &Value) -> Result<Value, ApiError> {
        self.send(Method::POST, href, Some(data)).await
    }

    async fn patch(&self, href: &str, data: &Value) -> Result<Value, ApiError> {
        self.send(Method::PATCH, href, Some(data)).await
    }
}

/// Pull the vendor error name out of an error body.
///
/// The vendor sends either `{"error": "name"}` or
/// `{"error": {"type": "name", "message": ...}}`.
fn error_type(body: &Value) -> String {
    match body.get("error") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => map
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_joins_relative_to_root() {
        let client =
            ApiClient::new("https://id.amiqus.co/api/v2/", None, Duration::from_secs(30)).unwrap();
        assert_eq!(
            client.url("records/789012").unwrap().as_str(),
            "https://id.amiqus.co/api/v2/records/789012"
        );
        assert_eq!(
            client.url("records/1/steps/2/reviews").unwrap().as_str(),
            "https://id.amiqus.co/api/v2/records/1/steps/2/reviews"
        );
    }

    #[test]
    fn test_invalid_root() {
        assert!(matches!(
            ApiClient::new("not a url", None, Duration::from_secs(1)),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_network() {
        let client =
            ApiClient::new("http://127.0.0.1:9/", None, Duration::from_secs(1)).unwrap();
        assert!(matches!(client.get("clients/1").await, Err(ApiError::MissingToken)));
    }

    #[test]
    fn test_error_type() {
        assert_eq!(error_type(&json!({"error": "not_found"})), "not_found");
        assert_eq!(
            error_type(&json!({"error": {"type": "authorization_error", "message": "no"}})),
            "authorization_error"
        );
        assert_eq!(error_type(&json!(null)), "unknown");
    }
}
