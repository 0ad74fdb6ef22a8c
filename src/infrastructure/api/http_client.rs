use crate::application::ports::{ApiClient, AuthSession};
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// `reqwest`-backed remote API collaborator.
///
/// Every response is expected to carry the `{ "success": bool, "data": ... }`
/// envelope; the bearer token is fetched from the session before each call.
pub struct HttpApiClient {
    base_url: String,
    client: reqwest::Client,
    session: Arc<dyn AuthSession>,
}

impl HttpApiClient {
    pub fn new(base_url: impl Into<String>, session: Arc<dyn AuthSession>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            session,
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, AppError> {
        let token = self
            .session
            .bearer_token()
            .ok_or(AppError::Unauthenticated)?;

        let url = self.url_for(path);
        debug!(%method, %url, "Remote API call");

        let mut request = self.client.request(method, &url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;
        let status = response.status();

        if status.is_server_error() {
            return Err(AppError::Network(format!(
                "server error {status} for {url}"
            )));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| AppError::Network(format!("unreadable response from {url}: {e}")))?;

        if status.is_client_error() {
            return Err(remote_rejection(status, &envelope));
        }

        match envelope.get("success").and_then(Value::as_bool) {
            Some(true) => Ok(envelope.get("data").cloned().unwrap_or(Value::Null)),
            _ => Err(remote_rejection(status, &envelope)),
        }
    }
}

fn remote_rejection(status: StatusCode, envelope: &Value) -> AppError {
    let code = envelope
        .get("code")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| status.as_u16().to_string());
    let message = envelope
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("request rejected by server")
        .to_string();
    AppError::Remote { code, message }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn get(&self, path: &str) -> Result<Value, AppError> {
        self.request(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, AppError> {
        self.request(Method::POST, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, AppError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<Value, AppError> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<Value, AppError> {
        self.request(Method::DELETE, path, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::SessionUser;

    struct NoTokenSession;

    impl AuthSession for NoTokenSession {
        fn current_user(&self) -> Option<SessionUser> {
            None
        }

        fn bearer_token(&self) -> Option<String> {
            None
        }
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_any_request() {
        let client = HttpApiClient::new("http://localhost:9", Arc::new(NoTokenSession));
        let err = client.get("/actors").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
    }

    #[test]
    fn test_url_join_trims_trailing_slash() {
        struct Dummy;
        impl AuthSession for Dummy {
            fn current_user(&self) -> Option<SessionUser> {
                None
            }
            fn bearer_token(&self) -> Option<String> {
                None
            }
        }
        let client = HttpApiClient::new("https://api.example.org/", Arc::new(Dummy));
        assert_eq!(
            client.url_for("/actors/sync/all"),
            "https://api.example.org/actors/sync/all"
        );
    }
}
