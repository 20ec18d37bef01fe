//! Client-credentials token exchange.

use super::config::{SCOPE, TOKEN_PATH};
use super::TokenProvider;
use crate::error::CycleError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;

/// Short-lived bearer token, fetched fresh for every cycle.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Token response from the source's OAuth endpoint.
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Exchanges the service's client id/secret for a bearer token.
///
/// No retry and no caching: a failed exchange surfaces as
/// [`CycleError::Auth`] and the cycle is retried on the next wake.
pub struct TokenClient {
    http_client: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl TokenClient {
    pub fn new(
        http_client: Client,
        base_url: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            http_client,
            base_url,
            client_id,
            client_secret,
        }
    }
}

#[async_trait]
impl TokenProvider for TokenClient {
    async fn fetch_token(&self) -> Result<AccessToken, CycleError> {
        let url = format!("{}{}", self.base_url, TOKEN_PATH);
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", SCOPE),
        ];

        tracing::debug!(url = %url, "Requesting access token");

        let response = self
            .http_client
            .post(&url)
            .header("Accept", "application/json")
            .form(&form[..])
            .send()
            .await
            .map_err(|e| CycleError::Auth {
                status: None,
                message: format!("Failed to send token request: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(CycleError::Auth {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let status = response.status();
        let token_response: TokenResponse =
            response.json().await.map_err(|e| CycleError::Auth {
                status: Some(status.as_u16()),
                message: format!("Failed to parse token response: {}", e),
            })?;

        tracing::debug!(
            token_type = ?token_response.token_type,
            expires_in = ?token_response.expires_in,
            "Access token obtained"
        );

        Ok(AccessToken::new(token_response.access_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn make_client(base_url: String) -> TokenClient {
        TokenClient::new(
            Client::new(),
            base_url,
            "relay-client".to_string(),
            "relay-secret".to_string(),
        )
    }

    #[tokio::test]
    async fn test_fetch_token_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/ws/oauth/token")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_header("accept", "application/json")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "relay-client".into()),
                Matcher::UrlEncoded("client_secret".into(), "relay-secret".into()),
                Matcher::UrlEncoded("scope".into(), "monitoring".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok-123","token_type":"Bearer","expires_in":3600}"#)
            .create_async()
            .await;

        let token = make_client(server.url()).fetch_token().await.unwrap();
        assert_eq!(token.as_str(), "tok-123");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_token_http_failure() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/ws/oauth/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .create_async()
            .await;

        let err = make_client(server.url()).fetch_token().await.unwrap_err();
        match err {
            CycleError::Auth { status, message } => {
                assert_eq!(status, Some(401));
                assert!(message.contains("invalid_client"));
            }
            other => panic!("expected auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_token_malformed_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/ws/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let err = make_client(server.url()).fetch_token().await.unwrap_err();
        assert!(matches!(err, CycleError::Auth { status: Some(200), .. }));
    }

    #[tokio::test]
    async fn test_fetch_token_unreachable() {
        // Nothing listens on port 9
        let err = make_client("http://127.0.0.1:9".to_string())
            .fetch_token()
            .await
            .unwrap_err();
        assert!(matches!(err, CycleError::Auth { status: None, .. }));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AccessToken::new("secret-token");
        assert!(!format!("{:?}", token).contains("secret-token"));
    }
}
