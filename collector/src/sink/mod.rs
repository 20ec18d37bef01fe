//! Downstream webhook delivery.
//!
//! One POST per activity, no retry. Failures come back as [`ForwardError`]
//! for the collector to log; they never stop a cycle.

pub mod transform;

use crate::error::ForwardError;
use activity_relay::Activity;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info};

pub use self::transform::{select_transform, Identity, Transform};

/// Delivers single activities to the downstream sink.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn forward(&self, activity: &Activity) -> Result<(), ForwardError>;
}

/// Posts activities to the security-event webhook.
pub struct Forwarder {
    http_client: Client,
    webhook_url: String,
    transform: Arc<dyn Transform>,
    /// Log the payload instead of posting it
    test_mode: bool,
}

impl Forwarder {
    pub fn new(
        http_client: Client,
        webhook_url: String,
        transform: Arc<dyn Transform>,
        test_mode: bool,
    ) -> Self {
        Self {
            http_client,
            webhook_url,
            transform,
            test_mode,
        }
    }
}

#[async_trait]
impl ActivitySink for Forwarder {
    async fn forward(&self, activity: &Activity) -> Result<(), ForwardError> {
        let payload = self
            .transform
            .apply(activity)
            .map_err(|e| ForwardError::Encode {
                activity_id: activity.id,
                reason: format!("{:#}", e),
            })?;

        if self.test_mode {
            let pretty =
                serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
            info!(
                activity_id = activity.id,
                payload = %pretty,
                "[TEST_MODE] Would post activity to webhook"
            );
            return Ok(());
        }

        let response = self
            .http_client
            .post(&self.webhook_url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|source| ForwardError::Transport {
                activity_id: activity.id,
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(ForwardError::Rejected {
                activity_id: activity.id,
                status: status.as_u16(),
                body,
            });
        }

        debug!(activity_id = activity.id, "Activity delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn activity() -> Activity {
        serde_json::from_value(json!({
            "id": 101,
            "severity": "MAJOR",
            "message": "Disk space low",
            "data": {"drive": "C:"}
        }))
        .unwrap()
    }

    fn make_forwarder(url: String, test_mode: bool) -> Forwarder {
        Forwarder::new(Client::new(), url, Arc::new(Identity), test_mode)
    }

    #[tokio::test]
    async fn test_forward_posts_activity_json() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "id": 101,
                "severity": "MAJOR",
                "message": "Disk space low",
                "data": {"drive": "C:"}
            })))
            .with_status(202)
            .create_async()
            .await;

        let forwarder = make_forwarder(format!("{}/hook", server.url()), false);
        forwarder.forward(&activity()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forward_keeps_nulls_and_odd_types() {
        let raw = json!({
            "id": 104,
            "userId": "system",
            "severity": null,
            "activityTime": "1707668400"
        });
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(Matcher::Json(raw.clone()))
            .with_status(200)
            .create_async()
            .await;

        let forwarder = make_forwarder(format!("{}/hook", server.url()), false);
        let activity: Activity = serde_json::from_value(raw).unwrap();
        forwarder.forward(&activity).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forward_rejected() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(503)
            .with_body("busy")
            .create_async()
            .await;

        let forwarder = make_forwarder(format!("{}/hook", server.url()), false);
        let err = forwarder.forward(&activity()).await.unwrap_err();
        match err {
            ForwardError::Rejected {
                activity_id,
                status,
                body,
            } => {
                assert_eq!(activity_id, 101);
                assert_eq!(status, 503);
                assert_eq!(body, "busy");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_forward_unreachable() {
        let forwarder = make_forwarder("http://127.0.0.1:9/hook".to_string(), false);
        let err = forwarder.forward(&activity()).await.unwrap_err();
        assert!(matches!(err, ForwardError::Transport { activity_id: 101, .. }));
    }

    #[tokio::test]
    async fn test_test_mode_does_not_post() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .expect(0)
            .create_async()
            .await;

        let forwarder = make_forwarder(format!("{}/hook", server.url()), true);
        forwarder.forward(&activity()).await.unwrap();

        mock.assert_async().await;
    }

    struct FailingTransform;

    impl Transform for FailingTransform {
        fn apply(&self, _: &Activity) -> anyhow::Result<serde_json::Value> {
            anyhow::bail!("unsupported activity type")
        }
    }

    #[tokio::test]
    async fn test_transform_failure_is_encode_error() {
        let forwarder = Forwarder::new(
            Client::new(),
            "http://127.0.0.1:9/hook".to_string(),
            Arc::new(FailingTransform),
            false,
        );
        let err = forwarder.forward(&activity()).await.unwrap_err();
        assert!(matches!(err, ForwardError::Encode { activity_id: 101, .. }));
    }
}
