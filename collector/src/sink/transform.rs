use activity_relay::Activity;
use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;

/// Turns an activity into the payload posted to the sink.
pub trait Transform: Send + Sync {
    fn apply(&self, activity: &Activity) -> Result<Value>;
}

/// Posts the activity exactly as the source returned it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl Transform for Identity {
    fn apply(&self, activity: &Activity) -> Result<Value> {
        serde_json::to_value(activity).context("Failed to serialize activity")
    }
}

/// Picks the transform for the configured flag.
///
/// Only the identity transform exists; enabling schema transformation is
/// accepted but has no effect yet.
pub fn select_transform(transform_enabled: bool) -> Arc<dyn Transform> {
    if transform_enabled {
        tracing::warn!(
            "Schema transform requested but none is available, forwarding activities unchanged"
        );
    }
    Arc::new(Identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_is_passthrough() {
        let raw = json!({
            "id": 42,
            "severity": "MAJOR",
            "statusCode": "TRIGGERED",
            "customField": {"nested": [1, 2, 3]},
            "priority": null,
            "userId": "system"
        });
        let activity: Activity = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(Identity.apply(&activity).unwrap(), raw);
    }

    #[test]
    fn test_select_transform_always_identity() {
        let activity: Activity = serde_json::from_value(json!({"id": 1})).unwrap();
        for enabled in [false, true] {
            let transform = select_transform(enabled);
            assert_eq!(transform.apply(&activity).unwrap(), json!({"id": 1}));
        }
    }
}
