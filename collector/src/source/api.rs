use activity_relay::activity::{Activity, ActivityPage};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;

use super::auth::AccessToken;
use super::config::{cold_start_lookback, ACTIVITIES_PATH, PAGE_SIZE};
use super::{ActivitySource, FetchMode};
use crate::error::CycleError;

/// HTTP client for the source platform's activity listing.
///
/// Issues exactly one request per call and reads only the first page; any
/// activities beyond `PAGE_SIZE` in the window are not fetched.
pub struct ActivityClient {
    http_client: Client,
    base_url: String,
}

impl ActivityClient {
    pub fn new(http_client: Client, base_url: String) -> Self {
        Self {
            http_client,
            base_url,
        }
    }
}

/// Query parameters for a fetch in `mode`, evaluated at `now`.
///
/// - cold start: `after=<now - 24h>` as ISO 8601 with milliseconds
/// - incremental with a cursor: `newerThan=<cursor>`
/// - incremental without a cursor: no filter
pub fn query_params(mode: FetchMode, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
    let mut params = vec![("pageSize", PAGE_SIZE.to_string())];
    match mode {
        FetchMode::ColdStart => {
            let after = now - cold_start_lookback();
            params.push(("after", after.to_rfc3339_opts(SecondsFormat::Millis, true)));
        }
        FetchMode::Incremental(Some(cursor)) => {
            params.push(("newerThan", cursor.to_string()));
        }
        FetchMode::Incremental(None) => {}
    }
    params
}

#[async_trait]
impl ActivitySource for ActivityClient {
    async fn fetch(
        &self,
        token: &AccessToken,
        mode: FetchMode,
    ) -> Result<Vec<Activity>, CycleError> {
        let url = format!("{}{}", self.base_url, ACTIVITIES_PATH);
        let params = query_params(mode, Utc::now());

        tracing::info!(url = %url, query = ?params, "Fetching activities");

        let response = self
            .http_client
            .get(&url)
            .query(&params)
            .bearer_auth(token.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| CycleError::Fetch {
                status: None,
                message: format!("Failed to send activities request: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(CycleError::Fetch {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let page: ActivityPage = response.json().await.map_err(|e| CycleError::Fetch {
            status: Some(status.as_u16()),
            message: format!("Failed to parse activities response: {}", e),
        })?;

        tracing::info!(
            count = page.activities.len(),
            source_last_activity_id = ?page.last_activity_id,
            "Fetched activities"
        );

        Ok(page.into_sorted())
    }
}
