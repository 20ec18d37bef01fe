pub mod api;
pub mod auth;
pub mod config;

use crate::error::CycleError;
use activity_relay::Activity;
use async_trait::async_trait;

pub use self::api::ActivityClient;
pub use self::auth::{AccessToken, TokenClient};

/// Which window a fetch covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMode {
    /// Everything created in the last 24 hours
    ColdStart,
    /// Everything newer than the cursor, or unfiltered without one
    Incremental(Option<i64>),
}

/// Credential provider: obtains a bearer token for one cycle.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Performs a fresh exchange. Tokens are never reused across cycles.
    ///
    /// # Returns
    /// * `Ok(AccessToken)` - Bearer token from a 2xx response
    /// * `Err(CycleError::Auth)` - Non-2xx, transport or decoding failure
    async fn fetch_token(&self) -> Result<AccessToken, CycleError>;
}

/// Activity fetcher: one page of activities per call.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Fetches the activities selected by `mode`, sorted ascending by `id`.
    ///
    /// # Returns
    /// * `Ok(Vec<Activity>)` - Possibly empty, ascending by `id`
    /// * `Err(CycleError::Fetch)` - Non-2xx, transport or decoding failure
    async fn fetch(
        &self,
        token: &AccessToken,
        mode: FetchMode,
    ) -> Result<Vec<Activity>, CycleError>;
}
