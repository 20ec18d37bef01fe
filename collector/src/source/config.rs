use chrono::Duration;

pub const TOKEN_PATH: &str = "/ws/oauth/token";
pub const ACTIVITIES_PATH: &str = "/v2/activities";
pub const SCOPE: &str = "monitoring";

/// Maximum activities requested per cycle. Only the first page is read.
pub const PAGE_SIZE: u32 = 1000;

/// How far back a cold-start cycle looks.
pub fn cold_start_lookback() -> Duration {
    Duration::hours(24)
}
