use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

#[cfg(test)]
mod tests;

/// One record from the source platform's activity log.
///
/// Activities are immutable once fetched and identified by `id`, which the
/// source assigns in increasing order across the whole stream. The relay
/// reads nothing but the id; every other field is kept exactly as received
/// (including explicit `null`s) so forwarding stays a passthrough.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Source-assigned identifier, monotonically increasing
    pub id: i64,

    /// Everything else the source sent, untouched
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// One page of the source's activity listing.
///
/// Records are held raw and decoded one by one in
/// [`ActivityPage::into_sorted`], so a single malformed record cannot fail
/// the whole page.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPage {
    /// Highest activity id known to the source at query time
    #[serde(default)]
    pub last_activity_id: Option<Value>,

    #[serde(default)]
    pub activities: Vec<Value>,
}

impl ActivityPage {
    /// Consumes the page and returns its activities sorted ascending by `id`.
    ///
    /// Records without an integer `id` are logged and skipped. The source
    /// normally returns ascending order already; the sort is stable, so
    /// duplicate ids keep their relative order.
    pub fn into_sorted(self) -> Vec<Activity> {
        let mut activities: Vec<Activity> = self
            .activities
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Activity>(raw.clone()) {
                Ok(activity) => Some(activity),
                Err(e) => {
                    warn!(error = %e, record = %raw, "Skipping activity without a usable id");
                    None
                }
            })
            .collect();
        activities.sort_by_key(|a| a.id);
        activities
    }
}

/// Highest id in a batch, or `None` for an empty batch.
pub fn max_id(activities: &[Activity]) -> Option<i64> {
    activities.iter().map(|a| a.id).max()
}
