// Event history endpoint

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::Error;
use crate::rest::client::ApiClient;
use crate::rest::models::EventsResponse;

impl ApiClient {
    /// Fetch recent events for a system.
    ///
    /// `GET subscriptions/{sid}/events?numEvents={limit}[&fromTimestamp={ts}]`
    pub async fn get_events(
        &self,
        system_id: u64,
        from: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<EventsResponse, Error> {
        debug!(system_id, ?from, limit, "fetching events");
        let mut query = vec![("numEvents", limit.to_string())];
        if let Some(from) = from {
            query.push(("fromTimestamp", from.timestamp().to_string()));
        }
        self.get(&format!("subscriptions/{system_id}/events"), &query)
            .await
    }
}
