// Subscription (system discovery) endpoints

use tracing::debug;

use crate::error::Error;
use crate::rest::client::ApiClient;
use crate::rest::models::{Subscription, SubscriptionsResponse};

impl ApiClient {
    /// List the account's active subscriptions.
    ///
    /// `GET users/{uid}/subscriptions?activeOnly=true`
    pub async fn get_subscriptions(&self) -> Result<Vec<Subscription>, Error> {
        let user_id = self.user_id()?;
        debug!(user_id, "listing subscriptions");
        let resp: SubscriptionsResponse = self
            .get(
                &format!("users/{user_id}/subscriptions"),
                &[("activeOnly", "true".to_owned())],
            )
            .await?;
        Ok(resp.subscriptions)
    }

    /// Fetch a single subscription by system id.
    ///
    /// The backend has no per-subscription endpoint, so this filters the
    /// account listing. Returns `None` when the id is not on the account.
    pub async fn get_subscription(&self, system_id: u64) -> Result<Option<Subscription>, Error> {
        let subscriptions = self.get_subscriptions().await?;
        Ok(subscriptions.into_iter().find(|s| s.sid == system_id))
    }
}
