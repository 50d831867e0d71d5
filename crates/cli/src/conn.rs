use crate::error::CliError;
use async_trait::async_trait;
use connectors::servicenow::{adapter::ServiceNowAdapter, params::ConnectionProfile};
use tracing::{error, info};

/// Trait for "pinging" a data source
#[async_trait]
pub trait ConnectionPinger {
    /// Attempts to ping; returns Err if unreachable
    async fn ping(&self) -> Result<(), CliError>;
}

/// Reads one row of `table` with the profile's credentials.
pub struct ServiceNowPinger {
    pub profile: ConnectionProfile,
    pub table: String,
}

#[async_trait]
impl ConnectionPinger for ServiceNowPinger {
    async fn ping(&self) -> Result<(), CliError> {
        let url = self.profile.instance_url.as_str();
        info!(
            "Pinging ServiceNow at '{}' (api {}, table {})",
            url, self.profile.api_version, self.table
        );

        let adapter = ServiceNowAdapter::connect(self.profile.clone())?;
        adapter.ping(&self.table).await.map_err(|e| {
            error!("ServiceNow ping to '{}' failed: {}", url, e);
            CliError::ServiceNow(e)
        })?;

        info!("ServiceNow ping to '{}' succeeded", url);
        Ok(())
    }
}
