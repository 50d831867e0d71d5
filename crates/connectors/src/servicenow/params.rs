use crate::servicenow::error::ServiceNowError;
use std::{fmt, time::Duration};
use url::Url;

pub const DEFAULT_API_VERSION: &str = "v2";
pub const DEFAULT_PAGE_SIZE: usize = 1000;
/// Upper bound the Table API accepts for `sysparm_limit`.
pub const MAX_PAGE_SIZE: usize = 10_000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_ORDER_BY: &str = "sys_id";

#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Auth::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
        }
    }
}

/// Everything needed to read tables from one ServiceNow instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub name: String,
    pub instance_url: Url,
    pub auth: Auth,
    pub api_version: String,
    pub page_size: usize,
    pub request_timeout: Duration,
    /// Field used to keep paging stable while the table is being read.
    pub order_by: Option<String>,
}

impl ConnectionProfile {
    pub fn new(name: &str, instance_url: &str, auth: Auth) -> Result<Self, ServiceNowError> {
        let mut url = Url::parse(instance_url).map_err(|e| {
            ServiceNowError::InvalidProfile(format!("instance URL {instance_url:?}: {e}"))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ServiceNowError::InvalidProfile(format!(
                "instance URL must be http(s), got {}",
                url.scheme()
            )));
        }

        // Relative joins drop the last path segment unless it ends in '/'
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(ConnectionProfile {
            name: name.to_string(),
            instance_url: url,
            auth,
            api_version: DEFAULT_API_VERSION.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            order_by: Some(DEFAULT_ORDER_BY.to_string()),
        })
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_order_by(mut self, order_by: Option<String>) -> Self {
        self.order_by = order_by;
        self
    }

    /// Table API endpoint for `table`, e.g. `https://x.service-now.com/api/now/v2/table/incident`.
    pub fn table_url(&self, table: &str) -> Result<Url, ServiceNowError> {
        if table.is_empty()
            || !table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ServiceNowError::InvalidTable(table.to_string()));
        }

        let path = match self.api_version.as_str() {
            "" => format!("api/now/table/{table}"),
            version => format!("api/now/{version}/table/{table}"),
        };

        self.instance_url
            .join(&path)
            .map_err(|e| ServiceNowError::InvalidProfile(e.to_string()))
    }
}
