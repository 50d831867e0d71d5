use crate::{env::EnvManager, error::ConfigError, settings::SyncSettings};
use connectors::servicenow::params::{Auth, ConnectionProfile};
use tracing::debug;

/// Environment key for `field` of connection `name`, e.g.
/// `SNOWSYNC_CONN_SNOW_PROD_URL` for `("snow-prod", "URL")`.
pub fn env_key(name: &str, field: &str) -> String {
    let normalized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("SNOWSYNC_CONN_{normalized}_{field}")
}

/// Turns the opaque connection name into a typed ServiceNow profile.
///
/// A bearer token wins over basic credentials when both are present.
/// `api_version` and `page_size` from the settings override the
/// connection's own values.
pub fn resolve_connection(
    name: &str,
    env: &EnvManager,
    settings: &SyncSettings,
) -> Result<ConnectionProfile, ConfigError> {
    let fail = |reason: String| ConfigError::Connection {
        name: name.to_string(),
        reason,
    };

    let url_key = env_key(name, "URL");
    let url = env
        .get_non_empty(&url_key)
        .ok_or_else(|| fail(format!("{url_key} is not set")))?;

    let auth = match env.get_non_empty(&env_key(name, "TOKEN")) {
        Some(token) => Auth::Bearer { token },
        None => {
            let user_key = env_key(name, "USERNAME");
            let pass_key = env_key(name, "PASSWORD");
            match (env.get_non_empty(&user_key), env.get(&pass_key)) {
                (Some(username), Some(password)) => Auth::Basic {
                    username,
                    password: password.to_string(),
                },
                _ => {
                    return Err(fail(format!(
                        "no credentials: set {} or {user_key} and {pass_key}",
                        env_key(name, "TOKEN")
                    )));
                }
            }
        }
    };

    let mut profile =
        ConnectionProfile::new(name, &url, auth).map_err(|e| fail(e.to_string()))?;

    let api_version = settings
        .api_version
        .clone()
        .or_else(|| env.get_non_empty(&env_key(name, "API_VERSION")));
    if let Some(version) = api_version {
        profile = profile.with_api_version(version);
    }

    let page_size = match settings.page_size {
        Some(size) => Some(size),
        None => env
            .get_non_empty(&env_key(name, "PAGE_SIZE"))
            .map(|v| {
                v.parse::<usize>()
                    .map_err(|_| fail(format!("page size {v:?} is not a number")))
            })
            .transpose()?,
    };
    if let Some(size) = page_size {
        profile = profile.with_page_size(size);
    }

    debug!(
        "Resolved connection {} to {} (api {}, page size {})",
        name, profile.instance_url, profile.api_version, profile.page_size
    );
    Ok(profile)
}
