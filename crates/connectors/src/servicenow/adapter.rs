use crate::servicenow::{
    error::ServiceNowError,
    params::{Auth, ConnectionProfile},
};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tracing::debug;

/// A raw Table API record: field name to JSON value.
pub type Record = Map<String, JsonValue>;

/// Header carrying the number of rows matching the query, before ACL filtering.
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// One window of a table read.
#[derive(Debug, Default)]
pub struct TablePage {
    pub records: Vec<Record>,
    /// Value of `X-Total-Count`, when the instance sent one.
    pub total_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TableResponse {
    #[serde(default)]
    result: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    detail: Option<String>,
}

/// HTTP client bound to one ServiceNow connection profile.
#[derive(Debug, Clone)]
pub struct ServiceNowAdapter {
    client: reqwest::Client,
    profile: Arc<ConnectionProfile>,
}

impl ServiceNowAdapter {
    pub fn connect(profile: ConnectionProfile) -> Result<Self, ServiceNowError> {
        let client = reqwest::Client::builder()
            .timeout(profile.request_timeout)
            .user_agent(concat!("snowsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceNowError::InvalidProfile(e.to_string()))?;

        Ok(ServiceNowAdapter {
            client,
            profile: Arc::new(profile),
        })
    }

    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    /// Reads one page of `table` starting at `offset`.
    pub async fn fetch_page(
        &self,
        table: &str,
        offset: usize,
        limit: usize,
    ) -> Result<TablePage, ServiceNowError> {
        let url = self.profile.table_url(table)?;

        let mut query = vec![
            ("sysparm_limit", limit.to_string()),
            ("sysparm_offset", offset.to_string()),
            ("sysparm_exclude_reference_link", "true".to_string()),
        ];
        if let Some(order_by) = &self.profile.order_by {
            query.push(("sysparm_query", format!("ORDERBY{order_by}")));
        }

        let request = self
            .client
            .get(url)
            .query(&query)
            .header(ACCEPT, "application/json");
        let request = match &self.profile.auth {
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
            Auth::Bearer { token } => request.bearer_auth(token),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(table, status.as_u16(), &body));
        }

        let total_count = response
            .headers()
            .get(TOTAL_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<usize>().ok());

        let body: TableResponse = response
            .json()
            .await
            .map_err(|e| ServiceNowError::Decode(e.to_string()))?;

        debug!(
            "Fetched {} records from {} at offset {} (total {:?})",
            body.result.len(),
            table,
            offset,
            total_count
        );
        Ok(TablePage {
            records: body.result,
            total_count,
        })
    }

    /// Requests a single row of `table` to check reachability and credentials.
    pub async fn ping(&self, table: &str) -> Result<(), ServiceNowError> {
        self.fetch_page(table, 0, 1).await.map(|_| ())
    }
}

fn error_for_status(table: &str, status: u16, body: &str) -> ServiceNowError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.error.message.or(r.error.detail))
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        401 | 403 => ServiceNowError::Auth { status, message },
        404 => ServiceNowError::NotFound(table.to_string()),
        400 if message.to_ascii_lowercase().contains("invalid table") => {
            ServiceNowError::NotFound(table.to_string())
        }
        _ => ServiceNowError::Http { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn adapter_for(server: &Server) -> ServiceNowAdapter {
        let profile = ConnectionProfile::new(
            "snow",
            &server.url(),
            Auth::Basic {
                username: "admin".into(),
                password: "secret".into(),
            },
        )
        .unwrap();
        ServiceNowAdapter::connect(profile).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_page_sends_paging_parameters() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/now/v2/table/incident")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("sysparm_limit".into(), "2".into()),
                Matcher::UrlEncoded("sysparm_offset".into(), "4".into()),
                Matcher::UrlEncoded("sysparm_query".into(), "ORDERBYsys_id".into()),
            ]))
            .match_header("authorization", Matcher::Regex("^Basic ".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("X-Total-Count", "17")
            .with_body(r#"{"result":[{"sys_id":"a"},{"sys_id":"b"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let page = adapter_for(&server)
            .fetch_page("incident", 4, 2)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[1]["sys_id"], "b");
        assert_eq!(page.total_count, Some(17));
    }

    #[tokio::test]
    async fn test_auth_failure_is_reported() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/now/v2/table/incident")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"error":{"message":"User Not Authenticated","detail":"Required to provide Auth information"},"status":"failure"}"#)
            .create_async()
            .await;

        let err = adapter_for(&server)
            .fetch_page("incident", 0, 10)
            .await
            .unwrap_err();

        match err {
            ServiceNowError::Auth { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "User Not Authenticated");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_table_maps_to_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/now/v2/table/u_missing")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"message":"Invalid table u_missing","detail":null},"status":"failure"}"#)
            .create_async()
            .await;

        let err = adapter_for(&server)
            .fetch_page("u_missing", 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceNowError::NotFound(t) if t == "u_missing"));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/now/v2/table/incident")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("Service Unavailable")
            .create_async()
            .await;

        let err = adapter_for(&server)
            .fetch_page("incident", 0, 10)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("Service Unavailable"));
    }

    #[tokio::test]
    async fn test_garbage_body_is_decode_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/now/v2/table/incident")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>login</html>")
            .create_async()
            .await;

        let err = adapter_for(&server)
            .fetch_page("incident", 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceNowError::Decode(_)));
    }
}
