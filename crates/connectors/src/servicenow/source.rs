use crate::servicenow::{
    adapter::ServiceNowAdapter, decode::decode_records, error::ServiceNowError,
    params::ConnectionProfile,
};
use model::{core::identifiers::TableName, records::batch::Batch};
use tracing::{debug, info};

/// Reads whole ServiceNow tables through the Table API.
#[derive(Debug, Clone)]
pub struct ServiceNowSource {
    adapter: ServiceNowAdapter,
}

impl ServiceNowSource {
    pub fn new(adapter: ServiceNowAdapter) -> Self {
        ServiceNowSource { adapter }
    }

    pub fn connect(profile: ConnectionProfile) -> Result<Self, ServiceNowError> {
        Ok(Self::new(ServiceNowAdapter::connect(profile)?))
    }

    pub fn adapter(&self) -> &ServiceNowAdapter {
        &self.adapter
    }

    /// Fetches every current row of `table`.
    ///
    /// ACLs can hide rows inside a window, so a short or even empty page does
    /// not mean the end of the table. The offset always advances by the
    /// requested limit and the read stops once it reaches `X-Total-Count`.
    /// Without that header an empty page ends the read.
    pub async fn fetch_all(&self, table: &TableName) -> Result<Batch, ServiceNowError> {
        let page_size = self.adapter.profile().page_size.max(1);
        let mut records = Vec::new();
        let mut total_count = None;
        let mut offset = 0;
        let mut pages = 0;

        loop {
            let page = self
                .adapter
                .fetch_page(table.as_str(), offset, page_size)
                .await?;
            pages += 1;
            total_count = page.total_count.or(total_count);

            let visible = page.records.len();
            if visible < page_size {
                debug!(
                    "Short page for {} at offset {}: {} of {} rows visible",
                    table, offset, visible, page_size
                );
            }
            records.extend(page.records);
            offset += page_size;

            let done = match total_count {
                Some(total) => offset >= total,
                None => visible == 0,
            };
            if done {
                break;
            }
        }

        info!(
            "Read {} records from {} ({} pages)",
            records.len(),
            table,
            pages
        );
        Ok(decode_records(table, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::servicenow::params::Auth;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_fetch_all_follows_pages() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/api/now/v2/table/incident")
            .match_query(Matcher::UrlEncoded("sysparm_offset".into(), "0".into()))
            .with_status(200)
            .with_header("X-Total-Count", "3")
            .with_body(r#"{"result":[{"sys_id":"a"},{"sys_id":"b"}]}"#)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/api/now/v2/table/incident")
            .match_query(Matcher::UrlEncoded("sysparm_offset".into(), "2".into()))
            .with_status(200)
            .with_header("X-Total-Count", "3")
            .with_body(r#"{"result":[{"sys_id":"c"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let profile = ConnectionProfile::new(
            "snow",
            &server.url(),
            Auth::Bearer {
                token: "tok".into(),
            },
        )
        .unwrap()
        .with_page_size(2);
        let source = ServiceNowSource::connect(profile).unwrap();

        let batch = source.fetch_all(&TableName::from("incident")).await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(batch.row_count(), 3);
        assert_eq!(batch.table.as_str(), "incident");
    }

    #[tokio::test]
    async fn test_empty_table_stops_after_one_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/now/v2/table/problem")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"result":[]}"#)
            .expect(1)
            .create_async()
            .await;

        let profile = ConnectionProfile::new(
            "snow",
            &server.url(),
            Auth::Bearer {
                token: "tok".into(),
            },
        )
        .unwrap();
        let source = ServiceNowSource::connect(profile).unwrap();

        let batch = source.fetch_all(&TableName::from("problem")).await.unwrap();
        mock.assert_async().await;
        assert!(batch.is_empty());
    }

    fn profile_for(server: &Server, page_size: usize) -> ConnectionProfile {
        ConnectionProfile::new(
            "snow",
            &server.url(),
            Auth::Bearer {
                token: "tok".into(),
            },
        )
        .unwrap()
        .with_page_size(page_size)
    }

    #[tokio::test]
    async fn test_short_page_inside_table_keeps_paging() {
        let mut server = Server::new_async().await;
        // One row of the first window is hidden by an ACL.
        let first = server
            .mock("GET", "/api/now/v2/table/incident")
            .match_query(Matcher::UrlEncoded("sysparm_offset".into(), "0".into()))
            .with_status(200)
            .with_header("X-Total-Count", "4")
            .with_body(r#"{"result":[{"sys_id":"a"}]}"#)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/api/now/v2/table/incident")
            .match_query(Matcher::UrlEncoded("sysparm_offset".into(), "2".into()))
            .with_status(200)
            .with_header("X-Total-Count", "4")
            .with_body(r#"{"result":[{"sys_id":"c"},{"sys_id":"d"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let source = ServiceNowSource::connect(profile_for(&server, 2)).unwrap();
        let batch = source.fetch_all(&TableName::from("incident")).await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(batch.row_count(), 3);
    }

    #[tokio::test]
    async fn test_without_total_count_reads_until_empty_page() {
        let mut server = Server::new_async().await;
        let pages = [
            ("0", r#"{"result":[{"sys_id":"a"},{"sys_id":"b"}]}"#),
            ("2", r#"{"result":[{"sys_id":"c"}]}"#),
            ("4", r#"{"result":[]}"#),
        ];
        let mut mocks = Vec::new();
        for (offset, body) in pages {
            mocks.push(
                server
                    .mock("GET", "/api/now/v2/table/sys_user")
                    .match_query(Matcher::UrlEncoded(
                        "sysparm_offset".into(),
                        offset.into(),
                    ))
                    .with_status(200)
                    .with_body(body)
                    .expect(1)
                    .create_async()
                    .await,
            );
        }

        let source = ServiceNowSource::connect(profile_for(&server, 2)).unwrap();
        let batch = source.fetch_all(&TableName::from("sys_user")).await.unwrap();

        for mock in mocks {
            mock.assert_async().await;
        }
        assert_eq!(batch.row_count(), 3);
    }

    #[tokio::test]
    async fn test_fully_hidden_window_does_not_end_read() {
        let mut server = Server::new_async().await;
        let pages = [
            ("0", r#"{"result":[{"sys_id":"a"},{"sys_id":"b"}]}"#),
            ("2", r#"{"result":[]}"#),
            ("4", r#"{"result":[{"sys_id":"e"}]}"#),
        ];
        let mut mocks = Vec::new();
        for (offset, body) in pages {
            mocks.push(
                server
                    .mock("GET", "/api/now/v2/table/change_request")
                    .match_query(Matcher::UrlEncoded(
                        "sysparm_offset".into(),
                        offset.into(),
                    ))
                    .with_status(200)
                    .with_header("X-Total-Count", "5")
                    .with_body(body)
                    .expect(1)
                    .create_async()
                    .await,
            );
        }

        let source = ServiceNowSource::connect(profile_for(&server, 2)).unwrap();
        let batch = source
            .fetch_all(&TableName::from("change_request"))
            .await
            .unwrap();

        for mock in mocks {
            mock.assert_async().await;
        }
        assert_eq!(batch.row_count(), 3);
    }
}
