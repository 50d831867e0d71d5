use crate::error::SinkError;
use async_trait::async_trait;
use connectors::lakehouse::sink::LakehouseSink;
use model::{core::identifiers::TableIdent, records::batch::Batch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub destination: TableIdent,
    pub rows_written: usize,
    /// The destination table did not exist before this publish.
    pub created: bool,
    pub version: u64,
}

/// Writes a batch into a destination table with upsert semantics.
#[async_trait]
pub trait TableSink: Send + Sync {
    fn name(&self) -> &str;

    async fn table_exists(&self, ident: &TableIdent) -> Result<bool, SinkError>;

    /// Creates `ident` from the batch when it does not exist, otherwise
    /// merges the batch into it.
    async fn publish(&self, ident: &TableIdent, batch: &Batch) -> Result<PublishResult, SinkError>;
}

#[async_trait]
impl TableSink for LakehouseSink {
    fn name(&self) -> &str {
        "lakehouse"
    }

    async fn table_exists(&self, ident: &TableIdent) -> Result<bool, SinkError> {
        Ok(LakehouseSink::table_exists(self, ident).await?)
    }

    async fn publish(&self, ident: &TableIdent, batch: &Batch) -> Result<PublishResult, SinkError> {
        let report = self.upsert(ident, batch).await?;
        Ok(PublishResult {
            destination: report.ident,
            rows_written: report.rows_written,
            created: report.created,
            version: report.version,
        })
    }
}
