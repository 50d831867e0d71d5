use crate::error::SourceError;
use async_trait::async_trait;
use connectors::servicenow::source::ServiceNowSource;
use model::{core::identifiers::TableName, records::batch::Batch};

/// Reads the full current contents of a named table.
#[async_trait]
pub trait TableSource: Send + Sync {
    fn name(&self) -> &str;

    /// Returns every current row of `table`. An existing but empty table
    /// yields an empty batch, not an error.
    async fn fetch_table(&self, table: &TableName) -> Result<Batch, SourceError>;
}

#[async_trait]
impl TableSource for ServiceNowSource {
    fn name(&self) -> &str {
        "servicenow"
    }

    async fn fetch_table(&self, table: &TableName) -> Result<Batch, SourceError> {
        Ok(self.fetch_all(table).await?)
    }
}
