use crate::lakehouse::{
    config::{CatalogConfig, StorageLocation},
    error::LakehouseError,
    metadata::{DataFile, TableMetadata},
};
use bytes::Bytes;
use model::core::identifiers::TableIdent;
use object_store::{
    ObjectStore, PutMode, PutPayload,
    aws::{AmazonS3Builder, S3ConditionalPut},
    local::LocalFileSystem,
    memory::InMemory,
    path::Path,
    prefix::PrefixStore,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const METADATA_DIR: &str = "metadata";
const DATA_DIR: &str = "data";
const VERSION_HINT: &str = "version-hint.text";

/// A table's metadata together with the version it was read from.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub version: u64,
    pub metadata: TableMetadata,
}

/// Maps table identifiers to locations under the warehouse and owns the
/// metadata commit protocol.
///
/// Table `db.tbl` lives at `{warehouse}/db.db/tbl/`. Every commit writes a
/// new `metadata/v{N}.metadata.json` with create-if-absent semantics, so
/// two writers racing for the same version cannot both win.
#[derive(Debug, Clone)]
pub struct WarehouseCatalog {
    config: Arc<CatalogConfig>,
    store: Arc<dyn ObjectStore>,
}

impl WarehouseCatalog {
    /// Builds the object store for the configured location. S3 credentials
    /// and region come from the usual `AWS_*` environment variables.
    pub fn connect(config: CatalogConfig) -> Result<Self, LakehouseError> {
        let store: Arc<dyn ObjectStore> = match &config.location {
            StorageLocation::S3 { bucket, .. } => Arc::new(
                AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_conditional_put(S3ConditionalPut::ETagMatch)
                    .build()?,
            ),
            StorageLocation::Local { root, .. } => {
                std::fs::create_dir_all(root).map_err(|e| {
                    LakehouseError::InvalidLocation(format!("{}: {e}", root.display()))
                })?;
                Arc::new(LocalFileSystem::new_with_prefix(root)?)
            }
            StorageLocation::Memory { .. } => Arc::new(InMemory::new()),
        };

        Ok(Self::with_store(config, store))
    }

    /// Uses `store` as the warehouse root. The configured prefix is still
    /// applied on top of it.
    pub fn with_store(config: CatalogConfig, store: Arc<dyn ObjectStore>) -> Self {
        let store: Arc<dyn ObjectStore> = match config.location.prefix() {
            "" => store,
            prefix => Arc::new(PrefixStore::new(store, prefix)),
        };

        WarehouseCatalog {
            config: Arc::new(config),
            store,
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Store rooted at the warehouse prefix.
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    pub fn table_root(&self, ident: &TableIdent) -> Path {
        Path::from_iter([format!("{}.db", ident.namespace()), ident.name().to_string()])
    }

    pub fn table_location(&self, ident: &TableIdent) -> String {
        format!("{}/{}", self.config.location.warehouse_url(), self.table_root(ident))
    }

    pub fn metadata_path(&self, ident: &TableIdent, version: u64) -> Path {
        self.table_root(ident)
            .child(METADATA_DIR)
            .child(format!("v{version}.metadata.json"))
    }

    fn version_hint_path(&self, ident: &TableIdent) -> Path {
        self.table_root(ident).child(METADATA_DIR).child(VERSION_HINT)
    }

    fn data_path(&self, ident: &TableIdent, file: &DataFile) -> Path {
        file.file_path
            .split('/')
            .fold(self.table_root(ident), |path, part| path.child(part))
    }

    async fn exists(&self, path: &Path) -> Result<bool, LakehouseError> {
        match self.store.head(path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_hint(&self, ident: &TableIdent) -> Result<u64, LakehouseError> {
        match self.store.get(&self.version_hint_path(ident)).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                Ok(std::str::from_utf8(&bytes)
                    .ok()
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(0))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Latest committed metadata version, or `None` when the table does
    /// not exist. The version hint is only a starting point: newer versions
    /// written by writers that lost the hint update are probed for.
    pub async fn current_version(&self, ident: &TableIdent) -> Result<Option<u64>, LakehouseError> {
        let mut version = self.read_hint(ident).await?;
        while self.exists(&self.metadata_path(ident, version + 1)).await? {
            version += 1;
        }
        Ok((version > 0).then_some(version))
    }

    pub async fn table_exists(&self, ident: &TableIdent) -> Result<bool, LakehouseError> {
        Ok(self.current_version(ident).await?.is_some())
    }

    pub async fn load_table(&self, ident: &TableIdent) -> Result<Option<LoadedTable>, LakehouseError> {
        let Some(version) = self.current_version(ident).await? else {
            return Ok(None);
        };

        let path = self.metadata_path(ident, version);
        let bytes = match self.store.get(&path).await {
            Ok(result) => result.bytes().await?,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(LakehouseError::CorruptMetadata {
                    table: ident.to_string(),
                    reason: format!("version hint points at missing {path}"),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let metadata: TableMetadata = serde_json::from_slice(&bytes)?;
        Ok(Some(LoadedTable { version, metadata }))
    }

    /// Publishes `metadata` as version `version` of the table. Fails with
    /// [`LakehouseError::CommitConflict`] when that version already exists.
    pub async fn commit(
        &self,
        ident: &TableIdent,
        version: u64,
        metadata: &TableMetadata,
    ) -> Result<(), LakehouseError> {
        let path = self.metadata_path(ident, version);
        let payload = PutPayload::from(serde_json::to_vec_pretty(metadata)?);

        match self.store.put_opts(&path, payload, PutMode::Create.into()).await {
            Ok(_) => {}
            Err(object_store::Error::AlreadyExists { .. })
            | Err(object_store::Error::Precondition { .. }) => {
                return Err(LakehouseError::CommitConflict {
                    table: ident.to_string(),
                    version,
                });
            }
            Err(e) => return Err(e.into()),
        }
        debug!("Committed {} version {}", ident, version);

        // Readers probe past a stale hint, so a failed update is not fatal
        let hint = PutPayload::from(version.to_string());
        if let Err(e) = self.store.put(&self.version_hint_path(ident), hint).await {
            warn!("Failed to update version hint for {}: {}", ident, e);
        }

        Ok(())
    }

    /// Stores a Parquet file under the table's `data/` directory.
    pub async fn write_data_file(
        &self,
        ident: &TableIdent,
        record_count: u64,
        bytes: Bytes,
    ) -> Result<DataFile, LakehouseError> {
        let file = DataFile {
            file_path: format!("{DATA_DIR}/{}.parquet", Uuid::new_v4()),
            file_format: "PARQUET".to_string(),
            record_count,
            file_size_in_bytes: bytes.len() as u64,
        };

        self.store
            .put(&self.data_path(ident, &file), PutPayload::from(bytes))
            .await?;
        Ok(file)
    }

    pub async fn read_data_file(
        &self,
        ident: &TableIdent,
        file: &DataFile,
    ) -> Result<Bytes, LakehouseError> {
        Ok(self
            .store
            .get(&self.data_path(ident, file))
            .await?
            .bytes()
            .await?)
    }

    /// Best-effort removal of a data file no snapshot refers to.
    pub async fn discard_data_file(&self, ident: &TableIdent, file: &DataFile) {
        if let Err(e) = self.store.delete(&self.data_path(ident, file)).await {
            warn!("Failed to remove orphaned {}: {}", file.file_path, e);
        }
    }
}
